//! Notifier trait and delivery outcome types.

use async_trait::async_trait;

use crate::error::NotifyError;

/// A messaging channel able to deliver text to one receiver at a time.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a rendered message to a single receiver.
    async fn send(&self, receiver: &str, text: &str) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g. "telegram").
    fn channel_name(&self) -> &str;
}

/// Result of delivering one message to one receiver.
#[derive(Debug, Clone)]
pub struct ReceiverOutcome {
    pub channel: String,
    pub receiver: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
