//! Outbound messaging: tenant notifications and operator messages.
//!
//! Delivery is best-effort per receiver. [`broadcast`] reports one
//! [`ReceiverOutcome`] per receiver and never fails as a whole.

pub mod telegram;
pub mod templating;
pub mod traits;

pub use telegram::TelegramNotifier;
pub use templating::MessageRenderer;
pub use traits::{Notifier, ReceiverOutcome};

use std::time::Instant;

/// Send `text` to every receiver through `notifier`.
///
/// A failing receiver is logged and does not stop delivery to the others.
pub async fn broadcast(notifier: &dyn Notifier, receivers: &[String], text: &str) -> Vec<ReceiverOutcome> {
    let mut outcomes = Vec::with_capacity(receivers.len());

    for receiver in receivers.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
        let start = Instant::now();
        let result = notifier.send(receiver, text).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, error) = match result {
            Ok(()) => {
                tracing::debug!(channel = notifier.channel_name(), receiver, duration_ms, "message delivered");
                (true, None)
            }
            Err(e) => {
                tracing::warn!(
                    channel = notifier.channel_name(),
                    receiver,
                    error = %e,
                    duration_ms,
                    "message delivery failed"
                );
                (false, Some(e.to_string()))
            }
        };

        outcomes.push(ReceiverOutcome {
            channel: notifier.channel_name().to_string(),
            receiver: receiver.to_string(),
            success,
            error,
            duration_ms,
        });
    }

    outcomes
}
