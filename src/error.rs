//! Error types shared across components.

use thiserror::Error;

/// Failures of the delivery store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The bulk read at session start failed. The session must not proceed.
    #[error("delivery store unavailable for tenant {tenant_id}/{filter_id}: {source}")]
    Unavailable {
        tenant_id: String,
        filter_id: String,
        #[source]
        source: Box<StoreError>,
    },

    #[error("database error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

/// A tenant subscription that lacks something the hunt needs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantError {
    #[error("tenant record has no tenant id")]
    MissingTenantId,

    #[error("tenant {tenant_id} has a filter without id")]
    MissingFilterId { tenant_id: String },

    #[error("tenant {tenant_id} filter {filter_id} has no receivers")]
    MissingReceivers { tenant_id: String, filter_id: String },

    #[error("tenant {tenant_id} filter {filter_id} has no filter url")]
    MissingFilterUrl { tenant_id: String, filter_id: String },
}

/// Errors raised while delivering a message to a receiver.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {description}")]
    Api { status: u16, description: String },

    #[error("template rendering failed: {0}")]
    Template(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Pipeline assembly errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("stage {stage} must not run after stage {after}")]
    StageOrder {
        stage: &'static str,
        after: &'static str,
    },

    #[error("stage {0} must be the last stage")]
    NotTerminal(&'static str),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
