//! Failures raised by the adapters: storage, database, templates and logging.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database unavailable: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("logging could not start: {0}")]
    Telemetry(String),
    #[error("misconfigured: {0}")]
    Configuration(String),
    #[error("render failed: {0}")]
    Render(String),
}

impl InfraError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }
}
