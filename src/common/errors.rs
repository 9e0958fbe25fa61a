use thiserror::Error;

/// Failures surfaced to the caller through the error-notification channel.
///
/// Wrong-state actions are never errors (they re-announce the current
/// state), and cleanup failures are logged only; what remains are resource
/// problems around starting an attempt and worker-side failures.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to show export indicator: {0}")]
    Indicator(String),

    #[error("Failed to open export destination {path}: {message}")]
    Destination { path: String, message: String },

    #[error("Export selection not found at {path}")]
    SelectionMissing { path: String },
}
