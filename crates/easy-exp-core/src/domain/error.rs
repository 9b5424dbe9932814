//! Domain-level error taxonomy for easy-exp.

use easy_exp_tracking::TrackingError;

/// Session-level and recording errors.
#[derive(Debug, thiserror::Error)]
pub enum ExpError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("restore from {run} failed: {source}")]
    Restore {
        run: String,
        #[source]
        source: TrackingError,
    },

    #[error("tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("run session already closed")]
    SessionClosed,

    #[error("invalid result record: {0}")]
    InvalidRecord(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for easy-exp domain operations.
pub type Result<T> = std::result::Result<T, ExpError>;

/// Outcome of a failed step.
///
/// `Cancelled` stops the whole run; `Failed` is logged and the run moves on
/// to the next item.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl StepError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StepError::Cancelled)
    }
}

impl From<ExpError> for StepError {
    fn from(err: ExpError) -> Self {
        StepError::Failed(err.into())
    }
}

impl From<std::io::Error> for StepError {
    fn from(err: std::io::Error) -> Self {
        StepError::Failed(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = ExpError::Configuration("cannot create exp_log".to_string());
        assert!(err.to_string().contains("configuration error"));
        assert!(err.to_string().contains("exp_log"));
    }

    #[test]
    fn test_restore_error_names_run() {
        let err = ExpError::Restore {
            run: "me/math/92xi1igb".to_string(),
            source: TrackingError::Unavailable("offline".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("me/math/92xi1igb"));
        assert!(msg.contains("offline"));
    }

    #[test]
    fn test_step_error_conversions() {
        let err: StepError = anyhow::anyhow!("judge timed out").into();
        assert!(!err.is_cancelled());
        assert_eq!(err.to_string(), "judge timed out");

        let err: StepError = ExpError::InvalidRecord("log_path".to_string()).into();
        assert!(matches!(err, StepError::Failed(_)));
        assert!(StepError::Cancelled.is_cancelled());
    }
}
