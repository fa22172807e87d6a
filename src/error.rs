use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure taxonomy shared by every pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {location}")]
    NotFound { location: String },

    #[error("Format error in {location}: {reason}")]
    Format { location: String, reason: String },

    #[error("Insufficient data for '{subject}': {count} record(s), need at least 2")]
    InsufficientData { subject: String, count: usize },

    #[error("Read-back of {location} differs from the written data at row {row}")]
    ReadBackMismatch { location: String, row: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        PipelineError::InvalidArgument(msg.into())
    }

    pub fn format(location: &str, reason: impl Into<String>) -> Self {
        PipelineError::Format {
            location: location.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error means the pipeline never reached aggregation
    /// because the stored table could not be trusted.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::NotFound { .. }
                | PipelineError::Format { .. }
                | PipelineError::ReadBackMismatch { .. }
                | PipelineError::Io(_)
                | PipelineError::Csv(_)
        )
    }
}
