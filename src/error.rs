use thiserror::Error;

/// Fatal errors of a pipeline run. Per-item anomalies never surface here:
/// they are recovered or recorded on the item itself.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// One or more prerequisites (credential, authentication artifact) are absent.
    #[error("missing precondition(s): {}", .0.join(", "))]
    MissingPrecondition(Vec<String>),

    #[error("invalid value for {name}: '{value}'")]
    InvalidConfig { name: String, value: String },

    #[error("mail source authentication failed: {0:#}")]
    Authentication(anyhow::Error),

    #[error("mail retrieval failed: {0:#}")]
    Retrieval(anyhow::Error),

    #[error("export failed: {0}")]
    Export(#[from] csv::Error),

    #[error("export failed: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn missing(item: impl Into<String>) -> Self {
        PipelineError::MissingPrecondition(vec![item.into()])
    }
}
