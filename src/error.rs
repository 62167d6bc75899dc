use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkbenchError {
    #[error("Invalid Template: {0}")]
    InvalidTemplate(String),

    #[error("API Error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed Response: {0}")]
    MalformedResponse(String),

    #[error("Transport Error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Parse Failed: {0}")]
    Parse(String),

    #[error("JSON Error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Storage Error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error(transparent)]
    Refused(#[from] crate::session::Refusal),
}

impl WorkbenchError {
    /// True for failures of the outbound model call itself.
    pub fn is_gateway(&self) -> bool {
        matches!(
            self,
            Self::Status { .. } | Self::MalformedResponse(_) | Self::Transport(_)
        )
    }
}
