use thiserror::Error;

/// Session-level failures. Per-page generation failures are not errors;
/// they are recorded on the page result and rendered as placeholders.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("{0}")]
    Validation(String),

    #[error("Could not reach the backend: {0}. Check that the server is running.")]
    Network(String),

    #[error("Backend error ({status}): {detail}")]
    Server { status: u16, detail: String },

    #[error("Generation took too long: {0}")]
    Timeout(String),
}

impl GenerateError {
    pub fn server(status: u16, detail: Option<String>) -> Self {
        GenerateError::Server {
            status,
            detail: detail.unwrap_or_else(|| "Failed to generate storybook".to_string()),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, GenerateError::Validation(_))
    }
}
