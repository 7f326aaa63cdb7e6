use crate::core::error::GenerateError;
use log::error;

pub fn banner(err: &GenerateError) -> String {
    format!("❌ {err}")
}

pub fn hint(err: &GenerateError) -> Option<&'static str> {
    match err {
        GenerateError::Validation(_) => None,
        GenerateError::Network(_) => Some("Is the backend running? Try `story2book` again once it is up."),
        GenerateError::Server { .. } => None,
        GenerateError::Timeout(_) => {
            Some("The backend may be busy or the model still loading. Try again in a minute.")
        }
    }
}

/// The caller keeps the input path open afterwards; a failed session
/// never traps the user.
pub fn present(err: &GenerateError) {
    error!("session error: {err}");
    eprintln!("\n{}", banner(err));
    if let Some(hint) = hint(err) {
        eprintln!("   {hint}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_carries_server_detail() {
        let err = GenerateError::server(503, Some("Model is loading".to_string()));
        assert!(banner(&err).contains("Model is loading"));
    }

    #[test]
    fn test_timeout_banner_is_distinct_from_network() {
        let timeout = banner(&GenerateError::Timeout("no images after 300s".to_string()));
        let network = banner(&GenerateError::Network("connection refused".to_string()));
        assert!(timeout.contains("took too long"));
        assert!(network.contains("Check that the server is running"));
        assert_ne!(timeout, network);
    }

    #[test]
    fn test_validation_has_no_backend_hint() {
        assert!(hint(&GenerateError::Validation("too many pages".to_string())).is_none());
        assert!(hint(&GenerateError::Network("x".to_string())).is_some());
    }
}
