use thiserror::Error;

/// Persistence failures of the local key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt value stored under '{key}': {detail}")]
    Corrupt { key: String, detail: String },
}

/// Everything that can go wrong between a UI request and its envelope.
///
/// A duplicate capture is not an error; it is reported as
/// [`SubmissionResult::Duplicate`](crate::protocol::SubmissionResult::Duplicate).
#[derive(Debug, Error)]
pub enum CaptureError {
    // ============================================================
    // Submission
    // ============================================================
    #[error("API key not configured. Click the extension icon to set it up.")]
    MissingCredential,

    #[error("{message}")]
    RemoteRejected { status: u16, message: String },

    #[error("Cannot reach Talent Wharf API. Check your connection and API URL.")]
    NetworkUnreachable,

    // ============================================================
    // Dispatch
    // ============================================================
    #[error("Unknown action: {0}")]
    UnrecognizedAction(String),

    #[error("Invalid request data for {action}: {detail}")]
    InvalidRequest { action: String, detail: String },

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    // ============================================================
    // Local state
    // ============================================================
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_user_facing() {
        assert_eq!(
            CaptureError::RemoteRejected {
                status: 500,
                message: "HTTP 500".into()
            }
            .to_string(),
            "HTTP 500"
        );
        assert!(
            CaptureError::NetworkUnreachable
                .to_string()
                .contains("Check your connection")
        );
    }
}
