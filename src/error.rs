#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    /// The caller is not allowed to impersonate the principal, with a single
    /// line message detailing the nature of the problem.
    #[error("Authentication failed: {0}")]
    Authentication(String),
    /// The principal does not exist (or its resource name is malformed).
    #[error("Principal not found: {0}")]
    NotFound(String),
    /// Transport-level failure while talking to the target endpoint.
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),
}

impl Error {
    pub(crate) fn should_suggest_issue(&self) -> bool {
        match self {
            // Operational failures in the caller's environment, not bugs in this tool.
            Self::Authentication(_) | Self::NotFound(_) => false,
            Self::Network(_) => true,
        }
    }
}
