//! Hub error types

/// Error type for hub operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Hub was shut down or its broadcast task is gone
    Closed,
}

impl std::fmt::Display for HubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubError::Closed => write!(f, "Hub is closed"),
        }
    }
}

impl std::error::Error for HubError {}
