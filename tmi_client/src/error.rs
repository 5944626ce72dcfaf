#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("timed out waiting for {what}{}", list(.pending))]
    Timeout { what: String, pending: Vec<String> },

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("bad usage: {0}")]
    Usage(String),

    #[error("unrecognized command: {0} (chat commands other than .me require a first party token)")]
    Unrecognized(String),

    #[error("{0}")]
    Failed(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error(transparent)]
    Overflow(#[from] tmi_parser::Overflow),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("tls: {0}")]
    Tls(String),

    #[error("the client is closed")]
    Closed,
}

impl Error {
    pub(crate) fn timeout(what: impl ToString) -> Self {
        Self::Timeout {
            what: what.to_string(),
            pending: Vec::new(),
        }
    }

    /// Errors that end the client rather than a single request.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication(..) | Self::Closed)
    }
}

fn list(pending: &[String]) -> String {
    if pending.is_empty() {
        return String::new();
    }
    format!(": {}", pending.join(", "))
}
