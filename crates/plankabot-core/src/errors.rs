/// Core error type for the bridge.
///
/// Adapter crates (Planka HTTP, SQLite, Telegram) map their specific errors
/// into this type so command handling and the poller can decide between a
/// user-facing message, a retry, or a log line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// The board rejected our credentials. Never retried.
    #[error("board authentication failed: {0}")]
    Auth(String),

    /// Transport failure, timeout, unexpected status or malformed body.
    #[error("board api error: {0}")]
    Api(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// Chat transport failure.
    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Whether trying the same operation again later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Api(_) | Error::External(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(Error::Api("timeout".into()).is_retryable());
        assert!(Error::External("telegram".into()).is_retryable());
        assert!(!Error::Auth("401".into()).is_retryable());
        assert!(!Error::Storage("locked".into()).is_retryable());
        assert!(!Error::NotFound("card".into()).is_retryable());
    }
}
