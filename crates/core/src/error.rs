/// Result alias that carries the custom [`CubeAnimError`] type.
pub type Result<T> = std::result::Result<T, CubeAnimError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum CubeAnimError {
    /// Free-form error surfaced to the application as a readable message.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors (thread spawning, config files).
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration could not be parsed or serialised.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// A move written in cube notation could not be understood.
    #[error("invalid move `{0}`")]
    InvalidMove(String),
    /// The pipeline was aborted and can no longer be started.
    #[error("render pipeline was aborted and cannot be restarted")]
    Aborted,
    /// A pipeline thread could not be spawned or panicked, so its worker
    /// state is gone.
    #[error("render pipeline cannot be restarted: {0}")]
    WorkerLost(String),
}

impl CubeAnimError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for CubeAnimError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for CubeAnimError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
