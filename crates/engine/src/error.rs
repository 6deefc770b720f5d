/// Errors from the container engine layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The HTTP request itself failed (connection refused, reset, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The engine does not know the referenced object.
    #[error("No such {kind}: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The engine returned a non-2xx status code.
    #[error("Engine API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The engine reported an error inside the pull progress stream.
    #[error("Image pull failed: {0}")]
    PullFailed(String),

    /// An exec'd command finished with a non-zero exit code.
    #[error("Command exited with status {exit_code}")]
    ExecFailed { exit_code: i64 },

    /// The operation's cancellation token fired before it finished.
    #[error("operation cancelled")]
    Cancelled,
}
