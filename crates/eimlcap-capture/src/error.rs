/// Errors that can occur in capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Link-level error (open failure, bad settings).
    #[error("link error: {0}")]
    Link(#[from] eimlcap_link::LinkError),

    /// The producer thread has exited and can no longer take commands.
    #[error("capture worker is not running")]
    WorkerGone,

    /// The producer thread could not be started.
    #[error("failed to spawn capture worker: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, CaptureError>;
