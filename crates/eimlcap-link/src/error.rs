/// Errors that can occur while managing the serial link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The port could not be opened with the requested settings.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        source: serialport::Error,
    },

    /// A baud rate of zero was requested.
    #[error("invalid baud rate {0} (must be positive)")]
    InvalidBaud(u32),

    /// The operation needs an open connection and there is none.
    #[error("serial link is not connected")]
    NotConnected,

    /// No in-memory port is registered under this name.
    #[error("unknown port: {0}")]
    UnknownPort(String),

    /// Port enumeration failed.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(serialport::Error),

    /// An I/O error occurred on an open link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// True for errors that leave an open connection usable (a single read
    /// timing out or being interrupted).
    pub fn is_transient(&self) -> bool {
        match self {
            LinkError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
