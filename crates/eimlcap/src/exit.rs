use std::fmt;
use std::io;

use eimlcap_capture::CaptureError;
use eimlcap_link::LinkError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = io_code(err.kind());
    CliError::new(code, format!("{context}: {err}"))
}

fn io_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Io(source) => io_error(context, source),
        LinkError::Open { ref source, .. } | LinkError::Enumerate(ref source) => {
            let code = match source.kind() {
                serialport::ErrorKind::Io(kind) if kind == io::ErrorKind::PermissionDenied => {
                    PERMISSION_DENIED
                }
                serialport::ErrorKind::InvalidInput => USAGE,
                _ => TRANSPORT_ERROR,
            };
            CliError::new(code, format!("{context}: {err}"))
        }
        LinkError::InvalidBaud(_) | LinkError::UnknownPort(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        LinkError::NotConnected => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn capture_error(context: &str, err: CaptureError) -> CliError {
    match err {
        CaptureError::Link(err) => link_error(context, err),
        CaptureError::Spawn(source) => io_error(context, source),
        CaptureError::WorkerGone => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}
