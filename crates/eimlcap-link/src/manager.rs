use std::time::Duration;

use tracing::{info, warn};

use crate::error::{LinkError, Result};
use crate::serial::SerialOpener;
use crate::stream::{LinkStream, Opener};

/// Default per-read timeout applied to opened ports.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Port and line settings for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Port identifier (`/dev/ttyUSB0`, `COM26`, or a memory port name).
    pub port: String,
    /// Baud rate. Must be positive.
    pub baud: u32,
    /// Timeout for a single blocking read.
    pub read_timeout: Duration,
}

impl LinkSettings {
    pub fn new(port: impl Into<String>, baud: u32) -> Self {
        Self {
            port: port.into(),
            baud,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Owns at most one open serial connection.
///
/// Reconnecting always closes the previous connection first; errors from
/// that close are logged and otherwise ignored.
pub struct LinkManager<O = SerialOpener> {
    opener: O,
    settings: Option<LinkSettings>,
    stream: Option<LinkStream>,
    read_timeout: Duration,
}

impl LinkManager<SerialOpener> {
    /// Manager for OS serial ports.
    pub fn serial() -> Self {
        Self::new(SerialOpener)
    }
}

impl<O: Opener> LinkManager<O> {
    /// Create a closed manager that opens ports through `opener`.
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            settings: None,
            stream: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Override the per-read timeout used for subsequent connections.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Close any existing connection, then open `port` at `baud`.
    ///
    /// On failure the manager is left closed; the caller may retry.
    pub fn connect(&mut self, port: &str, baud: u32) -> Result<()> {
        close_quietly(self.stream.take());

        if baud == 0 {
            return Err(LinkError::InvalidBaud(baud));
        }

        let settings = LinkSettings {
            port: port.to_string(),
            baud,
            read_timeout: self.read_timeout,
        };
        info!(port, baud, "connecting");

        let stream = self.opener.open(&settings)?;
        self.settings = Some(settings);
        self.stream = Some(stream);
        Ok(())
    }

    /// Close the connection. Closing a closed manager is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match self.stream.take() {
            Some(stream) => {
                info!(port = self.port_name(), "closing serial link");
                stream.close()
            }
            None => Ok(()),
        }
    }

    /// True while a connection is open.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Settings of the most recent successful connect.
    pub fn settings(&self) -> Option<&LinkSettings> {
        self.settings.as_ref()
    }

    /// Number of bytes that can be read without blocking.
    pub fn bytes_available(&mut self) -> Result<usize> {
        self.stream
            .as_mut()
            .ok_or(LinkError::NotConnected)?
            .bytes_available()
    }

    /// Read exactly one byte. Only call after `bytes_available() > 0`.
    pub fn read_byte(&mut self) -> Result<u8> {
        self.stream
            .as_mut()
            .ok_or(LinkError::NotConnected)?
            .read_byte()
    }

    /// Borrow the opener.
    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Mutably borrow the opener.
    pub fn opener_mut(&mut self) -> &mut O {
        &mut self.opener
    }

    fn port_name(&self) -> &str {
        self.settings.as_ref().map_or("", |s| s.port.as_str())
    }
}

impl<O> Drop for LinkManager<O> {
    fn drop(&mut self) {
        close_quietly(self.stream.take());
    }
}

fn close_quietly(stream: Option<LinkStream>) {
    if let Some(stream) = stream {
        if let Err(err) = stream.close() {
            warn!(error = %err, "error closing previous serial link");
        }
    }
}

impl<O> std::fmt::Debug for LinkManager<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkManager")
            .field("settings", &self.settings)
            .field("stream", &self.stream)
            .finish()
    }
}
