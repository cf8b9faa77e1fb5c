use std::io::{ErrorKind, Read};

use crate::error::{LinkError, Result};
use crate::manager::LinkSettings;
use crate::memory::MemoryPort;

/// Opens a [`LinkStream`] for a set of link settings.
///
/// [`LinkManager`](crate::LinkManager) goes through this seam so the same
/// lifecycle code drives real serial ports and in-memory ports.
pub trait Opener: Send {
    /// Open a new stream. Must not touch any previously opened stream.
    fn open(&mut self, settings: &LinkSettings) -> Result<LinkStream>;
}

/// An open serial byte stream. Implements `Read`.
///
/// Backed either by an OS serial port or by an in-memory [`MemoryPort`].
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    Serial(Box<dyn serialport::SerialPort>),
    Memory(MemoryPort),
}

impl LinkStream {
    pub(crate) fn from_serial(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            inner: LinkStreamInner::Serial(port),
        }
    }

    pub(crate) fn from_memory(port: MemoryPort) -> Self {
        Self {
            inner: LinkStreamInner::Memory(port),
        }
    }

    /// Number of bytes that can be read without blocking.
    pub fn bytes_available(&mut self) -> Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Serial(port) => port
                .bytes_to_read()
                .map(|n| n as usize)
                .map_err(|err| LinkError::Io(err.into())),
            LinkStreamInner::Memory(port) => port.available(),
        }
    }

    /// Read exactly one byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        loop {
            match self.read(&mut byte) {
                Ok(1) => return Ok(byte[0]),
                Ok(_) => return Err(LinkError::Io(ErrorKind::UnexpectedEof.into())),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(LinkError::Io(err)),
            }
        }
    }

    /// Close the stream, discarding any unread input.
    pub fn close(self) -> Result<()> {
        match self.inner {
            LinkStreamInner::Serial(port) => {
                // The OS handle is released when `port` drops, even if the
                // flush fails.
                port.clear(serialport::ClearBuffer::Input)
                    .map_err(|err| LinkError::Io(err.into()))
            }
            LinkStreamInner::Memory(port) => port.close(),
        }
    }

    /// Short description of the backing port type.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            LinkStreamInner::Serial(_) => "serial",
            LinkStreamInner::Memory(_) => "memory",
        }
    }
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Serial(port) => port.read(buf),
            LinkStreamInner::Memory(port) => port.read_into(buf),
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            LinkStreamInner::Serial(port) => f
                .debug_struct("LinkStream")
                .field("type", &"serial")
                .field("name", &port.name())
                .finish(),
            LinkStreamInner::Memory(port) => f
                .debug_struct("LinkStream")
                .field("type", &"memory")
                .field("name", &port.name())
                .finish(),
        }
    }
}
