//! In-memory serial ports.
//!
//! A [`MemoryPort`] is a shared handle: the test (or the replay command)
//! keeps one clone to feed bytes and inspect lifecycle counters, while the
//! [`LinkManager`](crate::LinkManager) reads from another through a
//! [`LinkStream`].

use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{LinkError, Result};
use crate::manager::LinkSettings;
use crate::stream::{LinkStream, Opener};

#[derive(Debug, Default)]
struct MemoryState {
    rx: VecDeque<u8>,
    open: bool,
    opens: usize,
    closes: usize,
    last_baud: Option<u32>,
    stale_reads: usize,
    fail_next_read: bool,
    fail_close: bool,
}

/// Shared handle to an in-memory port.
#[derive(Debug, Clone, Default)]
pub struct MemoryPort {
    name: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPort {
    /// Create a closed port with an empty receive queue.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue bytes as if the device had sent them.
    pub fn feed(&self, bytes: &[u8]) {
        self.lock().rx.extend(bytes.iter().copied());
    }

    /// Bytes queued but not yet read.
    pub fn pending(&self) -> usize {
        self.lock().rx.len()
    }

    /// Make the next read fail once with a timeout, as a flaky UART would.
    pub fn fail_next_read(&self) {
        self.lock().fail_next_read = true;
    }

    /// Make every subsequent close report an error.
    pub fn fail_close(&self) {
        self.lock().fail_close = true;
    }

    /// True while a stream opened on this port has not been closed.
    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Number of times the port has been opened.
    pub fn opens(&self) -> usize {
        self.lock().opens
    }

    /// Number of times the port has been closed.
    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    /// Baud rate of the most recent open.
    pub fn last_baud(&self) -> Option<u32> {
        self.lock().last_baud
    }

    /// Reads attempted through a stream after it was closed.
    pub fn stale_reads(&self) -> usize {
        self.lock().stale_reads
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mark_open(&self, baud: u32) {
        let mut state = self.lock();
        state.open = true;
        state.opens += 1;
        state.last_baud = Some(baud);
    }

    pub(crate) fn available(&self) -> Result<usize> {
        let state = self.lock();
        if !state.open {
            return Err(LinkError::NotConnected);
        }
        Ok(state.rx.len())
    }

    pub(crate) fn read_into(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut state = self.lock();
        if !state.open {
            state.stale_reads += 1;
            return Err(ErrorKind::NotConnected.into());
        }
        if state.fail_next_read {
            state.fail_next_read = false;
            return Err(ErrorKind::TimedOut.into());
        }
        if state.rx.is_empty() {
            return Err(ErrorKind::TimedOut.into());
        }

        let mut n = 0;
        while n < buf.len() {
            match state.rx.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    pub(crate) fn close(&self) -> Result<()> {
        let mut state = self.lock();
        state.open = false;
        state.closes += 1;
        if state.fail_close {
            return Err(LinkError::Io(std::io::Error::other(
                "memory port configured to fail on close",
            )));
        }
        Ok(())
    }
}

/// Opens registered [`MemoryPort`]s by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    ports: HashMap<String, MemoryPort>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port; returns the opener for chaining.
    pub fn with_port(mut self, port: MemoryPort) -> Self {
        self.ports.insert(port.name().to_string(), port);
        self
    }

    /// Handle to a registered port.
    pub fn port(&self, name: &str) -> Option<&MemoryPort> {
        self.ports.get(name)
    }
}

impl Opener for MemoryOpener {
    fn open(&mut self, settings: &LinkSettings) -> Result<LinkStream> {
        let port = self
            .ports
            .get(&settings.port)
            .ok_or_else(|| LinkError::UnknownPort(settings.port.clone()))?;
        port.mark_open(settings.baud);
        debug!(port = %settings.port, baud = settings.baud, "opened memory port");
        Ok(LinkStream::from_memory(port.clone()))
    }
}
