//! Serial link lifecycle management.
//!
//! Owns the one serial connection eimlcap talks to:
//! - open / reconfigure (port, baud) / close through [`LinkManager`]
//! - non-blocking byte availability checks and single-byte reads
//! - an in-memory port ([`MemoryPort`]) for tests and capture replay
//!
//! This is the lowest layer of eimlcap. The frame demultiplexer pulls its
//! bytes from the [`LinkManager`] provided here.

pub mod error;
pub mod manager;
pub mod memory;
pub mod serial;
pub mod stream;

pub use error::{LinkError, Result};
pub use manager::{LinkManager, LinkSettings, DEFAULT_READ_TIMEOUT};
pub use memory::{MemoryOpener, MemoryPort};
pub use serial::{available_ports, PortInfo, SerialOpener};
pub use stream::{LinkStream, Opener};
