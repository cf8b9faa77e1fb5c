//! Background capture service.
//!
//! This is the "just works" layer: spawn a [`Capture`], `connect` it to a
//! port, and poll [`Capture::try_take_image`] from a UI timer. The serial
//! link and demultiplexer live on a dedicated producer thread; images reach
//! the consumer through a latest-wins [`Mailbox`].

pub mod capture;
pub mod error;
pub mod mailbox;

pub use capture::{Capture, CaptureBuilder, CaptureConfig};
pub use error::{CaptureError, Result};
pub use mailbox::Mailbox;
