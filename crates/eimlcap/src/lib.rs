//! Capture log lines and images multiplexed on one serial link.
//!
//! A device prints plain text log lines and, interleaved with them, images
//! encoded as single base64 lines: JPEG files or raw EIML pixel frames.
//! eimlcap splits that stream back apart.
//!
//! # Crate Structure
//!
//! - [`link`]: serial port lifecycle (connect, reconnect, close) and an
//!   in-memory port for tests and replays
//! - [`frame`]: line demultiplexer, EIML codec and the polling reader
//! - [`capture`]: background producer thread with a latest-wins image
//!   mailbox (behind the `capture` feature)

/// Re-export link types.
pub mod link {
    pub use eimlcap_link::*;
}

/// Re-export frame types.
pub mod frame {
    pub use eimlcap_frame::*;
}

/// Re-export capture types (requires `capture` feature).
#[cfg(feature = "capture")]
pub mod capture {
    pub use eimlcap_capture::*;
}
