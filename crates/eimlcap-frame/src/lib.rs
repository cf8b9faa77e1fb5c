//! Line demultiplexer for serial image streams.
//!
//! Devices print human-readable log lines and base64-encoded image frames
//! on the same UART. Every line ends with `\n`; image lines end with
//! `\r\n` and start with a fixed base64 prefix:
//! - `/9j/`: a JPEG (base64 of the `FF D8 FF` start-of-image marker)
//! - `/6D/`: an EIML frame (base64 of the `FF A0 FF` start-of-frame marker)
//!
//! The frame type is sniffed from the still-encoded prefix; lines are only
//! decoded once complete.

pub mod demux;
pub mod eiml;
pub mod error;
pub mod image;
pub mod reader;
pub mod signature;

pub use demux::{Demux, DemuxConfig, EventSink, FnSink, RxEvent, RxState, DEFAULT_MAX_LINE_LEN};
pub use eiml::{
    decode_eiml, encode_eiml, encode_eiml_line, DecodedImage, EimlHeader, PixelFormat, EIML_HEADER_SIZE,
    EIML_SOF,
};
pub use error::{DecodeError, Result};
pub use image::{EncodedImage, Image};
pub use reader::{LinkReader, ReaderConfig, Step, DEFAULT_IDLE_SLEEP, DEFAULT_MAX_BURST};
pub use signature::{FrameKind, EIML_SIGNATURE_B64, JPEG_SIGNATURE_B64, SIGNATURE_LEN};
