use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::eiml::decode_eiml;
use crate::error::{DecodeError, Result};
use crate::image::{EncodedImage, Image};
use crate::signature::{FrameKind, SIGNATURE_LEN};

/// Default maximum line length: 16 MiB.
pub const DEFAULT_MAX_LINE_LEN: usize = 16 * 1024 * 1024;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// What the current line is being captured as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RxState {
    /// Plain text, or not enough bytes yet to tell.
    #[default]
    Idle,
    /// The line started with the JPEG signature.
    CapturingJpeg,
    /// The line started with the EIML signature.
    CapturingEiml,
}

/// Result of one completed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxEvent {
    /// A text line with surrounding whitespace removed.
    Log(String),
    /// A successfully decoded image line.
    Image(Image),
    /// A discarded line: an image line that failed to decode, or any line
    /// longer than [`DemuxConfig::max_line_len`].
    Dropped(DecodeError),
}

/// Receives demultiplexer output.
pub trait EventSink {
    fn on_event(&mut self, event: RxEvent);
}

impl EventSink for Vec<RxEvent> {
    fn on_event(&mut self, event: RxEvent) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn on_event(&mut self, event: RxEvent) {
        (**self).on_event(event);
    }
}

/// Adapts a closure into an [`EventSink`].
pub struct FnSink<F>(pub F);

impl<F: FnMut(RxEvent)> EventSink for FnSink<F> {
    fn on_event(&mut self, event: RxEvent) {
        (self.0)(event);
    }
}

/// Configuration for the demultiplexer.
#[derive(Debug, Clone)]
pub struct DemuxConfig {
    /// Longest line accepted, excluding the newline. Default: 16 MiB.
    pub max_line_len: usize,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

/// Splits a byte stream into lines and classifies each one.
///
/// Advanced one byte at a time by [`Demux::process_byte`]; the output is
/// the same however the stream is chunked.
#[derive(Debug)]
pub struct Demux {
    buf: BytesMut,
    state: RxState,
    discarding: bool,
    config: DemuxConfig,
}

impl Default for Demux {
    fn default() -> Self {
        Self::new()
    }
}

impl Demux {
    pub fn new() -> Self {
        Self::with_config(DemuxConfig::default())
    }

    pub fn with_config(config: DemuxConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: RxState::Idle,
            discarding: false,
            config,
        }
    }

    /// Current capture state.
    pub fn state(&self) -> RxState {
        self.state
    }

    /// Bytes accumulated since the last newline.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn config(&self) -> &DemuxConfig {
        &self.config
    }

    /// Drop any partial line and return to `Idle`.
    pub fn reset(&mut self) {
        if !self.buf.is_empty() {
            debug!(state = ?self.state, buffered = self.buf.len(), "discarding partial line");
        }
        self.buf.clear();
        self.state = RxState::Idle;
        self.discarding = false;
    }

    /// Feed every byte of `bytes`, sending completed lines to `sink`.
    pub fn push<S: EventSink>(&mut self, bytes: &[u8], mut sink: S) {
        for &byte in bytes {
            if let Some(event) = self.process_byte(byte) {
                sink.on_event(event);
            }
        }
    }

    /// Advance the state machine by one byte.
    ///
    /// Returns an event when `byte` completes a line (or overflows it).
    pub fn process_byte(&mut self, byte: u8) -> Option<RxEvent> {
        if self.discarding {
            if byte == b'\n' {
                self.discarding = false;
            }
            return None;
        }

        if byte != b'\n' && self.buf.len() >= self.config.max_line_len {
            let limit = self.config.max_line_len;
            debug!(state = ?self.state, limit, "line too long, discarding until newline");
            self.buf.clear();
            self.state = RxState::Idle;
            self.discarding = true;
            return Some(RxEvent::Dropped(DecodeError::LineTooLong { limit }));
        }

        self.buf.extend_from_slice(&[byte]);

        if self.state == RxState::Idle && self.buf.len() == SIGNATURE_LEN {
            self.state = match FrameKind::sniff(&self.buf) {
                Some(FrameKind::Jpeg) => RxState::CapturingJpeg,
                Some(FrameKind::Eiml) => RxState::CapturingEiml,
                None => RxState::Idle,
            };
            if self.state != RxState::Idle {
                trace!(state = ?self.state, "image signature matched");
            }
        }

        if byte == b'\n' {
            return self.complete_line();
        }
        None
    }

    fn complete_line(&mut self) -> Option<RxEvent> {
        let event = match self.state {
            RxState::Idle => decode_log_line(&self.buf).map(RxEvent::Log),
            RxState::CapturingJpeg => Some(match decode_jpeg_line(&self.buf) {
                Ok(image) => RxEvent::Image(Image::Encoded(image)),
                Err(err) => RxEvent::Dropped(err),
            }),
            RxState::CapturingEiml => Some(match decode_eiml_line(&self.buf) {
                Ok(image) => RxEvent::Image(Image::Raw(image)),
                Err(err) => RxEvent::Dropped(err),
            }),
        };

        self.buf.clear();
        self.state = RxState::Idle;
        event
    }
}

fn decode_log_line(line: &[u8]) -> Option<String> {
    match std::str::from_utf8(line) {
        Ok(text) => Some(text.trim().to_string()),
        Err(err) => {
            debug!(len = line.len(), error = %err, "ignoring non-UTF-8 line");
            None
        }
    }
}

fn decode_jpeg_line(line: &[u8]) -> Result<EncodedImage> {
    let bytes = decode_base64(strip_crlf(line)?)?;
    EncodedImage::jpeg(bytes)
}

fn decode_eiml_line(line: &[u8]) -> Result<crate::eiml::DecodedImage> {
    let payload = decode_base64(strip_crlf(line)?)?;
    decode_eiml(Bytes::from(payload))
}

fn strip_crlf(line: &[u8]) -> Result<&[u8]> {
    line.strip_suffix(b"\r\n")
        .ok_or(DecodeError::MissingCrlf { len: line.len() })
}

fn decode_base64(encoded: &[u8]) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|source| DecodeError::InvalidBase64 { source })
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::eiml::{encode_eiml_line, DecodedImage, EimlHeader, PixelFormat};

    fn run(bytes: &[u8]) -> Vec<RxEvent> {
        let mut demux = Demux::new();
        let mut events = Vec::new();
        demux.push(bytes, &mut events);
        events
    }

    fn b64_line(raw: &[u8]) -> Vec<u8> {
        let mut line = STANDARD.encode(raw).into_bytes();
        line.extend_from_slice(b"\r\n");
        line
    }

    fn eiml_raw(format: u8, width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        EimlHeader {
            format,
            width,
            height,
        }
        .encode(&mut buf);
        buf.put_slice(pixels);
        buf.to_vec()
    }

    fn fake_jpeg() -> Vec<u8> {
        include_bytes!("../testdata/gray-16x8.jpg").to_vec()
    }

    fn mixed_stream() -> Vec<u8> {
        let mut stream = Vec::new();
        stream.extend_from_slice(b"boot ok\r\n");
        stream.extend(b64_line(&fake_jpeg()));
        stream.extend_from_slice(b"\n");
        stream.extend(b64_line(&eiml_raw(2, 2, 1, &[1, 2, 3, 4, 5, 6])));
        stream.extend(b64_line(&eiml_raw(3, 1, 1, &[9])));
        stream.extend_from_slice(b"ab\n");
        stream.extend(b64_line(&eiml_raw(1, 2, 2, &[7, 8])));
        stream.extend_from_slice(&[0xC3, 0x28, b'\n']);
        stream.extend_from_slice(b"  temp=21.5C  \n");
        stream
    }

    #[test]
    fn plain_line_is_logged_trimmed() {
        assert_eq!(run(b"  hello world \r\n"), vec![RxEvent::Log("hello world".into())]);
    }

    #[test]
    fn lone_newline_is_empty_log_line() {
        assert_eq!(run(b"\n"), vec![RxEvent::Log(String::new())]);
    }

    #[test]
    fn short_lines_are_always_logs() {
        assert_eq!(
            run(b"/9j\n/6\n"),
            vec![RxEvent::Log("/9j".into()), RxEvent::Log("/6".into())]
        );
    }

    #[test]
    fn invalid_utf8_line_emits_nothing() {
        let mut demux = Demux::new();
        let mut events = Vec::new();
        demux.push(&[0xFF, 0xFE, b'\n', b'o', b'k', b'\n'], &mut events);
        assert_eq!(events, vec![RxEvent::Log("ok".into())]);
        assert_eq!(demux.state(), RxState::Idle);
    }

    #[test]
    fn jpeg_line_yields_decoded_bytes() {
        let jpeg = fake_jpeg();
        let line = b64_line(&jpeg);
        assert!(line.starts_with(b"/9j/"));

        let events = run(&line);
        let expected = EncodedImage::jpeg(jpeg).unwrap();
        assert_eq!((expected.width(), expected.height()), (16, 8));
        assert_eq!(events, vec![RxEvent::Image(Image::Encoded(expected))]);
    }

    #[test]
    fn unparseable_jpeg_line_is_dropped() {
        let mut demux = Demux::new();
        let mut events = Vec::new();
        demux.push(b"/9j/AA==\r\nstill here\n", &mut events);

        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            RxEvent::Dropped(DecodeError::MalformedImage { .. })
        ));
        assert_eq!(events[1], RxEvent::Log("still here".into()));
        assert_eq!(demux.state(), RxState::Idle);
    }

    #[test]
    fn truncated_jpeg_line_is_dropped() {
        let jpeg = fake_jpeg();
        let events = run(&b64_line(&jpeg[..jpeg.len() / 2]));
        assert!(matches!(
            events.as_slice(),
            [RxEvent::Dropped(DecodeError::MalformedImage { .. })]
        ));
    }

    #[test]
    fn eiml_rgb_line_yields_raw_image() {
        let pixels = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
        let line = b64_line(&eiml_raw(2, 2, 1, &pixels));
        assert!(line.starts_with(b"/6D/"));

        let events = run(&line);
        assert_eq!(events.len(), 1);
        let RxEvent::Image(Image::Raw(image)) = &events[0] else {
            panic!("expected raw image, got {:?}", events[0]);
        };
        assert_eq!(image.format(), PixelFormat::Rgb888);
        assert_eq!((image.width(), image.height()), (2, 1));
        assert_eq!(image.pixels().as_ref(), &pixels);
    }

    #[test]
    fn unsupported_format_is_dropped() {
        let events = run(&b64_line(&eiml_raw(3, 2, 1, &[0; 6])));
        assert_eq!(
            events,
            vec![RxEvent::Dropped(DecodeError::UnsupportedFormat { format: 3 })]
        );
    }

    #[test]
    fn truncated_payload_is_dropped_and_next_line_processed() {
        let mut stream = b64_line(&eiml_raw(1, 2, 2, &[1, 2]));
        stream.extend_from_slice(b"next\n");

        let mut demux = Demux::new();
        let mut events = Vec::new();
        demux.push(&stream, &mut events);

        assert_eq!(
            events,
            vec![
                RxEvent::Dropped(DecodeError::PayloadMismatch {
                    expected: 4,
                    actual: 2
                }),
                RxEvent::Log("next".into()),
            ]
        );
        assert_eq!(demux.state(), RxState::Idle);
        assert_eq!(demux.buffered(), 0);
    }

    #[test]
    fn image_line_without_crlf_is_dropped() {
        let mut line = STANDARD.encode(eiml_raw(1, 1, 1, &[5])).into_bytes();
        line.push(b'\n');

        let events = run(&line);
        assert_eq!(
            events,
            vec![RxEvent::Dropped(DecodeError::MissingCrlf { len: line.len() })]
        );
    }

    #[test]
    fn invalid_base64_is_dropped() {
        let events = run(b"/9j/not*base64\r\n");
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            RxEvent::Dropped(DecodeError::InvalidBase64 { .. })
        ));
    }

    #[test]
    fn signature_is_only_checked_at_line_start() {
        let mut line = b"xx".to_vec();
        line.extend(b64_line(&fake_jpeg()));
        let events = run(&line);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], RxEvent::Log(text) if text.starts_with("xx/9j/")));
    }

    #[test]
    fn state_tracks_signature_before_line_completes() {
        let mut demux = Demux::new();
        for &byte in b"/6D" {
            assert!(demux.process_byte(byte).is_none());
            assert_eq!(demux.state(), RxState::Idle);
        }
        assert!(demux.process_byte(b'/').is_none());
        assert_eq!(demux.state(), RxState::CapturingEiml);

        demux.reset();
        assert_eq!(demux.state(), RxState::Idle);
        assert_eq!(demux.buffered(), 0);
    }

    #[test]
    fn chunking_does_not_change_output() {
        let stream = mixed_stream();
        let all_at_once = run(&stream);

        for chunk_size in [1, 2, 3, 5, 7, 64, stream.len()] {
            let mut demux = Demux::new();
            let mut events = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                demux.push(chunk, &mut events);
            }
            assert_eq!(events, all_at_once, "chunk size {chunk_size}");
        }

        let mut demux = Demux::new();
        let byte_by_byte: Vec<RxEvent> = stream
            .iter()
            .filter_map(|&byte| demux.process_byte(byte))
            .collect();
        assert_eq!(byte_by_byte, all_at_once);
    }

    #[test]
    fn mixed_stream_event_sequence() {
        let events = run(&mixed_stream());
        let summary: Vec<&str> = events
            .iter()
            .map(|event| match event {
                RxEvent::Log(_) => "log",
                RxEvent::Image(Image::Encoded(_)) => "jpeg",
                RxEvent::Image(Image::Raw(_)) => "raw",
                RxEvent::Dropped(_) => "dropped",
            })
            .collect();
        assert_eq!(
            summary,
            vec!["log", "jpeg", "log", "raw", "dropped", "log", "dropped", "log"]
        );
    }

    #[test]
    fn overlong_line_is_dropped_then_recovers() {
        let mut demux = Demux::with_config(DemuxConfig { max_line_len: 8 });
        let mut events = Vec::new();
        demux.push(b"0123456789abcdef\nok\n", &mut events);

        assert_eq!(
            events,
            vec![
                RxEvent::Dropped(DecodeError::LineTooLong { limit: 8 }),
                RxEvent::Log("ok".into()),
            ]
        );
    }

    #[test]
    fn line_at_limit_is_accepted() {
        let mut demux = Demux::with_config(DemuxConfig { max_line_len: 4 });
        let mut events = Vec::new();
        demux.push(b"abcd\n", &mut events);
        assert_eq!(events, vec![RxEvent::Log("abcd".into())]);
    }

    #[test]
    fn closure_sink_receives_events() {
        let image = DecodedImage::test_pattern(PixelFormat::Grayscale, 3, 3).unwrap();
        let mut count = 0usize;
        let mut demux = Demux::new();
        demux.push(
            &encode_eiml_line(&image),
            FnSink(|event: RxEvent| {
                assert_eq!(event, RxEvent::Image(Image::Raw(image.clone())));
                count += 1;
            }),
        );
        assert_eq!(count, 1);
    }
}
