use std::time::Duration;

use eimlcap_link::{LinkError, LinkManager, Opener};
use tracing::{debug, warn};

use crate::demux::{Demux, DemuxConfig, EventSink};

/// Default sleep when no bytes are pending.
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Default cap on bytes consumed by a single [`LinkReader::step`].
pub const DEFAULT_MAX_BURST: usize = 4096;

/// Configuration for the polling reader.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// How long to sleep when the link has nothing to read. Default: 1 ms.
    pub idle_sleep: Duration,
    /// Most bytes read per step, so callers can interleave other work.
    pub max_burst: usize,
    /// Demultiplexer settings.
    pub demux: DemuxConfig,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            idle_sleep: DEFAULT_IDLE_SLEEP,
            max_burst: DEFAULT_MAX_BURST,
            demux: DemuxConfig::default(),
        }
    }
}

/// Outcome of one polling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// This many bytes went through the demultiplexer.
    Processed(usize),
    /// Nothing was read; the caller should back off for `idle_sleep`.
    Idle,
    /// The link is closed.
    Closed,
}

/// Polls a [`LinkManager`] and feeds its bytes through a [`Demux`].
///
/// Never blocks waiting for data: an empty link yields [`Step::Idle`].
/// Read failures on an open link are logged and treated as idle.
#[derive(Debug)]
pub struct LinkReader {
    demux: Demux,
    config: ReaderConfig,
}

impl Default for LinkReader {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkReader {
    pub fn new() -> Self {
        Self::with_config(ReaderConfig::default())
    }

    pub fn with_config(config: ReaderConfig) -> Self {
        Self {
            demux: Demux::with_config(config.demux.clone()),
            config,
        }
    }

    /// Run one polling iteration.
    pub fn step<O: Opener, S: EventSink>(&mut self, link: &mut LinkManager<O>, mut sink: S) -> Step {
        if !link.is_open() {
            return Step::Closed;
        }

        let available = match link.bytes_available() {
            Ok(0) => return Step::Idle,
            Ok(n) => n,
            Err(LinkError::NotConnected) => return Step::Closed,
            Err(err) => {
                debug!(error = %err, "availability check failed");
                return Step::Idle;
            }
        };

        let budget = available.min(self.config.max_burst.max(1));
        let mut processed = 0usize;
        while processed < budget {
            match link.read_byte() {
                Ok(byte) => {
                    processed += 1;
                    if let Some(event) = self.demux.process_byte(byte) {
                        sink.on_event(event);
                    }
                }
                Err(err) if err.is_transient() => {
                    debug!(error = %err, "transient read failure");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "read failed");
                    break;
                }
            }
        }

        if processed == 0 {
            Step::Idle
        } else {
            Step::Processed(processed)
        }
    }

    /// Poll until the link is closed or `keep_running` returns false,
    /// sleeping `idle_sleep` whenever nothing was read.
    pub fn run_while<O, S, F>(&mut self, link: &mut LinkManager<O>, mut sink: S, mut keep_running: F)
    where
        O: Opener,
        S: EventSink,
        F: FnMut() -> bool,
    {
        while keep_running() {
            match self.step(link, &mut sink) {
                Step::Closed => return,
                Step::Idle => std::thread::sleep(self.config.idle_sleep),
                Step::Processed(_) => {}
            }
        }
    }

    /// Poll until the link is closed.
    pub fn run_until_closed<O: Opener, S: EventSink>(&mut self, link: &mut LinkManager<O>, sink: S) {
        self.run_while(link, sink, || true);
    }

    /// Drop any partially received line.
    pub fn reset(&mut self) {
        self.demux.reset();
    }

    pub fn demux(&self) -> &Demux {
        &self.demux
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use eimlcap_link::{MemoryOpener, MemoryPort};

    use super::*;
    use crate::demux::{RxEvent, RxState};
    use crate::eiml::{encode_eiml_line, DecodedImage, PixelFormat};
    use crate::image::Image;

    fn open_link(port: &MemoryPort) -> LinkManager<MemoryOpener> {
        let mut link = LinkManager::new(MemoryOpener::new().with_port(port.clone()));
        link.connect(port.name(), 230_400).expect("memory port should open");
        link
    }

    #[test]
    fn closed_link_reports_closed() {
        let port = MemoryPort::new("mem");
        let mut link = LinkManager::new(MemoryOpener::new().with_port(port));
        let mut reader = LinkReader::new();
        let mut events = Vec::new();

        assert_eq!(reader.step(&mut link, &mut events), Step::Closed);
    }

    #[test]
    fn empty_link_is_idle() {
        let port = MemoryPort::new("mem");
        let mut link = open_link(&port);
        let mut reader = LinkReader::new();
        let mut events = Vec::new();

        assert_eq!(reader.step(&mut link, &mut events), Step::Idle);
        assert!(events.is_empty());
    }

    #[test]
    fn step_processes_pending_bytes() {
        let port = MemoryPort::new("mem");
        let mut link = open_link(&port);
        let mut reader = LinkReader::new();
        let mut events = Vec::new();

        port.feed(b"hello\nwor");
        assert_eq!(reader.step(&mut link, &mut events), Step::Processed(9));
        assert_eq!(events, vec![RxEvent::Log("hello".into())]);
        assert_eq!(reader.demux().buffered(), 3);

        port.feed(b"ld\n");
        reader.step(&mut link, &mut events);
        assert_eq!(events.last(), Some(&RxEvent::Log("world".into())));
    }

    #[test]
    fn burst_is_capped() {
        let port = MemoryPort::new("mem");
        let mut link = open_link(&port);
        let mut reader = LinkReader::with_config(ReaderConfig {
            max_burst: 4,
            ..ReaderConfig::default()
        });
        let mut events = Vec::new();

        port.feed(b"0123456789");
        assert_eq!(reader.step(&mut link, &mut events), Step::Processed(4));
        assert_eq!(port.pending(), 6);
    }

    #[test]
    fn transient_read_failure_does_not_lose_state() {
        let port = MemoryPort::new("mem");
        let mut link = open_link(&port);
        let mut reader = LinkReader::new();
        let mut events = Vec::new();

        port.feed(b"/6D/");
        reader.step(&mut link, &mut events);
        assert_eq!(reader.demux().state(), RxState::CapturingEiml);

        port.feed(b"AAAA");
        port.fail_next_read();
        assert_eq!(reader.step(&mut link, &mut events), Step::Idle);
        assert_eq!(reader.demux().state(), RxState::CapturingEiml);

        reader.step(&mut link, &mut events);
        assert_eq!(reader.demux().buffered(), 8);
    }

    #[test]
    fn run_while_delivers_image_then_stops() {
        let port = MemoryPort::new("mem");
        let mut link = open_link(&port);
        let mut reader = LinkReader::new();
        let image = DecodedImage::test_pattern(PixelFormat::Rgb888, 4, 2).unwrap();

        port.feed(b"frame follows\r\n");
        port.feed(&encode_eiml_line(&image));

        let mut events = Vec::new();
        let mut idle_polls = 0;
        reader.run_while(&mut link, &mut events, || {
            if port.pending() == 0 {
                idle_polls += 1;
            }
            idle_polls < 3
        });

        assert_eq!(
            events,
            vec![
                RxEvent::Log("frame follows".into()),
                RxEvent::Image(Image::Raw(image)),
            ]
        );
    }

    #[test]
    fn run_until_closed_returns_when_link_closed() {
        let port = MemoryPort::new("mem");
        let mut link = open_link(&port);
        link.close().unwrap();

        let mut reader = LinkReader::new();
        let mut events = Vec::new();
        reader.run_until_closed(&mut link, &mut events);
        assert!(events.is_empty());
        assert_eq!(port.stale_reads(), 0);
    }
}
