use std::fs;

use eimlcap_frame::{EventSink, FnSink, LinkReader, RxEvent, Step};
use eimlcap_link::{LinkManager, MemoryOpener, MemoryPort};
use tracing::{debug, warn};

use crate::cmd::{ReplayArgs, DEFAULT_BAUD};
use crate::exit::{io_error, link_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_event, OutputFormat};

const REPLAY_PORT: &str = "replay";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ReplaySummary {
    logs: usize,
    images: usize,
    dropped: usize,
}

impl ReplaySummary {
    fn record(&mut self, event: &RxEvent) {
        match event {
            RxEvent::Log(_) => self.logs += 1,
            RxEvent::Image(_) => self.images += 1,
            RxEvent::Dropped(_) => self.dropped += 1,
        }
    }
}

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    if args.chunk == 0 {
        return Err(CliError::new(USAGE, "--chunk must be greater than zero"));
    }

    let data = fs::read(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;

    let mut summary = ReplaySummary::default();
    replay(&data, args.chunk, FnSink(|event: RxEvent| {
        summary.record(&event);
        print_event(&event, format);
    }))?;

    debug!(
        logs = summary.logs,
        images = summary.images,
        dropped = summary.dropped,
        "replay finished"
    );

    if args.strict && summary.dropped > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{} image frame(s) dropped", summary.dropped),
        ));
    }
    Ok(SUCCESS)
}

/// Push `data` through a memory port `chunk` bytes at a time, the same way
/// a live link delivers it.
fn replay<S: EventSink>(data: &[u8], chunk: usize, mut sink: S) -> CliResult<()> {
    let port = MemoryPort::new(REPLAY_PORT);
    let mut link = LinkManager::new(MemoryOpener::new().with_port(port.clone()));
    link.connect(REPLAY_PORT, DEFAULT_BAUD)
        .map_err(|err| link_error("replay port failed", err))?;

    let mut reader = LinkReader::new();
    for piece in data.chunks(chunk) {
        port.feed(piece);
        while let Step::Processed(_) = reader.step(&mut link, &mut sink) {}
    }

    if reader.demux().buffered() > 0 {
        warn!(
            bytes = reader.demux().buffered(),
            "capture ends mid-line; trailing bytes discarded"
        );
    }

    link.close()
        .map_err(|err| link_error("replay port failed", err))
}

#[cfg(test)]
mod tests {
    use eimlcap_frame::{encode_eiml_line, DecodedImage, Image, PixelFormat};

    use super::*;

    fn capture_bytes() -> Vec<u8> {
        let image = DecodedImage::test_pattern(PixelFormat::Grayscale, 3, 2).unwrap();
        let mut data = b"boot\r\n".to_vec();
        data.extend_from_slice(&encode_eiml_line(&image));
        data.extend_from_slice(b"done\r\n");
        data
    }

    #[test]
    fn chunk_size_does_not_change_events() {
        let data = capture_bytes();
        let mut whole = Vec::new();
        replay(&data, data.len(), &mut whole).unwrap();

        for chunk in [1, 3, 64] {
            let mut pieces = Vec::new();
            replay(&data, chunk, &mut pieces).unwrap();
            assert_eq!(pieces, whole, "chunk size {chunk}");
        }

        assert_eq!(whole.len(), 3);
        assert!(matches!(whole[1], RxEvent::Image(Image::Raw(_))));
    }

    #[test]
    fn trailing_partial_line_is_not_emitted() {
        let mut events = Vec::new();
        replay(b"first\nsecond", 4, &mut events).unwrap();
        assert_eq!(events, vec![RxEvent::Log("first".into())]);
    }

    #[test]
    fn summary_counts_each_kind() {
        let mut data = capture_bytes();
        data.extend_from_slice(b"/6D/!!!!\r\n");

        let mut summary = ReplaySummary::default();
        replay(&data, 16, FnSink(|event: RxEvent| summary.record(&event))).unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                logs: 2,
                images: 1,
                dropped: 1
            }
        );
    }
}
