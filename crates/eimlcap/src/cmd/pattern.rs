use eimlcap_frame::{encode_eiml_line, DecodedImage, EimlHeader, PixelFormat};

use crate::cmd::PatternArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::print_raw;

/// Largest pixel payload `pattern` will build.
pub const MAX_PATTERN_BYTES: usize = 16 * 1024 * 1024;

pub fn run(args: PatternArgs) -> CliResult<i32> {
    let format = PixelFormat::from(args.pixels);
    check_size(format, args.width, args.height)?;

    let image = DecodedImage::test_pattern(format, args.width, args.height)
        .map_err(|err| CliError::new(USAGE, format!("invalid pattern size: {err}")))?;

    let line = encode_eiml_line(&image);
    for _ in 0..args.count {
        print_raw(&line);
    }
    Ok(SUCCESS)
}

fn check_size(format: PixelFormat, width: u32, height: u32) -> CliResult<()> {
    let len = EimlHeader::new(format, width, height)
        .payload_len()
        .map_err(|err| CliError::new(USAGE, format!("invalid pattern size: {err}")))?;
    if len > MAX_PATTERN_BYTES {
        return Err(CliError::new(
            USAGE,
            format!("pattern too large: {len} bytes of pixels (max {MAX_PATTERN_BYTES})"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_limit_is_checked_before_allocating() {
        let err = check_size(PixelFormat::Rgb888, 100_000, 100_000).unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(err.message.contains("too large"));
    }

    #[test]
    fn sizes_up_to_the_limit_are_allowed() {
        assert!(check_size(PixelFormat::Grayscale, 4096, 4096).is_ok());
        assert!(check_size(PixelFormat::Grayscale, 4097, 4096).is_err());
        assert!(check_size(PixelFormat::Rgb888, 640, 480).is_ok());
    }
}
