use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use eimlcap_frame::PixelFormat;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod pattern;
pub mod ports;
pub mod replay;
pub mod version;

/// Baud rate the reference firmware uses.
pub const DEFAULT_BAUD: u32 = 230_400;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available serial ports.
    Ports(PortsArgs),
    /// Connect to a serial port and print log lines and images.
    Listen(ListenArgs),
    /// Demultiplex a recorded capture file.
    Replay(ReplayArgs),
    /// Print an EIML test-pattern line.
    Pattern(PatternArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Replay(args) => replay::run(args, format),
        Command::Pattern(args) => pattern::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Serial port name (e.g. /dev/ttyACM0, COM26).
    pub port: String,
    /// Baud rate.
    #[arg(long, short = 'b', default_value_t = DEFAULT_BAUD)]
    pub baud: u32,
    /// How often to check for a new image (e.g. 10ms, 1s).
    #[arg(long, default_value = "10ms")]
    pub refresh: String,
    /// Exit after receiving N images.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Recorded serial capture.
    pub file: PathBuf,
    /// Feed the file this many bytes at a time.
    #[arg(long, default_value_t = 64)]
    pub chunk: usize,
    /// Exit with status 60 if any image frame was dropped.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PixelArg {
    Gray,
    Rgb,
}

impl From<PixelArg> for PixelFormat {
    fn from(arg: PixelArg) -> Self {
        match arg {
            PixelArg::Gray => PixelFormat::Grayscale,
            PixelArg::Rgb => PixelFormat::Rgb888,
        }
    }
}

#[derive(Args, Debug)]
pub struct PatternArgs {
    /// Image width in pixels.
    #[arg(long)]
    pub width: u32,
    /// Image height in pixels.
    #[arg(long)]
    pub height: u32,
    /// Pixel format.
    #[arg(long, value_enum, default_value = "gray")]
    pub pixels: PixelArg,
    /// Number of lines to print.
    #[arg(long, default_value_t = 1)]
    pub count: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `500ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("10ms").unwrap(), Duration::from_millis(10));
        assert_eq!(parse_duration(" 3 ").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert_eq!(parse_duration("0ms").unwrap_err().code, USAGE);
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn pixel_arg_maps_to_pixel_format() {
        assert_eq!(PixelFormat::from(PixelArg::Gray), PixelFormat::Grayscale);
        assert_eq!(PixelFormat::from(PixelArg::Rgb), PixelFormat::Rgb888);
    }
}
