//! Capture from a serial port and poll for images on a display timer.
//!
//! Run with:
//!   cargo run --example capture-port -- /dev/ttyACM0 230400
//!
//! With no arguments, lists the available ports and exits.

use std::thread;
use std::time::{Duration, Instant};

use eimlcap::capture::CaptureBuilder;
use eimlcap::frame::{Image, RxEvent};
use eimlcap::link::available_ports;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let Some(port) = args.next() else {
        for info in available_ports()? {
            eprintln!("{} ({})", info.name, info.kind);
        }
        return Ok(());
    };
    let baud = args.next().map(|b| b.parse()).transpose()?.unwrap_or(230_400);

    let capture = CaptureBuilder::serial()
        .with_subscriber(|event| {
            if let RxEvent::Log(line) = event {
                println!("{line}");
            }
        })
        .spawn()?;
    capture.connect(&port, baud)?;

    // Stand-in for a GUI refresh timer.
    let deadline = Instant::now() + Duration::from_secs(30);
    while Instant::now() < deadline {
        match capture.try_take_image() {
            Some(Image::Raw(image)) => eprintln!(
                "{} frame {}x{}",
                image.format().name(),
                image.width(),
                image.height()
            ),
            Some(Image::Encoded(jpeg)) => eprintln!(
                "jpeg frame {}x{}, {} bytes",
                jpeg.width(),
                jpeg.height(),
                jpeg.bytes().len()
            ),
            None => {}
        }
        thread::sleep(Duration::from_millis(10));
    }

    capture.close()?;
    Ok(())
}
