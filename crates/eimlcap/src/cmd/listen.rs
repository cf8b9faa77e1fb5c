use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use eimlcap_capture::CaptureBuilder;
use eimlcap_frame::RxEvent;
use tracing::{info, warn};

use crate::cmd::{parse_duration, ListenArgs};
use crate::exit::{capture_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_event, print_image, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let refresh = parse_duration(&args.refresh)?;

    // Log lines and drops print from the producer thread as they arrive;
    // images are picked up from the mailbox on the refresh timer.
    let capture = CaptureBuilder::serial()
        .with_subscriber(move |event| {
            if !matches!(event, RxEvent::Image(_)) {
                print_event(event, format);
            }
        })
        .spawn()
        .map_err(|err| capture_error("capture start failed", err))?;

    capture
        .connect(&args.port, args.baud)
        .map_err(|err| capture_error("connect failed", err))?;
    info!(port = %args.port, baud = args.baud, "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut taken = 0usize;
    while running.load(Ordering::SeqCst) {
        if let Some(image) = capture.try_take_image() {
            print_image(&image, format);
            taken = taken.saturating_add(1);

            if args.count.is_some_and(|count| taken >= count) {
                break;
            }
        }
        thread::sleep(refresh);
    }

    if let Err(err) = capture.close() {
        warn!(error = %err, "close failed");
    }
    info!(images = taken, "stopped");
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
