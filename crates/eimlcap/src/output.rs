use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use eimlcap_frame::{Image, RxEvent};
use eimlcap_link::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize, Default)]
struct EventOutput<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<usize>,
    timestamp: String,
}

impl<'a> EventOutput<'a> {
    fn from_event(event: &'a RxEvent) -> Self {
        match event {
            RxEvent::Log(line) => Self {
                event: "log",
                line: Some(line),
                timestamp: now_unix_seconds(),
                ..Self::default()
            },
            RxEvent::Image(image) => Self::from_image(image),
            RxEvent::Dropped(err) => Self {
                event: "dropped",
                error: Some(err.to_string()),
                offset: Some(err.offset()),
                timestamp: now_unix_seconds(),
                ..Self::default()
            },
        }
    }

    fn from_image(image: &'a Image) -> Self {
        let (width, height) = image.dimensions();
        Self {
            event: "image",
            kind: Some(image.kind()),
            width: Some(width),
            height: Some(height),
            size: Some(image.byte_len()),
            timestamp: now_unix_seconds(),
            ..Self::default()
        }
    }
}

/// Print one demultiplexer event.
pub fn print_event(event: &RxEvent, format: OutputFormat) {
    match (event, format) {
        (RxEvent::Image(image), _) => print_image(image, format),
        (_, OutputFormat::Json) => print_json(&EventOutput::from_event(event)),
        (_, OutputFormat::Table) => {
            let mut table = event_table();
            table.add_row(event_row(&EventOutput::from_event(event)));
            println!("{table}");
        }
        (RxEvent::Log(line), OutputFormat::Pretty) => println!("log: {line}"),
        (RxEvent::Dropped(err), OutputFormat::Pretty) => {
            println!("dropped: offset={} {err}", err.offset());
        }
        (RxEvent::Log(line), OutputFormat::Raw) => {
            print_raw(line.as_bytes());
            print_raw(b"\n");
        }
        // Raw output is device data only.
        (RxEvent::Dropped(_), OutputFormat::Raw) => {}
    }
}

/// Print a summary of one image; raw output writes the image bytes.
pub fn print_image(image: &Image, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EventOutput::from_image(image)),
        OutputFormat::Table => {
            let mut table = event_table();
            table.add_row(event_row(&EventOutput::from_image(image)));
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let (width, height) = image.dimensions();
            println!(
                "image: {} {width}x{height} size={}",
                image.kind(),
                image.byte_len()
            );
        }
        OutputFormat::Raw => match image {
            Image::Encoded(encoded) => print_raw(encoded.bytes()),
            Image::Raw(decoded) => print_raw(decoded.pixels()),
        },
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    description: Option<&'a str>,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|port| PortOutput {
                    name: &port.name,
                    kind: port.kind,
                    description: port.description.as_deref(),
                })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "TYPE", "DESCRIPTION"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    port.kind.to_string(),
                    port.description.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if ports.is_empty() {
                println!("no serial ports found");
            }
            for port in ports {
                match &port.description {
                    Some(description) => {
                        println!("{} ({}) {description}", port.name, port.kind)
                    }
                    None => println!("{} ({})", port.name, port.kind),
                }
            }
        }
        OutputFormat::Raw => {
            for port in ports {
                println!("{}", port.name);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn event_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["EVENT", "DETAIL"]);
    table
}

fn event_row(out: &EventOutput<'_>) -> Vec<String> {
    let detail = match out.event {
        "log" => out.line.unwrap_or_default().to_string(),
        "image" => match (out.width, out.height) {
            (Some(w), Some(h)) => format!(
                "{} {w}x{h} ({} bytes)",
                out.kind.unwrap_or_default(),
                out.size.unwrap_or_default()
            ),
            _ => format!(
                "{} ({} bytes)",
                out.kind.unwrap_or_default(),
                out.size.unwrap_or_default()
            ),
        },
        _ => format!(
            "offset {}: {}",
            out.offset.unwrap_or_default(),
            out.error.as_deref().unwrap_or_default()
        ),
    };
    vec![out.event.to_string(), detail]
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use eimlcap_frame::{DecodeError, DecodedImage, EncodedImage, PixelFormat};

    use super::*;

    #[test]
    fn log_event_serializes_only_its_fields() {
        let event = RxEvent::Log("boot ok".into());
        let value = serde_json::to_value(EventOutput::from_event(&event)).unwrap();

        assert_eq!(value["event"], "log");
        assert_eq!(value["line"], "boot ok");
        assert!(value.get("kind").is_none());
        assert!(value.get("offset").is_none());
    }

    #[test]
    fn raw_image_reports_dimensions() {
        let image = DecodedImage::test_pattern(PixelFormat::Rgb888, 4, 3).unwrap();
        let event = RxEvent::Image(Image::Raw(image));
        let value = serde_json::to_value(EventOutput::from_event(&event)).unwrap();

        assert_eq!(value["kind"], "rgb888");
        assert_eq!(value["width"], 4);
        assert_eq!(value["height"], 3);
        assert_eq!(value["size"], 36);
    }

    #[test]
    fn jpeg_reports_header_dimensions() {
        let bytes = include_bytes!("../../eimlcap-frame/testdata/gray-16x8.jpg").to_vec();
        let image = Image::Encoded(EncodedImage::jpeg(bytes).unwrap());
        let out = EventOutput::from_image(&image);

        assert_eq!(out.kind, Some("jpeg"));
        assert_eq!((out.width, out.height), (Some(16), Some(8)));
        assert_eq!(
            event_row(&out),
            vec!["image".to_string(), "jpeg 16x8 (141 bytes)".to_string()]
        );
    }

    #[test]
    fn dropped_event_carries_offset() {
        let event = RxEvent::Dropped(DecodeError::UnsupportedFormat { format: 3 });
        let out = EventOutput::from_event(&event);

        assert_eq!(out.event, "dropped");
        assert_eq!(out.offset, Some(3));
        assert!(event_row(&out)[1].starts_with("offset 3: "));
    }
}
