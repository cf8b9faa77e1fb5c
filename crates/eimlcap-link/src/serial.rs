use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{LinkError, Result};
use crate::manager::LinkSettings;
use crate::stream::{LinkStream, Opener};

/// Opens OS serial ports (8N1, no flow control).
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl Opener for SerialOpener {
    fn open(&mut self, settings: &LinkSettings) -> Result<LinkStream> {
        let port = serialport::new(settings.port.as_str(), settings.baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|source| LinkError::Open {
                port: settings.port.clone(),
                source,
            })?;

        info!(port = %settings.port, baud = settings.baud, "opened serial port");
        Ok(LinkStream::from_serial(port))
    }
}

/// A serial port discovered on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// OS name of the port (`/dev/ttyACM0`, `COM26`, ...).
    pub name: String,
    /// Port type: `usb`, `pci`, `bluetooth` or `unknown`.
    pub kind: &'static str,
    /// Human-readable description, when the OS reports one.
    pub description: Option<String>,
}

/// List the serial ports available on this machine, sorted by name.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .map_err(LinkError::Enumerate)?
        .into_iter()
        .map(|port| {
            let (kind, description) = describe(&port.port_type);
            PortInfo {
                name: port.port_name,
                kind,
                description,
            }
        })
        .collect();
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(count = ports.len(), "enumerated serial ports");
    Ok(ports)
}

fn describe(port_type: &SerialPortType) -> (&'static str, Option<String>) {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let mut parts = Vec::new();
            if let Some(manufacturer) = &usb.manufacturer {
                parts.push(manufacturer.clone());
            }
            if let Some(product) = &usb.product {
                parts.push(product.clone());
            }
            parts.push(format!("[{:04x}:{:04x}]", usb.vid, usb.pid));
            ("usb", Some(parts.join(" ")))
        }
        SerialPortType::PciPort => ("pci", None),
        SerialPortType::BluetoothPort => ("bluetooth", None),
        SerialPortType::Unknown => ("unknown", None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_usb_ports_have_no_description() {
        assert_eq!(describe(&SerialPortType::PciPort), ("pci", None));
        assert_eq!(describe(&SerialPortType::BluetoothPort), ("bluetooth", None));
        assert_eq!(describe(&SerialPortType::Unknown), ("unknown", None));
    }

    #[test]
    fn opening_missing_port_reports_open_error() {
        let settings = LinkSettings::new("/dev/eimlcap-does-not-exist", 115_200);
        let err = SerialOpener.open(&settings).unwrap_err();
        match err {
            LinkError::Open { port, .. } => assert_eq!(port, "/dev/eimlcap-does-not-exist"),
            other => panic!("expected open error, got {other:?}"),
        }
    }
}
