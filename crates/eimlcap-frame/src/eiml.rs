//! EIML raw image frames.
//!
//! Wire format (before base64):
//! ```text
//! ┌────────────────┬──────────┬───────────┬───────────┬──────────────────────────┐
//! │ SOF (3B)       │ Format   │ Width     │ Height    │ Pixels                   │
//! │ 0xFF 0xA0 0xFF │ (1B)     │ (4B LE)   │ (4B LE)   │ width*height*channels B  │
//! └────────────────┴──────────┴───────────┴───────────┴──────────────────────────┘
//! ```
//! Pixels are row-major with no padding. Format 0 is reserved, 1 is 8-bit
//! grayscale, 2 is RGB888.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, Result};

/// EIML start-of-frame marker.
pub const EIML_SOF: [u8; 3] = [0xFF, 0xA0, 0xFF];

/// Header size: SOF (3) + format (1) + width (4) + height (4).
pub const EIML_HEADER_SIZE: usize = 12;

pub(crate) const FORMAT_OFFSET: usize = 3;
pub(crate) const WIDTH_OFFSET: usize = 4;
pub(crate) const HEIGHT_OFFSET: usize = 8;

/// Reserved format byte; never a valid frame.
pub const FORMAT_RESERVED: u8 = 0;

/// Pixel layouts an EIML frame can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// One byte per pixel.
    Grayscale,
    /// Three bytes per pixel, R then G then B.
    Rgb888,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub const fn channels(self) -> usize {
        match self {
            PixelFormat::Grayscale => 1,
            PixelFormat::Rgb888 => 3,
        }
    }

    /// Parse a header format byte. Reserved and unknown values yield `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(PixelFormat::Grayscale),
            2 => Some(PixelFormat::Rgb888),
            _ => None,
        }
    }

    /// Header format byte.
    pub const fn as_byte(self) -> u8 {
        match self {
            PixelFormat::Grayscale => 1,
            PixelFormat::Rgb888 => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Grayscale => "grayscale",
            PixelFormat::Rgb888 => "rgb888",
        }
    }
}

/// The fixed 12-byte EIML header.
///
/// `format` is kept as the raw byte so a header with an unknown format can
/// still be parsed and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EimlHeader {
    pub format: u8,
    pub width: u32,
    pub height: u32,
}

impl EimlHeader {
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            format: format.as_byte(),
            width,
            height,
        }
    }

    /// Parse the header from the start of a decoded payload.
    pub fn parse(src: &[u8]) -> Result<Self> {
        if src.len() < EIML_HEADER_SIZE {
            return Err(DecodeError::TruncatedHeader { len: src.len() });
        }
        if src[..FORMAT_OFFSET] != EIML_SOF {
            return Err(DecodeError::BadSignature {
                found: [src[0], src[1], src[2]],
            });
        }

        let format = src[FORMAT_OFFSET];
        let width = u32::from_le_bytes([
            src[WIDTH_OFFSET],
            src[WIDTH_OFFSET + 1],
            src[WIDTH_OFFSET + 2],
            src[WIDTH_OFFSET + 3],
        ]);
        let height = u32::from_le_bytes([
            src[HEIGHT_OFFSET],
            src[HEIGHT_OFFSET + 1],
            src[HEIGHT_OFFSET + 2],
            src[HEIGHT_OFFSET + 3],
        ]);

        Ok(Self {
            format,
            width,
            height,
        })
    }

    /// Append the 12 header bytes to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(EIML_HEADER_SIZE);
        dst.put_slice(&EIML_SOF);
        dst.put_u8(self.format);
        dst.put_u32_le(self.width);
        dst.put_u32_le(self.height);
    }

    /// The pixel format, if the format byte is a supported one.
    pub fn pixel_format(&self) -> Result<PixelFormat> {
        PixelFormat::from_byte(self.format).ok_or(DecodeError::UnsupportedFormat {
            format: self.format,
        })
    }

    /// Payload size the header declares.
    pub fn payload_len(&self) -> Result<usize> {
        let format = self.pixel_format()?;
        pixel_count(self.width, self.height)
            .and_then(|pixels| pixels.checked_mul(format.channels()))
            .ok_or(DecodeError::DimensionsOverflow {
                width: self.width,
                height: self.height,
            })
    }
}

fn pixel_count(width: u32, height: u32) -> Option<usize> {
    usize::try_from(width)
        .ok()?
        .checked_mul(usize::try_from(height).ok()?)
}

/// A raw image: dimensions, pixel format and exactly
/// `width * height * channels` pixel bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    format: PixelFormat,
    width: u32,
    height: u32,
    pixels: Bytes,
}

impl DecodedImage {
    /// Build an image, checking the pixel buffer length.
    pub fn new(format: PixelFormat, width: u32, height: u32, pixels: impl Into<Bytes>) -> Result<Self> {
        let pixels = pixels.into();
        let expected = EimlHeader::new(format, width, height).payload_len()?;
        if pixels.len() != expected {
            return Err(DecodeError::PayloadMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            format,
            width,
            height,
            pixels,
        })
    }

    /// A diagonal gradient, handy for exercising a display pipeline.
    pub fn test_pattern(format: PixelFormat, width: u32, height: u32) -> Result<Self> {
        let len = EimlHeader::new(format, width, height).payload_len()?;
        let mut pixels = Vec::with_capacity(len);
        for y in 0..height {
            for x in 0..width {
                let level = (x.wrapping_add(y).wrapping_mul(8) & 0xFF) as u8;
                match format {
                    PixelFormat::Grayscale => pixels.push(level),
                    PixelFormat::Rgb888 => {
                        pixels.extend_from_slice(&[level, 0xFF - level, (x & 0xFF) as u8])
                    }
                }
            }
        }
        Self::new(format, width, height, pixels)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &Bytes {
        &self.pixels
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    pub fn header(&self) -> EimlHeader {
        EimlHeader::new(self.format, self.width, self.height)
    }
}

/// Decode a complete (already base64-decoded) EIML payload.
pub fn decode_eiml(payload: Bytes) -> Result<DecodedImage> {
    let header = EimlHeader::parse(&payload)?;
    let format = header.pixel_format()?;
    let expected = header.payload_len()?;
    let actual = payload.len() - EIML_HEADER_SIZE;
    if actual != expected {
        return Err(DecodeError::PayloadMismatch { expected, actual });
    }

    Ok(DecodedImage {
        format,
        width: header.width,
        height: header.height,
        pixels: payload.slice(EIML_HEADER_SIZE..),
    })
}

/// Append the EIML encoding of `image` to `dst`.
pub fn encode_eiml(image: &DecodedImage, dst: &mut BytesMut) {
    dst.reserve(EIML_HEADER_SIZE + image.pixels.len());
    image.header().encode(dst);
    dst.put_slice(&image.pixels);
}

/// Encode `image` the way a device sends it: base64 EIML followed by CR LF.
pub fn encode_eiml_line(image: &DecodedImage) -> Vec<u8> {
    let mut raw = BytesMut::new();
    encode_eiml(image, &mut raw);
    let mut line = STANDARD.encode(&raw).into_bytes();
    line.extend_from_slice(b"\r\n");
    line
}
