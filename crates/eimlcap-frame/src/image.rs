use std::io::Cursor;

use bytes::Bytes;
use jpeg_decoder::Decoder;

use crate::eiml::DecodedImage;
use crate::error::{DecodeError, Result};

/// A JPEG whose headers have been checked, with the pixel data left encoded.
///
/// Only the markers up to the frame header are parsed; decoding the scan
/// is left to whatever codec the consumer uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Bytes,
    width: u32,
    height: u32,
}

impl EncodedImage {
    /// Parse the JPEG headers in `bytes`.
    ///
    /// Fails with [`DecodeError::MalformedImage`] when the markers do not
    /// parse or no frame header is found.
    pub fn jpeg(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        let mut cursor = Cursor::new(bytes.as_ref());

        let parsed = {
            let mut decoder = Decoder::new(&mut cursor);
            decoder.read_info().map(|()| decoder.info())
        };
        let offset = usize::try_from(cursor.position()).unwrap_or(usize::MAX);

        let info = match parsed {
            Ok(Some(info)) => info,
            Ok(None) => {
                return Err(DecodeError::MalformedImage {
                    offset,
                    reason: "no frame header".to_string(),
                })
            }
            Err(err) => {
                return Err(DecodeError::MalformedImage {
                    offset,
                    reason: err.to_string(),
                })
            }
        };

        Ok(Self {
            width: u32::from(info.width),
            height: u32::from(info.height),
            bytes,
        })
    }

    /// The encoded file bytes, starting with `FF D8 FF`.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        "jpg"
    }
}

/// An image handed from the demultiplexer to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Image {
    /// A JPEG frame.
    Encoded(EncodedImage),
    /// An EIML frame, already decoded to pixels.
    Raw(DecodedImage),
}

impl Image {
    /// Short label: `jpeg`, `grayscale` or `rgb888`.
    pub fn kind(&self) -> &'static str {
        match self {
            Image::Encoded(_) => "jpeg",
            Image::Raw(image) => image.format().name(),
        }
    }

    /// Width and height in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Image::Encoded(image) => (image.width(), image.height()),
            Image::Raw(image) => (image.width(), image.height()),
        }
    }

    /// Size of the carried data in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            Image::Encoded(image) => image.bytes().len(),
            Image::Raw(image) => image.pixels().len(),
        }
    }
}

impl From<DecodedImage> for Image {
    fn from(image: DecodedImage) -> Self {
        Image::Raw(image)
    }
}

impl From<EncodedImage> for Image {
    fn from(image: EncodedImage) -> Self {
        Image::Encoded(image)
    }
}
