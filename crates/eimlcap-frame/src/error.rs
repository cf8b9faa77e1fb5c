/// Reasons an image line is dropped.
///
/// Offsets index the CRLF-stripped base64 text for encoding errors and the
/// decoded bytes for JPEG and EIML errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The line is not valid standard (padded) base64.
    #[error("invalid base64: {source}")]
    InvalidBase64 { source: base64::DecodeError },

    /// The image line did not end with `\r\n`.
    #[error("image line of {len} bytes does not end with CR LF")]
    MissingCrlf { len: usize },

    /// Fewer than 12 decoded bytes, so no complete EIML header.
    #[error("truncated EIML header ({len} of 12 bytes)")]
    TruncatedHeader { len: usize },

    /// The decoded payload does not start with `FF A0 FF`.
    #[error("bad EIML signature {found:02x?}")]
    BadSignature { found: [u8; 3] },

    /// The format byte is reserved or unknown.
    #[error("unsupported EIML pixel format {format}")]
    UnsupportedFormat { format: u8 },

    /// Declared dimensions do not fit in memory.
    #[error("EIML dimensions {width}x{height} overflow")]
    DimensionsOverflow { width: u32, height: u32 },

    /// Pixel payload length disagrees with the header.
    #[error("EIML payload is {actual} bytes, header declares {expected}")]
    PayloadMismatch { expected: usize, actual: usize },

    /// A JPEG line decoded from base64 but its markers do not parse.
    #[error("malformed JPEG at byte {offset}: {reason}")]
    MalformedImage { offset: usize, reason: String },

    /// The line grew past the configured limit before a newline arrived.
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

impl DecodeError {
    /// Byte offset at which decoding stopped.
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::InvalidBase64 { source } => match source {
                base64::DecodeError::InvalidByte(offset, _)
                | base64::DecodeError::InvalidLastSymbol(offset, _) => *offset,
                base64::DecodeError::InvalidLength(len) => *len,
                base64::DecodeError::InvalidPadding => 0,
            },
            DecodeError::MissingCrlf { len } => *len,
            DecodeError::TruncatedHeader { len } => *len,
            DecodeError::BadSignature { .. } => 0,
            DecodeError::UnsupportedFormat { .. } => crate::eiml::FORMAT_OFFSET,
            DecodeError::DimensionsOverflow { .. } => crate::eiml::WIDTH_OFFSET,
            DecodeError::PayloadMismatch { .. } => crate::eiml::EIML_HEADER_SIZE,
            DecodeError::MalformedImage { offset, .. } => *offset,
            DecodeError::LineTooLong { limit } => *limit,
        }
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
