//! Base64 frame signatures.
//!
//! Three raw bytes encode to exactly four base64 characters, so the first
//! four characters of an image line depend only on its 3-byte marker. The
//! demultiplexer compares these raw characters; it never decodes a partial
//! line to find out what it is.

/// Number of base64 characters compared when sniffing.
pub const SIGNATURE_LEN: usize = 4;

/// `FF D8 FF` (JPEG start of image) in base64.
pub const JPEG_SIGNATURE_B64: &[u8; SIGNATURE_LEN] = b"/9j/";

/// `FF A0 FF` (EIML start of frame) in base64.
pub const EIML_SIGNATURE_B64: &[u8; SIGNATURE_LEN] = b"/6D/";

/// Image line encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Jpeg,
    Eiml,
}

impl FrameKind {
    /// Match the first four characters of a line against the known signatures.
    pub fn sniff(prefix: &[u8]) -> Option<Self> {
        if prefix == JPEG_SIGNATURE_B64 {
            Some(FrameKind::Jpeg)
        } else if prefix == EIML_SIGNATURE_B64 {
            Some(FrameKind::Eiml)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FrameKind::Jpeg => "jpeg",
            FrameKind::Eiml => "eiml",
        }
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    use super::*;
    use crate::eiml::EIML_SOF;

    #[test]
    fn signatures_are_base64_of_markers() {
        assert_eq!(STANDARD.encode([0xFF, 0xD8, 0xFF]).as_bytes(), JPEG_SIGNATURE_B64);
        assert_eq!(STANDARD.encode(EIML_SOF).as_bytes(), EIML_SIGNATURE_B64);
    }

    #[test]
    fn sniff_matches_only_exact_prefixes() {
        assert_eq!(FrameKind::sniff(b"/9j/"), Some(FrameKind::Jpeg));
        assert_eq!(FrameKind::sniff(b"/6D/"), Some(FrameKind::Eiml));
        assert_eq!(FrameKind::sniff(b"/9j"), None);
        assert_eq!(FrameKind::sniff(b"/9j/4"), None);
        assert_eq!(FrameKind::sniff(b"boot"), None);
    }
}
