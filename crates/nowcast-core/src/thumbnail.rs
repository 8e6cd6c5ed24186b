//! Album-art sniffing and inline `data:` URL encoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_PREFIX: &[u8] = &[0xFF, 0xD8, 0xFF];
const GIF_PREFIX: &[u8] = b"GIF";

/// Image formats recognised by their magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    Png,
    Jpeg,
    Gif,
    /// Anything unrecognised, including empty input.
    Binary,
}

impl ImageMime {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Binary => "application/octet-stream",
        }
    }
}

/// Sniff the image format from the leading bytes. Never fails.
pub fn detect(bytes: &[u8]) -> ImageMime {
    if bytes.starts_with(PNG_SIGNATURE) {
        ImageMime::Png
    } else if bytes.starts_with(JPEG_PREFIX) {
        ImageMime::Jpeg
    } else if bytes.starts_with(GIF_PREFIX) {
        ImageMime::Gif
    } else {
        ImageMime::Binary
    }
}

/// Build `data:<mime>;base64,<payload>` for the given bytes.
pub fn encode(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", detect(bytes).as_str(), STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_png() {
        let bytes = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];
        assert_eq!(detect(&bytes), ImageMime::Png);
    }

    #[test]
    fn test_detect_truncated_png_is_binary() {
        assert_eq!(detect(&[0x89, 0x50, 0x4E, 0x47]), ImageMime::Binary);
    }

    #[test]
    fn test_detect_jpeg() {
        assert_eq!(detect(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), ImageMime::Jpeg);
    }

    #[test]
    fn test_detect_gif() {
        assert_eq!(detect(b"GIF89a\x01\x00"), ImageMime::Gif);
    }

    #[test]
    fn test_detect_unknown_and_empty() {
        assert_eq!(detect(&[]), ImageMime::Binary);
        assert_eq!(detect(b"RIFF\0\0\0\0WEBP"), ImageMime::Binary);
        assert_eq!(detect(&[0xFF, 0xD8]), ImageMime::Binary);
    }

    #[test]
    fn test_encode_data_url() {
        assert_eq!(encode(b"GIF"), "data:image/gif;base64,R0lG");
        assert_eq!(encode(&[]), "data:application/octet-stream;base64,");
    }
}
