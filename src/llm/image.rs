//! Magic-byte image format sniffing.

/// Minimum number of bytes inspected; shorter inputs are `"unknown"`.
const MIN_SNIFF_LEN: usize = 12;

/// Detect the image format from its leading bytes.
///
/// Signatures are checked in order JPEG, PNG, GIF, BMP, WEBP. Returns the
/// short format name (`"jpeg"`, `"png"`, …) or `"unknown"`.
pub fn detect_format(data: &[u8]) -> &'static str {
    if data.len() < MIN_SNIFF_LEN {
        return "unknown";
    }

    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "jpeg"
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        "png"
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        "gif"
    } else if data.starts_with(&[0x42, 0x4D]) {
        "bmp"
    } else if data.starts_with(b"RIFF") && data[8..].starts_with(b"WEBP") {
        "webp"
    } else {
        "unknown"
    }
}

/// MIME type sent alongside the image bytes, e.g. `image/png`.
pub fn mime_type(data: &[u8]) -> String {
    format!("image/{}", detect_format(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(prefix: &[u8]) -> Vec<u8> {
        let mut v = prefix.to_vec();
        v.resize(16, 0);
        v
    }

    #[test]
    fn detects_known_signatures() {
        assert_eq!(detect_format(&padded(&[0xFF, 0xD8, 0xFF, 0xE0])), "jpeg");
        assert_eq!(detect_format(&padded(b"\x89PNG\r\n\x1a\n")), "png");
        assert_eq!(detect_format(&padded(b"GIF89a")), "gif");
        assert_eq!(detect_format(&padded(b"GIF87a")), "gif");
        assert_eq!(detect_format(&padded(b"BM")), "bmp");
        assert_eq!(detect_format(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "webp");
    }

    #[test]
    fn riff_without_webp_is_unknown() {
        assert_eq!(detect_format(b"RIFF\x00\x00\x00\x00WAVEfmt "), "unknown");
    }

    #[test]
    fn short_input_is_unknown() {
        assert_eq!(detect_format(&[0xFF, 0xD8, 0xFF]), "unknown");
        assert_eq!(detect_format(&[]), "unknown");
    }

    #[test]
    fn mime_prefixes_image() {
        assert_eq!(mime_type(&padded(b"\x89PNG\r\n\x1a\n")), "image/png");
        assert_eq!(mime_type(b"hello"), "image/unknown");
    }
}
