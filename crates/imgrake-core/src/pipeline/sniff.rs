//! Magic-byte sniffing for downloaded bodies.
//!
//! Used to name downloads by their real format and to drop bodies that are
//! plainly not images (HTML error pages, empty responses) before they hit disk.

/// Identify an image format from its leading bytes and return its file extension.
pub fn sniff_extension(header: &[u8]) -> Option<&'static str> {
    if header.len() < 4 {
        return None;
    }

    // JPEG: FF D8 FF
    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpg");
    }

    // PNG: 89 50 4E 47
    if header.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some("png");
    }

    // GIF: GIF8
    if header.starts_with(b"GIF8") {
        return Some("gif");
    }

    // WebP: RIFF....WEBP
    if header.starts_with(b"RIFF") {
        if header.len() >= 12 {
            return (&header[8..12] == b"WEBP").then_some("webp");
        }
        // Truncated header; let the decoder decide
        return Some("webp");
    }

    // BMP: BM
    if header.starts_with(b"BM") {
        return Some("bmp");
    }

    // TIFF: II (little-endian) or MM (big-endian) followed by version 42
    if header.starts_with(&[b'I', b'I', 0x2A, 0x00]) || header.starts_with(&[b'M', b'M', 0x00, 0x2A])
    {
        return Some("tiff");
    }

    // AVIF/HEIF: ftyp box at offset 4
    if header.len() >= 12 && &header[4..8] == b"ftyp" {
        return Some("avif");
    }

    None
}

/// Extension for an `image/*` content type, if it is one we recognize.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/bmp" => Some("bmp"),
        "image/tiff" => Some("tiff"),
        "image/avif" => Some("avif"),
        _ => None,
    }
}
