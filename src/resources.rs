//! Loading of `<img src>` resources.
//!
//! Three forms are understood: base64 `data:` URIs, `file://` URIs (percent
//! encoded, as produced for the header image), and plain filesystem paths
//! relative to the working directory.

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

/// Read the raw bytes behind an image `src`.
pub fn load_image_bytes(src: &str) -> Result<Vec<u8>, String> {
    let src = src.trim();
    if src.is_empty() {
        return Err("empty image src".to_string());
    }
    if src.starts_with("data:") {
        return parse_data_uri(src);
    }
    let path = source_path(src)?;
    std::fs::read(&path).map_err(|e| format!("cannot read {}: {e}", path.display()))
}

/// Pixel dimensions of an encoded image.
pub fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let img = ::image::load_from_memory(bytes).ok()?;
    Some((img.width(), img.height()))
}

/// Filesystem path for a `file://` URI or a plain path.
pub fn source_path(src: &str) -> Result<PathBuf, String> {
    match src.strip_prefix("file://") {
        Some(rest) => {
            // Tolerate `file://localhost/…`.
            let rest = rest.strip_prefix("localhost").unwrap_or(rest);
            let decoded = urlencoding::decode(rest)
                .map_err(|e| format!("invalid file URI {src:?}: {e}"))?;
            Ok(PathBuf::from(decoded.into_owned()))
        }
        None if src.contains("://") => Err(format!("unsupported image URI scheme: {src:?}")),
        None => Ok(PathBuf::from(src)),
    }
}

/// Parse a `data:<mime>;base64,<data>` URI and return the decoded bytes.
fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = &src["data:".len()..];
    let comma = rest
        .find(',')
        .ok_or_else(|| "invalid data URI: missing `,` separator".to_string())?;
    let header = &rest[..comma];
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    let b64: String = rest[comma + 1..]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    BASE64_STD
        .decode(b64)
        .map_err(|e| format!("base64 decode error: {e}"))
}
