//! Emoji image checks: SVG must be well-formed XML, everything else must
//! decode as a raster image header.

use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use thiserror::Error;

pub const SVG_MIME: &str = "image/svg+xml";

/// Raster dimensions sit in the leading segments; this prefix covers them
/// even behind large metadata blocks.
pub const RASTER_HEADER_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("error reading image: {0}")]
    Io(#[from] std::io::Error),

    #[error("SVG image is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid SVG image: {0}")]
    Svg(#[from] roxmltree::Error),

    #[error("unable to decode image: {0}")]
    Raster(#[from] image::ImageError),
}

/// Maps the file extension (case-insensitive) to a MIME type.
pub fn mime_type_for(path: &str) -> &'static str {
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => SVG_MIME,
        Some("bmp") => "image/bmp",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// How much of an image `probe_image` needs. SVG is parsed whole.
pub fn read_limit(path: &str) -> Option<u64> {
    if mime_type_for(path) == SVG_MIME {
        None
    } else {
        Some(RASTER_HEADER_BYTES)
    }
}

pub fn probe_image(path: &str, bytes: &[u8]) -> Result<(), ProbeError> {
    let mime = mime_type_for(path);
    if mime == SVG_MIME {
        let text = std::str::from_utf8(bytes)?;
        let opts = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        roxmltree::Document::parse_with_options(text, opts)?;
        return Ok(());
    }

    // The extension is only a hint; the content signature wins.
    let mut reader = ImageReader::new(Cursor::new(bytes));
    if let Some(format) = ImageFormat::from_mime_type(mime) {
        reader.set_format(format);
    }
    reader.with_guessed_format()?.into_dimensions()?;
    Ok(())
}
