//! # Image Inspection
//!
//! Reads an image from a file path, data URI, or raw base64 string and
//! reports its type tag, MIME type, pixel dimensions and hex-encoded bytes.
//! Only JPEG, PNG, GIF and BMP are accepted; anything else is an error the
//! caller turns into "skip this image".
//!
//! [`decode`] prepares bytes for embedding: JPEG passes through untouched,
//! everything else is decoded to RGB plus an optional alpha channel.

use std::io::Cursor;

use image::ImageFormat;
use thiserror::Error;

use crate::model::ImageFile;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to read image '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid data URI: missing comma")]
    InvalidDataUri,
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("unsupported image format (expected JPEG, PNG, GIF or BMP)")]
    Unsupported,
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// The raster formats images may be embedded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Bmp,
}

impl ImageKind {
    /// Parse a short type tag (`jpg`, `jpeg`, `png`, `gif`, `bmp`).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "gif" => Some(ImageKind::Gif),
            "bmp" => Some(ImageKind::Bmp),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Bmp => "bmp",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
            ImageKind::Bmp => "image/bmp",
        }
    }

    pub fn format(&self) -> ImageFormat {
        match self {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Png => ImageFormat::Png,
            ImageKind::Gif => ImageFormat::Gif,
            ImageKind::Bmp => ImageFormat::Bmp,
        }
    }

    /// Detect the format from magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        match image::guess_format(data).ok()? {
            ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            ImageFormat::Png => Some(ImageKind::Png),
            ImageFormat::Gif => Some(ImageKind::Gif),
            ImageFormat::Bmp => Some(ImageKind::Bmp),
            _ => None,
        }
    }
}

/// Inspect an image source.
///
/// Supported `src` formats:
/// - `data:image/...;base64,...` data URIs
/// - File paths (absolute or relative), read from disk
/// - Raw base64-encoded image data
pub fn inspect_image(src: &str) -> Result<ImageFile, ImageError> {
    let raw_bytes = read_source_bytes(src)?;
    inspect_bytes(&raw_bytes)
}

/// Inspect raw image bytes.
pub fn inspect_bytes(data: &[u8]) -> Result<ImageFile, ImageError> {
    let kind = ImageKind::sniff(data).ok_or(ImageError::Unsupported)?;
    let (width, height) = dimensions(data, kind)?;
    Ok(ImageFile {
        data: hex::encode(data),
        kind: kind.tag().to_string(),
        mime: kind.mime().to_string(),
        name: String::new(),
        width,
        height,
    })
}

/// Decode the hex payload of an [`ImageFile`]. A `0x` prefix is allowed.
pub fn decode_payload(file: &ImageFile) -> Result<Vec<u8>, ImageError> {
    let hex_data = file.data.strip_prefix("0x").unwrap_or(&file.data);
    Ok(hex::decode(hex_data)?)
}

/// Pixel dimensions without decoding the pixel data.
pub fn dimensions(data: &[u8], kind: ImageKind) -> Result<(u32, u32), ImageError> {
    let reader = image::io::Reader::with_format(Cursor::new(data), kind.format());
    Ok(reader.into_dimensions()?)
}

// ── Embedding ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegColorSpace {
    DeviceRGB,
    DeviceGray,
}

/// Pixel payload ready to become a PDF image XObject.
#[derive(Debug, Clone)]
pub enum PixelData {
    /// JPEG bytes embedded as-is with DCTDecode.
    Jpeg {
        data: Vec<u8>,
        color_space: JpegColorSpace,
    },
    /// Decoded RGB with an optional alpha channel for a soft mask.
    Decoded {
        rgb: Vec<u8>,
        alpha: Option<Vec<u8>>,
    },
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub pixels: PixelData,
    pub width_px: u32,
    pub height_px: u32,
}

/// Pixels in a `width` x `height` image, counted without `u32` overflow.
fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Prepare image bytes for embedding.
pub fn decode(data: &[u8], kind: ImageKind) -> Result<DecodedImage, ImageError> {
    if kind == ImageKind::Jpeg {
        let (width_px, height_px) = dimensions(data, kind)?;
        return Ok(DecodedImage {
            pixels: PixelData::Jpeg {
                data: data.to_vec(),
                color_space: detect_jpeg_color_space(data),
            },
            width_px,
            height_px,
        });
    }

    let img = image::load_from_memory_with_format(data, kind.format())?;
    let rgba = img.to_rgba8();
    let (width_px, height_px) = (rgba.width(), rgba.height());

    let pixels = pixel_count(width_px, height_px);
    let mut rgb = Vec::with_capacity(pixels * 3);
    let mut alpha = Vec::with_capacity(pixels);
    let mut has_transparency = false;

    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
        if pixel[3] != 255 {
            has_transparency = true;
        }
    }

    Ok(DecodedImage {
        pixels: PixelData::Decoded {
            rgb,
            alpha: has_transparency.then_some(alpha),
        },
        width_px,
        height_px,
    })
}

/// Read the component count from the first SOF marker.
fn detect_jpeg_color_space(data: &[u8]) -> JpegColorSpace {
    let mut i = 2; // skip SOI
    while i + 1 < data.len() {
        if data[i] != 0xFF {
            break;
        }
        let marker = data[i + 1];
        let is_sof = matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF);
        if is_sof && i + 9 < data.len() {
            return if data[i + 9] == 1 {
                JpegColorSpace::DeviceGray
            } else {
                JpegColorSpace::DeviceRGB
            };
        }
        if i + 3 < data.len() {
            let seg_len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
            i += 2 + seg_len;
        } else {
            break;
        }
    }
    JpegColorSpace::DeviceRGB
}

/// Resolve the source string to raw image bytes.
fn read_source_bytes(src: &str) -> Result<Vec<u8>, ImageError> {
    // Data URI: data:image/png;base64,iVBOR...
    if src.starts_with("data:image/") {
        let comma_pos = src.find(',').ok_or(ImageError::InvalidDataUri)?;
        return base64_decode(&src[comma_pos + 1..]);
    }

    let path = std::path::Path::new(src);
    if path.is_file() {
        return std::fs::read(path).map_err(|source| ImageError::Read {
            path: src.to_string(),
            source,
        });
    }

    // Explicit path prefixes that don't exist are read errors, not base64.
    if src.starts_with('/') || src.starts_with("./") || src.starts_with("../") {
        return Err(ImageError::Read {
            path: src.to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
    }

    base64_decode(src)
}

fn base64_decode(input: &str) -> Result<Vec<u8>, ImageError> {
    use base64::Engine;
    Ok(base64::engine::general_purpose::STANDARD.decode(input.trim())?)
}
