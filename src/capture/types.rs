use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Frames at or above this width are sharp enough for thin indicator lines.
pub const HD_WIDTH: u32 = 1280;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("screen capture is not supported here: {0}")]
    Unsupported(String),
    #[error("capture command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },
    #[error("capture timed out")]
    Timeout,
    #[error("captured data is not a JPEG or PNG image")]
    InvalidFrame,
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A still image taken from the live capture.
#[derive(Debug, Clone)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wrap raw image bytes. Returns `None` for empty or unrecognised data.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        let mime_type = sniff_mime(&bytes)?;
        Some(Self {
            bytes,
            mime_type,
            captured_at: Utc::now(),
        })
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Width and height read from the image header.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self.mime_type {
            "image/jpeg" => jpeg_dimensions(&self.bytes),
            "image/png" => png_dimensions(&self.bytes),
            _ => None,
        }
    }

    pub fn stats(&self, source: &str) -> CaptureInfo {
        let (width, height) = self.dimensions().unwrap_or((0, 0));
        CaptureInfo {
            resolution: format!("{}x{}", width, height),
            is_hd: width >= HD_WIDTH,
            source: source.to_string(),
            frame_bytes: self.bytes.len(),
        }
    }
}

/// Summary of an established capture, shown once capture starts.
///
/// There is no frame rate: every source here takes one still per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureInfo {
    pub resolution: String,
    pub is_hd: bool,
    pub source: String,
    pub frame_bytes: usize,
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else {
        None
    }
}

fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    // Signature (8) + IHDR length (4) + "IHDR" (4), then width and height.
    if bytes.len() < 24 || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}

fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let mut i = 2;
    while i + 1 < bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        match marker {
            // Fill byte before a marker.
            0xFF => {
                i += 1;
                continue;
            }
            // Markers without a length field.
            0x01 | 0xD0..=0xD7 => {
                i += 2;
                continue;
            }
            // End of image or start of scan: no frame header found before it.
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let length = u16::from_be_bytes([*bytes.get(i + 2)?, *bytes.get(i + 3)?]) as usize;
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let height = u16::from_be_bytes([*bytes.get(i + 5)?, *bytes.get(i + 6)?]);
            let width = u16::from_be_bytes([*bytes.get(i + 7)?, *bytes.get(i + 8)?]);
            return Some((width as u32, height as u32));
        }
        i += 2 + length;
    }
    None
}
