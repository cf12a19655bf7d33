use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use tokio_util::sync::CancellationToken;

use super::source::{EncodedFrame, FrameSource, UploadSource};
use crate::models::session::Resolution;

/// Encode an RGB8 pixel buffer as JPEG. `quality` is the 0-1 session
/// setting, mapped onto the encoder's 1-100 scale.
pub fn encode_jpeg(pixels: &[u8], resolution: Resolution, quality: f64) -> Result<Vec<u8>> {
    let quality = (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder
        .write_image(
            pixels,
            resolution.width,
            resolution.height,
            ExtendedColorType::Rgb8,
        )
        .context("jpeg encoding failed")?;
    Ok(out)
}

fn flat_frame(resolution: Resolution, rgb: [u8; 3], quality: f64) -> Result<EncodedFrame> {
    let pixels: Vec<u8> = rgb
        .iter()
        .copied()
        .cycle()
        .take((resolution.width * resolution.height * 3) as usize)
        .collect();
    let data = encode_jpeg(&pixels, resolution, quality)?;
    Ok(EncodedFrame {
        data,
        width: resolution.width,
        height: resolution.height,
    })
}

/// Deterministic flat-color source used by tests and demos. The color shifts
/// per grab so consecutive frames differ.
pub struct SyntheticSource {
    grabs: u32,
    ended: CancellationToken,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self {
            grabs: 0,
            ended: CancellationToken::new(),
        }
    }

    /// Token handed to callers that want to simulate the stream going away.
    pub fn ended_token(&self) -> CancellationToken {
        self.ended.clone()
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SyntheticSource {
    fn source_id(&self) -> Option<String> {
        Some("synthetic".into())
    }

    fn grab(&mut self, target: Resolution, quality: f64) -> Result<EncodedFrame> {
        self.grabs = self.grabs.wrapping_add(1);
        let shade = (self.grabs % 256) as u8;
        flat_frame(target, [shade, 128, 255 - shade], quality)
    }

    fn ended(&self) -> CancellationToken {
        self.ended.clone()
    }
}

/// Fixed-duration synthetic video for upload-session tests and demos.
pub struct SyntheticUpload {
    file_name: String,
    duration_ms: u64,
}

impl SyntheticUpload {
    pub fn new(file_name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            file_name: file_name.into(),
            duration_ms,
        }
    }
}

impl UploadSource for SyntheticUpload {
    fn file_name(&self) -> String {
        self.file_name.clone()
    }

    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn grab_at(
        &mut self,
        position_ms: u64,
        target: Resolution,
        quality: f64,
    ) -> Result<EncodedFrame> {
        let shade = ((position_ms / 40) % 256) as u8;
        flat_frame(target, [shade, shade, 200], quality)
    }
}
