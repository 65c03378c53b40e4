// SPDX-License-Identifier: MIT
use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, Rgb};

use crate::error::{CaptureError, Result};
use crate::sample::{Channel, FrameSample, PixelFormat};

/// Converts a semi-planar YUV 4:2:0 frame to packed RGB8 (BT.601).
#[must_use]
pub fn semi_planar_to_rgb(data: &[u8], width: u32, height: u32, format: PixelFormat) -> Vec<u8> {
    let (width, height) = (width as usize, height as usize);
    let y_plane_size = width * height;
    let chroma_stride = width.div_ceil(2) * 2;
    let (u_offset, v_offset) = match format {
        PixelFormat::Nv21 => (1, 0),
        PixelFormat::Nv12 => (0, 1),
    };
    let mut rgb = vec![0u8; y_plane_size * 3];

    for y in 0..height {
        for x in 0..width {
            let y_val = f32::from(data.get(y * width + x).copied().unwrap_or(0));
            let uv_idx = y_plane_size + (y / 2) * chroma_stride + (x / 2) * 2;
            let u = f32::from(data.get(uv_idx + u_offset).copied().unwrap_or(128));
            let v = f32::from(data.get(uv_idx + v_offset).copied().unwrap_or(128));

            let c = y_val - 16.0;
            let d = u - 128.0;
            let e = v - 128.0;

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let px = [
                (1.164 * c + 1.596 * e).clamp(0.0, 255.0) as u8,
                (1.164 * c - 0.392 * d - 0.813 * e).clamp(0.0, 255.0) as u8,
                (1.164 * c + 2.017 * d).clamp(0.0, 255.0) as u8,
            ];

            let rgb_idx = (y * width + x) * 3;
            rgb[rgb_idx..rgb_idx + 3].copy_from_slice(&px);
        }
    }
    rgb
}

/// Compresses one preview frame to JPEG.
///
/// # Errors
///
/// Returns [`CaptureError::Serialization`] if the payload is shorter than
/// the frame geometry requires or the encoder fails.
pub fn encode_jpeg(frame: &FrameSample, index: u64, quality: u8) -> Result<Vec<u8>> {
    let serialization = |reason: String| CaptureError::Serialization {
        channel: Channel::Frame,
        index,
        reason,
    };

    if frame.width == 0 || frame.height == 0 {
        return Err(serialization(format!(
            "empty frame geometry {}x{}",
            frame.width, frame.height
        )));
    }
    let expected = frame.format.frame_len(frame.width, frame.height);
    if frame.data.len() < expected {
        return Err(serialization(format!(
            "frame holds {} bytes, {}x{} {:?} needs {expected}",
            frame.data.len(),
            frame.width,
            frame.height,
            frame.format
        )));
    }

    let rgb = semi_planar_to_rgb(&frame.data, frame.width, frame.height, frame.format);
    let img: ImageBuffer<Rgb<u8>, _> = ImageBuffer::from_raw(frame.width, frame.height, rgb)
        .ok_or_else(|| serialization("failed to create image buffer".into()))?;

    let mut jpeg_data = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_data, quality);
    encoder
        .encode_image(&img)
        .map_err(|e| serialization(e.to_string()))?;

    Ok(jpeg_data)
}
