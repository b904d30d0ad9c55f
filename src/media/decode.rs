use std::path::Path;
use std::process::Command;

use anyhow::Context as _;
use image::imageops::{self, FilterType};

use crate::foundation::core::Resolution;
use crate::foundation::error::{StoryreelError, StoryreelResult};

/// Internal audio mixing sample rate used across decode/mix/encode.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

/// Channel count of the mix bus.
pub const MIX_CHANNELS: u16 = 2;

#[derive(Clone, Debug)]
/// Decoded interleaved floating-point PCM.
pub struct AudioPcm {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Interleaved `f32` PCM samples.
    pub interleaved_f32: Vec<f32>,
}

impl AudioPcm {
    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.interleaved_f32.len() / usize::from(self.channels)
        }
    }
}

/// Decode any audio file `ffmpeg` understands into interleaved stereo `f32` at `sample_rate`.
pub fn decode_audio_f32_stereo(
    ffmpeg: &Path,
    path: &Path,
    sample_rate: u32,
) -> StoryreelResult<AudioPcm> {
    let out = Command::new(ffmpeg)
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            &MIX_CHANNELS.to_string(),
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| StoryreelError::probe(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        return Err(StoryreelError::probe(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(StoryreelError::probe(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let interleaved_f32 = out
        .stdout
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(AudioPcm {
        sample_rate,
        channels: MIX_CHANNELS,
        interleaved_f32,
    })
}

/// Decode a still image and letterbox it onto an opaque black `resolution` canvas.
///
/// The image is scaled to fit while keeping its aspect ratio; transparent pixels are flattened
/// over black. Returns tightly packed RGBA8, row-major.
pub fn load_letterboxed_rgba8(path: &Path, resolution: Resolution) -> StoryreelResult<Vec<u8>> {
    let img = image::open(path)
        .with_context(|| format!("decode image '{}'", path.display()))?
        .to_rgba8();
    Ok(letterbox_rgba8(&img, resolution))
}

pub(crate) fn letterbox_rgba8(img: &image::RgbaImage, resolution: Resolution) -> Vec<u8> {
    let (src_w, src_h) = img.dimensions();
    let (dst_w, dst_h) = (resolution.width, resolution.height);
    let mut canvas = image::RgbaImage::from_pixel(dst_w, dst_h, image::Rgba([0, 0, 0, 255]));
    if src_w == 0 || src_h == 0 {
        return canvas.into_raw();
    }

    let (fit_w, fit_h) = fit_within(src_w, src_h, dst_w, dst_h);
    let x = i64::from((dst_w - fit_w) / 2);
    let y = i64::from((dst_h - fit_h) / 2);
    if (fit_w, fit_h) == (src_w, src_h) {
        imageops::overlay(&mut canvas, img, x, y);
    } else {
        let scaled = imageops::resize(img, fit_w, fit_h, FilterType::Lanczos3);
        imageops::overlay(&mut canvas, &scaled, x, y);
    }
    canvas.into_raw()
}

/// Largest `(w, h)` with the source aspect ratio that fits inside `dst_w x dst_h`.
pub(crate) fn fit_within(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> (u32, u32) {
    let scale = (f64::from(dst_w) / f64::from(src_w)).min(f64::from(dst_h) / f64::from(src_h));
    let w = ((f64::from(src_w) * scale).round() as u32).clamp(1, dst_w);
    let h = ((f64::from(src_h) * scale).round() as u32).clamp(1, dst_h);
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_keeps_aspect_ratio() {
        assert_eq!(fit_within(100, 100, 160, 90), (90, 90));
        assert_eq!(fit_within(400, 100, 160, 90), (160, 40));
        assert_eq!(fit_within(1920, 1080, 1920, 1080), (1920, 1080));
    }

    #[test]
    fn letterbox_pads_with_black_and_centers() {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 255, 255, 255]));
        let out = letterbox_rgba8(&img, Resolution::new(8, 4));
        let px = |x: usize, y: usize| &out[(y * 8 + x) * 4..(y * 8 + x) * 4 + 4];
        assert_eq!(px(0, 0), &[0, 0, 0, 255]);
        assert_eq!(px(1, 3), &[0, 0, 0, 255]);
        assert_eq!(px(2, 0), &[255, 255, 255, 255]);
        assert_eq!(px(5, 3), &[255, 255, 255, 255]);
        assert_eq!(px(6, 2), &[0, 0, 0, 255]);
    }

    #[test]
    fn letterbox_flattens_transparency_over_black() {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 100, 50, 0]));
        let out = letterbox_rgba8(&img, Resolution::new(2, 2));
        assert!(out.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn pcm_frames_counts_per_channel() {
        let pcm = AudioPcm {
            sample_rate: MIX_SAMPLE_RATE,
            channels: 2,
            interleaved_f32: vec![0.0; 10],
        };
        assert_eq!(pcm.frames(), 5);
    }
}
