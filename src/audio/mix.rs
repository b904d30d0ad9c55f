use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;

use crate::audio::manifest::{AudioManifest, AudioSegment};
use crate::foundation::error::StoryreelResult;

/// Mix all manifest segments into interleaved output PCM.
///
/// Segments are summed with their own gain and fades, then hard-clamped to `[-1, 1]`. There is
/// no normalization, so quiet music stays quiet under the narration.
pub(crate) fn mix_manifest(manifest: &AudioManifest) -> Vec<f32> {
    let frames = manifest.total_samples as usize;
    let mut out = vec![0.0f32; frames * usize::from(manifest.channels)];

    for seg in &manifest.segments {
        mix_segment(&mut out, manifest, seg);
    }

    for s in &mut out {
        *s = s.clamp(-1.0, 1.0);
    }
    out
}

fn mix_segment(out: &mut [f32], manifest: &AudioManifest, seg: &AudioSegment) {
    let seg_len_samples = seg
        .timeline_end_sample
        .saturating_sub(seg.timeline_start_sample);
    if seg_len_samples == 0 || seg.volume <= 0.0 {
        return;
    }

    let src = seg.source_interleaved_f32.as_ref();
    let src_channels = usize::from(seg.source_channels);
    let src_frames = src.len() / src_channels;
    let out_channels = usize::from(manifest.channels);

    for dst_sample in seg.timeline_start_sample..seg.timeline_end_sample {
        let rel_sample = (dst_sample - seg.timeline_start_sample) as usize;
        if rel_sample >= src_frames {
            break;
        }
        let dst_idx = dst_sample as usize * out_channels;
        if dst_idx + out_channels > out.len() {
            break;
        }

        let rel_sec = (rel_sample as f64) / f64::from(manifest.sample_rate);
        let gain = fade_gain(seg, rel_sec, seg_len_samples, manifest.sample_rate) * seg.volume;

        let i = rel_sample * src_channels;
        let (l, r) = if src_channels == 1 {
            (src[i], src[i])
        } else {
            (src[i], src[i + 1])
        };

        out[dst_idx] += l * gain;
        if out_channels > 1 {
            out[dst_idx + 1] += r * gain;
        }
    }
}

fn fade_gain(seg: &AudioSegment, rel_sec: f64, seg_len_samples: u64, sample_rate: u32) -> f32 {
    let mut gain = 1.0f32;
    if seg.fade_in_sec > 0.0 {
        let t = (rel_sec / seg.fade_in_sec).clamp(0.0, 1.0) as f32;
        gain *= t;
    }
    if seg.fade_out_sec > 0.0 {
        let seg_len_sec = (seg_len_samples as f64) / f64::from(sample_rate);
        let rem = (seg_len_sec - rel_sec).max(0.0);
        let t = (rem / seg.fade_out_sec).clamp(0.0, 1.0) as f32;
        gain *= t;
    }
    gain
}

/// Write interleaved `f32` PCM samples to raw little-endian `.f32le` file.
pub(crate) fn write_mix_to_f32le_file(
    samples_interleaved: &[f32],
    out_path: &Path,
) -> StoryreelResult<()> {
    let file = std::fs::File::create(out_path)
        .with_context(|| format!("create mixed audio file '{}'", out_path.display()))?;
    let mut w = std::io::BufWriter::new(file);
    for &sample in samples_interleaved {
        w.write_all(&sample.to_le_bytes())
            .with_context(|| format!("write mixed audio file '{}'", out_path.display()))?;
    }
    w.flush()
        .with_context(|| format!("flush mixed audio file '{}'", out_path.display()))?;
    Ok(())
}

/// Convert a frame count to the nearest sample index at `sample_rate`.
pub(crate) fn frame_to_sample(frames: u64, fps: u32, sample_rate: u32) -> u64 {
    if fps == 0 {
        return 0;
    }
    let num = u128::from(frames) * u128::from(sample_rate);
    let den = u128::from(fps);
    ((num + (den / 2)) / den) as u64
}

/// Convert a non-negative time in seconds to the nearest sample index.
pub(crate) fn seconds_to_sample(seconds: f64, sample_rate: u32) -> u64 {
    (seconds.max(0.0) * f64::from(sample_rate)).round() as u64
}
