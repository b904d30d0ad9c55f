use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio::mix::{frame_to_sample, seconds_to_sample};
use crate::foundation::error::StoryreelResult;
use crate::media::decode::{AudioPcm, MIX_CHANNELS, MIX_SAMPLE_RATE, decode_audio_f32_stereo};
use crate::timeline::model::Timeline;

/// Source of decoded PCM for the mixer.
pub trait PcmSource {
    /// Decode `path` to interleaved `f32` at [`MIX_SAMPLE_RATE`].
    fn decode(&self, path: &Path) -> StoryreelResult<AudioPcm>;
}

/// [`PcmSource`] that shells out to `ffmpeg`.
pub struct FfmpegPcm {
    ffmpeg: PathBuf,
}

impl FfmpegPcm {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl PcmSource for FfmpegPcm {
    fn decode(&self, path: &Path) -> StoryreelResult<AudioPcm> {
        decode_audio_f32_stereo(&self.ffmpeg, path, MIX_SAMPLE_RATE)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SegmentRole {
    Narration { scene: usize },
    Music,
}

#[derive(Clone, Debug)]
/// One scheduled audio clip in timeline sample space.
pub(crate) struct AudioSegment {
    pub(crate) role: SegmentRole,
    pub(crate) timeline_start_sample: u64,
    pub(crate) timeline_end_sample: u64,
    pub(crate) volume: f32,
    pub(crate) fade_in_sec: f64,
    pub(crate) fade_out_sec: f64,
    pub(crate) source_channels: u16,
    pub(crate) source_interleaved_f32: Arc<Vec<f32>>,
}

#[derive(Clone, Debug)]
/// Everything the mixer needs to produce the soundtrack of one render.
pub(crate) struct AudioManifest {
    pub(crate) sample_rate: u32,
    pub(crate) channels: u16,
    pub(crate) total_samples: u64,
    pub(crate) segments: Vec<AudioSegment>,
}

/// Schedule narration at each scene's absolute start and music from zero.
///
/// `total_frames` is the video length the soundtrack must match. Narration and music that fail
/// to decode are logged and left out; the render continues without them.
pub(crate) fn build_audio_manifest(
    timeline: &Timeline,
    total_frames: u64,
    source: &dyn PcmSource,
) -> AudioManifest {
    let sample_rate = MIX_SAMPLE_RATE;
    let total_samples = frame_to_sample(total_frames, timeline.params.fps, sample_rate);
    let mut segments = Vec::new();

    for scene in &timeline.scenes {
        let Some(path) = scene.audio_path.as_deref() else {
            continue;
        };
        let pcm = match source.decode(path) {
            Ok(pcm) => pcm,
            Err(e) => {
                tracing::warn!(
                    scene = scene.index,
                    audio = %path.display(),
                    error = %e,
                    "narration could not be decoded; scene stays silent"
                );
                continue;
            }
        };
        let start = seconds_to_sample(scene.start, sample_rate);
        if let Some(seg) = place_segment(
            SegmentRole::Narration { scene: scene.index },
            pcm,
            start,
            total_samples,
            1.0,
            timeline.params.head_pad,
            timeline.params.tail_pad,
        ) {
            segments.push(seg);
        }
    }

    if let Some(music) = &timeline.params.background_music {
        match source.decode(&music.path) {
            Ok(pcm) => {
                if let Some(seg) =
                    place_segment(SegmentRole::Music, pcm, 0, total_samples, music.volume, 0.0, 0.0)
                {
                    segments.push(seg);
                }
            }
            Err(e) => tracing::warn!(
                music = %music.path.display(),
                error = %e,
                "background music could not be decoded; continuing with narration only"
            ),
        }
    }

    AudioManifest {
        sample_rate,
        channels: MIX_CHANNELS,
        total_samples,
        segments,
    }
}

fn place_segment(
    role: SegmentRole,
    pcm: AudioPcm,
    start: u64,
    total_samples: u64,
    volume: f32,
    fade_in_sec: f64,
    fade_out_sec: f64,
) -> Option<AudioSegment> {
    let frames = pcm.frames() as u64;
    let end = start.saturating_add(frames).min(total_samples);
    if frames == 0 || start >= end || pcm.channels == 0 {
        return None;
    }
    Some(AudioSegment {
        role,
        timeline_start_sample: start,
        timeline_end_sample: end,
        volume: volume.max(0.0),
        fade_in_sec: fade_in_sec.max(0.0),
        fade_out_sec: fade_out_sec.max(0.0),
        source_channels: pcm.channels,
        source_interleaved_f32: Arc::new(pcm.interleaved_f32),
    })
}
