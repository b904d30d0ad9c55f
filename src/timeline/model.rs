use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::foundation::core::Resolution;
use crate::foundation::error::{StoryreelError, StoryreelResult};

/// One externally supplied scene: an image and optional narration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneAsset {
    /// 1-based position in the narrative.
    pub index: usize,
    /// Still image shown for the scene. Must exist.
    pub image_path: PathBuf,
    /// Narration audio; may be absent or point at a file that does not exist.
    pub audio_path: Option<PathBuf>,
}

/// A fully timed scene on the [`Timeline`].
///
/// `end == start + duration`; times are seconds from the start of the video.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub index: usize,
    pub image_path: PathBuf,
    /// Narration, kept only when the file existed at build time.
    pub audio_path: Option<PathBuf>,
    pub duration: f64,
    pub start: f64,
    pub end: f64,
}

/// Background music mixed under the narration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackgroundMusic {
    pub path: PathBuf,
    /// Linear gain applied to the music; never normalized against narration.
    pub volume: f32,
}

/// Global timing and output parameters of a [`Timeline`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineParams {
    pub fps: u32,
    pub resolution: Resolution,
    /// Overlap between adjacent scenes, subtracted once per adjacent pair.
    pub crossfade_seconds: f64,
    /// Floor for every scene duration.
    pub min_scene_seconds: f64,
    /// Lead-in added before narration; also the narration fade-in length.
    pub head_pad: f64,
    /// Tail added after narration; also the narration fade-out length.
    pub tail_pad: f64,
    pub background_music: Option<BackgroundMusic>,
}

impl TimelineParams {
    pub fn validate(&self) -> StoryreelResult<()> {
        if self.fps == 0 {
            return Err(StoryreelError::validation("fps must be non-zero"));
        }
        self.resolution.validate()?;

        let non_negative = [
            ("crossfade_seconds", self.crossfade_seconds),
            ("head_pad", self.head_pad),
            ("tail_pad", self.tail_pad),
        ];
        for (name, v) in non_negative {
            if !v.is_finite() || v < 0.0 {
                return Err(StoryreelError::validation(format!(
                    "{name} must be finite and >= 0 (got {v})"
                )));
            }
        }
        if !self.min_scene_seconds.is_finite() || self.min_scene_seconds <= 0.0 {
            return Err(StoryreelError::validation(format!(
                "min_scene_seconds must be finite and > 0 (got {})",
                self.min_scene_seconds
            )));
        }
        if let Some(music) = &self.background_music
            && (!music.volume.is_finite() || music.volume < 0.0)
        {
            return Err(StoryreelError::validation(format!(
                "background music volume must be finite and >= 0 (got {})",
                music.volume
            )));
        }
        Ok(())
    }
}

/// Ordered, fully timed scenes plus the global parameters used to time them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub scenes: Vec<Scene>,
    pub params: TimelineParams,
}

impl Timeline {
    /// Length of the composed video: the latest scene end.
    pub fn total_duration(&self) -> f64 {
        self.scenes.iter().map(|s| s.end).fold(0.0, f64::max)
    }

    /// `sum(durations) - (N-1) * crossfade`, clamped to zero.
    ///
    /// Equals [`Timeline::total_duration`] unless a scene shorter than the crossfade forced the
    /// overlap clamp.
    pub fn nominal_duration(&self) -> f64 {
        let sum: f64 = self.scenes.iter().map(|s| s.duration).sum();
        let overlaps = self.scenes.len().saturating_sub(1) as f64;
        (sum - overlaps * self.params.crossfade_seconds).max(0.0)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}
