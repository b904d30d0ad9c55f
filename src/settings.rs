use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::core::Resolution;
use crate::foundation::error::{StoryreelError, StoryreelResult};

/// Which render strategies [`build_video`](crate::build_video) may use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererChoice {
    /// Compositor first, concat renderer when the compositor is unavailable.
    #[default]
    Auto,
    /// Compositor only.
    Compositor,
    /// Concat renderer only.
    Ffmpeg,
}

impl std::str::FromStr for RendererChoice {
    type Err = StoryreelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "compositor" => Ok(Self::Compositor),
            "ffmpeg" | "ffmpeg-concat" => Ok(Self::Ffmpeg),
            other => Err(StoryreelError::validation(format!(
                "unknown renderer '{other}' (expected auto, compositor or ffmpeg)"
            ))),
        }
    }
}

/// Tuning parameters for one `build_video` call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComposeSettings {
    pub fps: u32,
    pub resolution: Resolution,
    /// Overlap between adjacent scenes, in seconds.
    pub crossfade_sec: f64,
    pub min_scene_seconds: f64,
    pub head_pad: f64,
    pub tail_pad: f64,
    /// Background music file; dropped with a warning when it does not exist.
    pub bg_music: Option<PathBuf>,
    pub bg_music_volume: f32,
    pub renderer: RendererChoice,
    /// Explicit `ffmpeg` binary instead of a `PATH` lookup.
    pub ffmpeg: Option<PathBuf>,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            resolution: Resolution::FULL_HD,
            crossfade_sec: 0.3,
            min_scene_seconds: 2.0,
            head_pad: 0.15,
            tail_pad: 0.15,
            bg_music: None,
            bg_music_volume: 0.08,
            renderer: RendererChoice::Auto,
            ffmpeg: None,
        }
    }
}

impl ComposeSettings {
    pub fn from_json_str(json: &str) -> StoryreelResult<Self> {
        serde_json::from_str(json).map_err(|e| StoryreelError::serde(e.to_string()))
    }

    /// Load settings from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> StoryreelResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read settings file '{}'", path.display()))?;
        Self::from_json_str(&text).map_err(|e| {
            StoryreelError::serde(format!("settings file '{}': {e}", path.display()))
        })
    }
}
