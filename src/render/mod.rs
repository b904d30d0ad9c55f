//! Render strategies that turn a [`Timeline`] into an MP4 file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::foundation::error::StoryreelResult;
use crate::timeline::model::{Scene, Timeline};

#[cfg(feature = "compositor")]
pub mod compositor;
pub mod fallback;
pub mod primary;
pub mod staging;

/// Where a render writes its finished video.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputTarget {
    /// Directory that receives the video. Created by the caller.
    pub out_dir: PathBuf,
    /// File name inside `out_dir`, including the `.mp4` extension.
    pub file_name: String,
}

impl OutputTarget {
    pub fn new(out_dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            file_name: file_name.into(),
        }
    }

    pub fn final_path(&self) -> PathBuf {
        self.out_dir.join(&self.file_name)
    }
}

/// Which strategy produced a video.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// In-process frame compositor with crossfades and a mixed soundtrack.
    Compositor,
    /// Per-scene `ffmpeg` encodes joined with the concat demuxer.
    FfmpegConcat,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Compositor => "compositor",
            Self::FfmpegConcat => "ffmpeg-concat",
        })
    }
}

/// Timing of one scene as it appears in the rendered video.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneTiming {
    pub scene: usize,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub image: PathBuf,
    pub audio: Option<PathBuf>,
}

impl SceneTiming {
    pub(crate) fn from_scene(scene: &Scene) -> Self {
        Self {
            scene: scene.index,
            start: scene.start,
            end: scene.end,
            duration: scene.duration,
            image: scene.image_path.clone(),
            audio: scene.audio_path.clone(),
        }
    }
}

/// Outcome of a successful render.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderResult {
    pub video_path: PathBuf,
    pub strategy: StrategyKind,
    /// Per-scene timings, in timeline order.
    pub timings: Vec<SceneTiming>,
}

/// A way of rendering a timeline.
///
/// Implementations return an error for which [`StoryreelError::is_unavailable`] is `true` when
/// they cannot run on this host at all, and any other error when the render itself failed.
///
/// [`StoryreelError::is_unavailable`]: crate::StoryreelError::is_unavailable
pub trait RenderStrategy {
    fn kind(&self) -> StrategyKind;
    fn render(&self, timeline: &Timeline, target: &OutputTarget) -> StoryreelResult<RenderResult>;
}

pub(crate) fn ensure_parent_exists(target: &OutputTarget) -> StoryreelResult<&Path> {
    if !target.out_dir.is_dir() {
        return Err(crate::foundation::error::StoryreelError::validation(format!(
            "output directory '{}' does not exist",
            target.out_dir.display()
        )));
    }
    Ok(&target.out_dir)
}
