//! Storyreel turns an ordered set of scene stills and optional per-scene narration into a single
//! narrated MP4.
//!
//! - Time the scenes with a [`TimelineBuilder`] (narration length plus padding, floored at a
//!   minimum, overlapped by a crossfade)
//! - Render the [`Timeline`] with a [`RenderStrategy`]: the in-process compositor, or a
//!   per-scene `ffmpeg` concat when the compositor is unavailable
//! - Or do both in one call with [`build_video`]
#![forbid(unsafe_code)]

mod foundation;

#[cfg(feature = "compositor")]
pub(crate) mod audio;
pub mod compose;
pub mod discover;
/// Frame sinks that feed the encoder.
pub mod encode;
/// External tool discovery, probing and decoding.
pub mod media;
/// Render strategies and their shared result types.
pub mod render;
pub mod settings;
/// Scene timing.
pub mod timeline;

#[cfg(all(test, unix))]
mod test_support;

pub use crate::foundation::core::Resolution;
pub use crate::foundation::error::{StoryreelError, StoryreelResult};

pub use crate::compose::{BuildVideoRequest, build_video, build_video_with, plan_timeline};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::sink::{AudioInputConfig, FrameSink, InMemorySink, SinkConfig};
pub use crate::media::probe::{DurationProbe, ToolProbe};
pub use crate::media::tools::MediaTools;
pub use crate::render::fallback::FallbackRenderer;
pub use crate::render::primary::PrimaryRenderer;
pub use crate::render::{OutputTarget, RenderResult, RenderStrategy, SceneTiming, StrategyKind};
pub use crate::settings::{ComposeSettings, RendererChoice};
pub use crate::timeline::builder::TimelineBuilder;
pub use crate::timeline::duration::DurationEstimator;
pub use crate::timeline::model::{BackgroundMusic, Scene, SceneAsset, Timeline, TimelineParams};
