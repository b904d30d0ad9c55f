use std::path::PathBuf;

use crate::foundation::core::Resolution;
use crate::foundation::error::{StoryreelError, StoryreelResult};

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Frame size in pixels.
    pub resolution: Resolution,
    /// Output frames-per-second.
    pub fps: u32,
    /// Optional raw PCM soundtrack to mux alongside the frames.
    pub audio: Option<AudioInputConfig>,
}

/// Raw PCM audio input for sinks that encode sound.
#[derive(Debug, Clone)]
pub struct AudioInputConfig {
    /// Path to interleaved `f32le` PCM data.
    pub path: PathBuf,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
}

/// Consumer of composed frames in timeline order.
///
/// `push_frame` is called with strictly increasing frame indices. Each frame is tightly packed,
/// opaque RGBA8 at the configured resolution.
pub trait FrameSink {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> StoryreelResult<()>;
    /// Push one frame.
    fn push_frame(&mut self, idx: u64, rgba: &[u8]) -> StoryreelResult<()>;
    /// Called once after the last frame.
    fn end(&mut self) -> StoryreelResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(u64, Vec<u8>)>,
    ended: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    /// Captured frames in push order.
    pub fn frames(&self) -> &[(u64, Vec<u8>)] {
        &self.frames
    }

    pub fn ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> StoryreelResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: u64, rgba: &[u8]) -> StoryreelResult<()> {
        if let Some((last, _)) = self.frames.last()
            && idx <= *last
        {
            return Err(StoryreelError::encode("in-memory sink received out-of-order frame"));
        }
        self.frames.push((idx, rgba.to_vec()));
        Ok(())
    }

    fn end(&mut self) -> StoryreelResult<()> {
        self.ended = true;
        Ok(())
    }
}
