use std::path::Path;
use std::process::Command;

use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::media::tools::MediaTools;

/// Measures the play length of an audio asset.
pub trait DurationProbe {
    /// Play length of `path` in seconds.
    ///
    /// Implementations must not modify the file and must release any handle they open before
    /// returning.
    fn probe_seconds(&self, path: &Path) -> StoryreelResult<f64>;
}

/// Probe backed by the host's `ffprobe`, or `ffmpeg -i` when `ffprobe` is missing.
#[derive(Clone, Debug)]
pub struct ToolProbe {
    tools: MediaTools,
}

impl ToolProbe {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }
}

impl DurationProbe for ToolProbe {
    fn probe_seconds(&self, path: &Path) -> StoryreelResult<f64> {
        if let Some(ffprobe) = self.tools.ffprobe.as_deref() {
            return ffprobe_duration(ffprobe, path);
        }
        if let Some(ffmpeg) = self.tools.ffmpeg.as_deref() {
            return ffmpeg_banner_duration(ffmpeg, path);
        }
        Err(StoryreelError::probe(
            "neither ffprobe nor ffmpeg is available to measure audio length",
        ))
    }
}

fn ffprobe_duration(ffprobe: &Path, path: &Path) -> StoryreelResult<f64> {
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        format: Option<ProbeFormat>,
    }

    let out = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| StoryreelError::probe(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(StoryreelError::probe(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| StoryreelError::probe(format!("ffprobe json parse failed: {e}")))?;
    let seconds = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .ok_or_else(|| {
            StoryreelError::probe(format!("ffprobe reported no duration for '{}'", path.display()))
        })?;
    finite_non_negative(seconds, path)
}

fn ffmpeg_banner_duration(ffmpeg: &Path, path: &Path) -> StoryreelResult<f64> {
    // `ffmpeg -i` without an output exits non-zero by design; only the banner matters.
    let out = Command::new(ffmpeg)
        .args(["-hide_banner", "-i"])
        .arg(path)
        .output()
        .map_err(|e| StoryreelError::probe(format!("failed to run ffmpeg: {e}")))?;
    let stderr = String::from_utf8_lossy(&out.stderr);
    let seconds = parse_duration_line(&stderr).ok_or_else(|| {
        StoryreelError::probe(format!(
            "ffmpeg reported no duration for '{}'",
            path.display()
        ))
    })?;
    finite_non_negative(seconds, path)
}

/// Extract seconds from the `Duration: HH:MM:SS.xx` line of an `ffmpeg -i` banner.
pub(crate) fn parse_duration_line(banner: &str) -> Option<f64> {
    let rest = banner.split("Duration:").nth(1)?;
    let stamp = rest.trim_start().split([',', ' ', '\n']).next()?;
    let mut parts = stamp.split(':');
    let h = parts.next()?.parse::<f64>().ok()?;
    let m = parts.next()?.parse::<f64>().ok()?;
    let s = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(h * 3600.0 + m * 60.0 + s)
}

fn finite_non_negative(seconds: f64, path: &Path) -> StoryreelResult<f64> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(StoryreelError::probe(format!(
            "invalid duration {seconds} for '{}'",
            path.display()
        )));
    }
    Ok(seconds)
}
