use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context as _;

use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::media::tools::MediaTools;
use crate::render::staging::Staging;
use crate::render::{OutputTarget, RenderResult, RenderStrategy, SceneTiming, StrategyKind};
use crate::timeline::model::{Scene, Timeline, TimelineParams};

/// Shortest segment the concat path will encode.
pub const MIN_SEGMENT_SECONDS: f64 = 0.5;

const SILENCE_SOURCE: &str = "anullsrc=r=48000:cl=stereo";

/// One `ffmpeg` encode per scene, joined with a stream-copy concat.
///
/// Hard cuts only: no crossfades and no background music. Scenes are laid out back to back, so
/// the reported timings can differ from the timeline's overlapped ones.
#[derive(Clone, Debug)]
pub struct FallbackRenderer {
    tools: MediaTools,
}

impl FallbackRenderer {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }
}

impl RenderStrategy for FallbackRenderer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FfmpegConcat
    }

    #[tracing::instrument(skip_all, fields(scenes = timeline.len(), out = %target.final_path().display()))]
    fn render(&self, timeline: &Timeline, target: &OutputTarget) -> StoryreelResult<RenderResult> {
        let Some(ffmpeg) = self.tools.ffmpeg.as_deref() else {
            return Err(StoryreelError::encoder_unavailable(
                "ffmpeg was not found; the concat renderer cannot run",
            ));
        };
        if timeline.is_empty() {
            return Err(StoryreelError::empty_input("timeline has no scenes"));
        }
        timeline.params.validate()?;
        if timeline.params.background_music.is_some() {
            tracing::info!("background music is not mixed by the concat renderer");
        }

        super::ensure_parent_exists(target)?;
        let staging = Staging::new(&target.out_dir)?;

        let mut segments = Vec::with_capacity(timeline.len());
        let mut timings = Vec::with_capacity(timeline.len());
        let mut cursor = 0.0;
        for scene in &timeline.scenes {
            let len = segment_seconds(scene);
            let seg_path = staging.file(&format!("seg_{:03}.mp4", scene.index));
            tracing::debug!(scene = scene.index, seconds = len, "encoding segment");
            run_ffmpeg(
                ffmpeg,
                segment_args(scene, &timeline.params, &seg_path),
                &format!("segment for scene {}", scene.index),
            )?;
            segments.push(seg_path);

            let mut timing = SceneTiming::from_scene(scene);
            timing.start = cursor;
            timing.duration = len;
            timing.end = cursor + len;
            cursor = timing.end;
            timings.push(timing);
        }

        let manifest_path = staging.file("concat.txt");
        std::fs::write(&manifest_path, concat_manifest(&segments))
            .with_context(|| format!("write concat manifest '{}'", manifest_path.display()))?;
        run_ffmpeg(
            ffmpeg,
            concat_args(&manifest_path, &staging.partial_path()),
            "concat",
        )?;

        let final_path = target.final_path();
        staging.commit(&final_path)?;
        tracing::info!(
            segments = segments.len(),
            seconds = cursor,
            video = %final_path.display(),
            "concat render finished"
        );

        Ok(RenderResult {
            video_path: final_path,
            strategy: StrategyKind::FfmpegConcat,
            timings,
        })
    }
}

pub(crate) fn segment_seconds(scene: &Scene) -> f64 {
    scene.duration.max(MIN_SEGMENT_SECONDS)
}

/// Letterbox filter that fits any still into `W x H` on black.
pub(crate) fn letterbox_filter(params: &TimelineParams) -> String {
    let (w, h) = (params.resolution.width, params.resolution.height);
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black,setsar=1,format=yuv420p"
    )
}

/// Arguments for encoding one scene to `out`.
///
/// Every segment carries identical H.264 and stereo 48 kHz AAC streams so the concat step can
/// stream-copy them.
pub(crate) fn segment_args(scene: &Scene, params: &TimelineParams, out: &Path) -> Vec<OsString> {
    let fps = params.fps.to_string();
    let filter = letterbox_filter(params);
    let seconds = format!("{:.3}", segment_seconds(scene));
    let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error"]
        .into_iter()
        .map(OsString::from)
        .collect();

    args.extend(["-loop", "1", "-framerate", fps.as_str(), "-i"].map(OsString::from));
    args.push(scene.image_path.clone().into_os_string());

    match &scene.audio_path {
        Some(audio) => {
            args.push("-i".into());
            args.push(audio.clone().into_os_string());
        }
        None => {
            args.extend(["-f", "lavfi", "-i", SILENCE_SOURCE].map(OsString::from));
        }
    }

    args.extend(
        [
            "-map",
            "0:v:0",
            "-map",
            "1:a:0",
            "-vf",
            filter.as_str(),
            "-r",
            fps.as_str(),
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-tune",
            "stillimage",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
            "-b:a",
            "192k",
            "-ar",
            "48000",
            "-ac",
            "2",
        ]
        .map(OsString::from),
    );
    if scene.audio_path.is_some() {
        args.extend(["-af", "apad"].map(OsString::from));
    }
    args.extend(["-t", seconds.as_str()].map(OsString::from));
    args.extend(["-movflags", "+faststart"].map(OsString::from));
    args.push(out.as_os_str().to_os_string());
    args
}

/// Arguments for joining the segments listed in `manifest` into `out` without re-encoding.
pub(crate) fn concat_args(manifest: &Path, out: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "concat",
        "-safe",
        "0",
        "-i",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(manifest.as_os_str().to_os_string());
    args.extend(["-c", "copy", "-movflags", "+faststart", "-f", "mp4"].map(OsString::from));
    args.push(out.as_os_str().to_os_string());
    args
}

/// Concat demuxer manifest listing `segments` in order.
pub(crate) fn concat_manifest(segments: &[PathBuf]) -> String {
    let mut out = String::new();
    for seg in segments {
        out.push_str("file '");
        out.push_str(&escape_single_quotes(&seg.to_string_lossy()));
        out.push_str("'\n");
    }
    out
}

fn escape_single_quotes(s: &str) -> String {
    s.replace('\'', r"'\''")
}

fn run_ffmpeg(ffmpeg: &Path, args: Vec<OsString>, what: &str) -> StoryreelResult<()> {
    let output = Command::new(ffmpeg)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            StoryreelError::encode(format!(
                "failed to run ffmpeg '{}' for {what}: {e}",
                ffmpeg.display()
            ))
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StoryreelError::encode(format!(
            "ffmpeg {what} failed with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}
