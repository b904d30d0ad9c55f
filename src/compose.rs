use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context as _;

use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::media::probe::{DurationProbe, ToolProbe};
use crate::media::tools::MediaTools;
use crate::render::fallback::FallbackRenderer;
use crate::render::primary::PrimaryRenderer;
use crate::render::{OutputTarget, RenderResult, RenderStrategy};
use crate::settings::{ComposeSettings, RendererChoice};
use crate::timeline::builder::TimelineBuilder;
use crate::timeline::model::{BackgroundMusic, SceneAsset, Timeline, TimelineParams};

/// Everything needed to produce one video.
#[derive(Clone, Debug, Default)]
pub struct BuildVideoRequest {
    /// Scene stills in narrative order; scene `n` is `images[n - 1]`.
    pub images: Vec<PathBuf>,
    /// Narration per scene, keyed `scene_<n>` with `n` 1-based.
    pub scene_audio: BTreeMap<String, PathBuf>,
    pub out_dir: PathBuf,
    /// Human title; sanitised into the output file name.
    pub title: String,
    pub settings: ComposeSettings,
}

/// Build the timeline for `request` and render it to `out_dir/<title>.mp4`.
///
/// Detects `ffmpeg`/`ffprobe` on this host and tries the strategies selected by
/// `settings.renderer` in order, moving on only when a strategy reports itself unavailable.
pub fn build_video(request: &BuildVideoRequest) -> StoryreelResult<RenderResult> {
    if request.images.is_empty() {
        return Err(StoryreelError::empty_input("no scene images were supplied"));
    }
    let tools = MediaTools::detect(request.settings.ffmpeg.as_deref());
    let probe = ToolProbe::new(tools.clone());
    let strategies = strategies_for(request.settings.renderer, &tools);
    build_video_with(request, &probe, &strategies)
}

/// Render strategies for `choice`, in the order they are tried.
pub fn strategies_for(choice: RendererChoice, tools: &MediaTools) -> Vec<Box<dyn RenderStrategy>> {
    let primary = || Box::new(PrimaryRenderer::new(tools.clone())) as Box<dyn RenderStrategy>;
    let fallback = || Box::new(FallbackRenderer::new(tools.clone())) as Box<dyn RenderStrategy>;
    match choice {
        RendererChoice::Auto => vec![primary(), fallback()],
        RendererChoice::Compositor => vec![primary()],
        RendererChoice::Ffmpeg => vec![fallback()],
    }
}

/// Time the scenes of `request` without touching the filesystem.
pub fn plan_timeline(
    request: &BuildVideoRequest,
    probe: &dyn DurationProbe,
) -> StoryreelResult<Timeline> {
    if request.images.is_empty() {
        return Err(StoryreelError::empty_input("no scene images were supplied"));
    }
    let assets = scene_assets(&request.images, &request.scene_audio);
    TimelineBuilder::new(probe).build(&assets, timeline_params(&request.settings))
}

/// [`build_video`] with an explicit probe and strategy list.
#[tracing::instrument(skip_all, fields(title = %request.title, scenes = request.images.len()))]
pub fn build_video_with(
    request: &BuildVideoRequest,
    probe: &dyn DurationProbe,
    strategies: &[Box<dyn RenderStrategy>],
) -> StoryreelResult<RenderResult> {
    let timeline = plan_timeline(request, probe)?;
    tracing::info!(
        scenes = timeline.len(),
        seconds = timeline.total_duration(),
        "timeline built"
    );

    std::fs::create_dir_all(&request.out_dir).with_context(|| {
        format!(
            "create output directory '{}'",
            request.out_dir.display()
        )
    })?;
    let target = OutputTarget::new(
        &request.out_dir,
        format!("{}.mp4", sanitize_title(&request.title)),
    );

    let mut unavailable = Vec::new();
    for strategy in strategies {
        match strategy.render(&timeline, &target) {
            Ok(result) => {
                tracing::info!(
                    strategy = %result.strategy,
                    video = %result.video_path.display(),
                    "video rendered"
                );
                return Ok(result);
            }
            Err(e) if e.is_unavailable() => {
                tracing::warn!(strategy = %strategy.kind(), reason = %e, "render strategy unavailable");
                unavailable.push(e.to_string());
            }
            Err(e) => return Err(e),
        }
    }

    let mut reasons = unavailable.into_iter();
    Err(StoryreelError::NoRenderer {
        primary: reasons.next().unwrap_or_else(|| "not selected".to_owned()),
        fallback: reasons.next().unwrap_or_else(|| "not selected".to_owned()),
    })
}

/// Pair each image with its `scene_<n>` narration.
///
/// Keys that do not name a scene in `1..=images.len()` are logged and ignored.
pub fn scene_assets(images: &[PathBuf], scene_audio: &BTreeMap<String, PathBuf>) -> Vec<SceneAsset> {
    let mut assets: Vec<SceneAsset> = images
        .iter()
        .enumerate()
        .map(|(pos, image)| SceneAsset {
            index: pos + 1,
            image_path: image.clone(),
            audio_path: None,
        })
        .collect();

    for (key, path) in scene_audio {
        match parse_scene_key(key) {
            Some(n) if (1..=assets.len()).contains(&n) => {
                assets[n - 1].audio_path = Some(path.clone());
            }
            Some(n) => tracing::warn!(key = %key, scene = n, "narration for a scene that has no image; ignored"),
            None => tracing::warn!(key = %key, "narration key is not of the form scene_<n>; ignored"),
        }
    }
    assets
}

fn parse_scene_key(key: &str) -> Option<usize> {
    let digits = key.strip_prefix("scene_")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn timeline_params(settings: &ComposeSettings) -> TimelineParams {
    let background_music = match &settings.bg_music {
        Some(path) if path.is_file() => Some(BackgroundMusic {
            path: path.clone(),
            volume: settings.bg_music_volume,
        }),
        Some(path) => {
            tracing::warn!(music = %path.display(), "background music not found; rendering without it");
            None
        }
        None => None,
    };
    TimelineParams {
        fps: settings.fps,
        resolution: settings.resolution,
        crossfade_seconds: settings.crossfade_sec,
        min_scene_seconds: settings.min_scene_seconds,
        head_pad: settings.head_pad,
        tail_pad: settings.tail_pad,
        background_music,
    }
}

/// File-system safe form of a title: reserved characters become `_`, surrounding whitespace is
/// dropped, and an empty result becomes `untitled`.
pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        "untitled".to_owned()
    } else {
        trimmed.to_owned()
    }
}
