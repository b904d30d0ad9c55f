use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use storyreel::{BuildVideoRequest, ComposeSettings, RendererChoice, Resolution};

#[derive(Parser, Debug)]
#[command(name = "storyreel", version, about = "Compose scene stills and narration into an MP4")]
struct Cli {
    /// Only log warnings and errors (overridden by RUST_LOG).
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the timeline and render the video.
    Render(RenderArgs),
    /// Build the timeline and print it as JSON without rendering.
    Plan(InputArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Video title; also names the output folder and file.
    #[arg(long)]
    title: String,

    /// Directory holding `scene_<n>` images (jpg, jpeg, png).
    #[arg(long)]
    images: PathBuf,

    /// Directory holding `scene_<n>` narration (mp3, wav, m4a, aac).
    #[arg(long)]
    narration: Option<PathBuf>,

    /// Root directory for rendered videos.
    #[arg(long, default_value = "data/videos")]
    out_dir: PathBuf,

    /// JSON file with compose settings; flags below override it.
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    fps: Option<u32>,

    /// `WxH`, `1080p` or `720p`.
    #[arg(long)]
    resolution: Option<Resolution>,

    /// Crossfade between scenes, in seconds.
    #[arg(long)]
    crossfade: Option<f64>,

    #[arg(long)]
    min_scene_seconds: Option<f64>,

    #[arg(long)]
    head_pad: Option<f64>,

    #[arg(long)]
    tail_pad: Option<f64>,

    /// Background music file.
    #[arg(long)]
    bgm: Option<PathBuf>,

    #[arg(long)]
    bgm_volume: Option<f32>,

    /// `auto`, `compositor` or `ffmpeg`.
    #[arg(long)]
    renderer: Option<RendererChoice>,

    /// `ffmpeg` binary to use instead of the one on PATH.
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Ignore narration and background music.
    #[arg(long)]
    no_audio: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Write the render result (path, strategy, scene timings) as JSON.
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet);
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Plan(args) => cmd_plan(args),
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

fn load_settings(args: &InputArgs) -> anyhow::Result<ComposeSettings> {
    let mut s = match &args.settings {
        Some(path) => ComposeSettings::from_json_file(path)?,
        None => ComposeSettings::default(),
    };
    if let Some(v) = args.fps {
        s.fps = v;
    }
    if let Some(v) = args.resolution {
        s.resolution = v;
    }
    if let Some(v) = args.crossfade {
        s.crossfade_sec = v;
    }
    if let Some(v) = args.min_scene_seconds {
        s.min_scene_seconds = v;
    }
    if let Some(v) = args.head_pad {
        s.head_pad = v;
    }
    if let Some(v) = args.tail_pad {
        s.tail_pad = v;
    }
    if let Some(v) = &args.bgm {
        s.bg_music = Some(v.clone());
    }
    if let Some(v) = args.bgm_volume {
        s.bg_music_volume = v;
    }
    if let Some(v) = args.renderer {
        s.renderer = v;
    }
    if let Some(v) = &args.ffmpeg {
        s.ffmpeg = Some(v.clone());
    }
    if args.no_audio {
        s.bg_music = None;
    }
    Ok(s)
}

fn make_request(args: &InputArgs) -> anyhow::Result<BuildVideoRequest> {
    let settings = load_settings(args)?;
    let images = storyreel::discover::find_images(&args.images)?;
    if images.is_empty() {
        anyhow::bail!("no jpg/jpeg/png images found in '{}'", args.images.display());
    }
    let scene_audio = match (&args.narration, args.no_audio) {
        (Some(dir), false) => narration_map(dir)?,
        _ => Default::default(),
    };
    tracing::info!(
        images = images.len(),
        narration = scene_audio.len(),
        "discovered scene assets"
    );

    let safe_title = storyreel::compose::sanitize_title(&args.title);
    Ok(BuildVideoRequest {
        images,
        scene_audio,
        out_dir: args.out_dir.join(&safe_title),
        title: args.title.clone(),
        settings,
    })
}

/// Narration found in `dir`; a missing or empty folder renders silently instead of failing.
fn narration_map(dir: &Path) -> anyhow::Result<BTreeMap<String, PathBuf>> {
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "narration folder not found; rendering without narration");
        return Ok(BTreeMap::new());
    }
    let audio = storyreel::discover::find_scene_audio(dir)?;
    if audio.is_empty() {
        tracing::warn!(dir = %dir.display(), "no scene_<n> narration found; rendering without narration");
    }
    Ok(audio)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let request = make_request(&args.input)?;
    let result = storyreel::build_video(&request)?;

    if let Some(report) = &args.report {
        write_json(report, &result)?;
    }
    eprintln!("wrote {} ({})", result.video_path.display(), result.strategy);
    Ok(())
}

fn cmd_plan(args: InputArgs) -> anyhow::Result<()> {
    let request = make_request(&args)?;
    let tools = storyreel::MediaTools::detect(request.settings.ffmpeg.as_deref());
    let probe = storyreel::ToolProbe::new(tools);
    let timeline = storyreel::plan_timeline(&request, &probe)?;
    let json = serde_json::to_string_pretty(&timeline).context("serialize timeline")?;
    println!("{json}");
    Ok(())
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create report dir '{}'", parent.display()))?;
    }
    let f = std::fs::File::create(path)
        .with_context(|| format!("create report '{}'", path.display()))?;
    serde_json::to_writer_pretty(f, value)
        .with_context(|| format!("write report '{}'", path.display()))?;
    Ok(())
}
