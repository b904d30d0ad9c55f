use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use storyreel::{
    BuildVideoRequest, ComposeSettings, MediaTools, RenderStrategy, RendererChoice, Resolution,
    StrategyKind, ToolProbe, build_video, build_video_with,
};

fn ffmpeg_tools_available() -> bool {
    let ok = |tool: &str| {
        Command::new(tool)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    };
    ok("ffmpeg") && ok("ffprobe")
}

fn synth_tone(path: &Path, seconds: f64) -> anyhow::Result<()> {
    let status = Command::new("ffmpeg")
        .args([
            "-v",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=220:sample_rate=48000",
            "-t",
            &seconds.to_string(),
            "-c:a",
            "pcm_s16le",
        ])
        .arg(path)
        .status()?;
    anyhow::ensure!(status.success(), "ffmpeg failed creating {}", path.display());
    Ok(())
}

fn probe_seconds(path: &Path) -> f64 {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .unwrap();
    String::from_utf8_lossy(&out.stdout).trim().parse().unwrap()
}

fn stream_types(path: &Path) -> Vec<String> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "stream=codec_type",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .unwrap();
    String::from_utf8_lossy(&out.stdout)
        .lines()
        .map(str::to_owned)
        .collect()
}

/// Three stills of different shapes plus narration for scenes 1 and 3.
fn fixture(root: &Path) -> (Vec<PathBuf>, BTreeMap<String, PathBuf>) {
    let shapes = [(64, 36), (20, 40), (50, 50)];
    let images = shapes
        .iter()
        .enumerate()
        .map(|(i, &(w, h))| {
            let p = root.join(format!("scene_{}.png", i + 1));
            image::RgbaImage::from_pixel(w, h, image::Rgba([40 * i as u8, 90, 200, 255]))
                .save(&p)
                .unwrap();
            p
        })
        .collect();

    let mut audio = BTreeMap::new();
    for (scene, seconds) in [(1, 1.5), (3, 0.5)] {
        let p = root.join(format!("scene_{scene}.wav"));
        synth_tone(&p, seconds).unwrap();
        audio.insert(format!("scene_{scene}"), p);
    }
    (images, audio)
}

fn request(root: &Path, renderer: RendererChoice) -> BuildVideoRequest {
    let (images, scene_audio) = fixture(root);
    BuildVideoRequest {
        images,
        scene_audio,
        out_dir: root.join("videos"),
        title: "Pipeline: Test".to_owned(),
        settings: ComposeSettings {
            fps: 10,
            resolution: Resolution::new(64, 36),
            crossfade_sec: 0.3,
            min_scene_seconds: 1.0,
            head_pad: 0.1,
            tail_pad: 0.1,
            renderer,
            ..ComposeSettings::default()
        },
    }
}

fn staging_left_behind(out_dir: &Path) -> bool {
    std::fs::read_dir(out_dir)
        .unwrap()
        .any(|e| e.unwrap().file_name().to_string_lossy().starts_with(".storyreel-"))
}

#[test]
fn compositor_renders_overlapped_timeline() {
    if !ffmpeg_tools_available() {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let req = request(root.path(), RendererChoice::Compositor);

    let result = build_video(&req).unwrap();
    assert_eq!(result.strategy, StrategyKind::Compositor);
    assert_eq!(result.video_path, req.out_dir.join("Pipeline_ Test.mp4"));
    assert!(result.video_path.is_file());
    assert!(!staging_left_behind(&req.out_dir));

    // durations [1.7, 1.0, 1.0], crossfade 0.3 -> starts [0, 1.4, 2.1], total 3.1
    let starts: Vec<f64> = result.timings.iter().map(|t| t.start).collect();
    assert_eq!(starts.len(), 3);
    assert!((starts[1] - 1.4).abs() < 0.05, "{starts:?}");
    assert!((starts[2] - 2.1).abs() < 0.05, "{starts:?}");

    let seconds = probe_seconds(&result.video_path);
    assert!((seconds - 3.1).abs() < 0.25, "duration {seconds}");
    let streams = stream_types(&result.video_path);
    assert!(streams.contains(&"video".to_owned()));
    assert!(streams.contains(&"audio".to_owned()));
}

#[test]
fn concat_renderer_lays_scenes_back_to_back() {
    if !ffmpeg_tools_available() {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let req = request(root.path(), RendererChoice::Ffmpeg);

    let result = build_video(&req).unwrap();
    assert_eq!(result.strategy, StrategyKind::FfmpegConcat);
    assert!(result.video_path.is_file());
    assert!(!staging_left_behind(&req.out_dir));

    let ends: Vec<f64> = result.timings.iter().map(|t| t.end).collect();
    assert!((ends[2] - 3.7).abs() < 0.05, "{ends:?}");
    assert_eq!(result.timings[1].audio, None);

    let seconds = probe_seconds(&result.video_path);
    assert!((seconds - 3.7).abs() < 0.35, "duration {seconds}");
}

#[test]
fn unavailable_compositor_falls_back_to_concat() {
    if !ffmpeg_tools_available() {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let req = request(root.path(), RendererChoice::Auto);
    let tools = MediaTools::detect(None);
    let probe = ToolProbe::new(tools.clone());
    let strategies: Vec<Box<dyn RenderStrategy>> = vec![
        Box::new(storyreel::PrimaryRenderer::new(MediaTools::none())),
        Box::new(storyreel::FallbackRenderer::new(tools)),
    ];

    let result = build_video_with(&req, &probe, &strategies).unwrap();
    assert_eq!(result.strategy, StrategyKind::FfmpegConcat);
    assert_eq!(result.timings.len(), 3);
    assert!(result.video_path.is_file());
}
