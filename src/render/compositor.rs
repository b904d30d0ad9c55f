use std::collections::BTreeMap;
use std::path::Path;

use crate::audio::manifest::{FfmpegPcm, SegmentRole, build_audio_manifest};
use crate::audio::mix::{mix_manifest, write_mix_to_f32le_file};
use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
use crate::encode::sink::{AudioInputConfig, FrameSink, SinkConfig};
use crate::foundation::error::StoryreelResult;
use crate::media::decode::load_letterboxed_rgba8;
use crate::render::staging::Staging;
use crate::render::{OutputTarget, RenderResult, SceneTiming, StrategyKind};
use crate::timeline::model::Timeline;

/// Counters from one compositing pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComposeStats {
    /// Frames pushed to the sink.
    pub frames: u64,
    /// Largest number of decoded stills held at once.
    pub peak_resident_stills: usize,
}

/// Number of frames a timeline renders to at its fps.
pub fn total_frames(timeline: &Timeline) -> u64 {
    let frames = (timeline.total_duration() * f64::from(timeline.params.fps)).round();
    (frames.max(1.0)) as u64
}

/// Decoded stills for the scenes currently on screen.
///
/// Stills are decoded on first use and dropped once the playhead passes their scene's end, so
/// memory stays bounded by the number of overlapping scenes.
struct StillWindow<'a> {
    timeline: &'a Timeline,
    loaded: BTreeMap<usize, Vec<u8>>,
    peak: usize,
}

impl<'a> StillWindow<'a> {
    fn new(timeline: &'a Timeline) -> Self {
        Self {
            timeline,
            loaded: BTreeMap::new(),
            peak: 0,
        }
    }

    fn ensure(&mut self, pos: usize) -> StoryreelResult<()> {
        if !self.loaded.contains_key(&pos) {
            let scene = &self.timeline.scenes[pos];
            tracing::debug!(scene = scene.index, image = %scene.image_path.display(), "decoding still");
            let rgba = load_letterboxed_rgba8(&scene.image_path, self.timeline.params.resolution)?;
            self.loaded.insert(pos, rgba);
            self.peak = self.peak.max(self.loaded.len());
        }
        Ok(())
    }

    fn get(&self, pos: usize) -> &[u8] {
        self.loaded.get(&pos).map(Vec::as_slice).unwrap_or(&[])
    }

    fn evict_finished(&mut self, t: f64, keep: usize) {
        let scenes = &self.timeline.scenes;
        self.loaded.retain(|&pos, _| pos == keep || t < scenes[pos].end);
    }
}

/// Which stills make up the frame at time `t`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Layers {
    /// Topmost scene that has started.
    top: usize,
    /// Scene shown beneath `top` while it fades in, if any.
    under: Option<usize>,
    /// Opacity of `top`; `1.0` outside its fade-in.
    alpha: f64,
}

fn layers_at(timeline: &Timeline, t: f64) -> Layers {
    let scenes = &timeline.scenes;
    let top = scenes
        .iter()
        .rposition(|s| s.start <= t)
        .unwrap_or(0);

    let crossfade = timeline.params.crossfade_seconds;
    let into_scene = t - scenes[top].start;
    if top == 0 || crossfade <= 0.0 || into_scene >= crossfade {
        return Layers {
            top,
            under: None,
            alpha: 1.0,
        };
    }

    let under = (0..top)
        .rev()
        .find(|&i| scenes[i].start <= t && t < scenes[i].end);
    Layers {
        top,
        under,
        alpha: (into_scene / crossfade).clamp(0.0, 1.0),
    }
}

/// Blend `top` over `under` at `alpha` into `dst`. All buffers are opaque RGBA8.
fn crossfade_into(dst: &mut [u8], under: Option<&[u8]>, top: &[u8], alpha: f64) {
    let tt = ((alpha * 255.0).round() as i32).clamp(0, 255) as u16;
    let it = 255u16 - tt;
    match under {
        Some(under) => {
            for ((d, u), s) in dst.iter_mut().zip(under).zip(top) {
                *d = mul_div255(u16::from(*u), it).saturating_add(mul_div255(u16::from(*s), tt));
            }
        }
        None => {
            for (d, s) in dst.chunks_exact_mut(4).zip(top.chunks_exact(4)) {
                for i in 0..3 {
                    d[i] = mul_div255(u16::from(s[i]), tt);
                }
                d[3] = 255;
            }
        }
    }
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Compose every frame of `timeline` into `sink`.
///
/// Frame `f` shows time `f / fps`. Each scene after the first fades in over whatever is beneath
/// it for the first `crossfade_seconds` of its span; the final scene holds until the last frame.
pub fn compose_frames(
    timeline: &Timeline,
    sink: &mut dyn FrameSink,
    audio: Option<AudioInputConfig>,
) -> StoryreelResult<ComposeStats> {
    timeline.params.validate()?;
    let fps = timeline.params.fps;
    let resolution = timeline.params.resolution;
    let total = total_frames(timeline);

    sink.begin(SinkConfig {
        resolution,
        fps,
        audio,
    })?;

    let mut stats = ComposeStats::default();
    if timeline.is_empty() {
        sink.end()?;
        return Ok(stats);
    }

    let mut window = StillWindow::new(timeline);
    let mut frame = vec![0u8; resolution.rgba_len()];

    for f in 0..total {
        let t = f as f64 / f64::from(fps);
        let layers = layers_at(timeline, t);
        window.evict_finished(t, layers.top);
        window.ensure(layers.top)?;
        if let Some(under) = layers.under {
            window.ensure(under)?;
        }

        if layers.alpha >= 1.0 {
            sink.push_frame(f, window.get(layers.top))?;
        } else {
            crossfade_into(
                &mut frame,
                layers.under.map(|u| window.get(u)),
                window.get(layers.top),
                layers.alpha,
            );
            sink.push_frame(f, &frame)?;
        }
        stats.frames += 1;
    }

    sink.end()?;
    stats.peak_resident_stills = window.peak;
    Ok(stats)
}

/// Full compositor render: mix the soundtrack, stream frames to `ffmpeg`, publish the MP4.
#[tracing::instrument(skip_all, fields(scenes = timeline.len(), out = %target.final_path().display()))]
pub(crate) fn render_composited(
    timeline: &Timeline,
    target: &OutputTarget,
    ffmpeg: &Path,
) -> StoryreelResult<RenderResult> {
    super::ensure_parent_exists(target)?;
    let staging = Staging::new(&target.out_dir)?;
    let frames = total_frames(timeline);

    let manifest = build_audio_manifest(timeline, frames, &FfmpegPcm::new(ffmpeg));
    for seg in &manifest.segments {
        match seg.role {
            SegmentRole::Narration { scene } => tracing::debug!(
                scene,
                start_sample = seg.timeline_start_sample,
                end_sample = seg.timeline_end_sample,
                "scheduled narration"
            ),
            SegmentRole::Music => tracing::debug!(
                end_sample = seg.timeline_end_sample,
                volume = seg.volume,
                "scheduled background music"
            ),
        }
    }
    let mix_path = staging.file("mix.f32le");
    write_mix_to_f32le_file(&mix_manifest(&manifest), &mix_path)?;
    let audio = AudioInputConfig {
        path: mix_path,
        sample_rate: manifest.sample_rate,
        channels: manifest.channels,
    };

    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(ffmpeg, staging.partial_path()));
    let stats = compose_frames(timeline, &mut sink, Some(audio))?;
    drop(sink);

    let final_path = target.final_path();
    staging.commit(&final_path)?;
    tracing::info!(
        frames = stats.frames,
        peak_stills = stats.peak_resident_stills,
        video = %final_path.display(),
        "compositor render finished"
    );

    Ok(RenderResult {
        video_path: final_path,
        strategy: StrategyKind::Compositor,
        timings: timeline.scenes.iter().map(SceneTiming::from_scene).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::sink::InMemorySink;
    use crate::foundation::core::Resolution;
    use crate::timeline::model::{Scene, TimelineParams};
    use std::path::PathBuf;

    fn solid_png(dir: &Path, name: &str, rgb: [u8; 3]) -> PathBuf {
        let path = dir.join(name);
        image::RgbaImage::from_pixel(8, 8, image::Rgba([rgb[0], rgb[1], rgb[2], 255]))
            .save(&path)
            .unwrap();
        path
    }

    fn timeline(images: &[PathBuf], spans: &[(f64, f64)], crossfade: f64) -> Timeline {
        let scenes = images
            .iter()
            .zip(spans)
            .enumerate()
            .map(|(i, (img, &(start, end)))| Scene {
                index: i + 1,
                image_path: img.clone(),
                audio_path: None,
                duration: end - start,
                start,
                end,
            })
            .collect();
        Timeline {
            scenes,
            params: TimelineParams {
                fps: 10,
                resolution: Resolution::new(8, 8),
                crossfade_seconds: crossfade,
                min_scene_seconds: 1.0,
                head_pad: 0.0,
                tail_pad: 0.0,
                background_music: None,
            },
        }
    }

    fn pixel(frame: &[u8]) -> [u8; 4] {
        [frame[0], frame[1], frame[2], frame[3]]
    }

    #[test]
    fn frame_count_matches_total_duration() {
        let dir = tempfile::tempdir().unwrap();
        let red = solid_png(dir.path(), "a.png", [255, 0, 0]);
        let blue = solid_png(dir.path(), "b.png", [0, 0, 255]);
        let tl = timeline(&[red, blue], &[(0.0, 2.0), (1.5, 3.5)], 0.5);

        let mut sink = InMemorySink::new();
        let stats = compose_frames(&tl, &mut sink, None).unwrap();
        assert_eq!(stats.frames, 35);
        assert_eq!(sink.frames().len(), 35);
        assert!(sink.ended());
        assert_eq!(sink.config().unwrap().fps, 10);
    }

    #[test]
    fn later_scene_fades_in_over_earlier_one() {
        let dir = tempfile::tempdir().unwrap();
        let red = solid_png(dir.path(), "a.png", [255, 0, 0]);
        let blue = solid_png(dir.path(), "b.png", [0, 0, 255]);
        let tl = timeline(&[red, blue], &[(0.0, 2.0), (1.5, 3.5)], 0.5);

        let mut sink = InMemorySink::new();
        compose_frames(&tl, &mut sink, None).unwrap();
        let frames = sink.frames();

        assert_eq!(pixel(&frames[0].1), [255, 0, 0, 255]);
        assert_eq!(pixel(&frames[14].1), [255, 0, 0, 255]);

        // t = 1.7: blue is 40% in.
        let mid = pixel(&frames[17].1);
        assert!((i32::from(mid[0]) - 153).abs() <= 1, "{mid:?}");
        assert!((i32::from(mid[2]) - 102).abs() <= 1, "{mid:?}");
        assert_eq!(mid[3], 255);

        assert_eq!(pixel(&frames[20].1), [0, 0, 255, 255]);
        assert_eq!(pixel(&frames[34].1), [0, 0, 255, 255]);
    }

    #[test]
    fn zero_crossfade_is_a_hard_cut() {
        let dir = tempfile::tempdir().unwrap();
        let red = solid_png(dir.path(), "a.png", [255, 0, 0]);
        let blue = solid_png(dir.path(), "b.png", [0, 0, 255]);
        let tl = timeline(&[red, blue], &[(0.0, 1.0), (1.0, 2.0)], 0.0);

        let mut sink = InMemorySink::new();
        compose_frames(&tl, &mut sink, None).unwrap();
        let frames = sink.frames();
        assert_eq!(pixel(&frames[9].1), [255, 0, 0, 255]);
        assert_eq!(pixel(&frames[10].1), [0, 0, 255, 255]);
    }

    #[test]
    fn stills_are_released_after_their_scene() {
        let dir = tempfile::tempdir().unwrap();
        let images: Vec<_> = (0..5)
            .map(|i| solid_png(dir.path(), &format!("{i}.png"), [i * 40, 0, 0]))
            .collect();
        let spans = [(0.0, 2.0), (1.5, 3.5), (3.0, 5.0), (4.5, 6.5), (6.0, 8.0)];
        let tl = timeline(&images, &spans, 0.5);

        let mut sink = InMemorySink::new();
        let stats = compose_frames(&tl, &mut sink, None).unwrap();
        assert_eq!(stats.frames, 80);
        assert!(stats.peak_resident_stills <= 2, "{stats:?}");
    }

    #[test]
    fn undecodable_still_fails_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.png");
        std::fs::write(&bogus, b"not an image").unwrap();
        let tl = timeline(&[bogus], &[(0.0, 1.0)], 0.0);

        let mut sink = InMemorySink::new();
        assert!(compose_frames(&tl, &mut sink, None).is_err());
    }

    #[test]
    fn layers_fall_back_to_black_without_an_active_scene_below() {
        let tl = timeline(
            &[PathBuf::from("a.png"), PathBuf::from("b.png")],
            &[(0.0, 1.0), (1.0, 3.0)],
            0.5,
        );
        let l = layers_at(&tl, 1.25);
        assert_eq!(l.top, 1);
        assert_eq!(l.under, None);
        assert!((l.alpha - 0.5).abs() < 1e-9);

        let mut dst = vec![0u8; 4];
        crossfade_into(&mut dst, None, &[200, 100, 50, 255], 0.5);
        assert_eq!(dst, vec![100, 50, 25, 255]);
    }

    #[test]
    fn final_scene_holds_past_its_end() {
        let tl = timeline(&[PathBuf::from("a.png")], &[(0.0, 1.0)], 0.0);
        let l = layers_at(&tl, 1.05);
        assert_eq!(l.top, 0);
        assert_eq!(l.alpha, 1.0);
    }

    #[cfg(unix)]
    #[test]
    fn encoder_failure_leaves_no_output_or_staging() {
        use crate::test_support::{entries, ffmpeg_failing_on};

        let dir = tempfile::tempdir().unwrap();
        let red = solid_png(dir.path(), "a.png", [255, 0, 0]);
        let blue = solid_png(dir.path(), "b.png", [0, 0, 255]);
        let tl = timeline(&[red, blue], &[(0.0, 1.0), (1.0, 2.0)], 0.0);
        let bin = tempfile::tempdir().unwrap();
        let ffmpeg = ffmpeg_failing_on(bin.path(), 1, "boom");
        let out_dir = dir.path().join("videos");

        let err = render_composited(&tl, &OutputTarget::new(&out_dir, "v.mp4"), &ffmpeg)
            .unwrap_err();
        assert!(matches!(err, crate::StoryreelError::Encode(_)), "{err}");
        assert!(err.to_string().contains("boom"), "{err}");
        assert!(entries(&out_dir).is_empty(), "{:?}", entries(&out_dir));
    }

    #[cfg(unix)]
    #[test]
    fn successful_encode_is_committed_with_the_mixed_soundtrack() {
        use crate::test_support::{entries, recorded_calls, recording_ffmpeg};

        let dir = tempfile::tempdir().unwrap();
        let red = solid_png(dir.path(), "a.png", [255, 0, 0]);
        let blue = solid_png(dir.path(), "b.png", [0, 0, 255]);
        let tl = timeline(&[red, blue], &[(0.0, 2.0), (1.5, 3.5)], 0.5);
        let bin = tempfile::tempdir().unwrap();
        let ffmpeg = recording_ffmpeg(bin.path());
        let out_dir = dir.path().join("videos");
        let target = OutputTarget::new(&out_dir, "v.mp4");

        let result = render_composited(&tl, &target, &ffmpeg).unwrap();
        assert_eq!(result.strategy, StrategyKind::Compositor);
        assert_eq!(result.video_path, target.final_path());
        assert_eq!(entries(&out_dir), vec!["v.mp4".to_string()]);
        let starts: Vec<f64> = result.timings.iter().map(|t| t.start).collect();
        assert_eq!(starts, vec![0.0, 1.5]);

        let calls = recorded_calls(bin.path());
        assert_eq!(calls.len(), 1, "{calls:?}");
        assert!(calls[0].contains("-f rawvideo -pix_fmt rgba -s 8x8 -r 10"), "{}", calls[0]);
        assert!(calls[0].contains("-f f32le -ar 48000 -ac 2"), "{}", calls[0]);
    }
}
