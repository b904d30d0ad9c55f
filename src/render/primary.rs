use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::media::tools::MediaTools;
use crate::render::{OutputTarget, RenderResult, RenderStrategy, StrategyKind};
use crate::timeline::model::Timeline;

/// Frame compositor with crossfades and a mixed soundtrack.
///
/// Reports itself unavailable when the crate was built without the `compositor` feature or when
/// no working `ffmpeg` was found to encode its frames.
#[derive(Clone, Debug)]
pub struct PrimaryRenderer {
    #[cfg_attr(not(feature = "compositor"), allow(dead_code))]
    tools: MediaTools,
}

impl PrimaryRenderer {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }

    /// Whether this build carries the compositor.
    pub const fn compiled_in() -> bool {
        cfg!(feature = "compositor")
    }
}

impl RenderStrategy for PrimaryRenderer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Compositor
    }

    #[cfg(feature = "compositor")]
    fn render(&self, timeline: &Timeline, target: &OutputTarget) -> StoryreelResult<RenderResult> {
        let Some(ffmpeg) = self.tools.ffmpeg.as_deref() else {
            return Err(StoryreelError::backend_unavailable(
                "compositor needs ffmpeg to encode frames, but none was found",
            ));
        };
        if timeline.is_empty() {
            return Err(StoryreelError::empty_input("timeline has no scenes"));
        }
        super::compositor::render_composited(timeline, target, ffmpeg)
    }

    #[cfg(not(feature = "compositor"))]
    fn render(&self, _timeline: &Timeline, _target: &OutputTarget) -> StoryreelResult<RenderResult> {
        Err(StoryreelError::backend_unavailable(
            "compositor support was not compiled in (enable the `compositor` feature)",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Resolution;
    use crate::timeline::model::TimelineParams;

    fn empty_timeline() -> Timeline {
        Timeline {
            scenes: Vec::new(),
            params: TimelineParams {
                fps: 30,
                resolution: Resolution::HD,
                crossfade_seconds: 0.3,
                min_scene_seconds: 2.0,
                head_pad: 0.15,
                tail_pad: 0.15,
                background_music: None,
            },
        }
    }

    #[test]
    fn without_ffmpeg_the_compositor_is_unavailable() {
        let out = tempfile::tempdir().unwrap();
        let r = PrimaryRenderer::new(MediaTools::none());
        let err = r
            .render(&empty_timeline(), &OutputTarget::new(out.path(), "x.mp4"))
            .unwrap_err();
        assert!(matches!(err, StoryreelError::BackendUnavailable(_)), "{err}");
        assert!(std::fs::read_dir(out.path()).unwrap().next().is_none());
    }

    #[test]
    fn reports_its_kind() {
        assert_eq!(
            PrimaryRenderer::new(MediaTools::none()).kind(),
            StrategyKind::Compositor
        );
    }

    #[test]
    fn unavailability_names_what_this_build_lacks() {
        let out = tempfile::tempdir().unwrap();
        let err = PrimaryRenderer::new(MediaTools::none())
            .render(&empty_timeline(), &OutputTarget::new(out.path(), "x.mp4"))
            .unwrap_err();
        let msg = err.to_string();
        if PrimaryRenderer::compiled_in() {
            assert!(msg.contains("needs ffmpeg"), "{msg}");
        } else {
            assert!(msg.contains("not compiled in"), "{msg}");
        }
    }
}
