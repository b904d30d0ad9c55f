use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::media::probe::DurationProbe;
use crate::timeline::duration::DurationEstimator;
use crate::timeline::model::{Scene, SceneAsset, Timeline, TimelineParams};

/// Turns ordered [`SceneAsset`]s into a [`Timeline`].
pub struct TimelineBuilder<'a> {
    estimator: DurationEstimator<'a>,
}

impl<'a> TimelineBuilder<'a> {
    pub fn new(probe: &'a dyn DurationProbe) -> Self {
        Self {
            estimator: DurationEstimator::new(probe),
        }
    }

    /// Time every scene in input order.
    ///
    /// Each scene starts `crossfade_seconds` before the previous one ends. When a scene is
    /// shorter than the crossfade the overlap is clamped so the next scene never starts before it
    /// does, which shortens the effective transition for that pair.
    #[tracing::instrument(skip_all, fields(scenes = scenes.len()))]
    pub fn build(&self, scenes: &[SceneAsset], params: TimelineParams) -> StoryreelResult<Timeline> {
        if scenes.is_empty() {
            return Err(StoryreelError::empty_input("timeline needs at least one scene"));
        }
        params.validate()?;
        for (pos, asset) in scenes.iter().enumerate() {
            if asset.index != pos + 1 {
                return Err(StoryreelError::validation(format!(
                    "scene indices must be 1..N in order: position {} has index {}",
                    pos + 1,
                    asset.index
                )));
            }
            if !asset.image_path.is_file() {
                return Err(StoryreelError::missing_asset("image", &asset.image_path));
            }
        }

        let crossfade = params.crossfade_seconds;
        let mut cursor = 0.0f64;
        let mut out = Vec::with_capacity(scenes.len());
        for asset in scenes {
            let audio_path = asset.audio_path.clone().filter(|p| p.is_file());
            if audio_path.is_none()
                && let Some(missing) = &asset.audio_path
            {
                tracing::warn!(
                    scene = asset.index,
                    audio = %missing.display(),
                    "narration file missing; scene will be silent"
                );
            }

            let duration = self.estimator.estimate(
                audio_path.as_deref(),
                params.min_scene_seconds,
                params.head_pad,
                params.tail_pad,
            );
            let start = cursor;
            let end = start + duration;
            out.push(Scene {
                index: asset.index,
                image_path: asset.image_path.clone(),
                audio_path,
                duration,
                start,
                end,
            });
            cursor = (end - crossfade).max(start);
        }

        let timeline = Timeline {
            scenes: out,
            params,
        };
        tracing::debug!(
            total = timeline.total_duration(),
            nominal = timeline.nominal_duration(),
            "timeline built"
        );
        Ok(timeline)
    }
}
