use std::path::Path;

use crate::media::probe::DurationProbe;

/// Decides how long each scene stays on screen.
pub struct DurationEstimator<'a> {
    probe: &'a dyn DurationProbe,
}

impl<'a> DurationEstimator<'a> {
    pub fn new(probe: &'a dyn DurationProbe) -> Self {
        Self { probe }
    }

    /// On-screen duration for a scene narrated by `audio_path`.
    ///
    /// - no audio, or a path that does not exist: `min_seconds`
    /// - audio of length `d`: `max(min_seconds, d + head_pad + tail_pad)`
    /// - audio that cannot be probed: `max(min_seconds, head_pad + tail_pad)`
    ///
    /// A bad audio asset degrades its own scene and never fails the render.
    pub fn estimate(
        &self,
        audio_path: Option<&Path>,
        min_seconds: f64,
        head_pad: f64,
        tail_pad: f64,
    ) -> f64 {
        let Some(path) = audio_path.filter(|p| p.is_file()) else {
            return min_seconds;
        };
        match self.probe.probe_seconds(path) {
            Ok(d) => min_seconds.max(d + head_pad + tail_pad),
            Err(e) => {
                tracing::warn!(
                    audio = %path.display(),
                    error = %e,
                    "audio length unavailable; using padded minimum"
                );
                min_seconds.max(head_pad + tail_pad)
            }
        }
    }
}
