use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Locations of the external media tools found on this host.
///
/// Detection never fails: a missing tool is simply `None`, and each render strategy decides
/// whether it can work without it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaTools {
    /// `ffmpeg` binary, verified with `-version`.
    pub ffmpeg: Option<PathBuf>,
    /// `ffprobe` binary, verified with `-version`.
    pub ffprobe: Option<PathBuf>,
}

impl MediaTools {
    /// Find `ffmpeg` and `ffprobe`.
    ///
    /// With `ffmpeg_override` set, that binary is used instead of a `PATH` lookup, and `ffprobe`
    /// is looked for next to it first.
    pub fn detect(ffmpeg_override: Option<&Path>) -> Self {
        let ffmpeg = match ffmpeg_override {
            Some(path) => Some(path.to_path_buf()),
            None => which::which("ffmpeg").ok(),
        }
        .filter(|p| tool_runs(p));

        let sibling_probe = ffmpeg
            .as_deref()
            .and_then(Path::parent)
            .map(|dir| dir.join(exe_name("ffprobe")))
            .filter(|p| p.is_file());
        let ffprobe = sibling_probe
            .or_else(|| which::which("ffprobe").ok())
            .filter(|p| tool_runs(p));

        tracing::debug!(?ffmpeg, ?ffprobe, "detected media tools");
        Self { ffmpeg, ffprobe }
    }

    /// Tools record with nothing available.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn has_ffmpeg(&self) -> bool {
        self.ffmpeg.is_some()
    }
}

/// Return `true` when `path -version` runs and exits successfully.
pub fn tool_runs(path: &Path) -> bool {
    Command::new(path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn exe_name(stem: &str) -> String {
    if cfg!(windows) {
        format!("{stem}.exe")
    } else {
        stem.to_string()
    }
}
