use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::error::{StoryreelError, StoryreelResult};

/// Options for [`FfmpegSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// `ffmpeg` binary to spawn.
    pub ffmpeg: PathBuf,
    /// Output MP4 file path.
    pub out_path: PathBuf,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
}

impl FfmpegSinkOpts {
    pub fn new(ffmpeg: impl Into<PathBuf>, out_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            out_path: out_path.into(),
            overwrite: true,
        }
    }
}

/// Sink that spawns `ffmpeg` and streams raw RGBA frames into its stdin.
///
/// Dropping a sink that was started but never ended kills and reaps the encoder, so an error
/// anywhere in the render loop cannot leak the child process.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    frame_len: usize,
    last_idx: Option<u64>,
}

impl FfmpegSink {
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            frame_len: 0,
            last_idx: None,
        }
    }

    fn command(&self, cfg: &SinkConfig) -> StoryreelResult<Command> {
        let mut cmd = Command::new(&self.opts.ffmpeg);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if self.opts.overwrite { "-y" } else { "-n" });

        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &cfg.resolution.to_string(),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
        ]);

        if let Some(audio) = cfg.audio.as_ref() {
            if audio.sample_rate == 0 || audio.channels == 0 {
                return Err(StoryreelError::validation(
                    "audio sample_rate and channels must be non-zero when audio is enabled",
                ));
            }
            cmd.args([
                "-f",
                "f32le",
                "-ar",
                &audio.sample_rate.to_string(),
                "-ac",
                &audio.channels.to_string(),
                "-i",
            ])
            .arg(&audio.path)
            .args(["-c:a", "aac", "-b:a", "192k", "-shortest"]);
        } else {
            cmd.arg("-an");
        }

        cmd.args([
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-tune",
            "stillimage",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&self.opts.out_path);
        Ok(cmd)
    }

    /// Kill a still-running encoder, reap it and return whatever it wrote to stderr.
    ///
    /// Failures along the way are logged only.
    fn abort(&mut self) -> Vec<u8> {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                tracing::warn!(error = %e, "failed to kill ffmpeg encoder");
            }
            if let Err(e) = child.wait() {
                tracing::warn!(error = %e, "failed to reap ffmpeg encoder");
            }
        }
        match self.stderr_drain.take().map(|h| h.join()) {
            Some(Ok(Ok(bytes))) => bytes,
            Some(Ok(Err(e))) => {
                tracing::warn!(error = %e, "failed to read ffmpeg stderr");
                Vec::new()
            }
            Some(Err(_)) => {
                tracing::warn!("ffmpeg stderr drain thread panicked");
                Vec::new()
            }
            None => Vec::new(),
        }
    }
}

fn with_stderr(msg: String, stderr_bytes: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr_bytes);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        msg
    } else {
        format!("{msg}: {stderr}")
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> StoryreelResult<()> {
        if self.child.is_some() {
            return Err(StoryreelError::encode("ffmpeg sink already started"));
        }
        if cfg.fps == 0 {
            return Err(StoryreelError::validation("fps must be non-zero"));
        }
        cfg.resolution.validate()?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(StoryreelError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }

        let mut child = self.command(&cfg)?.spawn().map_err(|e| {
            StoryreelError::encoder_unavailable(format!(
                "failed to spawn ffmpeg '{}': {e}",
                self.opts.ffmpeg.display()
            ))
        })?;

        let stdin = child.stdin.take();
        let stderr = child.stderr.take();
        let (Some(stdin), Some(mut stderr)) = (stdin, stderr) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(StoryreelError::encode("failed to open ffmpeg pipes (unexpected)"));
        };
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        self.frame_len = cfg.resolution.rgba_len();
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: u64, rgba: &[u8]) -> StoryreelResult<()> {
        if let Some(last) = self.last_idx
            && idx <= last
        {
            return Err(StoryreelError::encode(
                "ffmpeg sink received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);

        if rgba.len() != self.frame_len {
            return Err(StoryreelError::validation(format!(
                "frame size mismatch: got {} bytes, expected {}",
                rgba.len(),
                self.frame_len
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(StoryreelError::encode("ffmpeg sink is not accepting frames"));
        };

        use std::io::Write as _;
        if let Err(e) = stdin.write_all(rgba) {
            let stderr_bytes = self.abort();
            return Err(StoryreelError::encode(with_stderr(
                format!("failed to write frame {idx} to ffmpeg stdin: {e}"),
                &stderr_bytes,
            )));
        }
        Ok(())
    }

    fn end(&mut self) -> StoryreelResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| StoryreelError::encode("ffmpeg sink not started"))?;

        let status = child.wait().map_err(|e| {
            StoryreelError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| StoryreelError::encode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| StoryreelError::encode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            return Err(StoryreelError::encode(with_stderr(
                format!("ffmpeg exited with status {status}"),
                &stderr_bytes,
            )));
        }
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            tracing::debug!(out = %self.opts.out_path.display(), "aborting unfinished ffmpeg encode");
            self.abort();
        }
    }
}
