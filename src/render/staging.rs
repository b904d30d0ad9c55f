use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::StoryreelResult;

const PARTIAL_NAME: &str = "output.partial.mp4";

/// Scratch directory for one render, created inside the output directory.
///
/// Holds the partial video and any intermediates (segments, concat manifest, mixed PCM). The
/// finished video is moved into place with [`Staging::commit`]; everything else is removed when
/// the staging value is dropped, on success and failure alike.
pub struct Staging {
    dir: Option<tempfile::TempDir>,
}

impl Staging {
    pub fn new(out_dir: &Path) -> StoryreelResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(".storyreel-")
            .tempdir_in(out_dir)
            .with_context(|| format!("create staging directory in '{}'", out_dir.display()))?;
        tracing::debug!(staging = %dir.path().display(), "created staging directory");
        Ok(Self { dir: Some(dir) })
    }

    pub fn path(&self) -> &Path {
        match &self.dir {
            Some(dir) => dir.path(),
            None => Path::new(""),
        }
    }

    /// Path of a scratch file inside the staging directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Where the encoder writes the video before it is committed.
    pub fn partial_path(&self) -> PathBuf {
        self.file(PARTIAL_NAME)
    }

    /// Move the partial video to `final_path`, replacing any existing file.
    ///
    /// The staging directory lives on the same filesystem as `final_path`, so this is a rename.
    pub fn commit(&self, final_path: &Path) -> StoryreelResult<()> {
        let partial = self.partial_path();
        std::fs::rename(&partial, final_path).with_context(|| {
            format!(
                "move '{}' to '{}'",
                partial.display(),
                final_path.display()
            )
        })?;
        Ok(())
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!(staging = %path.display(), error = %e, "failed to remove staging directory");
            }
        }
    }
}
