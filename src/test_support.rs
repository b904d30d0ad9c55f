//! Stand-in `ffmpeg` scripts for unit tests that exercise the process plumbing.

use std::path::{Path, PathBuf};

/// Write an executable `sh` script named `name` into `dir`.
pub(crate) fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt as _;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Fake `ffmpeg` that appends each command line to `dir/calls.log`, copies any concat list it is
/// given to `dir/manifest.txt`, drains stdin when it is a pipe, and creates its output file
/// (the last argument).
pub(crate) fn recording_ffmpeg(dir: &Path) -> PathBuf {
    let log = dir.join("calls.log");
    let manifest = dir.join("manifest.txt");
    let body = format!(
        r#"echo "$@" >> '{log}'
prev=''
list=''
concat=0
for arg; do
  if [ "$prev" = "-i" ] && [ "$concat" = 1 ]; then list="$arg"; fi
  if [ "$arg" = "concat" ]; then concat=1; fi
  if [ "$arg" = "pipe:0" ]; then cat > /dev/null; fi
  prev="$arg"
  last="$arg"
done
if [ -n "$list" ]; then cp "$list" '{manifest}'; fi
: > "$last""#,
        log = log.display(),
        manifest = manifest.display(),
    );
    fake_tool(dir, "ffmpeg", &body)
}

/// Fake `ffmpeg` that writes `message` to stderr and exits 1 on its `nth` run (1-based), and
/// otherwise behaves like a successful encode.
pub(crate) fn ffmpeg_failing_on(dir: &Path, nth: u32, message: &str) -> PathBuf {
    let count = dir.join("runs");
    let body = format!(
        r#"n=$(cat '{count}' 2>/dev/null || echo 0)
n=$((n + 1))
echo "$n" > '{count}'
for arg; do last="$arg"; done
if [ "$n" -eq {nth} ]; then
  echo '{message}' >&2
  exit 1
fi
: > "$last""#,
        count = count.display(),
    );
    fake_tool(dir, "ffmpeg", &body)
}

/// Lines of the log written by [`recording_ffmpeg`].
pub(crate) fn recorded_calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_owned)
        .collect()
}

/// Entries left in `dir`, by file name.
pub(crate) fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
