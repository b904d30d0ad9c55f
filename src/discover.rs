//! Find `scene_<n>` images and narration files in a directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::StoryreelResult;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac"];

/// Scene number embedded in a file stem such as `scene_12` or `Scene_3_final`.
pub fn scene_number(file_name: &str) -> Option<usize> {
    let lower = file_name.to_ascii_lowercase();
    let at = lower.find("scene_")?;
    let digits: String = lower[at + "scene_".len()..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Image files in `dir`, ordered by scene number; files without one come last, by name.
pub fn find_images(dir: &Path) -> StoryreelResult<Vec<PathBuf>> {
    let mut images = files_with_extensions(dir, IMAGE_EXTENSIONS)?;
    images.sort_by_cached_key(|p| {
        let name = file_name(p);
        (scene_number(&name).unwrap_or(usize::MAX), name)
    });
    Ok(images)
}

/// Narration files in `dir`, keyed `scene_<n>` by the number in their name.
///
/// Files without a scene number are skipped. When two files share a number the first by name
/// wins.
pub fn find_scene_audio(dir: &Path) -> StoryreelResult<BTreeMap<String, PathBuf>> {
    let mut files = files_with_extensions(dir, AUDIO_EXTENSIONS)?;
    files.sort();
    let mut out = BTreeMap::new();
    for path in files {
        let name = file_name(&path);
        match scene_number(&name) {
            Some(n) => {
                out.entry(format!("scene_{n}")).or_insert(path);
            }
            None => tracing::debug!(file = %name, "audio file has no scene number; skipped"),
        }
    }
    Ok(out)
}

fn files_with_extensions(dir: &Path, extensions: &[&str]) -> StoryreelResult<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read directory '{}'", dir.display()))?;
    let mut out = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("list directory '{}'", dir.display()))?
            .path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)));
        if matches && path.is_file() {
            out.push(path);
        }
    }
    Ok(out)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths.iter().map(|p| file_name(p)).collect()
    }

    #[test]
    fn scene_numbers_are_found_anywhere_in_the_name() {
        assert_eq!(scene_number("scene_1.png"), Some(1));
        assert_eq!(scene_number("Scene_12_final.jpg"), Some(12));
        assert_eq!(scene_number("story_scene_3.mp3"), Some(3));
        assert_eq!(scene_number("scene_.png"), None);
        assert_eq!(scene_number("cover.png"), None);
    }

    #[test]
    fn images_sort_numerically_with_unnumbered_last() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["scene_10.png", "scene_2.JPG", "scene_1.jpeg", "cover.png", "notes.txt"] {
            touch(dir.path(), name);
        }
        std::fs::create_dir(dir.path().join("scene_3.png")).unwrap();

        let images = find_images(dir.path()).unwrap();
        assert_eq!(
            names(&images),
            vec!["scene_1.jpeg", "scene_2.JPG", "scene_10.png", "cover.png"]
        );
    }

    #[test]
    fn narration_is_keyed_by_scene() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["scene_1.mp3", "scene_3.wav", "theme.mp3", "scene_2.png"] {
            touch(dir.path(), name);
        }
        let audio = find_scene_audio(dir.path()).unwrap();
        assert_eq!(audio.keys().collect::<Vec<_>>(), vec!["scene_1", "scene_3"]);
        assert_eq!(audio["scene_3"], dir.path().join("scene_3.wav"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(find_images(Path::new("/definitely/not/a/dir")).is_err());
    }
}
