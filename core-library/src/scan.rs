use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Whether `path` has one of `extensions` (lowercase, no dot), ignoring case.
pub fn has_audio_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Recursively collect audio files under `root`.
///
/// Unreadable subdirectories are logged and skipped. Blocking; run it on the
/// blocking pool.
pub fn scan_audio_files(root: &Path, extensions: &[String]) -> BTreeSet<PathBuf> {
    let mut found = BTreeSet::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry during scan");
                continue;
            }
        };
        if entry.file_type().is_file() && has_audio_extension(entry.path(), extensions) {
            found.insert(entry.into_path());
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        vec!["mp3".to_string(), "flac".to_string()]
    }

    #[test]
    fn test_extension_match_ignores_case() {
        assert!(has_audio_extension(Path::new("/m/a.MP3"), &exts()));
        assert!(has_audio_extension(Path::new("/m/a.flac"), &exts()));
        assert!(!has_audio_extension(Path::new("/m/cover.jpg"), &exts()));
        assert!(!has_audio_extension(Path::new("/m/mp3"), &exts()));
    }

    #[test]
    fn test_scan_recurses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Album")).unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"").unwrap();
        std::fs::write(dir.path().join("Album").join("b.flac"), b"").unwrap();
        std::fs::write(dir.path().join("Album").join("cover.jpg"), b"").unwrap();

        let found = scan_audio_files(dir.path(), &exts());
        assert_eq!(found.len(), 2);
        assert!(found.contains(&dir.path().join("Album").join("b.flac")));
    }
}
