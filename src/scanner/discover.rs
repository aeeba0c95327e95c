//! Folder and file discovery (spec §4.7 steps 2-3).

use super::types::DiscoveredFolder;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "mp4", "flac", "ogg", "opus", "wav", "aac"];

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Confirms a requested scan target exists, is a directory, and is at
/// least list-readable. Invalid targets are the caller's job to warn
/// on and discard.
pub fn validate_target(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    if !path.is_dir() {
        return Ok(false);
    }
    Ok(std::fs::read_dir(path).is_ok())
}

/// Walks `target` recursively, emitting every directory that directly
/// contains at least one audio file.
pub fn discover_folders(library_root: &Path, target: &Path) -> Result<Vec<DiscoveredFolder>> {
    let mut seen: HashSet<std::path::PathBuf> = HashSet::new();
    let mut folders = Vec::new();

    for entry in WalkDir::new(target).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() || !is_audio_file(entry.path()) {
            continue;
        }
        let parent = match entry.path().parent() {
            Some(p) => p.to_path_buf(),
            None => continue,
        };
        if !seen.insert(parent.clone()) {
            continue;
        }

        let audio_file_count = std::fs::read_dir(&parent)
            .context("reading folder for audio file count")?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false) && is_audio_file(&e.path()))
            .count() as i64;

        let metadata = std::fs::metadata(&parent)?;
        let mtime_ms = metadata
            .modified()?
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;

        let rel_path = parent
            .strip_prefix(library_root)
            .unwrap_or(&parent)
            .to_string_lossy()
            .replace('\\', "/");

        folders.push(DiscoveredFolder {
            abs_path: parent,
            rel_path,
            mtime_ms,
            audio_file_count,
        });
    }

    Ok(folders)
}

/// Lists audio files directly inside `folder` (non-recursive).
pub fn list_audio_files(folder: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && is_audio_file(&entry.path()) {
            files.push(entry.path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_audio_file_recognizes_whitelisted_extensions() {
        assert!(is_audio_file(Path::new("/a/song.mp3")));
        assert!(is_audio_file(Path::new("/a/song.FLAC")));
        assert!(is_audio_file(Path::new("/a/video-tagged-audio.mp4")));
        assert!(!is_audio_file(Path::new("/a/cover.jpg")));
        assert!(!is_audio_file(Path::new("/a/readme")));
    }

    #[test]
    fn test_validate_target_rejects_missing_path() {
        assert!(!validate_target(Path::new("/definitely/not/a/real/path")).unwrap());
    }
}
