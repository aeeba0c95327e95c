//! Chromaprint-based move detection (spec §4.7 step 8).
//!
//! Ported from `nomarr/components/library/move_detection_comp.py`:
//! sort removed candidates by id for deterministic matching, compute a
//! chromaprint for each new file, match against removed files with a
//! stored chromaprint within a ±1s duration tolerance, first match wins.

use super::types::{DiscoveredFile, MetadataExtractor, RawMetadata};
use crate::store::LibraryFile;
use tracing::{info, warn};

const DURATION_TOLERANCE_MS: i64 = 1000;

#[derive(Debug, Clone)]
pub struct DetectedMove {
    pub file_id: i64,
    pub old_path: String,
    pub new_path: String,
    pub new_abs_path: String,
    pub new_size: i64,
    pub new_mtime_ms: i64,
    pub new_duration_ms: Option<i64>,
    pub chromaprint: String,
}

#[derive(Debug, Default)]
pub struct MoveDetectionResult {
    pub moves: Vec<DetectedMove>,
    pub collisions_detected: usize,
}

/// Cheaply gated by the caller: only run this when the library already
/// has at least one file with a stored chromaprint.
pub fn detect_moves(
    removed: &[LibraryFile],
    discovered: &[DiscoveredFile],
    raw_metadata_by_path: &std::collections::HashMap<String, RawMetadata>,
    extractor: &dyn MetadataExtractor,
) -> MoveDetectionResult {
    if removed.is_empty() || discovered.is_empty() {
        return MoveDetectionResult::default();
    }
    if !removed.iter().any(|f| f.chromaprint.is_some()) {
        info!(
            removed = removed.len(),
            "no chromaprints in library, skipping move detection"
        );
        return MoveDetectionResult::default();
    }

    let mut candidates: Vec<&LibraryFile> = removed.iter().collect();
    candidates.sort_by_key(|f| f.id);

    let mut matched: std::collections::HashSet<i64> = std::collections::HashSet::new();
    let mut moves = Vec::new();
    let mut collisions = 0usize;

    for new_file in discovered {
        let chromaprint = match extractor.chromaprint(&new_file.abs_path) {
            Ok(fp) => fp,
            Err(e) => {
                warn!(path = %new_file.abs_path.display(), error = %e, "failed to compute chromaprint");
                continue;
            }
        };

        let new_duration_ms = raw_metadata_by_path
            .get(&new_file.normalized_path)
            .and_then(|m| m.duration_ms);

        for candidate in &candidates {
            if matched.contains(&candidate.id) {
                continue;
            }
            let removed_fp = match &candidate.chromaprint {
                Some(fp) => fp,
                None => continue,
            };
            if removed_fp != &chromaprint {
                continue;
            }

            let duration_matches = match (candidate.duration_ms, new_duration_ms) {
                (Some(old), Some(new)) => (old - new).abs() <= DURATION_TOLERANCE_MS,
                _ => true,
            };

            if duration_matches {
                info!(old = %candidate.normalized_path, new = %new_file.normalized_path, "file moved");
                moves.push(DetectedMove {
                    file_id: candidate.id,
                    old_path: candidate.normalized_path.clone(),
                    new_path: new_file.normalized_path.clone(),
                    new_abs_path: new_file.abs_path.to_string_lossy().to_string(),
                    new_size: new_file.size_bytes,
                    new_mtime_ms: new_file.mtime_ms,
                    new_duration_ms,
                    chromaprint: chromaprint.clone(),
                });
                matched.insert(candidate.id);
                break;
            }

            collisions += 1;
            warn!(
                old = %candidate.normalized_path,
                new = %new_file.normalized_path,
                "chromaprint collision, durations differ too much to be a move"
            );
        }
    }

    MoveDetectionResult {
        moves,
        collisions_detected: collisions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    struct FixedExtractor {
        fingerprint: String,
    }

    impl MetadataExtractor for FixedExtractor {
        fn extract(&self, _path: &Path) -> anyhow::Result<RawMetadata> {
            Ok(RawMetadata::default())
        }
        fn chromaprint(&self, _path: &Path) -> anyhow::Result<String> {
            Ok(self.fingerprint.clone())
        }
    }

    fn removed_file(id: i64, path: &str, chromaprint: Option<&str>, duration_ms: Option<i64>) -> LibraryFile {
        LibraryFile {
            id,
            library_id: 1,
            abs_path: format!("/music/{}", path),
            normalized_path: path.to_string(),
            size_bytes: 100,
            mtime_ms: 1,
            duration_ms,
            title: None,
            artist_summary: None,
            needs_tagging: false,
            tagged: true,
            scan_id: "s0".to_string(),
            chromaprint: chromaprint.map(|s| s.to_string()),
            version_tag: None,
        }
    }

    fn discovered(path: &str) -> DiscoveredFile {
        DiscoveredFile {
            abs_path: std::path::PathBuf::from(format!("/music/{}", path)),
            normalized_path: path.to_string(),
            size_bytes: 100,
            mtime_ms: 2,
        }
    }

    #[test]
    fn test_no_chromaprints_in_library_skips_detection() {
        let removed = vec![removed_file(1, "old.mp3", None, Some(180_000))];
        let discovered = vec![discovered("new.mp3")];
        let extractor = FixedExtractor { fingerprint: "fp1".into() };
        let result = detect_moves(&removed, &discovered, &HashMap::new(), &extractor);
        assert!(result.moves.is_empty());
    }

    #[test]
    fn test_matching_chromaprint_and_duration_is_a_move() {
        let removed = vec![removed_file(1, "old.mp3", Some("fp1"), Some(180_000))];
        let discovered = vec![discovered("new.mp3")];
        let mut meta = HashMap::new();
        meta.insert("new.mp3".to_string(), RawMetadata { duration_ms: Some(180_500), ..Default::default() });
        let extractor = FixedExtractor { fingerprint: "fp1".into() };

        let result = detect_moves(&removed, &discovered, &meta, &extractor);
        assert_eq!(result.moves.len(), 1);
        assert_eq!(result.moves[0].old_path, "old.mp3");
        assert_eq!(result.moves[0].new_path, "new.mp3");
    }

    #[test]
    fn test_matching_fingerprint_but_bad_duration_is_collision() {
        let removed = vec![removed_file(1, "old.mp3", Some("fp1"), Some(180_000))];
        let discovered = vec![discovered("new.mp3")];
        let mut meta = HashMap::new();
        meta.insert("new.mp3".to_string(), RawMetadata { duration_ms: Some(300_000), ..Default::default() });
        let extractor = FixedExtractor { fingerprint: "fp1".into() };

        let result = detect_moves(&removed, &discovered, &meta, &extractor);
        assert!(result.moves.is_empty());
        assert_eq!(result.collisions_detected, 1);
    }
}
