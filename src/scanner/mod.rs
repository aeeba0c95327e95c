//! Library scanner: synchronizes a [`crate::store::Library`] with the
//! filesystem. Full and incremental scans share every phase except
//! cache-gating and missing-file deletion (spec §4.7).
//!
//! Grounded on the `nomarr/components/library/*` family — see
//! `discover`, `tag_normalization`, `missing_detection`, and
//! `move_detection` submodules for the specific file each phase ports.

mod discover;
mod missing_detection;
mod move_detection;
mod tag_normalization;
mod types;

pub use discover::is_audio_file;
pub use tag_normalization::NormalizationRules;
pub use types::{MetadataExtractor, RawMetadata, ScanOutcome};

use crate::broker::StateBroker;
use crate::error::{EngineError, Result};
use crate::store::{FileMove, Library, LibraryFile, LibraryScan, LibraryScanStatus, LibraryStore};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use types::DiscoveredFile;

pub struct LibraryScanner<S: LibraryStore> {
    store: Arc<S>,
    broker: Option<Arc<StateBroker>>,
    extractor: Arc<dyn MetadataExtractor>,
    rules: NormalizationRules,
}

impl<S: LibraryStore> LibraryScanner<S> {
    pub fn new(
        store: Arc<S>,
        broker: Option<Arc<StateBroker>>,
        extractor: Arc<dyn MetadataExtractor>,
        rules: NormalizationRules,
    ) -> Self {
        Self { store, broker, extractor, rules }
    }

    /// Runs a full scan: every discovered folder is scanned, unmatched
    /// missing files are deleted, stale folder-cache rows are cleaned.
    pub fn scan_full(&self, library: &Library) -> Result<LibraryScan> {
        self.scan(library, true)
    }

    /// Runs an incremental scan: folders whose cached mtime and file
    /// count both still match are skipped outright; unmatched missing
    /// files are left alone (targets outside the scan are authoritative).
    pub fn scan_incremental(&self, library: &Library) -> Result<LibraryScan> {
        self.scan(library, false)
    }

    fn scan(&self, library: &Library, full: bool) -> Result<LibraryScan> {
        let scan_id = format!("{}-{}", library.id, crate::store::now_ms());
        let started_at_ms = crate::store::now_ms();

        self.store
            .set_scan_status(library.id, LibraryScanStatus::Scanning, None)
            .map_err(EngineError::Other)?;
        self.store
            .begin_scan(library.id, &scan_id, started_at_ms)
            .map_err(EngineError::Other)?;

        match self.run_phases(library, full, &scan_id, started_at_ms) {
            Ok(scan) => {
                self.store
                    .set_scan_status(library.id, LibraryScanStatus::Complete, None)
                    .map_err(EngineError::Other)?;
                self.store.finish_scan(&scan).map_err(EngineError::Other)?;
                Ok(scan)
            }
            Err(e) => {
                let message = e.to_string();
                self.store
                    .set_scan_status(library.id, LibraryScanStatus::Error, Some(&message))
                    .map_err(EngineError::Other)?;
                let failed = LibraryScan {
                    id: scan_id,
                    library_id: library.id,
                    status: LibraryScanStatus::Error,
                    started_at_ms,
                    finished_at_ms: Some(crate::store::now_ms()),
                    folders_scanned: 0,
                    folders_skipped: 0,
                    files_added: 0,
                    files_updated: 0,
                    files_removed: 0,
                    files_moved: 0,
                    files_errored: 0,
                    error_message: Some(message),
                };
                let _ = self.store.finish_scan(&failed);
                Err(e)
            }
        }
    }

    fn run_phases(&self, library: &Library, full: bool, scan_id: &str, started_at_ms: i64) -> Result<LibraryScan> {
        let root = PathBuf::from(&library.root_path);
        let mut outcome = ScanOutcome::default();

        // Step 2: validate targets.
        let targets = vec![root.clone()];
        let valid_targets: Vec<PathBuf> = targets
            .into_iter()
            .filter(|t| match discover::validate_target(t) {
                Ok(valid) => valid,
                Err(e) => {
                    warn!(target = %t.display(), error = %e, "failed to validate scan target");
                    false
                }
            })
            .collect();

        // Step 3: discover folders.
        let mut discovered_folders = Vec::new();
        for target in &valid_targets {
            discovered_folders.extend(discover::discover_folders(&root, target).map_err(EngineError::Other)?);
        }

        // Step 4: plan.
        let mut folders_to_scan = Vec::new();
        let mut folders_skipped_list = Vec::new();
        for folder in &discovered_folders {
            let should_skip = if full {
                false
            } else {
                match self.store.get_folder(library.id, &folder.rel_path).map_err(EngineError::Other)? {
                    Some(cached) => cached.mtime_ms == folder.mtime_ms && cached.audio_file_count == folder.audio_file_count,
                    None => false,
                }
            };
            if should_skip {
                folders_skipped_list.push(folder.clone());
            } else {
                folders_to_scan.push(folder.clone());
            }
        }
        outcome.folders_scanned = folders_to_scan.len() as i64;
        outcome.folders_skipped = folders_skipped_list.len() as i64;

        // Step 5: snapshot existing.
        let existing_files = self.store.list_files(library.id).map_err(EngineError::Other)?;
        let existing_by_path: HashMap<String, LibraryFile> = existing_files
            .iter()
            .cloned()
            .map(|f| (f.normalized_path.clone(), f))
            .collect();
        let any_tagged = existing_files.iter().any(|f| f.tagged);

        // Step 6: per-folder scan.
        let mut discovered_files: Vec<DiscoveredFile> = Vec::new();
        let mut raw_metadata_by_path: HashMap<String, RawMetadata> = HashMap::new();

        for folder in &folders_to_scan {
            let audio_paths = match discover::list_audio_files(&folder.abs_path) {
                Ok(paths) => paths,
                Err(e) => {
                    warn!(folder = %folder.abs_path.display(), error = %e, "failed to list folder");
                    continue;
                }
            };

            let stats: Vec<(PathBuf, std::io::Result<std::fs::Metadata>)> = audio_paths
                .par_iter()
                .map(|p| (p.clone(), std::fs::metadata(p)))
                .collect();

            for (path, meta_result) in stats {
                let meta = match meta_result {
                    Ok(m) => m,
                    Err(e) => {
                        outcome.files_errored += 1;
                        warn!(path = %path.display(), error = %e, "stat failed");
                        continue;
                    }
                };
                let size_bytes = meta.len() as i64;
                let mtime_ms = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0);

                let normalized_path = path
                    .strip_prefix(&root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");

                let prior = existing_by_path.get(&normalized_path);
                if let Some(prior) = prior {
                    if prior.mtime_ms == mtime_ms {
                        // Unchanged, skip re-extraction (step 6c).
                        discovered_files.push(DiscoveredFile {
                            abs_path: path,
                            normalized_path,
                            size_bytes,
                            mtime_ms,
                        });
                        continue;
                    }
                }

                let extracted = match self.extractor.extract(&path) {
                    Ok(m) => m,
                    Err(e) => {
                        outcome.files_errored += 1;
                        warn!(path = %path.display(), error = %e, "metadata extraction failed");
                        continue;
                    }
                };

                // needs_tagging = (no prior record) OR (not yet tagged) OR
                // (stored version tag differs from the current tagger
                // version) — spec.md §6 "Tag namespace". The embedded tag
                // is read fresh every scan rather than carried forward from
                // `prior`, since a file can be re-tagged externally between
                // scans.
                let version_tag = tag_normalization::extract_version_tag(&extracted.tags, &self.rules);
                let tagged = version_tag.as_deref() == Some(self.rules.tagger_version.as_str());
                let needs_tagging = prior.is_none() || !tagged;

                let file_record = LibraryFile {
                    id: 0,
                    library_id: library.id,
                    abs_path: path.to_string_lossy().to_string(),
                    normalized_path: normalized_path.clone(),
                    size_bytes,
                    mtime_ms,
                    duration_ms: extracted.duration_ms,
                    title: extracted.title.clone(),
                    artist_summary: extracted.artist_summary.clone(),
                    needs_tagging,
                    tagged,
                    scan_id: scan_id.to_string(),
                    chromaprint: prior.and_then(|p| p.chromaprint.clone()),
                    version_tag,
                };

                match self.store.upsert_file(&file_record).map_err(EngineError::Other) {
                    Ok(file_id) => {
                        if prior.is_none() {
                            outcome.files_added += 1;
                        } else {
                            outcome.files_updated += 1;
                        }
                        let tags = tag_normalization::normalize(&extracted.tags, &self.rules);
                        if let Err(e) = self.store.seed_tags(file_id, &tags) {
                            warn!(path = %normalized_path, error = %e, "failed to seed tags");
                        }
                    }
                    Err(e) => {
                        outcome.files_errored += 1;
                        error!(path = %normalized_path, error = %e, "failed to upsert file");
                    }
                }

                raw_metadata_by_path.insert(normalized_path.clone(), extracted);
                discovered_files.push(DiscoveredFile {
                    abs_path: path,
                    normalized_path,
                    size_bytes,
                    mtime_ms,
                });
            }

            self.store
                .upsert_folder(&crate::store::LibraryFolder {
                    library_id: library.id,
                    rel_path: folder.rel_path.clone(),
                    mtime_ms: folder.mtime_ms,
                    audio_file_count: folder.audio_file_count,
                })
                .map_err(EngineError::Other)?;

            self.publish_progress(library.id, &outcome);
        }

        // Step 7: detect missing (folder-aware).
        let discovered_paths: HashSet<String> = discovered_files.iter().map(|f| f.normalized_path.clone()).collect();
        let scanned_folder_rel: HashSet<String> = folders_to_scan.iter().map(|f| f.rel_path.clone()).collect();
        let folders_on_disk: HashSet<String> = discovered_folders.iter().map(|f| f.rel_path.clone()).collect();
        let existing_paths: HashSet<String> = existing_by_path.keys().cloned().collect();

        let missing: HashSet<String> = missing_detection::detect_missing(
            &existing_paths,
            &discovered_paths,
            &scanned_folder_rel,
            &folders_on_disk,
        )
        .into_iter()
        .map(|s| s.to_string())
        .collect();

        // Step 8: move detection, gated on any existing tagged file.
        let mut moved_paths: HashSet<String> = HashSet::new();
        if any_tagged && !missing.is_empty() {
            let removed_candidates: Vec<LibraryFile> = missing
                .iter()
                .filter_map(|p| existing_by_path.get(p).cloned())
                .collect();
            let newly_discovered: Vec<DiscoveredFile> = discovered_files
                .iter()
                .filter(|f| !existing_by_path.contains_key(&f.normalized_path))
                .cloned()
                .collect();

            let result = move_detection::detect_moves(
                &removed_candidates,
                &newly_discovered,
                &raw_metadata_by_path,
                self.extractor.as_ref(),
            );

            for mv in result.moves {
                let file_move = FileMove {
                    file_id: mv.file_id,
                    old_path: mv.old_path.clone(),
                    new_path: mv.new_path.clone(),
                    new_abs_path: mv.new_abs_path.clone(),
                    new_size: mv.new_size,
                    new_mtime_ms: mv.new_mtime_ms,
                    new_duration_ms: mv.new_duration_ms,
                };
                self.store.move_file(&file_move).map_err(EngineError::Other)?;
                moved_paths.insert(mv.old_path);
                outcome.files_moved += 1;
            }
        }

        // Step 9: delete unmatched missing — full scans only.
        let unmatched_missing: Vec<String> = missing.difference(&moved_paths).cloned().collect();
        if full && !unmatched_missing.is_empty() {
            let ids: Vec<i64> = unmatched_missing
                .iter()
                .filter_map(|p| existing_by_path.get(p).map(|f| f.id))
                .collect();
            outcome.files_removed = self.store.delete_files(&ids).map_err(EngineError::Other)? as i64;
        }

        // Step 10: clean stale folders — full scans only.
        if full {
            let keep: Vec<String> = discovered_folders.iter().map(|f| f.rel_path.clone()).collect();
            self.store.clean_stale_folders(library.id, &keep).map_err(EngineError::Other)?;
        }

        // Step 11: clean orphan tags.
        self.store.clean_orphan_tags().map_err(EngineError::Other)?;

        info!(
            library_id = library.id,
            scan_id,
            folders_scanned = outcome.folders_scanned,
            files_added = outcome.files_added,
            files_moved = outcome.files_moved,
            "scan complete"
        );

        Ok(LibraryScan {
            id: scan_id.to_string(),
            library_id: library.id,
            status: LibraryScanStatus::Complete,
            started_at_ms,
            finished_at_ms: Some(crate::store::now_ms()),
            folders_scanned: outcome.folders_scanned,
            folders_skipped: outcome.folders_skipped,
            files_added: outcome.files_added,
            files_updated: outcome.files_updated,
            files_removed: outcome.files_removed,
            files_moved: outcome.files_moved,
            files_errored: outcome.files_errored,
            error_message: None,
        })
    }

    fn publish_progress(&self, library_id: i64, outcome: &ScanOutcome) {
        if let Some(broker) = &self.broker {
            broker.update_system_health("scanning", None);
            let _ = library_id;
            let _ = outcome;
        }
    }
}
