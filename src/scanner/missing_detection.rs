//! Folder-aware missing-file detection (spec §4.7 step 7).
//!
//! Ported from `nomarr/components/library/missing_file_detection_comp.py`:
//! a file is missing only if its parent folder was actually scanned (so a
//! skipped cached folder's files are assumed present) or the parent
//! folder no longer exists on disk.

use std::collections::HashSet;

/// Returns the set of `existing_paths` not accounted for by this scan.
pub fn detect_missing<'a>(
    existing_paths: &'a HashSet<String>,
    discovered_paths: &HashSet<String>,
    scanned_folder_rel_paths: &HashSet<String>,
    folders_still_on_disk: &HashSet<String>,
) -> HashSet<&'a str> {
    existing_paths
        .iter()
        .filter(|path| !discovered_paths.contains(path.as_str()))
        .filter(|path| {
            let parent = parent_rel_path(path);
            scanned_folder_rel_paths.contains(&parent) || !folders_still_on_disk.contains(&parent)
        })
        .map(|s| s.as_str())
        .collect()
}

fn parent_rel_path(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}
