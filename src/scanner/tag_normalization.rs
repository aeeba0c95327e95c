//! Tag key normalization into the canonical set.
//!
//! Ported from `nomarr/components/tagging/tag_normalization_comp.py` and
//! `nomarr/helpers/tag_key_mapping.py`. The canonical set covers the
//! common fields every supported container exposes under different
//! native keys; anything under the configured namespace (default `nom`)
//! is treated as a bucket rather than enumerated individually.

use crate::store::ExtractedTags;
use std::collections::HashMap;

/// Fields every supported container format can express, modulo its own
/// native spelling (`TPE1` vs `©ART` vs `artist`, etc).
pub const CANONICAL_TAGS: &[&str] = &[
    "title",
    "artist",
    "artists",
    "album",
    "album_artist",
    "tracknumber",
    "discnumber",
    "date",
    "year",
    "genre",
    "composer",
    "lyricist",
    "label",
    "publisher",
    "bpm",
];

/// Settings mirrored from [`crate::config::TaggingSettings`], kept
/// independent of the config module so this module can be unit tested
/// without constructing a full `AppConfig`.
#[derive(Debug, Clone)]
pub struct NormalizationRules {
    pub namespace: String,
    pub freeform_blocklist: Vec<String>,
    /// Raw (un-namespaced) key the external tagger writes the applied
    /// tagger version under, e.g. `nom_version`.
    pub version_tag_key: String,
    /// The tagger version this build expects files to carry once tagged.
    pub tagger_version: String,
}

/// Maps a raw, container-native tag key to its canonical name, or to the
/// namespaced bucket (`<namespace>:<key>`) if it starts with the
/// configured namespace prefix. Keys on the MP4 freeform blocklist are
/// dropped entirely (never reach the canonical set or the namespace bucket).
pub fn normalize_key(raw_key: &str, rules: &NormalizationRules) -> Option<String> {
    let lower = raw_key.to_lowercase();

    if rules
        .freeform_blocklist
        .iter()
        .any(|blocked| blocked.eq_ignore_ascii_case(raw_key))
    {
        return None;
    }

    if let Some(rest) = lower.strip_prefix(&format!("{}:", rules.namespace)) {
        return Some(format!("{}:{}", rules.namespace, rest));
    }

    let mapped = match lower.as_str() {
        "tpe1" | "©art" | "artist" => "artist",
        "tpe2" | "aart" | "album_artist" | "albumartist" => "album_artist",
        "talb" | "©alb" | "album" => "album",
        "tit2" | "©nam" | "title" => "title",
        "tyer" | "tdrc" | "©day" | "date" => "date",
        "year" => "year",
        "tcon" | "©gen" | "genre" => "genre",
        "trck" | "trkn" | "tracknumber" => "tracknumber",
        "tpos" | "disk" | "discnumber" => "discnumber",
        "tcom" | "©wrt" | "composer" => "composer",
        "text" | "lyricist" => "lyricist",
        "tpub" | "label" | "publisher" => "label",
        "tbpm" | "tmpo" | "bpm" => "bpm",
        other if CANONICAL_TAGS.contains(&other) => other,
        _ => return None,
    };

    Some(mapped.to_string())
}

/// Reads the tagger-version value a prior tagging pass embedded in the
/// file, if any. The external tagger writes it under the configured
/// namespace (`<namespace>:<version_tag_key>`, e.g. `nom:nom_version`).
pub fn extract_version_tag(raw_tags: &[(String, Vec<String>)], rules: &NormalizationRules) -> Option<String> {
    let namespaced_key = format!("{}:{}", rules.namespace, rules.version_tag_key);
    raw_tags
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(&namespaced_key))
        .and_then(|(_, values)| values.first().cloned())
}

/// Normalizes a raw `(key, values)` list into an [`ExtractedTags`] ready
/// for `LibraryStore::seed_tags`, tagging each value with whether it came
/// from the configured namespace (nomad-produced) or the file's native
/// tags.
pub fn normalize(raw_tags: &[(String, Vec<String>)], rules: &NormalizationRules) -> ExtractedTags {
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();

    for (raw_key, values) in raw_tags {
        if let Some(key) = normalize_key(raw_key, rules) {
            grouped.entry(key).or_default().extend(values.iter().cloned());
        }
    }

    let mut tags = ExtractedTags::default();
    for (key, values) in grouped {
        let is_nomad = key.starts_with(&format!("{}:", rules.namespace));
        tags.values.push((key, serde_json::json!(values), is_nomad));
    }
    tags
}
