//! Database schema for the single durable store file (`nomad.db`).
//!
//! Defines the versioned schema array, following the teacher's
//! `download_manager::schema::DOWNLOAD_QUEUE_VERSIONED_SCHEMAS` convention
//! of one table-set per versioned schema snapshot.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema};

const QUEUE_TABLE_V0: Table = Table {
    name: "queue",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("path", &SqlType::Text, non_null = true),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("force", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("created_at_ms", &SqlType::Integer, non_null = true),
        sqlite_column!("started_at_ms", &SqlType::Integer),
        sqlite_column!("finished_at_ms", &SqlType::Integer),
        sqlite_column!("error_message", &SqlType::Text),
        sqlite_column!("results_json", &SqlType::Text),
    ],
    indices: &[
        ("idx_queue_status", "status"),
        ("idx_queue_created", "created_at_ms"),
    ],
    unique_constraints: &[],
};

const LIBRARIES_TABLE_V0: Table = Table {
    name: "libraries",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("root_path", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("is_default", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("scan_status", &SqlType::Text, non_null = true, default_value = Some("'idle'")),
        sqlite_column!("scan_error", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[],
};

const LIBRARY_FILES_TABLE_V0: Table = Table {
    name: "library_files",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "library_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "libraries",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("abs_path", &SqlType::Text, non_null = true),
        sqlite_column!("normalized_path", &SqlType::Text, non_null = true),
        sqlite_column!("size_bytes", &SqlType::Integer, non_null = true),
        sqlite_column!("mtime_ms", &SqlType::Integer, non_null = true),
        sqlite_column!("duration_ms", &SqlType::Integer),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("artist_summary", &SqlType::Text),
        sqlite_column!("needs_tagging", &SqlType::Integer, non_null = true, default_value = Some("1")),
        sqlite_column!("tagged", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("scan_id", &SqlType::Text, non_null = true),
        sqlite_column!("chromaprint", &SqlType::Text),
        sqlite_column!("version_tag", &SqlType::Text),
    ],
    indices: &[
        ("idx_library_files_library", "library_id"),
        ("idx_library_files_scan", "scan_id"),
    ],
    unique_constraints: &[&["library_id", "normalized_path"]],
};

const LIBRARY_FOLDERS_TABLE_V0: Table = Table {
    name: "library_folders",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "library_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "libraries",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("rel_path", &SqlType::Text, non_null = true),
        sqlite_column!("mtime_ms", &SqlType::Integer, non_null = true),
        sqlite_column!("audio_file_count", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_library_folders_library", "library_id")],
    unique_constraints: &[&["library_id", "rel_path"]],
};

const LIBRARY_TAGS_TABLE_V0: Table = Table {
    name: "library_tags",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("key", &SqlType::Text, non_null = true),
        sqlite_column!("value_json", &SqlType::Text, non_null = true),
        sqlite_column!("is_nomarr", &SqlType::Integer, non_null = true, default_value = Some("0")),
    ],
    indices: &[("idx_library_tags_key", "key")],
    unique_constraints: &[&["key", "value_json", "is_nomarr"]],
};

const FILE_TAGS_TABLE_V0: Table = Table {
    name: "file_tags",
    columns: &[
        sqlite_column!(
            "file_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "library_files",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!(
            "tag_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "library_tags",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
    ],
    indices: &[("idx_file_tags_tag", "tag_id")],
    unique_constraints: &[&["file_id", "tag_id"]],
};

const LIBRARY_SCANS_TABLE_V0: Table = Table {
    name: "library_scans",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "library_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "libraries",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("started_at_ms", &SqlType::Integer, non_null = true),
        sqlite_column!("finished_at_ms", &SqlType::Integer),
        sqlite_column!("folders_scanned", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("folders_skipped", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("files_added", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("files_updated", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("files_removed", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("files_moved", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("files_errored", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("error_message", &SqlType::Text),
    ],
    indices: &[("idx_library_scans_library", "library_id")],
    unique_constraints: &[],
};

const META_TABLE_V0: Table = Table {
    name: "meta",
    columns: &[
        sqlite_column!("key", &SqlType::Text, is_primary_key = true),
        sqlite_column!("value", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[],
};

/// The store's single versioned schema snapshot. Version 0 is everything
/// shipped at launch; future migrations append an entry with a `migration`
/// function rather than mutating these table definitions in place.
pub static STORE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        QUEUE_TABLE_V0,
        LIBRARIES_TABLE_V0,
        LIBRARY_FILES_TABLE_V0,
        LIBRARY_FOLDERS_TABLE_V0,
        LIBRARY_TAGS_TABLE_V0,
        FILE_TAGS_TABLE_V0,
        LIBRARY_SCANS_TABLE_V0,
        META_TABLE_V0,
    ],
    migration: None,
}];
