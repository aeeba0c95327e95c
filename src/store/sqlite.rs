//! SQLite-backed implementation of the durable store.

use super::helpers::{count_and_delete, count_and_update};
use super::models::*;
use super::schema::STORE_VERSIONED_SCHEMAS;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Transactional API over the `queue` table (C5's storage layer).
pub trait JobStore: Send + Sync {
    fn add(&self, path: &str, force: bool) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<Job>>;
    fn list(&self, limit: usize, offset: usize, status: Option<JobStatus>) -> Result<(Vec<Job>, usize)>;
    fn queue_stats(&self) -> Result<QueueStats>;
    /// Atomically claim a pending job. Returns true iff this call claimed it.
    fn start(&self, id: i64, now_ms: i64) -> Result<bool>;
    fn mark_done(&self, id: i64, results_json: Option<String>, now_ms: i64) -> Result<()>;
    fn mark_error(&self, id: i64, message: &str, now_ms: i64) -> Result<()>;
    /// Delete jobs in the given terminal status set. Rejects `running`.
    fn flush(&self, statuses: &[JobStatus]) -> Result<usize>;
    /// Recover crash-orphans: every `running` job becomes `pending` again.
    fn reset_running_to_pending(&self) -> Result<usize>;
    fn reset_errors_to_pending(&self) -> Result<usize>;
    fn cleanup_old(&self, max_age_hours: u64, now_ms: i64) -> Result<usize>;
}

/// Key/value metadata (`worker_enabled`, `avg_processing_time`, password
/// hash, API keys) — see spec §6.
pub trait MetaStore: Send + Sync {
    fn get_meta(&self, key: &str) -> Result<Option<String>>;
    fn set_meta(&self, key: &str, value: &str) -> Result<()>;

    fn worker_enabled(&self) -> Result<bool> {
        Ok(self.get_meta("worker_enabled")?.map(|v| v == "true").unwrap_or(true))
    }

    fn set_worker_enabled(&self, enabled: bool) -> Result<()> {
        self.set_meta("worker_enabled", if enabled { "true" } else { "false" })
    }

    /// Updates the rolling average processing time (simple exponential
    /// moving average, alpha = 0.2, matching the teacher's smoothing of
    /// single-sample metrics elsewhere in `metrics.rs`).
    fn update_avg_processing_time(&self, sample_secs: f64) -> Result<()> {
        let prev: f64 = self
            .get_meta("avg_processing_time")?
            .and_then(|v| v.parse().ok())
            .unwrap_or(sample_secs);
        let updated = prev * 0.8 + sample_secs * 0.2;
        self.set_meta("avg_processing_time", &updated.to_string())
    }

    fn avg_processing_time(&self) -> Result<Option<f64>> {
        Ok(self.get_meta("avg_processing_time")?.and_then(|v| v.parse().ok()))
    }

    /// Hashes and stores an admin password as `salt$hex(sha256(salt||password))`,
    /// a random 16-byte salt base64-encoded — the convention carried over
    /// from `nomarr/interfaces/cli/commands/manage_password.py`.
    fn set_admin_password(&self, password: &str) -> Result<()> {
        use base64::Engine;
        use rand::RngCore;
        use sha2::{Digest, Sha256};

        let mut salt_bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = base64::engine::general_purpose::STANDARD.encode(salt_bytes);

        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        let digest = to_hex(&hasher.finalize());

        self.set_meta("admin_password_hash", &format!("{}${}", salt, digest))
    }

    fn verify_admin_password(&self, password: &str) -> Result<bool> {
        use sha2::{Digest, Sha256};

        let stored = match self.get_meta("admin_password_hash")? {
            Some(s) => s,
            None => return Ok(false),
        };
        let (salt, expected_digest) = match stored.split_once('$') {
            Some(parts) => parts,
            None => return Ok(false),
        };

        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        let digest = to_hex(&hasher.finalize());

        Ok(digest == expected_digest)
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Library catalog persistence (C1's `libraries`, `library_files`,
/// `library_folders`, `library_tags`, `file_tags`, `library_scans`).
pub trait LibraryStore: Send + Sync {
    fn get_library(&self, id: i64) -> Result<Option<Library>>;
    fn get_default_library(&self) -> Result<Option<Library>>;
    /// Idempotent on `root_path`: returns the existing default library if
    /// one is already seeded, otherwise creates it. Library creation is a
    /// non-goal of the operation set (spec.md §4.8 exposes no `AddLibrary`
    /// call); a single default library is all the data model requires.
    fn ensure_default_library(&self, name: &str, root_path: &str) -> Result<Library>;
    fn set_scan_status(&self, library_id: i64, status: LibraryScanStatus, error: Option<&str>) -> Result<()>;

    fn list_files(&self, library_id: i64) -> Result<Vec<LibraryFile>>;
    fn get_folder(&self, library_id: i64, rel_path: &str) -> Result<Option<LibraryFolder>>;
    fn upsert_folder(&self, folder: &LibraryFolder) -> Result<()>;
    /// Deletes folder cache rows for this library not present in `keep_rel_paths`.
    fn clean_stale_folders(&self, library_id: i64, keep_rel_paths: &[String]) -> Result<usize>;

    /// Idempotent on `(library_id, normalized_path)`.
    fn upsert_file(&self, file: &LibraryFile) -> Result<i64>;
    fn delete_files(&self, ids: &[i64]) -> Result<usize>;
    fn move_file(&self, mv: &FileMove) -> Result<()>;

    fn seed_tags(&self, file_id: i64, tags: &ExtractedTags) -> Result<()>;
    fn clean_orphan_tags(&self) -> Result<usize>;

    fn begin_scan(&self, library_id: i64, scan_id: &str, started_at_ms: i64) -> Result<()>;
    fn finish_scan(&self, scan: &LibraryScan) -> Result<()>;
}

/// Single SQLite connection backing `JobStore`, `LibraryStore`, and
/// `MetaStore` over one shared file — the tables are transactionally
/// related (job completion touches `meta` for the rolling average; scans
/// touch `library_*` and `meta`), mirroring the teacher's pattern of one
/// struct per logical database rather than one trait per table.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = if db_path.as_ref().exists() {
            Connection::open_with_flags(
                &db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?
        } else {
            let conn = Connection::open(&db_path)?;
            conn.execute("PRAGMA foreign_keys = ON;", [])?;
            STORE_VERSIONED_SCHEMAS
                .last()
                .context("No schemas defined")?
                .create(&conn)?;
            info!("Created new store database at {:?}", db_path.as_ref());
            conn
        };

        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;

        let db_version = conn
            .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
            .context("Failed to read database version")?
            - BASE_DB_VERSION as i64;

        if db_version < 0 {
            bail!(
                "Store database version {} is too old, does not contain base db version {}",
                db_version,
                BASE_DB_VERSION
            );
        }
        let version = db_version as usize;

        let schema_count = STORE_VERSIONED_SCHEMAS.len();
        if version >= schema_count {
            bail!(
                "Store database version {} is too new (max supported: {})",
                version,
                schema_count - 1
            );
        }

        STORE_VERSIONED_SCHEMAS
            .get(version)
            .context("Failed to get schema")?
            .validate(&conn)?;

        Self::migrate_if_needed(&conn, version)?;

        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        STORE_VERSIONED_SCHEMAS
            .last()
            .context("No schemas defined")?
            .create(&conn)?;

        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &Connection, current_version: usize) -> Result<()> {
        let target_version = STORE_VERSIONED_SCHEMAS.len() - 1;
        if current_version >= target_version {
            return Ok(());
        }

        info!("Migrating store database from version {} to {}", current_version, target_version);

        for schema in STORE_VERSIONED_SCHEMAS.iter().skip(current_version + 1) {
            if let Some(migration_fn) = schema.migration {
                info!("Running store migration to version {}", schema.version);
                migration_fn(conn)?;
            }
        }

        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + target_version),
            [],
        )?;
        Ok(())
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let status_str: String = row.get("status")?;
        Ok(Job {
            id: row.get("id")?,
            path: row.get("path")?,
            force: row.get::<_, i64>("force")? != 0,
            status: JobStatus::from_db_str(&status_str).unwrap_or(JobStatus::Pending),
            created_at_ms: row.get("created_at_ms")?,
            started_at_ms: row.get("started_at_ms")?,
            finished_at_ms: row.get("finished_at_ms")?,
            error_message: row.get("error_message")?,
            results_json: row.get("results_json")?,
        })
    }
}

impl JobStore for SqliteStore {
    fn add(&self, path: &str, force: bool) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let now_ms = super::now_ms();
        conn.execute(
            "INSERT INTO queue (path, status, force, created_at_ms) VALUES (?1, 'pending', ?2, ?3)",
            params![path, force as i64, now_ms],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<Job>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM queue WHERE id = ?1", params![id], Self::row_to_job)
            .optional()
            .map_err(Into::into)
    }

    fn list(&self, limit: usize, offset: usize, status: Option<JobStatus>) -> Result<(Vec<Job>, usize)> {
        let conn = self.conn.lock().unwrap();

        let total: i64 = match status {
            Some(s) => conn.query_row(
                "SELECT COUNT(*) FROM queue WHERE status = ?1",
                params![s.as_db_str()],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM queue", [], |row| row.get(0))?,
        };

        let jobs = match status {
            Some(s) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM queue WHERE status = ?1 ORDER BY created_at_ms DESC LIMIT ?2 OFFSET ?3",
                )?;
                stmt.query_map(params![s.as_db_str(), limit as i64, offset as i64], Self::row_to_job)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT * FROM queue ORDER BY created_at_ms DESC LIMIT ?1 OFFSET ?2")?;
                stmt.query_map(params![limit as i64, offset as i64], Self::row_to_job)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        Ok((jobs, total as usize))
    }

    fn queue_stats(&self) -> Result<QueueStats> {
        let conn = self.conn.lock().unwrap();
        let mut stats = QueueStats::default();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM queue GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            match status.as_str() {
                "pending" => stats.pending = count,
                "running" => stats.running = count,
                "done" => stats.done = count,
                "error" => stats.error = count,
                _ => {}
            }
        }
        Ok(stats)
    }

    fn start(&self, id: i64, now_ms: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE queue SET status = 'running', started_at_ms = ?2 WHERE id = ?1 AND status = 'pending'",
            params![id, now_ms],
        )?;
        Ok(changed > 0)
    }

    fn mark_done(&self, id: i64, results_json: Option<String>, now_ms: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE queue SET status = 'done', finished_at_ms = ?2, results_json = ?3 WHERE id = ?1",
            params![id, now_ms, results_json],
        )?;
        Ok(())
    }

    fn mark_error(&self, id: i64, message: &str, now_ms: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE queue SET status = 'error', finished_at_ms = ?2, error_message = ?3 WHERE id = ?1",
            params![id, now_ms, message],
        )?;
        Ok(())
    }

    fn flush(&self, statuses: &[JobStatus]) -> Result<usize> {
        if statuses.iter().any(|s| !s.is_terminal()) {
            bail!("flush only accepts terminal statuses (done, error)");
        }
        if statuses.is_empty() {
            bail!("flush requires at least one status");
        }
        let conn = self.conn.lock().unwrap();
        let placeholders: Vec<String> = statuses.iter().map(|s| format!("'{}'", s.as_db_str())).collect();
        let where_sql = format!("status IN ({})", placeholders.join(", "));
        count_and_delete(&conn, "queue", &where_sql, [])
    }

    fn reset_running_to_pending(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        count_and_update(
            &conn,
            "queue",
            "status = 'pending', started_at_ms = NULL",
            "status = 'running'",
            [],
        )
    }

    fn reset_errors_to_pending(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        count_and_update(
            &conn,
            "queue",
            "status = 'pending', started_at_ms = NULL, finished_at_ms = NULL, error_message = NULL",
            "status = 'error'",
            [],
        )
    }

    fn cleanup_old(&self, max_age_hours: u64, now_ms: i64) -> Result<usize> {
        let cutoff = now_ms - (max_age_hours as i64) * 3_600_000;
        let conn = self.conn.lock().unwrap();
        count_and_delete(
            &conn,
            "queue",
            "status IN ('done', 'error') AND finished_at_ms < ?1",
            params![cutoff],
        )
    }
}

impl MetaStore for SqliteStore {
    fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

impl LibraryStore for SqliteStore {
    fn get_library(&self, id: i64) -> Result<Option<Library>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM libraries WHERE id = ?1", params![id], Self::row_to_library)
            .optional()
            .map_err(Into::into)
    }

    fn get_default_library(&self) -> Result<Option<Library>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM libraries WHERE is_default = 1 LIMIT 1",
            [],
            Self::row_to_library,
        )
        .optional()
        .map_err(Into::into)
    }

    fn set_scan_status(&self, library_id: i64, status: LibraryScanStatus, error: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE libraries SET scan_status = ?2, scan_error = ?3 WHERE id = ?1",
            params![library_id, status.as_db_str(), error],
        )?;
        Ok(())
    }

    fn ensure_default_library(&self, name: &str, root_path: &str) -> Result<Library> {
        let conn = self.conn.lock().unwrap();
        if let Some(library) = conn
            .query_row(
                "SELECT * FROM libraries WHERE root_path = ?1",
                params![root_path],
                Self::row_to_library,
            )
            .optional()?
        {
            return Ok(library);
        }
        conn.execute(
            "INSERT INTO libraries (name, root_path, is_default) VALUES (?1, ?2, 1)",
            params![name, root_path],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row("SELECT * FROM libraries WHERE id = ?1", params![id], Self::row_to_library)
            .map_err(Into::into)
    }

    fn list_files(&self, library_id: i64) -> Result<Vec<LibraryFile>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM library_files WHERE library_id = ?1")?;
        let files = stmt
            .query_map(params![library_id], Self::row_to_file)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    fn get_folder(&self, library_id: i64, rel_path: &str) -> Result<Option<LibraryFolder>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT library_id, rel_path, mtime_ms, audio_file_count FROM library_folders WHERE library_id = ?1 AND rel_path = ?2",
            params![library_id, rel_path],
            |row| {
                Ok(LibraryFolder {
                    library_id: row.get(0)?,
                    rel_path: row.get(1)?,
                    mtime_ms: row.get(2)?,
                    audio_file_count: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    fn upsert_folder(&self, folder: &LibraryFolder) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO library_folders (library_id, rel_path, mtime_ms, audio_file_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(library_id, rel_path) DO UPDATE SET mtime_ms = excluded.mtime_ms, audio_file_count = excluded.audio_file_count",
            params![folder.library_id, folder.rel_path, folder.mtime_ms, folder.audio_file_count],
        )?;
        Ok(())
    }

    fn clean_stale_folders(&self, library_id: i64, keep_rel_paths: &[String]) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        if keep_rel_paths.is_empty() {
            return count_and_delete(&conn, "library_folders", "library_id = ?1", params![library_id]);
        }
        let placeholders: Vec<String> = keep_rel_paths
            .iter()
            .map(|p| format!("'{}'", p.replace('\'', "''")))
            .collect();
        let where_sql = format!(
            "library_id = ?1 AND rel_path NOT IN ({})",
            placeholders.join(", ")
        );
        count_and_delete(&conn, "library_folders", &where_sql, params![library_id])
    }

    fn upsert_file(&self, file: &LibraryFile) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO library_files
                (library_id, abs_path, normalized_path, size_bytes, mtime_ms, duration_ms,
                 title, artist_summary, needs_tagging, tagged, scan_id, chromaprint, version_tag)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(library_id, normalized_path) DO UPDATE SET
                abs_path = excluded.abs_path,
                size_bytes = excluded.size_bytes,
                mtime_ms = excluded.mtime_ms,
                duration_ms = excluded.duration_ms,
                title = excluded.title,
                artist_summary = excluded.artist_summary,
                needs_tagging = excluded.needs_tagging,
                scan_id = excluded.scan_id,
                version_tag = excluded.version_tag",
            params![
                file.library_id,
                file.abs_path,
                file.normalized_path,
                file.size_bytes,
                file.mtime_ms,
                file.duration_ms,
                file.title,
                file.artist_summary,
                file.needs_tagging as i64,
                file.tagged as i64,
                file.scan_id,
                file.chromaprint,
                file.version_tag,
            ],
        )?;

        conn.query_row(
            "SELECT id FROM library_files WHERE library_id = ?1 AND normalized_path = ?2",
            params![file.library_id, file.normalized_path],
            |row| row.get(0),
        )
        .map_err(Into::into)
    }

    fn delete_files(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();
        let placeholders: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let where_sql = format!("id IN ({})", placeholders.join(", "));
        count_and_delete(&conn, "library_files", &where_sql, [])
    }

    fn move_file(&self, mv: &FileMove) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE library_files SET normalized_path = ?2, abs_path = ?3, size_bytes = ?4, mtime_ms = ?5, duration_ms = ?6 WHERE id = ?1",
            params![mv.file_id, mv.new_path, mv.new_abs_path, mv.new_size, mv.new_mtime_ms, mv.new_duration_ms],
        )?;
        Ok(())
    }

    fn seed_tags(&self, file_id: i64, tags: &ExtractedTags) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM file_tags WHERE file_id = ?1", params![file_id])?;

        for (key, value, is_nomarr) in &tags.values {
            let value_json = serde_json::to_string(value)?;
            conn.execute(
                "INSERT INTO library_tags (key, value_json, is_nomarr) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key, value_json, is_nomarr) DO NOTHING",
                params![key, value_json, *is_nomarr as i64],
            )?;
            let tag_id: i64 = conn.query_row(
                "SELECT id FROM library_tags WHERE key = ?1 AND value_json = ?2 AND is_nomarr = ?3",
                params![key, value_json, *is_nomarr as i64],
                |row| row.get(0),
            )?;
            conn.execute(
                "INSERT INTO file_tags (file_id, tag_id) VALUES (?1, ?2) ON CONFLICT(file_id, tag_id) DO NOTHING",
                params![file_id, tag_id],
            )?;
        }
        Ok(())
    }

    fn clean_orphan_tags(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        count_and_delete(
            &conn,
            "library_tags",
            "id NOT IN (SELECT DISTINCT tag_id FROM file_tags)",
            [],
        )
    }

    fn begin_scan(&self, library_id: i64, scan_id: &str, started_at_ms: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO library_scans (id, library_id, status, started_at_ms) VALUES (?1, ?2, 'scanning', ?3)",
            params![scan_id, library_id, started_at_ms],
        )?;
        Ok(())
    }

    fn finish_scan(&self, scan: &LibraryScan) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE library_scans SET status = ?2, finished_at_ms = ?3, folders_scanned = ?4,
                folders_skipped = ?5, files_added = ?6, files_updated = ?7, files_removed = ?8,
                files_moved = ?9, files_errored = ?10, error_message = ?11 WHERE id = ?1",
            params![
                scan.id,
                scan.status.as_db_str(),
                scan.finished_at_ms,
                scan.folders_scanned,
                scan.folders_skipped,
                scan.files_added,
                scan.files_updated,
                scan.files_removed,
                scan.files_moved,
                scan.files_errored,
                scan.error_message,
            ],
        )?;
        Ok(())
    }
}

impl SqliteStore {
    fn row_to_library(row: &rusqlite::Row) -> rusqlite::Result<Library> {
        let status: String = row.get("scan_status")?;
        Ok(Library {
            id: row.get("id")?,
            name: row.get("name")?,
            root_path: row.get("root_path")?,
            is_default: row.get::<_, i64>("is_default")? != 0,
            scan_status: LibraryScanStatus::from_db_str(&status),
            scan_error: row.get("scan_error")?,
        })
    }

    fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<LibraryFile> {
        Ok(LibraryFile {
            id: row.get("id")?,
            library_id: row.get("library_id")?,
            abs_path: row.get("abs_path")?,
            normalized_path: row.get("normalized_path")?,
            size_bytes: row.get("size_bytes")?,
            mtime_ms: row.get("mtime_ms")?,
            duration_ms: row.get("duration_ms")?,
            title: row.get("title")?,
            artist_summary: row.get("artist_summary")?,
            needs_tagging: row.get::<_, i64>("needs_tagging")? != 0,
            tagged: row.get::<_, i64>("tagged")? != 0,
            scan_id: row.get("scan_id")?,
            chromaprint: row.get("chromaprint")?,
            version_tag: row.get("version_tag")?,
        })
    }
}
