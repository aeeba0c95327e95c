//! Schema-versioning primitives shared by every SQLite-backed store in the
//! engine (job queue, library catalog, key/value meta).

mod versioned_schema;

pub use versioned_schema::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, BASE_DB_VERSION,
    DEFAULT_TIMESTAMP,
};
