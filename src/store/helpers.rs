//! Count-then-mutate helpers.
//!
//! Ported from `nomarr/helpers/db.py` (`count_and_delete`, `count_and_update`):
//! issue a counting query first, then the mutation, and return the counted
//! value rather than trusting the driver's reported affected-row count.

use anyhow::Result;
use rusqlite::{Connection, Params};

/// Count rows matching `where_sql` against `table`, then execute `delete_sql`
/// (expected to be `DELETE FROM <table> WHERE <where_sql>`), returning the
/// count observed before the delete.
pub fn count_and_delete<P: Params + Clone>(
    conn: &Connection,
    table: &str,
    where_sql: &str,
    params: P,
) -> Result<usize> {
    let count_sql = format!("SELECT COUNT(*) FROM {} WHERE {}", table, where_sql);
    let count: i64 = conn.query_row(&count_sql, params.clone(), |row| row.get(0))?;

    let delete_sql = format!("DELETE FROM {} WHERE {}", table, where_sql);
    conn.execute(&delete_sql, params)?;

    Ok(count as usize)
}

/// Count rows matching `where_sql`, then run `UPDATE <table> SET <set_sql>
/// WHERE <where_sql>`, returning the count observed before the update.
pub fn count_and_update<P: Params + Clone>(
    conn: &Connection,
    table: &str,
    set_sql: &str,
    where_sql: &str,
    params: P,
) -> Result<usize> {
    let count_sql = format!("SELECT COUNT(*) FROM {} WHERE {}", table, where_sql);
    let count: i64 = conn.query_row(&count_sql, params.clone(), |row| row.get(0))?;

    let update_sql = format!("UPDATE {} SET {} WHERE {}", table, set_sql, where_sql);
    conn.execute(&update_sql, params)?;

    Ok(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE widgets (id INTEGER PRIMARY KEY, status TEXT NOT NULL)",
            [],
        )
        .unwrap();
        for status in ["a", "a", "b"] {
            conn.execute("INSERT INTO widgets (status) VALUES (?1)", params![status])
                .unwrap();
        }
        conn
    }

    #[test]
    fn test_count_and_delete() {
        let conn = setup();
        let deleted = count_and_delete(&conn, "widgets", "status = ?1", params!["a"]).unwrap();
        assert_eq!(deleted, 2);
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM widgets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[test]
    fn test_count_and_update() {
        let conn = setup();
        let updated =
            count_and_update(&conn, "widgets", "status = 'c'", "status = ?1", params!["a"])
                .unwrap();
        assert_eq!(updated, 2);
        let c_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM widgets WHERE status = 'c'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(c_count, 2);
    }
}
