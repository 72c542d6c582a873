use rusqlite::Connection;

use crate::Result;

// Schema version (increment when changing table definitions)
pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current_version != SCHEMA_VERSION {
        drop_all_tables(conn)?;
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            resource TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            payload TEXT NOT NULL,
            fetched_at_ms INTEGER NOT NULL,
            size_bytes INTEGER NOT NULL,
            write_seq INTEGER NOT NULL,
            PRIMARY KEY (resource, fingerprint)
        );

        CREATE INDEX IF NOT EXISTS idx_cache_write_seq ON cache_entries(write_seq);
        "#,
    )?;

    conn.execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;

    Ok(())
}

fn drop_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DROP INDEX IF EXISTS idx_cache_write_seq;
        DROP TABLE IF EXISTS cache_entries;
        "#,
    )?;
    Ok(())
}
