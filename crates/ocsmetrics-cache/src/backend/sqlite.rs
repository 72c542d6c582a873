use chrono::DateTime;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use super::CacheBackend;
use super::schema;
use crate::entry::{CacheEntry, CacheKey};
use crate::{Error, Result};

/// File name of the persistent cache inside the workspace directory
pub const CACHE_DB_FILE: &str = "cache.db";

/// Durable backend storing one row per entry in a SQLite database
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl CacheBackend for SqliteBackend {
    fn get(&mut self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT payload, fetched_at_ms, size_bytes
                FROM cache_entries
                WHERE resource = ?1 AND fingerprint = ?2
                "#,
                params![&key.resource, &key.fingerprint],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((payload, fetched_at_ms, size_bytes)) = row else {
            return Ok(None);
        };

        let fetched_at = DateTime::from_timestamp_millis(fetched_at_ms).ok_or_else(|| {
            Error::Corrupt(format!("{} has invalid timestamp {}", key, fetched_at_ms))
        })?;

        Ok(Some(CacheEntry {
            payload,
            fetched_at,
            size_bytes: size_bytes.max(0) as u64,
        }))
    }

    fn put(&mut self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO cache_entries (resource, fingerprint, payload, fetched_at_ms, size_bytes, write_seq)
            VALUES (?1, ?2, ?3, ?4, ?5, (SELECT COALESCE(MAX(write_seq), 0) + 1 FROM cache_entries))
            ON CONFLICT(resource, fingerprint) DO UPDATE SET
                payload = excluded.payload,
                fetched_at_ms = excluded.fetched_at_ms,
                size_bytes = excluded.size_bytes,
                write_seq = excluded.write_seq
            "#,
            params![
                &key.resource,
                &key.fingerprint,
                &entry.payload,
                entry.fetched_at.timestamp_millis(),
                entry.size_bytes as i64,
            ],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &CacheKey) -> Result<Option<u64>> {
        let size: Option<i64> = self
            .conn
            .query_row(
                "SELECT size_bytes FROM cache_entries WHERE resource = ?1 AND fingerprint = ?2",
                params![&key.resource, &key.fingerprint],
                |row| row.get(0),
            )
            .optional()?;

        if size.is_some() {
            self.conn.execute(
                "DELETE FROM cache_entries WHERE resource = ?1 AND fingerprint = ?2",
                params![&key.resource, &key.fingerprint],
            )?;
        }
        Ok(size.map(|s| s.max(0) as u64))
    }

    fn oldest_written(&mut self) -> Result<Option<(CacheKey, u64)>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT resource, fingerprint, size_bytes
                FROM cache_entries
                ORDER BY write_seq ASC
                LIMIT 1
                "#,
                [],
                |row| {
                    Ok((
                        CacheKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(key, size)| (key, size.max(0) as u64)))
    }

    fn total_bytes(&mut self) -> Result<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM cache_entries",
            [],
            |row| row.get(0),
        )?;
        Ok(total.max(0) as u64)
    }

    fn len(&mut self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    fn remove_prefix(&mut self, prefix: &str) -> Result<usize> {
        let nested = format!("{}/", prefix);
        let removed = self.conn.execute(
            r#"
            DELETE FROM cache_entries
            WHERE resource = ?1 OR substr(resource, 1, length(?2)) = ?2
            "#,
            params![prefix, &nested],
        )?;
        Ok(removed)
    }

    fn clear(&mut self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM cache_entries", [])?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(payload: &str) -> CacheEntry {
        CacheEntry {
            payload: payload.to_string(),
            fetched_at: Utc::now(),
            size_bytes: payload.len() as u64,
        }
    }

    #[test]
    fn test_put_get_roundtrip_keeps_millis() {
        let mut backend = SqliteBackend::open_in_memory().unwrap();
        let key = CacheKey::new("sessions", "abc");
        let written = entry("{\"items\":[]}");

        backend.put(&key, &written).unwrap();
        let read = backend.get(&key).unwrap().unwrap();

        assert_eq!(read.payload, written.payload);
        assert_eq!(
            read.fetched_at.timestamp_millis(),
            written.fetched_at.timestamp_millis()
        );
        assert_eq!(backend.get(&CacheKey::new("sessions", "zzz")).unwrap(), None);
    }

    #[test]
    fn test_write_order_and_prefix_removal() {
        let mut backend = SqliteBackend::open_in_memory().unwrap();
        let first = CacheKey::new("messages/s-1", "a");
        let second = CacheKey::new("messages/s-2", "a");
        let third = CacheKey::new("sessions", "a");

        backend.put(&first, &entry("1")).unwrap();
        backend.put(&second, &entry("22")).unwrap();
        backend.put(&third, &entry("333")).unwrap();
        backend.put(&first, &entry("1")).unwrap();

        assert_eq!(backend.oldest_written().unwrap(), Some((second, 2)));
        assert_eq!(backend.total_bytes().unwrap(), 6);

        assert_eq!(backend.remove_prefix("messages").unwrap(), 2);
        assert_eq!(backend.len().unwrap(), 1);
        assert_eq!(backend.remove(&third).unwrap(), Some(3));
        assert_eq!(backend.remove(&third).unwrap(), None);
    }
}
