//! Optional tabular fast path over sidecar bibliographies.
//!
//! Parsing BibTeX on every read is cheap for one file and slow for a
//! thousand; the [`BibCache`] mirrors parsed records in a SQLite table keyed
//! by sidecar path and mtime. Rows are only served while the stored mtime
//! matches the file on disk, and the mirror is dropped whenever the
//! authoritative sidecar is rewritten. Every failure here degrades to "no
//! cache"; the sidecar file stays authoritative.

use std::path::Path;
use std::time::UNIX_EPOCH;

use rusqlite::{Connection, params};

use crate::record::BibRecord;

/// SQLite mirror of parsed sidecar records.
pub struct BibCache {
    conn: Connection,
}

impl BibCache {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             CREATE TABLE IF NOT EXISTS bib_cache (
                 path        TEXT NOT NULL,
                 mtime       INTEGER NOT NULL,
                 pos         INTEGER NOT NULL,
                 record_json TEXT NOT NULL,
                 PRIMARY KEY (path, pos)
             );",
        )?;
        Ok(Self { conn })
    }

    /// Records mirrored for `sidecar`, provided the stored mtime still
    /// matches the file. `None` means miss (absent, stale, or unreadable).
    pub fn load(&self, sidecar: &Path) -> Option<Vec<BibRecord>> {
        let mtime = mtime_epoch(sidecar)?;
        let key = sidecar.to_string_lossy().to_string();

        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT mtime, record_json FROM bib_cache WHERE path = ?1 ORDER BY pos",
            )
            .ok()?;
        let rows = stmt
            .query_map(params![key], |row| {
                let mtime: u64 = row.get(0)?;
                let json: String = row.get(1)?;
                Ok((mtime, json))
            })
            .ok()?;

        let mut records = Vec::new();
        for row in rows.flatten() {
            let (stored_mtime, json) = row;
            if stored_mtime != mtime {
                tracing::debug!(path = %sidecar.display(), "tabular cache stale");
                return None;
            }
            records.push(serde_json::from_str(&json).ok()?);
        }

        if records.is_empty() {
            None
        } else {
            tracing::debug!(path = %sidecar.display(), count = records.len(), "tabular cache hit");
            Some(records)
        }
    }

    /// Mirror `records` for `sidecar` at its current mtime.
    pub fn store(&self, sidecar: &Path, records: &[BibRecord]) {
        let Some(mtime) = mtime_epoch(sidecar) else {
            return;
        };
        let key = sidecar.to_string_lossy().to_string();

        self.invalidate(sidecar);
        for (pos, record) in records.iter().enumerate() {
            let Ok(json) = serde_json::to_string(record) else {
                continue;
            };
            let _ = self.conn.execute(
                "INSERT OR REPLACE INTO bib_cache (path, mtime, pos, record_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![key, mtime, pos as i64, json],
            );
        }
    }

    /// Drop all rows for `sidecar`. Called whenever the sidecar is
    /// rewritten or renamed.
    pub fn invalidate(&self, sidecar: &Path) {
        let key = sidecar.to_string_lossy().to_string();
        let _ = self
            .conn
            .execute("DELETE FROM bib_cache WHERE path = ?1", params![key]);
    }
}

fn mtime_epoch(path: &Path) -> Option<u64> {
    let meta = std::fs::metadata(path).ok()?;
    let mtime = meta.modified().ok()?;
    mtime.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

impl std::fmt::Debug for BibCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BibCache").finish_non_exhaustive()
    }
}
