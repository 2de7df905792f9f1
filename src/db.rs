// 🗄️ Ledger Store - one row per player, latest reported damage wins
// SQLite + WAL, synchronous=FULL so every committed upsert/reset survives a crash

use crate::error::{LedgerError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Leaderboard size when the caller does not pick one
pub const DEFAULT_LIMIT: usize = 10;

/// Current standing of one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub name: String,
    pub damage: u64,
}

impl LedgerEntry {
    pub fn new(name: impl Into<String>, damage: u64) -> Self {
        LedgerEntry {
            name: name.into(),
            damage,
        }
    }
}

/// What an upsert did to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated { previous: u64 },
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "FULL")?;

    // ==========================================================================
    // Ledger Table
    // `id` records first sighting; ON CONFLICT updates keep it, so ranking
    // ties fall back to insertion order
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledger (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            damage INTEGER NOT NULL CHECK (damage >= 0),
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_damage ON ledger(damage)",
        [],
    )?;

    Ok(())
}

fn to_column(damage: u64) -> Result<i64> {
    i64::try_from(damage).map_err(|_| LedgerError::DamageOutOfRange(damage))
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let damage: i64 = row.get(1)?;
    Ok(LedgerEntry {
        name: row.get(0)?,
        damage: u64::try_from(damage)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(1, damage))?,
    })
}

/// Durable name → damage table
pub struct LedgerStore {
    conn: Connection,
}

impl LedgerStore {
    /// Open (or create) the ledger database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened ledger database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(LedgerStore { conn })
    }

    /// Insert a new player or overwrite the damage of an existing one.
    ///
    /// The row keeps its original position; the value is replaced, never summed.
    pub fn upsert(&mut self, name: &str, damage: u64) -> Result<Upsert> {
        let value = to_column(damage)?;
        let tx = self.conn.transaction()?;

        let previous: Option<i64> = tx
            .query_row(
                "SELECT damage FROM ledger WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        tx.execute(
            "INSERT INTO ledger (name, damage, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                damage = excluded.damage,
                updated_at = excluded.updated_at",
            params![name, value, Utc::now().to_rfc3339()],
        )?;

        tx.commit()?;

        Ok(match previous {
            Some(prev) => Upsert::Updated {
                previous: u64::try_from(prev).unwrap_or_default(),
            },
            None => Upsert::Inserted,
        })
    }

    /// Top `limit` entries by damage, ties in insertion order
    pub fn rank(&self, limit: usize) -> Result<Vec<LedgerEntry>> {
        if self.count()? == 0 {
            return Err(LedgerError::EmptyLedger);
        }

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT name, damage FROM ledger
             ORDER BY damage DESC, id ASC
             LIMIT ?1",
        )?;

        let entries = stmt
            .query_map(params![limit], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Drop every entry; returns how many were removed
    pub fn reset(&mut self) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute("DELETE FROM ledger", [])?;
        tx.commit()?;

        info!(removed, "ledger reset");
        Ok(removed)
    }

    /// All entries in insertion order
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, damage FROM ledger ORDER BY id ASC")?;

        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    pub fn get(&self, name: &str) -> Result<Option<u64>> {
        let damage: Option<i64> = self
            .conn
            .query_row(
                "SELECT damage FROM ledger WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        Ok(damage.and_then(|d| u64::try_from(d).ok()))
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ledger", [], |row| row.get(0))?;

        Ok(usize::try_from(count).unwrap_or_default())
    }

    // ========================================================================
    // CSV INTERCHANGE (`name,damage`, the legacy bot data file)
    // ========================================================================

    /// Write the ledger to `csv_path` in insertion order
    pub fn export_csv(&self, csv_path: &Path) -> Result<usize> {
        let entries = self.entries()?;
        let mut wtr = csv::Writer::from_path(csv_path)?;

        for entry in &entries {
            wtr.serialize(entry)?;
        }
        wtr.flush()?;

        info!(rows = entries.len(), path = %csv_path.display(), "exported ledger");
        Ok(entries.len())
    }
}

/// Read `name,damage` rows from a CSV file
pub fn load_csv(csv_path: &Path) -> Result<Vec<LedgerEntry>> {
    let mut rdr = csv::Reader::from_path(csv_path)?;

    let mut entries = Vec::new();
    for result in rdr.deserialize() {
        let entry: LedgerEntry = result?;
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LedgerStore {
        LedgerStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_upsert_overwrites_not_accumulates() {
        let mut ledger = store();

        assert_eq!(ledger.upsert("[A]", 10).unwrap(), Upsert::Inserted);
        assert_eq!(
            ledger.upsert("[A]", 20).unwrap(),
            Upsert::Updated { previous: 10 }
        );

        assert_eq!(ledger.count().unwrap(), 1);
        assert_eq!(ledger.get("[A]").unwrap(), Some(20));
    }

    #[test]
    fn test_upsert_lowering_value_is_allowed() {
        let mut ledger = store();
        ledger.upsert("[A]", 300).unwrap();
        ledger.upsert("[A]", 100).unwrap();

        assert_eq!(ledger.get("[A]").unwrap(), Some(100));
    }

    #[test]
    fn test_upsert_keeps_row_position() {
        let mut ledger = store();
        ledger.upsert("[A]", 1).unwrap();
        ledger.upsert("[B]", 2).unwrap();
        ledger.upsert("[A]", 3).unwrap();

        let names: Vec<String> = ledger.entries().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["[A]", "[B]"]);
    }

    #[test]
    fn test_rank_sorted_and_limited() {
        let mut ledger = store();
        for (name, dmg) in [("[A]", 50), ("[B]", 400), ("[C]", 75), ("[D]", 900)] {
            ledger.upsert(name, dmg).unwrap();
        }

        let top = ledger.rank(3).unwrap();

        assert_eq!(
            top,
            vec![
                LedgerEntry::new("[D]", 900),
                LedgerEntry::new("[B]", 400),
                LedgerEntry::new("[C]", 75),
            ]
        );
    }

    #[test]
    fn test_rank_ties_keep_insertion_order() {
        let mut ledger = store();
        ledger.upsert("[First]", 100).unwrap();
        ledger.upsert("[Big]", 500).unwrap();
        ledger.upsert("[Second]", 100).unwrap();
        ledger.upsert("[Third]", 100).unwrap();
        // Updating an early row must not move it behind later ties
        ledger.upsert("[First]", 100).unwrap();

        let names: Vec<String> = ledger.rank(DEFAULT_LIMIT).unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["[Big]", "[First]", "[Second]", "[Third]"]);
    }

    #[test]
    fn test_rank_never_exceeds_limit() {
        let mut ledger = store();
        for i in 0..25u64 {
            ledger.upsert(&format!("[P{}]", i), i * 7 % 11).unwrap();
        }

        for limit in [1, 5, 10, 25, 100] {
            let top = ledger.rank(limit).unwrap();
            assert!(top.len() <= limit);
            assert!(top.windows(2).all(|w| w[0].damage >= w[1].damage));
        }
    }

    #[test]
    fn test_rank_empty_ledger() {
        let ledger = store();

        assert!(matches!(ledger.rank(10), Err(LedgerError::EmptyLedger)));
    }

    #[test]
    fn test_reset_then_rank_is_empty() {
        let mut ledger = store();
        ledger.upsert("[A]", 1).unwrap();
        ledger.upsert("[B]", 2).unwrap();

        assert_eq!(ledger.reset().unwrap(), 2);
        assert!(matches!(ledger.rank(5), Err(LedgerError::EmptyLedger)));
    }

    #[test]
    fn test_reset_on_fresh_ledger() {
        let mut ledger = store();

        assert_eq!(ledger.reset().unwrap(), 0);
        assert_eq!(ledger.count().unwrap(), 0);
    }

    #[test]
    fn test_damage_out_of_range_rejected() {
        let mut ledger = store();

        assert!(matches!(
            ledger.upsert("[A]", u64::MAX),
            Err(LedgerError::DamageOutOfRange(_))
        ));
        assert_eq!(ledger.count().unwrap(), 0);
    }

    #[test]
    fn test_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let mut ledger = LedgerStore::open(&path).unwrap();
            ledger.upsert("[A]", 123).unwrap();
        }

        let ledger = LedgerStore::open(&path).unwrap();
        assert_eq!(ledger.get("[A]").unwrap(), Some(123));
    }

    #[test]
    fn test_csv_export_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bear_hunt_data.csv");

        let mut ledger = store();
        ledger.upsert("[A]", 1_234).unwrap();
        ledger.upsert("[B, with comma]", 5).unwrap();

        assert_eq!(ledger.export_csv(&path).unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().next(), Some("name,damage"));

        let loaded = load_csv(&path).unwrap();
        assert_eq!(loaded, ledger.entries().unwrap());
    }
}
