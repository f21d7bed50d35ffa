//! Action history — append-only log of executed commands, with the
//! aggregates the dashboard charts read.

use std::path::Path;

use chrono::{DateTime, Local, Timelike};
use rusqlite::Connection;
use serde::Serialize;

use crate::fusion::Trigger;
use crate::store::StoreError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Aggregated history: action counts per user (most active first) and per
/// local hour of day.
#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub user_labels: Vec<String>,
    pub user_counts: Vec<i64>,
    pub hour_counts: [i64; 24],
}

/// SQLite-backed history log.
pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS history (
                id     INTEGER PRIMARY KEY,
                ts     TEXT    NOT NULL,
                hour   INTEGER NOT NULL,
                user   TEXT    NOT NULL,
                action TEXT    NOT NULL,
                method TEXT    NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    /// Append one executed command.
    pub fn record(&self, user: &str, action: &str, trigger: Trigger) -> Result<(), StoreError> {
        self.record_at(Local::now(), user, action, trigger)
    }

    fn record_at(
        &self,
        at: DateTime<Local>,
        user: &str,
        action: &str,
        trigger: Trigger,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO history (ts, hour, user, action, method) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                at.format(TIMESTAMP_FORMAT).to_string(),
                at.hour(),
                user,
                action,
                trigger.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Human-readable line for the most recent action, if any.
    pub fn last_action(&self) -> Result<Option<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT action, user, method FROM history ORDER BY id DESC LIMIT 1")?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => {
                let action: String = row.get(0)?;
                let user: String = row.get(1)?;
                let method: String = row.get(2)?;
                Ok(Some(format!("{action} by {user} ({method})")))
            }
            None => Ok(None),
        }
    }

    pub fn analytics(&self) -> Result<Analytics, StoreError> {
        let mut user_labels = Vec::new();
        let mut user_counts = Vec::new();
        let mut stmt = self.conn.prepare(
            "SELECT user, COUNT(*) AS n FROM history GROUP BY user ORDER BY n DESC, user ASC",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            user_labels.push(row.get::<_, String>(0)?);
            user_counts.push(row.get::<_, i64>(1)?);
        }

        let mut hour_counts = [0i64; 24];
        let mut stmt = self
            .conn
            .prepare("SELECT hour, COUNT(*) FROM history GROUP BY hour")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let hour: i64 = row.get(0)?;
            if (0..24).contains(&hour) {
                hour_counts[hour as usize] = row.get(1)?;
            }
        }

        Ok(Analytics {
            user_labels,
            user_counts,
            hour_counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_hour(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 1, hour, 30, 0).unwrap()
    }

    #[test]
    fn test_empty_log() {
        let store = HistoryStore::open_in_memory().unwrap();
        assert_eq!(store.last_action().unwrap(), None);
        let analytics = store.analytics().unwrap();
        assert!(analytics.user_labels.is_empty());
        assert_eq!(analytics.hour_counts, [0i64; 24]);
    }

    #[test]
    fn test_last_action_formatting() {
        let store = HistoryStore::open_in_memory().unwrap();
        store
            .record("alice", "ON Main Light", Trigger::Global)
            .unwrap();
        store
            .record("bob", "OFF Ceiling Fan", Trigger::Manual)
            .unwrap();
        assert_eq!(
            store.last_action().unwrap().as_deref(),
            Some("OFF Ceiling Fan by bob (manual)")
        );
    }

    #[test]
    fn test_analytics_counts_by_user_and_hour() {
        let store = HistoryStore::open_in_memory().unwrap();
        store
            .record_at(at_hour(9), "alice", "ON Main Light", Trigger::Global)
            .unwrap();
        store
            .record_at(at_hour(9), "alice", "OFF Main Light", Trigger::Personal)
            .unwrap();
        store
            .record_at(at_hour(21), "bob", "ON Ceiling Fan", Trigger::Global)
            .unwrap();

        let analytics = store.analytics().unwrap();
        assert_eq!(analytics.user_labels, vec!["alice", "bob"]);
        assert_eq!(analytics.user_counts, vec![2, 1]);
        assert_eq!(analytics.hour_counts[9], 2);
        assert_eq!(analytics.hour_counts[21], 1);
        assert_eq!(analytics.hour_counts.iter().sum::<i64>(), 3);
    }

    #[test]
    fn test_open_creates_file_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        {
            let store = HistoryStore::open(&path).unwrap();
            store.record("alice", "ON Heater", Trigger::Manual).unwrap();
        }
        let store = HistoryStore::open(&path).unwrap();
        assert_eq!(
            store.last_action().unwrap().as_deref(),
            Some("ON Heater by alice (manual)")
        );
    }
}
