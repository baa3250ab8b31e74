//! Per-user, per-verb interaction counters.
//!
//! Each counter lives in the `stats` table under a string key of the form
//! `VERB|USERID|Sent` or `VERB|USERID|Received`, both halves upper-cased so
//! lookups are case-insensitive. A missing key reads as zero.

use rusqlite::{OptionalExtension, params};
use std::fmt;
use std::sync::Arc;

use crate::database::{Database, StorageError};
use crate::emote::error::EmoteError;

/// Which side of an interaction a counter tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Sent => "Sent",
            Direction::Received => "Received",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage key for a counter.
pub fn counter_key(verb: &str, user_id: &str, direction: Direction) -> String {
    format!("{}|{}|{}", verb.to_uppercase(), user_id.to_uppercase(), direction)
}

/// Counter ledger backed by the shared SQLite database.
#[derive(Clone)]
pub struct StatsStore {
    db: Arc<Database>,
}

impl StatsStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn get_count(&self, verb: &str, user_id: &str, direction: Direction) -> Result<i64, StorageError> {
        let conn = self.db.lock();
        read_count(&conn, &counter_key(verb, user_id, direction))
    }

    pub fn get_sent_count(&self, verb: &str, user_id: &str) -> Result<i64, StorageError> {
        self.get_count(verb, user_id, Direction::Sent)
    }

    pub fn get_received_count(&self, verb: &str, user_id: &str) -> Result<i64, StorageError> {
        self.get_count(verb, user_id, Direction::Received)
    }

    /// Overwrite a counter. Negative counts are rejected without writing.
    pub fn set_count(&self, verb: &str, user_id: &str, direction: Direction, count: i64) -> Result<(), EmoteError> {
        if count < 0 {
            return Err(EmoteError::Validation(format!(
                "negative {} count {} for {}/{}",
                direction, count, verb, user_id
            )));
        }

        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO stats (key, count) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET count = ?2",
            params![counter_key(verb, user_id, direction), count],
        )
        .map_err(StorageError::from)?;
        Ok(())
    }

    pub fn set_sent_count(&self, verb: &str, user_id: &str, count: i64) -> Result<(), EmoteError> {
        self.set_count(verb, user_id, Direction::Sent, count)
    }

    pub fn set_received_count(&self, verb: &str, user_id: &str, count: i64) -> Result<(), EmoteError> {
        self.set_count(verb, user_id, Direction::Received, count)
    }

    /// Both counters for a user, read inside one transaction.
    pub fn get_counts_for_user(&self, verb: &str, user_id: &str) -> Result<(i64, i64), StorageError> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        let sent = read_count(&tx, &counter_key(verb, user_id, Direction::Sent))?;
        let received = read_count(&tx, &counter_key(verb, user_id, Direction::Received))?;
        tx.commit()?;
        Ok((sent, received))
    }

    /// Add one to a counter and return the new value.
    ///
    /// The read-modify-write is a single UPSERT statement, so concurrent
    /// increments of the same key never lose an update.
    pub fn increment(&self, verb: &str, user_id: &str, direction: Direction) -> Result<i64, StorageError> {
        let conn = self.db.lock();
        let count = conn.query_row(
            "INSERT INTO stats (key, count) VALUES (?1, 1)
             ON CONFLICT(key) DO UPDATE SET count = count + 1
             RETURNING count",
            params![counter_key(verb, user_id, direction)],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn read_count(conn: &rusqlite::Connection, key: &str) -> Result<i64, StorageError> {
    let count = conn
        .query_row("SELECT count FROM stats WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?;
    Ok(count.unwrap_or(0))
}
