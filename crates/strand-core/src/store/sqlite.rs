//! SQLite-backed stores.
//!
//! The item database holds items, the append-only review history, the
//! practice log and session records. The catalogue lives in its own database.
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so they compare
//! lexicographically.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{StrandError, StrandResult};
use crate::traits::{CatalogueStore, ItemStore, QualityAverage, ReviewCommit, SessionRepository};
use crate::types::{
    CatalogueNode, CefrLevel, Item, PracticeLogEntry, Quality, ReviewEvent, SessionRecord,
    StrandDetail,
};

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

fn req_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn quality_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Quality> {
    let raw: i64 = row.get(idx)?;
    Quality::new(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn json_col<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const ITEM_COLUMNS: &str = "item_id, node_id, strand, skill, stability, difficulty, reps,
     last_reviewed_at, due_at, mastery_status";

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        item_id: row.get(0)?,
        node_id: row.get(1)?,
        strand: parse_col(row, 2)?,
        skill: parse_col(row, 3)?,
        stability: row.get(4)?,
        difficulty: row.get(5)?,
        reps: row.get(6)?,
        last_reviewed_at: opt_ts(row, 7)?,
        due_at: opt_ts(row, 8)?,
        mastery_status: parse_col(row, 9)?,
    })
}

const REVIEW_COLUMNS: &str = "item_id, session_id, quality, reviewed_at, strand, exercise_type,
     stability_before, stability_after, difficulty_before, difficulty_after,
     mastery_before, mastery_after";

fn row_to_review(row: &Row<'_>) -> rusqlite::Result<ReviewEvent> {
    let exercise_type: Option<String> = row.get(5)?;
    Ok(ReviewEvent {
        item_id: row.get(0)?,
        session_id: row.get(1)?,
        quality: quality_col(row, 2)?,
        reviewed_at: req_ts(row, 3)?,
        strand: parse_col(row, 4)?,
        exercise_type: exercise_type.and_then(|s| s.parse().ok()),
        stability_before: row.get(6)?,
        stability_after: row.get(7)?,
        difficulty_before: row.get(8)?,
        difficulty_after: row.get(9)?,
        mastery_before: parse_col(row, 10)?,
        mastery_after: parse_col(row, 11)?,
    })
}

const LOG_COLUMNS: &str = "learner_id, session_id, item_id, node_id, strand, practiced_at,
     duration_seconds, quality, detail";

fn row_to_log(row: &Row<'_>) -> rusqlite::Result<PracticeLogEntry> {
    let quality: Option<i64> = row.get(7)?;
    let quality = quality
        .map(Quality::new)
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Integer, Box::new(e)))?;
    let detail: StrandDetail = json_col(row, 8)?;
    Ok(PracticeLogEntry {
        learner_id: row.get(0)?,
        session_id: row.get(1)?,
        item_id: row.get(2)?,
        node_id: row.get(3)?,
        strand: parse_col(row, 4)?,
        practiced_at: req_ts(row, 5)?,
        duration_seconds: row.get(6)?,
        quality,
        detail,
    })
}

/// SQLite-backed item, history and session store.
pub struct SqliteItemStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteItemStore {
    /// Open (or create) the item database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> StrandResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory database (useful for testing).
    pub fn in_memory() -> StrandResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StrandResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StrandError::database(e.to_string()))
    }

    fn init_schema(&self) -> StrandResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS items (
                item_id TEXT PRIMARY KEY,
                node_id TEXT NOT NULL,
                strand TEXT NOT NULL,
                skill TEXT NOT NULL,
                stability REAL NOT NULL DEFAULT 0,
                difficulty REAL NOT NULL DEFAULT 5,
                reps INTEGER NOT NULL DEFAULT 0,
                last_reviewed_at TEXT,
                due_at TEXT,
                mastery_status TEXT NOT NULL DEFAULT 'new'
            );

            CREATE INDEX IF NOT EXISTS idx_items_node ON items(node_id);
            CREATE INDEX IF NOT EXISTS idx_items_due ON items(due_at);
            CREATE INDEX IF NOT EXISTS idx_items_status ON items(mastery_status);

            -- Append-only: rows are never updated or deleted.
            CREATE TABLE IF NOT EXISTS review_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_id TEXT NOT NULL,
                session_id TEXT,
                quality INTEGER NOT NULL,
                reviewed_at TEXT NOT NULL,
                strand TEXT NOT NULL,
                exercise_type TEXT,
                stability_before REAL NOT NULL,
                stability_after REAL NOT NULL,
                difficulty_before REAL NOT NULL,
                difficulty_after REAL NOT NULL,
                mastery_before TEXT NOT NULL,
                mastery_after TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_review_item ON review_history(item_id);
            CREATE INDEX IF NOT EXISTS idx_review_session ON review_history(session_id);
            CREATE INDEX IF NOT EXISTS idx_review_time ON review_history(reviewed_at);

            CREATE TABLE IF NOT EXISTS practice_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                item_id TEXT,
                node_id TEXT NOT NULL,
                strand TEXT NOT NULL,
                practiced_at TEXT NOT NULL,
                duration_seconds REAL NOT NULL,
                quality INTEGER,
                detail TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_log_learner_time ON practice_log(learner_id, practiced_at);
            CREATE INDEX IF NOT EXISTS idx_log_session ON practice_log(session_id);

            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                learner_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                target_minutes REAL NOT NULL,
                planned TEXT NOT NULL,
                preference TEXT,
                balance_status TEXT NOT NULL,
                notes TEXT NOT NULL DEFAULT ''
            );
            ",
        )?;
        Ok(())
    }

    fn insert_log(conn: &Connection, entry: &PracticeLogEntry) -> rusqlite::Result<()> {
        let detail = serde_json::to_string(&entry.detail)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        conn.execute(
            "INSERT INTO practice_log
             (learner_id, session_id, item_id, node_id, strand, practiced_at,
              duration_seconds, quality, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.learner_id,
                entry.session_id,
                entry.item_id,
                entry.node_id,
                entry.strand.to_string(),
                ts(entry.practiced_at),
                entry.duration_seconds,
                entry.quality.map(|q| i64::from(q)),
                detail,
            ],
        )?;
        Ok(())
    }

    fn write_review(tx: &Transaction<'_>, commit: &ReviewCommit) -> StrandResult<()> {
        let item = &commit.item;
        let txn = StrandError::transaction_from;

        let changed = if commit.create {
            tx.execute(
                &format!(
                    "INSERT OR IGNORE INTO items ({ITEM_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    item.item_id,
                    item.node_id,
                    item.strand.to_string(),
                    item.skill.to_string(),
                    item.stability,
                    item.difficulty,
                    item.reps,
                    item.last_reviewed_at.map(ts),
                    item.due_at.map(ts),
                    item.mastery_status.to_string(),
                ],
            )
            .map_err(txn)?
        } else {
            tx.execute(
                "UPDATE items
                 SET stability = ?2, difficulty = ?3, reps = ?4, last_reviewed_at = ?5,
                     due_at = ?6, mastery_status = ?7
                 WHERE item_id = ?1 AND reps = ?8",
                params![
                    item.item_id,
                    item.stability,
                    item.difficulty,
                    item.reps,
                    item.last_reviewed_at.map(ts),
                    item.due_at.map(ts),
                    item.mastery_status.to_string(),
                    commit.expected_reps,
                ],
            )
            .map_err(txn)?
        };

        if changed != 1 {
            tracing::warn!(item_id = %item.item_id, "Stale item state; review not applied");
            return Err(StrandError::transaction_conflict(&item.item_id));
        }

        let event = &commit.event;
        tx.execute(
            &format!(
                "INSERT INTO review_history ({REVIEW_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                event.item_id,
                event.session_id,
                i64::from(event.quality),
                ts(event.reviewed_at),
                event.strand.to_string(),
                event.exercise_type.map(|t| t.to_string()),
                event.stability_before,
                event.stability_after,
                event.difficulty_before,
                event.difficulty_after,
                event.mastery_before.to_string(),
                event.mastery_after.to_string(),
            ],
        )
        .map_err(txn)?;

        Self::insert_log(tx, &commit.log_entry).map_err(txn)?;
        Ok(())
    }
}

impl ItemStore for SqliteItemStore {
    fn get_item(&self, item_id: &str) -> StrandResult<Option<Item>> {
        let conn = self.lock()?;
        let item = conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE item_id = ?1"),
                params![item_id],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    fn insert_item(&self, item: &Item) -> StrandResult<()> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO items ({ITEM_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                item.item_id,
                item.node_id,
                item.strand.to_string(),
                item.skill.to_string(),
                item.stability,
                item.difficulty,
                item.reps,
                item.last_reviewed_at.map(ts),
                item.due_at.map(ts),
                item.mastery_status.to_string(),
            ],
        )?;
        Ok(())
    }

    fn all_items(&self) -> StrandResult<Vec<Item>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY item_id"))?;
        let items = stmt
            .query_map([], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn due_items(&self, now: DateTime<Utc>, limit: usize) -> StrandResult<Vec<Item>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE last_reviewed_at IS NULL OR due_at IS NULL OR due_at <= ?1
             ORDER BY last_reviewed_at ASC NULLS FIRST, item_id"
        ))?;
        let rows = stmt
            .query_map(params![ts(now)], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .filter(|item| item.is_due(now))
            .take(limit)
            .collect())
    }

    fn average_quality(&self, item_id: &str) -> StrandResult<QualityAverage> {
        let conn = self.lock()?;
        let (mean, count): (Option<f64>, i64) = conn.query_row(
            "SELECT AVG(quality), COUNT(*) FROM review_history WHERE item_id = ?1",
            params![item_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(QualityAverage {
            mean: mean.unwrap_or(0.0),
            count: count as u32,
        })
    }

    fn review_history(&self, item_id: &str) -> StrandResult<Vec<ReviewEvent>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM review_history WHERE item_id = ?1 ORDER BY id"
        ))?;
        let events = stmt
            .query_map(params![item_id], row_to_review)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    fn reviews_since(&self, since: Option<DateTime<Utc>>) -> StrandResult<Vec<ReviewEvent>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM review_history
             WHERE ?1 IS NULL OR reviewed_at >= ?1
             ORDER BY reviewed_at, id"
        ))?;
        let events = stmt
            .query_map(params![since.map(ts)], row_to_review)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    fn practice_log(
        &self,
        learner_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> StrandResult<Vec<PracticeLogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {LOG_COLUMNS} FROM practice_log
             WHERE learner_id = ?1 AND (?2 IS NULL OR practiced_at >= ?2)
             ORDER BY practiced_at, id"
        ))?;
        let rows = stmt.query_map(params![learner_id, since.map(ts)], row_to_log)?;

        let mut entries = Vec::new();
        for row in rows {
            match row {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(learner_id, error = %e, "Skipping malformed practice log row"),
            }
        }
        Ok(entries)
    }

    fn session_log(&self, session_id: &str) -> StrandResult<Vec<PracticeLogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {LOG_COLUMNS} FROM practice_log WHERE session_id = ?1 ORDER BY id"
        ))?;
        let entries = stmt
            .query_map(params![session_id], row_to_log)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn session_reviews(&self, session_id: &str) -> StrandResult<Vec<ReviewEvent>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM review_history WHERE session_id = ?1 ORDER BY id"
        ))?;
        let events = stmt
            .query_map(params![session_id], row_to_review)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    fn commit_review(&self, commit: &ReviewCommit) -> StrandResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(StrandError::transaction_from)?;
        // Dropping `tx` on error rolls every write back.
        Self::write_review(&tx, commit)?;
        tx.commit().map_err(StrandError::transaction_from)?;
        Ok(())
    }

    fn log_practice(&self, entry: &PracticeLogEntry) -> StrandResult<()> {
        let conn = self.lock()?;
        Self::insert_log(&conn, entry)?;
        Ok(())
    }
}

impl SessionRepository for SqliteItemStore {
    fn load(&self, session_id: &str) -> StrandResult<Option<SessionRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT session_id, learner_id, started_at, ended_at, target_minutes,
                        planned, preference, balance_status, notes
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| {
                    let preference: Option<String> = row.get(6)?;
                    let preference = preference
                        .map(|p| serde_json::from_str(&p))
                        .transpose()
                        .map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e))
                        })?;
                    Ok(SessionRecord {
                        session_id: row.get(0)?,
                        learner_id: row.get(1)?,
                        started_at: req_ts(row, 2)?,
                        ended_at: opt_ts(row, 3)?,
                        target_minutes: row.get(4)?,
                        planned: json_col(row, 5)?,
                        preference,
                        balance_status: parse_col(row, 7)?,
                        notes: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn save(&self, session: &SessionRecord) -> StrandResult<()> {
        let planned = serde_json::to_string(&session.planned)?;
        let preference = session
            .preference
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO sessions
             (session_id, learner_id, started_at, ended_at, target_minutes,
              planned, preference, balance_status, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                session.session_id,
                session.learner_id,
                ts(session.started_at),
                session.ended_at.map(ts),
                session.target_minutes,
                planned,
                preference,
                session.balance_status.to_string(),
                session.notes,
            ],
        )?;
        Ok(())
    }
}

/// SQLite-backed catalogue: nodes plus prerequisite edges.
pub struct SqliteCatalogueStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogueStore {
    /// Open (or create) the catalogue database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> StrandResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory catalogue (useful for testing).
    pub fn in_memory() -> StrandResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StrandResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StrandError::database(e.to_string()))
    }

    fn init_schema(&self) -> StrandResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS nodes (
                node_id TEXT PRIMARY KEY,
                node_type TEXT NOT NULL,
                label TEXT NOT NULL DEFAULT '',
                cefr_level TEXT,
                strand TEXT
            );

            CREATE TABLE IF NOT EXISTS edges (
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                edge_type TEXT NOT NULL,
                PRIMARY KEY (source_id, target_id, edge_type)
            );

            CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id, edge_type);
            ",
        )?;
        Ok(())
    }

    /// Insert or replace a node and its prerequisite edges.
    pub fn upsert_node(&self, node: &CatalogueNode) -> StrandResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO nodes (node_id, node_type, label, cefr_level, strand)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                node.node_id,
                node.node_type,
                node.label,
                node.cefr_level.to_string(),
                node.strand.map(|s| s.to_string()),
            ],
        )?;
        tx.execute(
            "DELETE FROM edges WHERE target_id = ?1 AND edge_type = 'prerequisite_of'",
            params![node.node_id],
        )?;
        for prerequisite in &node.prerequisites {
            tx.execute(
                "INSERT OR IGNORE INTO edges (source_id, target_id, edge_type)
                 VALUES (?1, ?2, 'prerequisite_of')",
                params![prerequisite, node.node_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn prerequisites(conn: &Connection, node_id: &str) -> StrandResult<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT source_id FROM edges
             WHERE target_id = ?1 AND edge_type = 'prerequisite_of'
             ORDER BY source_id",
        )?;
        let ids = stmt
            .query_map(params![node_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

/// Map a node row. Unknown levels fall back to A1 and unknown strand tags
/// to node-type inference.
fn row_to_node(row: &Row<'_>) -> rusqlite::Result<CatalogueNode> {
    let cefr: Option<String> = row.get(3)?;
    let strand: Option<String> = row.get(4)?;
    Ok(CatalogueNode {
        node_id: row.get(0)?,
        node_type: row.get(1)?,
        label: row.get(2)?,
        cefr_level: CefrLevel::parse_lenient(cefr.as_deref()),
        strand: strand.and_then(|s| s.parse().ok()),
        prerequisites: Vec::new(),
    })
}

impl CatalogueStore for SqliteCatalogueStore {
    fn nodes(&self) -> StrandResult<Vec<CatalogueNode>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT node_id, node_type, label, cefr_level, strand FROM nodes ORDER BY node_id",
        )?;
        let mut nodes = stmt
            .query_map([], row_to_node)?
            .collect::<Result<Vec<_>, _>>()?;
        for node in &mut nodes {
            node.prerequisites = Self::prerequisites(&conn, &node.node_id)?;
        }
        Ok(nodes)
    }

    fn node(&self, node_id: &str) -> StrandResult<Option<CatalogueNode>> {
        let conn = self.lock()?;
        let node = conn
            .query_row(
                "SELECT node_id, node_type, label, cefr_level, strand FROM nodes WHERE node_id = ?1",
                params![node_id],
                row_to_node,
            )
            .optional()?;
        match node {
            Some(mut node) => {
                node.prerequisites = Self::prerequisites(&conn, &node.node_id)?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MasteryStatus, Skill, Strand};
    use chrono::Duration;

    #[test]
    fn test_item_roundtrip() {
        let store = SqliteItemStore::in_memory().unwrap();
        let now = Utc::now();
        let mut item = Item::new("lex.a.1", "lex.a", Strand::LanguageFocused, Skill::Writing);
        store.insert_item(&item).unwrap();
        assert_eq!(store.get_item("lex.a.1").unwrap(), Some(item.clone()));

        item.item_id = "lex.a.2".to_string();
        item.reps = 2;
        item.stability = 3.5;
        item.last_reviewed_at = Some(now);
        item.due_at = Some(now + Duration::days(3));
        item.mastery_status = MasteryStatus::Learning;
        store.insert_item(&item).unwrap();
        assert_eq!(store.get_item("lex.a.2").unwrap(), Some(item));
        assert!(store.get_item("missing").unwrap().is_none());
        assert!(store.insert_item(&Item::new("lex.a.1", "x", Strand::Fluency, Skill::Reading)).is_err());
    }

    #[test]
    fn test_due_items_order_and_filter() {
        let store = SqliteItemStore::in_memory().unwrap();
        let now = Utc::now();

        let fresh = Item::new("a", "n", Strand::MeaningOutput, Skill::Speaking);
        let mut overdue = Item::new("b", "n", Strand::MeaningOutput, Skill::Speaking);
        overdue.reps = 1;
        overdue.stability = 1.0;
        overdue.last_reviewed_at = Some(now - Duration::days(5));
        overdue.due_at = Some(now - Duration::days(4));
        let mut later = overdue.clone();
        later.item_id = "c".to_string();
        later.last_reviewed_at = Some(now - Duration::days(1));
        later.due_at = Some(now + Duration::days(10));
        let mut legacy = overdue.clone();
        legacy.item_id = "d".to_string();
        legacy.last_reviewed_at = Some(now - Duration::days(2));
        legacy.due_at = None;

        for item in [&fresh, &overdue, &later, &legacy] {
            store.insert_item(item).unwrap();
        }

        let due: Vec<String> = store
            .due_items(now, 10)
            .unwrap()
            .into_iter()
            .map(|i| i.item_id)
            .collect();
        assert_eq!(due, vec!["a", "b", "d"]);
        assert_eq!(store.due_items(now, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_log_insert_rolls_back_item_update() {
        let store = SqliteItemStore::in_memory().unwrap();
        let now = Utc::now();
        let mut item = Item::new("lex.a.1", "lex.a", Strand::LanguageFocused, Skill::Writing);
        item.reps = 1;
        item.stability = 2.0;
        item.last_reviewed_at = Some(now - Duration::days(2));
        item.due_at = Some(now);
        item.mastery_status = MasteryStatus::Learning;
        store.insert_item(&item).unwrap();

        // The item UPDATE and review insert succeed; the log insert is rejected.
        store
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_log BEFORE INSERT ON practice_log
                 BEGIN SELECT RAISE(ABORT, 'practice log unavailable'); END;",
            )
            .unwrap();

        let mut updated = item.clone();
        updated.reps = 2;
        updated.stability = 6.0;
        updated.last_reviewed_at = Some(now);
        updated.due_at = Some(now + Duration::days(6));
        let quality = Quality::new(4).unwrap();
        let commit = ReviewCommit {
            event: ReviewEvent {
                item_id: item.item_id.clone(),
                session_id: Some("s1".to_string()),
                quality,
                reviewed_at: now,
                strand: item.strand,
                exercise_type: None,
                stability_before: item.stability,
                stability_after: updated.stability,
                difficulty_before: item.difficulty,
                difficulty_after: updated.difficulty,
                mastery_before: item.mastery_status,
                mastery_after: updated.mastery_status,
            },
            log_entry: PracticeLogEntry {
                learner_id: "ana".to_string(),
                session_id: "s1".to_string(),
                item_id: Some(item.item_id.clone()),
                node_id: item.node_id.clone(),
                strand: item.strand,
                practiced_at: now,
                duration_seconds: 40.0,
                quality: Some(quality),
                detail: StrandDetail::LanguageFocused,
            },
            item: updated,
            expected_reps: 1,
            create: false,
        };

        let err = store.commit_review(&commit).unwrap_err();
        assert!(matches!(err, StrandError::StorageTransactionFailed { .. }));
        assert!(!err.is_conflict());
        assert_eq!(store.get_item("lex.a.1").unwrap(), Some(item));
        assert!(store.review_history("lex.a.1").unwrap().is_empty());
        assert!(store.session_log("s1").unwrap().is_empty());
        assert!(store.session_reviews("s1").unwrap().is_empty());
    }

    #[test]
    fn test_session_roundtrip() {
        let store = SqliteItemStore::in_memory().unwrap();
        let record = SessionRecord {
            session_id: "s1".to_string(),
            learner_id: "ana".to_string(),
            started_at: Utc::now(),
            ended_at: None,
            target_minutes: 15.0,
            planned: Vec::new(),
            preference: Some(crate::types::StrandPreference::new().with(Strand::Fluency, 2.0)),
            balance_status: crate::types::BalanceStatus::Balanced,
            notes: "notes".to_string(),
        };
        store.save(&record).unwrap();
        assert_eq!(store.load("s1").unwrap(), Some(record));
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn test_catalogue_nodes_with_prerequisites() {
        let store = SqliteCatalogueStore::in_memory().unwrap();
        store
            .upsert_node(&CatalogueNode::new("lex.a", "Lexeme", "a", CefrLevel::A1))
            .unwrap();
        store
            .upsert_node(
                &CatalogueNode::new("cando.b", "CanDo", "b", CefrLevel::A2)
                    .with_strand(Strand::MeaningInput)
                    .with_prerequisites(["lex.a"]),
            )
            .unwrap();

        let nodes = store.nodes().unwrap();
        assert_eq!(nodes.len(), 2);
        let b = store.node("cando.b").unwrap().unwrap();
        assert_eq!(b.prerequisites, vec!["lex.a".to_string()]);
        assert_eq!(b.effective_strand(), Strand::MeaningInput);
        assert_eq!(nodes[1].effective_strand(), Strand::LanguageFocused);
    }
}
