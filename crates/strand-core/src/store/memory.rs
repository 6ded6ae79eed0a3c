//! In-memory store implementations.
//!
//! Same semantics as the SQLite stores, including the optimistic `reps` check
//! on commits. Useful for tests and for embedding without a database.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::error::{StrandError, StrandResult};
use crate::traits::{CatalogueStore, ItemStore, QualityAverage, ReviewCommit, SessionRepository};
use crate::types::{
    CatalogueNode, Item, PracticeLogEntry, ReviewEvent, SessionRecord,
};

#[derive(Default)]
struct State {
    items: BTreeMap<String, Item>,
    reviews: Vec<ReviewEvent>,
    log: Vec<PracticeLogEntry>,
    sessions: HashMap<String, SessionRecord>,
}

/// In-memory item, history and session store.
#[derive(Default)]
pub struct InMemoryItemStore {
    state: Mutex<State>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StrandResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| StrandError::database(e.to_string()))
    }
}

impl ItemStore for InMemoryItemStore {
    fn get_item(&self, item_id: &str) -> StrandResult<Option<Item>> {
        Ok(self.lock()?.items.get(item_id).cloned())
    }

    fn insert_item(&self, item: &Item) -> StrandResult<()> {
        let mut state = self.lock()?;
        if state.items.contains_key(&item.item_id) {
            return Err(StrandError::validation(format!(
                "Item '{}' already exists",
                item.item_id
            )));
        }
        state.items.insert(item.item_id.clone(), item.clone());
        Ok(())
    }

    fn all_items(&self) -> StrandResult<Vec<Item>> {
        Ok(self.lock()?.items.values().cloned().collect())
    }

    fn due_items(&self, now: DateTime<Utc>, limit: usize) -> StrandResult<Vec<Item>> {
        let state = self.lock()?;
        let mut due: Vec<Item> = state
            .items
            .values()
            .filter(|i| i.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.last_reviewed_at.cmp(&b.last_reviewed_at));
        due.truncate(limit);
        Ok(due)
    }

    fn average_quality(&self, item_id: &str) -> StrandResult<QualityAverage> {
        let state = self.lock()?;
        let qualities: Vec<f64> = state
            .reviews
            .iter()
            .filter(|r| r.item_id == item_id)
            .map(|r| r.quality.as_f64())
            .collect();
        if qualities.is_empty() {
            return Ok(QualityAverage::default());
        }
        Ok(QualityAverage {
            mean: qualities.iter().sum::<f64>() / qualities.len() as f64,
            count: qualities.len() as u32,
        })
    }

    fn review_history(&self, item_id: &str) -> StrandResult<Vec<ReviewEvent>> {
        Ok(self
            .lock()?
            .reviews
            .iter()
            .filter(|r| r.item_id == item_id)
            .cloned()
            .collect())
    }

    fn reviews_since(&self, since: Option<DateTime<Utc>>) -> StrandResult<Vec<ReviewEvent>> {
        let mut events: Vec<ReviewEvent> = self
            .lock()?
            .reviews
            .iter()
            .filter(|r| since.map_or(true, |s| r.reviewed_at >= s))
            .cloned()
            .collect();
        events.sort_by_key(|r| r.reviewed_at);
        Ok(events)
    }

    fn practice_log(
        &self,
        learner_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> StrandResult<Vec<PracticeLogEntry>> {
        let mut entries: Vec<PracticeLogEntry> = self
            .lock()?
            .log
            .iter()
            .filter(|e| e.learner_id == learner_id)
            .filter(|e| since.map_or(true, |s| e.practiced_at >= s))
            .cloned()
            .collect();
        // Stable, so same-instant entries keep insertion order.
        entries.sort_by_key(|e| e.practiced_at);
        Ok(entries)
    }

    fn session_log(&self, session_id: &str) -> StrandResult<Vec<PracticeLogEntry>> {
        Ok(self
            .lock()?
            .log
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect())
    }

    fn session_reviews(&self, session_id: &str) -> StrandResult<Vec<ReviewEvent>> {
        Ok(self
            .lock()?
            .reviews
            .iter()
            .filter(|r| r.session_id.as_deref() == Some(session_id))
            .cloned()
            .collect())
    }

    fn commit_review(&self, commit: &ReviewCommit) -> StrandResult<()> {
        let mut state = self.lock()?;
        let item_id = &commit.item.item_id;

        match (state.items.get(item_id), commit.create) {
            (None, true) => {}
            (Some(stored), false) if stored.reps == commit.expected_reps => {}
            (None, false) => {
                return Err(StrandError::storage_transaction(format!(
                    "item '{}' disappeared before commit",
                    item_id
                )))
            }
            _ => {
                tracing::warn!(item_id = %item_id, "Stale item state; review not applied");
                return Err(StrandError::transaction_conflict(&item_id));
            }
        }

        state.items.insert(item_id.clone(), commit.item.clone());
        state.reviews.push(commit.event.clone());
        state.log.push(commit.log_entry.clone());
        Ok(())
    }

    fn log_practice(&self, entry: &PracticeLogEntry) -> StrandResult<()> {
        self.lock()?.log.push(entry.clone());
        Ok(())
    }
}

impl SessionRepository for InMemoryItemStore {
    fn load(&self, session_id: &str) -> StrandResult<Option<SessionRecord>> {
        Ok(self.lock()?.sessions.get(session_id).cloned())
    }

    fn save(&self, session: &SessionRecord) -> StrandResult<()> {
        self.lock()?
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }
}

/// In-memory catalogue.
#[derive(Default)]
pub struct InMemoryCatalogue {
    nodes: Mutex<BTreeMap<String, CatalogueNode>>,
}

impl InMemoryCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node.
    pub fn add_node(&self, node: CatalogueNode) {
        if let Ok(mut nodes) = self.nodes.lock() {
            nodes.insert(node.node_id.clone(), node);
        }
    }
}

impl CatalogueStore for InMemoryCatalogue {
    fn nodes(&self) -> StrandResult<Vec<CatalogueNode>> {
        let nodes = self
            .nodes
            .lock()
            .map_err(|e| StrandError::database(e.to_string()))?;
        Ok(nodes.values().cloned().collect())
    }

    fn node(&self, node_id: &str) -> StrandResult<Option<CatalogueNode>> {
        let nodes = self
            .nodes
            .lock()
            .map_err(|e| StrandError::database(e.to_string()))?;
        Ok(nodes.get(node_id).cloned())
    }
}
