//! Session state repository.

use crate::error::StrandResult;
use crate::types::SessionRecord;

/// Load and save session records.
///
/// Any process holding the repository can resume a session; nothing relies
/// on process-local memory.
#[cfg_attr(test, mockall::automock)]
pub trait SessionRepository: Send + Sync {
    fn load(&self, session_id: &str) -> StrandResult<Option<SessionRecord>>;

    /// Insert or replace a session record.
    fn save(&self, session: &SessionRecord) -> StrandResult<()>;
}
