use tracing::warn;
use ulid::Ulid;

use crate::session::InMemorySession;

/// An open transaction that rolls back on drop.
///
/// Returned by [`InMemorySession::begin_guarded`]. Call
/// [`commit`](Self::commit) to keep the staged changes. If the session's
/// transaction was already ended through another handle, dropping the guard
/// does nothing.
#[must_use = "dropping the guard rolls the transaction back"]
pub struct SessionGuard {
    session: InMemorySession,
    transaction_id: Ulid,
    finished: bool,
}

impl SessionGuard {
    pub(crate) fn new(session: InMemorySession, transaction_id: Ulid) -> Self {
        Self {
            session,
            transaction_id,
            finished: false,
        }
    }

    pub fn transaction_id(&self) -> Ulid {
        self.transaction_id
    }

    pub fn session(&self) -> &InMemorySession {
        &self.session
    }

    pub async fn commit(mut self) {
        self.finished = true;
        self.session.commit_if_current(self.transaction_id);
    }

    pub async fn rollback(mut self) {
        self.finished = true;
        self.session.rollback_if_current(self.transaction_id);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.finished && self.session.rollback_if_current(self.transaction_id) {
            warn!(transaction = %self.transaction_id, "transaction abandoned; rolled back");
        }
    }
}
