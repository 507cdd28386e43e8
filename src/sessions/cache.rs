//! Session Cache
//!
//! Reads run directly on the caller's thread against the shared store and see
//! a per-call snapshot. Writes only enqueue a [`SessionsCachingAction`]; the
//! single [`SessionCacheWorker`] applies them in order.

use super::types::*;
use super::worker::{SessionCacheWorker, SessionStore};
use crate::error::FarmResult;
use crate::worker::hub::WorkerHub;
use crate::worker::queue::WorkerQueue;

use std::sync::Arc;

/// Handle to the node's session cache. Cheap to clone.
#[derive(Clone)]
pub struct SessionCache {
    store: Arc<SessionStore>,
    queue: Arc<WorkerQueue<SessionCacheWorker>>,
}

impl SessionCache {
    /// Returns the node's session cache, starting its worker on first use.
    pub fn start(hub: &WorkerHub) -> Self {
        let queue = hub.get_or_start(SessionCacheWorker::new);
        Self {
            store: queue.shared().clone(),
            queue,
        }
    }

    pub fn queue(&self) -> &Arc<WorkerQueue<SessionCacheWorker>> {
        &self.queue
    }

    // --- Writes (enqueue only) ---

    pub fn upsert(
        &self,
        site_name: &str,
        user_id: Option<i64>,
        is_authenticated: bool,
        is_hidden: bool,
        session: SessionRecord,
    ) -> FarmResult<()> {
        self.apply(SessionsCachingAction::Upsert {
            site_name: site_name.to_string(),
            user_id,
            is_authenticated,
            is_hidden,
            session,
        })
        .map(|_| ())
    }

    /// Queues removal of a user's sessions on every site.
    ///
    /// Returns `false` when a removal for the same user is already pending and
    /// this request was dropped.
    pub fn remove(&self, user_id: i64) -> FarmResult<bool> {
        self.apply(SessionsCachingAction::Remove { user_id })
    }

    pub fn remove_session(&self, site_name: &str, session_id: &str) -> FarmResult<()> {
        self.apply(SessionsCachingAction::RemoveSession {
            site_name: site_name.to_string(),
            session_id: session_id.to_string(),
        })
        .map(|_| ())
    }

    pub fn change_site_name(&self, old_site_name: &str, site_name: &str) -> FarmResult<()> {
        self.apply(SessionsCachingAction::ChangeSiteName {
            old_site_name: old_site_name.to_string(),
            site_name: site_name.to_string(),
        })
        .map(|_| ())
    }

    pub fn clear(&self) -> FarmResult<()> {
        self.apply(SessionsCachingAction::Clear).map(|_| ())
    }

    /// Queues any action. Returns `false` if it was dropped as a duplicate removal.
    pub fn apply(&self, action: SessionsCachingAction) -> FarmResult<bool> {
        let mut removal = None;
        match &action {
            SessionsCachingAction::Remove { user_id } => {
                if !self.store.pending_removals.insert(*user_id) {
                    tracing::trace!("Removal of user {} already pending", user_id);
                    return Ok(false);
                }
                removal = Some(*user_id);
            }
            SessionsCachingAction::Upsert {
                user_id: Some(user_id),
                ..
            } => {
                // A later removal must not be mistaken for a duplicate of one
                // queued before this upsert.
                self.store.pending_removals.remove(user_id);
            }
            _ => {}
        }

        if let Err(e) = self.queue.enqueue(action) {
            if let Some(user_id) = removal {
                self.store.pending_removals.remove(&user_id);
            }
            return Err(e);
        }
        Ok(true)
    }

    /// Waits until every action queued so far has been applied.
    pub async fn flush(&self) -> FarmResult<()> {
        self.queue.flush().await
    }

    // --- Reads (caller thread) ---

    pub fn get_sessions(&self, site_name: &str) -> Vec<SessionRecord> {
        self.store
            .site(site_name)
            .map(|site| {
                site.sessions
                    .iter()
                    .map(|entry| entry.value().clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_session(&self, site_name: &str, session_id: &str) -> Option<SessionRecord> {
        self.store
            .site(site_name)
            .and_then(|site| site.sessions.get(session_id).map(|entry| entry.value().clone()))
    }

    /// The session the user is authenticated with on `site_name`.
    pub fn get_user_session(&self, site_name: &str, user_id: i64) -> Option<SessionRecord> {
        let site = self.store.site(site_name)?;
        let session_id = site
            .authenticated_sessions
            .get(&user_id)
            .map(|entry| entry.value().clone())?;
        site.sessions.get(&session_id).map(|entry| entry.value().clone())
    }

    pub fn get_sessions_count(&self, site_name: &str) -> usize {
        self.store
            .site(site_name)
            .map(|site| site.sessions.len())
            .unwrap_or(0)
    }

    pub fn get_authenticated_users_count(&self, site_name: &str) -> usize {
        self.store
            .site(site_name)
            .map(|site| site.authenticated_sessions.len())
            .unwrap_or(0)
    }

    pub fn get_hidden_users_count(&self, site_name: &str) -> usize {
        self.store
            .site(site_name)
            .map(|site| site.hidden_sessions.len())
            .unwrap_or(0)
    }

    /// User ids authenticated on `site_name`, sorted.
    pub fn get_authenticated_users(&self, site_name: &str) -> Vec<i64> {
        let mut users: Vec<i64> = self
            .store
            .site(site_name)
            .map(|site| {
                site.authenticated_sessions
                    .iter()
                    .map(|entry| *entry.key())
                    .collect()
            })
            .unwrap_or_default();
        users.sort_unstable();
        users
    }

    pub fn is_user_authenticated(&self, site_name: &str, user_id: i64) -> bool {
        self.store
            .site(site_name)
            .map(|site| site.authenticated_sessions.contains_key(&user_id))
            .unwrap_or(false)
    }

    pub fn is_user_hidden(&self, site_name: &str, user_id: i64) -> bool {
        self.store
            .site(site_name)
            .map(|site| site.hidden_sessions.contains_key(&user_id))
            .unwrap_or(false)
    }

    pub fn site_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .store
            .sites
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn site_info(&self, site_name: &str) -> Option<Arc<SessionsInfo>> {
        self.store.site(site_name)
    }
}
