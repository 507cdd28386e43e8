//! Background worker that owns all writes to the session indices.

use super::types::*;
use crate::worker::queue::QueueWorker;

use anyhow::Result;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;

/// Session state shared between the worker (writer) and readers on request
/// threads.
#[derive(Debug, Default)]
pub struct SessionStore {
    /// Structure: `Site name -> SessionsInfo`.
    pub sites: DashMap<String, Arc<SessionsInfo>>,
    /// Users with a removal waiting in the queue.
    pub pending_removals: DashSet<i64>,
}

impl SessionStore {
    pub fn site(&self, site_name: &str) -> Option<Arc<SessionsInfo>> {
        self.sites.get(site_name).map(|entry| entry.value().clone())
    }

    fn site_or_create(&self, site_name: &str) -> Arc<SessionsInfo> {
        self.sites
            .entry(site_name.to_string())
            .or_insert_with(|| Arc::new(SessionsInfo::default()))
            .value()
            .clone()
    }
}

pub struct SessionCacheWorker {
    store: Arc<SessionStore>,
}

impl SessionCacheWorker {
    pub fn new() -> Self {
        Self {
            store: Arc::new(SessionStore::default()),
        }
    }

    fn apply(&self, action: SessionsCachingAction) {
        match action {
            SessionsCachingAction::Upsert {
                site_name,
                user_id,
                is_authenticated,
                is_hidden,
                session,
            } => {
                tracing::trace!("Upserting session {} on site {}", session.session_id, site_name);
                self.store
                    .site_or_create(&site_name)
                    .upsert(user_id, is_authenticated, is_hidden, session);
            }

            SessionsCachingAction::Remove { user_id } => {
                self.store.pending_removals.remove(&user_id);
                let mut removed = false;
                for site in self.store.sites.iter() {
                    removed |= site.value().remove_user(user_id);
                }
                tracing::trace!("Removed user {} from session cache (found: {})", user_id, removed);
            }

            SessionsCachingAction::RemoveSession {
                site_name,
                session_id,
            } => {
                if let Some(site) = self.store.site(&site_name) {
                    site.remove_session(&session_id);
                }
            }

            SessionsCachingAction::ChangeSiteName {
                old_site_name,
                site_name,
            } => {
                if old_site_name == site_name {
                    return;
                }
                let Some((_, info)) = self.store.sites.remove(&old_site_name) else {
                    return;
                };
                match self.store.sites.entry(site_name.clone()) {
                    Entry::Occupied(existing) => existing.get().absorb(&info),
                    Entry::Vacant(slot) => {
                        slot.insert(info);
                    }
                }
                tracing::debug!("Moved sessions of site '{}' to '{}'", old_site_name, site_name);
            }

            SessionsCachingAction::Clear => {
                self.store.sites.clear();
                tracing::debug!("Cleared session cache");
            }
        }
    }
}

impl Default for SessionCacheWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueWorker for SessionCacheWorker {
    type Item = SessionsCachingAction;
    type Shared = SessionStore;
    const NAME: &'static str = "sessions";

    fn shared(&self) -> Arc<SessionStore> {
        self.store.clone()
    }

    fn process_item(&mut self, action: SessionsCachingAction) -> Result<()> {
        self.apply(action);
        Ok(())
    }

    fn finish(&mut self) {
        let sessions: usize = self
            .store
            .sites
            .iter()
            .map(|site| site.value().sessions.len())
            .sum();
        tracing::info!(
            "Session cache settled: {} sites, {} sessions",
            self.store.sites.len(),
            sessions
        );
    }
}
