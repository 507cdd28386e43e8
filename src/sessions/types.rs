use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// A user session as cached on a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SessionRecord {
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Timestamp (ms) of the last request seen for this session.
    #[serde(default)]
    pub last_active: u64,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    pub fn for_user(session_id: impl Into<String>, user_id: i64) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: Some(user_id),
            ..Default::default()
        }
    }
}

/// A change to the session cache, produced by request handlers and applied
/// only by the session cache worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SessionsCachingAction {
    Upsert {
        site_name: String,
        user_id: Option<i64>,
        is_authenticated: bool,
        is_hidden: bool,
        session: SessionRecord,
    },
    /// Removes the user's sessions from every site.
    Remove { user_id: i64 },
    RemoveSession {
        site_name: String,
        session_id: String,
    },
    ChangeSiteName {
        old_site_name: String,
        site_name: String,
    },
    Clear,
}

/// Session indices of one site.
///
/// Every session id referenced by `authenticated_sessions` or
/// `hidden_sessions` is a key of `sessions`, and every user in
/// `hidden_sessions` is also in `authenticated_sessions`.
#[derive(Debug, Default)]
pub struct SessionsInfo {
    /// Session id -> session.
    pub sessions: DashMap<String, SessionRecord>,
    /// User id -> session id.
    pub authenticated_sessions: DashMap<i64, String>,
    /// User id -> session id, for users hidden from "who is online".
    pub hidden_sessions: DashMap<i64, String>,
}

impl SessionsInfo {
    pub(crate) fn upsert(
        &self,
        user_id: Option<i64>,
        is_authenticated: bool,
        is_hidden: bool,
        session: SessionRecord,
    ) {
        let session_id = session.session_id.clone();
        self.sessions.insert(session_id.clone(), session);

        let Some(user_id) = user_id else {
            return;
        };

        if is_authenticated {
            self.authenticated_sessions.insert(user_id, session_id.clone());
            if is_hidden {
                self.hidden_sessions.insert(user_id, session_id);
            } else {
                self.hidden_sessions.remove(&user_id);
            }
        } else {
            self.authenticated_sessions.remove(&user_id);
            self.hidden_sessions.remove(&user_id);
        }
    }

    /// Returns whether anything was removed.
    pub(crate) fn remove_user(&self, user_id: i64) -> bool {
        let mut removed = false;
        if let Some((_, session_id)) = self.authenticated_sessions.remove(&user_id) {
            removed |= self.sessions.remove(&session_id).is_some();
        }
        removed |= self.hidden_sessions.remove(&user_id).is_some();

        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.user_id != Some(user_id));
        removed || self.sessions.len() < before
    }

    pub(crate) fn remove_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        self.authenticated_sessions
            .retain(|_, indexed| indexed.as_str() != session_id);
        self.hidden_sessions
            .retain(|_, indexed| indexed.as_str() != session_id);
        removed
    }

    /// Moves every entry of `other` into `self`; entries of `other` win.
    pub(crate) fn absorb(&self, other: &SessionsInfo) {
        for entry in other.sessions.iter() {
            self.sessions.insert(entry.key().clone(), entry.value().clone());
        }
        for entry in other.authenticated_sessions.iter() {
            self.authenticated_sessions
                .insert(*entry.key(), entry.value().clone());
        }
        for entry in other.hidden_sessions.iter() {
            self.hidden_sessions.insert(*entry.key(), entry.value().clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Checks the index invariants. Used by tests and debug logging.
    pub fn is_consistent(&self) -> bool {
        let authenticated_ok = self
            .authenticated_sessions
            .iter()
            .all(|entry| self.sessions.contains_key(entry.value()));
        let hidden_ok = self.hidden_sessions.iter().all(|entry| {
            self.sessions.contains_key(entry.value())
                && self.authenticated_sessions.contains_key(entry.key())
        });
        authenticated_ok && hidden_ok
    }
}
