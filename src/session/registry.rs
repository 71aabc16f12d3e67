//! Session registry: the live sessions, keyed by user id, plus the
//! listener that refreshes them when their records change.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use super::context::{SessionContext, SessionState};
use super::identity::Identity;
use crate::config::PortalConfig;
use crate::store::{RecordChange, RecordStore};

pub struct SessionRegistry {
    store: Arc<dyn RecordStore>,
    config: Arc<PortalConfig>,
    sessions: RwLock<HashMap<String, Arc<SessionContext>>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn RecordStore>, config: Arc<PortalConfig>) -> Arc<Self> {
        Arc::new(Self {
            store,
            config,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn config(&self) -> &Arc<PortalConfig> {
        &self.config
    }

    /// Get or open the session for `identity`. A session that is still
    /// loading, or that failed closed on a store error, is resolved again.
    pub async fn session(&self, identity: Identity) -> Arc<SessionContext> {
        let existing = self.sessions.read().await.get(&identity.user_id).cloned();
        let session = match existing {
            Some(session) if *session.identity() == identity => session,
            _ => self.open(identity).await,
        };
        session.touch();

        let needs_refresh = match session.state() {
            SessionState::Loading => true,
            SessionState::Resolved(resolution) => resolution.is_degraded(),
            SessionState::Closed => false,
        };
        if needs_refresh {
            session.refresh().await;
        }
        session
    }

    async fn open(&self, identity: Identity) -> Arc<SessionContext> {
        let mut sessions = self.sessions.write().await;
        if let Some(current) = sessions.get(&identity.user_id) {
            if *current.identity() == identity {
                return Arc::clone(current);
            }
            // Same user id, different email: start over.
            current.close();
        }

        let user_id = identity.user_id.clone();
        let is_admin = identity.is_admin;
        let session = Arc::new(SessionContext::new(
            identity,
            Arc::clone(&self.store),
            Arc::clone(&self.config),
        ));
        sessions.insert(user_id.clone(), Arc::clone(&session));
        info!(user_id = %user_id, is_admin, "Session opened");
        session
    }

    pub async fn get(&self, user_id: &str) -> Option<Arc<SessionContext>> {
        self.sessions.read().await.get(user_id).cloned()
    }

    /// Close and forget a session. Returns whether one existed.
    pub async fn sign_out(&self, user_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(user_id);
        match removed {
            Some(session) => {
                session.close();
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Refresh the session a change belongs to, if the change can move a step.
    pub async fn apply_change(&self, change: &RecordChange) {
        if !change.kind.affects_step() {
            return;
        }
        let Some(user_id) = change.user_id.as_deref() else {
            return;
        };
        if let Some(session) = self.get(user_id).await {
            debug!(user_id, kind = ?change.kind, "Refreshing session after record change");
            session.refresh().await;
        }
    }

    /// Forget sessions idle for at least `idle_timeout` with no WebSocket
    /// client attached. Returns how many were dropped.
    pub async fn prune_idle(&self, idle_timeout: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            session.has_subscribers() || session.idle_for() < idle_timeout
        });
        let pruned = before - sessions.len();
        if pruned > 0 {
            debug!(pruned, remaining = sessions.len(), "Pruned idle sessions");
        }
        pruned
    }

    /// Refresh every live session.
    pub async fn refresh_all(&self) {
        let sessions: Vec<Arc<SessionContext>> =
            self.sessions.read().await.values().cloned().collect();
        for session in sessions {
            session.refresh().await;
        }
    }
}

/// How often the idle pruner runs, at most.
const PRUNE_INTERVAL: Duration = Duration::from_secs(600);

/// Spawn the task that periodically drops idle sessions.
pub fn spawn_idle_pruner(
    registry: Arc<SessionRegistry>,
    idle_timeout: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(idle_timeout.min(PRUNE_INTERVAL));
        interval.tick().await; // Skip immediate first tick
        loop {
            interval.tick().await;
            registry.prune_idle(idle_timeout).await;
        }
    })
}

/// Spawn the task that turns record changes into session refreshes.
pub fn spawn_change_listener(
    registry: Arc<SessionRegistry>,
    mut rx: broadcast::Receiver<RecordChange>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(change) => registry.apply_change(&change).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "Change listener lagged, refreshing all sessions");
                    registry.refresh_all().await;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Change channel closed");
                    break;
                }
            }
        }
    })
}
