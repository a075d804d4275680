use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::pipeline::PipelineSession;

/// How long an untouched session survives before it is reclaimed.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Why a session could not be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkout {
    Missing,
    Busy,
}

struct Slot {
    session: Arc<Mutex<PipelineSession>>,
    touched: Instant,
}

/// Live optimization sessions, one lock per session.
///
/// A stage call holds the session lock for its whole duration. Callers use
/// `checkout`, which fails fast instead of queuing behind an in-flight stage.
/// Sessions nobody has checked out for `ttl` are dropped unless locked.
#[derive(Clone)]
pub struct RunRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Slot>>>,
    ttl: Duration,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::with_ttl(SESSION_TTL)
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Registers the session and returns it already locked by the caller.
    /// Idle sessions are swept first.
    pub async fn insert(&self, session: PipelineSession) -> OwnedMutexGuard<PipelineSession> {
        self.evict_idle().await;
        let id = session.id();
        let slot = Arc::new(Mutex::new(session));
        let guard = slot.clone().lock_owned().await;
        self.sessions.write().await.insert(
            id,
            Slot {
                session: slot,
                touched: Instant::now(),
            },
        );
        guard
    }

    /// Locks the session and marks it as touched.
    pub async fn checkout(&self, id: Uuid) -> Result<OwnedMutexGuard<PipelineSession>, Checkout> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(&id).ok_or(Checkout::Missing)?;
        let guard = slot
            .session
            .clone()
            .try_lock_owned()
            .map_err(|_| Checkout::Busy)?;
        slot.touched = Instant::now();
        Ok(guard)
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Forgets the session. A stage still running on it finishes against the
    /// orphaned value and its result is dropped.
    pub async fn remove(&self, id: Uuid) -> Option<Arc<Mutex<PipelineSession>>> {
        self.sessions.write().await.remove(&id).map(|slot| slot.session)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops every unlocked session untouched for longer than the TTL.
    /// Returns how many were dropped.
    pub async fn evict_idle(&self) -> usize {
        let ttl = self.ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| {
            slot.touched.elapsed() < ttl || slot.session.try_lock().is_err()
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {evicted} idle optimization sessions");
        }
        evicted
    }

    /// Sweeps idle sessions on a fixed period for the life of the process.
    pub fn spawn_reaper(&self, every: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                registry.evict_idle().await;
            }
        })
    }
}
