// In-memory implementation of the ActorStateStore port.
//
// The original kept one process-wide table keyed by guild+user with no
// eviction, which leaks memory over a long uptime. Here entries whose
// window and warn counter are both at rest get swept out once the actor has
// been idle past the retention horizon.

use crate::core::moderation::{ActorState, ActorStateStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Mutex;

/// Idle time after which a zero-warn actor is evicted.
pub const RETENTION_SECS: i64 = 15 * 60;

/// Sweeps run at most this often, piggybacked on writes.
const SWEEP_INTERVAL_SECS: i64 = 60;

pub struct InMemoryActorStore {
    states: DashMap<(u64, u64), ActorState>,
    retention: Duration,
    last_sweep: Mutex<DateTime<Utc>>,
}

impl InMemoryActorStore {
    pub fn new() -> Self {
        Self::with_retention(Duration::seconds(RETENTION_SECS))
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            states: DashMap::new(),
            retention,
            last_sweep: Mutex::new(Utc::now()),
        }
    }

    /// Evict actors that have been fully at rest past the retention horizon.
    /// Actors carrying warnings are kept so an escalation in progress never
    /// silently resets. Returns how many entries were dropped.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.states.len();
        let horizon = now - self.retention;
        self.states
            .retain(|_, state| state.warn_count > 0 || state.last_seen > horizon);

        let evicted = before - self.states.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Swept idle actor state");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn maybe_sweep(&self, now: DateTime<Utc>) {
        {
            let mut last = self.last_sweep.lock().expect("sweep clock mutex poisoned");
            if now - *last < Duration::seconds(SWEEP_INTERVAL_SECS) {
                return;
            }
            *last = now;
        }
        self.sweep(now);
    }
}

impl Default for InMemoryActorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActorStateStore for InMemoryActorStore {
    async fn load(&self, guild_id: u64, user_id: u64, now: DateTime<Utc>) -> ActorState {
        self.states
            .get(&(guild_id, user_id))
            .map(|s| s.clone())
            .unwrap_or_else(|| ActorState::new(now))
    }

    async fn save(&self, guild_id: u64, user_id: u64, state: ActorState) {
        let now = state.last_seen;
        self.states.insert((guild_id, user_id), state);
        self.maybe_sweep(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn state_is_created_lazily_and_round_trips() {
        let store = InMemoryActorStore::new();
        let now = Utc::now();

        let mut state = store.load(1, 2, now).await;
        assert_eq!(state.warn_count, 0);
        assert!(state.recent_timestamps.is_empty());

        state.warn_count = 2;
        state.recent_timestamps.push_back(now);
        store.save(1, 2, state).await;

        let reloaded = store.load(1, 2, now).await;
        assert_eq!(reloaded.warn_count, 2);
        assert_eq!(reloaded.recent_timestamps.len(), 1);
    }

    #[tokio::test]
    async fn sweep_evicts_idle_zero_warn_actors_only() {
        let store = InMemoryActorStore::with_retention(Duration::seconds(900));
        let now = Utc::now();
        let idle = now - Duration::seconds(901);

        // Idle actor with no warnings: eligible.
        store.save(1, 2, ActorState::new(idle)).await;
        // Idle actor mid-escalation: kept.
        let mut warned = ActorState::new(idle);
        warned.warn_count = 1;
        store.save(1, 3, warned).await;
        // Recently active actor: kept.
        store.save(1, 4, ActorState::new(now)).await;

        assert_eq!(store.sweep(now), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.load(1, 3, now).await.warn_count, 1);
    }

    #[tokio::test]
    async fn last_write_wins_on_concurrent_saves() {
        let store = InMemoryActorStore::new();
        let now = Utc::now();

        // Two tasks read the same snapshot and write back independently.
        let mut a = store.load(5, 6, now).await;
        let mut b = store.load(5, 6, now).await;
        a.warn_count = 1;
        b.warn_count = 2;
        store.save(5, 6, a).await;
        store.save(5, 6, b).await;

        // The later write stands; the structure stays intact either way.
        assert_eq!(store.load(5, 6, now).await.warn_count, 2);
    }
}
