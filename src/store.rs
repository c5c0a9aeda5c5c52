//! Document-store abstraction backing the round engine.
//!
//! The engine only requires get/put, conditional insert and compare-and-swap
//! semantics from its stores; these traits are the seam where a durable
//! document database would plug in. `MemoryStore` is the in-process
//! implementation used by the server and the tests.
//!
//! Logical collections: `results` keyed `{track}_{period_id}`, `user_bets`
//! keyed by wager id, `users` keyed by user id, and the single `settings`
//! document.

use crate::errors::{EngineError, EngineResult};
use crate::game::types::{Account, GameSettings, Outcome, Track, Wager, WagerStatus};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Result of a conditional outcome insert. First writer wins; later writers
/// observe `AlreadyExists` and must treat it as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeInsert {
    Inserted,
    AlreadyExists,
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Atomic insert-if-not-exists for the `(track, period_id)` key.
    async fn insert_outcome(&self, outcome: &Outcome) -> EngineResult<OutcomeInsert>;

    async fn get_outcome(&self, track: Track, period_id: u64) -> EngineResult<Option<Outcome>>;

    /// Newest-first history for one track.
    async fn recent_outcomes(&self, track: Track, limit: usize) -> EngineResult<Vec<Outcome>>;
}

#[async_trait]
pub trait WagerStore: Send + Sync {
    async fn insert_wager(&self, wager: &Wager) -> EngineResult<()>;

    async fn get_wager(&self, id: Uuid) -> EngineResult<Option<Wager>>;

    /// All pending wagers for one track, oldest first.
    async fn pending_wagers(&self, track: Track) -> EngineResult<Vec<Wager>>;

    /// Newest-first wager history for one user.
    async fn wagers_for_user(&self, user_id: &str) -> EngineResult<Vec<Wager>>;

    /// Compare-and-set settlement transition: moves the wager to `status`
    /// with `payout` only if it is currently pending. Returns `false` when
    /// another pass already settled it.
    async fn settle_wager(
        &self,
        id: Uuid,
        status: WagerStatus,
        payout: f64,
    ) -> EngineResult<bool>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, user_id: &str) -> EngineResult<Option<Account>>;

    /// Fetch the account, creating a zeroed one on first touch.
    async fn get_or_create(&self, user_id: &str) -> EngineResult<Account>;

    /// Compare-and-swap write: stores `updated` only if the current stored
    /// version equals `expected_version`. Callers bump `updated.version`
    /// themselves and retry with fresh state on `false`.
    async fn put_account_if(
        &self,
        expected_version: u64,
        updated: Account,
    ) -> EngineResult<bool>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_settings(&self) -> EngineResult<GameSettings>;

    async fn put_settings(&self, settings: GameSettings) -> EngineResult<()>;
}

fn result_key(track: Track, period_id: u64) -> String {
    format!("{}_{}", track, period_id)
}

/// In-memory document store over concurrent maps. Read-after-write within a
/// process is immediate, which satisfies the engine's consistency needs.
pub struct MemoryStore {
    results: DashMap<String, Outcome>,
    wagers: DashMap<Uuid, Wager>,
    users: DashMap<String, Account>,
    settings: RwLock<GameSettings>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            results: DashMap::new(),
            wagers: DashMap::new(),
            users: DashMap::new(),
            settings: RwLock::new(GameSettings::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn insert_outcome(&self, outcome: &Outcome) -> EngineResult<OutcomeInsert> {
        use dashmap::mapref::entry::Entry;

        match self.results.entry(result_key(outcome.track, outcome.period_id)) {
            Entry::Occupied(_) => Ok(OutcomeInsert::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(outcome.clone());
                Ok(OutcomeInsert::Inserted)
            }
        }
    }

    async fn get_outcome(&self, track: Track, period_id: u64) -> EngineResult<Option<Outcome>> {
        Ok(self
            .results
            .get(&result_key(track, period_id))
            .map(|entry| entry.value().clone()))
    }

    async fn recent_outcomes(&self, track: Track, limit: usize) -> EngineResult<Vec<Outcome>> {
        let mut outcomes: Vec<Outcome> = self
            .results
            .iter()
            .filter(|entry| entry.value().track == track)
            .map(|entry| entry.value().clone())
            .collect();
        outcomes.sort_by(|a, b| b.period_id.cmp(&a.period_id));
        outcomes.truncate(limit);
        Ok(outcomes)
    }
}

#[async_trait]
impl WagerStore for MemoryStore {
    async fn insert_wager(&self, wager: &Wager) -> EngineResult<()> {
        use dashmap::mapref::entry::Entry;

        match self.wagers.entry(wager.id) {
            Entry::Occupied(_) => Err(EngineError::Storage(format!(
                "duplicate wager id {}",
                wager.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(wager.clone());
                Ok(())
            }
        }
    }

    async fn get_wager(&self, id: Uuid) -> EngineResult<Option<Wager>> {
        Ok(self.wagers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn pending_wagers(&self, track: Track) -> EngineResult<Vec<Wager>> {
        let mut pending: Vec<Wager> = self
            .wagers
            .iter()
            .filter(|entry| {
                entry.value().track == track && entry.value().status == WagerStatus::Pending
            })
            .map(|entry| entry.value().clone())
            .collect();
        pending.sort_by_key(|w| (w.placed_at_ms, w.id));
        Ok(pending)
    }

    async fn wagers_for_user(&self, user_id: &str) -> EngineResult<Vec<Wager>> {
        let mut wagers: Vec<Wager> = self
            .wagers
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        wagers.sort_by_key(|w| std::cmp::Reverse((w.placed_at_ms, w.id)));
        Ok(wagers)
    }

    async fn settle_wager(
        &self,
        id: Uuid,
        status: WagerStatus,
        payout: f64,
    ) -> EngineResult<bool> {
        let Some(mut entry) = self.wagers.get_mut(&id) else {
            return Err(EngineError::NotFound(format!("wager {}", id)));
        };
        if entry.status != WagerStatus::Pending {
            return Ok(false);
        }
        entry.status = status;
        entry.payout_amount = payout;
        Ok(true)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_account(&self, user_id: &str) -> EngineResult<Option<Account>> {
        Ok(self.users.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn get_or_create(&self, user_id: &str) -> EngineResult<Account> {
        Ok(self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| Account::new(user_id))
            .value()
            .clone())
    }

    async fn put_account_if(
        &self,
        expected_version: u64,
        updated: Account,
    ) -> EngineResult<bool> {
        let Some(mut entry) = self.users.get_mut(&updated.user_id) else {
            return Ok(false);
        };
        if entry.version != expected_version {
            return Ok(false);
        }
        *entry = updated;
        Ok(true)
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_settings(&self) -> EngineResult<GameSettings> {
        self.settings
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| EngineError::Storage("settings lock poisoned".to_string()))
    }

    async fn put_settings(&self, settings: GameSettings) -> EngineResult<()> {
        let mut guard = self
            .settings
            .write()
            .map_err(|_| EngineError::Storage("settings lock poisoned".to_string()))?;
        *guard = settings;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::{ResultOverride, Selection};

    #[tokio::test]
    async fn test_outcome_insert_first_writer_wins() {
        let store = MemoryStore::new();
        let first = Outcome::from_number(Track::Sec30, 100, 3);
        let second = Outcome::from_number(Track::Sec30, 100, 7);

        assert_eq!(
            store.insert_outcome(&first).await.unwrap(),
            OutcomeInsert::Inserted
        );
        assert_eq!(
            store.insert_outcome(&second).await.unwrap(),
            OutcomeInsert::AlreadyExists
        );

        let stored = store.get_outcome(Track::Sec30, 100).await.unwrap().unwrap();
        assert_eq!(stored.number, 3);
    }

    #[tokio::test]
    async fn test_outcomes_keyed_per_track() {
        let store = MemoryStore::new();
        store
            .insert_outcome(&Outcome::from_number(Track::Sec30, 500, 1))
            .await
            .unwrap();

        assert!(store.get_outcome(Track::Min1, 500).await.unwrap().is_none());
        assert!(store.get_outcome(Track::Sec30, 500).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_recent_outcomes_newest_first() {
        let store = MemoryStore::new();
        for period in [10u64, 12, 11] {
            store
                .insert_outcome(&Outcome::from_number(Track::Min1, period, 2))
                .await
                .unwrap();
        }

        let recent = store.recent_outcomes(Track::Min1, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].period_id, 12);
        assert_eq!(recent[1].period_id, 11);
    }

    #[tokio::test]
    async fn test_settle_wager_cas() {
        let store = MemoryStore::new();
        let wager = Wager::pending("u1", Track::Sec30, 10, Selection::Digit(3), 50.0, 1000);
        store.insert_wager(&wager).await.unwrap();

        assert!(store
            .settle_wager(wager.id, WagerStatus::Won, 450.0)
            .await
            .unwrap());
        // Second transition loses the CAS.
        assert!(!store
            .settle_wager(wager.id, WagerStatus::Won, 450.0)
            .await
            .unwrap());

        let stored = store.get_wager(wager.id).await.unwrap().unwrap();
        assert_eq!(stored.status, WagerStatus::Won);
        assert_eq!(stored.payout_amount, 450.0);
    }

    #[tokio::test]
    async fn test_settle_missing_wager_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .settle_wager(Uuid::new_v4(), WagerStatus::Lost, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_account_cas_rejects_stale_version() {
        let store = MemoryStore::new();
        let account = store.get_or_create("u1").await.unwrap();
        assert_eq!(account.version, 0);

        let mut updated = account.clone();
        updated.balance = 100.0;
        updated.version = 1;
        assert!(store.put_account_if(0, updated.clone()).await.unwrap());

        // A writer still holding version 0 must lose.
        let mut stale = account;
        stale.balance = 999.0;
        stale.version = 1;
        assert!(!store.put_account_if(0, stale).await.unwrap());

        let stored = store.get_account("u1").await.unwrap().unwrap();
        assert_eq!(stored.balance, 100.0);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(
            store.get_settings().await.unwrap(),
            GameSettings::default()
        );

        let settings = GameSettings {
            next_result: ResultOverride::Red,
            override_track: Some(Track::Min3),
        };
        store.put_settings(settings.clone()).await.unwrap();
        assert_eq!(store.get_settings().await.unwrap(), settings);
    }
}
