//! Outcome generation for closed periods.
//!
//! `generate_if_absent` is safe to call from any number of concurrent tick
//! sources: the conditional insert makes the first writer win and every
//! other attempt a silent no-op. Generation never reads pending wagers, so
//! the outcome is independent of the house's exposure.

use crate::errors::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::game::period;
use crate::game::types::{Outcome, Track};
use crate::metrics::MetricsRegistry;
use crate::store::{OutcomeInsert, ResultStore, SettingsStore};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};

pub struct OutcomeGenerator {
    results: Arc<dyn ResultStore>,
    settings: Arc<dyn SettingsStore>,
    events: EventBus,
    metrics: Arc<MetricsRegistry>,
}

impl OutcomeGenerator {
    pub fn new(
        results: Arc<dyn ResultStore>,
        settings: Arc<dyn SettingsStore>,
        events: EventBus,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            results,
            settings,
            events,
            metrics,
        }
    }

    /// Produce the outcome for a period that has closed, unless one already
    /// exists. Returns `None` when the period is still open (a no-op, not an
    /// error); repeated calls after the first success return the same
    /// outcome.
    pub async fn generate_if_absent(
        &self,
        track: Track,
        period_id: u64,
        now_ms: i64,
    ) -> EngineResult<Option<Outcome>> {
        if period_id >= period::period_id(track, now_ms) {
            debug!(%track, period_id, "period still open, skipping generation");
            return Ok(None);
        }

        if let Some(existing) = self.results.get_outcome(track, period_id).await? {
            return Ok(Some(existing));
        }

        let number = self.draw_number(track).await?;
        let outcome = Outcome::from_number(track, period_id, number);

        match self.results.insert_outcome(&outcome).await? {
            OutcomeInsert::Inserted => {
                info!(
                    %track,
                    period_id,
                    number = outcome.number,
                    color = %outcome.color,
                    size = %outcome.size,
                    "outcome published"
                );
                self.metrics.record_outcome();
                self.events.publish(EngineEvent::OutcomePublished {
                    outcome: outcome.clone(),
                });
                Ok(Some(outcome))
            }
            OutcomeInsert::AlreadyExists => {
                // Lost the race to a concurrent generator; the winner's
                // outcome is authoritative.
                debug!(%track, period_id, "outcome already published by a concurrent writer");
                let winner = self.results.get_outcome(track, period_id).await?.ok_or_else(|| {
                    EngineError::ConsistencyViolation(format!(
                        "outcome for {}_{} reported as existing but not readable",
                        track, period_id
                    ))
                })?;
                Ok(Some(winner))
            }
        }
    }

    /// Draw a digit, restricted by the operator override when the generating
    /// track is the one the override targets.
    async fn draw_number(&self, track: Track) -> EngineResult<u8> {
        let settings = self.settings.get_settings().await?;
        let pool = if settings.override_track == Some(track) {
            settings.next_result.digit_pool()
        } else {
            crate::game::types::ResultOverride::Auto.digit_pool()
        };
        let index = rand::thread_rng().gen_range(0..pool.len());
        Ok(pool[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::{GameSettings, ResultOverride};
    use crate::store::{MemoryStore, SettingsStore};

    fn generator(store: Arc<MemoryStore>) -> OutcomeGenerator {
        OutcomeGenerator::new(
            store.clone(),
            store,
            EventBus::new(16),
            Arc::new(MetricsRegistry::new()),
        )
    }

    // A closed period and an instant safely inside the following period.
    fn closed_period(track: Track) -> (u64, i64) {
        let now_ms = 1_700_000_000_000i64;
        let current = period::period_id(track, now_ms);
        (current - 1, now_ms)
    }

    #[tokio::test]
    async fn test_open_period_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let generator = generator(store.clone());
        let now_ms = 1_700_000_000_000i64;
        let open = period::period_id(Track::Sec30, now_ms);

        let result = generator
            .generate_if_absent(Track::Sec30, open, now_ms)
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store
            .get_outcome(Track::Sec30, open)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_generation_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let generator = generator(store);
        let (period_id, now_ms) = closed_period(Track::Min1);

        let first = generator
            .generate_if_absent(Track::Min1, period_id, now_ms)
            .await
            .unwrap()
            .unwrap();
        let second = generator
            .generate_if_absent(Track::Min1, period_id, now_ms)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_override_biases_targeted_track_only() {
        let store = Arc::new(MemoryStore::new());
        store
            .put_settings(GameSettings {
                next_result: ResultOverride::Small,
                override_track: Some(Track::Sec30),
            })
            .await
            .unwrap();
        let generator = generator(store.clone());

        let now_ms = 1_700_000_000_000i64;
        // Targeted track: every draw restricted to 0-4.
        for offset in 1..20u64 {
            let period_id = period::period_id(Track::Sec30, now_ms) - offset;
            let outcome = generator
                .generate_if_absent(Track::Sec30, period_id, now_ms)
                .await
                .unwrap()
                .unwrap();
            assert!(outcome.number < 5);
        }
    }

    #[tokio::test]
    async fn test_color_override_pools() {
        let store = Arc::new(MemoryStore::new());
        store
            .put_settings(GameSettings {
                next_result: ResultOverride::Red,
                override_track: Some(Track::Min3),
            })
            .await
            .unwrap();
        let generator = generator(store);

        let now_ms = 1_700_000_000_000i64;
        for offset in 1..20u64 {
            let period_id = period::period_id(Track::Min3, now_ms) - offset;
            let outcome = generator
                .generate_if_absent(Track::Min3, period_id, now_ms)
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(outcome.number, 2 | 4 | 6 | 8));
        }
    }

    #[tokio::test]
    async fn test_event_published_once() {
        let store = Arc::new(MemoryStore::new());
        let events = EventBus::new(16);
        let mut rx = events.subscribe();
        let generator = OutcomeGenerator::new(
            store.clone(),
            store,
            events,
            Arc::new(MetricsRegistry::new()),
        );

        let (period_id, now_ms) = closed_period(Track::Min1);
        generator
            .generate_if_absent(Track::Min1, period_id, now_ms)
            .await
            .unwrap();
        generator
            .generate_if_absent(Track::Min1, period_id, now_ms)
            .await
            .unwrap();

        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineEvent::OutcomePublished { .. }
        ));
        // The idempotent second call must not publish again.
        assert!(rx.try_recv().is_err());
    }
}
