//! Wager intake for open periods.

use crate::errors::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::game::account::AccountLedger;
use crate::game::period;
use crate::game::types::{Selection, Track, Wager};
use crate::metrics::MetricsRegistry;
use crate::store::WagerStore;
use std::sync::Arc;
use tracing::{error, info};

/// Validates and records a user's bet against the currently open period of a
/// track, debiting the stake and crediting turnover progress as one unit.
#[derive(Clone)]
pub struct WagerLedger {
    wagers: Arc<dyn WagerStore>,
    accounts: AccountLedger,
    events: EventBus,
    metrics: Arc<MetricsRegistry>,
    grace_window_secs: u64,
}

impl WagerLedger {
    pub fn new(
        wagers: Arc<dyn WagerStore>,
        accounts: AccountLedger,
        events: EventBus,
        metrics: Arc<MetricsRegistry>,
        grace_window_secs: u64,
    ) -> Self {
        Self {
            wagers,
            accounts,
            events,
            metrics,
            grace_window_secs,
        }
    }

    /// Place a wager on the open period of `track` at instant `now_ms`.
    ///
    /// Rejects with `BettingClosed` inside the closing grace window, with
    /// `InsufficientBalance` when the stake exceeds the freshest balance, and
    /// with `InvalidSelection`/`InvalidAmount` on malformed input, all with
    /// no side effects. On success the stake debit, the turnover credit and
    /// the pending wager land together; a failed wager insert compensates the
    /// balance debit so no half-applied state survives (turnover stays
    /// monotonic).
    pub async fn place_wager(
        &self,
        user_id: &str,
        track: Track,
        selection: Selection,
        amount: f64,
        now_ms: i64,
    ) -> EngineResult<Wager> {
        selection.validate()?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(EngineError::InvalidAmount(amount));
        }

        let secs_remaining = period::secs_remaining(track, now_ms);
        if secs_remaining < self.grace_window_secs {
            return Err(EngineError::BettingClosed { secs_remaining });
        }

        let period_id = period::period_id(track, now_ms);
        self.accounts.debit_with_turnover(user_id, amount).await?;

        let wager = Wager::pending(user_id, track, period_id, selection, amount, now_ms);
        if let Err(insert_err) = self.wagers.insert_wager(&wager).await {
            error!(
                user_id,
                %track,
                period_id,
                error = %insert_err,
                "wager insert failed after debit, compensating balance"
            );
            if let Err(credit_err) = self.accounts.credit_adjustment(user_id, amount).await {
                error!(
                    user_id,
                    amount,
                    error = %credit_err,
                    "compensating credit failed, balance debit is stranded"
                );
            }
            return Err(insert_err);
        }

        info!(
            user_id,
            %track,
            period_id,
            selection = %wager.selection,
            amount,
            "wager placed"
        );
        self.metrics.record_wager(amount);
        self.events.publish(EngineEvent::WagerPlaced {
            wager: wager.clone(),
        });

        Ok(wager)
    }
}
