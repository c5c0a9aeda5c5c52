//! Settlement of matured wagers against published outcomes.
//!
//! Settlement runs on every trigger (new wager, new outcome, coarse poll),
//! not once per period, so it must be idempotent per wager. The status
//! compare-and-set is the guard: a wager is credited only by the pass that
//! wins the pending -> settled transition. Losing the CAS means another pass
//! already settled the wager and it is skipped without crediting.

use crate::errors::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::game::account::AccountLedger;
use crate::game::types::{Color, Outcome, Selection, Track, Wager, WagerStatus};
use crate::metrics::MetricsRegistry;
use crate::store::{ResultStore, WagerStore};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const DIGIT_MULTIPLIER: f64 = 9.0;
pub const VIOLET_MULTIPLIER: f64 = 4.5;
pub const STANDARD_MULTIPLIER: f64 = 2.0;

/// What caused a settlement pass. All triggers funnel into the same `settle`
/// entry point; correctness never depends on which one fired or how often.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementTrigger {
    NewWager,
    NewOutcome,
    Poll,
    Manual,
}

impl fmt::Display for SettlementTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementTrigger::NewWager => write!(f, "new_wager"),
            SettlementTrigger::NewOutcome => write!(f, "new_outcome"),
            SettlementTrigger::Poll => write!(f, "poll"),
            SettlementTrigger::Manual => write!(f, "manual"),
        }
    }
}

/// Summary of one settlement pass.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SettlementReport {
    pub settled: usize,
    pub wins: usize,
    pub total_payout: f64,
    pub failed: usize,
}

pub struct SettlementEngine {
    wagers: Arc<dyn WagerStore>,
    results: Arc<dyn ResultStore>,
    accounts: AccountLedger,
    events: EventBus,
    metrics: Arc<MetricsRegistry>,
}

impl SettlementEngine {
    pub fn new(
        wagers: Arc<dyn WagerStore>,
        results: Arc<dyn ResultStore>,
        accounts: AccountLedger,
        events: EventBus,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            wagers,
            results,
            accounts,
            events,
            metrics,
        }
    }

    /// Multiplier for a matching wager, `None` on a miss. Match precedence is
    /// fixed: exact digit, then color, then size. A wager carries exactly
    /// one selection kind, so a size selection can never match on number.
    pub fn payout_multiplier(selection: Selection, outcome: &Outcome) -> Option<f64> {
        match selection {
            Selection::Digit(digit) => (digit == outcome.number).then_some(DIGIT_MULTIPLIER),
            Selection::Color(color) => (color == outcome.color).then_some(
                if outcome.color == Color::Violet {
                    VIOLET_MULTIPLIER
                } else {
                    STANDARD_MULTIPLIER
                },
            ),
            Selection::Size(size) => (size == outcome.size).then_some(STANDARD_MULTIPLIER),
        }
    }

    /// Resolve every pending wager of `track` whose period has a published
    /// outcome. Wagers whose outcome has not appeared yet stay pending and
    /// are picked up by a later pass. One wager failing does not abort the
    /// pass; payouts are aggregated per user and applied as a single
    /// additive balance update each.
    pub async fn settle(
        &self,
        track: Track,
        trigger: SettlementTrigger,
    ) -> EngineResult<SettlementReport> {
        let pending = self.wagers.pending_wagers(track).await?;
        if pending.is_empty() {
            return Ok(SettlementReport::default());
        }

        let mut report = SettlementReport::default();
        let mut credits: HashMap<String, f64> = HashMap::new();

        for wager in pending {
            let outcome = match self.results.get_outcome(track, wager.period_id).await {
                Ok(Some(outcome)) => outcome,
                Ok(None) => continue,
                Err(err) => {
                    warn!(wager_id = %wager.id, error = %err, "outcome lookup failed, will retry");
                    report.failed += 1;
                    self.metrics.record_settlement_failure();
                    continue;
                }
            };

            match self.settle_one(&wager, &outcome).await {
                Ok(Some(settled)) => {
                    report.settled += 1;
                    if settled.status == WagerStatus::Won {
                        report.wins += 1;
                        report.total_payout += settled.payout_amount;
                        *credits.entry(settled.user_id.clone()).or_default() +=
                            settled.payout_amount;
                    }
                    self.metrics.record_settlement(
                        settled.status == WagerStatus::Won,
                        settled.payout_amount,
                    );
                    self.events
                        .publish(EngineEvent::WagerSettled { wager: settled });
                }
                Ok(None) => {
                    debug!(wager_id = %wager.id, "already settled by a concurrent pass");
                }
                Err(err) => {
                    warn!(wager_id = %wager.id, error = %err, "settlement failed, will retry");
                    report.failed += 1;
                    self.metrics.record_settlement_failure();
                }
            }
        }

        for (user_id, payout) in credits {
            if let Err(err) = self.accounts.credit_payout(&user_id, payout).await {
                // The wager is already marked won; a stranded credit is a
                // money-level fault and must be loud.
                error!(user_id = %user_id, payout, error = %err, "payout credit failed after settlement");
                report.failed += 1;
                self.metrics.record_settlement_failure();
            }
        }

        if report.settled > 0 || report.failed > 0 {
            info!(
                %track,
                %trigger,
                settled = report.settled,
                wins = report.wins,
                total_payout = report.total_payout,
                failed = report.failed,
                "settlement pass complete"
            );
        }

        Ok(report)
    }

    /// Transition one wager with the status CAS. `None` means another pass
    /// won the transition.
    async fn settle_one(&self, wager: &Wager, outcome: &Outcome) -> EngineResult<Option<Wager>> {
        if wager.payout_amount != 0.0 {
            return Err(EngineError::ConsistencyViolation(format!(
                "pending wager {} already carries payout {}",
                wager.id, wager.payout_amount
            )));
        }

        let (status, payout) = match Self::payout_multiplier(wager.selection, outcome) {
            Some(multiplier) => (WagerStatus::Won, wager.amount * multiplier),
            None => (WagerStatus::Lost, 0.0),
        };

        if !self.wagers.settle_wager(wager.id, status, payout).await? {
            return Ok(None);
        }

        let mut settled = wager.clone();
        settled.status = status;
        settled.payout_amount = payout;
        Ok(Some(settled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::Size;

    fn outcome(number: u8) -> Outcome {
        Outcome::from_number(Track::Sec30, 100, number)
    }

    #[test]
    fn test_digit_match_pays_nine() {
        assert_eq!(
            SettlementEngine::payout_multiplier(Selection::Digit(7), &outcome(7)),
            Some(9.0)
        );
        assert_eq!(
            SettlementEngine::payout_multiplier(Selection::Digit(3), &outcome(7)),
            None
        );
    }

    #[test]
    fn test_violet_color_pays_four_and_a_half() {
        assert_eq!(
            SettlementEngine::payout_multiplier(Selection::Color(Color::Violet), &outcome(0)),
            Some(4.5)
        );
        assert_eq!(
            SettlementEngine::payout_multiplier(Selection::Color(Color::Violet), &outcome(5)),
            Some(4.5)
        );
    }

    #[test]
    fn test_plain_color_and_size_pay_double() {
        assert_eq!(
            SettlementEngine::payout_multiplier(Selection::Color(Color::Green), &outcome(7)),
            Some(2.0)
        );
        assert_eq!(
            SettlementEngine::payout_multiplier(Selection::Color(Color::Red), &outcome(4)),
            Some(2.0)
        );
        assert_eq!(
            SettlementEngine::payout_multiplier(Selection::Size(Size::Big), &outcome(7)),
            Some(2.0)
        );
        assert_eq!(
            SettlementEngine::payout_multiplier(Selection::Size(Size::Small), &outcome(0)),
            Some(2.0)
        );
    }

    #[test]
    fn test_size_selection_never_matches_on_number() {
        // Outcome number 0 with a "small" size selection: matches size, and
        // must pay the size multiplier, never the digit one.
        assert_eq!(
            SettlementEngine::payout_multiplier(Selection::Size(Size::Small), &outcome(0)),
            Some(2.0)
        );
        assert_eq!(
            SettlementEngine::payout_multiplier(Selection::Size(Size::Big), &outcome(0)),
            None
        );
    }

    #[test]
    fn test_miss_pays_nothing() {
        assert_eq!(
            SettlementEngine::payout_multiplier(Selection::Color(Color::Red), &outcome(7)),
            None
        );
        assert_eq!(
            SettlementEngine::payout_multiplier(Selection::Size(Size::Small), &outcome(7)),
            None
        );
    }
}
