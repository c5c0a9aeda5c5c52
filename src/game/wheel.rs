//! Bonus wheel: a weighted-random reward outside the settlement path.
//!
//! Shares the draw-then-classify shape of outcome generation but applies its
//! reward immediately to the balance. One free spin per 24 hours; after that
//! a spin costs a fixed fee deducted from the same balance update.

use crate::errors::{EngineError, EngineResult};
use crate::game::account::AccountLedger;
use rand::Rng;
use serde::Serialize;
use tracing::info;

pub const SPIN_COST: f64 = 232.0;
pub const FREE_SPIN_COOLDOWN_MS: i64 = 24 * 60 * 60 * 1000;

/// Prize value per wheel segment. Segment 1 is the no-reward slot the wheel
/// lands on most of the time.
pub const SEGMENTS: [f64; 12] = [
    100_000.0, 0.0, 5.0, 10.0, 20.0, 50.0, 100.0, 500.0, 1_000.0, 40_000.0, 50_000.0, 70_000.0,
];

const RARE_SEGMENTS: [usize; 7] = [0, 6, 7, 8, 9, 10, 11];

#[derive(Debug, Clone, Serialize)]
pub struct SpinResult {
    pub segment: usize,
    pub prize: f64,
    pub free: bool,
    pub balance: f64,
}

#[derive(Clone)]
pub struct BonusWheel {
    accounts: AccountLedger,
}

impl BonusWheel {
    pub fn new(accounts: AccountLedger) -> Self {
        Self { accounts }
    }

    /// Spin the wheel for a user at instant `now_ms`. Free when the cooldown
    /// has elapsed since the last free spin, otherwise paid; a paid spin with
    /// insufficient balance is rejected with no side effects.
    pub async fn spin(&self, user_id: &str, now_ms: i64) -> EngineResult<SpinResult> {
        let account = self.accounts.account(user_id).await?;
        let free = account
            .last_spin_ms
            .map_or(true, |last| now_ms - last >= FREE_SPIN_COOLDOWN_MS);

        if !free && account.balance < SPIN_COST {
            return Err(EngineError::InsufficientBalance {
                required: SPIN_COST,
                available: account.balance,
            });
        }

        let segment = pick_segment(&mut rand::thread_rng());
        let prize = SEGMENTS[segment];
        let delta = if free { prize } else { prize - SPIN_COST };

        let updated = self
            .accounts
            .mutate(user_id, |account| {
                if !free && account.balance < SPIN_COST {
                    return Err(EngineError::InsufficientBalance {
                        required: SPIN_COST,
                        available: account.balance,
                    });
                }
                account.balance += delta;
                if free {
                    account.last_spin_ms = Some(now_ms);
                }
                Ok(())
            })
            .await?;

        info!(user_id, segment, prize, free, "wheel spin resolved");

        Ok(SpinResult {
            segment,
            prize,
            free,
            balance: updated.balance,
        })
    }
}

/// Weighted segment pick: 92% no reward, fixed small tiers, and a 0.5% band
/// split uniformly across the rare segments.
fn pick_segment<R: Rng>(rng: &mut R) -> usize {
    let roll: f64 = rng.gen_range(0.0..100.0);
    if roll < 92.0 {
        1
    } else if roll < 95.0 {
        2
    } else if roll < 97.0 {
        3
    } else if roll < 98.5 {
        4
    } else if roll < 99.5 {
        5
    } else {
        RARE_SEGMENTS[rng.gen_range(0..RARE_SEGMENTS.len())]
    }
}
