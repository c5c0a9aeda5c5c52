//! Engine metrics with Prometheus text export.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Counters and gauges for the round engine, exported at `/metrics`.
pub struct MetricsRegistry {
    pub outcomes_generated_total: AtomicU64,
    pub wagers_placed_total: AtomicU64,
    pub wagers_settled_total: AtomicU64,
    pub wagers_won_total: AtomicU64,
    pub settlement_failures_total: AtomicU64,
    pub websocket_connections_active: AtomicU64,

    amount_wagered_total: Mutex<f64>,
    amount_paid_out_total: Mutex<f64>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            outcomes_generated_total: AtomicU64::new(0),
            wagers_placed_total: AtomicU64::new(0),
            wagers_settled_total: AtomicU64::new(0),
            wagers_won_total: AtomicU64::new(0),
            settlement_failures_total: AtomicU64::new(0),
            websocket_connections_active: AtomicU64::new(0),
            amount_wagered_total: Mutex::new(0.0),
            amount_paid_out_total: Mutex::new(0.0),
        }
    }

    pub fn record_outcome(&self) {
        self.outcomes_generated_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_wager(&self, amount: f64) {
        self.wagers_placed_total.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut total) = self.amount_wagered_total.lock() {
            *total += amount;
        }
    }

    pub fn record_settlement(&self, won: bool, payout: f64) {
        self.wagers_settled_total.fetch_add(1, Ordering::SeqCst);
        if won {
            self.wagers_won_total.fetch_add(1, Ordering::SeqCst);
        }
        if let Ok(mut total) = self.amount_paid_out_total.lock() {
            *total += payout;
        }
    }

    pub fn record_settlement_failure(&self) {
        self.settlement_failures_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn amount_wagered(&self) -> f64 {
        self.amount_wagered_total.lock().map(|t| *t).unwrap_or(0.0)
    }

    pub fn amount_paid_out(&self) -> f64 {
        self.amount_paid_out_total.lock().map(|t| *t).unwrap_or(0.0)
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn to_prometheus_format(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "# HELP wingo_outcomes_generated_total Total outcomes published across all tracks\n\
             # TYPE wingo_outcomes_generated_total counter\n\
             wingo_outcomes_generated_total {}\n\n",
            self.outcomes_generated_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP wingo_wagers_placed_total Total wagers accepted\n\
             # TYPE wingo_wagers_placed_total counter\n\
             wingo_wagers_placed_total {}\n\n",
            self.wagers_placed_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP wingo_wagers_settled_total Total wagers settled\n\
             # TYPE wingo_wagers_settled_total counter\n\
             wingo_wagers_settled_total {}\n\n",
            self.wagers_settled_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP wingo_wagers_won_total Settled wagers that paid out\n\
             # TYPE wingo_wagers_won_total counter\n\
             wingo_wagers_won_total {}\n\n",
            self.wagers_won_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP wingo_settlement_failures_total Per-wager settlement failures awaiting retry\n\
             # TYPE wingo_settlement_failures_total counter\n\
             wingo_settlement_failures_total {}\n\n",
            self.settlement_failures_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP wingo_amount_wagered_total Cumulative stake volume\n\
             # TYPE wingo_amount_wagered_total counter\n\
             wingo_amount_wagered_total {}\n\n",
            self.amount_wagered()
        ));

        output.push_str(&format!(
            "# HELP wingo_amount_paid_out_total Cumulative payout volume\n\
             # TYPE wingo_amount_paid_out_total counter\n\
             wingo_amount_paid_out_total {}\n\n",
            self.amount_paid_out()
        ));

        output.push_str(&format!(
            "# HELP wingo_websocket_connections_active Currently connected subscription clients\n\
             # TYPE wingo_websocket_connections_active gauge\n\
             wingo_websocket_connections_active {}\n",
            self.websocket_connections_active.load(Ordering::SeqCst)
        ));

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
