//! Request and response bodies for the HTTP surface.

use crate::game::types::{Account, GameSettings, Selection, Track};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceBetRequest {
    pub user_id: String,
    pub track: Track,
    pub selection: Selection,
    pub amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreditRequest {
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub user_id: String,
    pub balance: f64,
    pub required_turnover: f64,
    pub completed_turnover: f64,
    pub turnover_remaining: f64,
    pub can_withdraw: bool,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            turnover_remaining: account.turnover_remaining(),
            can_withdraw: account.can_withdraw(),
            user_id: account.user_id,
            balance: account.balance,
            required_turnover: account.required_turnover,
            completed_turnover: account.completed_turnover,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawableResponse {
    pub user_id: String,
    pub can_withdraw: bool,
    pub turnover_remaining: f64,
}

/// The operator override document, echoed on read and write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideView {
    #[serde(flatten)]
    pub settings: GameSettings,
}
