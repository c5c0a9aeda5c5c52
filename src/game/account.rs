//! Balance and turnover ledger.
//!
//! Two independent writers touch an account concurrently: the wager ledger
//! (debit + turnover) and the settlement engine (payout credit). Every
//! mutation here is a read-modify-write against the freshest stored state,
//! retried on version conflict, never a blind overwrite.

use crate::errors::{EngineError, EngineResult};
use crate::game::types::Account;
use crate::store::AccountStore;
use std::sync::Arc;
use tracing::warn;

const MAX_CAS_RETRIES: usize = 8;

#[derive(Clone)]
pub struct AccountLedger {
    accounts: Arc<dyn AccountStore>,
}

impl AccountLedger {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    pub async fn account(&self, user_id: &str) -> EngineResult<Account> {
        self.accounts.get_or_create(user_id).await
    }

    /// Apply `apply` to the freshest stored account and write the result with
    /// a compare-and-swap, retrying on conflict. Conflicts are recovered here
    /// and never surfaced to the end user.
    pub(crate) async fn mutate<F>(&self, user_id: &str, apply: F) -> EngineResult<Account>
    where
        F: Fn(&mut Account) -> EngineResult<()>,
    {
        for _ in 0..MAX_CAS_RETRIES {
            let current = self.accounts.get_or_create(user_id).await?;
            let mut updated = current.clone();
            apply(&mut updated)?;
            updated.version = current.version + 1;

            if self
                .accounts
                .put_account_if(current.version, updated.clone())
                .await?
            {
                return Ok(updated);
            }
        }

        warn!(user_id, "account update exhausted CAS retries");
        Err(EngineError::Conflict(user_id.to_string()))
    }

    /// Debit the balance, failing with `InsufficientBalance` against the
    /// freshest stored state.
    pub async fn debit(&self, user_id: &str, amount: f64) -> EngineResult<Account> {
        validate_amount(amount)?;
        self.mutate(user_id, |account| {
            if amount > account.balance {
                return Err(EngineError::InsufficientBalance {
                    required: amount,
                    available: account.balance,
                });
            }
            account.balance -= amount;
            Ok(())
        })
        .await
    }

    /// Wager debit: one atomic account update covering both the stake debit
    /// and the turnover progress (wagering counts toward completion).
    pub async fn debit_with_turnover(&self, user_id: &str, amount: f64) -> EngineResult<Account> {
        validate_amount(amount)?;
        self.mutate(user_id, |account| {
            if amount > account.balance {
                return Err(EngineError::InsufficientBalance {
                    required: amount,
                    available: account.balance,
                });
            }
            account.balance -= amount;
            account.completed_turnover += amount;
            Ok(())
        })
        .await
    }

    /// Deposit/bonus credit: raises the balance and the required turnover by
    /// the same amount, so the credited money must be wagered before it can
    /// be withdrawn.
    pub async fn credit_turnover_linked(
        &self,
        user_id: &str,
        amount: f64,
    ) -> EngineResult<Account> {
        validate_amount(amount)?;
        self.mutate(user_id, |account| {
            account.balance += amount;
            account.required_turnover += amount;
            Ok(())
        })
        .await
    }

    /// Settlement payout: balance only, no turnover linkage.
    pub async fn credit_payout(&self, user_id: &str, amount: f64) -> EngineResult<Account> {
        validate_amount(amount)?;
        self.mutate(user_id, |account| {
            account.balance += amount;
            Ok(())
        })
        .await
    }

    /// Operator adjustment: plain balance credit with no turnover linkage.
    pub async fn credit_adjustment(&self, user_id: &str, amount: f64) -> EngineResult<Account> {
        validate_amount(amount)?;
        self.mutate(user_id, |account| {
            account.balance += amount;
            Ok(())
        })
        .await
    }

    pub async fn can_withdraw(&self, user_id: &str) -> EngineResult<bool> {
        Ok(self.account(user_id).await?.can_withdraw())
    }

    /// The turnover gate the withdrawal workflow calls before accepting a
    /// payout request.
    pub async fn ensure_withdrawable(&self, user_id: &str) -> EngineResult<Account> {
        let account = self.account(user_id).await?;
        if !account.can_withdraw() {
            return Err(EngineError::TurnoverIncomplete {
                remaining: account.turnover_remaining(),
            });
        }
        Ok(account)
    }
}

fn validate_amount(amount: f64) -> EngineResult<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(EngineError::InvalidAmount(amount));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ledger() -> AccountLedger {
        AccountLedger::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_debit_rejects_insufficient_balance() {
        let ledger = ledger();
        ledger.credit_turnover_linked("u1", 50.0).await.unwrap();

        let err = ledger.debit("u1", 100.0).await.unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance { .. }));

        // No partial state was applied.
        let account = ledger.account("u1").await.unwrap();
        assert_eq!(account.balance, 50.0);
    }

    #[tokio::test]
    async fn test_turnover_linked_credit() {
        let ledger = ledger();
        let account = ledger.credit_turnover_linked("u1", 500.0).await.unwrap();
        assert_eq!(account.balance, 500.0);
        assert_eq!(account.required_turnover, 500.0);
        assert_eq!(account.completed_turnover, 0.0);
        assert!(!account.can_withdraw());
    }

    #[tokio::test]
    async fn test_turnover_law() {
        let ledger = ledger();
        ledger.credit_turnover_linked("u1", 500.0).await.unwrap();
        assert!(!ledger.can_withdraw("u1").await.unwrap());

        ledger.debit_with_turnover("u1", 200.0).await.unwrap();
        assert!(!ledger.can_withdraw("u1").await.unwrap());

        let account = ledger.debit_with_turnover("u1", 300.0).await.unwrap();
        assert_eq!(account.completed_turnover, 500.0);
        assert!(ledger.can_withdraw("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_withdrawable_reports_remaining() {
        let ledger = ledger();
        ledger.credit_turnover_linked("u1", 300.0).await.unwrap();
        ledger.debit_with_turnover("u1", 100.0).await.unwrap();

        let err = ledger.ensure_withdrawable("u1").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::TurnoverIncomplete { remaining } if remaining == 200.0
        ));

        ledger.debit_with_turnover("u1", 200.0).await.unwrap();
        assert!(ledger.ensure_withdrawable("u1").await.is_ok());
    }

    #[tokio::test]
    async fn test_payout_credit_leaves_turnover_untouched() {
        let ledger = ledger();
        ledger.credit_turnover_linked("u1", 100.0).await.unwrap();
        let account = ledger.credit_payout("u1", 450.0).await.unwrap();
        assert_eq!(account.balance, 550.0);
        assert_eq!(account.required_turnover, 100.0);
    }

    #[tokio::test]
    async fn test_invalid_amounts_rejected() {
        let ledger = ledger();
        for amount in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let err = ledger.credit_payout("u1", amount).await.unwrap_err();
            assert!(matches!(err, EngineError::InvalidAmount(_)));
        }
    }

    #[tokio::test]
    async fn test_concurrent_mutations_all_land() {
        let ledger = ledger();
        ledger.credit_turnover_linked("u1", 1000.0).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.debit_with_turnover("u1", 10.0).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let account = ledger.account("u1").await.unwrap();
        assert_eq!(account.balance, 900.0);
        assert_eq!(account.completed_turnover, 100.0);
    }
}
