//! User-facing account views and ledger reconciliation.
//!
//! Registration proper (credentials, tokens) belongs to the auth gateway in
//! front of this service; [`AccountService::register`] only provisions the
//! ledger side of a new account.

use chrono::{SubsecRound, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::model::{LedgerEntry, Profile, User, UserId};
use crate::store::LedgerStore;

/// Result of checking a balance against its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub user_id: UserId,
    pub credits: i64,
    pub initial_credits: i64,
    /// Signed sum of every ledger entry.
    pub ledger_sum: i64,
}

impl Reconciliation {
    /// `true` when every balance change is accounted for.
    pub fn is_balanced(&self) -> bool {
        self.credits - self.initial_credits == self.ledger_sum
    }
}

#[derive(Debug, Clone)]
pub struct AccountService {
    store: LedgerStore,
}

impl AccountService {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Provision a ledger account with a starting balance.
    pub async fn register(&self, initial_credits: i64) -> Result<User, LedgerError> {
        if initial_credits < 0 {
            return Err(LedgerError::InvalidInput(format!(
                "initial credits must not be negative (got {initial_credits})"
            )));
        }
        let user = User {
            id: Uuid::new_v4(),
            credits: initial_credits,
            initial_credits,
            registered_at: Utc::now().trunc_subsecs(6),
            last_grant_at: None,
        };
        self.store.insert_user(&user).await?;
        info!(user_id = %user.id, initial_credits, "user registered");
        Ok(user)
    }

    pub async fn profile(&self, user_id: UserId) -> Result<Option<Profile>, LedgerError> {
        Ok(self.store.user(user_id).await?.map(Profile::from))
    }

    /// Ledger entries for `user_id`, newest first.
    pub async fn ledger(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, LedgerError> {
        if self.store.user(user_id).await?.is_none() {
            return Err(LedgerError::user_not_found(user_id));
        }
        self.store.ledger(user_id).await
    }

    pub async fn reconcile(&self, user_id: UserId) -> Result<Reconciliation, LedgerError> {
        // Balance and sum must come from one snapshot.
        let mut tx = self.store.begin().await?;
        let user = tx
            .user(user_id)
            .await?
            .ok_or_else(|| LedgerError::user_not_found(user_id))?;
        let ledger_sum = tx.ledger_sum(user_id).await?;
        tx.rollback().await?;

        let report = Reconciliation {
            user_id,
            credits: user.credits,
            initial_credits: user.initial_credits,
            ledger_sum,
        };
        if !report.is_balanced() {
            warn!(
                user_id = %user_id,
                credits = report.credits,
                initial_credits = report.initial_credits,
                ledger_sum,
                "ledger does not explain balance"
            );
        }
        Ok(report)
    }
}
