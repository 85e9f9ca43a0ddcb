use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use referral_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Account, NewAccount, NewReferralCode, Referral, ReferralCode, ReferredAccount};

use super::ReferralStore;

/// Process-local store. One mutex guards all three tables, so every method is
/// atomic with respect to every other.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    accounts: Vec<Account>,
    codes: Vec<ReferralCode>,
    referrals: Vec<Referral>,
}

impl Tables {
    fn email_taken(&self, email: &str) -> bool {
        self.accounts.iter().any(|a| a.email == email)
    }

    fn insert_account(&mut self, new: NewAccount) -> AppResult<Account> {
        if self.email_taken(&new.email) {
            return Err(AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"));
        }
        let account = Account {
            id: Uuid::now_v7(),
            email: new.email,
            password_hash: new.password_hash,
            created_at: Utc::now(),
        };
        self.accounts.push(account.clone());
        Ok(account)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> AppResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::internal("memory store lock poisoned"))
    }
}

impl ReferralStore for MemoryStore {
    fn ping(&self) -> AppResult<()> {
        self.tables().map(|_| ())
    }

    fn create_account(&self, new: NewAccount) -> AppResult<Account> {
        self.tables()?.insert_account(new)
    }

    fn account_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        Ok(self.tables()?.accounts.iter().find(|a| a.id == id).cloned())
    }

    fn account_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        Ok(self.tables()?.accounts.iter().find(|a| a.email == email).cloned())
    }

    fn account_count(&self) -> AppResult<i64> {
        Ok(self.tables()?.accounts.len() as i64)
    }

    fn replace_code(&self, new: NewReferralCode) -> AppResult<(ReferralCode, Option<ReferralCode>)> {
        let mut tables = self.tables()?;

        let taken = tables
            .codes
            .iter()
            .any(|c| c.code == new.code && c.account_id != new.account_id);
        if taken {
            return Err(AppError::new(ErrorCode::ReferralCodeTaken, "referral code already in use"));
        }

        let existing = tables.codes.iter().position(|c| c.account_id == new.account_id);
        let replaced = existing.map(|idx| tables.codes.remove(idx));

        let code = ReferralCode {
            id: Uuid::now_v7(),
            account_id: new.account_id,
            code: new.code,
            expires_at: new.expires_at,
            created_at: Utc::now(),
        };
        tables.codes.push(code.clone());

        Ok((code, replaced))
    }

    fn delete_code(&self, account_id: Uuid) -> AppResult<Option<ReferralCode>> {
        let mut tables = self.tables()?;
        let existing = tables.codes.iter().position(|c| c.account_id == account_id);
        Ok(existing.map(|idx| tables.codes.remove(idx)))
    }

    fn code_by_value(&self, code: &str) -> AppResult<Option<ReferralCode>> {
        Ok(self.tables()?.codes.iter().find(|c| c.code == code).cloned())
    }

    fn code_by_owner(&self, account_id: Uuid) -> AppResult<Option<ReferralCode>> {
        Ok(self.tables()?.codes.iter().find(|c| c.account_id == account_id).cloned())
    }

    fn create_referred_account(
        &self,
        new: NewAccount,
        code: &ReferralCode,
        consume_code: bool,
    ) -> AppResult<(Account, Referral)> {
        let mut tables = self.tables()?;

        let Some(code_idx) = tables.codes.iter().position(|c| c.id == code.id) else {
            return Err(AppError::new(ErrorCode::InvalidReferralCode, "invalid referral code"));
        };

        let account = tables.insert_account(new)?;

        let referral = Referral {
            id: Uuid::now_v7(),
            referrer_id: code.account_id,
            referred_id: account.id,
            created_at: Utc::now(),
        };
        tables.referrals.push(referral.clone());

        if consume_code {
            tables.codes.remove(code_idx);
        }

        Ok((account, referral))
    }

    fn referrals_of(&self, referrer_id: Uuid, limit: i64, offset: i64) -> AppResult<(Vec<ReferredAccount>, i64)> {
        let tables = self.tables()?;

        let linked: Vec<&Referral> = tables
            .referrals
            .iter()
            .filter(|r| r.referrer_id == referrer_id)
            .collect();
        let total = linked.len() as i64;

        let items = linked
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .filter_map(|r| {
                tables
                    .accounts
                    .iter()
                    .find(|a| a.id == r.referred_id)
                    .map(|a| ReferredAccount {
                        id: a.id,
                        email: a.email.clone(),
                        referred_at: r.created_at,
                    })
            })
            .collect();

        Ok((items, total))
    }
}
