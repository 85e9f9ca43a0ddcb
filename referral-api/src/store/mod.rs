//! Storage access for accounts, referral codes and referrer linkages.
//!
//! Every method is one short transaction. Handlers never talk to diesel
//! directly; they go through the `ReferralStore` held in `AppState`.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use uuid::Uuid;

use referral_shared::errors::AppResult;

use crate::models::{Account, NewAccount, NewReferralCode, Referral, ReferralCode, ReferredAccount};

pub trait ReferralStore: Send + Sync {
    /// Cheap round trip used by the health check.
    fn ping(&self) -> AppResult<()>;

    /// Fails with `EmailAlreadyExists` when the email is taken.
    fn create_account(&self, new: NewAccount) -> AppResult<Account>;

    fn account_by_id(&self, id: Uuid) -> AppResult<Option<Account>>;

    /// Exact, case-sensitive match.
    fn account_by_email(&self, email: &str) -> AppResult<Option<Account>>;

    fn account_count(&self) -> AppResult<i64>;

    /// Deletes the owner's current code (if any) and inserts `new`, atomically.
    /// Returns the inserted code and the one it replaced. Fails with
    /// `ReferralCodeTaken` when another account holds the same code string.
    fn replace_code(&self, new: NewReferralCode) -> AppResult<(ReferralCode, Option<ReferralCode>)>;

    /// Returns the removed code, or `None` when the account had none.
    fn delete_code(&self, account_id: Uuid) -> AppResult<Option<ReferralCode>>;

    fn code_by_value(&self, code: &str) -> AppResult<Option<ReferralCode>>;

    fn code_by_owner(&self, account_id: Uuid) -> AppResult<Option<ReferralCode>>;

    /// Creates the referred account and its linkage to `code.account_id` in one
    /// transaction. The code row must still exist when the transaction runs,
    /// otherwise nothing is written and `InvalidReferralCode` is returned. With
    /// `consume_code` the code row is deleted in the same transaction.
    fn create_referred_account(
        &self,
        new: NewAccount,
        code: &ReferralCode,
        consume_code: bool,
    ) -> AppResult<(Account, Referral)>;

    /// Page of accounts referred by `referrer_id`, oldest linkage first, plus
    /// the total number of linkages.
    fn referrals_of(&self, referrer_id: Uuid, limit: i64, offset: i64) -> AppResult<(Vec<ReferredAccount>, i64)>;
}
