use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::distributions::Uniform;
use rand::Rng;
use uuid::Uuid;

use referral_shared::errors::{AppError, AppResult, ErrorCode};
use referral_shared::middleware::{record_referral_event, ReferralEvent};
use referral_shared::types::pagination::{Paginated, PaginationParams};

use crate::config::AppConfig;
use crate::models::{Account, NewReferralCode, Referral, ReferralCode, ReferredAccount};
use crate::services::account_service;
use crate::store::ReferralStore;

pub const CODE_MIN_LEN: usize = 4;
pub const CODE_MAX_LEN: usize = 20;
const GENERATED_CODE_LEN: usize = 8;
const GENERATE_ATTEMPTS: usize = 5;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Rules governing issued codes.
#[derive(Debug, Clone, Copy)]
pub struct CodePolicy {
    /// Lifetime given to codes issued without an explicit expiry.
    pub default_ttl: Duration,
    /// Expired codes stop resolving.
    pub enforce_expiry: bool,
    /// A successful registration deletes the code it used.
    pub single_use: bool,
}

impl Default for CodePolicy {
    fn default() -> Self {
        Self {
            default_ttl: Duration::days(30),
            enforce_expiry: true,
            single_use: false,
        }
    }
}

impl CodePolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_ttl: Duration::days(config.code_ttl_days),
            enforce_expiry: config.enforce_code_expiry,
            single_use: config.single_use_codes,
        }
    }

    fn usable(&self, code: &ReferralCode, now: DateTime<Utc>) -> bool {
        !(self.enforce_expiry && code.is_expired_at(now))
    }
}

pub fn validate_code(code: &str) -> AppResult<()> {
    let len = code.chars().count();
    if !(CODE_MIN_LEN..=CODE_MAX_LEN).contains(&len) {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            format!("referral code must be {CODE_MIN_LEN}-{CODE_MAX_LEN} characters"),
        ));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            "referral code may only contain letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

/// Random code from an alphabet without look-alike characters (no 0/O, 1/I).
pub fn generate_code() -> String {
    let dist = Uniform::from(0..CODE_ALPHABET.len());
    rand::thread_rng()
        .sample_iter(dist)
        .take(GENERATED_CODE_LEN)
        .map(|i| CODE_ALPHABET[i] as char)
        .collect()
}

/// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_expiry(raw: &str) -> AppResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| {
            AppError::new(
                ErrorCode::ValidationError,
                "expiry must be an RFC 3339 timestamp or a YYYY-MM-DD date",
            )
        })
}

/// Issues `code` (or a generated one) for `account_id`, silently replacing any
/// code the account already holds.
pub fn issue_code(
    store: &dyn ReferralStore,
    policy: &CodePolicy,
    account_id: Uuid,
    code: Option<String>,
    expiry: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> AppResult<ReferralCode> {
    if store.account_by_id(account_id)?.is_none() {
        return Err(AppError::new(ErrorCode::AccountNotFound, "account not found"));
    }

    let expires_at = expiry.unwrap_or(now + policy.default_ttl);
    if expires_at <= now {
        return Err(AppError::new(ErrorCode::ValidationError, "expiry must be in the future"));
    }

    let (issued, replaced) = match code {
        Some(code) => {
            validate_code(&code)?;
            store.replace_code(NewReferralCode { account_id, code, expires_at })?
        }
        None => replace_with_generated(store, account_id, expires_at)?,
    };

    match replaced {
        Some(old) => {
            tracing::info!(
                account_id = %account_id,
                code = %issued.code,
                replaced = %old.code,
                expires_at = %issued.expires_at,
                "referral code replaced"
            );
            record_referral_event(ReferralEvent::CodeReplaced);
        }
        None => {
            tracing::info!(
                account_id = %account_id,
                code = %issued.code,
                expires_at = %issued.expires_at,
                "referral code issued"
            );
            record_referral_event(ReferralEvent::CodeIssued);
        }
    }

    Ok(issued)
}

fn replace_with_generated(
    store: &dyn ReferralStore,
    account_id: Uuid,
    expires_at: DateTime<Utc>,
) -> AppResult<(ReferralCode, Option<ReferralCode>)> {
    let mut last_err = None;
    for _ in 0..GENERATE_ATTEMPTS {
        let new = NewReferralCode { account_id, code: generate_code(), expires_at };
        match store.replace_code(new) {
            Err(e) if e.code() == ErrorCode::ReferralCodeTaken => {
                tracing::debug!(account_id = %account_id, "generated referral code collided, retrying");
                last_err = Some(e);
            }
            other => return other,
        }
    }
    Err(last_err.unwrap_or_else(|| AppError::internal("referral code generation failed")))
}

pub fn delete_code(store: &dyn ReferralStore, account_id: Uuid) -> AppResult<()> {
    match store.delete_code(account_id)? {
        Some(code) => {
            tracing::info!(account_id = %account_id, code = %code.code, "referral code deleted");
            record_referral_event(ReferralEvent::CodeDeleted);
            Ok(())
        }
        None => Err(AppError::new(ErrorCode::ReferralCodeNotFound, "account has no referral code")),
    }
}

/// Exact-match lookup. Expired codes do not resolve while expiry is enforced.
pub fn resolve_code(
    store: &dyn ReferralStore,
    policy: &CodePolicy,
    code: &str,
    now: DateTime<Utc>,
) -> AppResult<ReferralCode> {
    store
        .code_by_value(code)?
        .filter(|c| policy.usable(c, now))
        .ok_or_else(|| AppError::new(ErrorCode::ReferralCodeNotFound, "referral code not found"))
}

/// `resolve_code` for the registration path: a code that does not resolve is
/// `InvalidReferralCode`, store failures propagate unchanged.
pub fn resolve_for_registration(
    store: &dyn ReferralStore,
    policy: &CodePolicy,
    code: &str,
    now: DateTime<Utc>,
) -> AppResult<ReferralCode> {
    match resolve_code(store, policy, code, now) {
        Err(e) if e.code() == ErrorCode::ReferralCodeNotFound => {
            Err(AppError::new(ErrorCode::InvalidReferralCode, "invalid referral code"))
        }
        other => other,
    }
}

pub fn code_for_email(
    store: &dyn ReferralStore,
    policy: &CodePolicy,
    email: &str,
    now: DateTime<Utc>,
) -> AppResult<ReferralCode> {
    let not_found = || AppError::new(ErrorCode::ReferralCodeNotFound, "referral code not found");

    let account = store.account_by_email(email)?.ok_or_else(not_found)?;
    store
        .code_by_owner(account.id)?
        .filter(|c| policy.usable(c, now))
        .ok_or_else(not_found)
}

/// Registers a new account attributed to the owner of `code`.
///
/// The code is resolved before anything is written; an unknown or expired code
/// leaves the account table untouched. Account and linkage are then written in
/// one store transaction.
pub fn register_with_code(
    store: &dyn ReferralStore,
    policy: &CodePolicy,
    code: &str,
    email: &str,
    password: &str,
    now: DateTime<Utc>,
) -> AppResult<(Account, Referral)> {
    let referral_code = resolve_for_registration(store, policy, code, now)?;

    account_service::ensure_email_free(store, email)?;
    let new_account = account_service::prepare_account(email, password)?;

    let (account, referral) = store.create_referred_account(new_account, &referral_code, policy.single_use)?;

    tracing::info!(
        account_id = %account.id,
        referrer_id = %referral.referrer_id,
        code = %referral_code.code,
        consumed = policy.single_use,
        "account registered with referral code"
    );
    record_referral_event(ReferralEvent::AccountRegistered);
    record_referral_event(ReferralEvent::ReferralRecorded);

    Ok((account, referral))
}

/// Lists the accounts `referrer_id` has referred. Only the referrer may ask.
pub fn list_referrals(
    store: &dyn ReferralStore,
    referrer_id: Uuid,
    caller_id: Uuid,
    params: &PaginationParams,
) -> AppResult<Paginated<ReferredAccount>> {
    if referrer_id != caller_id {
        return Err(AppError::new(ErrorCode::Forbidden, "you can only list your own referrals"));
    }

    let limit = i64::try_from(params.limit()).unwrap_or(i64::MAX);
    let offset = i64::try_from(params.offset()).unwrap_or(i64::MAX);
    let (items, total) = store.referrals_of(referrer_id, limit, offset)?;

    Ok(Paginated::new(items, total.max(0) as u64, params))
}
