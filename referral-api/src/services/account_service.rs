use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use referral_shared::errors::{AppError, AppResult, ErrorCode};
use referral_shared::middleware::{record_referral_event, ReferralEvent};
use referral_shared::types::auth::{AccessToken, TokenKeys};

use crate::models::{Account, NewAccount};
use crate::services::token_service;
use crate::store::ReferralStore;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::internal(format!("invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < 8 {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must be at least 8 characters"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must contain at least one number"));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must contain at least one letter"));
    }
    Ok(())
}

/// Validates the password and builds the row to insert. Shared by plain and
/// code-based registration so both store the same kind of hash.
pub fn prepare_account(email: &str, password: &str) -> AppResult<NewAccount> {
    validate_password(password)?;
    Ok(NewAccount {
        email: email.to_string(),
        password_hash: hash_password(password)?,
    })
}

pub fn ensure_email_free(store: &dyn ReferralStore, email: &str) -> AppResult<()> {
    if store.account_by_email(email)?.is_some() {
        return Err(AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"));
    }
    Ok(())
}

pub fn register(store: &dyn ReferralStore, email: &str, password: &str) -> AppResult<Account> {
    ensure_email_free(store, email)?;
    let new_account = prepare_account(email, password)?;
    // The store re-checks uniqueness, which covers a concurrent signup.
    let account = store.create_account(new_account)?;

    tracing::info!(account_id = %account.id, email = %account.email, "account registered");
    record_referral_event(ReferralEvent::AccountRegistered);
    Ok(account)
}

pub fn authenticate(
    store: &dyn ReferralStore,
    keys: &TokenKeys,
    email: &str,
    password: &str,
) -> AppResult<AccessToken> {
    let invalid = || AppError::new(ErrorCode::InvalidCredentials, "invalid email or password");

    let Some(account) = store.account_by_email(email)? else {
        record_referral_event(ReferralEvent::LoginFailed);
        return Err(invalid());
    };
    if !verify_password(password, &account.password_hash)? {
        tracing::debug!(account_id = %account.id, "login rejected: wrong password");
        record_referral_event(ReferralEvent::LoginFailed);
        return Err(invalid());
    }

    let token = token_service::create_access_token(account.id, keys)?;
    tracing::info!(account_id = %account.id, "account logged in");
    record_referral_event(ReferralEvent::LoginSucceeded);
    Ok(token)
}
