use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{accounts, referral_codes, referrals};

// --- Accounts ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = accounts)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = accounts)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
}

// --- Referral codes ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = referral_codes)]
pub struct ReferralCode {
    pub id: Uuid,
    pub account_id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ReferralCode {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = referral_codes)]
pub struct NewReferralCode {
    pub account_id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

// --- Referrals (referrer -> referred linkage) ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = referrals)]
pub struct Referral {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referred_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = referrals)]
pub struct NewReferral {
    pub referrer_id: Uuid,
    pub referred_id: Uuid,
}

/// One row of a referrer's referral listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferredAccount {
    pub id: Uuid,
    pub email: String,
    pub referred_at: DateTime<Utc>,
}
