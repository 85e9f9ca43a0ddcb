use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use referral_shared::clients::db::DbPool;
use referral_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{
    Account, NewAccount, NewReferral, NewReferralCode, Referral, ReferralCode, ReferredAccount,
};
use crate::schema::{accounts, referral_codes, referrals};

use super::ReferralStore;

type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> AppResult<PgPooled> {
        self.pool.get().map_err(|e| AppError::internal(e.to_string()))
    }
}

/// Translates unique-constraint violations into the domain error they stand for.
fn map_unique_violation(err: DieselError) -> AppError {
    if let DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) = &err {
        match info.constraint_name() {
            Some("accounts_email_key") => {
                return AppError::new(ErrorCode::EmailAlreadyExists, "email already registered");
            }
            Some("referral_codes_code_key") => {
                return AppError::new(ErrorCode::ReferralCodeTaken, "referral code already in use");
            }
            Some("referral_codes_account_id_key") => {
                return AppError::new(
                    ErrorCode::ReferralCodeTaken,
                    "referral code was replaced by a concurrent request",
                );
            }
            _ => {}
        }
    }
    AppError::Database(err)
}

impl ReferralStore for PgStore {
    fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }

    fn create_account(&self, new: NewAccount) -> AppResult<Account> {
        let mut conn = self.conn()?;
        diesel::insert_into(accounts::table)
            .values(&new)
            .returning(Account::as_returning())
            .get_result(&mut conn)
            .map_err(map_unique_violation)
    }

    fn account_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        let mut conn = self.conn()?;
        Ok(accounts::table
            .find(id)
            .select(Account::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn account_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let mut conn = self.conn()?;
        Ok(accounts::table
            .filter(accounts::email.eq(email))
            .select(Account::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn account_count(&self) -> AppResult<i64> {
        let mut conn = self.conn()?;
        Ok(accounts::table.count().get_result(&mut conn)?)
    }

    fn replace_code(&self, new: NewReferralCode) -> AppResult<(ReferralCode, Option<ReferralCode>)> {
        let mut conn = self.conn()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let replaced = diesel::delete(
                referral_codes::table.filter(referral_codes::account_id.eq(new.account_id)),
            )
            .returning(ReferralCode::as_returning())
            .get_result(conn)
            .optional()?;

            let code = diesel::insert_into(referral_codes::table)
                .values(&new)
                .returning(ReferralCode::as_returning())
                .get_result(conn)
                .map_err(map_unique_violation)?;

            Ok((code, replaced))
        })
    }

    fn delete_code(&self, account_id: Uuid) -> AppResult<Option<ReferralCode>> {
        let mut conn = self.conn()?;
        Ok(diesel::delete(referral_codes::table.filter(referral_codes::account_id.eq(account_id)))
            .returning(ReferralCode::as_returning())
            .get_result(&mut conn)
            .optional()?)
    }

    fn code_by_value(&self, code: &str) -> AppResult<Option<ReferralCode>> {
        let mut conn = self.conn()?;
        Ok(referral_codes::table
            .filter(referral_codes::code.eq(code))
            .select(ReferralCode::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn code_by_owner(&self, account_id: Uuid) -> AppResult<Option<ReferralCode>> {
        let mut conn = self.conn()?;
        Ok(referral_codes::table
            .filter(referral_codes::account_id.eq(account_id))
            .select(ReferralCode::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn create_referred_account(
        &self,
        new: NewAccount,
        code: &ReferralCode,
        consume_code: bool,
    ) -> AppResult<(Account, Referral)> {
        let mut conn = self.conn()?;
        conn.transaction::<_, AppError, _>(|conn| {
            // Lock the code row so a concurrent replace/delete cannot slip in
            // between resolution and the linkage insert.
            let still_valid = if consume_code {
                diesel::delete(referral_codes::table.find(code.id)).execute(conn)? == 1
            } else {
                referral_codes::table
                    .find(code.id)
                    .select(referral_codes::id)
                    .for_share()
                    .first::<Uuid>(conn)
                    .optional()?
                    .is_some()
            };

            if !still_valid {
                return Err(AppError::new(ErrorCode::InvalidReferralCode, "invalid referral code"));
            }

            let account = diesel::insert_into(accounts::table)
                .values(&new)
                .returning(Account::as_returning())
                .get_result(conn)
                .map_err(map_unique_violation)?;

            let referral = diesel::insert_into(referrals::table)
                .values(&NewReferral {
                    referrer_id: code.account_id,
                    referred_id: account.id,
                })
                .returning(Referral::as_returning())
                .get_result(conn)?;

            Ok((account, referral))
        })
    }

    fn referrals_of(&self, referrer_id: Uuid, limit: i64, offset: i64) -> AppResult<(Vec<ReferredAccount>, i64)> {
        let mut conn = self.conn()?;

        let total: i64 = referrals::table
            .filter(referrals::referrer_id.eq(referrer_id))
            .count()
            .get_result(&mut conn)?;

        let rows: Vec<(Uuid, String, DateTime<Utc>)> = referrals::table
            .inner_join(accounts::table.on(accounts::id.eq(referrals::referred_id)))
            .filter(referrals::referrer_id.eq(referrer_id))
            .order((referrals::created_at.asc(), referrals::id.asc()))
            .limit(limit)
            .offset(offset)
            .select((accounts::id, accounts::email, referrals::created_at))
            .load(&mut conn)?;

        let items = rows
            .into_iter()
            .map(|(id, email, referred_at)| ReferredAccount { id, email, referred_at })
            .collect();

        Ok((items, total))
    }
}
