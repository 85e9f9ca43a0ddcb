pub mod health;
pub mod login;
pub mod referral_code;
pub mod referrals;
pub mod register;
