pub mod account_service;
pub mod referral_service;
pub mod token_service;
