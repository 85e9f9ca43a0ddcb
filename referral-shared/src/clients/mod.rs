pub mod db;
pub mod email_verifier;
