use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use referral_shared::errors::AppError;
use referral_shared::types::auth::{AccessToken, Claims, TokenKeys};

pub fn create_access_token(account_id: Uuid, keys: &TokenKeys) -> Result<AccessToken, AppError> {
    let claims = Claims::new(account_id, keys.ttl_secs);
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(keys.secret()),
    )
    .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))?;

    Ok(AccessToken::new(token, keys.ttl_secs))
}
