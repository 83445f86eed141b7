//! Password hashing and JWT session tokens.
//!
//! Tokens carry the username in `sub`, so the chat endpoints can check
//! participation without a user-collection lookup per request.

use crate::error::ApiError;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use password_hash::SaltString;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    /// Username of the authenticated user.
    pub sub: String,
    pub exp: usize,
}

fn jwt_secret() -> Result<String, ApiError> {
    env::var("JWT_SECRET").map_err(|_| ApiError::Internal("JWT_SECRET is not set".into()))
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Issue a 24h session token for `username`.
pub fn generate_jwt(username: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: username.to_string(),
        exp: (Utc::now() + chrono::Duration::days(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret()?.as_ref()),
    )
    .map_err(|e| ApiError::Internal(format!("failed to sign token: {}", e)))
}

/// Validate a token, with or without the `Bearer ` prefix.
pub fn validate_jwt(token: &str) -> Result<Claims, ApiError> {
    let token = token.strip_prefix("Bearer ").unwrap_or(token);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret()?.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("invalid token".into()))
}
