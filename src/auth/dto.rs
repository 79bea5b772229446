use jsonwebtoken::{DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

/// Request body for login. Users are identified by login id alone.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login_id: String,
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: PublicUser,
}

/// Public view of the current user with role flags.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub user_id: i64,
    pub user_name: String,
    pub login_id: Option<String>,
    pub is_admin: bool,
    pub is_instructor: bool,
}
