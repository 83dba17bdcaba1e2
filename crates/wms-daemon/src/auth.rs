//! JWT issuance and the bearer-token auth middleware. Every route except
//! login and health requires a bearer token.
//!
//! User management and password hashing are explicitly out of scope;
//! [`CredentialStore`] is a narrow trait standing
//! in for a real credential table, with [`StaticCredentialStore`] as the
//! one fixed-scheme implementation this repo ships.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use wms_core::WmsError;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    #[serde(rename = "operatorId", skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<String>,
    pub exp: i64,
}

/// The authenticated principal attached to a request by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub subject: String,
    pub role: String,
    pub operator_id: Option<String>,
}

pub fn issue_token(
    secret: &str,
    lifetime_seconds: i64,
    subject: &str,
    role: &str,
    operator_id: Option<&str>,
) -> Result<String, WmsError> {
    let claims = Claims {
        sub: subject.to_string(),
        role: role.to_string(),
        operator_id: operator_id.map(str::to_string),
        exp: chrono::Utc::now().timestamp() + lifetime_seconds,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| WmsError::internal(format!("failed to issue token: {e}")))
}

fn verify_token(secret: &str, token: &str) -> Result<Claims, WmsError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|_| WmsError::unauthorized("invalid or expired token"))
}

/// Axum middleware: every route except `/api/auth/login` and
/// `/api/health` is wrapped in this.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let secret = state
        .settings
        .auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| WmsError::internal("JWT secret is not configured"))?;

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| WmsError::unauthorized("missing Authorization header"))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| WmsError::unauthorized("Authorization header must be a Bearer token"))?;

    let claims = verify_token(secret, token)?;
    request.extensions_mut().insert(AuthUser {
        subject: claims.sub,
        role: claims.role,
        operator_id: claims.operator_id,
    });

    Ok(next.run(request).await)
}

/// A credential verifier for `/api/auth/login`. Out-of-scope user
/// management means this is intentionally narrow: one implementation,
/// no password reset, no account table migrations.
pub trait CredentialStore: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> Option<AuthenticatedPrincipal>;
}

#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal {
    pub subject: String,
    pub role: String,
    pub operator_id: Option<String>,
}

struct FixedAccount {
    username: &'static str,
    password_hash: String,
    role: &'static str,
    operator_id: Option<&'static str>,
}

/// A fixed, in-memory credential table seeded at startup from bcrypt
/// hashes of two demo accounts — there is no real user management here,
/// just a stub standing in for a production account store.
pub struct StaticCredentialStore {
    accounts: Vec<FixedAccount>,
}

impl StaticCredentialStore {
    pub fn new(bcrypt_cost: u32) -> Self {
        let accounts = vec![
            FixedAccount {
                username: "manager",
                password_hash: bcrypt::hash("manager", bcrypt_cost)
                    .expect("bcrypt hashing the fixed demo password must not fail"),
                role: "warehouse_manager",
                operator_id: None,
            },
            FixedAccount {
                username: "operator",
                password_hash: bcrypt::hash("operator", bcrypt_cost)
                    .expect("bcrypt hashing the fixed demo password must not fail"),
                role: "operator",
                operator_id: Some("00000000-0000-0000-0000-000000000001"),
            },
        ];
        Self { accounts }
    }
}

impl CredentialStore for StaticCredentialStore {
    fn verify(&self, username: &str, password: &str) -> Option<AuthenticatedPrincipal> {
        let account = self.accounts.iter().find(|a| a.username == username)?;
        if !bcrypt::verify(password, &account.password_hash).unwrap_or(false) {
            return None;
        }
        Some(AuthenticatedPrincipal {
            subject: account.username.to_string(),
            role: account.role.to_string(),
            operator_id: account.operator_id.map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_store_accepts_matching_password() {
        let store = StaticCredentialStore::new(4);
        let principal = store.verify("manager", "manager").unwrap();
        assert_eq!(principal.role, "warehouse_manager");
    }

    #[test]
    fn static_store_rejects_wrong_password() {
        let store = StaticCredentialStore::new(4);
        assert!(store.verify("manager", "wrong").is_none());
    }

    #[test]
    fn issued_token_round_trips_through_verify() {
        let secret = "test-secret";
        let token = issue_token(secret, 3600, "manager", "warehouse_manager", None).unwrap();
        let claims = verify_token(secret, &token).unwrap();
        assert_eq!(claims.sub, "manager");
        assert_eq!(claims.role, "warehouse_manager");
    }
}
