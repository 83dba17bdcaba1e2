//! Socket session authentication.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use wms_core::WmsError;

const MANAGER_ROLES: [&str; 4] = ["admin", "warehouse_manager", "supervisor", "manager"];

#[derive(Debug, Clone, Deserialize)]
struct RawClaims {
    sub: Option<String>,
    role: Option<String>,
    roles: Option<Vec<String>>,
    scope: Option<String>,
    #[serde(alias = "operatorId")]
    operator_id: Option<String>,
}

/// Who the authenticated socket belongs to and which room it joins
/// — managers join `manager`, operators join `operator:<operatorId>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Manager { subject: String },
    Operator { operator_id: String },
}

impl Identity {
    pub fn room(&self) -> String {
        match self {
            Identity::Manager { .. } => "manager".to_string(),
            Identity::Operator { operator_id } => format!("operator:{operator_id}"),
        }
    }

    /// Key under which this identity's sockets are tracked in the presence
    /// registry.
    pub fn presence_key(&self) -> String {
        match self {
            Identity::Manager { subject } => format!("manager:{subject}"),
            Identity::Operator { operator_id } => format!("operator:{operator_id}"),
        }
    }

    pub fn is_manager(&self) -> bool {
        matches!(self, Identity::Manager { .. })
    }
}

/// Pick the auth token out of whichever of the three accepted sources was
/// supplied, in priority order: handshake auth payload, `Authorization:
/// Bearer`, query string.
pub fn extract_token(
    handshake_token: Option<&str>,
    auth_header: Option<&str>,
    query_token: Option<&str>,
) -> Option<String> {
    if let Some(t) = handshake_token {
        return Some(t.to_string());
    }
    if let Some(h) = auth_header {
        if let Some(rest) = h.strip_prefix("Bearer ") {
            return Some(rest.to_string());
        }
    }
    query_token.map(|s| s.to_string())
}

/// Verify `token` and classify the caller. Roles are drawn from `role`
/// (single), `roles` (array), and `scope` (space-separated), all
/// lowercased. Managers are identified by any of admin/warehouse_manager/
/// supervisor/manager; anyone else must carry an operator identifier
/// claim or authentication fails.
pub fn authenticate(token: &str, secret: &str) -> Result<Identity, WmsError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<RawClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| WmsError::unauthorized("invalid or expired token"))?;
    let claims = data.claims;

    let mut roles: Vec<String> = Vec::new();
    if let Some(r) = &claims.role {
        roles.push(r.to_lowercase());
    }
    if let Some(rs) = &claims.roles {
        roles.extend(rs.iter().map(|r| r.to_lowercase()));
    }
    if let Some(scope) = &claims.scope {
        roles.extend(scope.split_whitespace().map(|s| s.to_lowercase()));
    }

    if roles.iter().any(|r| MANAGER_ROLES.contains(&r.as_str())) {
        let subject = claims.sub.unwrap_or_else(|| "manager".to_string());
        return Ok(Identity::Manager { subject });
    }

    let operator_id = claims
        .operator_id
        .ok_or_else(|| WmsError::unauthorized("token missing operator identifier claim"))?;
    Ok(Identity::Operator { operator_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn sign(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn manager_role_classified_correctly() {
        let secret = "s3cr3t";
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = sign(json!({"sub": "u1", "role": "Admin", "exp": exp}), secret);
        let identity = authenticate(&token, secret).unwrap();
        assert_eq!(identity, Identity::Manager { subject: "u1".to_string() });
        assert_eq!(identity.room(), "manager");
    }

    #[test]
    fn operator_requires_operator_id_claim() {
        let secret = "s3cr3t";
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = sign(json!({"sub": "u2", "roles": ["picker"], "exp": exp}), secret);
        assert!(authenticate(&token, secret).is_err());
    }

    #[test]
    fn operator_claim_sets_room() {
        let secret = "s3cr3t";
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = sign(
            json!({"sub": "u3", "scope": "picker mobile", "operatorId": "op-1", "exp": exp}),
            secret,
        );
        let identity = authenticate(&token, secret).unwrap();
        assert_eq!(
            identity,
            Identity::Operator { operator_id: "op-1".to_string() }
        );
        assert_eq!(identity.room(), "operator:op-1");
    }

    #[test]
    fn rejects_invalid_signature() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = sign(json!({"sub": "u1", "role": "admin", "exp": exp}), "right");
        assert!(authenticate(&token, "wrong").is_err());
    }

    #[test]
    fn token_source_priority_is_handshake_then_header_then_query() {
        assert_eq!(
            extract_token(Some("h"), Some("Bearer x"), Some("q")),
            Some("h".to_string())
        );
        assert_eq!(
            extract_token(None, Some("Bearer x"), Some("q")),
            Some("x".to_string())
        );
        assert_eq!(extract_token(None, None, Some("q")), Some("q".to_string()));
        assert_eq!(extract_token(None, None, None), None);
    }
}
