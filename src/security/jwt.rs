use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::core::config::AuthConfig;

const AUDIENCE: &str = "pulse-api";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: String,
    pub username: String,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        username: &str,
        role: &str,
        permissions: Vec<String>,
        issuer: &str,
        expiry: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            iss: issuer.to_string(),
            aud: AUDIENCE.to_string(),
            exp: expiry.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            username: username.to_string(),
            role: role.to_string(),
            permissions,
        }
    }

    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|e| anyhow!("Invalid user ID in claims: {e}"))
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

pub struct JwtManager {
    issuer: String,
    ttl: Duration,
    leeway_seconds: u64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: &AuthConfig) -> Self {
        if config.uses_dev_secret() {
            tracing::warn!(
                "auth.jwt_secret not set, using default development secret - DO NOT USE IN PRODUCTION"
            );
        }
        let secret = config.jwt_secret.as_bytes();
        Self {
            issuer: config.issuer.clone(),
            ttl: Duration::minutes(config.token_ttl_minutes),
            leeway_seconds: 30,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        username: &str,
        role: &str,
        permissions: Vec<String>,
    ) -> Result<IssuedToken> {
        let expires_at = Utc::now() + self.ttl;
        let claims = Claims::new(user_id, username, role, permissions, &self.issuer, expires_at);
        let token = self.encode_claims(&claims)?;
        debug!("Issued access token for {username}");
        Ok(IssuedToken {
            token,
            token_type: "Bearer",
            expires_at: claims.expires_at(),
        })
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to encode access token: {e}"))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[AUDIENCE]);
        validation.leeway = self.leeway_seconds;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| anyhow!("Token validation failed: {e}"))
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new(&AuthConfig {
            jwt_secret: "test-secret-that-is-long-enough-for-hs256".into(),
            issuer: "pulse-test".into(),
            token_ttl_minutes: 60,
        })
    }

    #[test]
    fn test_issue_and_validate() {
        let manager = manager();
        let user_id = Uuid::new_v4();
        let issued = manager
            .issue(user_id, "amal", "Staff", vec!["messaging.use".into()])
            .expect("issue");

        let claims = manager.validate_token(&issued.token).expect("validate");
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.username, "amal");
        assert_eq!(claims.role, "Staff");
        assert_eq!(claims.permissions, vec!["messaging.use"]);
        assert!(!claims.is_expired());
        assert_eq!(issued.token_type, "Bearer");
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = manager();
        let claims = Claims::new(
            Uuid::new_v4(),
            "amal",
            "Staff",
            vec![],
            "pulse-test",
            Utc::now() - Duration::hours(2),
        );
        let token = manager.encode_claims(&claims).unwrap();
        assert!(manager.validate_token(&token).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = manager()
            .issue(Uuid::new_v4(), "amal", "Staff", vec![])
            .unwrap();
        let other = JwtManager::new(&AuthConfig {
            jwt_secret: "another-secret-that-is-also-long-enough".into(),
            issuer: "pulse-test".into(),
            token_ttl_minutes: 60,
        });
        assert!(other.validate_token(&issued.token).is_err());
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let manager = manager();
        let claims = Claims::new(
            Uuid::new_v4(),
            "amal",
            "Staff",
            vec![],
            "someone-else",
            Utc::now() + Duration::hours(1),
        );
        let token = manager.encode_claims(&claims).unwrap();
        assert!(manager.validate_token(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Bearer   "), None);
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }
}
