//! Bearer-token authentication for API handlers.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::core::shared::error::ApiError;
use crate::core::shared::state::AppState;
use crate::security::jwt::{extract_bearer_token, Claims};
use crate::security::permissions::{Permission, PermissionSet};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication token is required")]
    MissingToken,
    #[error("Invalid authentication token")]
    InvalidToken,
    #[error("Authentication token has expired")]
    ExpiredToken,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Your account has been disabled")]
    AccountDisabled,
    #[error("Missing permission '{0}'")]
    Forbidden(String),
}

/// Caller identity taken from a validated access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: String,
    pub permissions: PermissionSet,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        let user_id = claims.user_id().map_err(|_| AuthError::InvalidToken)?;
        Ok(Self {
            user_id,
            username: claims.username.clone(),
            role: claims.role.clone(),
            permissions: PermissionSet::from_stored(&claims.permissions),
        })
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(permission)
    }

    pub fn require(&self, permission: Permission) -> Result<(), AuthError> {
        if self.has(permission) {
            Ok(())
        } else {
            debug!(
                "User {} denied: missing {}",
                self.username,
                permission.as_str()
            );
            Err(AuthError::Forbidden(permission.as_str().to_string()))
        }
    }

    /// Passes when the caller is `owner` or holds `permission`.
    pub fn require_self_or(&self, owner: Uuid, permission: Permission) -> Result<(), AuthError> {
        if self.user_id == owner {
            return Ok(());
        }
        self.require(permission)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = extract_bearer_token(header_value).ok_or(AuthError::MissingToken)?;

        let claims = state.jwt_manager.validate_token(token).map_err(|e| {
            debug!("Rejected access token: {e}");
            AuthError::InvalidToken
        })?;
        if claims.is_expired() {
            return Err(AuthError::ExpiredToken.into());
        }

        Ok(Self::from_claims(&claims)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(perms: &[Permission]) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            username: "amal".into(),
            role: "Staff".into(),
            permissions: perms.iter().copied().collect(),
        }
    }

    #[test]
    fn test_require_checks_membership() {
        let user = user_with(&[Permission::JobsView]);
        assert!(user.require(Permission::JobsView).is_ok());
        assert_eq!(
            user.require(Permission::JobsManage),
            Err(AuthError::Forbidden("jobs.manage".into()))
        );
    }

    #[test]
    fn test_require_self_or() {
        let user = user_with(&[]);
        assert!(user.require_self_or(user.user_id, Permission::UsersManage).is_ok());
        assert!(user
            .require_self_or(Uuid::new_v4(), Permission::UsersManage)
            .is_err());
    }

    #[test]
    fn test_from_claims_rejects_bad_subject() {
        let mut claims = Claims::new(
            Uuid::new_v4(),
            "amal",
            "Staff",
            vec!["tasks.manage".into()],
            "pulse",
            chrono::Utc::now() + chrono::Duration::hours(1),
        );
        let user = AuthenticatedUser::from_claims(&claims).unwrap();
        assert!(user.has(Permission::TasksManage));

        claims.sub = "not-a-uuid".into();
        assert_eq!(
            AuthenticatedUser::from_claims(&claims).unwrap_err(),
            AuthError::InvalidToken
        );
    }
}
