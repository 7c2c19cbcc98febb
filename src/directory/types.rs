use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::error::ApiError;
use crate::core::shared::schema::{roles, users};
use crate::text_enum;

pub const USERNAME_MAX: usize = 32;
pub const EMAIL_MAX: usize = 254;
pub const NAME_MAX: usize = 120;

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = roles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct RoleRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role_id: Uuid,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User as returned by the API, with the role name resolved.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: UserRow,
    pub role_name: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DirectoryEntry {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleView {
    #[serde(flatten)]
    pub role: RoleRow,
    pub user_count: i64,
}

text_enum! {
    /// List filter over `users.is_active`.
    pub enum UserStatus("user status") {
        Active => "active",
        Inactive => "inactive",
    }
}

impl UserStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub user: UserView,
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role_id: Uuid,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    pub user_id: Uuid,
    pub username: String,
    pub temporary_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct PermissionInfo {
    pub name: &'static str,
    pub label: &'static str,
}

/// Lower-cases and checks a username: 3 to 32 of `a-z 0-9 . _ -`.
pub fn normalize_username(raw: &str) -> Result<String, ApiError> {
    let username = raw.trim().to_lowercase();
    let len = username.chars().count();
    if !(3..=USERNAME_MAX).contains(&len) {
        return Err(ApiError::validation(format!(
            "Username must be 3 to {USERNAME_MAX} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ApiError::validation(
            "Username may only contain letters, digits, '.', '_' and '-'",
        ));
    }
    Ok(username)
}

pub fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = email.len() <= EMAIL_MAX
        && !email.contains(char::is_whitespace)
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| {
                !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
            });
    if valid {
        Ok(email)
    } else {
        Err(ApiError::validation(format!("Invalid email address '{}'", raw.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("  Amal.K ").unwrap(), "amal.k");
        assert!(normalize_username("ab").is_err());
        assert!(normalize_username("amal k").is_err());
        assert!(normalize_username(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email(" Amal@Tabdeel.example ").unwrap(),
            "amal@tabdeel.example"
        );
        assert!(normalize_email("amal").is_err());
        assert!(normalize_email("@tabdeel.example").is_err());
        assert!(normalize_email("amal@localhost").is_err());
        assert!(normalize_email("amal @x.io").is_err());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let now = Utc::now();
        let view = UserView {
            user: UserRow {
                id: Uuid::new_v4(),
                username: "amal".into(),
                email: "amal@tabdeel.example".into(),
                full_name: "Amal K".into(),
                password_hash: "$argon2id$secret".into(),
                role_id: Uuid::new_v4(),
                is_active: true,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            },
            role_name: "Staff".into(),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "amal");
        assert_eq!(json["role_name"], "Staff");
    }

    #[test]
    fn test_user_status_filter() {
        assert!("active".parse::<UserStatus>().unwrap().is_active());
        assert!(!"inactive".parse::<UserStatus>().unwrap().is_active());
        assert!("locked".parse::<UserStatus>().is_err());
    }
}
