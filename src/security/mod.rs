pub mod auth;
pub mod cors;
pub mod jwt;
pub mod password;
pub mod permissions;

pub use auth::{AuthError, AuthenticatedUser};
pub use jwt::{Claims, IssuedToken, JwtManager};
pub use password::{hash_password, verify_password, PasswordPolicy};
pub use permissions::{Permission, PermissionSet};
