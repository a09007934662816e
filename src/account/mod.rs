//! Accounts, credentials and bearer tokens.

pub mod password;
pub mod token;
pub mod user;

pub use password::{hash_password, verify_password, PasswordError};
pub use token::{AuthError, AuthService, AuthenticatedUser, Claims, JwtAuth};
pub use user::{
    validate_registration, NewUser, PublicProfile, Registration, User, UserId,
    DEFAULT_SPIRITUAL_LEVEL, MIN_PASSWORD_LEN,
};
