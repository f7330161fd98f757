//! Authentication for Mandalart
//!
//! Provides:
//! - Session cookie and API key resolution for incoming requests
//! - Opaque token generation and hashing
//! - Password hashing with Argon2

pub mod identity;
pub mod password;
pub mod token;

pub use identity::{
    authenticate, clear_session_cookie, session_cookie, AuthMethod, Identity, SESSION_COOKIE,
};
pub use password::{hash_password, verify_password};
pub use token::{generate_api_key, generate_token, hash_token, API_KEY_PREFIX};
