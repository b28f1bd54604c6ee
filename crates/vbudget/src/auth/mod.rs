//! Credential plumbing: Argon2id password hashes and HS256 access tokens.

pub mod password;
pub mod token;

pub use token::{AccessTokenIssuer, AuthError, Claims};
