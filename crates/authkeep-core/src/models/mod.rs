//! Data models exchanged with the remote auth service.
//!
//! - `User`, `Role`: the profile snapshot held by the session
//! - Request bodies: `Credentials`, `Registration`, `ProfileUpdate`, `PasswordChange`
//! - `LoginResponse`: token plus user returned by the login endpoint

pub mod auth;
pub mod user;

pub use auth::{Credentials, LoginResponse, PasswordChange, ProfileUpdate, Registration};
pub use user::{Role, User};
