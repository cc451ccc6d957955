//! Request pipeline for the remote auth service.
//!
//! This module provides the `ApiClient`, which attaches the persisted bearer
//! token to outgoing requests and reacts to authorization failures on the
//! way back, and the `ApiError` taxonomy of failed calls.

pub mod client;
pub mod error;

pub use client::{ApiClient, RedirectPolicy, UnauthorizedOutcome};
pub use error::ApiError;
