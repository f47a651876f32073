//! # Usuarios Core
//!
//! Core business logic for the user record service.
//!
//! This crate contains pure data operations and file management:
//! - The [`UserStore`], an in-memory collection mirrored to a single JSON file
//! - Field validation of candidate records ([`validation`])
//! - Startup configuration ([`CoreConfig`])
//!
//! **No API concerns**: HTTP servers, routing and response envelopes belong in `api-rest`.
//! Command-line handling belongs in `usuarios-cli`.

pub mod config;
pub mod constants;
pub mod error;
pub mod store;
pub mod user;
pub mod validation;

pub use config::{
    corrupt_data_policy_from_env_value, data_file_from_env_value, CoreConfig, CorruptDataPolicy,
};
pub use error::{StoreError, StoreResult};
pub use store::{StoreStats, UserStore};
pub use user::{Field, NewUser, User, UserCriteria, UserDraft, UserPatch};
pub use usuarios_id::UserId;
pub use validation::{validate, ValidationMode};
