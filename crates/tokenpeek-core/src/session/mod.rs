//! Ephemeral session state.
//!
//! This module provides:
//! - `SessionStorage`: a narrow key-value interface, with `MemoryStorage` as
//!   the process-scoped implementation
//! - `TokenStore`: get/set/clear of the access token under a fixed key
//! - `SessionToken`: the normalized result of a successful sign-in
//!
//! Nothing in here is written to disk. Storage lives as long as the process.

pub mod storage;
pub mod token;

pub use storage::{MemoryStorage, SessionStorage, StorageError};
pub use token::{
    mask_token, read_stored_token, SessionToken, StoredToken, TokenStore, ACCESS_TOKEN_KEY,
};
