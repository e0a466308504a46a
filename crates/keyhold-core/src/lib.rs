//! Core library for Keyhold.
//!
//! Keyhold stores client-encrypted secrets per workspace environment,
//! organised in a folder tree. This crate holds everything between the HTTP
//! layer and the key-value storage backend:
//!
//! - [`store`]: typed JSON document collections over a [`StorageBackend`](keyhold_storage::StorageBackend)
//! - [`models`]: the document types
//! - [`secrets`] and [`folder`]: writes that version secrets and folders
//! - [`snapshot`]: point-in-time captures of a folder scope
//! - [`rollback`]: restoring a scope to a snapshot
//! - [`audit`]: action and log records
//!
//! # Security model
//!
//! Secret keys, values and comments arrive encrypted and are stored and
//! returned verbatim. Nothing in this crate can read them.

pub mod audit;
pub mod error;
pub mod folder;
pub mod models;
pub mod query;
pub mod rollback;
pub mod secrets;
pub mod snapshot;
pub mod store;
pub mod versioning;

pub use error::{ServiceError, StoreError};
pub use store::DocumentStore;
