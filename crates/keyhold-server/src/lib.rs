//! Keyhold HTTP server.
//!
//! Wires the core library and a storage backend into an Axum server exposing
//! the workspace API under `/api/v1`.

pub mod auth;
pub mod config;
pub mod error;
pub mod reporting;
pub mod routes;
pub mod state;
