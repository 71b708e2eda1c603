//! # PHAC Shared Library
//!
//! Types, persistence and the protection pipeline shared by the PHAC API
//! server and its tests.
//!
//! ## Module Organization
//!
//! - `auth`: JWT tokens, password hashing and the request auth context
//! - `db`: connection pool and embedded migrations
//! - `models`: database rows and their queries
//! - `credits`: plan policy and the credit ledger
//! - `protection`: script transforms, loader generation, zip packaging and
//!   Lua analysis

pub mod auth;
pub mod credits;
pub mod db;
pub mod models;
pub mod protection;

/// Current version of the PHAC shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
