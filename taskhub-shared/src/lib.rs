//! # TaskHub Shared Library
//!
//! This crate contains the domain types, persistence layer, and security
//! primitives used by the TaskHub API server.
//!
//! ## Module Organization
//!
//! - `auth`: Tokens, passwords, token revocation, and project/task access resolution
//! - `db`: Connection pool and migrations
//! - `models`: Database models (users, projects, members, tasks)
//! - `redis`: Redis client wrapper

pub mod auth;
pub mod db;
pub mod models;
pub mod redis;

/// Current version of the TaskHub shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
