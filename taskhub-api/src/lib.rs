//! # TaskHub API Server Library
//!
//! HTTP surface of TaskHub: authentication, projects, members and tasks,
//! built on Axum over the `taskhub-shared` domain crate.
//!
//! ## Modules
//!
//! - `app`: Application state, router and the bearer-token layer
//! - `config`: Configuration from environment variables
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers and rate limiting
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
