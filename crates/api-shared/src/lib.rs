//! # API Shared
//!
//! Shared utilities and definitions for MedHelp APIs.
//!
//! Contains:
//! - Wire models for requests and responses (`models` module)
//! - Shared services like `HealthService`
//! - Bearer token parsing
//!
//! Used by `api-rest`.

pub mod auth;
pub mod health;
pub mod models;

pub use health::HealthService;
pub use models::*;
