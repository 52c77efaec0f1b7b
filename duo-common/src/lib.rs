//! # Duo Tracker Common Library
//!
//! Shared code for the duo series tracker:
//! - Error type and result alias
//! - Configuration loading and validation
//! - Timestamp helpers for the upstream feed and the database
//! - Database schema initialization

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use config::TrackerConfig;
pub use error::{Error, Result};
