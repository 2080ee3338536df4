//! Backend command modules.
//!
//! This module organizes the commands exposed to the front end by domain:
//! - `env`: Environment variable access
//! - `api_key`: Anthropic API key status and override
//! - `agent`: Running the SQL agent and query chain, activity log subscription
//! - `database`: Database file validation
//! - `settings`: Application settings

pub mod agent;
pub mod api_key;
pub mod database;
pub mod env;
pub mod settings;

// Re-export all commands for easy access from lib.rs
pub use agent::*;
pub use api_key::*;
pub use database::*;
pub use env::*;
pub use settings::*;
