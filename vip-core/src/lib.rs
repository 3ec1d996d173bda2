pub mod analyzer;
pub mod api;
pub mod api_config;
pub mod backup;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod notifier;
pub mod scheduler;
pub mod tasks;

pub use error::{Result, VipError};
