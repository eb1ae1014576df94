//! Core module: configuration, errors and shared types

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, EngineConfig, ProviderConfig, ServerConfig};
pub use error::{EngineError, Result};
