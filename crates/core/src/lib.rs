//! Shared substrate for the arbcom motion engine.
//!
//! Provides the storage abstraction (including the conditional update the
//! governance layer relies on), configuration loading, logging setup and
//! small utilities. No domain logic lives here.

pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod utils;

pub use config::{BotConfig, Configuration, MonitorSettings};
pub use error::{Error, Result};
pub use storage::{JsonStorage, Storage, StorageError, StorageResult};
