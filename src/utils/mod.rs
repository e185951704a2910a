//! Utility modules: error handling and logging setup

pub mod error;
pub mod logging;

pub use error::{AugmentError, Result, ResultExt};
pub use logging::{init_default_logging, init_logging, LogConfig, LogLevel};
