pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;

pub use config::{load_config, Config};
pub use error::{Error, Result};
