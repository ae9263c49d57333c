// Configuration loading

pub mod settings;

pub use settings::{ConfigError, Settings};

/// Directory name used under the platform config and data dirs.
pub const APP_DIR: &str = "creditmemo";
