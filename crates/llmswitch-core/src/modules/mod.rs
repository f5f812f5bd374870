//! Process-level helpers: logging bootstrap and configuration loading.

pub mod config;
pub mod logger;

pub use config::{config_path_from_env, load_config, load_config_or_default, validate_config, CONFIG_ENV_VAR};
pub use logger::init_logging;
