// Configuration management module
// Handles TOML configuration loading, validation, and the interactive editor

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{ApiConfig, Config, ConfigError, ForumConfig, PathsConfig, ServerConfig};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("course-ta"))
        .ok_or(ConfigError::DirectoryError)
}
