mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding `storage.upload_dir`
pub const ENV_UPLOAD_DIR: &str = "IMAGEBED_UPLOAD_DIR";
/// Environment variable overriding `auth.password_hash`
pub const ENV_PASSWORD_HASH: &str = "IMAGEBED_PASSWORD_HASH";
/// Environment variable overriding `auth.session_secret`
pub const ENV_SESSION_SECRET: &str = "IMAGEBED_SESSION_SECRET";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./imagebed.toml",
        "~/.config/imagebed/config.toml",
        "/etc/imagebed/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    let mut config = Config::default();
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Apply `IMAGEBED_*` environment overrides on top of file values
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(dir) = env_value(ENV_UPLOAD_DIR) {
        config.storage.upload_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
    }
    if let Some(hash) = env_value(ENV_PASSWORD_HASH) {
        config.auth.password_hash = Some(hash);
    }
    if let Some(secret) = env_value(ENV_SESSION_SECRET) {
        config.auth.session_secret = Some(secret);
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.storage.max_file_size == 0 {
        anyhow::bail!("storage.max_file_size must be greater than 0");
    }

    if config.storage.extensions().is_empty() {
        anyhow::bail!("storage.allowed_extensions cannot be empty");
    }

    if config.auth.session_timeout_hours == 0 {
        anyhow::bail!("auth.session_timeout_hours must be greater than 0");
    }

    if let Some(url) = &config.server.public_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("server.public_url must start with http:// or https://");
        }
    }

    match &config.auth.password_hash {
        None => tracing::warn!(
            "No admin password configured; set auth.password_hash or {}",
            ENV_PASSWORD_HASH
        ),
        Some(hash) if !hash.starts_with("$2") => {
            tracing::warn!("auth.password_hash does not look like a bcrypt hash")
        }
        Some(_) => {}
    }

    Ok(())
}
