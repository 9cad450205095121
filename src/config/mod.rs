pub mod generate;
pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};

pub use parse::{load_config, load_config_with_overrides, resolve_api_key, ConfigError};
pub use types::{Config, Overrides, ServiceConfig};

/// Expands `$env{VAR_NAME}` references in a string.
/// Unset variables are left unchanged so the parser can report them.
pub fn expand_env_vars(text: &str) -> String {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();

    re.replace_all(text, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .to_string()
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if path_str.starts_with("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(&path_str[2..]);
        }
    } else if path_str == "~" {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir;
        }
    }

    path.to_path_buf()
}

/// Resolves the config file path: the explicit path if given, otherwise the
/// first of `~/.config/lexifill/config.yml` and `/etc/lexifill/config.yml` that exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    // Check ~/.config/lexifill/config.yml
    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/lexifill/config.yml");
        if user_config.exists() {
            return Some(user_config);
        }
    }

    // Check /etc/lexifill/config.yml
    let system_config = PathBuf::from("/etc/lexifill/config.yml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}
