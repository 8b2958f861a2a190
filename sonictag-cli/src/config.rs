//! Loads a [`SonicTagConfig`] from an optional TOML file, falling back to
//! the library default when none is given.
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use sonictag_core::config::SonicTagConfig;

pub fn load(path: Option<&Path>) -> Result<SonicTagConfig> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&text)
                .wrap_err_with(|| format!("failed to parse config file {}", path.display()))?
        }
        None => SonicTagConfig::default(),
    };

    config.validate().wrap_err("configuration failed validation")?;
    Ok(config)
}
