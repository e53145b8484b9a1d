mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

pub const DEFAULT_CONFIG_PATH: &str = "askcode.toml";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject values no component can run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunker.max_lines == 0 {
            bail!("chunker.max_lines must be greater than 0");
        }
        if self.retrieval.k == 0 {
            bail!("retrieval.k must be greater than 0");
        }
        if self.retrieval.max_context_chars == 0 {
            bail!("retrieval.max_context_chars must be greater than 0");
        }
        if self.store.initial_capacity == 0 {
            bail!("store.initial_capacity must be greater than 0");
        }
        if self.store.connectivity == 0 {
            bail!("store.connectivity must be greater than 0");
        }
        if self.chunker.overlap >= self.chunker.max_lines {
            tracing::warn!(
                max_lines = self.chunker.max_lines,
                overlap = self.chunker.overlap,
                "overlap is not below max_lines and will be ignored"
            );
        }
        Ok(())
    }

    /// Render as TOML, as `askcode config` prints it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }
}

/// `--config`, then `ASKCODE_CONFIG`, then [`DEFAULT_CONFIG_PATH`].
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("ASKCODE_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}
