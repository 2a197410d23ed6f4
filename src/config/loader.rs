use super::JobOptions;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Builds [`JobOptions`] from a TOML file and the process environment
pub struct ConfigLoader {
    path: Option<PathBuf>,
    use_env: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            path: None,
            use_env: true,
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Skip `COLOC_*` environment overrides
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    pub async fn load(&self) -> Result<JobOptions, ConfigError> {
        let mut options = match &self.path {
            Some(path) => load_file(path).await?,
            None => JobOptions::default(),
        };

        if self.use_env {
            options.merge_env_vars()?;
        }

        Ok(options)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

async fn load_file(path: &Path) -> Result<JobOptions, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let options = parse_options(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("Loaded job options from {}", path.display());
    Ok(options)
}

pub fn parse_options(content: &str) -> Result<JobOptions, toml::de::Error> {
    toml::from_str(content)
}
