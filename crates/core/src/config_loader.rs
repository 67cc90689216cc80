use crate::config::BacktestConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};
use std::path::Path;

/// Environment variable prefix, e.g. `REPLAY_LOSS_THRESHOLD=4`.
pub const ENV_PREFIX: &str = "REPLAY_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads a backtest configuration by layering defaults, a TOML or JSON file,
    /// and `REPLAY_`-prefixed environment variables, then validates it.
    ///
    /// A missing file is not an error; defaults and env still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the merged
    /// configuration fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<BacktestConfig> {
        let path = path.as_ref();
        let figment = Self::file_provider(Figment::new(), path).merge(Env::prefixed(ENV_PREFIX));
        Self::extract(&figment, path)
    }

    /// Loads a configuration with a profile overlay.
    ///
    /// `config/Backtest.toml` with profile `aggressive` also merges
    /// `config/Backtest.aggressive.toml` on top of the base file.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be parsed or the merged
    /// configuration fails validation.
    pub fn load_with_profile(path: impl AsRef<Path>, profile: &str) -> Result<BacktestConfig> {
        let path = path.as_ref();
        let profile_path = Self::profile_path(path, profile);
        let figment = Self::file_provider(Figment::new(), path);
        let figment = Self::file_provider(figment, &profile_path).merge(Env::prefixed(ENV_PREFIX));
        Self::extract(&figment, path)
    }

    /// Default-only configuration with env overrides, for runs without a file.
    ///
    /// # Errors
    ///
    /// Returns an error if an env override is malformed or invalid.
    pub fn from_env() -> Result<BacktestConfig> {
        let figment = Figment::new().merge(Env::prefixed(ENV_PREFIX));
        let config: BacktestConfig = figment
            .extract()
            .context("Failed to read configuration from environment")?;
        config.validate()?;
        Ok(config)
    }

    fn file_provider(figment: Figment, path: &Path) -> Figment {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            figment.merge(Json::file(path))
        } else {
            figment.merge(Toml::file(path))
        }
    }

    fn profile_path(path: &Path, profile: &str) -> std::path::PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "toml".to_string());
        path.with_file_name(format!("{stem}.{profile}.{ext}"))
    }

    fn extract(figment: &Figment, path: &Path) -> Result<BacktestConfig> {
        let config: BacktestConfig = figment
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), ?config, "Loaded backtest configuration");
        Ok(config)
    }
}
