//! Layered configuration: `harvest.toml` (optional) overridden by
//! `HARVEST_`-prefixed environment variables, e.g.
//! `HARVEST_PROVIDER__API_KEY`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use harvest_core::config::{ExportConfig, MarketConfig, PositioningConfig};
use harvest_quandl::QuandlConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub provider:    QuandlConfig,
  pub market:      MarketConfig,
  pub positioning: PositioningConfig,
  pub export:      ExportConfig,
}

impl Settings {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let raw = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(
        config::Environment::with_prefix("HARVEST")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .with_context(|| format!("failed to read config file {}", path.display()))?;

    let mut settings: Settings = raw
      .try_deserialize()
      .context("failed to deserialise settings")?;

    settings.market.database = expand_tilde(&settings.market.database);
    settings.market.reference = expand_tilde(&settings.market.reference);
    settings.positioning.database = expand_tilde(&settings.positioning.database);
    settings.positioning.reference = expand_tilde(&settings.positioning.reference);
    settings.export.database = expand_tilde(&settings.export.database);
    settings.export.output = expand_tilde(&settings.export.output);
    Ok(settings)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
