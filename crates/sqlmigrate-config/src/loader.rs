use std::path::Path;

use sqlmigrate_common::{Error, Result};
use tracing::info;

use crate::model::MigrationOptions;

/// On-disk formats accepted for runner options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yml" | "yaml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Read and validate options from a `.yml`, `.yaml` or `.toml` file.
    pub fn from_path(path: &Path) -> Result<MigrationOptions> {
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;
        let options = Self::parse(&contents, format)?;
        info!("loaded migration options from {}", path.display());
        Ok(options)
    }

    pub fn parse(contents: &str, format: ConfigFormat) -> Result<MigrationOptions> {
        let options: MigrationOptions = match format {
            // An empty YAML document parses as null rather than an empty map.
            ConfigFormat::Yaml if contents.trim().is_empty() => MigrationOptions::default(),
            ConfigFormat::Yaml => serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}")))?,
            ConfigFormat::Toml => toml::from_str(contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}")))?,
        };
        options.validate()?;
        Ok(options)
    }
}
