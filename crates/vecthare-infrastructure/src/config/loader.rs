//! Configuration loader
//!
//! Merges defaults, an optional TOML file, and `VECTHARE_`-prefixed
//! environment variables, in that order.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};

use vecthare_domain::error::{Error, Result};

use super::VecthareSettings;

/// Environment variable prefix
const CONFIG_ENV_PREFIX: &str = "VECTHARE";

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "vecthare.toml";

/// Configuration loader service
#[derive(Clone, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration file path
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration from all sources.
    ///
    /// Later sources override earlier ones:
    /// 1. `VecthareSettings::default()`
    /// 2. the TOML file (explicit path, or `vecthare.toml` in the working
    ///    directory when present)
    /// 3. `VECTHARE_*` environment variables (flat keys only; the nested
    ///    `temporal_decay` table comes from TOML)
    pub fn load(&self) -> Result<VecthareSettings> {
        let mut figment = Figment::new().merge(Serialized::defaults(VecthareSettings::default()));

        let path = self
            .config_path
            .clone()
            .or_else(|| Some(PathBuf::from(CONFIG_FILE_NAME)))
            .filter(|p| p.exists());
        if let Some(path) = &path {
            tracing::info!("Loading configuration from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(&format!("{CONFIG_ENV_PREFIX}_")));

        let settings: VecthareSettings = figment
            .extract()
            .map_err(|e| Error::config(format!("Failed to extract configuration: {e}")))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, settings: &VecthareSettings, path: P) -> Result<()> {
        let content = toml::to_string_pretty(settings)
            .map_err(|e| Error::config(format!("Failed to serialize settings: {e}")))?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::config(format!("Failed to write settings file: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_load_without_a_file() {
        let loader = ConfigLoader::new().with_config_path("/nonexistent/vecthare.toml");
        let settings = loader.load().unwrap();
        assert_eq!(settings.source, "transformers");
        assert_eq!(settings.vector_backend, "standard");
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
source = "openai"
vector_backend = "qdrant"
qdrant_url = "http://qdrant.local:6333"
qdrant_multitenancy = true
top_k = 20
hybrid_search_enabled = true

[temporal_decay]
enabled = true
type = "decay"
mode = "exponential"
halfLife = 25.0
linearRate = 0.05
minRelevance = 0.2
maxBoost = 1.5
"#
        )
        .unwrap();

        let settings = ConfigLoader::new()
            .with_config_path(file.path())
            .load()
            .unwrap();
        assert_eq!(settings.source, "openai");
        assert_eq!(settings.vector_backend, "qdrant");
        assert!(settings.qdrant_multitenancy);
        assert_eq!(settings.top_k, 20);
        assert!(settings.temporal_decay.enabled);
        assert_eq!(settings.temporal_decay.half_life, 25.0);
    }

    #[test]
    fn invalid_file_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "score_threshold = 7.0").unwrap();
        let result = ConfigLoader::new().with_config_path(file.path()).load();
        assert!(result.is_err());
    }
}
