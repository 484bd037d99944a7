use std::path::{Path, PathBuf};

use shopfront_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

pub const CONFIG_DIR_NAME: &str = ".shopfront";
pub const ENV_DATABASE: &str = "SHOPFRONT_DATABASE";
pub const ENV_PORT: &str = "SHOPFRONT_PORT";

/// Finds and parses the configuration file, then applies environment overrides.
pub struct ConfigLoader;

impl ConfigLoader {
    /// `~/.shopfront`, or `./.shopfront` when no home directory is known.
    pub fn default_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
    }

    /// First existing `config.yml`, `config.yaml` or `config.toml` in `dir`.
    pub fn find_in(dir: &Path) -> Option<PathBuf> {
        ["config.yml", "config.yaml", "config.toml"]
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    }

    /// Load `path` if given, otherwise look in the default directory. A missing
    /// file is not an error: defaults are used.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        let config_dir = Self::default_config_dir();
        let resolved = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::find_in(&config_dir),
        };

        let mut config = match resolved {
            Some(p) => {
                let config = Self::from_file(&p)?;
                info!("loaded config from {}", p.display());
                config
            }
            None => {
                debug!("no config file found, using defaults");
                AppConfig::default()
            }
        };

        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

        if config.database.path.is_none() {
            config.database.path = Some(config_dir.join("data").join("shop.db"));
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::parse(&contents, ext)
    }

    pub fn parse(contents: &str, ext: &str) -> Result<AppConfig> {
        match ext {
            "yml" | "yaml" => serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
            "toml" => {
                toml::from_str(contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
            }
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }

    /// Environment wins over the file. `lookup` is injected so tests do not
    /// have to touch the process environment.
    pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DATABASE).filter(|v| !v.is_empty()) {
            config.database.path = Some(PathBuf::from(db));
        }
        if let Some(port) = lookup(ENV_PORT).filter(|v| !v.is_empty()) {
            config.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("{ENV_PORT} is not a valid port: {port}")))?;
        }
        Ok(())
    }

    /// Serialize `config` as YAML into `dir/config.yml`.
    pub fn write_yaml(config: &AppConfig, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("config.yml");
        let yaml = serde_yaml::to_string(config)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(&path, yaml)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogFormat;

    #[test]
    fn parses_partial_yaml_with_defaults() {
        let yaml = "server:\n  port: 9000\nstore:\n  name: Corner Shop\n";
        let config = ConfigLoader::parse(yaml, "yml").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.store.name, "Corner Shop");
        assert_eq!(config.store.currency_symbol, "$");
        assert_eq!(config.session.idle_timeout_minutes, 30);
    }

    #[test]
    fn parses_toml() {
        let toml = "[log]\nlevel = \"debug\"\nformat = \"json\"\n\n[migrations]\ndir = \"db/units\"\n";
        let config = ConfigLoader::parse(toml, "toml").unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.migrations.dir, PathBuf::from("db/units"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = ConfigLoader::parse("{}", "json").unwrap_err();
        assert!(err.to_string().contains("unsupported config extension"));
    }

    #[test]
    fn env_overrides_database_and_port() {
        let mut config = AppConfig::default();
        ConfigLoader::apply_env_overrides(&mut config, |key| match key {
            ENV_DATABASE => Some("/tmp/other.db".to_string()),
            ENV_PORT => Some("3000".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/other.db")));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn invalid_port_override_is_an_error() {
        let mut config = AppConfig::default();
        let result = ConfigLoader::apply_env_overrides(&mut config, |key| {
            (key == ENV_PORT).then(|| "eighty".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn write_then_find_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.store.name = "Round Trip".to_string();

        let path = ConfigLoader::write_yaml(&config, dir.path()).unwrap();
        assert_eq!(ConfigLoader::find_in(dir.path()), Some(path.clone()));

        let loaded = ConfigLoader::from_file(&path).unwrap();
        assert_eq!(loaded.store.name, "Round Trip");
    }
}
