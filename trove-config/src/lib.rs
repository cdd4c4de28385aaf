use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::warn;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

pub mod logging;
pub mod loot;

pub use logging::LoggingConfig;
pub use loot::LootConfig;

const CONFIG_ROOT_FOLDER: &str = "config/";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Couldn't access configuration at {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Couldn't parse config at {path:?}. Reason: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("Couldn't serialize default config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything the `trove` binary reads from `config/configuration.toml`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TroveConfiguration {
    pub logging: LoggingConfig,
    pub loot: LootConfig,
}

impl TroveConfiguration {
    /// Resolves a configured path against the directory the config was loaded for.
    pub fn resolve(exec_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            exec_dir.join(path)
        }
    }
}

pub trait LoadConfiguration {
    fn load(exec_dir: &Path) -> Result<Self, ConfigError>
    where
        Self: Sized + Default + Serialize + DeserializeOwned,
    {
        let config_dir = exec_dir.join(CONFIG_ROOT_FOLDER);
        if !config_dir.exists() {
            log::debug!("creating new config root folder");
            fs::create_dir_all(&config_dir).map_err(|source| ConfigError::Io {
                path: config_dir.clone(),
                source,
            })?;
        }
        let path = config_dir.join(Self::get_path());

        let config = if path.exists() {
            let file_content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;

            toml::from_str(&file_content).map_err(|err| ConfigError::Parse {
                path: path.clone(),
                message: err.message().to_string(),
            })?
        } else {
            let content = Self::default();

            if let Err(err) = fs::write(&path, toml::to_string(&content)?) {
                warn!("Couldn't write default config to {:?}. Reason: {}", &path, err);
            }

            content
        };

        config.validate()?;
        Ok(config)
    }

    fn get_path() -> &'static Path;

    fn validate(&self) -> Result<(), ConfigError>;
}

impl LoadConfiguration for TroveConfiguration {
    fn get_path() -> &'static Path {
        Path::new("configuration.toml")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.loot.validate()
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use trove_util::random::RandomKind;

    use crate::{ConfigError, LoadConfiguration, TroveConfiguration};

    #[test]
    fn writes_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = TroveConfiguration::load(dir.path()).unwrap();

        assert_eq!(config.loot.rolls, 1);
        assert!(dir.path().join("config/configuration.toml").exists());

        // the written default must load back
        let again = TroveConfiguration::load(dir.path()).unwrap();
        assert_eq!(again.loot.table, config.loot.table);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::write(
            dir.path().join("config/configuration.toml"),
            "[loot]\nrandom = \"legacy\"\nseed = 12\n",
        )
        .unwrap();

        let config = TroveConfiguration::load(dir.path()).unwrap();
        assert_eq!(config.loot.random, RandomKind::Legacy);
        assert_eq!(config.loot.seed, Some(12));
        assert_eq!(config.loot.rolls, 1);
        assert!(config.logging.enabled);
    }

    #[test]
    fn rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        let path = dir.path().join("config/configuration.toml");

        fs::write(&path, "[loot]\nrolls = 0\n").unwrap();
        assert!(matches!(
            TroveConfiguration::load(dir.path()),
            Err(ConfigError::Invalid(_))
        ));

        fs::write(&path, "[loot]\ntable = \"Not A Key\"\n").unwrap();
        assert!(matches!(
            TroveConfiguration::load(dir.path()),
            Err(ConfigError::Invalid(_))
        ));

        fs::write(&path, "[loot\n").unwrap();
        assert!(matches!(
            TroveConfiguration::load(dir.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
