use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use trove_util::{random::RandomKind, Identifier};

use crate::ConfigError;

/// Where tables come from and which one the binary rolls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LootConfig {
    /// Directory walked for `*.json` loot tables.
    pub tables_dir: PathBuf,
    /// Directory of `<namespace>/<path>.dat` command storage files.
    pub storage_dir: PathBuf,
    pub random: RandomKind,
    /// Fixed seed; a fresh one is drawn when absent.
    pub seed: Option<u64>,
    /// Key of the table to roll.
    pub table: String,
    pub rolls: u32,
    /// Luck placed into the context of every roll.
    pub luck: f64,
}

impl Default for LootConfig {
    fn default() -> Self {
        Self {
            tables_dir: PathBuf::from("loot_tables"),
            storage_dir: PathBuf::from("storage"),
            random: RandomKind::Xoroshiro,
            seed: None,
            table: "minecraft:chests/simple_dungeon".to_string(),
            rolls: 1,
            luck: 0.0,
        }
    }
}

impl LootConfig {
    pub fn table_key(&self) -> Result<Identifier, ConfigError> {
        Identifier::parse(&self.table)
            .map_err(|err| ConfigError::Invalid(format!("loot.table: {err}")))
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.rolls == 0 {
            return Err(ConfigError::Invalid(
                "loot.rolls must be at least 1".to_string(),
            ));
        }
        if !self.luck.is_finite() {
            return Err(ConfigError::Invalid("loot.luck must be finite".to_string()));
        }
        self.table_key().map(|_| ())
    }
}
