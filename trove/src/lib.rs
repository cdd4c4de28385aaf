use std::{path::Path, sync::Arc};

use thiserror::Error;
use trove_config::{ConfigError, LootConfig, TroveConfiguration};
use trove_core::{BuildError, LootContext, LootError, LootGenerator, LootProcessor};
use trove_util::random::{get_seed, RandomGenerator};
use trove_vanilla::{
    keys::{LUCK, ORIGIN, REGISTERED_TABLES, VANILLA_INTERFACE, WORLD},
    model::{ItemStack, Point, World},
    standard_trove,
    vanilla::{FallbackVanillaInterface, VanillaInterface},
    TableError, TableRegistry,
};

#[macro_export]
macro_rules! init_log {
    ($config:expr) => {
        let config: &trove_config::LoggingConfig = $config;
        if config.enabled {
            let mut logger = simplelog::ConfigBuilder::new();
            logger.set_thread_mode(if config.threads {
                simplelog::ThreadLogMode::Both
            } else {
                simplelog::ThreadLogMode::IDs
            });
            logger.set_thread_level(if config.threads {
                log::LevelFilter::Info
            } else {
                log::LevelFilter::Off
            });
            if config.timestamp {
                logger.set_time_format_rfc3339();
                logger.set_time_level(log::LevelFilter::Error);
            } else {
                logger.set_time_level(log::LevelFilter::Off);
            }
            let color = if config.color {
                simplelog::ColorChoice::Auto
            } else {
                simplelog::ColorChoice::Never
            };

            simplelog::TermLogger::init(
                log::LevelFilter::Info,
                logger.build(),
                simplelog::TerminalMode::Mixed,
                color,
            )
            .unwrap_or_else(|err| eprintln!("Failed to initialise logger: {err}"));
        }
    };
}

#[derive(Error, Debug)]
pub enum TroveError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Couldn't build converters: {0}")]
    Build(#[from] BuildError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("Couldn't generate loot: {0}")]
    Loot(#[from] LootError),
}

/// The context every roll shares: origin at zero, clear weather, the
/// configured luck, the fallback interface and all loaded tables.
pub fn roll_context(
    config: &LootConfig,
    seed: u64,
    vanilla: FallbackVanillaInterface,
    registry: &TableRegistry,
) -> LootContext {
    let vanilla: Arc<dyn VanillaInterface> = Arc::new(vanilla);
    LootContext::builder(RandomGenerator::from_kind(config.random, seed))
        .with(ORIGIN, Point::default())
        .with(WORLD, World::default())
        .with(LUCK, config.luck)
        .with(VANILLA_INTERFACE, vanilla)
        .with(REGISTERED_TABLES, registry.tables())
        .build()
}

/// Loads the configured tables and storage below `exec_dir`, then rolls the
/// configured table `rolls` times.
pub fn roll(exec_dir: &Path, config: &TroveConfiguration) -> Result<Vec<ItemStack>, TroveError> {
    let loot = &config.loot;
    let trove = standard_trove()?;

    let tables_dir = TroveConfiguration::resolve(exec_dir, &loot.tables_dir);
    let registry = TableRegistry::load(&tables_dir, &trove)?;
    let storage_dir = TroveConfiguration::resolve(exec_dir, &loot.storage_dir);
    let vanilla = FallbackVanillaInterface::load_storage(&storage_dir)?;

    let key = loot.table_key()?;
    let table = registry.require_table(&key)?;

    let seed = loot.seed.unwrap_or_else(get_seed);
    log::info!("rolling {key} {} times with seed {seed}", loot.rolls);
    let context = roll_context(loot, seed, vanilla, &registry);

    let mut items = Vec::new();
    for _ in 0..loot.rolls {
        let batch = table.generate(&context)?;
        let processor = LootProcessor::builder()
            .process_type::<ItemStack>(|item| log::info!("  {item}"))
            .process(|_| true, |other| log::warn!("  unexpected loot {other:?}"))
            .build();
        processor.accept_batch(&batch)?;
        items.extend(batch.of_type::<ItemStack>().cloned());
    }
    Ok(items)
}

#[cfg(test)]
mod test {
    use std::{fs, path::Path};

    use trove_config::TroveConfiguration;
    use trove_util::Identifier;

    use crate::{roll, TroveError};
    use trove_vanilla::TableError;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn config(table: &str) -> TroveConfiguration {
        let mut config = TroveConfiguration::default();
        config.loot.table = table.to_string();
        config.loot.seed = Some(7);
        config.loot.rolls = 3;
        config
    }

    #[test]
    fn rolls_configured_table() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "loot_tables/chests/test.json",
            r#"{"type": "minecraft:chest", "pools": [{"rolls": 2, "entries": [
                {"type": "minecraft:loot_table", "name": "minecraft:gameplay/bread"}
            ]}]}"#,
        );
        write(
            dir.path(),
            "loot_tables/gameplay/bread.json",
            r#"{"pools": [{"rolls": 1, "entries": [{"type": "minecraft:item", "name": "minecraft:bread"}]}]}"#,
        );

        let items = roll(dir.path(), &config("minecraft:chests/test")).unwrap();
        assert_eq!(items.len(), 6);
        assert!(items
            .iter()
            .all(|item| item.material == Identifier::vanilla("bread") && item.count == 1));
    }

    #[test]
    fn unknown_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("loot_tables")).unwrap();
        assert!(matches!(
            roll(dir.path(), &config("minecraft:missing")),
            Err(TroveError::Table(TableError::UnknownKey(_)))
        ));
    }
}
