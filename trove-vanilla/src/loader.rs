//! Loading loot tables from a directory of JSON files.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use rayon::prelude::*;
use trove_core::{converter::Trove, LootGenerator};
use trove_util::Identifier;

use crate::{generation::LootTable, keys::TableMap, TableError};

pub(crate) fn read_dir(dir: &Path) -> Result<Vec<fs::DirEntry>, TableError> {
    let io_error = |source| TableError::Io {
        path: dir.to_path_buf(),
        source,
    };
    fs::read_dir(dir)
        .map_err(io_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)
}

/// Collects every file with `extension` below `dir`, recursively.
pub(crate) fn collect_files(
    dir: &Path,
    extension: &str,
    output: &mut Vec<PathBuf>,
) -> Result<(), TableError> {
    for entry in read_dir(dir)? {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, extension, output)?;
        } else if path.extension().is_some_and(|ext| ext == extension) {
            output.push(path);
        }
    }
    Ok(())
}

/// Turns `root/a/b.ext` into `namespace:a/b`.
pub(crate) fn relative_key(
    root: &Path,
    file: &Path,
    namespace: &str,
) -> Result<Identifier, TableError> {
    let invalid = || TableError::InvalidPath(file.to_path_buf());
    let relative = file.strip_prefix(root).map_err(|_| invalid())?.with_extension("");
    let segments = relative
        .components()
        .map(|component| component.as_os_str().to_str().ok_or_else(invalid))
        .collect::<Result<Vec<_>, _>>()?;
    Identifier::parse(&format!("{namespace}:{}", segments.join("/"))).map_err(|_| invalid())
}

fn parse_table(path: &Path, trove: &Trove) -> Result<LootTable, TableError> {
    let content = fs::read_to_string(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let node: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| TableError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    trove
        .deserialize::<LootTable>(&node)
        .map_err(|source| TableError::Conversion {
            path: path.to_path_buf(),
            source,
        })
}

/// Every table found below a directory, plus the errors of the files that
/// failed to parse.
#[derive(Default)]
pub struct TableRegistry {
    tables: HashMap<Identifier, Arc<LootTable>>,
    errors: HashMap<Identifier, TableError>,
}

impl TableRegistry {
    /// Parses every `*.json` file below `dir`. A file at `dir/a/b.json` gets
    /// the key `minecraft:a/b`. Files that fail to parse are recorded instead
    /// of failing the whole load.
    pub fn load(dir: &Path, trove: &Trove) -> Result<Self, TableError> {
        let mut files = Vec::new();
        collect_files(dir, "json", &mut files)?;

        let mut keyed = Vec::with_capacity(files.len());
        for file in files {
            match relative_key(dir, &file, "minecraft") {
                Ok(key) => keyed.push((key, file)),
                Err(err) => log::warn!("skipping table file: {err}"),
            }
        }

        let parsed: Vec<_> = keyed
            .into_par_iter()
            .map(|(key, file)| {
                let table = parse_table(&file, trove);
                (key, table)
            })
            .collect();

        let mut registry = Self::default();
        for (key, table) in parsed {
            match table {
                Ok(table) => {
                    registry.tables.insert(key, Arc::new(table));
                }
                Err(err) => {
                    log::warn!("could not load table {key}: {err}");
                    registry.errors.insert(key, err);
                }
            }
        }
        log::info!(
            "loaded {} loot tables from {} ({} failed)",
            registry.tables.len(),
            dir.display(),
            registry.errors.len()
        );
        Ok(registry)
    }

    pub fn get_table(&self, key: &Identifier) -> Option<Arc<LootTable>> {
        self.tables.get(key).cloned()
    }

    pub fn get_table_or_empty(&self, key: &Identifier) -> Arc<LootTable> {
        self.get_table(key)
            .unwrap_or_else(|| Arc::new(LootTable::EMPTY))
    }

    pub fn require_table(&self, key: &Identifier) -> Result<Arc<LootTable>, TableError> {
        if let Some(table) = self.get_table(key) {
            return Ok(table);
        }
        if self.errors.contains_key(key) {
            return Err(TableError::Unparsed(key.clone()));
        }
        Err(TableError::UnknownKey(key.clone()))
    }

    /// The error a table failed to load with, if any.
    pub fn error(&self, key: &Identifier) -> Option<&TableError> {
        self.errors.get(key)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// The tables as generators, ready to be placed in a context.
    pub fn tables(&self) -> TableMap {
        self.tables
            .iter()
            .map(|(key, table)| (key.clone(), table.clone() as Arc<dyn LootGenerator>))
            .collect()
    }
}
