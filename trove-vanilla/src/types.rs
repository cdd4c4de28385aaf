use std::sync::Arc;

use trove_core::{
    converter::{Field, FieldTypes},
    structure::{LootCondition, LootEntry, LootModifier, LootNumber},
};
use trove_nbt::{compound::NbtCompound, from_snbt_compound};
use trove_util::Identifier;

use crate::nbt::LootNbt;

/// Field constructors for the types vanilla tables are built from.
pub struct VanillaTypes;

impl VanillaTypes {
    pub fn number() -> Field<Arc<dyn LootNumber>> {
        FieldTypes::loot()
    }

    pub fn condition() -> Field<Arc<dyn LootCondition>> {
        FieldTypes::loot()
    }

    /// The usual `conditions` list, empty when absent.
    pub fn conditions() -> Field<Vec<Arc<dyn LootCondition>>> {
        Self::condition().list().name("conditions").with_default(Vec::new)
    }

    pub fn modifier() -> Field<Arc<dyn LootModifier>> {
        FieldTypes::loot()
    }

    /// The usual `functions` list, empty when absent.
    pub fn modifiers() -> Field<Vec<Arc<dyn LootModifier>>> {
        Self::modifier()
            .list()
            .local_name("modifiers")
            .node_path(["functions"])
            .with_default(Vec::new)
    }

    pub fn entry() -> Field<Arc<dyn LootEntry>> {
        FieldTypes::loot()
    }

    pub fn nbt_source() -> Field<Arc<dyn LootNbt>> {
        FieldTypes::loot()
    }

    pub fn identifier() -> Field<Identifier> {
        FieldTypes::implicit()
    }

    /// A compound written as an SNBT string.
    pub fn nbt_compound() -> Field<NbtCompound> {
        FieldTypes::string().map(
            |snbt| match from_snbt_compound(&snbt) {
                Ok(compound) => Some(compound),
                Err(err) => {
                    log::debug!("could not read SNBT '{snbt}': {err}");
                    None
                }
            },
            |compound| Some(compound.to_string()),
        )
    }
}
