//! Sources of NBT data, paths into NBT trees, and item list helpers.

use std::sync::Arc;

use serde_json::Value;
use trove_core::{
    converter::{join_conditional, AsAny, ConversionManager, Converters, Field, FieldTypes, TypedConverter},
    BuildError, ConversionError, Key, LootContext, LootError,
};
use trove_nbt::{compound::NbtCompound, tag::NbtTag};
use trove_util::Identifier;

use crate::{
    keys::{
        BLOCK_ENTITY, DIRECT_KILLER_ENTITY, KILLER_ENTITY, LAST_DAMAGE_PLAYER, THIS_ENTITY,
        VANILLA_INTERFACE,
    },
    model::{Entity, ItemStack},
    types::VanillaTypes,
};

pub mod path;

pub use path::{NbtPath, NbtPathError, Selector};

/// Something that reads an NBT tree out of the context.
pub trait LootNbt: AsAny + Send + Sync {
    fn get_nbt(&self, context: &LootContext) -> Result<NbtTag, LootError>;
}

/// The entities a table can refer to by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelevantEntity {
    This,
    Killer,
    DirectKiller,
    KillerPlayer,
}

impl RelevantEntity {
    pub const ALL: [RelevantEntity; 4] = [
        RelevantEntity::This,
        RelevantEntity::Killer,
        RelevantEntity::DirectKiller,
        RelevantEntity::KillerPlayer,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            RelevantEntity::This => "this",
            RelevantEntity::Killer => "killer",
            RelevantEntity::DirectKiller => "direct_killer",
            RelevantEntity::KillerPlayer => "killer_player",
        }
    }

    pub fn key(&self) -> Key<Entity> {
        match self {
            RelevantEntity::This => THIS_ENTITY,
            RelevantEntity::Killer => KILLER_ENTITY,
            RelevantEntity::DirectKiller => DIRECT_KILLER_ENTITY,
            RelevantEntity::KillerPlayer => LAST_DAMAGE_PLAYER,
        }
    }

    pub fn by_id(id: &str) -> Option<RelevantEntity> {
        Self::ALL.into_iter().find(|entity| entity.id() == id)
    }

    pub fn field() -> Field<RelevantEntity> {
        FieldTypes::enumerated(Self::ALL, |entity| entity.id().to_string())
    }
}

/// Where a [`ContextNbt`] reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NbtTarget {
    BlockEntity,
    Entity(RelevantEntity),
}

impl NbtTarget {
    pub fn id(&self) -> &'static str {
        match self {
            NbtTarget::BlockEntity => "block_entity",
            NbtTarget::Entity(entity) => entity.id(),
        }
    }

    pub fn by_id(id: &str) -> Option<NbtTarget> {
        if id == "block_entity" {
            return Some(NbtTarget::BlockEntity);
        }
        RelevantEntity::by_id(id).map(NbtTarget::Entity)
    }

    pub fn field() -> Field<NbtTarget> {
        FieldTypes::proxied(
            FieldTypes::string(),
            |id: String| NbtTarget::by_id(&id),
            |target: &NbtTarget| Some(target.id().to_string()),
        )
    }
}

/// Reads the NBT of the block entity or of an entity in the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextNbt {
    pub target: NbtTarget,
}

impl LootNbt for ContextNbt {
    fn get_nbt(&self, context: &LootContext) -> Result<NbtTag, LootError> {
        match self.target {
            NbtTarget::BlockEntity => {
                let block_entity = context.assure(BLOCK_ENTITY)?;
                let mut nbt = block_entity.block.nbt.clone().unwrap_or_default();
                let position = &block_entity.position;
                nbt.insert("x", position.block_x());
                nbt.insert("y", position.block_y());
                nbt.insert("z", position.block_z());
                nbt.insert("id", block_entity.block.id.to_string());
                Ok(NbtTag::Compound(nbt))
            }
            NbtTarget::Entity(entity) => {
                let entity = context.assure(entity.key())?;
                let vanilla = context.assure(VANILLA_INTERFACE)?;
                Ok(NbtTag::Compound(vanilla.get_entity_nbt(entity)))
            }
        }
    }
}

/// Reads a command storage compound, which is empty when nothing is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageNbt {
    pub source: Identifier,
}

impl LootNbt for StorageNbt {
    fn get_nbt(&self, context: &LootContext) -> Result<NbtTag, LootError> {
        let vanilla = context.assure(VANILLA_INTERFACE)?;
        let storage = vanilla.get_command_storage_value(&self.source);
        Ok(NbtTag::Compound(storage.unwrap_or_default()))
    }
}

trove_core::subtypes!(LootNbt => ContextNbt, StorageNbt);

fn context_nbt() -> Result<impl TypedConverter<ContextNbt>, BuildError> {
    Converters::record::<ContextNbt>()
        .field(NbtTarget::field().name("target"), |n| &n.target)
        .build(|args| Ok(ContextNbt { target: args.take()? }))
}

fn storage_nbt() -> Result<impl TypedConverter<StorageNbt>, BuildError> {
    Converters::record::<StorageNbt>()
        .field(VanillaTypes::identifier().name("source"), |n| &n.source)
        .build(|args| Ok(StorageNbt { source: args.take()? }))
}

/// NBT sources keyed by `type`. A bare string names the target of a
/// [`ContextNbt`].
pub fn nbt_manager() -> Result<ConversionManager<Arc<dyn LootNbt>>, BuildError> {
    ConversionManager::builder()
        .key_location("type")
        .add_initial(join_conditional(
            |input: &Arc<dyn LootNbt>, _| {
                Ok(AsAny::as_any(&**input)
                    .downcast_ref::<ContextNbt>()
                    .map(|context| Value::String(context.target.id().to_string())))
            },
            |input, _| {
                let Some(id) = input.as_str() else {
                    return Ok(None);
                };
                let target = NbtTarget::by_id(id).ok_or_else(|| {
                    ConversionError::Custom(format!(
                        "Could not read a block entity or a relevant entity from '{id}'"
                    ))
                })?;
                Ok(Some(Arc::new(ContextNbt { target }) as Arc<dyn LootNbt>))
            },
        ))
        .add::<ContextNbt>("minecraft:context", context_nbt()?)
        .add::<StorageNbt>("minecraft:storage", storage_nbt()?)
        .build()
}

/// Writes items as a container's `Items` list. Air is skipped, and every entry
/// records its index in a `Slot` byte.
pub fn items_to_list(items: &[ItemStack]) -> Vec<NbtTag> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.is_air())
        .map(|(slot, item)| {
            let mut compound = item.to_nbt();
            compound.put_byte("Slot", slot.clamp(0, i8::MAX as usize) as i8);
            NbtTag::Compound(compound)
        })
        .collect()
}

/// Reads an `Items` list, skipping entries that are not items.
pub fn list_to_items(list: &[NbtTag]) -> Vec<ItemStack> {
    list.iter()
        .filter_map(NbtTag::extract_compound)
        .filter_map(ItemStack::from_nbt)
        .collect()
}

/// Wraps an item's tag so paths can walk it, and unwraps it again.
pub(crate) fn with_item_tag<R>(
    item: &mut ItemStack,
    action: impl FnOnce(&mut NbtTag) -> R,
) -> R {
    let mut tag = NbtTag::Compound(std::mem::take(&mut item.nbt));
    let result = action(&mut tag);
    item.nbt = match tag {
        NbtTag::Compound(compound) => compound,
        _ => NbtCompound::new(),
    };
    result
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use serde_json::json;
    use trove_nbt::{compound::NbtCompound, tag::NbtTag};
    use trove_util::Identifier;

    use super::{items_to_list, list_to_items, ContextNbt, LootNbt, NbtTarget, RelevantEntity};
    use crate::{
        keys::{BLOCK_ENTITY, THIS_ENTITY, VANILLA_INTERFACE},
        model::{Block, BlockEntity, Entity, ItemStack, Point},
        standard_trove,
        test_util::context,
        vanilla::{FallbackVanillaInterface, VanillaInterface},
    };

    #[test]
    fn bare_string_is_context_source() {
        let trove = standard_trove().unwrap();
        let source: Arc<dyn LootNbt> = trove.deserialize(&json!("killer")).unwrap();
        assert_eq!(trove.serialize(&source).unwrap(), json!("killer"));

        let storage: Arc<dyn LootNbt> = trove
            .deserialize(&json!({"type": "minecraft:storage", "source": "trove:data"}))
            .unwrap();
        assert_eq!(
            trove.serialize(&storage).unwrap(),
            json!({"type": "minecraft:storage", "source": "trove:data"})
        );

        assert!(trove.deserialize::<Arc<dyn LootNbt>>(&json!("nobody")).is_err());
    }

    #[test]
    fn block_entity_nbt_has_position() {
        let mut nbt = NbtCompound::new();
        nbt.put_string("Lock", "key".to_string());
        let block_entity = BlockEntity {
            block: Block::new(Identifier::vanilla("chest")).with_nbt(nbt),
            position: Point::new(1.5, -0.5, 3.0),
        };
        let context = context().with(BLOCK_ENTITY, block_entity).build();
        let source = ContextNbt {
            target: NbtTarget::BlockEntity,
        };
        let NbtTag::Compound(nbt) = source.get_nbt(&context).unwrap() else {
            panic!("expected a compound");
        };
        assert_eq!(nbt.get_string("Lock").unwrap(), "key");
        assert_eq!(nbt.get_int("x"), Some(1));
        assert_eq!(nbt.get_int("y"), Some(-1));
        assert_eq!(nbt.get_int("z"), Some(3));
        assert_eq!(nbt.get_string("id").unwrap(), "minecraft:chest");
    }

    #[test]
    fn entity_nbt_needs_the_entity() {
        let vanilla: Arc<dyn VanillaInterface> = Arc::new(FallbackVanillaInterface::new());
        let source = ContextNbt {
            target: NbtTarget::Entity(RelevantEntity::This),
        };
        let empty = context().with(VANILLA_INTERFACE, vanilla.clone()).build();
        assert!(source.get_nbt(&empty).is_err());

        let mut nbt = NbtCompound::new();
        nbt.put_int("Health", 20);
        let entity = Entity::new(Identifier::vanilla("pig")).with_nbt(nbt.clone());
        let context = context()
            .with(VANILLA_INTERFACE, vanilla)
            .with(THIS_ENTITY, entity)
            .build();
        assert_eq!(source.get_nbt(&context).unwrap(), NbtTag::Compound(nbt));
    }

    #[test]
    fn item_lists_skip_air() {
        let items = [
            ItemStack::new(Identifier::vanilla("apple"), 2),
            ItemStack::air(),
            ItemStack::new(Identifier::vanilla("stone"), 64),
        ];
        let list = items_to_list(&items);
        assert_eq!(list.len(), 2);
        let slots: Vec<_> = list
            .iter()
            .filter_map(NbtTag::extract_compound)
            .filter_map(|compound| compound.get_byte("Slot"))
            .collect();
        assert_eq!(slots, vec![0, 2]);

        let read = list_to_items(&list);
        assert_eq!(read, vec![items[0].clone(), items[2].clone()]);
    }
}
