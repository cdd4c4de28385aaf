use std::sync::Arc;

use trove_core::{
    converter::{Converters, Field, FieldTypes, TypedConverter},
    structure::{LootCondition, LootModifier},
    BuildError, Loot, LootContext, LootError,
};
use trove_nbt::{compound::NbtCompound, tag::NbtTag};
use trove_util::Identifier;

use super::modify_item;
use crate::{
    keys::{BLOCK_ENTITY, BLOCK_STATE},
    model::{DISPLAY, NAME},
    nbt::{path::try_list_add, with_item_tag, LootNbt, NbtPath, RelevantEntity},
    types::VanillaTypes,
};

/// Where [`CopyName`] takes its name from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    Entity(RelevantEntity),
    BlockEntity,
}

impl NameSource {
    pub const ALL: [NameSource; 4] = [
        NameSource::Entity(RelevantEntity::This),
        NameSource::Entity(RelevantEntity::Killer),
        NameSource::Entity(RelevantEntity::KillerPlayer),
        NameSource::BlockEntity,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            NameSource::Entity(entity) => entity.id(),
            NameSource::BlockEntity => "block_entity",
        }
    }

    fn name(&self, context: &LootContext) -> Result<Option<String>, LootError> {
        match self {
            NameSource::Entity(entity) => Ok(context.assure(entity.key())?.custom_name.clone()),
            NameSource::BlockEntity => Ok(context
                .assure(BLOCK_ENTITY)?
                .block
                .nbt
                .as_ref()
                .and_then(|nbt| nbt.get_string("CustomName"))
                .cloned()),
        }
    }

    pub fn field() -> Field<NameSource> {
        FieldTypes::enumerated(Self::ALL, |source| source.id().to_string())
    }
}

/// Names the item after an entity or the block entity. Sources without a
/// custom name leave the item alone.
pub struct CopyName {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub source: NameSource,
}

impl LootModifier for CopyName {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            let Some(name) = self.source.name(context)? else {
                return Ok(Some(item.clone()));
            };
            let mut item = item.clone();
            item.nbt.compound_entry(DISPLAY).put_string(NAME, name);
            Ok(Some(item))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Overwrites the target with the last selected tag.
    Replace,
    /// Adds every selected tag to the target lists.
    Append,
    /// Merges every selected compound into the target compounds.
    Merge,
}

impl Operator {
    pub const ALL: [Operator; 3] = [Operator::Replace, Operator::Append, Operator::Merge];

    pub fn id(&self) -> &'static str {
        match self {
            Operator::Replace => "replace",
            Operator::Append => "append",
            Operator::Merge => "merge",
        }
    }

    fn apply(&self, target: &NbtPath, tag: &mut NbtTag, selected: Vec<NbtTag>) {
        match self {
            Operator::Replace => {
                if let Some(last) = selected.last() {
                    target.set(tag, last);
                }
            }
            Operator::Append => {
                target.get_with_defaults(tag, &|| NbtTag::List(Vec::new()), &mut |list| {
                    for value in &selected {
                        try_list_add(list, value.clone());
                    }
                });
            }
            Operator::Merge => {
                target.get_with_defaults(tag, &|| NbtTag::Compound(NbtCompound::new()), &mut |found| {
                    let NbtTag::Compound(compound) = found else {
                        return;
                    };
                    for value in &selected {
                        if let NbtTag::Compound(changes) = value {
                            compound.merge(changes);
                        }
                    }
                });
            }
        }
    }
}

/// Copies the tags at `source` in the source NBT to `target` in the item's tag.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyOperation {
    pub source: NbtPath,
    pub target: NbtPath,
    pub operator: Operator,
}

/// Copies parts of some NBT source into the item's tag.
pub struct CopyNbt {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub source: Arc<dyn LootNbt>,
    pub operations: Vec<CopyOperation>,
}

impl LootModifier for CopyNbt {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            let source = self.source.get_nbt(context)?;
            let mut item = item.clone();
            with_item_tag(&mut item, |tag| {
                for operation in &self.operations {
                    let selected: Vec<NbtTag> =
                        operation.source.get(&source).into_iter().cloned().collect();
                    if selected.is_empty() {
                        continue;
                    }
                    operation.operator.apply(&operation.target, tag, selected);
                }
            });
            Ok(Some(item))
        })
    }
}

/// Stores the listed properties of the broken block under `BlockStateTag`.
pub struct CopyState {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub block: Identifier,
    pub properties: Vec<String>,
}

impl LootModifier for CopyState {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            let Some(block) = context.get(BLOCK_STATE) else {
                return Ok(Some(item.clone()));
            };
            let mut item = item.clone();
            let state = item.nbt.compound_entry("BlockStateTag");
            for property in &self.properties {
                if let Some(value) = block.property(property) {
                    state.put_string(property, value.to_string());
                }
            }
            Ok(Some(item))
        })
    }
}

/// Merges a fixed compound into the item's tag.
pub struct SetNbt {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub nbt: NbtCompound,
}

impl LootModifier for SetNbt {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            let mut item = item.clone();
            item.nbt.merge(&self.nbt);
            Ok(Some(item))
        })
    }
}

trove_core::subtypes!(LootModifier => CopyName, CopyNbt, CopyState, SetNbt);

pub(super) fn copy_name() -> Result<impl TypedConverter<CopyName>, BuildError> {
    Converters::record::<CopyName>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(NameSource::field().name("source"), |m| &m.source)
        .build(|args| {
            Ok(CopyName {
                conditions: args.take()?,
                source: args.take()?,
            })
        })
}

fn copy_operation() -> Result<impl TypedConverter<CopyOperation>, BuildError> {
    Converters::record::<CopyOperation>()
        .field(NbtPath::field().name("source"), |o| &o.source)
        .field(NbtPath::field().name("target"), |o| &o.target)
        .field(
            FieldTypes::enumerated(Operator::ALL, |op| op.id().to_string())
                .local_name("operator")
                .node_path(["op"]),
            |o| &o.operator,
        )
        .build(|args| {
            Ok(CopyOperation {
                source: args.take()?,
                target: args.take()?,
                operator: args.take()?,
            })
        })
}

pub(super) fn copy_nbt() -> Result<impl TypedConverter<CopyNbt>, BuildError> {
    Converters::record::<CopyNbt>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(VanillaTypes::nbt_source().name("source"), |m| &m.source)
        .field(
            Field::new(copy_operation()?)
                .list()
                .local_name("operations")
                .node_path(["ops"])
                .with_default(Vec::new),
            |m| &m.operations,
        )
        .build(|args| {
            Ok(CopyNbt {
                conditions: args.take()?,
                source: args.take()?,
                operations: args.take()?,
            })
        })
}

pub(super) fn copy_state() -> Result<impl TypedConverter<CopyState>, BuildError> {
    Converters::record::<CopyState>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(VanillaTypes::identifier().name("block"), |m| &m.block)
        .field(
            FieldTypes::string().list().name("properties").with_default(Vec::new),
            |m| &m.properties,
        )
        .build(|args| {
            Ok(CopyState {
                conditions: args.take()?,
                block: args.take()?,
                properties: args.take()?,
            })
        })
}

pub(super) fn set_nbt() -> Result<impl TypedConverter<SetNbt>, BuildError> {
    Converters::record::<SetNbt>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(
            VanillaTypes::nbt_compound().local_name("nbt").node_path(["tag"]),
            |m| &m.nbt,
        )
        .build(|args| {
            Ok(SetNbt {
                conditions: args.take()?,
                nbt: args.take()?,
            })
        })
}
