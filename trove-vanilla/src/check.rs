//! Reusable checks against items, enchantments, block states and NBT.

use serde_json::{Map, Value};
use trove_core::{
    converter::{Converters, Field, FieldTypes, TypedConverter},
    BuildError, ConversionError, LootContext, LootError,
};
use trove_nbt::compound::NbtCompound;
use trove_util::Identifier;

use crate::{
    keys::VANILLA_INTERFACE,
    model::{Block, ItemStack, POTION},
    number::LootNumberRange,
    types::VanillaTypes,
};

/// Passes when the checked compound contains everything in `guarantee`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NbtCheck {
    pub guarantee: Option<NbtCompound>,
}

impl NbtCheck {
    pub fn verify(&self, nbt: &NbtCompound) -> bool {
        self.guarantee
            .as_ref()
            .is_none_or(|guarantee| guarantee.matches(nbt, false))
    }

    /// An optional SNBT string.
    pub fn field() -> Field<NbtCheck> {
        VanillaTypes::nbt_compound().optional().map(
            |guarantee| Some(NbtCheck { guarantee }),
            |check| Some(check.guarantee.clone()),
        )
    }
}

/// Checks the level of one enchantment, or of any enchantment when no type is
/// given.
#[derive(Clone, Default)]
pub struct EnchantmentCheck {
    pub enchantment: Option<Identifier>,
    pub levels: LootNumberRange,
}

impl EnchantmentCheck {
    pub fn verify(
        &self,
        context: &LootContext,
        enchantments: &[(Identifier, i32)],
    ) -> Result<bool, LootError> {
        if let Some(enchantment) = &self.enchantment {
            return match enchantments.iter().find(|(id, _)| id == enchantment) {
                Some((_, level)) => self.levels.check_long(context, i64::from(*level)),
                None => Ok(false),
            };
        }
        for (_, level) in enchantments {
            if self.levels.check_long(context, i64::from(*level))? {
                return Ok(true);
            }
        }
        // nothing matched, which only passes when there was nothing to limit
        Ok(self.levels.is_unbounded())
    }

    pub fn converter() -> Result<impl TypedConverter<EnchantmentCheck>, BuildError> {
        Converters::record::<EnchantmentCheck>()
            .field(
                VanillaTypes::identifier().optional().name("enchantment"),
                |c| &c.enchantment,
            )
            .field(
                LootNumberRange::field().name("levels"),
                |c| &c.levels,
            )
            .build(|args| {
                Ok(EnchantmentCheck {
                    enchantment: args.take()?,
                    levels: args.take()?,
                })
            })
    }
}

/// A predicate over item stacks. The empty check passes everything.
#[derive(Clone, Default)]
pub struct ItemCheck {
    pub nbt: NbtCheck,
    pub count: LootNumberRange,
    pub durability: LootNumberRange,
    pub enchantments: Vec<EnchantmentCheck>,
    pub stored_enchantments: Vec<EnchantmentCheck>,
    pub items: Option<Vec<Identifier>>,
    pub tag: Option<Identifier>,
    pub potion: Option<Identifier>,
}

impl ItemCheck {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn verify(&self, context: &LootContext, item: &ItemStack) -> Result<bool, LootError> {
        if !self.nbt.verify(&item.nbt) {
            return Ok(false);
        }
        if !self.count.check_long(context, i64::from(item.count))? {
            return Ok(false);
        }

        if !self.durability.is_unbounded() {
            let vanilla = context.assure(VANILLA_INTERFACE)?;
            let max_damage = vanilla.max_damage(&item.material);
            if max_damage == 0 {
                return Ok(false);
            }
            let remaining = max_damage - item.damage();
            if !self.durability.check_long(context, i64::from(remaining))? {
                return Ok(false);
            }
        }

        if let Some(tag) = &self.tag {
            let vanilla = context.assure(VANILLA_INTERFACE)?;
            if !vanilla.item_tag(tag).contains(&item.material) {
                return Ok(false);
            }
        }
        if let Some(items) = &self.items {
            if !items.contains(&item.material) {
                return Ok(false);
            }
        }

        let enchantments = item.enchantments();
        for check in &self.enchantments {
            if !check.verify(context, &enchantments)? {
                return Ok(false);
            }
        }
        let stored = item.stored_enchantments();
        for check in &self.stored_enchantments {
            if !check.verify(context, &stored)? {
                return Ok(false);
            }
        }

        let Some(potion) = &self.potion else {
            return Ok(true);
        };
        let actual = item
            .nbt
            .get_string(POTION)
            .and_then(|id| Identifier::parse(id).ok())
            .unwrap_or_else(|| Identifier::vanilla("empty"));
        Ok(actual == *potion)
    }

    pub fn converter() -> Result<impl TypedConverter<ItemCheck>, BuildError> {
        let enchantment_check = || -> Result<Field<EnchantmentCheck>, BuildError> {
            Ok(Field::new(EnchantmentCheck::converter()?))
        };
        Converters::record::<ItemCheck>()
            .field(NbtCheck::field().name("nbt"), |c| &c.nbt)
            .field(LootNumberRange::field().name("count"), |c| &c.count)
            .field(LootNumberRange::field().name("durability"), |c| &c.durability)
            .field(
                enchantment_check()?
                    .list()
                    .name("enchantments")
                    .with_default(Vec::new),
                |c| &c.enchantments,
            )
            .field(
                enchantment_check()?
                    .list()
                    .name("stored_enchantments")
                    .with_default(Vec::new),
                |c| &c.stored_enchantments,
            )
            .field(
                VanillaTypes::identifier().list().optional().name("items"),
                |c| &c.items,
            )
            .field(VanillaTypes::identifier().optional().name("tag"), |c| &c.tag)
            .field(VanillaTypes::identifier().optional().name("potion"), |c| &c.potion)
            .build(|args| {
                Ok(ItemCheck {
                    nbt: args.take()?,
                    count: args.take()?,
                    durability: args.take()?,
                    enchantments: args.take()?,
                    stored_enchantments: args.take()?,
                    items: args.take()?,
                    tag: args.take()?,
                    potion: args.take()?,
                })
            })
    }

    /// An item check, defaulting to the empty check when absent.
    pub fn field() -> Result<Field<ItemCheck>, BuildError> {
        Ok(Field::new(Self::converter()?).with_default(ItemCheck::empty))
    }
}

/// One property test of a [`BlockStateCheck`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyCheck {
    /// The property must equal this string.
    Exact { key: String, value: String },
    /// The property must parse as a long within the bounds.
    Ranged {
        key: String,
        min: Option<i64>,
        max: Option<i64>,
    },
}

impl PropertyCheck {
    pub fn key(&self) -> &str {
        match self {
            PropertyCheck::Exact { key, .. } | PropertyCheck::Ranged { key, .. } => key,
        }
    }

    pub fn check(&self, block: &Block) -> bool {
        let Some(actual) = block.property(self.key()) else {
            return false;
        };
        match self {
            PropertyCheck::Exact { value, .. } => actual == value,
            PropertyCheck::Ranged { min, max, .. } => match actual.parse::<i64>() {
                Ok(parsed) => {
                    min.is_none_or(|min| parsed >= min) && max.is_none_or(|max| parsed <= max)
                }
                Err(_) => false,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockStateCheck {
    pub checks: Vec<PropertyCheck>,
}

impl BlockStateCheck {
    pub fn verify(&self, block: &Block) -> bool {
        self.checks.iter().all(|check| check.check(block))
    }

    /// A map of property names to either a scalar or `{min?, max?}`. `null`
    /// reads as no checks.
    pub fn field() -> Field<BlockStateCheck> {
        FieldTypes::join(
            |input: &BlockStateCheck, _| {
                let mut output = Map::new();
                for check in &input.checks {
                    let node = match check {
                        PropertyCheck::Exact { value, .. } => Value::String(value.clone()),
                        PropertyCheck::Ranged { min, max, .. } => {
                            let mut bounds = Map::new();
                            if let Some(min) = min {
                                bounds.insert("min".to_string(), Value::from(*min));
                            }
                            if let Some(max) = max {
                                bounds.insert("max".to_string(), Value::from(*max));
                            }
                            Value::Object(bounds)
                        }
                    };
                    output.insert(check.key().to_string(), node);
                }
                Ok(Value::Object(output))
            },
            |input, _| {
                let map = match input {
                    Value::Null => return Ok(BlockStateCheck::default()),
                    Value::Object(map) => map,
                    _ => return Err(ConversionError::Custom("Expected a map".to_string())),
                };
                let mut checks = Vec::with_capacity(map.len());
                for (key, node) in map {
                    let check = match node {
                        Value::Object(bounds) => PropertyCheck::Ranged {
                            key: key.clone(),
                            min: bounds.get("min").and_then(Value::as_i64),
                            max: bounds.get("max").and_then(Value::as_i64),
                        },
                        Value::String(value) => PropertyCheck::Exact {
                            key: key.clone(),
                            value: value.clone(),
                        },
                        Value::Number(_) | Value::Bool(_) => PropertyCheck::Exact {
                            key: key.clone(),
                            value: node.to_string(),
                        },
                        _ => {
                            return Err(ConversionError::Custom(
                                "Expected a scalar or a map".to_string(),
                            )
                            .in_field(key))
                        }
                    };
                    checks.push(check);
                }
                Ok(BlockStateCheck { checks })
            },
        )
    }
}
