use std::sync::Arc;

use trove_core::{
    converter::{Converters, Field, FieldTypes, TypedConverter},
    structure::{LootCondition, LootModifier, LootNumber},
    BuildError, Loot, LootContext, LootError,
};
use trove_nbt::{compound::NbtCompound, tag::NbtTag};
use trove_util::{random::RandomImpl, Identifier};
use uuid::Uuid;

use super::{can_apply_count, modify_item};
use crate::{
    keys::VANILLA_INTERFACE,
    model::{DAMAGE, POTION},
    types::VanillaTypes,
    vanilla::is_instant_effect,
};

/// Replaces the item with its smelted form. Items that cannot be smelted, or
/// whose smelted form cannot hold the same count, are removed.
pub struct FurnaceSmelt {
    pub conditions: Vec<Arc<dyn LootCondition>>,
}

impl LootModifier for FurnaceSmelt {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            let vanilla = context.assure(VANILLA_INTERFACE)?;
            let Some(smelted) = vanilla.smelt_item(item) else {
                return Ok(None);
            };
            if !can_apply_count(context, &smelted, item.count) {
                return Ok(None);
            }
            Ok(Some(smelted.with_count(item.count)))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOperation {
    Addition,
    MultiplyBase,
    MultiplyTotal,
}

impl AttributeOperation {
    pub const ALL: [AttributeOperation; 3] = [
        AttributeOperation::Addition,
        AttributeOperation::MultiplyBase,
        AttributeOperation::MultiplyTotal,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            AttributeOperation::Addition => "addition",
            AttributeOperation::MultiplyBase => "multiply_base",
            AttributeOperation::MultiplyTotal => "multiply_total",
        }
    }

    /// The value stored in an item's `Operation` tag.
    pub fn ordinal(&self) -> i32 {
        match self {
            AttributeOperation::Addition => 0,
            AttributeOperation::MultiplyBase => 1,
            AttributeOperation::MultiplyTotal => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipmentSlot {
    MainHand,
    OffHand,
    Feet,
    Legs,
    Chest,
    Head,
}

impl EquipmentSlot {
    pub const ALL: [EquipmentSlot; 6] = [
        EquipmentSlot::MainHand,
        EquipmentSlot::OffHand,
        EquipmentSlot::Feet,
        EquipmentSlot::Legs,
        EquipmentSlot::Chest,
        EquipmentSlot::Head,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            EquipmentSlot::MainHand => "mainhand",
            EquipmentSlot::OffHand => "offhand",
            EquipmentSlot::Feet => "feet",
            EquipmentSlot::Legs => "legs",
            EquipmentSlot::Chest => "chest",
            EquipmentSlot::Head => "head",
        }
    }
}

/// One attribute modifier to add. The slot is picked at random from `slots`
/// and a missing id is generated.
pub struct AttributeDirective {
    pub name: String,
    pub attribute: Identifier,
    pub operation: AttributeOperation,
    pub amount: Arc<dyn LootNumber>,
    pub id: Option<Uuid>,
    pub slots: Vec<EquipmentSlot>,
}

impl AttributeDirective {
    fn generate(&self, context: &LootContext) -> Result<Option<NbtCompound>, LootError> {
        if self.slots.is_empty() {
            return Ok(None);
        }
        let amount = self.amount.get_double(context)?;
        let (slot, uuid) = context.with_random(|random| {
            let slot = self.slots[random.next_bounded_i32(self.slots.len() as i32) as usize];
            let uuid = self.id.unwrap_or_else(|| {
                let mut bytes = [0u8; 16];
                bytes[..8].copy_from_slice(&random.next_i64().to_be_bytes());
                bytes[8..].copy_from_slice(&random.next_i64().to_be_bytes());
                uuid::Builder::from_random_bytes(bytes).into_uuid()
            });
            (slot, uuid)
        });

        let bits = uuid.as_u128();
        let words: Box<[i32]> = (0..4)
            .map(|word| (bits >> (96 - 32 * word)) as u32 as i32)
            .collect();

        let mut compound = NbtCompound::new();
        compound.put_string("Name", self.name.clone());
        compound.put_string("AttributeName", self.attribute.to_string());
        compound.put_int("Operation", self.operation.ordinal());
        compound.put_double("Amount", amount);
        compound.insert("UUID", NbtTag::IntArray(words));
        compound.put_string("Slot", slot.id().to_string());
        Ok(Some(compound))
    }
}

/// Appends attribute modifiers to the item's `AttributeModifiers` list.
pub struct SetAttributes {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub modifiers: Vec<AttributeDirective>,
}

impl LootModifier for SetAttributes {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            let mut generated = Vec::with_capacity(self.modifiers.len());
            for directive in &self.modifiers {
                if let Some(compound) = directive.generate(context)? {
                    generated.push(NbtTag::Compound(compound));
                }
            }

            let mut item = item.clone();
            let mut modifiers: Vec<NbtTag> = item
                .nbt
                .get_list("AttributeModifiers")
                .map(<[NbtTag]>::to_vec)
                .unwrap_or_default();
            modifiers.extend(generated);
            item.nbt.insert("AttributeModifiers", modifiers);
            Ok(Some(item))
        })
    }
}

/// Sets the remaining durability as a fraction of the maximum, or adds to it.
/// Items without durability are left alone.
pub struct SetDamage {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub damage: Arc<dyn LootNumber>,
    pub add: bool,
}

impl LootModifier for SetDamage {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            let max_damage = context
                .get(VANILLA_INTERFACE)
                .map_or(0, |vanilla| vanilla.max_damage(&item.material));
            if max_damage == 0 {
                return Ok(Some(item.clone()));
            }
            let max_damage = f64::from(max_damage);

            let current = if self.add {
                1.0 - f64::from(item.damage()) / max_damage
            } else {
                0.0
            };
            let durability = (current + self.damage.get_double(context)?).clamp(0.0, 1.0);

            let mut item = item.clone();
            item.nbt
                .put_int(DAMAGE, ((1.0 - durability) * max_damage).floor() as i32);
            Ok(Some(item))
        })
    }
}

/// Sets the item's potion. `minecraft:empty` clears it.
pub struct SetPotion {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub potion: Identifier,
}

impl LootModifier for SetPotion {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            let mut item = item.clone();
            if self.potion == Identifier::vanilla("empty") {
                item.nbt.remove(POTION);
            } else {
                item.nbt.insert(POTION, self.potion.to_string());
            }
            Ok(Some(item))
        })
    }
}

/// An effect a suspicious stew may be given, with its duration in seconds.
pub struct StewEffect {
    pub effect: Identifier,
    pub duration: Arc<dyn LootNumber>,
}

/// Gives a suspicious stew one of `effects`, picked at random.
pub struct SetStewEffect {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub effects: Vec<StewEffect>,
}

impl LootModifier for SetStewEffect {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            if item.material != Identifier::vanilla("suspicious_stew") || self.effects.is_empty() {
                return Ok(Some(item.clone()));
            }
            let index = context
                .with_random(|random| random.next_bounded_i32(self.effects.len() as i32))
                as usize;
            let chosen = &self.effects[index];

            let instant = match context.get(VANILLA_INTERFACE) {
                Some(vanilla) => vanilla.is_instant_effect(&chosen.effect),
                None => is_instant_effect(&chosen.effect),
            };
            let mut duration = chosen.duration.get_long(context)?;
            if !instant {
                duration = duration.saturating_mul(20);
            }

            let mut effect = NbtCompound::new();
            effect.put_string("id", chosen.effect.to_string());
            effect.put_int("duration", duration.clamp(0, i64::from(i32::MAX)) as i32);

            let mut item = item.clone();
            let mut effects: Vec<NbtTag> = item
                .nbt
                .get_list("effects")
                .map(<[NbtTag]>::to_vec)
                .unwrap_or_default();
            effects.push(NbtTag::Compound(effect));
            item.nbt.insert("effects", effects);
            Ok(Some(item))
        })
    }
}

trove_core::subtypes!(LootModifier => FurnaceSmelt, SetAttributes, SetDamage, SetPotion, SetStewEffect);

pub(super) fn furnace_smelt() -> Result<impl TypedConverter<FurnaceSmelt>, BuildError> {
    Converters::record::<FurnaceSmelt>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .build(|args| {
            Ok(FurnaceSmelt {
                conditions: args.take()?,
            })
        })
}

fn attribute_directive() -> Result<impl TypedConverter<AttributeDirective>, BuildError> {
    Converters::record::<AttributeDirective>()
        .field(FieldTypes::string().name("name"), |a| &a.name)
        .field(VanillaTypes::identifier().name("attribute"), |a| &a.attribute)
        .field(
            FieldTypes::enumerated(AttributeOperation::ALL, |op| op.id().to_string()).name("operation"),
            |a| &a.operation,
        )
        .field(VanillaTypes::number().name("amount"), |a| &a.amount)
        .field(FieldTypes::implicit::<Uuid>().name("id").optional(), |a| &a.id)
        .field(
            FieldTypes::enumerated(EquipmentSlot::ALL, |slot| slot.id().to_string())
                .possible_list()
                .local_name("slots")
                .node_path(["slot"]),
            |a| &a.slots,
        )
        .build(|args| {
            Ok(AttributeDirective {
                name: args.take()?,
                attribute: args.take()?,
                operation: args.take()?,
                amount: args.take()?,
                id: args.take()?,
                slots: args.take()?,
            })
        })
}

pub(super) fn set_attributes() -> Result<impl TypedConverter<SetAttributes>, BuildError> {
    Converters::record::<SetAttributes>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(
            Field::new(attribute_directive()?)
                .list()
                .name("modifiers")
                .with_default(Vec::new),
            |m| &m.modifiers,
        )
        .build(|args| {
            Ok(SetAttributes {
                conditions: args.take()?,
                modifiers: args.take()?,
            })
        })
}

pub(super) fn set_damage() -> Result<impl TypedConverter<SetDamage>, BuildError> {
    Converters::record::<SetDamage>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(VanillaTypes::number().name("damage"), |m| &m.damage)
        .field(FieldTypes::bool().name("add").fallback(false), |m| &m.add)
        .build(|args| {
            Ok(SetDamage {
                conditions: args.take()?,
                damage: args.take()?,
                add: args.take()?,
            })
        })
}

pub(super) fn set_potion() -> Result<impl TypedConverter<SetPotion>, BuildError> {
    Converters::record::<SetPotion>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(
            VanillaTypes::identifier().local_name("potion").node_path(["id"]),
            |m| &m.potion,
        )
        .build(|args| {
            Ok(SetPotion {
                conditions: args.take()?,
                potion: args.take()?,
            })
        })
}

fn stew_effect() -> Result<impl TypedConverter<StewEffect>, BuildError> {
    Converters::record::<StewEffect>()
        .field(
            VanillaTypes::identifier().local_name("effect").node_path(["type"]),
            |e| &e.effect,
        )
        .field(VanillaTypes::number().name("duration"), |e| &e.duration)
        .build(|args| {
            Ok(StewEffect {
                effect: args.take()?,
                duration: args.take()?,
            })
        })
}

pub(super) fn set_stew_effect() -> Result<impl TypedConverter<SetStewEffect>, BuildError> {
    Converters::record::<SetStewEffect>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(
            Field::new(stew_effect()?)
                .list()
                .name("effects")
                .with_default(Vec::new),
            |m| &m.effects,
        )
        .build(|args| {
            Ok(SetStewEffect {
                conditions: args.take()?,
                effects: args.take()?,
            })
        })
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use serde_json::{json, Value};
    use trove_core::{structure::LootModifier, Loot, LootContext};
    use trove_nbt::tag::NbtTag;
    use trove_util::Identifier;

    use crate::{
        keys::VANILLA_INTERFACE,
        model::{ItemStack, DAMAGE, POTION},
        standard_trove,
        test_util::context,
        vanilla::{FallbackVanillaInterface, VanillaInterface},
    };

    fn modifier(node: Value) -> Arc<dyn LootModifier> {
        standard_trove().unwrap().deserialize(&node).unwrap()
    }

    fn vanilla_context() -> LootContext {
        let vanilla: Arc<dyn VanillaInterface> = Arc::new(FallbackVanillaInterface::new());
        context().with(VANILLA_INTERFACE, vanilla).build()
    }

    fn apply(modifier: &Arc<dyn LootModifier>, item: ItemStack, context: &LootContext) -> Option<ItemStack> {
        modifier
            .modify(Loot::new(item), context)
            .unwrap()
            .map(|loot| loot.downcast_ref::<ItemStack>().unwrap().clone())
    }

    #[test]
    fn smelting_keeps_the_count() {
        let smelt = modifier(json!({"function": "minecraft:furnace_smelt"}));
        let iron = ItemStack::new(Identifier::vanilla("raw_iron"), 3);
        assert_eq!(apply(&smelt, iron.clone(), &vanilla_context()), Some(iron));

        let swords = ItemStack::new(Identifier::vanilla("iron_sword"), 2);
        assert_eq!(apply(&smelt, swords, &vanilla_context()), None);
    }

    #[test]
    fn damage_is_a_fraction_of_durability() {
        let set = modifier(json!({"function": "minecraft:set_damage", "damage": 0.5}));
        let sword = ItemStack::of(Identifier::vanilla("iron_sword"));
        let damaged = apply(&set, sword.clone(), &vanilla_context()).unwrap();
        assert_eq!(damaged.damage(), 125);

        let add = modifier(json!({"function": "minecraft:set_damage", "damage": -0.25, "add": true}));
        let worse = apply(&add, damaged, &vanilla_context()).unwrap();
        assert_eq!(worse.damage(), 187);

        let stone = ItemStack::of(Identifier::vanilla("stone"));
        let untouched = apply(&set, stone.clone(), &vanilla_context()).unwrap();
        assert!(!untouched.nbt.contains_key(DAMAGE));
        assert_eq!(apply(&set, sword.clone(), &context().build()), Some(sword));
    }

    #[test]
    fn potions_set_and_clear() {
        let set = modifier(json!({"function": "minecraft:set_potion", "id": "minecraft:swiftness"}));
        let potion = apply(&set, ItemStack::of(Identifier::vanilla("potion")), &context().build()).unwrap();
        assert_eq!(
            potion.nbt.get_string(POTION).map(String::as_str),
            Some("minecraft:swiftness")
        );

        let clear = modifier(json!({"function": "minecraft:set_potion", "id": "minecraft:empty"}));
        let cleared = apply(&clear, potion, &context().build()).unwrap();
        assert!(!cleared.nbt.contains_key(POTION));
    }

    #[test]
    fn stew_effects_scale_durations() {
        let stew = modifier(json!({
            "function": "minecraft:set_stew_effect",
            "effects": [{"type": "minecraft:night_vision", "duration": 5}]
        }));
        let bowl = ItemStack::of(Identifier::vanilla("suspicious_stew"));
        let item = apply(&stew, bowl, &context().build()).unwrap();
        let effects = item.nbt.get_list("effects").unwrap();
        assert_eq!(effects.len(), 1);
        let effect = effects[0].extract_compound().unwrap();
        assert_eq!(effect.get_string("id").map(String::as_str), Some("minecraft:night_vision"));
        assert_eq!(effect.get_int("duration"), Some(100));

        let instant = modifier(json!({
            "function": "minecraft:set_stew_effect",
            "effects": [{"type": "minecraft:saturation", "duration": 7}]
        }));
        let bowl = ItemStack::of(Identifier::vanilla("suspicious_stew"));
        let item = apply(&instant, bowl, &context().build()).unwrap();
        let effects = item.nbt.get_list("effects").unwrap();
        assert_eq!(effects[0].extract_compound().unwrap().get_int("duration"), Some(7));

        let apple = ItemStack::of(Identifier::vanilla("apple"));
        assert_eq!(apply(&stew, apple.clone(), &context().build()), Some(apple));
    }

    #[test]
    fn long_stew_effects_are_capped() {
        let stew = modifier(json!({
            "function": "minecraft:set_stew_effect",
            "effects": [{"type": "minecraft:night_vision", "duration": 5e18}]
        }));
        let bowl = ItemStack::of(Identifier::vanilla("suspicious_stew"));
        let item = apply(&stew, bowl, &context().build()).unwrap();
        let effects = item.nbt.get_list("effects").unwrap();
        assert_eq!(
            effects[0].extract_compound().unwrap().get_int("duration"),
            Some(i32::MAX)
        );
    }

    #[test]
    fn attributes_are_appended() {
        let set = modifier(json!({
            "function": "minecraft:set_attributes",
            "modifiers": [
                {
                    "name": "fixed",
                    "attribute": "minecraft:generic.attack_damage",
                    "operation": "multiply_total",
                    "amount": 2.5,
                    "id": "00000001-0000-0002-0000-000300000004",
                    "slot": "mainhand"
                },
                {
                    "name": "random",
                    "attribute": "minecraft:generic.armor",
                    "operation": "addition",
                    "amount": 1,
                    "slot": ["head", "chest"]
                }
            ]
        }));
        let item = apply(&set, ItemStack::of(Identifier::vanilla("iron_sword")), &context().build()).unwrap();
        let modifiers = item.nbt.get_list("AttributeModifiers").unwrap();
        assert_eq!(modifiers.len(), 2);

        let fixed = modifiers[0].extract_compound().unwrap();
        assert_eq!(fixed.get_int("Operation"), Some(2));
        assert_eq!(fixed.get_double("Amount"), Some(2.5));
        assert_eq!(fixed.get_string("Slot").map(String::as_str), Some("mainhand"));
        assert_eq!(fixed.get_int_array("UUID"), Some(&[1, 2, 3, 4][..]));

        let random = modifiers[1].extract_compound().unwrap();
        let slot = random.get_string("Slot").unwrap();
        assert!(slot == "head" || slot == "chest");
        assert!(matches!(random.get("UUID"), Some(NbtTag::IntArray(words)) if words.len() == 4));
    }
}
