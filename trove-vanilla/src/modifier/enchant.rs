use std::sync::Arc;

use trove_core::{
    converter::{Converters, FieldTypes, TypedConverter},
    structure::{LootCondition, LootModifier, LootNumber},
    BuildError, Loot, LootContext, LootError,
};
use trove_util::{random::RandomImpl, Identifier};

use super::modify_item;
use crate::{
    keys::VANILLA_INTERFACE,
    model::{ItemStack, ENCHANTMENTS, STORED_ENCHANTMENTS},
    types::VanillaTypes,
};

/// Adds one random enchantment at a random level. An empty list picks from
/// every enchantment that fits the item.
pub struct EnchantRandomly {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub enchantments: Vec<Identifier>,
}

impl LootModifier for EnchantRandomly {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            let vanilla = context.assure(VANILLA_INTERFACE)?;
            let candidates: Vec<Identifier> = if self.enchantments.is_empty() {
                vanilla
                    .enchantments()
                    .into_iter()
                    .filter(|enchantment| vanilla.can_apply_enchantment(item, enchantment))
                    .collect()
            } else {
                self.enchantments.clone()
            };
            if candidates.is_empty() {
                return Ok(Some(item.clone()));
            }

            let (enchantment, level) = context.with_random(|random| {
                let enchantment = &candidates[random.next_bounded_i32(candidates.len() as i32) as usize];
                let max_level = vanilla.max_enchantment_level(enchantment).max(1);
                (enchantment.clone(), random.next_bounded_i32(max_level) + 1)
            });
            Ok(Some(enchant(item, &enchantment, level)))
        })
    }
}

/// Books turn into enchanted books that store the enchantment instead.
fn enchant(item: &ItemStack, enchantment: &Identifier, level: i32) -> ItemStack {
    if item.material != Identifier::vanilla("book") {
        let mut item = item.clone();
        item.put_enchantment(ENCHANTMENTS, enchantment, level);
        return item;
    }

    let mut book = item.clone();
    book.material = Identifier::vanilla("enchanted_book");
    if let Some(existing) = book.nbt.remove(ENCHANTMENTS) {
        book.nbt.insert(STORED_ENCHANTMENTS, existing);
    }
    book.put_enchantment(STORED_ENCHANTMENTS, enchantment, level);
    book
}

/// Enchants the item like an enchanting table spending `levels` levels.
pub struct EnchantWithLevels {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub levels: Arc<dyn LootNumber>,
    pub permit_treasure: bool,
}

impl LootModifier for EnchantWithLevels {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            let vanilla = context.assure(VANILLA_INTERFACE)?;
            let levels = self.levels.get_long(context)?;
            let levels = levels.clamp(0, i64::from(i32::MAX)) as i32;
            let enchanted = context.with_random(|random| {
                vanilla.enchant_item(random, item.clone(), levels, self.permit_treasure)
            });
            Ok(Some(enchanted))
        })
    }
}

trove_core::subtypes!(LootModifier => EnchantRandomly, EnchantWithLevels);

pub(super) fn enchant_randomly() -> Result<impl TypedConverter<EnchantRandomly>, BuildError> {
    Converters::record::<EnchantRandomly>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(
            VanillaTypes::identifier()
                .list()
                .name("enchantments")
                .with_default(Vec::new),
            |m| &m.enchantments,
        )
        .build(|args| {
            Ok(EnchantRandomly {
                conditions: args.take()?,
                enchantments: args.take()?,
            })
        })
}

pub(super) fn enchant_with_levels() -> Result<impl TypedConverter<EnchantWithLevels>, BuildError> {
    Converters::record::<EnchantWithLevels>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(VanillaTypes::number().name("levels"), |m| &m.levels)
        .field(
            FieldTypes::bool()
                .local_name("permit_treasure")
                .node_path(["treasure"])
                .fallback(false),
            |m| &m.permit_treasure,
        )
        .build(|args| {
            Ok(EnchantWithLevels {
                conditions: args.take()?,
                levels: args.take()?,
                permit_treasure: args.take()?,
            })
        })
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use serde_json::{json, Value};
    use trove_core::{structure::LootModifier, Loot, LootContext};
    use trove_util::Identifier;

    use crate::{
        keys::VANILLA_INTERFACE,
        model::{ItemStack, ENCHANTMENTS},
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

    fn apply(modifier: &Arc<dyn LootModifier>, item: ItemStack, context: &LootContext) -> ItemStack {
        modifier
            .modify(Loot::new(item), context)
            .unwrap()
            .and_then(|loot| loot.downcast_ref::<ItemStack>().cloned())
            .unwrap()
    }

    #[test]
    fn enchants_from_the_list() {
        let enchant = modifier(json!({
            "function": "minecraft:enchant_randomly",
            "enchantments": ["minecraft:sharpness"]
        }));
        let context = vanilla_context();
        for _ in 0..20 {
            let sword = apply(&enchant, ItemStack::of(Identifier::vanilla("iron_sword")), &context);
            let level = sword.enchantment_level(&Identifier::vanilla("sharpness"));
            assert!((1..=5).contains(&level));
        }
    }

    #[test]
    fn books_store_enchantments() {
        let enchant = modifier(json!({
            "function": "minecraft:enchant_randomly",
            "enchantments": ["minecraft:mending"]
        }));
        let mut book = ItemStack::of(Identifier::vanilla("book"));
        book.put_enchantment(ENCHANTMENTS, &Identifier::vanilla("unbreaking"), 2);

        let enchanted = apply(&enchant, book, &vanilla_context());
        assert_eq!(enchanted.material, Identifier::vanilla("enchanted_book"));
        assert!(enchanted.enchantments().is_empty());
        let stored = enchanted.stored_enchantments();
        assert_eq!(stored.len(), 2);
        assert!(stored.contains(&(Identifier::vanilla("mending"), 1)));
    }

    #[test]
    fn needs_the_vanilla_interface() {
        let enchant = modifier(json!({"function": "minecraft:enchant_randomly"}));
        let item = ItemStack::of(Identifier::vanilla("iron_sword"));
        assert!(enchant.modify(Loot::new(item.clone()), &context().build()).is_err());
        assert!(enchant.modify(Loot::new(item), &vanilla_context()).is_ok());
    }

    #[test]
    fn treasure_flag_round_trips() {
        let trove = standard_trove().unwrap();
        let node = json!({
            "function": "minecraft:enchant_with_levels",
            "levels": 30.0,
            "treasure": true,
            "conditions": []
        });
        let enchant: Arc<dyn LootModifier> = trove.deserialize(&node).unwrap();
        assert_eq!(trove.serialize(&enchant).unwrap(), node);
    }
}
