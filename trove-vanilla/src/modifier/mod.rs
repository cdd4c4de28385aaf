//! The vanilla loot modifiers, keyed by `function`. Each one only touches item
//! stacks and leaves them unchanged when its conditions fail.

use std::sync::Arc;

use trove_core::{
    converter::ConversionManager,
    structure::{self, LootCondition, LootModifier},
    BuildError, Loot, LootContext, LootError,
};

use crate::{keys::VANILLA_INTERFACE, model::ItemStack};

mod contents;
mod copy;
mod count;
mod enchant;
mod item;

pub use contents::SetContents;
pub use copy::{CopyName, CopyNbt, CopyOperation, CopyState, NameSource, Operator, SetNbt};
pub use count::{
    formula_manager, ApplyBonus, BinomialWithBonusCount, BonusFormula, ExplosionDecay, LimitCount,
    LootingEnchant, OreDrops, SetCount, UniformBonusCount,
};
pub use enchant::{EnchantRandomly, EnchantWithLevels};
pub use item::{
    AttributeDirective, AttributeOperation, EquipmentSlot, FurnaceSmelt, SetAttributes, SetDamage,
    SetPotion, SetStewEffect, StewEffect,
};

/// Runs `modify` on item stacks whose conditions all pass. Other loot, and
/// items whose conditions fail, come back unchanged.
pub(crate) fn modify_item(
    input: Loot,
    conditions: &[Arc<dyn LootCondition>],
    context: &LootContext,
    modify: impl FnOnce(&ItemStack) -> Result<Option<ItemStack>, LootError>,
) -> Result<Option<Loot>, LootError> {
    if !input.is::<ItemStack>() {
        return Ok(Some(input));
    }
    if !structure::all(conditions, context)? {
        return Ok(Some(input));
    }
    input.try_map::<ItemStack, LootError>(modify)
}

/// The largest stack of `item`, or 64 when no vanilla interface is present.
pub(crate) fn max_stack_size(context: &LootContext, item: &ItemStack) -> i32 {
    context
        .get(VANILLA_INTERFACE)
        .map_or(64, |vanilla| vanilla.max_stack_size(&item.material))
}

/// Whether `count` is a valid size for a stack of `item`.
pub(crate) fn can_apply_count(context: &LootContext, item: &ItemStack, count: i32) -> bool {
    (0..=max_stack_size(context, item)).contains(&count)
}

pub fn modifier_manager() -> Result<ConversionManager<Arc<dyn LootModifier>>, BuildError> {
    ConversionManager::builder()
        .key_location("function")
        .add::<ApplyBonus>("minecraft:apply_bonus", count::apply_bonus()?)
        .add::<CopyName>("minecraft:copy_name", copy::copy_name()?)
        .add::<CopyNbt>("minecraft:copy_nbt", copy::copy_nbt()?)
        .add::<CopyState>("minecraft:copy_state", copy::copy_state()?)
        .add::<EnchantRandomly>("minecraft:enchant_randomly", enchant::enchant_randomly()?)
        .add::<EnchantWithLevels>("minecraft:enchant_with_levels", enchant::enchant_with_levels()?)
        .add::<ExplosionDecay>("minecraft:explosion_decay", count::explosion_decay()?)
        .add::<FurnaceSmelt>("minecraft:furnace_smelt", item::furnace_smelt()?)
        .add::<LimitCount>("minecraft:limit_count", count::limit_count()?)
        .add::<LootingEnchant>("minecraft:looting_enchant", count::looting_enchant()?)
        .add::<SetAttributes>("minecraft:set_attributes", item::set_attributes()?)
        .add::<SetContents>("minecraft:set_contents", contents::set_contents()?)
        .add::<SetCount>("minecraft:set_count", count::set_count()?)
        .add::<SetDamage>("minecraft:set_damage", item::set_damage()?)
        .add::<SetNbt>("minecraft:set_nbt", copy::set_nbt()?)
        .add::<SetPotion>("minecraft:set_potion", item::set_potion()?)
        .add::<SetStewEffect>("minecraft:set_stew_effect", item::set_stew_effect()?)
        .build()
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use serde_json::json;
    use trove_core::{structure::LootModifier, Loot};
    use trove_util::Identifier;

    use super::{can_apply_count, modify_item};
    use crate::{model::ItemStack, standard_trove, test_util::context};

    #[test]
    fn other_loot_passes_through() {
        let context = context().build();
        let output = modify_item(Loot::new(7u8), &[], &context, |_| Ok(None))
            .unwrap()
            .unwrap();
        assert_eq!(output.downcast_ref::<u8>(), Some(&7));

        let removed = modify_item(
            Loot::new(ItemStack::of(Identifier::vanilla("stone"))),
            &[],
            &context,
            |_| Ok(None),
        )
        .unwrap();
        assert!(removed.is_none());
    }

    #[test]
    fn failed_conditions_leave_items_alone() {
        let trove = standard_trove().unwrap();
        let modifier: Arc<dyn LootModifier> = trove
            .deserialize(&json!({
                "function": "minecraft:set_count",
                "count": 5,
                "conditions": [{"condition": "minecraft:random_chance", "chance": 0.0}]
            }))
            .unwrap();
        let stone = ItemStack::of(Identifier::vanilla("stone"));
        let output = modifier
            .modify(Loot::new(stone.clone()), &context().build())
            .unwrap()
            .unwrap();
        assert_eq!(output.downcast_ref::<ItemStack>(), Some(&stone));
    }

    #[test]
    fn counts_fit_in_a_stack() {
        let context = context().build();
        let stone = ItemStack::of(Identifier::vanilla("stone"));
        assert!(can_apply_count(&context, &stone, 0));
        assert!(can_apply_count(&context, &stone, 64));
        assert!(!can_apply_count(&context, &stone, 65));
        assert!(!can_apply_count(&context, &stone, -1));
    }
}
