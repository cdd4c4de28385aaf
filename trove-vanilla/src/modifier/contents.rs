use std::sync::Arc;

use trove_core::{
    converter::{Converters, TypedConverter},
    structure::{LootCondition, LootEntry, LootModifier},
    BuildError, Loot, LootContext, LootError,
};
use trove_nbt::compound::NbtCompound;
use trove_util::Identifier;

use super::{max_stack_size, modify_item};
use crate::{model::ItemStack, nbt::items_to_list, types::VanillaTypes};

/// Fills a container item with loot generated from `entries`, stored in its
/// `BlockEntityTag` as it would be in the placed block entity.
pub struct SetContents {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub entries: Vec<Arc<dyn LootEntry>>,
    pub block_entity_type: Identifier,
}

impl SetContents {
    fn generate_contents(&self, context: &LootContext) -> Result<Vec<ItemStack>, LootError> {
        let mut items = Vec::new();
        for entry in &self.entries {
            for choice in entry.clone().request_choices(context)? {
                let batch = choice.generate(context)?;
                for item in batch.of_type::<ItemStack>() {
                    split_stack(context, item, &mut items);
                }
            }
        }
        Ok(items)
    }
}

/// Pushes `item` as stacks no larger than its maximum stack size.
fn split_stack(context: &LootContext, item: &ItemStack, output: &mut Vec<ItemStack>) {
    let max = max_stack_size(context, item).max(1);
    let mut remaining = item.count;
    while remaining > max {
        output.push(item.with_count(max));
        remaining -= max;
    }
    output.push(item.with_count(remaining));
}

impl LootModifier for SetContents {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            if item.is_air() {
                return Ok(Some(item.clone()));
            }
            let contents = self.generate_contents(context)?;

            let mut changes = NbtCompound::new();
            changes.insert("Items", items_to_list(&contents));
            changes.put_string("id", self.block_entity_type.to_string());

            let mut item = item.clone();
            item.nbt.compound_entry("BlockEntityTag").merge(&changes);
            Ok(Some(item))
        })
    }
}

trove_core::subtypes!(LootModifier => SetContents);

pub(super) fn set_contents() -> Result<impl TypedConverter<SetContents>, BuildError> {
    Converters::record::<SetContents>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(
            VanillaTypes::entry().list().name("entries").with_default(Vec::new),
            |m| &m.entries,
        )
        .field(
            VanillaTypes::identifier()
                .local_name("block_entity_type")
                .node_path(["type"]),
            |m| &m.block_entity_type,
        )
        .build(|args| {
            Ok(SetContents {
                conditions: args.take()?,
                entries: args.take()?,
                block_entity_type: args.take()?,
            })
        })
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use serde_json::json;
    use trove_core::{structure::LootModifier, Loot};
    use trove_util::Identifier;

    use crate::{model::ItemStack, nbt::list_to_items, standard_trove, test_util::context};

    #[test]
    fn contents_are_split_into_stacks() {
        let set: Arc<dyn LootModifier> = standard_trove()
            .unwrap()
            .deserialize(&json!({
                "function": "minecraft:set_contents",
                "type": "minecraft:shulker_box",
                "entries": [{
                    "type": "minecraft:item",
                    "name": "minecraft:stone",
                    "functions": [{"function": "minecraft:set_count", "count": 64}]
                }, {
                    "type": "minecraft:item",
                    "name": "minecraft:apple"
                }]
            }))
            .unwrap();

        let shulker = ItemStack::of(Identifier::vanilla("shulker_box"));
        let output = set
            .modify(Loot::new(shulker), &context().build())
            .unwrap()
            .unwrap();
        let item = output.downcast_ref::<ItemStack>().unwrap();
        let tag = item.nbt.get_compound("BlockEntityTag").unwrap();
        assert_eq!(tag.get_string("id").map(String::as_str), Some("minecraft:shulker_box"));

        let contents = list_to_items(tag.get_list("Items").unwrap());
        assert_eq!(
            contents,
            vec![
                ItemStack::new(Identifier::vanilla("stone"), 64),
                ItemStack::of(Identifier::vanilla("apple")),
            ]
        );

        let air = ItemStack::air();
        let untouched = set.modify(Loot::new(air.clone()), &context().build()).unwrap().unwrap();
        assert_eq!(untouched.downcast_ref::<ItemStack>(), Some(&air));
    }
}
