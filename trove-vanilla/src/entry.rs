//! The vanilla loot entries, keyed by `type`.

use std::sync::Arc;

use trove_core::{
    converter::{ConversionManager, Converters, Field, FieldTypes, TypedConverter},
    structure::{self, standard_weight, LootChoice, LootCondition, LootEntry, LootModifier},
    BuildError, Loot, LootBatch, LootContext, LootError, LootGenerator,
};
use trove_nbt::compound::NbtCompound;
use trove_util::Identifier;

use crate::{
    keys::{BLOCK_ENTITY, LUCK, REGISTERED_TABLES, VANILLA_INTERFACE},
    model::ItemStack,
    types::VanillaTypes,
};

/// Offers the choices of the first child that offers any.
pub struct AlternativesEntry {
    pub children: Vec<Arc<dyn LootEntry>>,
    pub conditions: Vec<Arc<dyn LootCondition>>,
}

impl LootEntry for AlternativesEntry {
    fn request_choices(
        self: Arc<Self>,
        context: &LootContext,
    ) -> Result<Vec<Arc<dyn LootChoice>>, LootError> {
        if !structure::all(&self.conditions, context)? {
            return Ok(Vec::new());
        }
        for child in &self.children {
            let choices = child.clone().request_choices(context)?;
            if !choices.is_empty() {
                return Ok(choices);
            }
        }
        Ok(Vec::new())
    }
}

/// Offers the choices of each child in order, stopping at the first child that
/// offers none.
pub struct SequenceEntry {
    pub children: Vec<Arc<dyn LootEntry>>,
    pub conditions: Vec<Arc<dyn LootCondition>>,
}

impl LootEntry for SequenceEntry {
    fn request_choices(
        self: Arc<Self>,
        context: &LootContext,
    ) -> Result<Vec<Arc<dyn LootChoice>>, LootError> {
        if !structure::all(&self.conditions, context)? {
            return Ok(Vec::new());
        }
        let mut options = Vec::new();
        for child in &self.children {
            let choices = child.clone().request_choices(context)?;
            if choices.is_empty() {
                break;
            }
            options.extend(choices);
        }
        Ok(options)
    }
}

/// Offers the choices of every child.
pub struct GroupEntry {
    pub children: Vec<Arc<dyn LootEntry>>,
    pub conditions: Vec<Arc<dyn LootCondition>>,
}

impl LootEntry for GroupEntry {
    fn request_choices(
        self: Arc<Self>,
        context: &LootContext,
    ) -> Result<Vec<Arc<dyn LootChoice>>, LootError> {
        if !structure::all(&self.conditions, context)? {
            return Ok(Vec::new());
        }
        let mut options = Vec::new();
        for child in &self.children {
            options.extend(child.clone().request_choices(context)?);
        }
        Ok(options)
    }
}

/// The settings every entry that is its own choice shares: its weight and
/// quality, the modifiers applied to its output, and its conditions.
pub struct SingleChoice {
    pub weight: i64,
    pub quality: i64,
    pub modifiers: Vec<Arc<dyn LootModifier>>,
    pub conditions: Vec<Arc<dyn LootCondition>>,
}

impl SingleChoice {
    pub fn weight(&self, context: &LootContext) -> i64 {
        let luck = context.get(LUCK).copied().unwrap_or(0.0);
        standard_weight(self.weight, self.quality, luck)
    }

    pub fn finish(&self, batch: LootBatch, context: &LootContext) -> Result<LootBatch, LootError> {
        structure::apply_all(&self.modifiers, batch, context)
    }

    /// Shares the entry's own node, so the settings sit next to its other
    /// fields.
    pub fn field() -> Result<Field<SingleChoice>, BuildError> {
        let converter = Converters::record::<SingleChoice>()
            .field(FieldTypes::i64().name("weight").fallback(1), |c| &c.weight)
            .field(FieldTypes::i64().name("quality").fallback(0), |c| &c.quality)
            .field(VanillaTypes::modifiers(), |c| &c.modifiers)
            .field(VanillaTypes::conditions(), |c| &c.conditions)
            .build(|args| {
                Ok(SingleChoice {
                    weight: args.take()?,
                    quality: args.take()?,
                    modifiers: args.take()?,
                    conditions: args.take()?,
                })
            })?;
        Ok(Field::new(converter)
            .local_name("choice")
            .node_path(Vec::<String>::new()))
    }
}

impl Default for SingleChoice {
    fn default() -> Self {
        Self {
            weight: 1,
            quality: 0,
            modifiers: Vec::new(),
            conditions: Vec::new(),
        }
    }
}

/// Implements the entry and choice traits for a type holding a
/// [`SingleChoice`] in its `choice` field.
macro_rules! single_choice_entry {
    ($($entry:ty),+ $(,)?) => {
        $(
            impl LootEntry for $entry {
                fn request_choices(
                    self: Arc<Self>,
                    context: &LootContext,
                ) -> Result<Vec<Arc<dyn LootChoice>>, LootError> {
                    structure::single_choice(self.clone(), &self.choice.conditions, context)
                }
            }

            impl LootChoice for $entry {
                fn weight(&self, context: &LootContext) -> Result<i64, LootError> {
                    Ok(self.choice.weight(context))
                }
            }
        )+
    };
}

/// Generates nothing. Still takes up weight in its pool.
#[derive(Default)]
pub struct EmptyEntry {
    pub choice: SingleChoice,
}

impl LootGenerator for EmptyEntry {
    fn generate(&self, _context: &LootContext) -> Result<LootBatch, LootError> {
        Ok(LootBatch::EMPTY)
    }
}

/// Generates one item of `material`.
pub struct ItemEntry {
    pub material: Identifier,
    pub choice: SingleChoice,
}

impl LootGenerator for ItemEntry {
    fn generate(&self, context: &LootContext) -> Result<LootBatch, LootError> {
        let item = Loot::new(ItemStack::of(self.material.clone()));
        self.choice.finish(LootBatch::of([item]), context)
    }
}

/// Generates the output of a registered table. Unknown tables and contexts
/// without registered tables generate nothing.
pub struct TableEntry {
    pub table: Identifier,
    pub choice: SingleChoice,
}

impl LootGenerator for TableEntry {
    fn generate(&self, context: &LootContext) -> Result<LootBatch, LootError> {
        let Some(table) = context
            .get(REGISTERED_TABLES)
            .and_then(|tables| tables.get(&self.table))
        else {
            log::debug!("no registered table {}", self.table);
            return Ok(LootBatch::EMPTY);
        };
        let batch = table.generate(context)?;
        self.choice.finish(batch, context)
    }
}

/// Generates the drops the game supplies for the block entity, such as the
/// contents of a container.
pub struct DynamicEntry {
    pub drop_type: Identifier,
    pub choice: SingleChoice,
}

impl LootGenerator for DynamicEntry {
    fn generate(&self, context: &LootContext) -> Result<LootBatch, LootError> {
        let block_entity = context.assure(BLOCK_ENTITY)?;
        let vanilla = context.assure(VANILLA_INTERFACE)?;
        let empty = NbtCompound::new();
        let nbt = block_entity.block.nbt.as_ref().unwrap_or(&empty);
        let drops = vanilla
            .get_dynamic_drops(&self.drop_type, nbt)
            .into_iter()
            .map(Loot::new);
        self.choice.finish(LootBatch::of(drops), context)
    }
}

/// Generates one of each item in an item tag. When expanded, each item becomes
/// its own choice with the entry's weight instead.
pub struct TagEntry {
    pub tag: Identifier,
    pub expand: bool,
    pub choice: SingleChoice,
}

impl LootGenerator for TagEntry {
    fn generate(&self, context: &LootContext) -> Result<LootBatch, LootError> {
        let vanilla = context.assure(VANILLA_INTERFACE)?;
        let items = vanilla
            .item_tag(&self.tag)
            .into_iter()
            .map(|material| Loot::new(ItemStack::of(material)));
        self.choice.finish(LootBatch::of(items), context)
    }
}

impl LootEntry for TagEntry {
    fn request_choices(
        self: Arc<Self>,
        context: &LootContext,
    ) -> Result<Vec<Arc<dyn LootChoice>>, LootError> {
        if !self.expand {
            return structure::single_choice(self.clone(), &self.choice.conditions, context);
        }
        if !structure::all(&self.choice.conditions, context)? {
            return Ok(Vec::new());
        }
        let weight = self.choice.weight(context);
        Ok(self
            .generate(context)?
            .into_iter()
            .map(|loot| Arc::new(FixedChoice { loot, weight }) as Arc<dyn LootChoice>)
            .collect())
    }
}

impl LootChoice for TagEntry {
    fn weight(&self, context: &LootContext) -> Result<i64, LootError> {
        Ok(self.choice.weight(context))
    }
}

/// One already generated item offered as a choice.
struct FixedChoice {
    loot: Loot,
    weight: i64,
}

impl LootGenerator for FixedChoice {
    fn generate(&self, _context: &LootContext) -> Result<LootBatch, LootError> {
        Ok(LootBatch::of([self.loot.clone()]))
    }
}

impl LootChoice for FixedChoice {
    fn weight(&self, _context: &LootContext) -> Result<i64, LootError> {
        Ok(self.weight)
    }
}

single_choice_entry!(EmptyEntry, ItemEntry, TableEntry, DynamicEntry);

trove_core::subtypes!(
    LootEntry => AlternativesEntry,
    SequenceEntry,
    GroupEntry,
    EmptyEntry,
    ItemEntry,
    TableEntry,
    DynamicEntry,
    TagEntry,
);

fn children() -> Field<Vec<Arc<dyn LootEntry>>> {
    VanillaTypes::entry().list().name("children")
}

fn alternatives() -> Result<impl TypedConverter<AlternativesEntry>, BuildError> {
    Converters::record::<AlternativesEntry>()
        .field(children(), |e| &e.children)
        .field(VanillaTypes::conditions(), |e| &e.conditions)
        .build(|args| {
            Ok(AlternativesEntry {
                children: args.take()?,
                conditions: args.take()?,
            })
        })
}

fn sequence() -> Result<impl TypedConverter<SequenceEntry>, BuildError> {
    Converters::record::<SequenceEntry>()
        .field(children(), |e| &e.children)
        .field(VanillaTypes::conditions(), |e| &e.conditions)
        .build(|args| {
            Ok(SequenceEntry {
                children: args.take()?,
                conditions: args.take()?,
            })
        })
}

fn group() -> Result<impl TypedConverter<GroupEntry>, BuildError> {
    Converters::record::<GroupEntry>()
        .field(children(), |e| &e.children)
        .field(VanillaTypes::conditions(), |e| &e.conditions)
        .build(|args| {
            Ok(GroupEntry {
                children: args.take()?,
                conditions: args.take()?,
            })
        })
}

fn empty() -> Result<impl TypedConverter<EmptyEntry>, BuildError> {
    Converters::record::<EmptyEntry>()
        .field(SingleChoice::field()?, |e| &e.choice)
        .build(|args| Ok(EmptyEntry { choice: args.take()? }))
}

fn item() -> Result<impl TypedConverter<ItemEntry>, BuildError> {
    Converters::record::<ItemEntry>()
        .field(
            VanillaTypes::identifier().local_name("material").node_path(["name"]),
            |e| &e.material,
        )
        .field(SingleChoice::field()?, |e| &e.choice)
        .build(|args| {
            Ok(ItemEntry {
                material: args.take()?,
                choice: args.take()?,
            })
        })
}

fn loot_table() -> Result<impl TypedConverter<TableEntry>, BuildError> {
    Converters::record::<TableEntry>()
        .field(
            VanillaTypes::identifier().local_name("table").node_path(["name"]),
            |e| &e.table,
        )
        .field(SingleChoice::field()?, |e| &e.choice)
        .build(|args| {
            Ok(TableEntry {
                table: args.take()?,
                choice: args.take()?,
            })
        })
}

fn dynamic() -> Result<impl TypedConverter<DynamicEntry>, BuildError> {
    Converters::record::<DynamicEntry>()
        .field(
            VanillaTypes::identifier().local_name("drop_type").node_path(["name"]),
            |e| &e.drop_type,
        )
        .field(SingleChoice::field()?, |e| &e.choice)
        .build(|args| {
            Ok(DynamicEntry {
                drop_type: args.take()?,
                choice: args.take()?,
            })
        })
}

fn tag() -> Result<impl TypedConverter<TagEntry>, BuildError> {
    Converters::record::<TagEntry>()
        .field(
            VanillaTypes::identifier().local_name("tag").node_path(["name"]),
            |e| &e.tag,
        )
        .field(FieldTypes::bool().name("expand"), |e| &e.expand)
        .field(SingleChoice::field()?, |e| &e.choice)
        .build(|args| {
            Ok(TagEntry {
                tag: args.take()?,
                expand: args.take()?,
                choice: args.take()?,
            })
        })
}

pub fn entry_manager() -> Result<ConversionManager<Arc<dyn LootEntry>>, BuildError> {
    ConversionManager::builder()
        .key_location("type")
        .add::<AlternativesEntry>("minecraft:alternatives", alternatives()?)
        .add::<SequenceEntry>("minecraft:sequence", sequence()?)
        .add::<GroupEntry>("minecraft:group", group()?)
        .add::<EmptyEntry>("minecraft:empty", empty()?)
        .add::<ItemEntry>("minecraft:item", item()?)
        .add::<TableEntry>("minecraft:loot_table", loot_table()?)
        .add::<DynamicEntry>("minecraft:dynamic", dynamic()?)
        .add::<TagEntry>("minecraft:tag", tag()?)
        .build()
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, sync::Arc};

    use serde_json::{json, Value};
    use trove_core::{
        structure::{pick_choice, LootEntry},
        LootBatch, LootContext, LootGenerator,
    };
    use trove_nbt::from_snbt_compound;
    use trove_util::Identifier;

    use super::SingleChoice;
    use crate::{
        keys::{BLOCK_ENTITY, LUCK, REGISTERED_TABLES, VANILLA_INTERFACE},
        model::{Block, BlockEntity, ItemStack, Point},
        standard_trove,
        test_util::context,
        vanilla::{FallbackVanillaInterface, VanillaInterface},
    };

    fn entry(node: Value) -> Arc<dyn LootEntry> {
        standard_trove().unwrap().deserialize(&node).unwrap()
    }

    fn materials(batch: &LootBatch) -> Vec<String> {
        batch
            .of_type::<ItemStack>()
            .map(|item| item.material.to_string())
            .collect()
    }

    fn generate_all(entry: &Arc<dyn LootEntry>, context: &LootContext) -> Vec<String> {
        let mut output = Vec::new();
        for choice in entry.clone().request_choices(context).unwrap() {
            output.extend(materials(&choice.generate(context).unwrap()));
        }
        output
    }

    fn item(name: &str) -> Value {
        json!({"type": "minecraft:item", "name": name})
    }

    fn never() -> Value {
        json!({"type": "minecraft:empty", "conditions": [{"condition": "minecraft:random_chance", "chance": 0.0}]})
    }

    #[test]
    fn composite_entries() {
        let context = context().build();
        let alternatives = entry(json!({
            "type": "minecraft:alternatives",
            "children": [never(), item("minecraft:apple"), item("minecraft:stone")]
        }));
        assert_eq!(generate_all(&alternatives, &context), vec!["minecraft:apple"]);

        let sequence = entry(json!({
            "type": "minecraft:sequence",
            "children": [item("minecraft:apple"), never(), item("minecraft:stone")]
        }));
        assert_eq!(generate_all(&sequence, &context), vec!["minecraft:apple"]);

        let group = entry(json!({
            "type": "minecraft:group",
            "children": [item("minecraft:apple"), never(), item("minecraft:stone")]
        }));
        assert_eq!(
            generate_all(&group, &context),
            vec!["minecraft:apple", "minecraft:stone"]
        );

        let blocked = entry(json!({
            "type": "minecraft:group",
            "children": [item("minecraft:apple")],
            "conditions": [{"condition": "minecraft:random_chance", "chance": 0.0}]
        }));
        assert!(generate_all(&blocked, &context).is_empty());
    }

    #[test]
    fn weights_use_luck() {
        let choice = SingleChoice {
            weight: 2,
            quality: 3,
            ..Default::default()
        };
        assert_eq!(choice.weight(&context().build()), 2);
        assert_eq!(choice.weight(&context().with(LUCK, 1.5).build()), 6);
        assert_eq!(choice.weight(&context().with(LUCK, -10.0).build()), 1);
    }

    #[test]
    fn item_entry_applies_functions() {
        let trove = standard_trove().unwrap();
        let node = json!({
            "type": "minecraft:item",
            "name": "minecraft:apple",
            "weight": 5,
            "quality": 1,
            "functions": [{"function": "minecraft:set_count", "count": 3.0, "add": false, "conditions": []}],
            "conditions": []
        });
        let apple: Arc<dyn LootEntry> = trove.deserialize(&node).unwrap();
        let context = context().build();
        let choices = apple.clone().request_choices(&context).unwrap();
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].weight(&context).unwrap(), 5);
        let batch = choices[0].generate(&context).unwrap();
        let items: Vec<_> = batch.of_type::<ItemStack>().cloned().collect();
        assert_eq!(items, vec![ItemStack::new(Identifier::vanilla("apple"), 3)]);

        assert_eq!(trove.serialize(&apple).unwrap(), node);
    }

    #[test]
    fn table_entry_reads_registered_tables() {
        let trove = standard_trove().unwrap();
        let nested: Arc<dyn LootGenerator> = Arc::new(
            trove
                .deserialize::<crate::generation::LootTable>(&json!({
                    "pools": [{"rolls": 1, "entries": [item("minecraft:diamond")]}]
                }))
                .unwrap(),
        );
        let reference = entry(json!({"type": "minecraft:loot_table", "name": "minecraft:nested"}));

        assert!(generate_all(&reference, &context().build()).is_empty());

        let tables = HashMap::from([(Identifier::vanilla("nested"), nested)]);
        let context = context().with(REGISTERED_TABLES, tables).build();
        assert_eq!(generate_all(&reference, &context), vec!["minecraft:diamond"]);
    }

    #[test]
    fn dynamic_entry_reads_block_contents() {
        let dynamic = entry(json!({"type": "minecraft:dynamic", "name": "minecraft:contents"}));
        let nbt = from_snbt_compound(r#"{Items: [{id: "minecraft:emerald", Count: 2b, Slot: 0b}]}"#).unwrap();
        let vanilla: Arc<dyn VanillaInterface> = Arc::new(FallbackVanillaInterface::new());
        let context = context()
            .with(VANILLA_INTERFACE, vanilla)
            .with(
                BLOCK_ENTITY,
                BlockEntity {
                    block: Block::new(Identifier::vanilla("chest")).with_nbt(nbt),
                    position: Point::new(0.0, 0.0, 0.0),
                },
            )
            .build();
        assert_eq!(generate_all(&dynamic, &context), vec!["minecraft:emerald"]);
        assert!(dynamic.clone().request_choices(&context).is_ok());
    }

    struct Tags;

    impl VanillaInterface for Tags {
        fn is_raining(&self, _: &crate::model::World) -> bool {
            false
        }
        fn is_thundering(&self, _: &crate::model::World) -> bool {
            false
        }
        fn get_looting(&self, _: &crate::model::Entity) -> i32 {
            0
        }
        fn enchant_item(
            &self,
            _: &mut trove_util::random::RandomGenerator,
            item: ItemStack,
            _: i32,
            _: bool,
        ) -> ItemStack {
            item
        }
        fn can_apply_enchantment(&self, _: &ItemStack, _: &Identifier) -> bool {
            false
        }
        fn smelt_item(&self, _: &ItemStack) -> Option<ItemStack> {
            None
        }
        fn get_entity_nbt(&self, entity: &crate::model::Entity) -> trove_nbt::compound::NbtCompound {
            entity.nbt.clone()
        }
        fn get_command_storage_value(&self, _: &Identifier) -> Option<trove_nbt::compound::NbtCompound> {
            None
        }
        fn get_dynamic_drops(
            &self,
            _: &Identifier,
            _: &trove_nbt::compound::NbtCompound,
        ) -> Vec<ItemStack> {
            Vec::new()
        }
        fn item_tag(&self, _: &Identifier) -> Vec<Identifier> {
            vec![Identifier::vanilla("oak_planks"), Identifier::vanilla("birch_planks")]
        }
    }

    #[test]
    fn tag_entries_expand_into_choices() {
        let vanilla: Arc<dyn VanillaInterface> = Arc::new(Tags);
        let context = context().with(VANILLA_INTERFACE, vanilla).build();

        let whole = entry(json!({"type": "minecraft:tag", "name": "minecraft:planks", "expand": false}));
        let choices = whole.clone().request_choices(&context).unwrap();
        assert_eq!(choices.len(), 1);
        assert_eq!(
            materials(&choices[0].generate(&context).unwrap()),
            vec!["minecraft:oak_planks", "minecraft:birch_planks"]
        );

        let expanded = entry(json!({
            "type": "minecraft:tag",
            "name": "minecraft:planks",
            "expand": true,
            "weight": 4
        }));
        let choices = expanded.clone().request_choices(&context).unwrap();
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[1].weight(&context).unwrap(), 4);
        assert_eq!(
            materials(&choices[1].generate(&context).unwrap()),
            vec!["minecraft:birch_planks"]
        );

        let picked = pick_choice(&[expanded], &context).unwrap().unwrap();
        assert_eq!(picked.generate(&context).unwrap().len(), 1);
    }
}
