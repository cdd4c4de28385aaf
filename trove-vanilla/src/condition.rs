//! The vanilla loot conditions, keyed by `condition`.

use std::sync::Arc;

use trove_core::{
    converter::{ConversionManager, Converters, FieldTypes, TypedConverter},
    structure::{self, LootCondition, LootNumber},
    BuildError, LootContext, LootError,
};
use trove_util::{random::RandomImpl, Identifier};

use crate::{
    check::{BlockStateCheck, ItemCheck},
    keys::{
        BLOCK_STATE, EXPLOSION_RADIUS, KILLER_ENTITY, LAST_DAMAGE_PLAYER, ORIGIN,
        REGISTERED_CONDITIONS, TOOL, VANILLA_INTERFACE, WORLD,
    },
    nbt::RelevantEntity,
    number::LootNumberRange,
    types::VanillaTypes,
    vanilla::{EntityPredicate, LocationPredicate},
};

/// Passes when every term passes.
pub struct AllOf {
    pub terms: Vec<Arc<dyn LootCondition>>,
}

impl LootCondition for AllOf {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        structure::all(&self.terms, context)
    }
}

/// Passes when any term passes.
pub struct AnyOf {
    pub terms: Vec<Arc<dyn LootCondition>>,
}

impl LootCondition for AnyOf {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        structure::any(&self.terms, context)
    }
}

pub struct Inverted {
    pub term: Arc<dyn LootCondition>,
}

impl LootCondition for Inverted {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        Ok(!self.term.verify(context)?)
    }
}

/// Passes when the broken block is `block` and its properties pass.
pub struct BlockStateProperty {
    pub block: Identifier,
    pub properties: BlockStateCheck,
}

impl LootCondition for BlockStateProperty {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        let block = context.assure(BLOCK_STATE)?;
        Ok(block.id == self.block && self.properties.verify(block))
    }
}

/// A random chance picked by the tool's level of an enchantment. Levels past
/// the end of `chances` use the last one.
pub struct TableBonus {
    pub enchantment: Identifier,
    pub chances: Vec<f64>,
}

impl LootCondition for TableBonus {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        let level = context
            .get(TOOL)
            .map_or(0, |tool| tool.enchantment_level(&self.enchantment));
        let index = usize::try_from(level).unwrap_or(0);
        let Some(chance) = self.chances.get(index).or(self.chances.last()) else {
            return Ok(false);
        };
        Ok(context.with_random(|random| random.next_f64()) < *chance)
    }
}

pub struct EntityProperties {
    pub entity: RelevantEntity,
    pub predicate: EntityPredicate,
}

impl LootCondition for EntityProperties {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        let world = context.assure(WORLD)?;
        Ok(self.predicate.test(world, context.get(self.entity.key())))
    }
}

pub struct KilledByPlayer;

impl LootCondition for KilledByPlayer {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        Ok(context.has(LAST_DAMAGE_PLAYER))
    }
}

/// Tests the origin moved by an offset. Passes when there is no origin.
pub struct LocationCheck {
    pub predicate: LocationPredicate,
    pub offset_x: f64,
    pub offset_y: f64,
    pub offset_z: f64,
}

impl LootCondition for LocationCheck {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        let Some(origin) = context.get(ORIGIN) else {
            return Ok(true);
        };
        let world = context.assure(WORLD)?;
        let location = origin.offset(self.offset_x, self.offset_y, self.offset_z);
        Ok(self.predicate.test(world, &location))
    }
}

/// `chance + looting * looting_multiplier`, using the killer's looting level.
pub struct RandomChanceWithLooting {
    pub chance: f64,
    pub looting_multiplier: f64,
}

impl LootCondition for RandomChanceWithLooting {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        let killer = context.assure(KILLER_ENTITY)?;
        let vanilla = context.assure(VANILLA_INTERFACE)?;
        let chance = self.chance + f64::from(vanilla.get_looting(killer)) * self.looting_multiplier;
        Ok(context.with_random(|random| random.next_f64()) < chance)
    }
}

pub struct ValueCheck {
    pub range: LootNumberRange,
    pub value: Arc<dyn LootNumber>,
}

impl LootCondition for ValueCheck {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        let value = self.value.get_long(context)?;
        self.range.check_long(context, value)
    }
}

pub struct RandomChance {
    pub chance: f64,
}

impl LootCondition for RandomChance {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        Ok(context.with_random(|random| random.next_f64()) < self.chance)
    }
}

/// Defers to a registered condition. An unknown name fails.
pub struct Reference {
    pub name: Identifier,
}

impl LootCondition for Reference {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        let registered = context.assure(REGISTERED_CONDITIONS)?;
        match registered.get(&self.name) {
            Some(condition) => condition.verify(context),
            None => {
                log::debug!("no registered condition named {}", self.name);
                Ok(false)
            }
        }
    }
}

/// Passes with a chance of `1 / radius`, or always without an explosion.
pub struct SurvivesExplosion;

impl LootCondition for SurvivesExplosion {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        let Some(radius) = context.get(EXPLOSION_RADIUS) else {
            return Ok(true);
        };
        Ok(context.with_random(|random| random.next_f32()) <= 1.0 / radius)
    }
}

/// Checks the world time, taken modulo `period` when one is set.
pub struct TimeCheck {
    pub value: LootNumberRange,
    pub period: Option<i64>,
}

impl LootCondition for TimeCheck {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        let mut time = context.assure(WORLD)?.time;
        if let Some(period) = self.period.filter(|period| *period != 0) {
            time %= period;
        }
        self.value.check_long(context, time)
    }
}

/// Checks the tool. Passes when there is no tool.
pub struct MatchTool {
    pub predicate: ItemCheck,
}

impl LootCondition for MatchTool {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        match context.get(TOOL) {
            Some(tool) => self.predicate.verify(context, tool),
            None => Ok(true),
        }
    }
}

/// Each set flag must equal the world's weather.
pub struct WeatherCheck {
    pub raining: Option<bool>,
    pub thundering: Option<bool>,
}

impl LootCondition for WeatherCheck {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError> {
        let vanilla = context.assure(VANILLA_INTERFACE)?;
        let world = context.assure(WORLD)?;
        Ok(self
            .raining
            .is_none_or(|raining| vanilla.is_raining(world) == raining)
            && self
                .thundering
                .is_none_or(|thundering| vanilla.is_thundering(world) == thundering))
    }
}

trove_core::subtypes!(LootCondition =>
    AllOf, AnyOf, Inverted, BlockStateProperty, TableBonus, EntityProperties, KilledByPlayer,
    LocationCheck, RandomChanceWithLooting, ValueCheck, RandomChance, Reference,
    SurvivesExplosion, TimeCheck, MatchTool, WeatherCheck,
);

fn all_of() -> Result<impl TypedConverter<AllOf>, BuildError> {
    Converters::record::<AllOf>()
        .field(
            VanillaTypes::condition().list().name("terms").with_default(Vec::new),
            |c| &c.terms,
        )
        .build(|args| Ok(AllOf { terms: args.take()? }))
}

fn any_of() -> Result<impl TypedConverter<AnyOf>, BuildError> {
    Converters::record::<AnyOf>()
        .field(
            VanillaTypes::condition().list().name("terms").with_default(Vec::new),
            |c| &c.terms,
        )
        .build(|args| Ok(AnyOf { terms: args.take()? }))
}

fn inverted() -> Result<impl TypedConverter<Inverted>, BuildError> {
    Converters::record::<Inverted>()
        .field(VanillaTypes::condition().name("term"), |c| &c.term)
        .build(|args| Ok(Inverted { term: args.take()? }))
}

fn block_state_property() -> Result<impl TypedConverter<BlockStateProperty>, BuildError> {
    Converters::record::<BlockStateProperty>()
        .field(VanillaTypes::identifier().name("block"), |c| &c.block)
        .field(BlockStateCheck::field().name("properties"), |c| &c.properties)
        .build(|args| {
            Ok(BlockStateProperty {
                block: args.take()?,
                properties: args.take()?,
            })
        })
}

fn table_bonus() -> Result<impl TypedConverter<TableBonus>, BuildError> {
    Converters::record::<TableBonus>()
        .field(VanillaTypes::identifier().name("enchantment"), |c| &c.enchantment)
        .field(FieldTypes::f64().list().name("chances"), |c| &c.chances)
        .build(|args| {
            Ok(TableBonus {
                enchantment: args.take()?,
                chances: args.take()?,
            })
        })
}

fn entity_properties() -> Result<impl TypedConverter<EntityProperties>, BuildError> {
    Converters::record::<EntityProperties>()
        .field(RelevantEntity::field().name("entity"), |c| &c.entity)
        .field(EntityPredicate::field().name("predicate"), |c| &c.predicate)
        .build(|args| {
            Ok(EntityProperties {
                entity: args.take()?,
                predicate: args.take()?,
            })
        })
}

fn killed_by_player() -> Result<impl TypedConverter<KilledByPlayer>, BuildError> {
    Converters::record::<KilledByPlayer>().build(|_| Ok(KilledByPlayer))
}

fn location_check() -> Result<impl TypedConverter<LocationCheck>, BuildError> {
    let offset = |node: &str| FieldTypes::f64().name(node).fallback(0.0);
    Converters::record::<LocationCheck>()
        .field(LocationPredicate::field().name("predicate"), |c| &c.predicate)
        .field(offset("offsetX"), |c| &c.offset_x)
        .field(offset("offsetY"), |c| &c.offset_y)
        .field(offset("offsetZ"), |c| &c.offset_z)
        .build(|args| {
            Ok(LocationCheck {
                predicate: args.take()?,
                offset_x: args.take()?,
                offset_y: args.take()?,
                offset_z: args.take()?,
            })
        })
}

fn random_chance_with_looting() -> Result<impl TypedConverter<RandomChanceWithLooting>, BuildError>
{
    Converters::record::<RandomChanceWithLooting>()
        .field(FieldTypes::f64().name("chance"), |c| &c.chance)
        .field(
            FieldTypes::f64().name("looting_multiplier"),
            |c| &c.looting_multiplier,
        )
        .build(|args| {
            Ok(RandomChanceWithLooting {
                chance: args.take()?,
                looting_multiplier: args.take()?,
            })
        })
}

fn value_check() -> Result<impl TypedConverter<ValueCheck>, BuildError> {
    Converters::record::<ValueCheck>()
        .field(LootNumberRange::field().name("range"), |c| &c.range)
        .field(VanillaTypes::number().name("value"), |c| &c.value)
        .build(|args| {
            Ok(ValueCheck {
                range: args.take()?,
                value: args.take()?,
            })
        })
}

fn random_chance() -> Result<impl TypedConverter<RandomChance>, BuildError> {
    Converters::record::<RandomChance>()
        .field(FieldTypes::f64().name("chance"), |c| &c.chance)
        .build(|args| Ok(RandomChance { chance: args.take()? }))
}

fn reference() -> Result<impl TypedConverter<Reference>, BuildError> {
    Converters::record::<Reference>()
        .field(VanillaTypes::identifier().name("name"), |c| &c.name)
        .build(|args| Ok(Reference { name: args.take()? }))
}

fn survives_explosion() -> Result<impl TypedConverter<SurvivesExplosion>, BuildError> {
    Converters::record::<SurvivesExplosion>().build(|_| Ok(SurvivesExplosion))
}

fn time_check() -> Result<impl TypedConverter<TimeCheck>, BuildError> {
    Converters::record::<TimeCheck>()
        .field(LootNumberRange::field().name("value"), |c| &c.value)
        .field(FieldTypes::i64().optional().name("period"), |c| &c.period)
        .build(|args| {
            Ok(TimeCheck {
                value: args.take()?,
                period: args.take()?,
            })
        })
}

fn match_tool() -> Result<impl TypedConverter<MatchTool>, BuildError> {
    Converters::record::<MatchTool>()
        .field(ItemCheck::field()?.name("predicate"), |c| &c.predicate)
        .build(|args| Ok(MatchTool { predicate: args.take()? }))
}

fn weather_check() -> Result<impl TypedConverter<WeatherCheck>, BuildError> {
    Converters::record::<WeatherCheck>()
        .field(FieldTypes::bool().optional().name("raining"), |c| &c.raining)
        .field(FieldTypes::bool().optional().name("thundering"), |c| &c.thundering)
        .build(|args| {
            Ok(WeatherCheck {
                raining: args.take()?,
                thundering: args.take()?,
            })
        })
}

pub fn condition_manager() -> Result<ConversionManager<Arc<dyn LootCondition>>, BuildError> {
    ConversionManager::builder()
        .key_location("condition")
        .add::<AllOf>("minecraft:all_of", all_of()?)
        .add::<AnyOf>("minecraft:any_of", any_of()?)
        .add::<Inverted>("minecraft:inverted", inverted()?)
        .add::<BlockStateProperty>("minecraft:block_state_property", block_state_property()?)
        .add::<TableBonus>("minecraft:table_bonus", table_bonus()?)
        .add::<EntityProperties>("minecraft:entity_properties", entity_properties()?)
        .add::<KilledByPlayer>("minecraft:killed_by_player", killed_by_player()?)
        .add::<LocationCheck>("minecraft:location_check", location_check()?)
        .add::<RandomChanceWithLooting>(
            "minecraft:random_chance_with_looting",
            random_chance_with_looting()?,
        )
        .add::<ValueCheck>("minecraft:value_check", value_check()?)
        .add::<RandomChance>("minecraft:random_chance", random_chance()?)
        .add::<Reference>("minecraft:reference", reference()?)
        .add::<SurvivesExplosion>("minecraft:survives_explosion", survives_explosion()?)
        .add::<TimeCheck>("minecraft:time_check", time_check()?)
        .add::<MatchTool>("minecraft:match_tool", match_tool()?)
        .add::<WeatherCheck>("minecraft:weather_check", weather_check()?)
        .build()
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, sync::Arc};

    use serde_json::{json, Value};
    use trove_core::{structure::LootCondition, LootContext};
    use trove_util::Identifier;

    use crate::{
        keys::{
            BLOCK_STATE, EXPLOSION_RADIUS, KILLER_ENTITY, LAST_DAMAGE_PLAYER, ORIGIN,
            REGISTERED_CONDITIONS, TOOL, VANILLA_INTERFACE, WORLD,
        },
        model::{Block, Entity, ItemStack, Point, World, ENCHANTMENTS},
        standard_trove,
        test_util::context,
        vanilla::{FallbackVanillaInterface, VanillaInterface},
    };

    fn condition(node: Value) -> Arc<dyn LootCondition> {
        standard_trove().unwrap().deserialize(&node).unwrap()
    }

    fn vanilla() -> Arc<dyn VanillaInterface> {
        Arc::new(FallbackVanillaInterface::new())
    }

    fn passes(condition: &Arc<dyn LootCondition>, context: &LootContext) -> bool {
        condition.verify(context).unwrap()
    }

    #[test]
    fn combinators() {
        let context = context().build();
        let always = json!({"condition": "minecraft:random_chance", "chance": 1.0});
        let never = json!({"condition": "minecraft:random_chance", "chance": 0.0});

        assert!(passes(&condition(json!({"condition": "minecraft:all_of"})), &context));
        assert!(!passes(&condition(json!({"condition": "minecraft:any_of"})), &context));
        assert!(!passes(
            &condition(json!({"condition": "minecraft:all_of", "terms": [always, never]})),
            &context
        ));
        assert!(passes(
            &condition(json!({"condition": "minecraft:any_of", "terms": [never, always]})),
            &context
        ));
        assert!(passes(
            &condition(json!({"condition": "minecraft:inverted", "term": never})),
            &context
        ));
    }

    #[test]
    fn block_state_property() {
        let condition = condition(json!({
            "condition": "minecraft:block_state_property",
            "block": "minecraft:wheat",
            "properties": {"age": "7"}
        }));
        let ripe = context()
            .with(BLOCK_STATE, Block::new(Identifier::vanilla("wheat")).with_property("age", "7"))
            .build();
        let young = context()
            .with(BLOCK_STATE, Block::new(Identifier::vanilla("wheat")).with_property("age", "2"))
            .build();
        assert!(passes(&condition, &ripe));
        assert!(!passes(&condition, &young));
        assert!(condition.verify(&context().build()).is_err());
    }

    #[test]
    fn table_bonus_uses_tool_level() {
        let condition = condition(json!({
            "condition": "minecraft:table_bonus",
            "enchantment": "minecraft:fortune",
            "chances": [0.0, 1.0]
        }));
        assert!(!passes(&condition, &context().build()));

        let mut tool = ItemStack::of(Identifier::vanilla("iron_pickaxe"));
        tool.put_enchantment(ENCHANTMENTS, &Identifier::vanilla("fortune"), 3);
        assert!(passes(&condition, &context().with(TOOL, tool).build()));
    }

    #[test]
    fn killer_conditions() {
        let player = Entity::new(Identifier::vanilla("player"));
        assert!(!passes(
            &condition(json!({"condition": "minecraft:killed_by_player"})),
            &context().build()
        ));
        assert!(passes(
            &condition(json!({"condition": "minecraft:killed_by_player"})),
            &context().with(LAST_DAMAGE_PLAYER, player.clone()).build()
        ));

        let looting = condition(json!({
            "condition": "minecraft:random_chance_with_looting",
            "chance": 0.0,
            "looting_multiplier": 1.0
        }));
        let mut sword = ItemStack::of(Identifier::vanilla("iron_sword"));
        sword.put_enchantment(ENCHANTMENTS, &Identifier::vanilla("looting"), 1);
        let context = context()
            .with(VANILLA_INTERFACE, vanilla())
            .with(KILLER_ENTITY, player.with_main_hand(sword))
            .build();
        assert!(passes(&looting, &context));
    }

    #[test]
    fn explosions_and_locations() {
        let survives = condition(json!({"condition": "minecraft:survives_explosion"}));
        assert!(passes(&survives, &context().build()));
        assert!(passes(&survives, &context().with(EXPLOSION_RADIUS, 1.0).build()));

        let location = condition(json!({
            "condition": "minecraft:location_check",
            "predicate": {"biome": "minecraft:plains"},
            "offsetY": 1
        }));
        assert!(passes(&location, &context().build()));
        let placed = context()
            .with(WORLD, World::default())
            .with(ORIGIN, Point::new(0.0, 64.0, 0.0))
            .build();
        assert!(!passes(&location, &placed));
    }

    #[test]
    fn world_conditions() {
        let world = World {
            time: 25_000,
            raining: true,
            ..World::default()
        };
        let context = context()
            .with(WORLD, world)
            .with(VANILLA_INTERFACE, vanilla())
            .build();

        let night = condition(json!({
            "condition": "minecraft:time_check",
            "value": {"min": 13000, "max": 23000},
            "period": 24000
        }));
        assert!(!passes(&night, &context));
        let morning = condition(json!({
            "condition": "minecraft:time_check",
            "value": {"max": 6000},
            "period": 24000
        }));
        assert!(passes(&morning, &context));

        let rain = condition(json!({"condition": "minecraft:weather_check", "raining": true}));
        let storm = condition(json!({"condition": "minecraft:weather_check", "thundering": true}));
        assert!(passes(&rain, &context));
        assert!(!passes(&storm, &context));
    }

    #[test]
    fn value_check_and_tool() {
        let context = context().build();
        let value = condition(json!({
            "condition": "minecraft:value_check",
            "value": 5,
            "range": {"min": 1, "max": 5}
        }));
        assert!(passes(&value, &context));

        let tool = condition(json!({
            "condition": "minecraft:match_tool",
            "predicate": {"items": ["minecraft:shears"]}
        }));
        assert!(passes(&tool, &context));
        let shears = context_with_tool("shears");
        let stick = context_with_tool("stick");
        assert!(passes(&tool, &shears));
        assert!(!passes(&tool, &stick));
    }

    fn context_with_tool(material: &str) -> LootContext {
        context()
            .with(TOOL, ItemStack::of(Identifier::vanilla(material)))
            .build()
    }

    #[test]
    fn references_registered_conditions() {
        let reference = condition(json!({"condition": "minecraft:reference", "name": "trove:always"}));
        assert!(reference.verify(&context().build()).is_err());

        let mut registered = HashMap::new();
        registered.insert(
            Identifier::new("trove", "always"),
            condition(json!({"condition": "minecraft:random_chance", "chance": 1.0})),
        );
        let context = context().with(REGISTERED_CONDITIONS, registered).build();
        assert!(passes(&reference, &context));

        let missing = condition(json!({"condition": "minecraft:reference", "name": "trove:never"}));
        assert!(!passes(&missing, &context));
    }

    #[test]
    fn serializes_with_key() {
        let trove = standard_trove().unwrap();
        let node = json!({"condition": "minecraft:random_chance", "chance": 0.5});
        let condition: Arc<dyn LootCondition> = trove.deserialize(&node).unwrap();
        assert_eq!(trove.serialize(&condition).unwrap(), node);
    }
}
