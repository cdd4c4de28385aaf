//! Context keys understood by the vanilla loot types, and the groups of keys
//! each kind of loot table expects.

use std::{collections::HashMap, sync::Arc};

use trove_core::{
    converter::{Field, FieldTypes},
    structure::LootCondition,
    Key, LootContext, LootError, LootGenerator,
};
use trove_util::Identifier;

use crate::{
    model::{Block, BlockEntity, DamageSource, Entity, ItemStack, Point, World},
    vanilla::VanillaInterface,
};

pub type TableMap = HashMap<Identifier, Arc<dyn LootGenerator>>;
pub type ConditionMap = HashMap<Identifier, Arc<dyn LootCondition>>;

pub const BLOCK_STATE: Key<Block> = Key::new("minecraft:block_state");
pub const BLOCK_ENTITY: Key<BlockEntity> = Key::new("minecraft:block_entity");
pub const DAMAGE_SOURCE: Key<DamageSource> = Key::new("minecraft:damage_source");
pub const LUCK: Key<f64> = Key::new("minecraft:luck");
pub const DIRECT_KILLER_ENTITY: Key<Entity> = Key::new("minecraft:direct_killer_entity");
pub const EXPLOSION_RADIUS: Key<f32> = Key::new("minecraft:explosion_radius");
pub const WORLD: Key<World> = Key::new("minecraft:world");
pub const KILLER_ENTITY: Key<Entity> = Key::new("minecraft:killer_entity");
pub const LAST_DAMAGE_PLAYER: Key<Entity> = Key::new("minecraft:last_damage_player");
pub const ORIGIN: Key<Point> = Key::new("minecraft:origin");
pub const THIS_ENTITY: Key<Entity> = Key::new("minecraft:this_entity");
pub const TOOL: Key<ItemStack> = Key::new("minecraft:tool");
pub const VANILLA_INTERFACE: Key<Arc<dyn VanillaInterface>> =
    Key::new("minecraft:vanilla_interface");
pub const REGISTERED_TABLES: Key<TableMap> = Key::new("minecraft:registered_loot_tables");
pub const REGISTERED_CONDITIONS: Key<ConditionMap> =
    Key::new("minecraft:registered_loot_conditions");

/// The keys a table of some type requires, and the ones it may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootContextKeyGroup {
    pub id: &'static str,
    pub expected: &'static [&'static str],
    pub permitted: &'static [&'static str],
}

impl LootContextKeyGroup {
    pub fn verify(&self, context: &LootContext) -> bool {
        self.expected.iter().all(|name| context.contains_name(name))
    }

    pub fn assure_verified(&self, context: &LootContext) -> Result<(), LootError> {
        match self
            .expected
            .iter()
            .copied()
            .find(|name| !context.contains_name(name))
        {
            Some(name) => Err(LootError::UnverifiedContext(name)),
            None => Ok(()),
        }
    }

    /// True when `name` is expected or permitted.
    pub fn permits(&self, name: &str) -> bool {
        self.expected.iter().chain(self.permitted).any(|key| *key == name)
    }

    pub fn by_id(id: &str) -> Option<&'static LootContextKeyGroup> {
        let id = Identifier::parse(id).ok()?.to_string();
        STANDARD_GROUPS.iter().find(|group| group.id == id)
    }

    /// Converts a group to and from its id.
    pub fn field() -> Field<&'static LootContextKeyGroup> {
        FieldTypes::proxied(
            FieldTypes::string(),
            |id: String| LootContextKeyGroup::by_id(&id),
            |group: &&'static LootContextKeyGroup| Some(group.id.to_string()),
        )
    }
}

const fn group(
    id: &'static str,
    expected: &'static [&'static str],
    permitted: &'static [&'static str],
) -> LootContextKeyGroup {
    LootContextKeyGroup {
        id,
        expected,
        permitted,
    }
}

const ORIGIN_NAME: &str = ORIGIN.name();
const THIS_ENTITY_NAME: &str = THIS_ENTITY.name();
const TOOL_NAME: &str = TOOL.name();
const BLOCK_STATE_NAME: &str = BLOCK_STATE.name();
const DAMAGE_SOURCE_NAME: &str = DAMAGE_SOURCE.name();
const KILLER_NAME: &str = KILLER_ENTITY.name();
const DIRECT_KILLER_NAME: &str = DIRECT_KILLER_ENTITY.name();
const LAST_DAMAGE_PLAYER_NAME: &str = LAST_DAMAGE_PLAYER.name();
const EXPLOSION_RADIUS_NAME: &str = EXPLOSION_RADIUS.name();

pub const EMPTY: LootContextKeyGroup = group("minecraft:empty", &[], &[]);
pub const CHEST: LootContextKeyGroup = group("minecraft:chest", &[ORIGIN_NAME], &[THIS_ENTITY_NAME]);
pub const COMMAND: LootContextKeyGroup =
    group("minecraft:command", &[ORIGIN_NAME], &[THIS_ENTITY_NAME]);
pub const SELECTOR: LootContextKeyGroup =
    group("minecraft:selector", &[ORIGIN_NAME], &[THIS_ENTITY_NAME]);
pub const FISHING: LootContextKeyGroup = group(
    "minecraft:fishing",
    &[ORIGIN_NAME, TOOL_NAME],
    &[THIS_ENTITY_NAME],
);
pub const ENTITY: LootContextKeyGroup = group(
    "minecraft:entity",
    &[THIS_ENTITY_NAME, ORIGIN_NAME, DAMAGE_SOURCE_NAME],
    &[KILLER_NAME, DIRECT_KILLER_NAME, LAST_DAMAGE_PLAYER_NAME],
);
pub const ARCHAEOLOGY: LootContextKeyGroup =
    group("minecraft:archaeology", &[ORIGIN_NAME], &[THIS_ENTITY_NAME]);
pub const GIFT: LootContextKeyGroup =
    group("minecraft:gift", &[ORIGIN_NAME, THIS_ENTITY_NAME], &[]);
pub const BARTER: LootContextKeyGroup = group("minecraft:barter", &[THIS_ENTITY_NAME], &[]);
pub const ADVANCEMENT_REWARD: LootContextKeyGroup = group(
    "minecraft:advancement_reward",
    &[THIS_ENTITY_NAME, ORIGIN_NAME],
    &[],
);
pub const ADVANCEMENT_ENTITY: LootContextKeyGroup = group(
    "minecraft:advancement_entity",
    &[THIS_ENTITY_NAME, ORIGIN_NAME],
    &[],
);
pub const ADVANCEMENT_LOCATION: LootContextKeyGroup = group(
    "minecraft:advancement_location",
    &[THIS_ENTITY_NAME, ORIGIN_NAME, TOOL_NAME, BLOCK_STATE_NAME],
    &[],
);
pub const GENERIC: LootContextKeyGroup = group(
    "minecraft:generic",
    &[
        THIS_ENTITY_NAME,
        LAST_DAMAGE_PLAYER_NAME,
        DAMAGE_SOURCE_NAME,
        KILLER_NAME,
        DIRECT_KILLER_NAME,
        ORIGIN_NAME,
        BLOCK_STATE_NAME,
        TOOL_NAME,
        EXPLOSION_RADIUS_NAME,
    ],
    &[],
);
pub const BLOCK: LootContextKeyGroup = group(
    "minecraft:block",
    &[BLOCK_STATE_NAME, ORIGIN_NAME, TOOL_NAME],
    &[THIS_ENTITY_NAME, EXPLOSION_RADIUS_NAME],
);

pub static STANDARD_GROUPS: [LootContextKeyGroup; 14] = [
    EMPTY,
    CHEST,
    COMMAND,
    SELECTOR,
    FISHING,
    ENTITY,
    ARCHAEOLOGY,
    GIFT,
    BARTER,
    ADVANCEMENT_REWARD,
    ADVANCEMENT_ENTITY,
    ADVANCEMENT_LOCATION,
    GENERIC,
    BLOCK,
];
