//! Hooks into game behaviour that loot generation needs but does not own.

use std::{collections::HashMap, path::Path};

use serde_json::{Map, Value};
use trove_core::converter::{Field, FieldTypes};
use trove_nbt::{compound::NbtCompound, compress::read_compound_file};
use trove_util::{random::RandomGenerator, Identifier};

use crate::{
    loader::{collect_files, read_dir, relative_key},
    model::{Entity, ItemStack, Point, World},
    nbt::list_to_items,
    TableError,
};

pub trait VanillaInterface: Send + Sync {
    fn is_raining(&self, world: &World) -> bool;

    fn is_thundering(&self, world: &World) -> bool;

    fn get_looting(&self, entity: &Entity) -> i32;

    fn enchant_item(
        &self,
        random: &mut RandomGenerator,
        item: ItemStack,
        levels: i32,
        permit_treasure: bool,
    ) -> ItemStack;

    fn can_apply_enchantment(&self, item: &ItemStack, enchantment: &Identifier) -> bool;

    /// The smelted form of `item`, or `None` when it cannot be smelted.
    fn smelt_item(&self, item: &ItemStack) -> Option<ItemStack>;

    fn get_entity_nbt(&self, entity: &Entity) -> NbtCompound;

    fn get_command_storage_value(&self, key: &Identifier) -> Option<NbtCompound>;

    fn get_dynamic_drops(&self, drop_type: &Identifier, nbt: &NbtCompound) -> Vec<ItemStack>;

    fn max_stack_size(&self, _material: &Identifier) -> i32 {
        64
    }

    fn max_damage(&self, _material: &Identifier) -> i32 {
        0
    }

    fn is_instant_effect(&self, effect: &Identifier) -> bool {
        is_instant_effect(effect)
    }

    /// The materials in an item tag.
    fn item_tag(&self, _tag: &Identifier) -> Vec<Identifier> {
        Vec::new()
    }

    /// Every enchantment that can be picked at random.
    fn enchantments(&self) -> Vec<Identifier> {
        Vec::new()
    }

    fn max_enchantment_level(&self, _enchantment: &Identifier) -> i32 {
        1
    }
}

/// Whether `effect` is one of the vanilla effects that apply at once.
pub fn is_instant_effect(effect: &Identifier) -> bool {
    effect.namespace == "minecraft"
        && matches!(
            effect.path.as_str(),
            "instant_health" | "instant_damage" | "saturation"
        )
}

const TOOL_DURABILITY: [(&str, i32); 6] = [
    ("wooden", 59),
    ("stone", 131),
    ("iron", 250),
    ("golden", 32),
    ("diamond", 1561),
    ("netherite", 2031),
];

const TOOLS: [&str; 5] = ["sword", "shovel", "pickaxe", "axe", "hoe"];

const OTHER_DURABILITY: [(&str, i32); 8] = [
    ("bow", 384),
    ("crossbow", 465),
    ("fishing_rod", 64),
    ("shears", 238),
    ("trident", 250),
    ("flint_and_steel", 64),
    ("shield", 336),
    ("elytra", 432),
];

const STACKS_OF_16: [&str; 5] = ["ender_pearl", "snowball", "egg", "bucket", "honey_bottle"];

const UNSTACKABLE: [&str; 7] = [
    "enchanted_book",
    "potion",
    "splash_potion",
    "lingering_potion",
    "saddle",
    "suspicious_stew",
    "water_bucket",
];

const VANILLA_ENCHANTMENTS: [(&str, i32); 38] = [
    ("protection", 4),
    ("fire_protection", 4),
    ("feather_falling", 4),
    ("blast_protection", 4),
    ("projectile_protection", 4),
    ("respiration", 3),
    ("aqua_affinity", 1),
    ("thorns", 3),
    ("depth_strider", 3),
    ("frost_walker", 2),
    ("binding_curse", 1),
    ("soul_speed", 3),
    ("swift_sneak", 3),
    ("sharpness", 5),
    ("smite", 5),
    ("bane_of_arthropods", 5),
    ("knockback", 2),
    ("fire_aspect", 2),
    ("looting", 3),
    ("sweeping", 3),
    ("efficiency", 5),
    ("silk_touch", 1),
    ("unbreaking", 3),
    ("fortune", 3),
    ("power", 5),
    ("punch", 2),
    ("flame", 1),
    ("infinity", 1),
    ("luck_of_the_sea", 3),
    ("lure", 3),
    ("loyalty", 3),
    ("impaling", 5),
    ("riptide", 3),
    ("channeling", 1),
    ("multishot", 1),
    ("quick_charge", 3),
    ("piercing", 4),
    ("mending", 1),
];

/// Defaults for running outside a game. Weather comes from the world model,
/// nothing smelts or enchants, and command storage comes from files loaded
/// up front.
#[derive(Debug, Default, Clone)]
pub struct FallbackVanillaInterface {
    storage: HashMap<Identifier, NbtCompound>,
}

impl FallbackVanillaInterface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(mut self, key: Identifier, value: NbtCompound) -> Self {
        self.storage.insert(key, value);
        self
    }

    /// Loads every `<namespace>/<path>.dat` file below `dir` as command
    /// storage. A missing directory yields no storage.
    pub fn load_storage(dir: &Path) -> Result<Self, TableError> {
        let mut interface = Self::new();
        if !dir.is_dir() {
            log::debug!("no command storage directory at {}", dir.display());
            return Ok(interface);
        }
        for namespace_entry in read_dir(dir)? {
            let namespace_dir = namespace_entry.path();
            if !namespace_dir.is_dir() {
                continue;
            }
            let Some(namespace) = namespace_dir.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let mut files = Vec::new();
            collect_files(&namespace_dir, "dat", &mut files)?;
            for file in files {
                let key = relative_key(&namespace_dir, &file, namespace)?;
                let compound = read_compound_file(&file).map_err(|source| TableError::Storage {
                    path: file.clone(),
                    source,
                })?;
                log::debug!("loaded command storage {key}");
                interface.storage.insert(key, compound);
            }
        }
        Ok(interface)
    }
}

impl VanillaInterface for FallbackVanillaInterface {
    fn is_raining(&self, world: &World) -> bool {
        world.raining
    }

    fn is_thundering(&self, world: &World) -> bool {
        world.thundering
    }

    fn get_looting(&self, entity: &Entity) -> i32 {
        entity.main_hand.as_ref().map_or(0, |item| {
            item.enchantment_level(&Identifier::vanilla("looting"))
        })
    }

    fn enchant_item(
        &self,
        _random: &mut RandomGenerator,
        item: ItemStack,
        _levels: i32,
        _permit_treasure: bool,
    ) -> ItemStack {
        item
    }

    fn can_apply_enchantment(&self, _item: &ItemStack, _enchantment: &Identifier) -> bool {
        true
    }

    fn smelt_item(&self, item: &ItemStack) -> Option<ItemStack> {
        Some(item.clone())
    }

    fn get_entity_nbt(&self, entity: &Entity) -> NbtCompound {
        entity.nbt.clone()
    }

    fn get_command_storage_value(&self, key: &Identifier) -> Option<NbtCompound> {
        self.storage.get(key).cloned()
    }

    fn get_dynamic_drops(&self, drop_type: &Identifier, nbt: &NbtCompound) -> Vec<ItemStack> {
        if *drop_type == Identifier::vanilla("contents") {
            return nbt.get_list("Items").map(list_to_items).unwrap_or_default();
        }
        Vec::new()
    }

    fn max_stack_size(&self, material: &Identifier) -> i32 {
        if self.max_damage(material) > 0 || UNSTACKABLE.contains(&material.path.as_str()) {
            1
        } else if STACKS_OF_16.contains(&material.path.as_str()) {
            16
        } else {
            64
        }
    }

    fn max_damage(&self, material: &Identifier) -> i32 {
        if material.namespace != "minecraft" {
            return 0;
        }
        let path = material.path.as_str();
        if let Some((_, durability)) = OTHER_DURABILITY.iter().find(|(name, _)| *name == path) {
            return *durability;
        }
        path.split_once('_')
            .filter(|(_, tool)| TOOLS.contains(tool))
            .and_then(|(tier, _)| TOOL_DURABILITY.iter().find(|(name, _)| *name == tier))
            .map_or(0, |(_, durability)| *durability)
    }

    fn enchantments(&self) -> Vec<Identifier> {
        VANILLA_ENCHANTMENTS
            .iter()
            .map(|(path, _)| Identifier::vanilla(path))
            .collect()
    }

    fn max_enchantment_level(&self, enchantment: &Identifier) -> i32 {
        VANILLA_ENCHANTMENTS
            .iter()
            .find(|(path, _)| enchantment.namespace == "minecraft" && enchantment.path == *path)
            .map_or(1, |(_, level)| *level)
    }
}

/// A location test that needs world data this crate does not model. It never
/// passes and keeps no configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocationPredicate;

/// An entity test that needs world data this crate does not model. It never
/// passes and keeps no configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityPredicate;

impl LocationPredicate {
    pub fn test(&self, _world: &World, _location: &Point) -> bool {
        false
    }

    pub fn field() -> Field<LocationPredicate> {
        opaque_field(LocationPredicate)
    }
}

impl EntityPredicate {
    pub fn test(&self, _world: &World, _entity: Option<&Entity>) -> bool {
        false
    }

    pub fn field() -> Field<EntityPredicate> {
        opaque_field(EntityPredicate)
    }
}

fn opaque_field<T: Copy + Send + Sync + 'static>(value: T) -> Field<T> {
    FieldTypes::join(
        |_, _| Ok(Value::Object(Map::new())),
        move |_, _| Ok(value),
    )
}
