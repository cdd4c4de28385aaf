//! The slice of game state that loot tables read and produce.

use std::{collections::BTreeMap, fmt};

use derive_more::Display;
use trove_nbt::{compound::NbtCompound, tag::NbtTag};
use trove_util::Identifier;
use uuid::Uuid;

pub const ENCHANTMENTS: &str = "Enchantments";
pub const STORED_ENCHANTMENTS: &str = "StoredEnchantments";
pub const DAMAGE: &str = "Damage";
pub const POTION: &str = "Potion";
pub const DISPLAY: &str = "display";
pub const NAME: &str = "Name";

#[derive(Debug, Clone, PartialEq)]
pub struct ItemStack {
    pub material: Identifier,
    pub count: i32,
    /// The item's `tag` compound.
    pub nbt: NbtCompound,
}

impl ItemStack {
    pub fn new(material: Identifier, count: i32) -> Self {
        Self {
            material,
            count,
            nbt: NbtCompound::new(),
        }
    }

    pub fn of(material: Identifier) -> Self {
        Self::new(material, 1)
    }

    pub fn air() -> Self {
        Self::new(Identifier::vanilla("air"), 0)
    }

    pub fn is_air(&self) -> bool {
        self.count <= 0 || self.material == Identifier::vanilla("air")
    }

    pub fn with_count(&self, count: i32) -> Self {
        Self {
            count,
            ..self.clone()
        }
    }

    pub fn with_nbt(self, nbt: NbtCompound) -> Self {
        Self { nbt, ..self }
    }

    pub fn enchantments(&self) -> Vec<(Identifier, i32)> {
        read_enchantments(&self.nbt, ENCHANTMENTS)
    }

    pub fn stored_enchantments(&self) -> Vec<(Identifier, i32)> {
        read_enchantments(&self.nbt, STORED_ENCHANTMENTS)
    }

    /// The level of `enchantment` on this item, or 0.
    pub fn enchantment_level(&self, enchantment: &Identifier) -> i32 {
        self.enchantments()
            .into_iter()
            .find(|(id, _)| id == enchantment)
            .map_or(0, |(_, level)| level)
    }

    /// Writes `enchantment` into the list under `list_key`, replacing an
    /// existing level for the same id.
    pub fn put_enchantment(&mut self, list_key: &str, enchantment: &Identifier, level: i32) {
        let mut entries: Vec<NbtTag> = self
            .nbt
            .get_list(list_key)
            .map(<[NbtTag]>::to_vec)
            .unwrap_or_default();
        entries.retain(|entry| {
            entry
                .extract_compound()
                .and_then(|compound| compound.get_string("id"))
                .and_then(|id| Identifier::parse(id).ok())
                .as_ref()
                != Some(enchantment)
        });

        let mut compound = NbtCompound::new();
        compound.put_string("id", enchantment.to_string());
        compound.put_short("lvl", level.clamp(0, i16::MAX as i32) as i16);
        entries.push(NbtTag::Compound(compound));
        self.nbt.insert(list_key, entries);
    }

    pub fn damage(&self) -> i32 {
        self.nbt.get_int(DAMAGE).unwrap_or(0)
    }

    pub fn display_name(&self) -> Option<&String> {
        self.nbt
            .get_compound(DISPLAY)
            .and_then(|display| display.get_string(NAME))
    }

    /// The `{id, Count, tag}` form used for items stored inside other NBT.
    pub fn to_nbt(&self) -> NbtCompound {
        let mut compound = NbtCompound::new();
        compound.put_string("id", self.material.to_string());
        compound.put_byte("Count", self.count.clamp(0, i8::MAX as i32) as i8);
        if !self.nbt.is_empty() {
            compound.put_component("tag", self.nbt.clone());
        }
        compound
    }

    pub fn from_nbt(compound: &NbtCompound) -> Option<Self> {
        let material = Identifier::parse(compound.get_string("id")?).ok()?;
        let count = compound.get_number("Count").map_or(1, |count| count as i32);
        let nbt = compound.get_compound("tag").cloned().unwrap_or_default();
        Some(Self::new(material, count).with_nbt(nbt))
    }
}

impl fmt::Display for ItemStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x {}", self.count, self.material)?;
        if !self.nbt.is_empty() {
            write!(f, " {}", self.nbt)?;
        }
        Ok(())
    }
}

fn read_enchantments(nbt: &NbtCompound, list_key: &str) -> Vec<(Identifier, i32)> {
    nbt.get_list(list_key)
        .unwrap_or_default()
        .iter()
        .filter_map(NbtTag::extract_compound)
        .filter_map(|entry| {
            let id = Identifier::parse(entry.get_string("id")?).ok()?;
            let level = entry.get_number("lvl")? as i32;
            Some((id, level))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: Identifier,
    pub properties: BTreeMap<String, String>,
    pub nbt: Option<NbtCompound>,
}

impl Block {
    pub fn new(id: Identifier) -> Self {
        Self {
            id,
            properties: BTreeMap::new(),
            nbt: None,
        }
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_nbt(self, nbt: NbtCompound) -> Self {
        Self {
            nbt: Some(nbt),
            ..self
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// A block that carries data, together with where it is.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockEntity {
    pub block: Block,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub uuid: Uuid,
    pub entity_type: Identifier,
    pub custom_name: Option<String>,
    pub nbt: NbtCompound,
    pub is_player: bool,
    pub main_hand: Option<ItemStack>,
}

impl Entity {
    pub fn new(entity_type: Identifier) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            is_player: entity_type == Identifier::vanilla("player"),
            entity_type,
            custom_name: None,
            nbt: NbtCompound::new(),
            main_hand: None,
        }
    }

    pub fn with_custom_name(self, name: &str) -> Self {
        Self {
            custom_name: Some(name.to_string()),
            ..self
        }
    }

    pub fn with_main_hand(self, item: ItemStack) -> Self {
        Self {
            main_hand: Some(item),
            ..self
        }
    }

    pub fn with_nbt(self, nbt: NbtCompound) -> Self {
        Self { nbt, ..self }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct World {
    pub dimension: Identifier,
    pub time: i64,
    pub raining: bool,
    pub thundering: bool,
}

impl Default for World {
    fn default() -> Self {
        Self {
            dimension: Identifier::vanilla("overworld"),
            time: 0,
            raining: false,
            thundering: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Display)]
#[display("({x}, {y}, {z})")]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, x: f64, y: f64, z: f64) -> Self {
        Self::new(self.x + x, self.y + y, self.z + z)
    }

    pub fn block_x(&self) -> i32 {
        self.x.floor() as i32
    }

    pub fn block_y(&self) -> i32 {
        self.y.floor() as i32
    }

    pub fn block_z(&self) -> i32 {
        self.z.floor() as i32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DamageSource {
    pub id: Identifier,
}
