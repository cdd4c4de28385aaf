use std::sync::Arc;

use trove_core::{
    converter::{AsAny, ConversionManager, Converters, FieldTypes, TypedConverter},
    structure::{LootCondition, LootModifier, LootNumber},
    BuildError, Loot, LootContext, LootError,
};
use trove_util::{
    random::{RandomGenerator, RandomImpl},
    Identifier,
};

use super::{can_apply_count, max_stack_size, modify_item};
use crate::{
    keys::{EXPLOSION_RADIUS, KILLER_ENTITY, TOOL, VANILLA_INTERFACE},
    number::LootNumberRange,
    types::VanillaTypes,
};

/// How [`ApplyBonus`] turns a count and an enchantment level into a new count.
pub trait BonusFormula: AsAny + Send + Sync {
    fn calculate(&self, random: &mut RandomGenerator, count: i32, level: i32) -> i32;
}

/// One extra item per success out of `level + extra` trials.
pub struct BinomialWithBonusCount {
    pub extra: i32,
    pub probability: f32,
}

impl BonusFormula for BinomialWithBonusCount {
    fn calculate(&self, random: &mut RandomGenerator, count: i32, level: i32) -> i32 {
        let trials = level + self.extra;
        let successes = (0..trials)
            .filter(|_| random.next_f64() < f64::from(self.probability))
            .count();
        count + successes as i32
    }
}

/// Adds up to `bonus_multiplier * level` items.
pub struct UniformBonusCount {
    pub bonus_multiplier: i32,
}

impl BonusFormula for UniformBonusCount {
    fn calculate(&self, random: &mut RandomGenerator, count: i32, level: i32) -> i32 {
        let bound = (1 + self.bonus_multiplier * level).max(1);
        count + random.next_bounded_i32(bound)
    }
}

/// Multiplies the count by a random factor of up to `level + 1`.
pub struct OreDrops;

impl BonusFormula for OreDrops {
    fn calculate(&self, random: &mut RandomGenerator, count: i32, level: i32) -> i32 {
        if level <= 0 {
            return count;
        }
        let multiplier = random.next_bounded_i32(level + 2).max(1);
        count * multiplier
    }
}

trove_core::subtypes!(BonusFormula => BinomialWithBonusCount, UniformBonusCount, OreDrops);

/// Bonus formulas keyed by `formula`, with their settings under `parameters`.
pub fn formula_manager() -> Result<ConversionManager<Arc<dyn BonusFormula>>, BuildError> {
    let binomial = Converters::record::<BinomialWithBonusCount>()
        .field(
            FieldTypes::i32().local_name("extra").node_path(["parameters", "extra"]),
            |f| &f.extra,
        )
        .field(
            FieldTypes::f32()
                .local_name("probability")
                .node_path(["parameters", "probability"]),
            |f| &f.probability,
        )
        .build(|args| {
            Ok(BinomialWithBonusCount {
                extra: args.take()?,
                probability: args.take()?,
            })
        })?;
    let uniform = Converters::record::<UniformBonusCount>()
        .field(
            FieldTypes::i32()
                .local_name("bonus_multiplier")
                .node_path(["parameters", "bonusMultiplier"]),
            |f| &f.bonus_multiplier,
        )
        .build(|args| {
            Ok(UniformBonusCount {
                bonus_multiplier: args.take()?,
            })
        })?;
    let ore_drops = Converters::record::<OreDrops>().build(|_| Ok(OreDrops))?;

    ConversionManager::builder()
        .key_location("formula")
        .add::<BinomialWithBonusCount>("minecraft:binomial_with_bonus_count", binomial)
        .add::<UniformBonusCount>("minecraft:uniform_bonus_count", uniform)
        .add::<OreDrops>("minecraft:ore_drops", ore_drops)
        .build()
}

/// Changes the count by a formula fed with the tool's level of `enchantment`.
/// Nothing happens without a tool.
pub struct ApplyBonus {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub enchantment: Identifier,
    pub formula: Arc<dyn BonusFormula>,
}

impl LootModifier for ApplyBonus {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            let Some(tool) = context.get(TOOL) else {
                return Ok(Some(item.clone()));
            };
            let level = tool.enchantment_level(&self.enchantment);
            let count =
                context.with_random(|random| self.formula.calculate(random, item.count, level));
            Ok(Some(item.with_count(count)))
        })
    }
}

/// Each item survives with a chance of `1 / radius`.
pub struct ExplosionDecay {
    pub conditions: Vec<Arc<dyn LootCondition>>,
}

impl LootModifier for ExplosionDecay {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            let Some(radius) = context.get(EXPLOSION_RADIUS) else {
                return Ok(Some(item.clone()));
            };
            let chance = 1.0 / f64::from(*radius);
            let survivors = context.with_random(|random| {
                (0..item.count).filter(|_| random.next_f64() <= chance).count()
            });
            Ok(Some(item.with_count(survivors as i32)))
        })
    }
}

/// Clamps the count into `limit`. A clamped count that does not fit in a
/// stack removes the item.
pub struct LimitCount {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub limit: LootNumberRange,
}

impl LootModifier for LimitCount {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            let limited = self.limit.limit_long(context, i64::from(item.count))?;
            let limited = limited.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
            if limited == item.count {
                return Ok(Some(item.clone()));
            }
            if can_apply_count(context, item, limited) {
                Ok(Some(item.with_count(limited)))
            } else {
                Ok(None)
            }
        })
    }
}

/// Adds `round(looting * count)` items for the killer's looting level, capped
/// by `limit` when it is not zero and by the stack size.
pub struct LootingEnchant {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub count: Arc<dyn LootNumber>,
    pub limit: i32,
}

impl LootModifier for LootingEnchant {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        let Some(killer) = context.get(KILLER_ENTITY) else {
            return Ok(Some(input));
        };
        modify_item(input, &self.conditions, context, |item| {
            let looting = context.assure(VANILLA_INTERFACE)?.get_looting(killer);
            if looting == 0 {
                return Ok(Some(item.clone()));
            }
            let extra = (f64::from(looting) * self.count.get_double(context)?).round() as i32;
            let mut size_limit = max_stack_size(context, item);
            if self.limit != 0 && self.limit < size_limit {
                size_limit = self.limit;
            }
            let count = (item.count + extra).min(size_limit);
            if can_apply_count(context, item, count) {
                Ok(Some(item.with_count(count)))
            } else {
                Ok(Some(item.clone()))
            }
        })
    }
}

/// Sets the count, or adds to it when `add` is set. Counts that do not fit are
/// clamped into the stack size.
pub struct SetCount {
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub count: Arc<dyn LootNumber>,
    pub add: bool,
}

impl LootModifier for SetCount {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError> {
        modify_item(input, &self.conditions, context, |item| {
            let base = if self.add { i64::from(item.count) } else { 0 };
            let requested = base + self.count.get_long(context)?;
            let max = max_stack_size(context, item);
            let count = requested.clamp(0, i64::from(max.max(0))) as i32;
            if !can_apply_count(context, item, count) {
                return Ok(None);
            }
            Ok(Some(item.with_count(count)))
        })
    }
}

trove_core::subtypes!(LootModifier => ApplyBonus, ExplosionDecay, LimitCount, LootingEnchant, SetCount);

pub(super) fn apply_bonus() -> Result<impl TypedConverter<ApplyBonus>, BuildError> {
    Converters::record::<ApplyBonus>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(VanillaTypes::identifier().name("enchantment"), |m| &m.enchantment)
        .field(
            FieldTypes::loot::<Arc<dyn BonusFormula>>()
                .local_name("formula")
                .node_path(Vec::<String>::new()),
            |m| &m.formula,
        )
        .build(|args| {
            Ok(ApplyBonus {
                conditions: args.take()?,
                enchantment: args.take()?,
                formula: args.take()?,
            })
        })
}

pub(super) fn explosion_decay() -> Result<impl TypedConverter<ExplosionDecay>, BuildError> {
    Converters::record::<ExplosionDecay>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .build(|args| {
            Ok(ExplosionDecay {
                conditions: args.take()?,
            })
        })
}

pub(super) fn limit_count() -> Result<impl TypedConverter<LimitCount>, BuildError> {
    Converters::record::<LimitCount>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(LootNumberRange::field().name("limit"), |m| &m.limit)
        .build(|args| {
            Ok(LimitCount {
                conditions: args.take()?,
                limit: args.take()?,
            })
        })
}

pub(super) fn looting_enchant() -> Result<impl TypedConverter<LootingEnchant>, BuildError> {
    Converters::record::<LootingEnchant>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(VanillaTypes::number().name("count"), |m| &m.count)
        .field(FieldTypes::i32().name("limit").fallback(0), |m| &m.limit)
        .build(|args| {
            Ok(LootingEnchant {
                conditions: args.take()?,
                count: args.take()?,
                limit: args.take()?,
            })
        })
}

pub(super) fn set_count() -> Result<impl TypedConverter<SetCount>, BuildError> {
    Converters::record::<SetCount>()
        .field(VanillaTypes::conditions(), |m| &m.conditions)
        .field(VanillaTypes::number().name("count"), |m| &m.count)
        .field(FieldTypes::bool().name("add").fallback(false), |m| &m.add)
        .build(|args| {
            Ok(SetCount {
                conditions: args.take()?,
                count: args.take()?,
                add: args.take()?,
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
        keys::{EXPLOSION_RADIUS, KILLER_ENTITY, TOOL, VANILLA_INTERFACE},
        model::{Entity, ItemStack, ENCHANTMENTS},
        standard_trove,
        test_util::context,
        vanilla::{FallbackVanillaInterface, VanillaInterface},
    };

    fn modifier(node: Value) -> Arc<dyn LootModifier> {
        standard_trove().unwrap().deserialize(&node).unwrap()
    }

    fn apply(modifier: &Arc<dyn LootModifier>, item: ItemStack, context: &LootContext) -> Option<ItemStack> {
        modifier
            .modify(Loot::new(item), context)
            .unwrap()
            .map(|loot| loot.downcast_ref::<ItemStack>().unwrap().clone())
    }

    fn stone(count: i32) -> ItemStack {
        ItemStack::new(Identifier::vanilla("stone"), count)
    }

    fn enchanted_tool(enchantment: &str, level: i32) -> ItemStack {
        let mut tool = ItemStack::of(Identifier::vanilla("iron_pickaxe"));
        tool.put_enchantment(ENCHANTMENTS, &Identifier::vanilla(enchantment), level);
        tool
    }

    #[test]
    fn set_count_clamps() {
        let context = context().build();
        let set = modifier(json!({"function": "minecraft:set_count", "count": 3}));
        assert_eq!(apply(&set, stone(10), &context), Some(stone(3)));

        let add = modifier(json!({"function": "minecraft:set_count", "count": 60, "add": true}));
        assert_eq!(apply(&add, stone(10), &context), Some(stone(64)));

        let negative = modifier(json!({"function": "minecraft:set_count", "count": -5}));
        assert_eq!(apply(&negative, stone(10), &context), Some(stone(0)));
    }

    #[test]
    fn limit_count_bounds() {
        let context = context().build();
        let limit = modifier(json!({"function": "minecraft:limit_count", "limit": {"min": 2, "max": 4}}));
        assert_eq!(apply(&limit, stone(1), &context), Some(stone(2)));
        assert_eq!(apply(&limit, stone(3), &context), Some(stone(3)));
        assert_eq!(apply(&limit, stone(9), &context), Some(stone(4)));

        let too_many = modifier(json!({"function": "minecraft:limit_count", "limit": {"min": 100}}));
        assert_eq!(apply(&too_many, stone(1), &context), None);
    }

    #[test]
    fn apply_bonus_formulas() {
        let trove = standard_trove().unwrap();
        let node = json!({
            "function": "minecraft:apply_bonus",
            "enchantment": "minecraft:fortune",
            "formula": "minecraft:binomial_with_bonus_count",
            "parameters": {"extra": 2, "probability": 1.0}
        });
        let binomial: Arc<dyn LootModifier> = trove.deserialize(&node).unwrap();
        let with_tool = context().with(TOOL, enchanted_tool("fortune", 1)).build();
        assert_eq!(apply(&binomial, stone(1), &with_tool), Some(stone(4)));
        assert_eq!(apply(&binomial, stone(1), &context().build()), Some(stone(1)));

        let written = trove.serialize(&binomial).unwrap();
        assert_eq!(written["formula"], "minecraft:binomial_with_bonus_count");
        assert_eq!(written["parameters"]["extra"], 2);

        let ore = modifier(json!({
            "function": "minecraft:apply_bonus",
            "enchantment": "minecraft:fortune",
            "formula": "minecraft:ore_drops"
        }));
        let with_fortune = context().with(TOOL, enchanted_tool("fortune", 3)).build();
        for _ in 0..50 {
            let count = apply(&ore, stone(2), &with_fortune).unwrap().count;
            assert!((2..=8).contains(&count) && count % 2 == 0);
        }

        let uniform = modifier(json!({
            "function": "minecraft:apply_bonus",
            "enchantment": "minecraft:fortune",
            "formula": "minecraft:uniform_bonus_count",
            "parameters": {"bonusMultiplier": 1}
        }));
        for _ in 0..50 {
            let count = apply(&uniform, stone(1), &with_fortune).unwrap().count;
            assert!((1..=4).contains(&count));
        }
    }

    #[test]
    fn explosion_decay_needs_radius() {
        let decay = modifier(json!({"function": "minecraft:explosion_decay"}));
        assert_eq!(apply(&decay, stone(5), &context().build()), Some(stone(5)));

        let tiny = context().with(EXPLOSION_RADIUS, 1.0).build();
        assert_eq!(apply(&decay, stone(5), &tiny), Some(stone(5)));

        let huge = context().with(EXPLOSION_RADIUS, f32::INFINITY).build();
        assert_eq!(apply(&decay, stone(5), &huge).unwrap().count, 0);
    }

    #[test]
    fn looting_adds_items() {
        let looting = modifier(json!({
            "function": "minecraft:looting_enchant",
            "count": 1,
            "limit": 5
        }));
        assert_eq!(apply(&looting, stone(1), &context().build()), Some(stone(1)));

        let vanilla: Arc<dyn VanillaInterface> = Arc::new(FallbackVanillaInterface::new());
        let killer = Entity::new(Identifier::vanilla("player"))
            .with_main_hand(enchanted_tool("looting", 3));
        let context = context()
            .with(VANILLA_INTERFACE, vanilla)
            .with(KILLER_ENTITY, killer)
            .build();
        assert_eq!(apply(&looting, stone(1), &context), Some(stone(4)));
        assert_eq!(apply(&looting, stone(4), &context), Some(stone(5)));
    }
}
