//! Pools and tables, the generators loot tables are made of.

use std::sync::Arc;

use trove_core::{
    converter::{Converters, FieldTypes, TypedConverter},
    structure::{self, LootCondition, LootEntry, LootModifier, LootNumber},
    BuildError, LootBatch, LootContext, LootError, LootGenerator,
};

use crate::{
    keys::{self, LootContextKeyGroup, LUCK},
    number::ConstantNumber,
    types::VanillaTypes,
};

/// Rolls its entries a number of times, if its conditions pass.
pub struct LootPool {
    pub rolls: Arc<dyn LootNumber>,
    pub bonus_rolls: Arc<dyn LootNumber>,
    pub entries: Vec<Arc<dyn LootEntry>>,
    pub conditions: Vec<Arc<dyn LootCondition>>,
    pub modifiers: Vec<Arc<dyn LootModifier>>,
}

impl LootPool {
    /// `rolls`, plus `floor(luck * bonus_rolls)` when the context has luck.
    pub fn roll_count(&self, context: &LootContext) -> Result<i64, LootError> {
        let mut rolls = self.rolls.get_long(context)?;
        if let Some(luck) = context.get(LUCK) {
            rolls += (luck * self.bonus_rolls.get_double(context)?).floor() as i64;
        }
        Ok(rolls)
    }
}

impl LootGenerator for LootPool {
    fn generate(&self, context: &LootContext) -> Result<LootBatch, LootError> {
        if !structure::all(&self.conditions, context)? {
            return Ok(LootBatch::EMPTY);
        }

        let rolls = self.roll_count(context)?;
        log::trace!("rolling pool {rolls} times");
        let mut batch = LootBatch::EMPTY;
        for _ in 0..rolls {
            if let Some(choice) = structure::pick_choice(&self.entries, context)? {
                batch.extend(choice.generate(context)?);
            }
        }
        structure::apply_all(&self.modifiers, batch, context)
    }
}

/// A whole loot table. The context must hold every key its group expects.
pub struct LootTable {
    pub group: &'static LootContextKeyGroup,
    pub pools: Vec<LootPool>,
    pub modifiers: Vec<Arc<dyn LootModifier>>,
}

impl LootTable {
    pub const EMPTY: LootTable = LootTable {
        group: &keys::EMPTY,
        pools: Vec::new(),
        modifiers: Vec::new(),
    };
}

impl LootGenerator for LootTable {
    fn generate(&self, context: &LootContext) -> Result<LootBatch, LootError> {
        self.group.assure_verified(context)?;

        let mut batch = LootBatch::EMPTY;
        for pool in &self.pools {
            let generated = pool.generate(context)?;
            batch.extend(structure::apply_all(&self.modifiers, generated, context)?);
        }
        Ok(batch)
    }
}

pub fn pool_converter() -> Result<impl TypedConverter<LootPool>, BuildError> {
    Converters::record::<LootPool>()
        .field(VanillaTypes::number().name("rolls"), |p| &p.rolls)
        .field(
            VanillaTypes::number()
                .name("bonus_rolls")
                .with_default(|| Arc::new(ConstantNumber::new(0.0)) as Arc<dyn LootNumber>),
            |p| &p.bonus_rolls,
        )
        .field(VanillaTypes::entry().list().name("entries"), |p| &p.entries)
        .field(VanillaTypes::conditions(), |p| &p.conditions)
        .field(VanillaTypes::modifiers(), |p| &p.modifiers)
        .build(|args| {
            Ok(LootPool {
                rolls: args.take()?,
                bonus_rolls: args.take()?,
                entries: args.take()?,
                conditions: args.take()?,
                modifiers: args.take()?,
            })
        })
}

/// Tables without a `type` use the empty key group.
pub fn table_converter() -> Result<impl TypedConverter<LootTable>, BuildError> {
    Converters::record::<LootTable>()
        .field(
            LootContextKeyGroup::field()
                .local_name("group")
                .node_path(["type"])
                .fallback(&keys::EMPTY),
            |t| &t.group,
        )
        .field(
            FieldTypes::loot::<LootPool>()
                .list()
                .name("pools")
                .with_default(Vec::new),
            |t| &t.pools,
        )
        .field(VanillaTypes::modifiers(), |t| &t.modifiers)
        .build(|args| {
            Ok(LootTable {
                group: args.take()?,
                pools: args.take()?,
                modifiers: args.take()?,
            })
        })
}
