//! The trait objects loot tables are assembled from.

use std::sync::Arc;

use trove_util::random::RandomImpl;

use crate::{
    converter::AsAny,
    generation::{Loot, LootBatch, LootGenerator},
    LootContext, LootError,
};

/// A predicate over the context.
pub trait LootCondition: AsAny + Send + Sync {
    fn verify(&self, context: &LootContext) -> Result<bool, LootError>;
}

/// True when every condition passes. An empty list passes.
pub fn all(conditions: &[Arc<dyn LootCondition>], context: &LootContext) -> Result<bool, LootError> {
    for condition in conditions {
        if !condition.verify(context)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// True when any condition passes. An empty list fails.
pub fn any(conditions: &[Arc<dyn LootCondition>], context: &LootContext) -> Result<bool, LootError> {
    for condition in conditions {
        if condition.verify(context)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// True once `required` conditions have passed.
pub fn some(
    conditions: &[Arc<dyn LootCondition>],
    required: usize,
    context: &LootContext,
) -> Result<bool, LootError> {
    if required == 0 {
        return Ok(true);
    }
    let mut passed = 0;
    for condition in conditions {
        if condition.verify(context)? {
            passed += 1;
            if passed >= required {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Transforms a single item. Returning `None` removes it.
pub trait LootModifier: AsAny + Send + Sync {
    fn modify(&self, input: Loot, context: &LootContext) -> Result<Option<Loot>, LootError>;
}

pub fn apply(
    modifiers: &[Arc<dyn LootModifier>],
    input: Loot,
    context: &LootContext,
) -> Result<Option<Loot>, LootError> {
    let mut current = input;
    for modifier in modifiers {
        match modifier.modify(current, context)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

pub fn apply_all(
    modifiers: &[Arc<dyn LootModifier>],
    batch: LootBatch,
    context: &LootContext,
) -> Result<LootBatch, LootError> {
    if modifiers.is_empty() {
        return Ok(batch);
    }
    let mut items = Vec::with_capacity(batch.len());
    for item in batch {
        if let Some(item) = apply(modifiers, item, context)? {
            items.push(item);
        }
    }
    Ok(LootBatch { items })
}

/// A number computed from the context.
pub trait LootNumber: AsAny + Send + Sync {
    fn get_long(&self, context: &LootContext) -> Result<i64, LootError>;

    fn get_double(&self, context: &LootContext) -> Result<f64, LootError>;
}

/// Something that can be picked by a pool.
pub trait LootEntry: AsAny + Send + Sync {
    /// The choices this entry currently offers.
    fn request_choices(
        self: Arc<Self>,
        context: &LootContext,
    ) -> Result<Vec<Arc<dyn LootChoice>>, LootError>;
}

/// One weighted option offered by an entry.
pub trait LootChoice: LootGenerator {
    fn weight(&self, context: &LootContext) -> Result<i64, LootError>;
}

/// The weight of a standard choice: `max(1, floor(weight + quality * luck))`.
pub fn standard_weight(weight: i64, quality: i64, luck: f64) -> i64 {
    ((weight as f64 + quality as f64 * luck).floor() as i64).max(1)
}

/// Offers `entry` itself as the only choice when all `conditions` pass.
pub fn single_choice<E: LootChoice + 'static>(
    entry: Arc<E>,
    conditions: &[Arc<dyn LootCondition>],
    context: &LootContext,
) -> Result<Vec<Arc<dyn LootChoice>>, LootError> {
    if all(conditions, context)? {
        Ok(vec![entry as Arc<dyn LootChoice>])
    } else {
        Ok(Vec::new())
    }
}

/// Picks one choice out of all the entries' choices, weighted by
/// `max(1, weight)`. The total weight saturates at `i64::MAX`.
pub fn pick_choice(
    entries: &[Arc<dyn LootEntry>],
    context: &LootContext,
) -> Result<Option<Arc<dyn LootChoice>>, LootError> {
    let mut choices = Vec::new();
    for entry in entries {
        choices.extend(entry.clone().request_choices(context)?);
    }
    if choices.is_empty() {
        return Ok(None);
    }

    let mut milestones = Vec::with_capacity(choices.len());
    let mut total = 0i64;
    for choice in &choices {
        total = total.saturating_add(choice.weight(context)?.max(1));
        milestones.push(total);
    }

    let value = context.with_random(|random| random.next_bounded_i64(total));
    let index = milestones
        .iter()
        .position(|milestone| value < *milestone)
        .unwrap_or(choices.len() - 1);
    log::trace!("picked choice {index} of {} ({value}/{total})", choices.len());
    Ok(choices.into_iter().nth(index))
}
