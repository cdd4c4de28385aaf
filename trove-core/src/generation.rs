use std::{any::Any, fmt, sync::Arc};

use derive_more::{Deref, From, IntoIterator};

use crate::{LootContext, LootError};

/// A single generated item of any type.
#[derive(Clone)]
pub struct Loot {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Loot {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Maps this item if it is a `T`, leaving other types untouched. A mapper
    /// returning `None` removes the item.
    pub fn try_map<T, E>(
        self,
        mapper: impl FnOnce(&T) -> Result<Option<T>, E>,
    ) -> Result<Option<Loot>, E>
    where
        T: Any + Send + Sync,
    {
        match self.downcast_ref::<T>() {
            Some(value) => Ok(mapper(value)?.map(Loot::new)),
            None => Ok(Some(self)),
        }
    }
}

impl fmt::Debug for Loot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loot({})", self.type_name)
    }
}

/// An ordered collection of generated items.
#[derive(Clone, Debug, Default, Deref, From, IntoIterator)]
#[into_iterator(owned, ref)]
pub struct LootBatch {
    pub items: Vec<Loot>,
}

impl LootBatch {
    pub const EMPTY: LootBatch = LootBatch { items: Vec::new() };

    pub fn of(items: impl IntoIterator<Item = Loot>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    /// Maps every item of type `T`. A mapper returning `None` removes the item.
    pub fn modify<T: Any + Send + Sync>(self, mut mapper: impl FnMut(&T) -> Option<T>) -> Self {
        let items = self
            .items
            .into_iter()
            .filter_map(|item| {
                item.try_map::<T, std::convert::Infallible>(|value| Ok(mapper(value)))
                    .unwrap_or_else(|never| match never {})
            })
            .collect();
        Self { items }
    }

    pub fn extend(&mut self, other: LootBatch) {
        self.items.extend(other.items);
    }

    /// Every item of type `T`, skipping the rest.
    pub fn of_type<T: Any>(&self) -> impl Iterator<Item = &T> {
        self.items.iter().filter_map(Loot::downcast_ref)
    }
}

impl FromIterator<Loot> for LootBatch {
    fn from_iter<I: IntoIterator<Item = Loot>>(iter: I) -> Self {
        Self::of(iter)
    }
}

pub trait LootGenerator: Send + Sync {
    fn generate(&self, context: &LootContext) -> Result<LootBatch, LootError>;
}

type Predicate<'a> = Box<dyn Fn(&Loot) -> bool + 'a>;
type Consumer<'a> = Box<dyn Fn(&Loot) + 'a>;

/// Routes generated items to consumers. The first matching entry wins.
pub struct LootProcessor<'a> {
    processors: Vec<(Predicate<'a>, Consumer<'a>)>,
}

impl<'a> LootProcessor<'a> {
    pub fn builder() -> LootProcessorBuilder<'a> {
        LootProcessorBuilder {
            processors: Vec::new(),
        }
    }

    pub fn accept(&self, loot: &Loot) -> Result<(), LootError> {
        let (_, consumer) = self
            .processors
            .iter()
            .find(|(predicate, _)| predicate(loot))
            .ok_or(LootError::Unprocessable(loot.type_name()))?;
        consumer(loot);
        Ok(())
    }

    pub fn accept_batch(&self, batch: &LootBatch) -> Result<(), LootError> {
        batch.iter().try_for_each(|loot| self.accept(loot))
    }

    pub fn generate(
        &self,
        generator: &dyn LootGenerator,
        context: &LootContext,
    ) -> Result<(), LootError> {
        self.accept_batch(&generator.generate(context)?)
    }
}

pub struct LootProcessorBuilder<'a> {
    processors: Vec<(Predicate<'a>, Consumer<'a>)>,
}

impl<'a> LootProcessorBuilder<'a> {
    pub fn process(
        mut self,
        predicate: impl Fn(&Loot) -> bool + 'a,
        consumer: impl Fn(&Loot) + 'a,
    ) -> Self {
        self.processors
            .push((Box::new(predicate), Box::new(consumer)));
        self
    }

    pub fn process_type<T: Any>(self, consumer: impl Fn(&T) + 'a) -> Self {
        self.process(Loot::is::<T>, move |loot| {
            if let Some(value) = loot.downcast_ref::<T>() {
                consumer(value);
            }
        })
    }

    pub fn build(self) -> LootProcessor<'a> {
        LootProcessor {
            processors: self.processors,
        }
    }
}
