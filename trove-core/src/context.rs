use std::{
    any::Any,
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::Arc,
};

use parking_lot::{Mutex, MutexGuard};
use trove_util::random::RandomGenerator;

use crate::LootError;

/// A typed name for a value stored in a [`LootContext`].
///
/// Keys compare and hash by name only, so two keys with the same name but
/// different value types refer to the same slot.
pub struct Key<T> {
    name: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _type: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T> Eq for Key<T> {}

impl<T> Hash for Key<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.name)
    }
}

/// The state that loot is generated against.
pub struct LootContext {
    random: Mutex<RandomGenerator>,
    data: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl LootContext {
    pub fn builder(random: RandomGenerator) -> LootContextBuilder {
        LootContextBuilder {
            random,
            data: HashMap::new(),
        }
    }

    /// Locks the generator. Do not hold the guard across calls that roll again.
    pub fn random(&self) -> MutexGuard<'_, RandomGenerator> {
        self.random.lock()
    }

    pub fn with_random<R>(&self, f: impl FnOnce(&mut RandomGenerator) -> R) -> R {
        f(&mut self.random.lock())
    }

    /// True only when the value is present and of the key's type.
    pub fn has<T: Any>(&self, key: Key<T>) -> bool {
        self.get(key).is_some()
    }

    pub fn get<T: Any>(&self, key: Key<T>) -> Option<&T> {
        self.data
            .get(key.name)
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_or<T: Any + Clone>(&self, key: Key<T>, default: T) -> T {
        self.get(key).cloned().unwrap_or(default)
    }

    pub fn assure<T: Any>(&self, key: Key<T>) -> Result<&T, LootError> {
        self.get(key).ok_or(LootError::MissingContextKey(key.name))
    }

    /// Presence of any value under `name`, regardless of its type.
    pub fn contains_name(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.data.keys().copied()
    }
}

impl fmt::Debug for LootContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("LootContext").field("keys", &names).finish()
    }
}

pub struct LootContextBuilder {
    random: RandomGenerator,
    data: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl LootContextBuilder {
    pub fn with<T: Any + Send + Sync>(self, key: Key<T>, value: T) -> Self {
        self.with_shared(key, Arc::new(value))
    }

    pub fn with_shared<T: Any + Send + Sync>(mut self, key: Key<T>, value: Arc<T>) -> Self {
        self.data.insert(key.name, value);
        self
    }

    pub fn with_optional<T: Any + Send + Sync>(self, key: Key<T>, value: Option<T>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    pub fn build(self) -> LootContext {
        LootContext {
            random: Mutex::new(self.random),
            data: self.data,
        }
    }
}

#[cfg(test)]
mod test {
    use trove_util::random::{RandomGenerator, RandomImpl, RandomKind};

    use super::{Key, LootContext};
    use crate::LootError;

    const LUCK: Key<f64> = Key::new("test:luck");
    const LUCK_AS_INT: Key<i32> = Key::new("test:luck");
    const NAME: Key<String> = Key::new("test:name");

    fn context() -> LootContext {
        LootContext::builder(RandomGenerator::from_kind(RandomKind::Legacy, 1))
            .with(LUCK, 1.5)
            .build()
    }

    #[test]
    fn typed_lookups() {
        let context = context();
        assert!(context.has(LUCK));
        assert_eq!(context.get(LUCK), Some(&1.5));
        assert!(!context.has(LUCK_AS_INT));
        assert!(context.contains_name("test:luck"));
        assert_eq!(context.get_or(NAME, "none".to_string()), "none");
    }

    #[test]
    fn assure_names_the_key() {
        let context = context();
        let err = context.assure(NAME).unwrap_err();
        assert!(matches!(err, LootError::MissingContextKey("test:name")));
        assert_eq!(err.to_string(), "No value for key 'test:name'");
    }

    #[test]
    fn keys_compare_by_name() {
        assert_eq!(LUCK, Key::<f64>::new("test:luck"));
        assert_ne!(LUCK, Key::<f64>::new("test:other"));
    }

    #[test]
    fn random_is_shared() {
        let context = context();
        let mut fresh = RandomGenerator::from_kind(RandomKind::Legacy, 1);
        assert_eq!(context.with_random(|r| r.next_i32()), fresh.next_i32());
        assert_eq!(context.random().next_i32(), fresh.next_i32());
    }
}
