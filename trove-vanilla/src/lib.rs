//! The vanilla loot table format: numbers, conditions, functions, entries,
//! pools and tables, plus loading whole table directories.

use trove_core::{converter::Trove, BuildError};

pub mod check;
pub mod condition;
pub mod entry;
mod error;
pub mod generation;
pub mod keys;
pub mod loader;
pub mod model;
pub mod modifier;
pub mod nbt;
pub mod number;
pub mod types;
pub mod vanilla;

pub use error::TableError;
pub use generation::{LootPool, LootTable};
pub use loader::TableRegistry;

/// A trove that reads every vanilla loot structure.
pub fn standard_trove() -> Result<Trove, BuildError> {
    Trove::builder()
        .add(number::number_manager()?)
        .add(condition::condition_manager()?)
        .add(modifier::modifier_manager()?)
        .add(modifier::formula_manager()?)
        .add(entry::entry_manager()?)
        .add(nbt::nbt_manager()?)
        .add(generation::pool_converter()?)
        .add(generation::table_converter()?)
        .build()
}

#[cfg(test)]
pub(crate) mod test_util {
    use trove_core::{LootContext, LootContextBuilder};
    use trove_util::random::{RandomGenerator, RandomKind};

    /// A context builder with a fixed seed.
    pub fn context() -> LootContextBuilder {
        LootContext::builder(RandomGenerator::from_kind(RandomKind::Xoroshiro, 42))
    }
}
