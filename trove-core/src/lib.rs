//! Loot generation primitives and the converter framework used to read loot
//! definitions out of JSON trees.

pub mod context;
pub mod converter;
mod error;
pub mod generation;
pub mod structure;

pub use context::{Key, LootContext, LootContextBuilder};
pub use error::{BuildError, ConversionError, LootError};
pub use generation::{Loot, LootBatch, LootGenerator, LootProcessor};
