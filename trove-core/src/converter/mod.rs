//! Bidirectional conversion between values and `serde_json::Value` trees.
//!
//! A [`TypedConverter`] handles one type. [`Field`]s wrap converters with the
//! metadata needed to place them inside a record, [`Converters::record`] glues
//! fields into a converter for a whole struct, and a [`ConversionManager`]
//! dispatches between the implementations of a trait object on a
//! discriminator key. Everything that needs to convert nested polymorphic
//! values looks the converter up in the [`Trove`] at conversion time.

use serde_json::Value;

use crate::ConversionError;

mod field;
mod field_types;
mod manager;
mod record;
mod trove;

pub use field::Field;
pub use field_types::FieldTypes;
pub use manager::{AsAny, ConversionManager, ConversionManagerBuilder, Polymorphic, Subtype};
pub use record::{Converters, RecordArgs, RecordBuilder, RecordConverter};
pub use trove::{Trove, TroveBuilder};

pub trait TypedConverter<V>: Send + Sync {
    fn serialize(&self, input: &V, trove: &Trove) -> Result<Value, ConversionError>;

    fn deserialize(&self, input: &Value, trove: &Trove) -> Result<V, ConversionError>;
}

/// A converter that may decline to handle a value, returning `None`.
pub trait ConditionalConverter<V>: Send + Sync {
    fn serialize(&self, input: &V, trove: &Trove) -> Result<Option<Value>, ConversionError>;

    fn deserialize(&self, input: &Value, trove: &Trove) -> Result<Option<V>, ConversionError>;
}

type SerializeFn<V, R> = dyn Fn(&V, &Trove) -> Result<R, ConversionError> + Send + Sync;
type DeserializeFn<V> = dyn Fn(&Value, &Trove) -> Result<V, ConversionError> + Send + Sync;

/// A converter assembled from two closures.
pub struct Joined<V> {
    serializer: Box<SerializeFn<V, Value>>,
    deserializer: Box<DeserializeFn<V>>,
}

pub fn join<V>(
    serializer: impl Fn(&V, &Trove) -> Result<Value, ConversionError> + Send + Sync + 'static,
    deserializer: impl Fn(&Value, &Trove) -> Result<V, ConversionError> + Send + Sync + 'static,
) -> Joined<V> {
    Joined {
        serializer: Box::new(serializer),
        deserializer: Box::new(deserializer),
    }
}

impl<V> TypedConverter<V> for Joined<V> {
    fn serialize(&self, input: &V, trove: &Trove) -> Result<Value, ConversionError> {
        (self.serializer)(input, trove)
    }

    fn deserialize(&self, input: &Value, trove: &Trove) -> Result<V, ConversionError> {
        (self.deserializer)(input, trove)
    }
}

/// A conditional converter assembled from two closures.
pub struct JoinedConditional<V> {
    serializer: Box<SerializeFn<V, Option<Value>>>,
    deserializer: Box<DeserializeFn<Option<V>>>,
}

pub fn join_conditional<V>(
    serializer: impl Fn(&V, &Trove) -> Result<Option<Value>, ConversionError> + Send + Sync + 'static,
    deserializer: impl Fn(&Value, &Trove) -> Result<Option<V>, ConversionError> + Send + Sync + 'static,
) -> JoinedConditional<V> {
    JoinedConditional {
        serializer: Box::new(serializer),
        deserializer: Box::new(deserializer),
    }
}

impl<V> ConditionalConverter<V> for JoinedConditional<V> {
    fn serialize(&self, input: &V, trove: &Trove) -> Result<Option<Value>, ConversionError> {
        (self.serializer)(input, trove)
    }

    fn deserialize(&self, input: &Value, trove: &Trove) -> Result<Option<V>, ConversionError> {
        (self.deserializer)(input, trove)
    }
}
