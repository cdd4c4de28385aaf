use std::{collections::HashMap, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::{join, Field, Trove, TypedConverter};
use crate::ConversionError;

/// Constructors for commonly used fields.
pub struct FieldTypes;

impl FieldTypes {
    /// A field converted through the type's own serde implementation.
    pub fn implicit<T>() -> Field<T>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        Field::new(join(
            |input: &T, _| Ok(serde_json::to_value(input)?),
            |input, _| match input {
                Value::Null => Err(ConversionError::MissingValue(std::any::type_name::<T>())),
                node => Ok(T::deserialize(node)?),
            },
        ))
    }

    pub fn string() -> Field<String> {
        Self::implicit()
    }

    pub fn bool() -> Field<bool> {
        Self::implicit()
    }

    pub fn f64() -> Field<f64> {
        Self::implicit()
    }

    pub fn f32() -> Field<f32> {
        Self::implicit()
    }

    /// Accepts integral floats such as `1.0`, which hand-written tables often contain.
    pub fn i64() -> Field<i64> {
        Field::new(join(
            |input: &i64, _| Ok(Value::from(*input)),
            |input, _| {
                input
                    .as_i64()
                    .or_else(|| input.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64))
                    .ok_or(ConversionError::MissingValue("i64"))
            },
        ))
    }

    pub fn i32() -> Field<i32> {
        Self::i64().map(|value| i32::try_from(value).ok(), |value| Some(i64::from(*value)))
    }

    /// Converts `N` through the representation `P` that `original` understands.
    pub fn proxied<P: 'static, N: 'static>(
        original: impl TypedConverter<P> + 'static,
        to_new: impl Fn(P) -> Option<N> + Send + Sync + 'static,
        from_new: impl Fn(&N) -> Option<P> + Send + Sync + 'static,
    ) -> Field<N> {
        Field::new(original).map(to_new, from_new)
    }

    /// A closed set of values, each written as the name `namer` gives it.
    pub fn enumerated<T>(
        values: impl IntoIterator<Item = T>,
        namer: impl Fn(&T) -> String + Send + Sync + 'static,
    ) -> Field<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mappings: HashMap<String, T> = values
            .into_iter()
            .map(|value| (namer(&value), value))
            .collect();
        Self::proxied(
            Self::string(),
            move |name| mappings.get(&name).cloned(),
            move |value| Some(namer(value)),
        )
    }

    pub fn join<T: 'static>(
        serializer: impl Fn(&T, &Trove) -> Result<Value, ConversionError> + Send + Sync + 'static,
        deserializer: impl Fn(&Value, &Trove) -> Result<T, ConversionError> + Send + Sync + 'static,
    ) -> Field<T> {
        Field::new(join(serializer, deserializer))
    }

    /// A field that looks up the converter for `T` in the trove when converting.
    pub fn loot<T: 'static>() -> Field<T> {
        Self::join(
            |input: &T, trove| trove.require_converter::<T>()?.serialize(input, trove),
            |input, trove| trove.require_converter::<T>()?.deserialize(input, trove),
        )
    }

    /// A field backed by an already built converter.
    pub fn shared<T: 'static>(converter: Arc<dyn TypedConverter<T>>) -> Field<T> {
        Field::from_shared(converter)
    }

    pub fn require<T>(value: Option<T>, what: &'static str) -> Result<T, ConversionError> {
        value.ok_or(ConversionError::MissingValue(what))
    }
}
