use std::{
    any::{Any, TypeId},
    collections::HashMap,
    marker::PhantomData,
    sync::Arc,
};

use serde_json::Value;

use super::{ConditionalConverter, Trove, TypedConverter};
use crate::{BuildError, ConversionError};

/// Object-safe access to the concrete type behind a trait object.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;

    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A value whose concrete type can be recovered at runtime.
pub trait Polymorphic {
    fn concrete_type(&self) -> TypeId;

    fn concrete_type_name(&self) -> &'static str;
}

impl<T: ?Sized + AsAny> Polymorphic for Arc<T> {
    fn concrete_type(&self) -> TypeId {
        (**self).as_any().type_id()
    }

    fn concrete_type_name(&self) -> &'static str {
        (**self).type_name()
    }
}

/// A concrete type that can stand in for the base type `B`.
pub trait Subtype<B>: Sized + 'static {
    fn upcast(self) -> B;

    fn downcast(base: &B) -> Option<&Self>;
}

/// Implements [`Subtype`] for each listed type against `Arc<dyn Base>`.
#[macro_export]
macro_rules! subtypes {
    ($base:path => $($subtype:ty),+ $(,)?) => {
        $(
            impl $crate::converter::Subtype<::std::sync::Arc<dyn $base>> for $subtype {
                fn upcast(self) -> ::std::sync::Arc<dyn $base> {
                    ::std::sync::Arc::new(self)
                }

                fn downcast(base: &::std::sync::Arc<dyn $base>) -> Option<&Self> {
                    $crate::converter::AsAny::as_any(&**base).downcast_ref::<Self>()
                }
            }
        )+
    };
}

struct SubtypeConverter<S, B> {
    inner: Arc<dyn TypedConverter<S>>,
    _base: PhantomData<fn() -> B>,
}

impl<S: Subtype<B>, B: Polymorphic + 'static> TypedConverter<B> for SubtypeConverter<S, B> {
    fn serialize(&self, input: &B, trove: &Trove) -> Result<Value, ConversionError> {
        let concrete = S::downcast(input)
            .ok_or(ConversionError::UnregisteredType(input.concrete_type_name()))?;
        self.inner.serialize(concrete, trove)
    }

    fn deserialize(&self, input: &Value, trove: &Trove) -> Result<B, ConversionError> {
        self.inner.deserialize(input, trove).map(S::upcast)
    }
}

/// Converts a polymorphic base type by dispatching on a discriminator key.
///
/// Initial converters get the first chance at every value and node, which is
/// how shorthand forms (a bare number for a constant provider) are handled.
pub struct ConversionManager<B> {
    key_location: String,
    initial: Vec<Box<dyn ConditionalConverter<B>>>,
    key_to_converter: HashMap<String, Box<dyn TypedConverter<B>>>,
    type_to_key: HashMap<TypeId, String>,
}

impl<B: Polymorphic + 'static> ConversionManager<B> {
    pub fn builder() -> ConversionManagerBuilder<B> {
        ConversionManagerBuilder {
            key_location: None,
            initial: Vec::new(),
            key_to_converter: HashMap::new(),
            type_to_key: HashMap::new(),
            error: None,
        }
    }

    pub fn key_location(&self) -> &str {
        &self.key_location
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.key_to_converter.keys().map(String::as_str)
    }
}

impl<B: Polymorphic + 'static> TypedConverter<B> for ConversionManager<B> {
    fn serialize(&self, input: &B, trove: &Trove) -> Result<Value, ConversionError> {
        for conditional in &self.initial {
            if let Some(node) = conditional.serialize(input, trove)? {
                return Ok(node);
            }
        }

        let key = self
            .type_to_key
            .get(&input.concrete_type())
            .ok_or(ConversionError::UnregisteredType(input.concrete_type_name()))?;
        let converter = self
            .key_to_converter
            .get(key)
            .ok_or_else(|| ConversionError::UnknownKey(key.clone()))?;

        match converter.serialize(input, trove)? {
            Value::Object(mut map) => {
                map.insert(self.key_location.clone(), Value::String(key.clone()));
                Ok(Value::Object(map))
            }
            _ => Err(ConversionError::Custom(format!(
                "Converter '{key}' did not produce an object"
            ))),
        }
    }

    fn deserialize(&self, input: &Value, trove: &Trove) -> Result<B, ConversionError> {
        for conditional in &self.initial {
            if let Some(value) = conditional.deserialize(input, trove)? {
                return Ok(value);
            }
        }

        let key = input
            .get(&self.key_location)
            .and_then(Value::as_str)
            .ok_or_else(|| ConversionError::MissingKey(self.key_location.clone()))?;
        let converter = self
            .key_to_converter
            .get(key)
            .ok_or_else(|| ConversionError::UnknownKey(key.to_string()))?;
        converter.deserialize(input, trove)
    }
}

pub struct ConversionManagerBuilder<B> {
    key_location: Option<String>,
    initial: Vec<Box<dyn ConditionalConverter<B>>>,
    key_to_converter: HashMap<String, Box<dyn TypedConverter<B>>>,
    type_to_key: HashMap<TypeId, String>,
    error: Option<BuildError>,
}

impl<B: Polymorphic + 'static> ConversionManagerBuilder<B> {
    pub fn key_location(mut self, key_location: &str) -> Self {
        self.key_location = Some(key_location.to_string());
        self
    }

    /// Adds a converter that runs before any keyed converter.
    pub fn add_initial(mut self, converter: impl ConditionalConverter<B> + 'static) -> Self {
        self.initial.push(Box::new(converter));
        self
    }

    /// Registers the converter of the subtype `S` under `key`.
    pub fn add<S: Subtype<B>>(
        mut self,
        key: &str,
        converter: impl TypedConverter<S> + 'static,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.key_to_converter.contains_key(key) {
            self.error = Some(BuildError::DuplicateKey(key.to_string()));
            return self;
        }
        if self.type_to_key.contains_key(&TypeId::of::<S>()) {
            self.error = Some(BuildError::DuplicateType {
                key: key.to_string(),
                type_name: std::any::type_name::<S>(),
            });
            return self;
        }

        self.type_to_key.insert(TypeId::of::<S>(), key.to_string());
        self.key_to_converter.insert(
            key.to_string(),
            Box::new(SubtypeConverter::<S, B> {
                inner: Arc::new(converter),
                _base: PhantomData,
            }),
        );
        self
    }

    pub fn build(self) -> Result<ConversionManager<B>, BuildError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let key_location = self.key_location.ok_or(BuildError::MissingKeyLocation)?;
        log::trace!(
            "built conversion manager for '{}' with {} keys",
            std::any::type_name::<B>(),
            self.key_to_converter.len()
        );
        Ok(ConversionManager {
            key_location,
            initial: self.initial,
            key_to_converter: self.key_to_converter,
            type_to_key: self.type_to_key,
        })
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::{AsAny, ConversionManager};
    use crate::converter::{join_conditional, Converters, FieldTypes, Trove, TypedConverter};
    use crate::{BuildError, ConversionError};

    trait Shape: AsAny + Send + Sync + std::fmt::Debug {
        fn area(&self) -> f64;
    }

    #[derive(Debug)]
    struct Square {
        side: f64,
    }

    #[derive(Debug)]
    struct Circle {
        radius: f64,
    }

    #[derive(Debug)]
    struct Point;

    impl Shape for Square {
        fn area(&self) -> f64 {
            self.side * self.side
        }
    }

    impl Shape for Circle {
        fn area(&self) -> f64 {
            std::f64::consts::PI * self.radius * self.radius
        }
    }

    impl Shape for Point {
        fn area(&self) -> f64 {
            0.0
        }
    }

    crate::subtypes!(Shape => Square, Circle, Point);

    fn square() -> impl TypedConverter<Square> {
        Converters::record::<Square>()
            .field(FieldTypes::f64().name("side"), |s| &s.side)
            .build(|args| Ok(Square { side: args.take()? }))
            .unwrap()
    }

    fn circle() -> impl TypedConverter<Circle> {
        Converters::record::<Circle>()
            .field(FieldTypes::f64().name("radius"), |c| &c.radius)
            .build(|args| {
                Ok(Circle {
                    radius: args.take()?,
                })
            })
            .unwrap()
    }

    fn manager() -> ConversionManager<Arc<dyn Shape>> {
        ConversionManager::builder()
            .key_location("shape")
            .add_initial(join_conditional(
                |input: &Arc<dyn Shape>, _| {
                    Ok(AsAny::as_any(&**input)
                        .downcast_ref::<Square>()
                        .map(|square| Value::from(square.side)))
                },
                |input, _| {
                    Ok(input
                        .as_f64()
                        .map(|side| Arc::new(Square { side }) as Arc<dyn Shape>))
                },
            ))
            .add::<Square>("square", square())
            .add::<Circle>("circle", circle())
            .build()
            .unwrap()
    }

    #[test]
    fn dispatches_on_key() {
        let trove = Trove::builder().build().unwrap();
        let manager = manager();

        let circle = manager
            .deserialize(&json!({"shape": "circle", "radius": 1.0}), &trove)
            .unwrap();
        assert_eq!(circle.area(), std::f64::consts::PI);
        assert_eq!(
            manager.serialize(&circle, &trove).unwrap(),
            json!({"shape": "circle", "radius": 1.0})
        );
    }

    #[test]
    fn initial_converters_run_first() {
        let trove = Trove::builder().build().unwrap();
        let manager = manager();

        let square = manager.deserialize(&json!(3.0), &trove).unwrap();
        assert_eq!(square.area(), 9.0);
        assert_eq!(manager.serialize(&square, &trove).unwrap(), json!(3.0));
    }

    #[test]
    fn reports_missing_and_unknown_keys() {
        let trove = Trove::builder().build().unwrap();
        let manager = manager();

        let err = manager.deserialize(&json!({"radius": 1.0}), &trove).unwrap_err();
        assert_eq!(err.to_string(), "Expected a key at 'shape'");

        let err = manager
            .deserialize(&json!({"shape": "triangle"}), &trove)
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown key 'triangle'");

        let point: Arc<dyn Shape> = Arc::new(Point);
        assert!(matches!(
            manager.serialize(&point, &trove),
            Err(ConversionError::UnregisteredType(_))
        ));
    }

    #[test]
    fn rejects_bad_builders() {
        let duplicate_key = ConversionManager::<Arc<dyn Shape>>::builder()
            .key_location("shape")
            .add::<Square>("square", square())
            .add::<Circle>("square", circle())
            .build();
        assert!(matches!(duplicate_key, Err(BuildError::DuplicateKey(_))));

        let duplicate_type = ConversionManager::<Arc<dyn Shape>>::builder()
            .key_location("shape")
            .add::<Square>("square", square())
            .add::<Square>("box", square())
            .build();
        assert!(matches!(duplicate_type, Err(BuildError::DuplicateType { .. })));

        let no_location = ConversionManager::<Arc<dyn Shape>>::builder()
            .add::<Square>("square", square())
            .build();
        assert!(matches!(no_location, Err(BuildError::MissingKeyLocation)));
    }
}
