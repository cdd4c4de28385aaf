use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use serde_json::Value;

use super::TypedConverter;
use crate::{BuildError, ConversionError};

/// A registry of converters, at most one per converted type.
///
/// Converters receive the trove on every call so that nested values of
/// another registered type can be converted without wiring the converters
/// to each other up front.
pub struct Trove {
    converters: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Trove {
    pub fn builder() -> TroveBuilder {
        TroveBuilder {
            converters: HashMap::new(),
            error: None,
        }
    }

    pub fn converter<V: 'static>(&self) -> Option<Arc<dyn TypedConverter<V>>> {
        self.converters
            .get(&TypeId::of::<V>())
            .and_then(|converter| converter.downcast_ref::<Arc<dyn TypedConverter<V>>>())
            .cloned()
    }

    pub fn require_converter<V: 'static>(
        &self,
    ) -> Result<Arc<dyn TypedConverter<V>>, ConversionError> {
        self.converter::<V>()
            .ok_or(ConversionError::UnknownConverter(std::any::type_name::<V>()))
    }

    pub fn serialize<V: 'static>(&self, input: &V) -> Result<Value, ConversionError> {
        self.require_converter::<V>()?.serialize(input, self)
    }

    pub fn deserialize<V: 'static>(&self, input: &Value) -> Result<V, ConversionError> {
        self.require_converter::<V>()?.deserialize(input, self)
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

pub struct TroveBuilder {
    converters: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    error: Option<BuildError>,
}

impl TroveBuilder {
    pub fn add<V: 'static>(mut self, converter: impl TypedConverter<V> + 'static) -> Self {
        let converter: Arc<dyn TypedConverter<V>> = Arc::new(converter);
        if self
            .converters
            .insert(TypeId::of::<V>(), Arc::new(converter))
            .is_some()
            && self.error.is_none()
        {
            self.error = Some(BuildError::DuplicateConverter(std::any::type_name::<V>()));
        }
        self
    }

    pub fn build(self) -> Result<Trove, BuildError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        log::debug!("built trove with {} converters", self.converters.len());
        Ok(Trove {
            converters: self.converters,
        })
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::Trove;
    use crate::converter::FieldTypes;
    use crate::{BuildError, ConversionError};

    #[test]
    fn finds_converters_by_type() {
        let trove = Trove::builder()
            .add(FieldTypes::string())
            .add(FieldTypes::i64())
            .build()
            .unwrap();

        assert_eq!(trove.len(), 2);
        assert_eq!(trove.deserialize::<i64>(&json!(5)).unwrap(), 5);
        assert_eq!(
            trove.serialize(&"five".to_string()).unwrap(),
            json!("five")
        );
        assert!(trove.converter::<bool>().is_none());
        assert!(matches!(
            trove.require_converter::<bool>(),
            Err(ConversionError::UnknownConverter(_))
        ));
    }

    #[test]
    fn duplicate_types_are_rejected() {
        let result = Trove::builder()
            .add(FieldTypes::i64())
            .add(FieldTypes::i64().fallback(0))
            .build();
        assert!(matches!(result, Err(BuildError::DuplicateConverter(_))));
    }
}
