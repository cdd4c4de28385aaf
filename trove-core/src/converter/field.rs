use std::sync::Arc;

use serde_json::Value;

use super::{join, Trove, TypedConverter};
use crate::ConversionError;

type DefaultFn<T> = dyn Fn() -> T + Send + Sync;

/// A converter plus the information needed to read it out of a record node.
///
/// The `local_name` is only used for diagnostics, while the `node_path` locates
/// the field's node inside the record's node. An absent node reads as `null`,
/// which yields the default value when one is set.
pub struct Field<T> {
    converter: Arc<dyn TypedConverter<T>>,
    default: Option<Arc<DefaultFn<T>>>,
    local_name: Option<String>,
    node_path: Option<Vec<String>>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self {
            converter: self.converter.clone(),
            default: self.default.clone(),
            local_name: self.local_name.clone(),
            node_path: self.node_path.clone(),
        }
    }
}

impl<T: 'static> Field<T> {
    pub fn new(converter: impl TypedConverter<T> + 'static) -> Self {
        Self::from_shared(Arc::new(converter))
    }

    pub fn from_shared(converter: Arc<dyn TypedConverter<T>>) -> Self {
        Self {
            converter,
            default: None,
            local_name: None,
            node_path: None,
        }
    }

    /// Sets both the local name and the node path.
    pub fn name(self, name: &str) -> Self {
        Self {
            local_name: Some(name.to_string()),
            node_path: Some(vec![name.to_string()]),
            ..self
        }
    }

    pub fn local_name(self, name: &str) -> Self {
        Self {
            local_name: Some(name.to_string()),
            ..self
        }
    }

    pub fn node_path<S: Into<String>>(self, path: impl IntoIterator<Item = S>) -> Self {
        Self {
            node_path: Some(path.into_iter().map(Into::into).collect()),
            ..self
        }
    }

    pub fn with_default(self, supplier: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            default: Some(Arc::new(supplier)),
            ..self
        }
    }

    pub fn fallback(self, value: T) -> Self
    where
        T: Clone + Send + Sync,
    {
        self.with_default(move || value.clone())
    }

    pub fn get_local_name(&self) -> Option<&str> {
        self.local_name.as_deref()
    }

    pub fn get_node_path(&self) -> Option<&[String]> {
        self.node_path.as_deref()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    fn derive<N: 'static>(&self, converter: impl TypedConverter<N> + 'static) -> Field<N> {
        Field {
            converter: Arc::new(converter),
            default: None,
            local_name: self.local_name.clone(),
            node_path: self.node_path.clone(),
        }
    }

    /// Absent nodes read as `None`, and `None` is never written.
    pub fn optional(self) -> Field<Option<T>> {
        let (to_node, from_node) = (self.converter.clone(), self.converter.clone());
        let field = self.derive(join(
            move |input: &Option<T>, trove| match input {
                Some(value) => to_node.serialize(value, trove),
                None => Ok(Value::Null),
            },
            move |input, trove| match input {
                Value::Null => Ok(None),
                node => from_node.deserialize(node, trove).map(Some),
            },
        ));
        field.with_default(|| None)
    }

    /// The node must be a list of this field's type.
    pub fn list(self) -> Field<Vec<T>> {
        let (to_node, from_node) = (self.converter.clone(), self.converter.clone());
        self.derive(join(
            move |input: &Vec<T>, trove| {
                input
                    .iter()
                    .map(|item| to_node.serialize(item, trove))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            },
            move |input, trove| match input {
                Value::Array(children) => children
                    .iter()
                    .map(|child| from_node.deserialize(child, trove))
                    .collect(),
                _ => Err(ConversionError::ExpectedList),
            },
        ))
    }

    /// Like [`Field::list`], but a lone value reads as a list of one item and a
    /// list of one item is written as the lone value.
    pub fn possible_list(self) -> Field<Vec<T>> {
        let (to_node, from_node) = (self.converter.clone(), self.converter.clone());
        self.derive(join(
            move |input: &Vec<T>, trove| match input.as_slice() {
                [single] => to_node.serialize(single, trove),
                items => items
                    .iter()
                    .map(|item| to_node.serialize(item, trove))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
            },
            move |input, trove| match input {
                Value::Array(children) => children
                    .iter()
                    .map(|child| from_node.deserialize(child, trove))
                    .collect(),
                single => Ok(vec![from_node.deserialize(single, trove)?]),
            },
        ))
    }

    /// Converts between the wire type `T` and the in-memory type `N`. A mapper
    /// returning `None` fails the conversion.
    pub fn map<N: 'static>(
        self,
        to_new: impl Fn(T) -> Option<N> + Send + Sync + 'static,
        from_new: impl Fn(&N) -> Option<T> + Send + Sync + 'static,
    ) -> Field<N> {
        let (to_node, from_node) = (self.converter.clone(), self.converter.clone());
        self.derive(join(
            move |input: &N, trove| match from_new(input) {
                Some(applied) => to_node.serialize(&applied, trove),
                None => Err(ConversionError::Mapping {
                    value: std::any::type_name::<N>().to_string(),
                    action: "serialized",
                }),
            },
            move |input, trove| {
                let preliminary = from_node.deserialize(input, trove)?;
                to_new(preliminary).ok_or_else(|| ConversionError::Mapping {
                    value: input.to_string(),
                    action: "deserialized",
                })
            },
        ))
    }

    /// Reads this field from its own node, falling back to the default when
    /// the node is absent.
    pub fn read(&self, input: &Value, trove: &Trove) -> Result<T, ConversionError> {
        if let (Value::Null, Some(default)) = (input, &self.default) {
            return Ok(default());
        }
        self.converter.deserialize(input, trove)
    }

    pub fn write(&self, input: &T, trove: &Trove) -> Result<Value, ConversionError> {
        self.converter.serialize(input, trove)
    }
}

impl<T: 'static> TypedConverter<T> for Field<T> {
    fn serialize(&self, input: &T, trove: &Trove) -> Result<Value, ConversionError> {
        self.write(input, trove)
    }

    fn deserialize(&self, input: &Value, trove: &Trove) -> Result<T, ConversionError> {
        self.read(input, trove)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::converter::{FieldTypes, Trove};
    use crate::ConversionError;

    fn trove() -> Trove {
        Trove::builder().build().unwrap()
    }

    #[test]
    fn default_only_applies_to_absent_nodes() {
        let trove = trove();
        let field = FieldTypes::i64().name("weight").fallback(1);
        assert_eq!(field.read(&json!(null), &trove).unwrap(), 1);
        assert_eq!(field.read(&json!(7), &trove).unwrap(), 7);
        assert!(field.read(&json!("seven"), &trove).is_err());
    }

    #[test]
    fn optional_skips_none() {
        let trove = trove();
        let field = FieldTypes::f64().name("chance").optional();
        assert_eq!(field.read(&json!(null), &trove).unwrap(), None);
        assert_eq!(field.read(&json!(0.5), &trove).unwrap(), Some(0.5));
        assert_eq!(field.write(&None, &trove).unwrap(), json!(null));
    }

    #[test]
    fn list_requires_array() {
        let trove = trove();
        let field = FieldTypes::string().name("names").list();
        assert_eq!(
            field.read(&json!(["a", "b"]), &trove).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(matches!(
            field.read(&json!("a"), &trove),
            Err(ConversionError::ExpectedList)
        ));
    }

    #[test]
    fn possible_list_accepts_single_values() {
        let trove = trove();
        let field = FieldTypes::i64().name("values").possible_list();
        assert_eq!(field.read(&json!(3), &trove).unwrap(), vec![3]);
        assert_eq!(field.read(&json!([1, 2]), &trove).unwrap(), vec![1, 2]);
        assert_eq!(field.write(&vec![3], &trove).unwrap(), json!(3));
        assert_eq!(field.write(&vec![1, 2], &trove).unwrap(), json!([1, 2]));
    }

    #[test]
    fn map_reports_failed_mappings() {
        let trove = trove();
        let field = FieldTypes::i64()
            .name("level")
            .map(|value| u8::try_from(value).ok(), |value| Some(i64::from(*value)));
        assert_eq!(field.read(&json!(4), &trove).unwrap(), 4u8);
        assert!(matches!(
            field.read(&json!(-4), &trove),
            Err(ConversionError::Mapping { .. })
        ));
        assert_eq!(field.write(&9, &trove).unwrap(), json!(9));
    }

    #[test]
    fn name_sets_both_names() {
        let field = FieldTypes::bool().name("expand");
        assert_eq!(field.get_local_name(), Some("expand"));
        assert_eq!(field.get_node_path(), Some(&["expand".to_string()][..]));

        let field = field.node_path(["outer", "inner"]);
        assert_eq!(field.get_local_name(), Some("expand"));
        assert_eq!(field.get_node_path().map(<[_]>::len), Some(2));
    }
}
