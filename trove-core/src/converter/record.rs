use std::any::Any;

use serde_json::{Map, Value};

use super::{Field, Trove, TypedConverter};
use crate::{BuildError, ConversionError};

/// Entry point for record converters.
pub struct Converters;

impl Converters {
    /// Starts a converter for the record type `V`, built from bound fields.
    pub fn record<V: 'static>() -> RecordBuilder<V> {
        RecordBuilder { fields: Vec::new() }
    }
}

trait RecordField<V>: Send + Sync {
    fn read(&self, input: &Value, trove: &Trove) -> Result<Box<dyn Any>, ConversionError>;

    fn write(
        &self,
        record: &V,
        output: &mut Map<String, Value>,
        trove: &Trove,
    ) -> Result<(), ConversionError>;

    fn local_name(&self) -> &str;
}

type Getter<V, T> = dyn Fn(&V) -> &T + Send + Sync;

struct BoundField<V, T> {
    field: Field<T>,
    local_name: String,
    node_path: Vec<String>,
    getter: Box<Getter<V, T>>,
}

impl<V, T: 'static> RecordField<V> for BoundField<V, T> {
    fn read(&self, input: &Value, trove: &Trove) -> Result<Box<dyn Any>, ConversionError> {
        let node = self
            .node_path
            .iter()
            .try_fold(input, |node, segment| node.get(segment))
            .unwrap_or(&Value::Null);
        let value = self
            .field
            .read(node, trove)
            .map_err(|err| err.in_field(&self.local_name))?;
        Ok(Box::new(value))
    }

    fn write(
        &self,
        record: &V,
        output: &mut Map<String, Value>,
        trove: &Trove,
    ) -> Result<(), ConversionError> {
        let value = self
            .field
            .write((self.getter)(record), trove)
            .map_err(|err| err.in_field(&self.local_name))?;
        if value.is_null() {
            return Ok(());
        }

        let Some((last, parents)) = self.node_path.split_last() else {
            // an empty path shares the record's own node
            return match value {
                Value::Object(map) => {
                    output.extend(map);
                    Ok(())
                }
                _ => Err(ConversionError::Custom(format!(
                    "Field '{}' shares the record's node but is not an object",
                    self.local_name
                ))),
            };
        };
        let mut target = output;
        for segment in parents {
            let entry = target
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            let Value::Object(map) = entry else {
                return Err(ConversionError::Custom(format!(
                    "Field '{}' is nested under '{}', which is not an object",
                    self.local_name, segment
                )));
            };
            target = map;
        }
        target.insert(last.clone(), value);
        Ok(())
    }

    fn local_name(&self) -> &str {
        &self.local_name
    }
}

/// The values of a record's fields, in declaration order.
pub struct RecordArgs {
    record: &'static str,
    values: std::vec::IntoIter<(String, Box<dyn Any>)>,
}

impl RecordArgs {
    /// Takes the next field value. Asking for the wrong type is an error.
    pub fn take<T: 'static>(&mut self) -> Result<T, ConversionError> {
        let (name, value) = self.values.next().ok_or_else(|| {
            ConversionError::Custom(format!(
                "Constructor of '{}' requested more fields than were declared",
                self.record
            ))
        })?;
        value.downcast::<T>().map(|value| *value).map_err(|_| {
            ConversionError::Custom(format!(
                "Expected field '{}' of '{}' to be of type '{}'",
                name,
                self.record,
                std::any::type_name::<T>()
            ))
        })
    }
}

type Constructor<V> = dyn Fn(&mut RecordArgs) -> Result<V, ConversionError> + Send + Sync;

pub struct RecordBuilder<V> {
    fields: Vec<Result<Box<dyn RecordField<V>>, usize>>,
}

impl<V: 'static> RecordBuilder<V> {
    /// Binds a named field to the getter that reads it off the record.
    pub fn field<T: 'static>(
        mut self,
        field: Field<T>,
        getter: impl Fn(&V) -> &T + Send + Sync + 'static,
    ) -> Self {
        let index = self.fields.len();
        let bound = match (field.get_local_name(), field.get_node_path()) {
            (Some(local_name), Some(node_path)) => Ok(Box::new(BoundField {
                local_name: local_name.to_string(),
                node_path: node_path.to_vec(),
                field,
                getter: Box::new(getter),
            }) as Box<dyn RecordField<V>>),
            _ => Err(index),
        };
        self.fields.push(bound);
        self
    }

    pub fn build(
        self,
        constructor: impl Fn(&mut RecordArgs) -> Result<V, ConversionError> + Send + Sync + 'static,
    ) -> Result<RecordConverter<V>, BuildError> {
        let fields = self
            .fields
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|index| BuildError::UnnamedField {
                record: std::any::type_name::<V>(),
                index,
            })?;
        Ok(RecordConverter {
            fields,
            constructor: Box::new(constructor),
        })
    }
}

/// Converts a record to an object node with one entry per field.
pub struct RecordConverter<V> {
    fields: Vec<Box<dyn RecordField<V>>>,
    constructor: Box<Constructor<V>>,
}

impl<V: 'static> TypedConverter<V> for RecordConverter<V> {
    fn serialize(&self, input: &V, trove: &Trove) -> Result<Value, ConversionError> {
        let mut output = Map::new();
        for field in &self.fields {
            field.write(input, &mut output, trove)?;
        }
        Ok(Value::Object(output))
    }

    fn deserialize(&self, input: &Value, trove: &Trove) -> Result<V, ConversionError> {
        let values = self
            .fields
            .iter()
            .map(|field| Ok((field.local_name().to_string(), field.read(input, trove)?)))
            .collect::<Result<Vec<_>, ConversionError>>()?;
        let mut args = RecordArgs {
            record: std::any::type_name::<V>(),
            values: values.into_iter(),
        };
        (self.constructor)(&mut args)
    }
}
