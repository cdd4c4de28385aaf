//! Number providers and ranges.

use std::sync::Arc;

use serde_json::{Map, Value};
use trove_core::{
    converter::{
        join_conditional, AsAny, ConversionManager, Converters, Field, FieldTypes, TypedConverter,
    },
    structure::LootNumber,
    BuildError, ConversionError, LootContext, LootError,
};
use trove_util::random::RandomImpl;

use crate::types::VanillaTypes;

/// A fixed number. Longs are rounded half up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantNumber {
    pub value: f64,
}

impl ConstantNumber {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl LootNumber for ConstantNumber {
    fn get_long(&self, _context: &LootContext) -> Result<i64, LootError> {
        Ok((self.value + 0.5).floor() as i64)
    }

    fn get_double(&self, _context: &LootContext) -> Result<f64, LootError> {
        Ok(self.value)
    }
}

/// A uniformly distributed number. Both bounds are inclusive for longs, while
/// doubles exclude the maximum.
pub struct UniformNumber {
    pub min: Arc<dyn LootNumber>,
    pub max: Arc<dyn LootNumber>,
}

impl LootNumber for UniformNumber {
    fn get_long(&self, context: &LootContext) -> Result<i64, LootError> {
        let min = self.min.get_long(context)?;
        let max = self.max.get_long(context)?;
        if max < min {
            return Ok(min);
        }
        Ok(context.with_random(|random| random.next_inbetween_i64(min, max)))
    }

    fn get_double(&self, context: &LootContext) -> Result<f64, LootError> {
        let min = self.min.get_double(context)?;
        let max = self.max.get_double(context)?;
        Ok(context.with_random(|random| min + random.next_f64() * (max - min)))
    }
}

/// The number of successes out of `trials` attempts that each succeed with
/// `probability`.
pub struct BinomialNumber {
    pub trials: Arc<dyn LootNumber>,
    pub probability: Arc<dyn LootNumber>,
}

impl LootNumber for BinomialNumber {
    fn get_long(&self, context: &LootContext) -> Result<i64, LootError> {
        let trials = self.trials.get_long(context)?;
        let probability = self.probability.get_double(context)?;
        Ok(context.with_random(|random| {
            (0..trials).filter(|_| random.next_f64() < probability).count() as i64
        }))
    }

    fn get_double(&self, context: &LootContext) -> Result<f64, LootError> {
        self.get_long(context).map(|successes| successes as f64)
    }
}

trove_core::subtypes!(LootNumber => ConstantNumber, UniformNumber, BinomialNumber);

fn constant() -> Result<impl TypedConverter<ConstantNumber>, BuildError> {
    Converters::record::<ConstantNumber>()
        .field(FieldTypes::f64().name("value"), |n| &n.value)
        .build(|args| Ok(ConstantNumber::new(args.take()?)))
}

fn uniform() -> Result<impl TypedConverter<UniformNumber>, BuildError> {
    Converters::record::<UniformNumber>()
        .field(VanillaTypes::number().name("min"), |n| &n.min)
        .field(VanillaTypes::number().name("max"), |n| &n.max)
        .build(|args| {
            Ok(UniformNumber {
                min: args.take()?,
                max: args.take()?,
            })
        })
}

fn binomial() -> Result<impl TypedConverter<BinomialNumber>, BuildError> {
    Converters::record::<BinomialNumber>()
        .field(
            VanillaTypes::number().local_name("trials").node_path(["n"]),
            |n| &n.trials,
        )
        .field(
            VanillaTypes::number().local_name("probability").node_path(["p"]),
            |n| &n.probability,
        )
        .build(|args| {
            Ok(BinomialNumber {
                trials: args.take()?,
                probability: args.take()?,
            })
        })
}

/// Number providers keyed by `type`. A bare number reads as a constant, and a
/// constant is written back as a bare number.
pub fn number_manager() -> Result<ConversionManager<Arc<dyn LootNumber>>, BuildError> {
    ConversionManager::builder()
        .key_location("type")
        .add_initial(join_conditional(
            |input: &Arc<dyn LootNumber>, _| {
                Ok(AsAny::as_any(&**input)
                    .downcast_ref::<ConstantNumber>()
                    .map(|constant| Value::from(constant.value)))
            },
            |input, _| {
                Ok(input
                    .as_f64()
                    .map(|value| Arc::new(ConstantNumber::new(value)) as Arc<dyn LootNumber>))
            },
        ))
        .add::<ConstantNumber>("minecraft:constant", constant()?)
        .add::<UniformNumber>("minecraft:uniform", uniform()?)
        .add::<BinomialNumber>("minecraft:binomial", binomial()?)
        .build()
}

/// An optional lower and upper bound, each computed from the context.
#[derive(Clone, Default)]
pub struct LootNumberRange {
    pub min: Option<Arc<dyn LootNumber>>,
    pub max: Option<Arc<dyn LootNumber>>,
}

impl LootNumberRange {
    pub fn new(min: Option<Arc<dyn LootNumber>>, max: Option<Arc<dyn LootNumber>>) -> Self {
        Self { min, max }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn exact(value: f64) -> Self {
        let constant: Arc<dyn LootNumber> = Arc::new(ConstantNumber::new(value));
        Self::new(Some(constant.clone()), Some(constant))
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn limit_long(&self, context: &LootContext, mut number: i64) -> Result<i64, LootError> {
        if let Some(min) = &self.min {
            number = number.max(min.get_long(context)?);
        }
        if let Some(max) = &self.max {
            number = number.min(max.get_long(context)?);
        }
        Ok(number)
    }

    pub fn limit_double(&self, context: &LootContext, mut number: f64) -> Result<f64, LootError> {
        if let Some(min) = &self.min {
            number = number.max(min.get_double(context)?);
        }
        if let Some(max) = &self.max {
            number = number.min(max.get_double(context)?);
        }
        Ok(number)
    }

    pub fn check_long(&self, context: &LootContext, number: i64) -> Result<bool, LootError> {
        if let Some(min) = &self.min {
            if min.get_long(context)? > number {
                return Ok(false);
            }
        }
        if let Some(max) = &self.max {
            if max.get_long(context)? < number {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn check_double(&self, context: &LootContext, number: f64) -> Result<bool, LootError> {
        if let Some(min) = &self.min {
            if min.get_double(context)? > number {
                return Ok(false);
            }
        }
        if let Some(max) = &self.max {
            if max.get_double(context)? < number {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Reads `null` as unbounded, a map as `{min?, max?}`, and a number as an
    /// exact range.
    pub fn field() -> Field<LootNumberRange> {
        FieldTypes::join(
            |input: &LootNumberRange, trove| {
                let converter = trove.require_converter::<Arc<dyn LootNumber>>()?;
                let mut output = Map::new();
                if let Some(min) = &input.min {
                    output.insert("min".to_string(), converter.serialize(min, trove)?);
                }
                if let Some(max) = &input.max {
                    output.insert("max".to_string(), converter.serialize(max, trove)?);
                }
                Ok(Value::Object(output))
            },
            |input, trove| match input {
                Value::Null => Ok(LootNumberRange::unbounded()),
                Value::Object(map) => {
                    let converter = trove.require_converter::<Arc<dyn LootNumber>>()?;
                    let bound = |name: &str| {
                        map.get(name)
                            .filter(|node| !node.is_null())
                            .map(|node| {
                                converter
                                    .deserialize(node, trove)
                                    .map_err(|err| err.in_field(name))
                            })
                            .transpose()
                    };
                    Ok(LootNumberRange::new(bound("min")?, bound("max")?))
                }
                Value::Number(number) => number.as_f64().map(LootNumberRange::exact).ok_or_else(|| {
                    ConversionError::Custom("Expected null, a map, or a scalar".to_string())
                }),
                _ => Err(ConversionError::Custom(
                    "Expected null, a map, or a scalar".to_string(),
                )),
            },
        )
    }
}
