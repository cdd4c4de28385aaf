use thiserror::Error;

/// Failure while turning a node into a value or back.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Expected a key at '{0}'")]
    MissingKey(String),
    #[error("Unknown key '{0}'")]
    UnknownKey(String),
    #[error("Unknown converter type '{0}'")]
    UnknownConverter(&'static str),
    #[error("Expected a list")]
    ExpectedList,
    #[error("Cannot coerce node to expected type '{0}'")]
    MissingValue(&'static str),
    #[error("'{value}' could not be {action} or has an invalid type")]
    Mapping { value: String, action: &'static str },
    #[error("Unknown input type '{0}'")]
    UnregisteredType(&'static str),
    #[error("{field}: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<ConversionError>,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Custom(String),
}

impl ConversionError {
    pub fn in_field(self, field: &str) -> Self {
        Self::Field {
            field: field.to_string(),
            source: Box::new(self),
        }
    }
}

/// Misconfigured converter builders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("This builder cannot be built without a key location")]
    MissingKeyLocation,
    #[error("Converter '{0}' has a key that has already been registered")]
    DuplicateKey(String),
    #[error("Converter '{key}' has a type '{type_name}' that has already been registered")]
    DuplicateType {
        key: String,
        type_name: &'static str,
    },
    #[error("A converter for '{0}' has already been registered")]
    DuplicateConverter(&'static str),
    #[error("Field {index} of '{record}' must have a local name and a node path")]
    UnnamedField { record: &'static str, index: usize },
}

/// Failure while generating loot.
#[derive(Error, Debug)]
pub enum LootError {
    #[error("No value for key '{0}'")]
    MissingContextKey(&'static str),
    #[error("Provided context does not have key '{0}'")]
    UnverifiedContext(&'static str),
    #[error("Cannot process result {0}")]
    Unprocessable(&'static str),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("{0}")]
    Custom(String),
}
