use std::{fmt, str::FromStr};

use serde::{de::Visitor, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const DEFAULT_NAMESPACE: &str = "minecraft";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Identifier '{0}' has an invalid namespace")]
    InvalidNamespace(String),
    #[error("Identifier '{0}' has an invalid path")]
    InvalidPath(String),
}

/// A namespaced key such as `minecraft:stone`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    pub namespace: String,
    pub path: String,
}

impl Identifier {
    pub fn new(namespace: &str, path: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            path: path.to_string(),
        }
    }

    pub fn vanilla(path: &str) -> Self {
        Self::new(DEFAULT_NAMESPACE, path)
    }

    /// Parses `namespace:path`, falling back to the vanilla namespace when none is given.
    pub fn parse(identifier: &str) -> Result<Self, IdentifierError> {
        let (namespace, path) = identifier
            .split_once(':')
            .unwrap_or((DEFAULT_NAMESPACE, identifier));

        if namespace.is_empty() || !namespace.chars().all(is_namespace_char) {
            return Err(IdentifierError::InvalidNamespace(identifier.to_string()));
        }
        if path.is_empty() || !path.chars().all(|c| is_namespace_char(c) || c == '/') {
            return Err(IdentifierError::InvalidPath(identifier.to_string()));
        }
        Ok(Self::new(namespace, path))
    }
}

fn is_namespace_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.')
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl Serialize for Identifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdentifierVisitor;

        impl Visitor<'_> for IdentifierVisitor {
            type Value = Identifier;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a valid identifier (namespace:path)")
            }

            fn visit_str<E>(self, identifier: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Identifier::parse(identifier).map_err(E::custom)
            }
        }
        deserializer.deserialize_str(IdentifierVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::{Identifier, IdentifierError};

    #[test]
    fn parse_with_and_without_namespace() {
        assert_eq!(
            Identifier::parse("trove:chests/bonus").unwrap(),
            Identifier::new("trove", "chests/bonus")
        );
        assert_eq!(Identifier::parse("stone").unwrap(), Identifier::vanilla("stone"));
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(matches!(
            Identifier::parse("Bad:stone"),
            Err(IdentifierError::InvalidNamespace(_))
        ));
        assert!(matches!(
            Identifier::parse("minecraft:"),
            Err(IdentifierError::InvalidPath(_))
        ));
    }

    #[test]
    fn serde_string_form() {
        let id: Identifier = serde_json::from_str("\"minecraft:iron_ingot\"").unwrap();
        assert_eq!(id.to_string(), "minecraft:iron_ingot");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"minecraft:iron_ingot\"");
    }
}
