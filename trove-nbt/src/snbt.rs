//! The stringified NBT format, as used in commands and in loot table JSON.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::compound::NbtCompound;
use crate::tag::NbtTag;
use crate::Error;

pub(crate) fn is_bare_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+')
}

/// Parses a complete SNBT string into a tag.
pub fn from_snbt(input: &str) -> Result<NbtTag, Error> {
    let mut reader = SnbtReader::new(input);
    let tag = reader.read_value()?;
    reader.expect_end()?;
    Ok(tag)
}

/// Parses a complete SNBT string that must describe a compound.
pub fn from_snbt_compound(input: &str) -> Result<NbtCompound, Error> {
    let mut reader = SnbtReader::new(input);
    let compound = reader.read_compound()?;
    reader.expect_end()?;
    Ok(compound)
}

/// A cursor over SNBT text. It can stop partway through the input, which lets
/// other grammars embed SNBT values.
pub struct SnbtReader<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> SnbtReader<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    pub fn at(input: &'a str, position: usize) -> Self {
        Self { input, position }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Snbt {
            position: self.position,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.next();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), Error> {
        self.skip_whitespace();
        match self.next() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{expected}' but found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}' but reached the end"))),
        }
    }

    fn expect_end(&mut self) -> Result<(), Error> {
        self.skip_whitespace();
        match self.peek() {
            None => Ok(()),
            Some(c) => Err(self.error(format!("trailing data starting at '{c}'"))),
        }
    }

    pub fn read_value(&mut self) -> Result<NbtTag, Error> {
        self.skip_whitespace();
        match self.peek() {
            Some('{') => Ok(NbtTag::Compound(self.read_compound()?)),
            Some('[') => self.read_list_or_array(),
            Some('"') | Some('\'') => Ok(NbtTag::String(self.read_quoted()?)),
            Some(_) => {
                let token = self.read_bare()?;
                Ok(parse_bare(&token))
            }
            None => Err(self.error("expected a value but reached the end")),
        }
    }

    pub fn read_compound(&mut self) -> Result<NbtCompound, Error> {
        self.expect('{')?;
        let mut compound = NbtCompound::new();
        self.skip_whitespace();
        if self.peek() == Some('}') {
            self.next();
            return Ok(compound);
        }
        loop {
            self.skip_whitespace();
            let key = match self.peek() {
                Some('"') | Some('\'') => self.read_quoted()?,
                _ => self.read_bare()?,
            };
            self.expect(':')?;
            let value = self.read_value()?;
            compound.insert(key, value);

            self.skip_whitespace();
            match self.next() {
                Some(',') => continue,
                Some('}') => return Ok(compound),
                Some(c) => return Err(self.error(format!("expected ',' or '}}' but found '{c}'"))),
                None => return Err(self.error("unterminated compound")),
            }
        }
    }

    fn read_list_or_array(&mut self) -> Result<NbtTag, Error> {
        self.expect('[')?;
        let rest = &self.input[self.position..];
        let array_type = match rest.as_bytes() {
            [kind @ (b'B' | b'I' | b'L'), b';', ..] => Some(*kind),
            _ => None,
        };

        if let Some(kind) = array_type {
            self.position += 2;
            let values = self.read_elements()?;
            return match kind {
                b'B' => values
                    .iter()
                    .map(|value| match value {
                        NbtTag::Byte(byte) => Ok(*byte as u8),
                        _ => Err(self.error("byte arrays may only contain bytes")),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(|bytes| NbtTag::ByteArray(bytes.into_boxed_slice())),
                b'I' => values
                    .iter()
                    .map(|value| match value {
                        NbtTag::Int(int) => Ok(*int),
                        _ => Err(self.error("int arrays may only contain ints")),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(|ints| NbtTag::IntArray(ints.into_boxed_slice())),
                _ => values
                    .iter()
                    .map(|value| match value {
                        NbtTag::Long(long) => Ok(*long),
                        NbtTag::Int(int) => Ok(*int as i64),
                        _ => Err(self.error("long arrays may only contain longs")),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(|longs| NbtTag::LongArray(longs.into_boxed_slice())),
            };
        }

        let values = self.read_elements()?;
        if let Some(first) = values.first() {
            let id = first.get_type_id();
            if let Some(other) = values.iter().find(|value| value.get_type_id() != id) {
                return Err(Error::MixedList {
                    expected: id,
                    found: other.get_type_id(),
                });
            }
        }
        Ok(NbtTag::List(values))
    }

    /// Reads comma separated values up to and including the closing bracket.
    fn read_elements(&mut self) -> Result<Vec<NbtTag>, Error> {
        let mut values = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(']') {
            self.next();
            return Ok(values);
        }
        loop {
            values.push(self.read_value()?);
            self.skip_whitespace();
            match self.next() {
                Some(',') => continue,
                Some(']') => return Ok(values),
                Some(c) => return Err(self.error(format!("expected ',' or ']' but found '{c}'"))),
                None => return Err(self.error("unterminated list")),
            }
        }
    }

    fn read_quoted(&mut self) -> Result<String, Error> {
        let Some(quote) = self.next() else {
            return Err(self.error("expected a quoted string"));
        };
        let mut string = String::new();
        loop {
            match self.next() {
                Some('\\') => match self.next() {
                    Some(c) if c == quote || c == '\\' => string.push(c),
                    Some(c) => return Err(self.error(format!("invalid escape '\\{c}'"))),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) if c == quote => return Ok(string),
                Some(c) => string.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn read_bare(&mut self) -> Result<String, Error> {
        let start = self.position;
        while self.peek().is_some_and(is_bare_char) {
            self.next();
        }
        if start == self.position {
            return Err(self.error("expected a value"));
        }
        Ok(self.input[start..self.position].to_string())
    }
}

fn looks_numeric(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
}

fn parse_bare(token: &str) -> NbtTag {
    match token {
        "true" => return NbtTag::Byte(1),
        "false" => return NbtTag::Byte(0),
        _ => {}
    }
    if !looks_numeric(token) {
        return NbtTag::String(token.to_string());
    }

    let (body, suffix) = token.split_at(token.len() - 1);
    let parsed = match suffix {
        "b" | "B" => body.parse().ok().map(NbtTag::Byte),
        "s" | "S" => body.parse().ok().map(NbtTag::Short),
        "l" | "L" => body.parse().ok().map(NbtTag::Long),
        "f" | "F" => body.parse().ok().map(NbtTag::Float),
        "d" | "D" => body.parse().ok().map(NbtTag::Double),
        _ => token.parse().ok().map(NbtTag::Int).or_else(|| {
            token
                .contains(['.', 'e', 'E'])
                .then(|| token.parse().ok().map(NbtTag::Double))
                .flatten()
        }),
    };
    parsed.unwrap_or_else(|| NbtTag::String(token.to_string()))
}

struct SnbtVisitor<T>(fn(&str) -> Result<T, Error>);

impl<T> Visitor<'_> for SnbtVisitor<T> {
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string containing SNBT")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        (self.0)(v).map_err(E::custom)
    }
}

impl Serialize for NbtCompound {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NbtCompound {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(SnbtVisitor(from_snbt_compound))
    }
}

impl Serialize for NbtTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NbtTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(SnbtVisitor(from_snbt))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{BYTE_ID, INT_ID};

    #[test]
    fn parses_numbers() {
        assert_eq!(from_snbt("1b").unwrap(), NbtTag::Byte(1));
        assert_eq!(from_snbt("-3s").unwrap(), NbtTag::Short(-3));
        assert_eq!(from_snbt("12").unwrap(), NbtTag::Int(12));
        assert_eq!(from_snbt("12L").unwrap(), NbtTag::Long(12));
        assert_eq!(from_snbt("0.5f").unwrap(), NbtTag::Float(0.5));
        assert_eq!(from_snbt("0.5").unwrap(), NbtTag::Double(0.5));
        assert_eq!(from_snbt("2d").unwrap(), NbtTag::Double(2.0));
        assert_eq!(from_snbt("true").unwrap(), NbtTag::Byte(1));
    }

    #[test]
    fn parses_strings() {
        assert_eq!(from_snbt("stone").unwrap(), NbtTag::String("stone".into()));
        assert_eq!(
            from_snbt("\"with \\\"quote\\\"\"").unwrap(),
            NbtTag::String("with \"quote\"".into())
        );
        assert_eq!(from_snbt("'single'").unwrap(), NbtTag::String("single".into()));
    }

    #[test]
    fn parses_nested_compound() {
        let compound =
            from_snbt_compound("{display: {Name: '\"x\"'}, Items: [{Slot: 0b}, {Slot: 1b}], ids: [I; 1, 2]}")
                .unwrap();
        assert_eq!(
            compound
                .get_compound("display")
                .and_then(|display| display.get_string("Name"))
                .map(String::as_str),
            Some("\"x\"")
        );
        assert_eq!(compound.get_list("Items").map(<[NbtTag]>::len), Some(2));
        assert_eq!(compound.get_int_array("ids"), Some(&[1, 2][..]));
    }

    #[test]
    fn rejects_mixed_lists() {
        assert!(matches!(
            from_snbt("[1b, 2]"),
            Err(Error::MixedList {
                expected: BYTE_ID,
                found: INT_ID
            })
        ));
        assert!(from_snbt("[L; 1L, 2L]").is_ok());
    }

    #[test]
    fn rejects_trailing_data() {
        assert!(from_snbt_compound("{a:1}x").is_err());
        assert!(from_snbt_compound("{a:1").is_err());
    }

    #[test]
    fn display_round_trips() {
        let source = "{id:\"minecraft:stone\",Count:1b,tag:{list:[1L,2L],f:0.25f}}";
        let compound = from_snbt_compound(source).unwrap();
        assert_eq!(compound.to_string(), source);
        assert_eq!(from_snbt_compound(&compound.to_string()).unwrap(), compound);
    }

    #[test]
    fn serde_as_string() {
        let compound: NbtCompound = serde_json::from_str("\"{a: 1b}\"").unwrap();
        assert_eq!(compound.get_byte("a"), Some(1));
        assert_eq!(serde_json::to_string(&compound).unwrap(), "\"{a:1b}\"");
    }
}
