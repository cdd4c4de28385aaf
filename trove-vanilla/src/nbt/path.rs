use std::{fmt, str::FromStr};

use serde_json::Value;
use thiserror::Error;
use trove_core::{
    converter::{Field, FieldTypes},
    ConversionError,
};
use trove_nbt::{compound::NbtCompound, snbt::SnbtReader, tag::NbtTag};

#[derive(Error, Debug)]
pub enum NbtPathError {
    #[error("NBT paths must contain at least one selector")]
    Empty,
    #[error("Invalid NBT path selector at position {0}")]
    InvalidSelector(usize),
    #[error("Reading a path from '{0}' did not consume the entire string")]
    Trailing(String),
    #[error(transparent)]
    Snbt(#[from] trove_nbt::Error),
}

/// One step of an [`NbtPath`].
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// The leading `key` of a path. Like `.key`, it is created when missing
    /// while preparing, so a path can be set on an empty compound.
    RootKey(String),
    /// `.key`
    CompoundKey(String),
    /// `{...}`, selecting the current compound if it matches.
    CompoundFilter(NbtCompound),
    /// `[n]`, counting from the end when negative.
    ListIndex(i32),
    /// `[{...}]`, selecting every matching list element.
    ListFilter(NbtCompound),
    /// `[]`
    EntireList,
}

impl Selector {
    fn select<'a>(&self, source: &'a NbtTag, selected: &mut Vec<&'a NbtTag>) {
        match (self, source) {
            (Selector::RootKey(key) | Selector::CompoundKey(key), NbtTag::Compound(compound)) => {
                selected.extend(compound.get(key));
            }
            (Selector::CompoundFilter(filter), NbtTag::Compound(compound)) => {
                if filter.matches(compound, false) {
                    selected.push(source);
                }
            }
            (Selector::ListIndex(index), NbtTag::List(list)) => {
                selected.extend(resolve_index(*index, list.len()).and_then(|i| list.get(i)));
            }
            (Selector::ListFilter(filter), NbtTag::List(list)) => {
                selected.extend(list.iter().filter(|element| matches_filter(filter, element)));
            }
            (Selector::EntireList, NbtTag::List(list)) => selected.extend(list.iter()),
            _ => {}
        }
    }

    fn select_mut<'a>(&self, source: &'a mut NbtTag) -> Vec<&'a mut NbtTag> {
        match self {
            Selector::RootKey(key) | Selector::CompoundKey(key) => match source {
                NbtTag::Compound(compound) => compound.get_mut(key).into_iter().collect(),
                _ => Vec::new(),
            },
            Selector::CompoundFilter(filter) => match source {
                NbtTag::Compound(compound) if filter.matches(compound, false) => vec![source],
                _ => Vec::new(),
            },
            Selector::ListIndex(index) => match source {
                NbtTag::List(list) => {
                    let length = list.len();
                    resolve_index(*index, length)
                        .and_then(|i| list.get_mut(i))
                        .into_iter()
                        .collect()
                }
                _ => Vec::new(),
            },
            Selector::ListFilter(filter) => match source {
                NbtTag::List(list) => list
                    .iter_mut()
                    .filter(|element| matches_filter(filter, element))
                    .collect(),
                _ => Vec::new(),
            },
            Selector::EntireList => match source {
                NbtTag::List(list) => list.iter_mut().collect(),
                _ => Vec::new(),
            },
        }
    }

    /// Creates whatever this selector needs to find something in `source`.
    /// Root and compound keys both insert `next()` when absent.
    fn prepare(&self, source: &mut NbtTag, next: impl FnOnce() -> NbtTag) {
        match self {
            Selector::RootKey(key) | Selector::CompoundKey(key) => {
                if let NbtTag::Compound(compound) = source {
                    if !compound.contains_key(key) {
                        compound.insert(key.clone(), next());
                    }
                }
            }
            Selector::CompoundFilter(filter) => {
                let matched = matches!(source, NbtTag::Compound(compound) if filter.matches(compound, false));
                if !matched {
                    *source = NbtTag::Compound(filter.clone());
                }
            }
            Selector::ListIndex(_) => {}
            Selector::ListFilter(filter) => {
                if let NbtTag::List(list) = source {
                    if !list.iter().any(|element| matches_filter(filter, element)) {
                        try_list_add(source, NbtTag::Compound(filter.clone()));
                    }
                }
            }
            Selector::EntireList => {
                if matches!(source, NbtTag::List(list) if list.is_empty()) {
                    try_list_add(source, next());
                }
            }
        }
    }

    /// The empty value a parent needs so this selector has something to read.
    fn prepared(&self) -> NbtTag {
        match self {
            Selector::RootKey(_) | Selector::CompoundKey(_) | Selector::CompoundFilter(_) => {
                NbtTag::Compound(NbtCompound::new())
            }
            Selector::ListIndex(_) | Selector::ListFilter(_) | Selector::EntireList => {
                NbtTag::List(Vec::new())
            }
        }
    }
}

fn resolve_index(index: i32, length: usize) -> Option<usize> {
    let resolved = if index >= 0 {
        i64::from(index)
    } else {
        length as i64 + i64::from(index)
    };
    usize::try_from(resolved).ok().filter(|i| *i < length)
}

fn matches_filter(filter: &NbtCompound, element: &NbtTag) -> bool {
    matches!(element, NbtTag::Compound(compound) if filter.matches(compound, false))
}

/// Appends `value` to a list whose elements share its type. Anything else is
/// left alone.
pub fn try_list_add(target: &mut NbtTag, value: NbtTag) {
    if let NbtTag::List(list) = target {
        let compatible = list
            .first()
            .is_none_or(|first| first.get_type_id() == value.get_type_id());
        if compatible {
            list.push(value);
        }
    }
}

/// A path into an NBT tree, such as `Items[0].tag.display{Name:"x"}`.
#[derive(Debug, Clone, PartialEq)]
pub struct NbtPath {
    selectors: Vec<Selector>,
}

impl NbtPath {
    pub fn new(selectors: Vec<Selector>) -> Result<Self, NbtPathError> {
        if selectors.is_empty() {
            return Err(NbtPathError::Empty);
        }
        Ok(Self { selectors })
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// Every tag the path selects in `source`.
    pub fn get<'a>(&self, source: &'a NbtTag) -> Vec<&'a NbtTag> {
        let mut current = vec![source];
        for selector in &self.selectors {
            let mut next = Vec::new();
            for tag in current {
                selector.select(tag, &mut next);
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    /// Runs `action` on every tag the path selects in `source`, creating the
    /// missing parts on the way. The last missing part is `final_default`.
    /// Returns the number of tags visited.
    pub fn get_with_defaults(
        &self,
        source: &mut NbtTag,
        final_default: &dyn Fn() -> NbtTag,
        action: &mut dyn FnMut(&mut NbtTag),
    ) -> usize {
        self.visit(0, source, final_default, action)
    }

    fn visit(
        &self,
        index: usize,
        node: &mut NbtTag,
        final_default: &dyn Fn() -> NbtTag,
        action: &mut dyn FnMut(&mut NbtTag),
    ) -> usize {
        let Some(selector) = self.selectors.get(index) else {
            action(node);
            return 1;
        };
        selector.prepare(node, || match self.selectors.get(index + 1) {
            Some(next) => next.prepared(),
            None => final_default(),
        });
        selector
            .select_mut(node)
            .into_iter()
            .map(|child| self.visit(index + 1, child, final_default, action))
            .sum()
    }

    /// Sets every selected tag to `value`, creating the path if needed.
    pub fn set(&self, source: &mut NbtTag, value: &NbtTag) -> usize {
        self.get_with_defaults(source, &|| value.clone(), &mut |target| {
            *target = value.clone()
        })
    }

    pub fn parse(path: &str) -> Result<Self, NbtPathError> {
        let mut reader = PathReader {
            input: path,
            position: 0,
        };
        let mut selectors = Vec::new();
        if !reader.peek().is_some_and(is_selector_start) {
            if let Some(key) = reader.read_string() {
                selectors.push(Selector::RootKey(key));
            }
        }
        while reader.peek().is_some_and(is_selector_start) {
            let start = reader.position;
            let selector = reader
                .read_selector()?
                .ok_or(NbtPathError::InvalidSelector(start))?;
            selectors.push(selector);
        }
        if reader.position != path.len() {
            if selectors.is_empty() {
                return Err(NbtPathError::InvalidSelector(reader.position));
            }
            return Err(NbtPathError::Trailing(path.to_string()));
        }
        Self::new(selectors)
    }

    /// Converts a path to and from its string form.
    pub fn field() -> Field<NbtPath> {
        FieldTypes::join(
            |path: &NbtPath, _| Ok(Value::String(path.to_string())),
            |input, _| {
                let path = input.as_str().ok_or_else(|| {
                    ConversionError::Custom("Expected a string to deserialize a path from".to_string())
                })?;
                NbtPath::parse(path).map_err(|err| {
                    ConversionError::Custom(format!("Could not read a NBT path from '{path}': {err}"))
                })
            },
        )
    }
}

impl FromStr for NbtPath {
    type Err = NbtPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NbtPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for selector in &self.selectors {
            match selector {
                Selector::RootKey(key) => write_key(f, key)?,
                Selector::CompoundKey(key) => {
                    f.write_str(".")?;
                    write_key(f, key)?;
                }
                Selector::CompoundFilter(filter) => write!(f, "{filter}")?,
                Selector::ListIndex(index) => write!(f, "[{index}]")?,
                Selector::ListFilter(filter) => write!(f, "[{filter}]")?,
                Selector::EntireList => f.write_str("[]")?,
            }
        }
        Ok(())
    }
}

fn write_key(f: &mut fmt::Formatter<'_>, key: &str) -> fmt::Result {
    if !key.is_empty() && !key.chars().any(is_unquoted_terminator) {
        return f.write_str(key);
    }
    f.write_str("\"")?;
    for c in key.chars() {
        if c == '"' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    f.write_str("\"")
}

fn is_selector_start(c: char) -> bool {
    matches!(c, '.' | '{' | '[')
}

fn is_unquoted_terminator(c: char) -> bool {
    matches!(c, '.' | '\'' | '"' | '{' | '}' | '[' | ']')
}

struct PathReader<'a> {
    input: &'a str,
    position: usize,
}

impl PathReader<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    /// `None` means nothing valid could be read.
    fn read_selector(&mut self) -> Result<Option<Selector>, NbtPathError> {
        match self.peek() {
            Some('.') => {
                self.next();
                Ok(self.read_string().map(Selector::CompoundKey))
            }
            Some('{') => Ok(Some(Selector::CompoundFilter(self.read_compound()?))),
            Some('[') => {
                self.next();
                let selector = match self.peek() {
                    Some(']') => Selector::EntireList,
                    Some('{') => Selector::ListFilter(self.read_compound()?),
                    Some(c) if c == '-' || c.is_ascii_digit() => match self.read_integer() {
                        Some(index) => Selector::ListIndex(index),
                        None => return Ok(None),
                    },
                    _ => return Ok(None),
                };
                match self.next() {
                    Some(']') => Ok(Some(selector)),
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    fn read_compound(&mut self) -> Result<NbtCompound, NbtPathError> {
        let mut reader = SnbtReader::at(self.input, self.position);
        let compound = reader.read_compound()?;
        self.position = reader.position();
        Ok(compound)
    }

    fn read_integer(&mut self) -> Option<i32> {
        let start = self.position;
        while self.peek().is_some_and(|c| c == '-' || c.is_ascii_digit()) {
            self.next();
        }
        self.input[start..self.position].parse().ok()
    }

    fn read_string(&mut self) -> Option<String> {
        let quote = self.peek()?;
        let mut string = String::new();
        if quote == '"' || quote == '\'' {
            self.next();
            loop {
                match self.next()? {
                    '\\' => match self.next()? {
                        c if c == quote || c == '\\' => string.push(c),
                        c => {
                            string.push('\\');
                            string.push(c);
                        }
                    },
                    c if c == quote => return Some(string),
                    c => string.push(c),
                }
            }
        }
        while let Some(c) = self.peek().filter(|c| !is_unquoted_terminator(*c)) {
            string.push(c);
            self.next();
        }
        (!string.is_empty()).then_some(string)
    }
}
