use crate::io_adaptor::{ReadAdaptor, WriteAdaptor};
use crate::tag::{write_snbt_string, NbtTag};
use crate::{get_nbt_string, Error, Nbt, END_ID};
use std::fmt::{self, Display, Write as _};
use std::io::{ErrorKind, Read, Write};
use std::vec::IntoIter;

/// An ordered NBT compound. Keys are unique and keep their insertion order.
#[derive(Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct NbtCompound {
    pub child_tags: Vec<(String, NbtTag)>,
}

impl NbtCompound {
    pub fn new() -> NbtCompound {
        NbtCompound {
            child_tags: Vec::new(),
        }
    }

    /// Reads the next tag id, treating a clean end of input as the end tag.
    fn next_tag_id<R: Read>(reader: &mut ReadAdaptor<R>) -> Result<u8, Error> {
        match reader.get_u8_be() {
            Ok(id) => Ok(id),
            Err(Error::Incomplete(err)) if err.kind() == ErrorKind::UnexpectedEof => Ok(END_ID),
            Err(err) => Err(err),
        }
    }

    pub fn skip_content<R>(reader: &mut ReadAdaptor<R>) -> Result<(), Error>
    where
        R: Read,
    {
        loop {
            let tag_id = Self::next_tag_id(reader)?;
            if tag_id == END_ID {
                break;
            }

            let len = reader.get_u16_be()?;
            reader.skip_bytes(len as u64)?;

            NbtTag::skip_data(reader, tag_id)?;
        }

        Ok(())
    }

    pub fn deserialize_content<R>(reader: &mut ReadAdaptor<R>) -> Result<NbtCompound, Error>
    where
        R: Read,
    {
        let mut compound = NbtCompound::new();

        loop {
            let tag_id = Self::next_tag_id(reader)?;
            if tag_id == END_ID {
                break;
            }

            let name = get_nbt_string(reader)?;
            let tag = NbtTag::deserialize_data(reader, tag_id)?;
            compound.insert(name, tag);
        }

        Ok(compound)
    }

    pub fn serialize_content<W>(&self, w: &mut WriteAdaptor<W>) -> Result<(), Error>
    where
        W: Write,
    {
        for (name, tag) in &self.child_tags {
            w.write_u8_be(tag.get_type_id())?;
            NbtTag::String(name.clone()).serialize_data(w)?;
            tag.serialize_data(w)?;
        }
        w.write_u8_be(END_ID)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.child_tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.child_tags.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.child_tags.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &NbtTag)> {
        self.child_tags.iter().map(|(key, value)| (key, value))
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.child_tags.iter().any(|(key, _)| key == name)
    }

    /// Adds the value only if the key is not present yet.
    pub fn put(&mut self, name: &str, value: impl Into<NbtTag>) {
        if !self.contains_key(name) {
            self.child_tags.push((name.to_string(), value.into()));
        }
    }

    /// Sets the value, replacing any previous value under the same key.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<NbtTag>) -> Option<NbtTag> {
        let name = name.into();
        let value = value.into();
        match self.get_mut(&name) {
            Some(existing) => Some(std::mem::replace(existing, value)),
            None => {
                self.child_tags.push((name, value));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<NbtTag> {
        let index = self.child_tags.iter().position(|(key, _)| key == name)?;
        Some(self.child_tags.remove(index).1)
    }

    pub fn put_byte(&mut self, name: &str, value: i8) {
        self.put(name, NbtTag::Byte(value));
    }

    pub fn put_bool(&mut self, name: &str, value: bool) {
        self.put(name, NbtTag::Byte(if value { 1 } else { 0 }));
    }

    pub fn put_short(&mut self, name: &str, value: i16) {
        self.put(name, NbtTag::Short(value));
    }

    pub fn put_int(&mut self, name: &str, value: i32) {
        self.put(name, NbtTag::Int(value));
    }

    pub fn put_long(&mut self, name: &str, value: i64) {
        self.put(name, NbtTag::Long(value));
    }

    pub fn put_float(&mut self, name: &str, value: f32) {
        self.put(name, NbtTag::Float(value));
    }

    pub fn put_double(&mut self, name: &str, value: f64) {
        self.put(name, NbtTag::Double(value));
    }

    pub fn put_string(&mut self, name: &str, value: String) {
        self.put(name, NbtTag::String(value));
    }

    pub fn put_component(&mut self, name: &str, value: NbtCompound) {
        self.put(name, NbtTag::Compound(value));
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&NbtTag> {
        self.child_tags
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    #[inline]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut NbtTag> {
        self.child_tags
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn get_byte(&self, name: &str) -> Option<i8> {
        self.get(name).and_then(|tag| tag.extract_byte())
    }

    pub fn get_short(&self, name: &str) -> Option<i16> {
        self.get(name).and_then(|tag| tag.extract_short())
    }

    pub fn get_int(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(|tag| tag.extract_int())
    }

    pub fn get_long(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|tag| tag.extract_long())
    }

    pub fn get_float(&self, name: &str) -> Option<f32> {
        self.get(name).and_then(|tag| tag.extract_float())
    }

    pub fn get_double(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|tag| tag.extract_double())
    }

    /// Reads any numeric tag under the key, widened to an `f64`.
    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|tag| tag.extract_number())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|tag| tag.extract_bool())
    }

    pub fn get_string(&self, name: &str) -> Option<&String> {
        self.get(name).and_then(|tag| tag.extract_string())
    }

    pub fn get_list(&self, name: &str) -> Option<&[NbtTag]> {
        self.get(name).and_then(|tag| tag.extract_list())
    }

    pub fn get_compound(&self, name: &str) -> Option<&NbtCompound> {
        self.get(name).and_then(|tag| tag.extract_compound())
    }

    pub fn get_compound_mut(&mut self, name: &str) -> Option<&mut NbtCompound> {
        self.get_mut(name).and_then(|tag| tag.extract_compound_mut())
    }

    /// Returns the compound under `name`, creating (or replacing a non-compound) if needed.
    pub fn compound_entry(&mut self, name: &str) -> &mut NbtCompound {
        if self.get_compound(name).is_none() {
            self.insert(name, NbtCompound::new());
        }
        match self.get_mut(name) {
            Some(NbtTag::Compound(compound)) => compound,
            _ => unreachable!("compound was inserted above"),
        }
    }

    pub fn get_int_array(&self, name: &str) -> Option<&[i32]> {
        self.get(name).and_then(|tag| tag.extract_int_array())
    }

    pub fn get_long_array(&self, name: &str) -> Option<&[i64]> {
        self.get(name).and_then(|tag| tag.extract_long_array())
    }

    /// Partial comparison; see [`NbtTag::matches`].
    pub fn matches(&self, comparison: &NbtCompound, assure_list_order: bool) -> bool {
        self.child_tags
            .iter()
            .all(|(key, value)| match comparison.get(key) {
                Some(other) => value.matches(other, assure_list_order),
                None => false,
            })
    }

    /// Writes every entry of `changes` onto this compound. Nested compounds on
    /// both sides are merged recursively instead of being replaced.
    pub fn merge(&mut self, changes: &NbtCompound) {
        for (key, value) in &changes.child_tags {
            match (self.get_mut(key), value) {
                (Some(NbtTag::Compound(base)), NbtTag::Compound(change)) => base.merge(change),
                _ => {
                    self.insert(key.clone(), value.clone());
                }
            }
        }
    }

    pub fn merged(mut self, changes: &NbtCompound) -> NbtCompound {
        self.merge(changes);
        self
    }
}

impl Display for NbtCompound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('{')?;
        for (index, (key, value)) in self.child_tags.iter().enumerate() {
            if index > 0 {
                f.write_char(',')?;
            }
            write_snbt_string(f, key, true)?;
            write!(f, ":{value}")?;
        }
        f.write_char('}')
    }
}

impl From<Nbt> for NbtCompound {
    fn from(value: Nbt) -> Self {
        value.root_tag
    }
}

impl FromIterator<(String, NbtTag)> for NbtCompound {
    fn from_iter<T: IntoIterator<Item = (String, NbtTag)>>(iter: T) -> Self {
        let mut compound = NbtCompound::new();
        for (key, value) in iter {
            compound.insert(key, value);
        }
        compound
    }
}

impl IntoIterator for NbtCompound {
    type Item = (String, NbtTag);
    type IntoIter = IntoIter<(String, NbtTag)>;

    fn into_iter(self) -> Self::IntoIter {
        self.child_tags.into_iter()
    }
}

impl Extend<(String, NbtTag)> for NbtCompound {
    fn extend<T: IntoIterator<Item = (String, NbtTag)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

// Rust's AsRef is currently not reflexive so we need to implement it manually
impl AsRef<NbtCompound> for NbtCompound {
    fn as_ref(&self) -> &NbtCompound {
        self
    }
}

#[cfg(test)]
mod test {
    use crate::compound::NbtCompound;
    use crate::tag::NbtTag;

    #[test]
    fn put_keeps_first_insert_replaces() {
        let mut compound = NbtCompound::new();
        compound.put_int("a", 1);
        compound.put_int("a", 2);
        assert_eq!(compound.get_int("a"), Some(1));

        assert_eq!(compound.insert("a", 3), Some(NbtTag::Int(1)));
        assert_eq!(compound.get_int("a"), Some(3));
        assert_eq!(compound.len(), 1);
    }

    #[test]
    fn merge_is_recursive() {
        let mut inner = NbtCompound::new();
        inner.put_int("keep", 1);
        inner.put_int("change", 1);
        let mut base = NbtCompound::new();
        base.put_component("inner", inner);
        base.put_string("name", "base".to_string());

        let mut inner_changes = NbtCompound::new();
        inner_changes.put_int("change", 2);
        let mut changes = NbtCompound::new();
        changes.put_component("inner", inner_changes);
        changes.put_string("name", "changed".to_string());

        base.merge(&changes);
        let inner = base.get_compound("inner").unwrap();
        assert_eq!(inner.get_int("keep"), Some(1));
        assert_eq!(inner.get_int("change"), Some(2));
        assert_eq!(base.get_string("name").unwrap(), "changed");
    }

    #[test]
    fn compound_entry_replaces_non_compound() {
        let mut compound = NbtCompound::new();
        compound.put_int("display", 5);
        compound.compound_entry("display").put_string("Name", "x".to_string());
        assert_eq!(
            compound
                .get_compound("display")
                .and_then(|display| display.get_string("Name"))
                .map(String::as_str),
            Some("x")
        );
    }

    #[test]
    fn remove_entry() {
        let mut compound = NbtCompound::new();
        compound.put_int("a", 1);
        compound.put_int("b", 2);
        assert_eq!(compound.remove("a"), Some(NbtTag::Int(1)));
        assert_eq!(compound.remove("a"), None);
        assert_eq!(compound.keys().collect::<Vec<_>>(), vec!["b"]);
    }
}
