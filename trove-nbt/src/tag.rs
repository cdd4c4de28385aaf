use std::fmt::{self, Display, Write as _};
use std::io::{Read, Write};

use crate::compound::NbtCompound;
use crate::io_adaptor::{ReadAdaptor, Result, WriteAdaptor};
use crate::*;

#[derive(Clone, Debug, PartialEq, PartialOrd)]
#[repr(u8)]
pub enum NbtTag {
    End = END_ID,
    Byte(i8) = BYTE_ID,
    Short(i16) = SHORT_ID,
    Int(i32) = INT_ID,
    Long(i64) = LONG_ID,
    Float(f32) = FLOAT_ID,
    Double(f64) = DOUBLE_ID,
    ByteArray(Box<[u8]>) = BYTE_ARRAY_ID,
    String(String) = STRING_ID,
    List(Vec<NbtTag>) = LIST_ID,
    Compound(NbtCompound) = COMPOUND_ID,
    IntArray(Box<[i32]>) = INT_ARRAY_ID,
    LongArray(Box<[i64]>) = LONG_ARRAY_ID,
}

impl NbtTag {
    /// Returns the numeric id associated with the data type.
    pub const fn get_type_id(&self) -> u8 {
        // See https://doc.rust-lang.org/reference/items/enumerations.html#pointer-casting
        unsafe { *(self as *const Self as *const u8) }
    }

    /// The element type of a list, or `END_ID` for empty lists and non-lists.
    pub fn list_type_id(&self) -> u8 {
        match self {
            NbtTag::List(list) => list.first().map_or(END_ID, NbtTag::get_type_id),
            _ => END_ID,
        }
    }

    pub fn serialize<W>(&self, w: &mut WriteAdaptor<W>) -> Result<()>
    where
        W: Write,
    {
        w.write_u8_be(self.get_type_id())?;
        self.serialize_data(w)
    }

    pub fn serialize_data<W>(&self, w: &mut WriteAdaptor<W>) -> Result<()>
    where
        W: Write,
    {
        match self {
            NbtTag::End => {}
            NbtTag::Byte(byte) => w.write_i8_be(*byte)?,
            NbtTag::Short(short) => w.write_i16_be(*short)?,
            NbtTag::Int(int) => w.write_i32_be(*int)?,
            NbtTag::Long(long) => w.write_i64_be(*long)?,
            NbtTag::Float(float) => w.write_f32_be(*float)?,
            NbtTag::Double(double) => w.write_f64_be(*double)?,
            NbtTag::ByteArray(byte_array) => {
                write_length(w, byte_array.len())?;
                w.write_slice(byte_array)?;
            }
            NbtTag::String(string) => {
                let java_string = cesu8::to_java_cesu8(string);
                let len = java_string.len();
                if len > u16::MAX as usize {
                    return Err(Error::LargeLength(len));
                }

                w.write_u16_be(len as u16)?;
                w.write_slice(&java_string)?;
            }
            NbtTag::List(list) => {
                let element_id = self.list_type_id();
                w.write_u8_be(element_id)?;
                write_length(w, list.len())?;
                for nbt_tag in list {
                    if nbt_tag.get_type_id() != element_id {
                        return Err(Error::MixedList {
                            expected: element_id,
                            found: nbt_tag.get_type_id(),
                        });
                    }
                    nbt_tag.serialize_data(w)?;
                }
            }
            NbtTag::Compound(compound) => {
                compound.serialize_content(w)?;
            }
            NbtTag::IntArray(int_array) => {
                write_length(w, int_array.len())?;
                for int in int_array {
                    w.write_i32_be(*int)?;
                }
            }
            NbtTag::LongArray(long_array) => {
                write_length(w, long_array.len())?;
                for long in long_array {
                    w.write_i64_be(*long)?;
                }
            }
        };
        Ok(())
    }

    pub fn deserialize<R>(reader: &mut ReadAdaptor<R>) -> Result<NbtTag>
    where
        R: Read,
    {
        let tag_id = reader.get_u8_be()?;
        Self::deserialize_data(reader, tag_id)
    }

    pub fn skip_data<R>(reader: &mut ReadAdaptor<R>, tag_id: u8) -> Result<()>
    where
        R: Read,
    {
        match tag_id {
            END_ID => Ok(()),
            BYTE_ID => reader.skip_bytes(1),
            SHORT_ID => reader.skip_bytes(2),
            INT_ID | FLOAT_ID => reader.skip_bytes(4),
            LONG_ID | DOUBLE_ID => reader.skip_bytes(8),
            BYTE_ARRAY_ID => {
                let len = read_length(reader)?;
                reader.skip_bytes(len as u64)
            }
            STRING_ID => {
                let len = reader.get_u16_be()?;
                reader.skip_bytes(len as u64)
            }
            LIST_ID => {
                let tag_type_id = reader.get_u8_be()?;
                let len = read_length(reader)?;
                for _ in 0..len {
                    Self::skip_data(reader, tag_type_id)?;
                }
                Ok(())
            }
            COMPOUND_ID => NbtCompound::skip_content(reader),
            INT_ARRAY_ID => {
                let len = read_length(reader)?;
                reader.skip_bytes(len as u64 * 4)
            }
            LONG_ARRAY_ID => {
                let len = read_length(reader)?;
                reader.skip_bytes(len as u64 * 8)
            }
            _ => Err(Error::UnknownTagId(tag_id)),
        }
    }

    pub fn deserialize_data<R>(reader: &mut ReadAdaptor<R>, tag_id: u8) -> Result<NbtTag>
    where
        R: Read,
    {
        match tag_id {
            END_ID => Ok(NbtTag::End),
            BYTE_ID => Ok(NbtTag::Byte(reader.get_i8_be()?)),
            SHORT_ID => Ok(NbtTag::Short(reader.get_i16_be()?)),
            INT_ID => Ok(NbtTag::Int(reader.get_i32_be()?)),
            LONG_ID => Ok(NbtTag::Long(reader.get_i64_be()?)),
            FLOAT_ID => Ok(NbtTag::Float(reader.get_f32_be()?)),
            DOUBLE_ID => Ok(NbtTag::Double(reader.get_f64_be()?)),
            BYTE_ARRAY_ID => {
                let len = read_length(reader)?;
                Ok(NbtTag::ByteArray(reader.read_boxed_slice(len)?))
            }
            STRING_ID => Ok(NbtTag::String(get_nbt_string(reader)?)),
            LIST_ID => {
                let tag_type_id = reader.get_u8_be()?;
                let len = read_length(reader)?;

                let mut list = Vec::with_capacity(len);
                for _ in 0..len {
                    list.push(NbtTag::deserialize_data(reader, tag_type_id)?);
                }
                Ok(NbtTag::List(list))
            }
            COMPOUND_ID => Ok(NbtTag::Compound(NbtCompound::deserialize_content(reader)?)),
            INT_ARRAY_ID => {
                let len = read_length(reader)?;
                let mut int_array = Vec::with_capacity(len);
                for _ in 0..len {
                    int_array.push(reader.get_i32_be()?);
                }
                Ok(NbtTag::IntArray(int_array.into_boxed_slice()))
            }
            LONG_ARRAY_ID => {
                let len = read_length(reader)?;
                let mut long_array = Vec::with_capacity(len);
                for _ in 0..len {
                    long_array.push(reader.get_i64_be()?);
                }
                Ok(NbtTag::LongArray(long_array.into_boxed_slice()))
            }
            _ => Err(Error::UnknownTagId(tag_id)),
        }
    }

    /// Checks that everything in `self` is also present in `comparison`.
    ///
    /// Compounds in `comparison` may carry keys that `self` does not. When
    /// `assure_list_order` is false, lists only need to contain a match for
    /// each element of `self`, and an empty list only matches an empty list.
    pub fn matches(&self, comparison: &NbtTag, assure_list_order: bool) -> bool {
        if self.get_type_id() != comparison.get_type_id() {
            return false;
        }
        match (self, comparison) {
            (NbtTag::List(guarantee), NbtTag::List(compare)) if !assure_list_order => {
                if guarantee.is_empty() {
                    return compare.is_empty();
                }
                guarantee
                    .iter()
                    .all(|nbt| compare.iter().any(|other| nbt.matches(other, false)))
            }
            (NbtTag::Compound(guarantee), NbtTag::Compound(compare)) => {
                guarantee.matches(compare, assure_list_order)
            }
            _ => self == comparison,
        }
    }

    pub fn extract_byte(&self) -> Option<i8> {
        match self {
            NbtTag::Byte(byte) => Some(*byte),
            _ => None,
        }
    }

    pub fn extract_short(&self) -> Option<i16> {
        match self {
            NbtTag::Short(short) => Some(*short),
            _ => None,
        }
    }

    pub fn extract_int(&self) -> Option<i32> {
        match self {
            NbtTag::Int(int) => Some(*int),
            _ => None,
        }
    }

    pub fn extract_long(&self) -> Option<i64> {
        match self {
            NbtTag::Long(long) => Some(*long),
            _ => None,
        }
    }

    pub fn extract_float(&self) -> Option<f32> {
        match self {
            NbtTag::Float(float) => Some(*float),
            _ => None,
        }
    }

    pub fn extract_double(&self) -> Option<f64> {
        match self {
            NbtTag::Double(double) => Some(*double),
            _ => None,
        }
    }

    /// Reads any numeric tag, widening it to an `f64`.
    pub fn extract_number(&self) -> Option<f64> {
        match self {
            NbtTag::Byte(value) => Some(*value as f64),
            NbtTag::Short(value) => Some(*value as f64),
            NbtTag::Int(value) => Some(*value as f64),
            NbtTag::Long(value) => Some(*value as f64),
            NbtTag::Float(value) => Some(*value as f64),
            NbtTag::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn extract_bool(&self) -> Option<bool> {
        match self {
            NbtTag::Byte(byte) => Some(*byte != 0),
            _ => None,
        }
    }

    pub fn extract_byte_array(&self) -> Option<&[u8]> {
        match self {
            NbtTag::ByteArray(byte_array) => Some(byte_array),
            _ => None,
        }
    }

    pub fn extract_string(&self) -> Option<&String> {
        match self {
            NbtTag::String(string) => Some(string),
            _ => None,
        }
    }

    pub fn extract_list(&self) -> Option<&[NbtTag]> {
        match self {
            NbtTag::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn extract_list_mut(&mut self) -> Option<&mut Vec<NbtTag>> {
        match self {
            NbtTag::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn extract_compound(&self) -> Option<&NbtCompound> {
        match self {
            NbtTag::Compound(compound) => Some(compound),
            _ => None,
        }
    }

    pub fn extract_compound_mut(&mut self) -> Option<&mut NbtCompound> {
        match self {
            NbtTag::Compound(compound) => Some(compound),
            _ => None,
        }
    }

    pub fn extract_int_array(&self) -> Option<&[i32]> {
        match self {
            NbtTag::IntArray(int_array) => Some(int_array),
            _ => None,
        }
    }

    pub fn extract_long_array(&self) -> Option<&[i64]> {
        match self {
            NbtTag::LongArray(long_array) => Some(long_array),
            _ => None,
        }
    }
}

fn write_length<W: Write>(w: &mut WriteAdaptor<W>, len: usize) -> Result<()> {
    if len > i32::MAX as usize {
        return Err(Error::LargeLength(len));
    }
    w.write_i32_be(len as i32)
}

fn read_length<R: Read>(reader: &mut ReadAdaptor<R>) -> Result<usize> {
    let len = reader.get_i32_be()?;
    if len < 0 {
        return Err(Error::NegativeLength(len));
    }
    Ok(len as usize)
}

/// Quotes `string` unless it is a plain SNBT word.
pub(crate) fn write_snbt_string(f: &mut fmt::Formatter<'_>, string: &str, allow_bare: bool) -> fmt::Result {
    if allow_bare && !string.is_empty() && string.chars().all(snbt::is_bare_char) {
        return f.write_str(string);
    }
    f.write_char('"')?;
    for c in string.chars() {
        if c == '"' || c == '\\' {
            f.write_char('\\')?;
        }
        f.write_char(c)?;
    }
    f.write_char('"')
}

fn write_joined<T>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    mut each: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_char(',')?;
        }
        each(f, item)?;
    }
    Ok(())
}

impl Display for NbtTag {
    /// Writes the tag in SNBT form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NbtTag::End => Ok(()),
            NbtTag::Byte(value) => write!(f, "{value}b"),
            NbtTag::Short(value) => write!(f, "{value}s"),
            NbtTag::Int(value) => write!(f, "{value}"),
            NbtTag::Long(value) => write!(f, "{value}L"),
            NbtTag::Float(value) => write!(f, "{value}f"),
            NbtTag::Double(value) => write!(f, "{value}d"),
            NbtTag::String(value) => write_snbt_string(f, value, false),
            NbtTag::ByteArray(values) => {
                f.write_str("[B;")?;
                write_joined(f, values, |f, value| write!(f, "{}b", *value as i8))?;
                f.write_char(']')
            }
            NbtTag::IntArray(values) => {
                f.write_str("[I;")?;
                write_joined(f, values, |f, value| write!(f, "{value}"))?;
                f.write_char(']')
            }
            NbtTag::LongArray(values) => {
                f.write_str("[L;")?;
                write_joined(f, values, |f, value| write!(f, "{value}L"))?;
                f.write_char(']')
            }
            NbtTag::List(values) => {
                f.write_char('[')?;
                write_joined(f, values, |f, value| write!(f, "{value}"))?;
                f.write_char(']')
            }
            NbtTag::Compound(compound) => write!(f, "{compound}"),
        }
    }
}

impl From<&str> for NbtTag {
    fn from(value: &str) -> Self {
        NbtTag::String(value.to_string())
    }
}

impl From<String> for NbtTag {
    fn from(value: String) -> Self {
        NbtTag::String(value)
    }
}

impl From<&[u8]> for NbtTag {
    fn from(value: &[u8]) -> Self {
        NbtTag::ByteArray(value.into())
    }
}

impl From<i8> for NbtTag {
    fn from(value: i8) -> Self {
        NbtTag::Byte(value)
    }
}

impl From<i16> for NbtTag {
    fn from(value: i16) -> Self {
        NbtTag::Short(value)
    }
}

impl From<i32> for NbtTag {
    fn from(value: i32) -> Self {
        NbtTag::Int(value)
    }
}

impl From<i64> for NbtTag {
    fn from(value: i64) -> Self {
        NbtTag::Long(value)
    }
}

impl From<f32> for NbtTag {
    fn from(value: f32) -> Self {
        NbtTag::Float(value)
    }
}

impl From<f64> for NbtTag {
    fn from(value: f64) -> Self {
        NbtTag::Double(value)
    }
}

impl From<bool> for NbtTag {
    fn from(value: bool) -> Self {
        NbtTag::Byte(value as i8)
    }
}

impl From<NbtCompound> for NbtTag {
    fn from(value: NbtCompound) -> Self {
        NbtTag::Compound(value)
    }
}

impl From<Vec<NbtTag>> for NbtTag {
    fn from(value: Vec<NbtTag>) -> Self {
        NbtTag::List(value)
    }
}

#[cfg(test)]
mod test {
    use crate::compound::NbtCompound;
    use crate::tag::NbtTag;

    fn compound(entries: &[(&str, NbtTag)]) -> NbtTag {
        let mut compound = NbtCompound::new();
        for (key, value) in entries {
            compound.put(key, value.clone());
        }
        NbtTag::Compound(compound)
    }

    #[test]
    fn matches_allows_extra_keys() {
        let guarantee = compound(&[("a", NbtTag::Int(1))]);
        let comparison = compound(&[("a", NbtTag::Int(1)), ("b", NbtTag::Int(2))]);
        assert!(guarantee.matches(&comparison, false));
        assert!(!comparison.matches(&guarantee, false));
    }

    #[test]
    fn matches_lists_unordered() {
        let guarantee = NbtTag::List(vec![NbtTag::Int(3), NbtTag::Int(1)]);
        let comparison = NbtTag::List(vec![NbtTag::Int(1), NbtTag::Int(2), NbtTag::Int(3)]);
        assert!(guarantee.matches(&comparison, false));
        assert!(!guarantee.matches(&comparison, true));
    }

    #[test]
    fn empty_list_only_matches_empty() {
        let guarantee = NbtTag::List(vec![]);
        assert!(guarantee.matches(&NbtTag::List(vec![]), false));
        assert!(!guarantee.matches(&NbtTag::List(vec![NbtTag::Int(1)]), false));
    }

    #[test]
    fn matches_rejects_other_types() {
        assert!(!NbtTag::Int(1).matches(&NbtTag::Long(1), false));
    }

    #[test]
    fn display_snbt() {
        let tag = compound(&[
            ("id", NbtTag::String("minecraft:stone".into())),
            ("Count", NbtTag::Byte(2)),
            ("list", NbtTag::List(vec![NbtTag::Long(1), NbtTag::Long(-2)])),
            ("ints", NbtTag::IntArray(vec![1, 2].into_boxed_slice())),
            ("with space", NbtTag::Double(0.5)),
        ]);
        assert_eq!(
            tag.to_string(),
            "{id:\"minecraft:stone\",Count:2b,list:[1L,-2L],ints:[I;1,2],\"with space\":0.5d}"
        );
    }
}
