use crate::compound::NbtCompound;
use crate::io_adaptor::ReadAdaptor;
use crate::{Error, Nbt};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

/// Reads a gzipped, named root compound from any reader.
pub fn read_gzip_compound_tag(input: impl Read) -> Result<NbtCompound, Error> {
    let mut reader = ReadAdaptor::new(GzDecoder::new(input));
    Ok(Nbt::read(&mut reader)?.root_tag)
}

/// Writes a compound as a gzipped root compound with an empty name.
pub fn write_gzip_compound_tag(compound: &NbtCompound, output: impl Write) -> Result<(), Error> {
    let mut encoder = GzEncoder::new(output, Compression::default());
    Nbt::new(String::new(), compound.clone()).write_to_writer(&mut encoder)?;
    encoder.finish().map_err(Error::Incomplete)?;
    Ok(())
}

pub fn write_gzip_compound_tag_to_bytes(compound: &NbtCompound) -> Result<Vec<u8>, Error> {
    let mut buffer = Vec::new();
    write_gzip_compound_tag(compound, &mut buffer)?;
    Ok(buffer)
}

/// Reads an NBT file, accepting both gzipped and raw files.
pub fn read_compound_file(path: &Path) -> Result<NbtCompound, Error> {
    let mut bytes = Vec::new();
    BufReader::new(File::open(path).map_err(Error::Incomplete)?)
        .read_to_end(&mut bytes)
        .map_err(Error::Incomplete)?;

    // gzip magic
    if bytes.starts_with(&[0x1F, 0x8B]) {
        read_gzip_compound_tag(&bytes[..])
    } else {
        Ok(Nbt::read(&mut ReadAdaptor::new(&bytes[..]))?.root_tag)
    }
}

#[cfg(test)]
mod tests {
    use crate::compound::NbtCompound;
    use crate::compress::{
        read_compound_file, read_gzip_compound_tag, write_gzip_compound_tag,
        write_gzip_compound_tag_to_bytes,
    };
    use crate::tag::NbtTag;
    use crate::Nbt;
    use std::fs::File;
    use std::io::Cursor;

    #[test]
    fn test_gzip_read_write_compound() {
        let mut compound = NbtCompound::new();
        compound.put_byte("byte_value", 123);
        compound.put_short("short_value", 12345);
        compound.put_long("long_value", 123456789);
        compound.put_double("double_value", 123456.789);
        compound.put_bool("bool_value", true);
        compound.put("string_value", NbtTag::String("test string".to_string()));

        let mut nested = NbtCompound::new();
        nested.put_int("nested_int", 42);
        compound.put_component("nested_compound", nested);

        let mut buffer = Vec::new();
        write_gzip_compound_tag(&compound, &mut buffer).expect("Failed to compress compound");

        let read_compound =
            read_gzip_compound_tag(Cursor::new(&buffer)).expect("Failed to decompress compound");

        assert_eq!(read_compound, compound);
        assert_eq!(
            read_compound
                .get_compound("nested_compound")
                .and_then(|nested| nested.get_int("nested_int")),
            Some(42)
        );
    }

    #[test]
    fn test_gzip_empty_compound() {
        let buffer = write_gzip_compound_tag_to_bytes(&NbtCompound::new())
            .expect("Failed to compress empty compound");
        let read_compound = read_gzip_compound_tag(Cursor::new(buffer))
            .expect("Failed to decompress empty compound");

        assert!(read_compound.is_empty());
    }

    #[test]
    fn test_gzip_invalid_data() {
        let invalid_data = vec![1, 2, 3, 4, 5];
        assert!(read_gzip_compound_tag(Cursor::new(invalid_data)).is_err());
    }

    #[test]
    fn test_file_io_detects_compression() {
        use tempfile::tempdir;

        let temp_dir = tempdir().expect("Failed to create temporary directory");
        let gzipped = temp_dir.path().join("gzipped.dat");
        let raw = temp_dir.path().join("raw.nbt");

        let mut compound = NbtCompound::new();
        compound.put_int("test_value", 42);

        let file = File::create(&gzipped).expect("Failed to create temp file");
        write_gzip_compound_tag(&compound, file).expect("Failed to write compound to file");
        let file = File::create(&raw).expect("Failed to create temp file");
        Nbt::from(compound.clone())
            .write_to_writer(file)
            .expect("Failed to write raw compound");

        assert_eq!(read_compound_file(&gzipped).unwrap(), compound);
        assert_eq!(read_compound_file(&raw).unwrap(), compound);
    }
}
