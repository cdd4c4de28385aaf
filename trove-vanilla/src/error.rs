use std::{io, path::PathBuf};

use thiserror::Error;
use trove_core::ConversionError;
use trove_util::Identifier;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Couldn't read {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Couldn't read command storage at {path:?}: {source}")]
    Storage {
        path: PathBuf,
        source: trove_nbt::Error,
    },
    #[error("{0:?} does not name a valid key")]
    InvalidPath(PathBuf),
    #[error("Couldn't parse JSON at {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Couldn't convert {path:?}: {source}")]
    Conversion {
        path: PathBuf,
        source: ConversionError,
    },
    #[error("Table with key '{0}' could not be parsed")]
    Unparsed(Identifier),
    #[error("Unknown table key '{0}'")]
    UnknownKey(Identifier),
}
