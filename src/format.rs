//! [`Format`] handles encoding and decoding of text documents.

use toml::Table;

use crate::error::Error;

/// Encodes and decodes the structured text of a document.
///
/// Every format carries the same logical document: a table of sections, each
/// a table of field values.
pub trait Format {
    /// The file extension used by the format, without the dot.
    ///
    /// Defaults to `toml`.
    fn extension() -> &'static str {
        "toml"
    }

    /// Encodes a document table.
    ///
    /// # Errors
    /// If the table cannot be represented by the format.
    fn encode(table: &Table) -> Result<Vec<u8>, Error>;

    /// Decodes a document table.
    ///
    /// # Errors
    /// If the input is not a valid document in this format.
    fn decode(bytes: &[u8]) -> Result<Table, Error>;
}

/// An implementation of [`Format`] that uses [`toml`].
pub struct TomlFormat;

impl Format for TomlFormat {
    fn encode(table: &Table) -> Result<Vec<u8>, Error> {
        toml::to_string_pretty(table)
            .map(String::into_bytes)
            .map_err(Error::parse)
    }

    fn decode(bytes: &[u8]) -> Result<Table, Error> {
        let text = std::str::from_utf8(bytes).map_err(Error::parse)?;
        text.parse::<Table>().map_err(Error::parse)
    }
}

/// An implementation of [`Format`] that uses [`serde_json`].
#[cfg(feature = "json")]
pub struct JsonFormat;

#[cfg(feature = "json")]
impl Format for JsonFormat {
    fn extension() -> &'static str {
        "json"
    }

    fn encode(table: &Table) -> Result<Vec<u8>, Error> {
        serde_json::to_vec_pretty(table).map_err(Error::parse)
    }

    fn decode(bytes: &[u8]) -> Result<Table, Error> {
        serde_json::from_slice(bytes).map_err(Error::parse)
    }
}

/// A reasonable default [`Format`], human-editable.
pub type DefaultFormat = TomlFormat;
