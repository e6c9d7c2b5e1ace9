//! The logical text document: an ordered list of sections.
//!
//! ```toml
//! ".version" = "1.0.0"
//!
//! ["0.4b7e…-node"]
//! ".id" = "root"
//! name = "level"
//!
//! ["1.9c21…-mesh-node"]
//! ".parent" = 0
//! ".path_to_original" = "/abs/props.toml"
//! ".original_section" = "0.9c21…-mesh-node"
//! material = "brass"
//! ```

use std::{
    collections::HashSet,
    path::PathBuf,
};

use bevy::log::warn;
use semver::{
    Version,
    VersionReq,
};
use toml::Table;

use crate::error::{
    Error,
    ErrorKind,
};

/// Version written into every document.
pub const FORMAT_VERSION: Version = Version::new(1, 0, 0);

/// Versions this crate can read.
pub const SUPPORTED_VERSIONS: &str = "^1";

/// Prefix of every reserved document key. Field names may not use it.
pub const RESERVED_PREFIX: char = '.';

/// Top-level key holding the document version.
pub const VERSION_KEY: &str = ".version";

/// Section key holding the parent section index.
pub const PARENT_KEY: &str = ".parent";

/// Section key holding the custom unique object identifier.
pub const ID_KEY: &str = ".id";

/// Section key holding the path of the document a back-reference points at.
pub const ORIGINAL_PATH_KEY: &str = ".path_to_original";

/// Section key holding the section a back-reference points at.
pub const ORIGINAL_SECTION_KEY: &str = ".original_section";

/// A pointer to the section an object was loaded from, standing in for the
/// fields that have not changed since.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackReference {
    /// Path of the referenced document.
    pub path: PathBuf,
    /// Key of the referenced section.
    pub section: String,
}

/// One serialized object.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    /// Position of the section in traversal order.
    pub index: u32,
    /// GUID of the object's most-derived type.
    pub guid: String,
    /// Index of the owning parent section.
    pub parent: Option<u32>,
    /// Custom unique object identifier.
    pub id: Option<String>,
    /// Back-reference supplying omitted fields.
    pub original: Option<BackReference>,
    /// Inline field values, keyed by field name.
    pub fields: Table,
}

impl Section {
    /// Creates an empty section.
    pub fn new(index: u32, guid: impl Into<String>) -> Self {
        Self {
            index,
            guid: guid.into(),
            parent: None,
            id: None,
            original: None,
            fields: Table::new(),
        }
    }

    /// The section key, `<index>.<guid>`, which also identifies the section
    /// in back-references.
    pub fn key(&self) -> String {
        section_key(self.index, &self.guid)
    }

    fn to_table(&self) -> Table {
        let mut table = Table::new();

        if let Some(parent) = self.parent {
            table.insert(PARENT_KEY.into(), toml::Value::Integer(i64::from(parent)));
        }

        if let Some(id) = &self.id {
            table.insert(ID_KEY.into(), toml::Value::String(id.clone()));
        }

        if let Some(original) = &self.original {
            table.insert(
                ORIGINAL_PATH_KEY.into(),
                toml::Value::String(original.path.to_string_lossy().into_owned()),
            );
            table.insert(
                ORIGINAL_SECTION_KEY.into(),
                toml::Value::String(original.section.clone()),
            );
        }

        table.extend(self.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        table
    }

    fn from_table(key: &str, mut table: Table) -> Result<Self, Error> {
        let (index, guid) = parse_section_key(key)?;
        let mut section = Self::new(index, guid);

        section.parent = match table.remove(PARENT_KEY) {
            Some(value) => Some(
                value
                    .as_integer()
                    .and_then(|i| u32::try_from(i).ok())
                    .ok_or_else(|| Error::invalid_value(PARENT_KEY, "section index"))?,
            ),
            None => None,
        };

        section.id = match table.remove(ID_KEY) {
            Some(toml::Value::String(id)) => Some(id),
            Some(_) => return Err(Error::invalid_value(ID_KEY, "string")),
            None => None,
        };

        section.original = match (table.remove(ORIGINAL_PATH_KEY), table.remove(ORIGINAL_SECTION_KEY)) {
            (Some(toml::Value::String(path)), Some(toml::Value::String(section))) => Some(BackReference {
                path: PathBuf::from(path),
                section,
            }),
            (None, None) => None,
            _ => {
                return Err(Error::invalid_value(
                    ORIGINAL_PATH_KEY,
                    format!("string paired with a `{ORIGINAL_SECTION_KEY}` string"),
                ));
            }
        };

        table.retain(|name, _| {
            let reserved = name.starts_with(RESERVED_PREFIX);
            if reserved {
                warn!("ignoring unrecognized reserved key `{name}` in section `{key}`");
            }
            !reserved
        });

        section.fields = table;
        Ok(section)
    }
}

/// Formats a section key.
pub fn section_key(index: u32, guid: &str) -> String {
    format!("{index}.{guid}")
}

/// Splits a section key into its index and GUID.
///
/// # Errors
/// - [`ErrorKind::Parse`] if the key is not `<index>.<guid>`.
pub fn parse_section_key(key: &str) -> Result<(u32, &str), Error> {
    key.split_once('.')
        .and_then(|(index, guid)| Some((index.parse().ok()?, guid)))
        .filter(|(_, guid)| !guid.is_empty())
        .ok_or_else(|| Error::parse(format!("`{key}` is not a `<index>.<guid>` section key")))
}

/// An ordered collection of [`Section`]s.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    /// Sections in traversal order.
    pub sections: Vec<Section>,
}

impl Document {
    /// Finds a section by key.
    pub fn section(&self, key: &str) -> Option<&Section> {
        let (index, guid) = parse_section_key(key).ok()?;

        self.sections
            .iter()
            .find(|s| s.index == index && s.guid == guid)
    }

    /// Sections without a parent, in document order.
    pub fn roots(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.parent.is_none())
    }

    /// Direct children of the section at `index`, in document order.
    pub fn children_of(&self, index: u32) -> impl Iterator<Item = &Section> {
        self.sections
            .iter()
            .filter(move |s| s.parent == Some(index))
    }

    /// Builds the structured table written by a [`Format`](crate::Format).
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();

        table.insert(VERSION_KEY.into(), toml::Value::String(FORMAT_VERSION.to_string()));

        for section in &self.sections {
            table.insert(section.key(), toml::Value::Table(section.to_table()));
        }

        table
    }

    /// Reads a document from the structured table produced by a [`Format`](crate::Format).
    ///
    /// # Errors
    /// - [`ErrorKind::UnsupportedVersion`] if the document version is incompatible.
    /// - [`ErrorKind::Parse`] if the structure is invalid: non-table sections,
    ///   malformed keys, repeated indices, or parents that do not precede their
    ///   children.
    pub fn from_table(mut table: Table) -> Result<Self, Error> {
        if let Some(version) = table.remove(VERSION_KEY) {
            check_version(&version)?;
        }

        let mut seen = HashSet::new();
        let mut sections = Vec::with_capacity(table.len());

        for (key, value) in table {
            let toml::Value::Table(body) = value else {
                return Err(Error::parse(format!("`{key}` is not a section table")));
            };

            let section = Section::from_table(&key, body)
                .map_err(|e| e.with_context(format!("reading section `{key}`")))?;

            if let Some(parent) = section.parent {
                if !seen.contains(&parent) {
                    return Err(Error::parse(format!(
                        "section `{key}` names parent {parent}, which does not precede it"
                    )));
                }
            }

            if !seen.insert(section.index) {
                return Err(Error::parse(format!("section index {} is repeated", section.index)));
            }

            sections.push(section);
        }

        Ok(Self { sections })
    }
}

fn check_version(value: &toml::Value) -> Result<(), Error> {
    let text = value
        .as_str()
        .ok_or_else(|| Error::invalid_value(VERSION_KEY, "semver string"))?;

    let version = Version::parse(text).map_err(Error::parse)?;
    let supported = VersionReq::parse(SUPPORTED_VERSIONS).map_err(Error::parse)?;

    if supported.matches(&version) {
        Ok(())
    } else {
        Err(ErrorKind::UnsupportedVersion {
            found: version.to_string(),
            supported: SUPPORTED_VERSIONS.into(),
        }
        .into())
    }
}
