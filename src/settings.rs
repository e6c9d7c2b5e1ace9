//! Persistence settings.

use bevy::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};

use crate::error::Error;

/// What to do with a stored field that the loaded type no longer declares.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFieldPolicy {
    /// Log a warning and skip the field.
    #[default]
    Warn,
    /// Abort the load with [`ErrorKind::UnknownField`](crate::ErrorKind::UnknownField).
    Error,
}

/// Settings shared by serialization and deserialization.
///
/// Can be inserted as a [`Resource`] by [`PersistPlugin`](crate::PersistPlugin)
/// or loaded from a TOML snippet with [`Settings::from_toml_str`].
#[derive(Resource, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Appended to a document's file stem to name its geometry directory.
    pub geometry_dir_suffix: String,
    /// File extension of binary geometry side files, without the dot.
    pub binary_extension: String,
    /// Handling of stored fields missing from the registered type.
    pub unknown_fields: UnknownFieldPolicy,
    /// Maximum number of back-reference hops followed for one section.
    pub max_reference_depth: usize,
    /// Also write a self-contained `<stem>.text.<ext>` copy with geometry
    /// inlined and no side files.
    pub text_only_copy: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            geometry_dir_suffix: "_geometry".into(),
            binary_extension: "geom".into(),
            unknown_fields: UnknownFieldPolicy::Warn,
            max_reference_depth: 64,
            text_only_copy: false,
        }
    }
}

impl Settings {
    /// Parses settings from TOML. Missing keys keep their defaults.
    ///
    /// # Errors
    /// - [`ErrorKind::Parse`](crate::ErrorKind::Parse) if the input is not valid settings.
    pub fn from_toml_str(input: &str) -> Result<Self, Error> {
        toml::from_str(input).map_err(|e| Error::parse(e).with_context("parsing persistence settings"))
    }

    /// Sets [`text_only_copy`](Self::text_only_copy).
    #[must_use]
    pub fn with_text_only_copy(mut self, enabled: bool) -> Self {
        self.text_only_copy = enabled;
        self
    }

    /// Sets [`unknown_fields`](Self::unknown_fields).
    #[must_use]
    pub fn with_unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }
}
