#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![doc = include_str!("../README.md")]

extern crate self as bevy_persist;

pub mod backend;
pub mod document;
mod error;
pub mod ext;
pub mod format;
pub mod geometry;
mod persister;
pub mod plugins;
pub mod reflect;
pub mod registry;
pub mod scene;
pub mod serde;
pub mod settings;

pub use self::{
    backend::{
        Backend,
        FileIO,
    },
    error::{
        Context,
        Error,
        ErrorKind,
    },
    ext::{
        AppPersistExt,
        WorldPersistExt,
    },
    format::{
        DefaultFormat,
        Format,
        TomlFormat,
    },
    persister::{
        Persister,
        deserialize,
        deserialize_all,
        deserialize_tree,
        serialize,
        serialize_all,
        serialize_tree,
    },
    plugins::{
        PersistPlugin,
        SceneTypes,
    },
    registry::TypeRegistry,
    settings::{
        Settings,
        UnknownFieldPolicy,
    },
};

#[cfg(feature = "json")]
pub use self::format::JsonFormat;

/// Prelude: convenient import for all the user-facing APIs provided by the crate
pub mod prelude {
    pub use crate::{
        AppPersistExt,
        Backend,
        Context,
        Error,
        ErrorKind,
        FileIO,
        Format,
        PersistPlugin,
        Persister,
        SceneTypes,
        Settings,
        TomlFormat,
        TypeRegistry,
        UnknownFieldPolicy,
        WorldPersistExt,
        geometry::{
            MeshGeometry,
            Vertex,
        },
        reflect::{
            Field,
            FieldKind,
            Origin,
            Primitive,
            PrimitiveKind,
            Reflected,
            TypeDescriptor,
            TypeGuid,
            Value,
        },
        scene::{
            Material,
            MeshNode,
            Node,
            register_scene_types,
        },
    };
}
