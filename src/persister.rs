//! [`Persister`] ties a registry, a [`Backend`] and a [`Format`] together.

use std::{
    marker::PhantomData,
    path::Path,
};

use crate::{
    backend::{
        Backend,
        FileIO,
    },
    error::Error,
    format::{
        DefaultFormat,
        Format,
    },
    reflect::{
        Reflected,
        TypeGuid,
    },
    registry::TypeRegistry,
    serde::{
        Deserializer,
        Serializer,
    },
    settings::Settings,
};

/// Saves and loads object graphs using a borrowed [`TypeRegistry`].
///
/// ```no_run
/// # use bevy_persist::prelude::*;
/// # fn main() -> Result<(), Error> {
/// let mut registry = TypeRegistry::new();
/// register_scene_types(&mut registry)?;
///
/// let persister = Persister::new(&registry);
///
/// let mut level = Node::new("level");
/// level.add_child(Node::new("door"));
///
/// persister.serialize_tree(&level, "level.toml")?;
///
/// let loaded = persister.deserialize_tree("level.toml")?;
/// assert_eq!(loaded.children().len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Persister<'r, B = FileIO, F = DefaultFormat> {
    registry: &'r TypeRegistry,
    backend: B,
    settings: Settings,
    _format: PhantomData<fn() -> F>,
}

impl<'r> Persister<'r> {
    /// Creates a persister using [`FileIO`], [`DefaultFormat`] and default [`Settings`].
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            backend: FileIO,
            settings: Settings::default(),
            _format: PhantomData,
        }
    }
}

impl<'r, B, F> Persister<'r, B, F>
where
    B: Backend,
    F: Format,
{
    /// Replaces the [`Backend`].
    pub fn with_backend<B2: Backend>(self, backend: B2) -> Persister<'r, B2, F> {
        Persister {
            registry: self.registry,
            backend,
            settings: self.settings,
            _format: PhantomData,
        }
    }

    /// Replaces the [`Format`].
    pub fn with_format<F2: Format>(self) -> Persister<'r, B, F2> {
        Persister {
            registry: self.registry,
            backend: self.backend,
            settings: self.settings,
            _format: PhantomData,
        }
    }

    /// Replaces the [`Settings`].
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// The registry used to resolve types.
    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// The active settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn serializer(&self) -> Serializer<'_, B, F> {
        Serializer::new(self.registry, &self.backend, &self.settings)
    }

    fn deserializer(&self) -> Deserializer<'_, B, F> {
        Deserializer::new(self.registry, &self.backend, &self.settings)
    }

    /// Writes `object` alone, without its children, to `path`.
    ///
    /// # Errors
    /// See [`Serializer::write`].
    pub fn serialize(&self, object: &dyn Reflected, path: impl AsRef<Path>) -> Result<(), Error> {
        self.serializer().write(&[object], path.as_ref(), false)
    }

    /// Writes `root` and all of its descendants to `path`.
    ///
    /// # Errors
    /// See [`Serializer::write`].
    pub fn serialize_tree(&self, root: &dyn Reflected, path: impl AsRef<Path>) -> Result<(), Error> {
        self.serializer().write(&[root], path.as_ref(), true)
    }

    /// Writes several top-level objects, each with its descendants, to one
    /// document.
    ///
    /// # Errors
    /// See [`Serializer::write`].
    pub fn serialize_all(&self, roots: &[&dyn Reflected], path: impl AsRef<Path>) -> Result<(), Error> {
        self.serializer().write(roots, path.as_ref(), true)
    }

    /// Loads the first top-level object of `path`, without its children.
    ///
    /// The stored type must be `T` or one of its descendants; the result may
    /// be the more-derived type, and [`part_of::<T>`](dyn Reflected::part_of)
    /// always succeeds on it.
    ///
    /// # Errors
    /// See [`Deserializer::read_root`].
    pub fn deserialize<T: TypeGuid>(&self, path: impl AsRef<Path>) -> Result<Box<dyn Reflected>, Error> {
        self.deserializer()
            .read_root(path.as_ref(), Some(T::GUID), false)
    }

    /// Loads the first top-level object of `path` with all of its descendants.
    ///
    /// # Errors
    /// See [`Deserializer::read_root`].
    pub fn deserialize_tree(&self, path: impl AsRef<Path>) -> Result<Box<dyn Reflected>, Error> {
        self.deserializer().read_root(path.as_ref(), None, true)
    }

    /// Loads every top-level object of `path`, in order, with its descendants.
    ///
    /// # Errors
    /// See [`Deserializer::read_all`].
    pub fn deserialize_all(&self, path: impl AsRef<Path>) -> Result<Vec<Box<dyn Reflected>>, Error> {
        self.deserializer().read_all(path.as_ref())
    }
}

/// Writes `object` alone to `path` with the default backend, format and settings.
///
/// # Errors
/// See [`Persister::serialize`].
pub fn serialize(registry: &TypeRegistry, object: &dyn Reflected, path: impl AsRef<Path>) -> Result<(), Error> {
    Persister::new(registry).serialize(object, path)
}

/// Writes `root` and its descendants to `path` with the defaults.
///
/// # Errors
/// See [`Persister::serialize_tree`].
pub fn serialize_tree(registry: &TypeRegistry, root: &dyn Reflected, path: impl AsRef<Path>) -> Result<(), Error> {
    Persister::new(registry).serialize_tree(root, path)
}

/// Writes several top-level objects to `path` with the defaults.
///
/// # Errors
/// See [`Persister::serialize_all`].
pub fn serialize_all(registry: &TypeRegistry, roots: &[&dyn Reflected], path: impl AsRef<Path>) -> Result<(), Error> {
    Persister::new(registry).serialize_all(roots, path)
}

/// Loads the first top-level object of `path` as a `T` with the defaults.
///
/// # Errors
/// See [`Persister::deserialize`].
pub fn deserialize<T: TypeGuid>(registry: &TypeRegistry, path: impl AsRef<Path>) -> Result<Box<dyn Reflected>, Error> {
    Persister::new(registry).deserialize::<T>(path)
}

/// Loads the first top-level object of `path` with its descendants, with the defaults.
///
/// # Errors
/// See [`Persister::deserialize_tree`].
pub fn deserialize_tree(registry: &TypeRegistry, path: impl AsRef<Path>) -> Result<Box<dyn Reflected>, Error> {
    Persister::new(registry).deserialize_tree(path)
}

/// Loads every top-level object of `path` with the defaults.
///
/// # Errors
/// See [`Persister::deserialize_all`].
pub fn deserialize_all(registry: &TypeRegistry, path: impl AsRef<Path>) -> Result<Vec<Box<dyn Reflected>>, Error> {
    Persister::new(registry).deserialize_all(path)
}
