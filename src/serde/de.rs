use std::{
    borrow::Cow,
    marker::PhantomData,
    path::{
        Path,
        PathBuf,
    },
    rc::Rc,
};

use bevy::log::{
    debug,
    warn,
};

use crate::{
    backend::Backend,
    document::{
        Document,
        PARENT_KEY,
        Section,
    },
    error::{
        Context,
        Error,
        ErrorKind,
    },
    format::Format,
    geometry::MeshGeometry,
    reflect::{
        FieldKind,
        Origin,
        Reflected,
        Value,
    },
    registry::TypeRegistry,
    serde::{
        blob_path,
        resolve::Documents,
    },
    settings::{
        Settings,
        UnknownFieldPolicy,
    },
};

/// State of one read call.
struct Pass<'a, B, F> {
    path: PathBuf,
    document: Rc<Document>,
    documents: Documents<'a, B, F>,
}

/// Reconstructs object graphs from documents.
///
/// Every object is default-constructed from its registered type, populated
/// from its section (following back-references for omitted fields), and
/// stamped with an [`Origin`] naming the section it came from. Post-load
/// hooks run once the whole result is built, children before parents.
pub struct Deserializer<'a, B, F> {
    registry: &'a TypeRegistry,
    backend: &'a B,
    settings: &'a Settings,
    _format: PhantomData<fn() -> F>,
}

impl<'a, B, F> Deserializer<'a, B, F>
where
    B: Backend,
    F: Format,
{
    /// Creates a deserializer.
    pub fn new(registry: &'a TypeRegistry, backend: &'a B, settings: &'a Settings) -> Self {
        Self {
            registry,
            backend,
            settings,
            _format: PhantomData,
        }
    }

    /// Loads the first top-level object of the document at `path`, with its
    /// descendants if `recursive` is set.
    ///
    /// If `expected` is given, the stored type must be that type or one of
    /// its descendants.
    ///
    /// # Errors
    /// - [`ErrorKind::MissingSection`] if the document has no top-level object.
    /// - [`ErrorKind::TypeMismatch`] if the stored type is not `expected`.
    /// - See [`read_all`](Self::read_all).
    pub fn read_root(&self, path: &Path, expected: Option<&str>, recursive: bool) -> Result<Box<dyn Reflected>, Error> {
        self.read_root_inner(path, expected, recursive)
            .context(|| format!("deserializing `{}`", path.display()))
    }

    /// Loads every top-level object of the document at `path`, in document
    /// order, each with its descendants.
    ///
    /// # Errors
    /// - [`ErrorKind::Io`] if the document or a side file cannot be read.
    /// - [`ErrorKind::UnknownType`] if a stored type is not registered.
    /// - [`ErrorKind::UnknownField`] for undeclared fields under
    ///   [`UnknownFieldPolicy::Error`].
    /// - [`ErrorKind::CyclicReference`] if back-references loop.
    /// - Any error from decoding values or from a post-load hook.
    pub fn read_all(&self, path: &Path) -> Result<Vec<Box<dyn Reflected>>, Error> {
        self.read_all_inner(path)
            .context(|| format!("deserializing `{}`", path.display()))
    }

    fn open(&self, path: &Path) -> Result<Pass<'a, B, F>, Error> {
        let mut documents = Documents::new(self.backend, self.settings.max_reference_depth);
        let path = documents.canonicalize(path)?;
        let document = documents.load(&path)?;

        Ok(Pass {
            path,
            document,
            documents,
        })
    }

    fn read_root_inner(&self, path: &Path, expected: Option<&str>, recursive: bool) -> Result<Box<dyn Reflected>, Error> {
        let mut pass = self.open(path)?;
        let document = Rc::clone(&pass.document);

        let root = document.roots().next().ok_or_else(|| ErrorKind::MissingSection {
            path: pass.path.clone(),
            section: "<top-level object>".into(),
        })?;

        if let Some(expected) = expected {
            self.registry.get(&root.guid)?;

            if !self.registry.is_derived_from(&root.guid, expected) {
                return Err(ErrorKind::TypeMismatch {
                    expected: expected.to_owned(),
                    found: root.guid.clone(),
                }
                .into());
            }
        }

        let mut object = self.build(&mut pass, root, recursive)?;
        post_load(object.as_mut())?;

        Ok(object)
    }

    fn read_all_inner(&self, path: &Path) -> Result<Vec<Box<dyn Reflected>>, Error> {
        let mut pass = self.open(path)?;
        let document = Rc::clone(&pass.document);

        let mut objects = document
            .roots()
            .map(|root| self.build(&mut pass, root, true))
            .collect::<Result<Vec<_>, _>>()?;

        for object in &mut objects {
            post_load(object.as_mut())?;
        }

        Ok(objects)
    }

    fn build(&self, pass: &mut Pass<'a, B, F>, section: &Section, recursive: bool) -> Result<Box<dyn Reflected>, Error> {
        let mut object = self
            .construct(pass, section)
            .context(|| format!("loading section `{}`", section.key()))?;

        if recursive {
            let document = Rc::clone(&pass.document);
            let guid = object.type_guid();

            for child in document.children_of(section.index) {
                let child = self.build(pass, child, true)?;

                object.attach_child(child).map_err(|_| {
                    Error::invalid_value(
                        PARENT_KEY,
                        format!("index of a section whose type can own children (`{guid}` cannot)"),
                    )
                    .with_context(format!("attaching children of section `{}`", section.key()))
                })?;
            }
        }

        Ok(object)
    }

    fn construct(&self, pass: &mut Pass<'a, B, F>, section: &Section) -> Result<Box<dyn Reflected>, Error> {
        let descriptor = self.registry.get(&section.guid)?;
        let guid = descriptor.guid();
        let key = section.key();

        let mut object = descriptor.create();

        let stored = match section.original {
            Some(_) => Cow::Owned(pass.documents.effective_fields(&pass.path, &key)?),
            None => Cow::Borrowed(&section.fields),
        };

        for (name, value) in stored.iter() {
            let Some(field) = self.registry.field(guid, name) else {
                self.unknown_field(guid, name)?;
                continue;
            };

            if field.kind().is_blob() {
                continue;
            }

            let value = Value::from_toml(field.kind(), value, name)?;
            field
                .accessor()
                .set(object.as_mut(), value)
                .context(|| format!("setting field `{name}`"))?;
        }

        for field in self.registry.fields(guid)?.filter(|f| f.kind().is_blob()) {
            let name = field.name();

            let value = match section.fields.get(name) {
                Some(inline) => Value::from_toml(FieldKind::Mesh, inline, name)?,
                None => Value::Mesh(self.read_blob(&pass.path, section.index, name)?),
            };

            field
                .accessor()
                .set(object.as_mut(), value)
                .context(|| format!("setting field `{name}`"))?;
        }

        if let Some(id) = &section.id {
            object.set_unique_id(id.clone());
        }

        object.set_origin(Origin::new(pass.path.clone(), key));

        debug!("loaded section `{}` as `{}`", section.key(), descriptor.display_name());
        Ok(object)
    }

    fn read_blob(&self, document: &Path, index: u32, field: &str) -> Result<MeshGeometry, Error> {
        let path = blob_path(document, index, field, self.settings);
        let bytes = self.backend.read(&path).map_err(|e| Error::io(&path, e))?;

        MeshGeometry::decode(&bytes).context(|| format!("decoding `{}`", path.display()))
    }

    fn unknown_field(&self, guid: &str, field: &str) -> Result<(), Error> {
        match self.settings.unknown_fields {
            UnknownFieldPolicy::Warn => {
                warn!("skipping stored field `{field}`, which type `{guid}` does not declare");
                Ok(())
            }
            UnknownFieldPolicy::Error => Err(ErrorKind::UnknownField {
                guid: guid.to_owned(),
                field: field.to_owned(),
            }
            .into()),
        }
    }
}

/// Runs post-load hooks over a tree, children first.
fn post_load(object: &mut dyn Reflected) -> Result<(), Error> {
    for child in object.children_mut() {
        post_load(child.as_mut())?;
    }

    let guid = object.type_guid();

    object
        .post_load()
        .context(|| format!("running post-load of `{guid}`"))
}
