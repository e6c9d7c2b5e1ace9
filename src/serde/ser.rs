use std::{
    marker::PhantomData,
    path::{
        Path,
        PathBuf,
    },
};

use bevy::log::{
    debug,
    trace,
    warn,
};
use toml::Table;

use crate::{
    backend::Backend,
    document::{
        BackReference,
        Document,
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
        Reflected,
        Value,
    },
    registry::TypeRegistry,
    serde::{
        blob_path,
        geometry_dir,
        resolve::Documents,
        text_copy_path,
    },
    settings::Settings,
};

/// A blob field waiting to be written to its side file.
struct Blob {
    index: u32,
    field: String,
    mesh: MeshGeometry,
}

/// State of one [`Serializer::write`] call.
struct Pass<'a, B, F> {
    target: PathBuf,
    documents: Documents<'a, B, F>,
    sections: Vec<Section>,
    blobs: Vec<Blob>,
}

/// Writes object graphs to documents.
///
/// Objects that were loaded from another document are diffed against the
/// section they came from: unchanged fields are omitted and a single
/// back-reference to that section is written in their place.
pub struct Serializer<'a, B, F> {
    registry: &'a TypeRegistry,
    backend: &'a B,
    settings: &'a Settings,
    _format: PhantomData<fn() -> F>,
}

impl<'a, B, F> Serializer<'a, B, F>
where
    B: Backend,
    F: Format,
{
    /// Creates a serializer.
    pub fn new(registry: &'a TypeRegistry, backend: &'a B, settings: &'a Settings) -> Self {
        Self {
            registry,
            backend,
            settings,
            _format: PhantomData,
        }
    }

    /// Writes `roots` to the document at `path`, each followed by all of its
    /// descendants if `recursive` is set.
    ///
    /// Blob fields go to side files in the document's geometry directory,
    /// which is cleared first. With [`Settings::text_only_copy`] a
    /// self-contained copy is written as well.
    ///
    /// # Errors
    /// - [`ErrorKind::UnknownType`] if an object's type is not registered.
    /// - [`ErrorKind::LimitExceeded`] if a value or geometry does not fit its
    ///   stored width. Nothing is written in that case.
    /// - [`ErrorKind::Io`] if a file cannot be read or written.
    /// - Any error from resolving the sections objects were loaded from.
    pub fn write(&self, roots: &[&dyn Reflected], path: &Path, recursive: bool) -> Result<(), Error> {
        self.write_inner(roots, path, recursive)
            .context(|| format!("serializing `{}`", path.display()))
    }

    fn write_inner(&self, roots: &[&dyn Reflected], path: &Path, recursive: bool) -> Result<(), Error> {
        let documents = Documents::new(self.backend, self.settings.max_reference_depth);

        let mut pass = Pass {
            target: documents.canonicalize(path)?,
            documents,
            sections: Vec::new(),
            blobs: Vec::new(),
        };

        for root in roots {
            self.walk(&mut pass, *root, None, recursive)?;
        }

        let target = pass.target.clone();

        let encoded = pass
            .blobs
            .iter()
            .map(|blob| {
                let path = blob_path(&target, blob.index, &blob.field, self.settings);
                blob.mesh
                    .encode()
                    .map(|bytes| (path, bytes))
                    .context(|| format!("encoding field `{}` of section {}", blob.field, blob.index))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let document = Document {
            sections: pass.sections,
        };
        let text = F::encode(&document.to_table())?;

        let geometry = geometry_dir(&target, self.settings);

        if self.backend.exists(&geometry) {
            debug!("removing stale geometry directory `{}`", geometry.display());
            self.backend
                .remove_dir_all(&geometry)
                .map_err(|e| Error::io(&geometry, e))?;
        }

        if !encoded.is_empty() {
            self.backend
                .create_dir_all(&geometry)
                .map_err(|e| Error::io(&geometry, e))?;
        }

        for (path, bytes) in &encoded {
            self.backend.write(path, bytes).map_err(|e| Error::io(path, e))?;
        }

        self.backend
            .write(&target, &text)
            .map_err(|e| Error::io(&target, e))?;

        debug!(
            "wrote {} sections and {} geometry files to `{}`",
            document.sections.len(),
            encoded.len(),
            target.display()
        );

        if self.settings.text_only_copy {
            self.write_text_copy(document, &pass.blobs, &target)?;
        }

        Ok(())
    }

    fn write_text_copy(&self, mut document: Document, blobs: &[Blob], target: &Path) -> Result<(), Error> {
        for blob in blobs {
            let value = Value::Mesh(blob.mesh.clone()).to_toml()?;

            if let Some(section) = document.sections.get_mut(blob.index as usize) {
                section.fields.insert(blob.field.clone(), value);
            }
        }

        let path = text_copy_path(target, F::extension());
        let text = F::encode(&document.to_table())?;

        self.backend.write(&path, &text).map_err(|e| Error::io(&path, e))?;

        debug!("wrote text-only copy `{}`", path.display());
        Ok(())
    }

    fn walk(
        &self,
        pass: &mut Pass<'a, B, F>,
        object: &dyn Reflected,
        parent: Option<u32>,
        recursive: bool,
    ) -> Result<(), Error> {
        let count = pass.sections.len();
        let index = u32::try_from(count).map_err(|_| ErrorKind::LimitExceeded {
            what: "section",
            count: count as u64,
            max: u64::from(u32::MAX),
        })?;

        let section = self
            .section(pass, object, index, parent)
            .context(|| format!("writing section `{}.{}`", index, object.type_guid()))?;

        pass.sections.push(section);

        if recursive {
            for child in object.children() {
                self.walk(pass, child.as_ref(), Some(index), true)?;
            }
        }

        Ok(())
    }

    fn section(
        &self,
        pass: &mut Pass<'a, B, F>,
        object: &dyn Reflected,
        index: u32,
        parent: Option<u32>,
    ) -> Result<Section, Error> {
        let guid = object.type_guid();

        let mut section = Section::new(index, guid);
        section.parent = parent;
        section.id = object.unique_id().map(str::to_owned);

        let original = self.original(pass, object)?;
        let mut omitted = false;

        for field in self.registry.fields(guid)? {
            let name = field.name();

            let value = match field.accessor().get(object)? {
                Value::Mesh(mesh) => {
                    pass.blobs.push(Blob {
                        index,
                        field: name.to_owned(),
                        mesh,
                    });
                    continue;
                }
                value => value,
            };

            if let Some((_, stored)) = &original {
                let unchanged = stored
                    .get(name)
                    .and_then(|v| Value::from_toml(field.kind(), v, name).ok())
                    .is_some_and(|v| v == value);

                if unchanged {
                    trace!("field `{name}` of section `{}` is unchanged", section.key());
                    omitted = true;
                    continue;
                }
            }

            let value = value
                .to_toml()
                .context(|| format!("writing field `{name}`"))?;

            section.fields.insert(name.to_owned(), value);
        }

        if omitted {
            section.original = original.map(|(reference, _)| reference);
        }

        debug!(
            "section `{}`: {} inline fields{}",
            section.key(),
            section.fields.len(),
            if section.original.is_some() { ", back-referenced" } else { "" }
        );

        Ok(section)
    }

    /// The section `object` was loaded from and its effective stored fields,
    /// unless it is gone or its chain passes through the document being
    /// written.
    fn original(
        &self,
        pass: &mut Pass<'a, B, F>,
        object: &dyn Reflected,
    ) -> Result<Option<(BackReference, Table)>, Error> {
        let Some(origin) = object.origin() else {
            return Ok(None);
        };

        if !self.backend.exists(&origin.path) {
            warn!(
                "original document `{}` no longer exists, writing every field",
                origin.path.display()
            );
            return Ok(None);
        }

        let path = pass.documents.canonicalize(&origin.path)?;

        if path == pass.target {
            return Ok(None);
        }

        let chain = match pass.documents.chain(&path, &origin.section) {
            Ok(chain) => chain,
            Err(e) if matches!(e.kind(), ErrorKind::MissingSection { .. }) => {
                warn!(
                    "original section `{}` of `{}` no longer exists, writing every field",
                    origin.section,
                    path.display()
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if chain.paths.contains(&pass.target) {
            debug!(
                "`{}` is already on the back-reference chain of `{}`, writing every field",
                pass.target.display(),
                origin.section
            );
            return Ok(None);
        }

        Ok(Some((
            BackReference {
                path,
                section: origin.section.clone(),
            },
            chain.fields,
        )))
    }
}
