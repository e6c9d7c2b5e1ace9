use std::{
    collections::{
        HashMap,
        HashSet,
    },
    marker::PhantomData,
    path::{
        Path,
        PathBuf,
    },
    rc::Rc,
};

use bevy::log::debug;
use toml::Table;

use crate::{
    backend::Backend,
    document::{
        BackReference,
        Document,
    },
    error::{
        Context,
        Error,
        ErrorKind,
    },
    format::Format,
};

/// Documents opened during a single serialize or deserialize call, keyed by
/// canonical path.
pub(crate) struct Documents<'a, B, F> {
    backend: &'a B,
    max_depth: usize,
    loaded: HashMap<PathBuf, Rc<Document>>,
    _format: PhantomData<fn() -> F>,
}

impl<'a, B, F> Documents<'a, B, F>
where
    B: Backend,
    F: Format,
{
    pub(crate) fn new(backend: &'a B, max_depth: usize) -> Self {
        Self {
            backend,
            max_depth,
            loaded: HashMap::new(),
            _format: PhantomData,
        }
    }

    pub(crate) fn canonicalize(&self, path: &Path) -> Result<PathBuf, Error> {
        self.backend
            .canonicalize(path)
            .map_err(|e| Error::io(path, e))
    }

    /// Opens a document, reusing it if it was already opened by this call.
    ///
    /// `path` must be canonical.
    pub(crate) fn load(&mut self, path: &Path) -> Result<Rc<Document>, Error> {
        if let Some(document) = self.loaded.get(path) {
            return Ok(Rc::clone(document));
        }

        let bytes = self.backend.read(path).map_err(|e| Error::io(path, e))?;
        let document = F::decode(&bytes)
            .and_then(Document::from_table)
            .context(|| format!("reading `{}`", path.display()))?;

        debug!("opened `{}` ({} sections)", path.display(), document.sections.len());

        let document = Rc::new(document);
        self.loaded.insert(path.to_path_buf(), Rc::clone(&document));
        Ok(document)
    }

    /// Canonical path of the document a back-reference in `referrer` points at.
    ///
    /// Relative paths are taken relative to the referring document.
    pub(crate) fn target_of(&self, referrer: &Path, reference: &BackReference) -> Result<PathBuf, Error> {
        let path = match referrer.parent() {
            Some(dir) if reference.path.is_relative() => dir.join(&reference.path),
            _ => reference.path.clone(),
        };

        self.canonicalize(&path)
    }

    /// The effective stored fields of section `key` of `path`: the values it
    /// inherits through its back-reference chain, overridden by its own
    /// inline values.
    ///
    /// `path` must be canonical.
    pub(crate) fn effective_fields(&mut self, path: &Path, key: &str) -> Result<Table, Error> {
        self.chain(path, key).map(|chain| chain.fields)
    }

    /// Like [`effective_fields`](Self::effective_fields), also reporting the
    /// documents the chain passes through.
    pub(crate) fn chain(&mut self, path: &Path, key: &str) -> Result<Chain, Error> {
        self.resolve(path, key)
            .context(|| format!("resolving section `{key}` of `{}`", path.display()))
    }

    fn resolve(&mut self, path: &Path, key: &str) -> Result<Chain, Error> {
        let mut visited = HashSet::new();
        let mut layers = Vec::new();
        let mut paths = Vec::new();
        let mut next = Some((path.to_path_buf(), key.to_owned()));

        while let Some((path, key)) = next.take() {
            if layers.len() > self.max_depth || visited.contains(&(path.clone(), key.clone())) {
                return Err(ErrorKind::CyclicReference { path, section: key }.into());
            }

            let document = self.load(&path)?;
            let section = document.section(&key).ok_or_else(|| ErrorKind::MissingSection {
                path: path.clone(),
                section: key.clone(),
            })?;

            next = match &section.original {
                Some(reference) => Some((self.target_of(&path, reference)?, reference.section.clone())),
                None => None,
            };

            layers.push(section.fields.clone());

            if !paths.contains(&path) {
                paths.push(path.clone());
            }

            visited.insert((path, key));
        }

        let mut fields = Table::new();

        for layer in layers.into_iter().rev() {
            fields.extend(layer);
        }

        Ok(Chain { fields, paths })
    }
}

/// A resolved back-reference chain.
pub(crate) struct Chain {
    /// Effective stored fields.
    pub(crate) fields: Table,
    /// Canonical paths of the documents visited, nearest first.
    pub(crate) paths: Vec<PathBuf>,
}
