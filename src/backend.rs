//! [`Backend`] is the filesystem interface used for documents and side files.

use std::{
    fs,
    io,
    path::{
        Path,
        PathBuf,
    },
};

/// Filesystem operations needed to save and load documents.
pub trait Backend {
    /// Returns `true` if a file or directory exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Creates a directory and all of its missing parents.
    ///
    /// # Errors
    /// - If the directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Removes a directory and everything inside it.
    ///
    /// # Errors
    /// - If the directory cannot be removed.
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Reads a whole file.
    ///
    /// # Errors
    /// - If the file cannot be opened or read.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Creates or truncates a file and writes `bytes` to it.
    ///
    /// # Errors
    /// - If the file cannot be created or written.
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Returns the canonical absolute form of `path`.
    ///
    /// Paths that do not exist yet are resolved through their parent
    /// directory, so a document can be compared before it is first written.
    ///
    /// # Errors
    /// - If neither the path nor its parent can be resolved.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}

/// Simple filesystem backend backed by [`std::fs`].
#[derive(Clone, Copy, Debug, Default)]
pub struct FileIO;

impl Backend for FileIO {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        fs::write(path, bytes)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        if path.exists() {
            return fs::canonicalize(path);
        }

        let name = path.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name")
        })?;

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        Ok(fs::canonicalize(parent)?.join(name))
    }
}
