//! Error types shared by every persistence operation.

use std::{
    fmt,
    path::{
        Path,
        PathBuf,
    },
};

use thiserror::Error;

/// The kind of failure that aborted a persistence operation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A file could not be opened, read, written, or created.
    #[error("io error at `{}`: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// A type GUID was not found in the registry.
    #[error("unknown type `{guid}`. the type must be registered before it can be loaded")]
    UnknownType {
        /// The unresolved GUID.
        guid: String,
    },

    /// A resolved type is not the expected type or one of its descendants.
    #[error("type mismatch: expected `{expected}` (or a subtype), found `{found}`")]
    TypeMismatch {
        /// The GUID that was requested.
        expected: String,
        /// The GUID that was found.
        found: String,
    },

    /// A stored field has no accessor on the resolved type.
    #[error("type `{guid}` has no field named `{field}`")]
    UnknownField {
        /// The type being loaded.
        guid: String,
        /// The field name found in the document.
        field: String,
    },

    /// The binary geometry size did not match the size implied by its counts.
    #[error("geometry size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        /// Bytes implied by the stored counts.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// The binary geometry ended before a complete array could be read.
    #[error("unexpected end of file: needed {needed} more bytes, {remaining} remaining")]
    UnexpectedEndOfFile {
        /// Bytes needed by the next read.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// A count does not fit its declared on-disk width.
    #[error("{what} count {count} exceeds the maximum of {max}")]
    LimitExceeded {
        /// What was being counted.
        what: &'static str,
        /// The offending count.
        count: u64,
        /// The largest representable count.
        max: u64,
    },

    /// Back-reference resolution revisited a section already on the stack,
    /// or exceeded the configured depth.
    #[error("cyclic back-reference to section `{section}` of `{}`", path.display())]
    CyclicReference {
        /// The document being revisited.
        path: PathBuf,
        /// The section being revisited.
        section: String,
    },

    /// A type GUID was registered twice.
    #[error("type `{guid}` is already registered")]
    DuplicateType {
        /// The duplicated GUID.
        guid: String,
    },

    /// A field name collides with another field of the same type or an ancestor.
    #[error("field `{field}` of type `{guid}` is already declared in its ancestry")]
    DuplicateField {
        /// The type declaring the field.
        guid: String,
        /// The colliding name.
        field: String,
    },

    /// A field name uses the prefix reserved for document keys.
    #[error("field `{field}` of type `{guid}` starts with the reserved `.` prefix")]
    ReservedField {
        /// The type declaring the field.
        guid: String,
        /// The offending name.
        field: String,
    },

    /// A type declared itself as its own ancestor.
    #[error("type `{guid}` declares itself as its own ancestor")]
    CyclicInheritance {
        /// The offending GUID.
        guid: String,
    },

    /// A stored value does not have the shape its field kind requires.
    #[error("field `{field}` does not hold a valid {expected}")]
    InvalidValue {
        /// The field being decoded.
        field: String,
        /// A description of the expected shape.
        expected: String,
    },

    /// A referenced section does not exist in its document.
    #[error("section `{section}` not found in `{}`", path.display())]
    MissingSection {
        /// The document searched.
        path: PathBuf,
        /// The missing section.
        section: String,
    },

    /// The document could not be parsed or written by its format.
    #[error("malformed document: {0}")]
    Parse(String),

    /// The document was written by an incompatible format version.
    #[error("unsupported document version `{found}` (supported: {supported})")]
    UnsupportedVersion {
        /// The version recorded in the document.
        found: String,
        /// The version requirement of this crate.
        supported: String,
    },
}

/// An error that may occur when saving or loading objects.
///
/// Each layer the error passes through appends a context frame, so the
/// rendered message reads as a breadcrumb trail from the failure outward.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    context: Vec<String>,
}

impl Error {
    /// Creates a new error without any context.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: Vec::new(),
        }
    }

    /// IO / Filesystem error.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::new(ErrorKind::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }

    /// Malformed document error.
    pub fn parse(error: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Parse(error.to_string()))
    }

    /// Invalid stored value error.
    pub fn invalid_value(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidValue {
            field: field.into(),
            expected: expected.into(),
        })
    }

    /// Appends a context frame describing what was being done.
    #[must_use]
    pub fn with_context(mut self, frame: impl Into<String>) -> Self {
        self.context.push(frame.into());
        self
    }

    /// The kind of failure.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The context frames, innermost first.
    pub fn context(&self) -> &[String] {
        &self.context
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        for frame in &self.context {
            write!(f, "\n  while {frame}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Extension trait for attaching context frames to fallible results.
pub trait Context<T> {
    /// Appends a lazily-built context frame if the result is an error.
    ///
    /// # Errors
    /// - Returns the original error with the frame appended.
    fn context<F, S>(self, frame: F) -> Result<T, Error>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> Context<T> for Result<T, Error> {
    fn context<F, S>(self, frame: F) -> Result<T, Error>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.with_context(frame()))
    }
}
