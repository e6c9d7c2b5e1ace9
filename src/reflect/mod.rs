//! Type-erased reflection: the [`Reflected`] capability, typed field values,
//! and the descriptors that make up a [`TypeRegistry`](crate::TypeRegistry).

mod descriptor;
mod field;

use std::{
    any::Any,
    fmt::Debug,
    path::PathBuf,
};

pub use bevy_persist_macros::Reflected;

#[doc(inline)]
pub use self::{
    descriptor::{
        Factory,
        FieldAccessor,
        ReflectedField,
        TypeBuilder,
        TypeDescriptor,
    },
    field::{
        Field,
        FieldKind,
        Primitive,
        PrimitiveKind,
        Value,
    },
};
use crate::error::Error;

/// A static, stable type identifier.
///
/// Usually implemented by `#[derive(Reflected)]`.
pub trait TypeGuid {
    /// The GUID recorded in documents for this type.
    const GUID: &'static str;
}

/// Where an object was loaded from.
///
/// Recorded on every object produced by deserialization and consulted when the
/// object is serialized again, so unchanged fields can be written as a
/// back-reference instead of a value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin {
    /// Canonical absolute path of the source document.
    pub path: PathBuf,
    /// Section key within the source document.
    pub section: String,
}

impl Origin {
    /// Creates a new origin.
    pub fn new(path: impl Into<PathBuf>, section: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            section: section.into(),
        }
    }
}

/// The common base of every reconstructible object.
///
/// Subtypes embed their parent type and expose it through [`part`](Self::part),
/// which lets field accessors registered on an ancestor reach the ancestor's
/// portion of a more-derived object.
///
/// Prefer `#[derive(Reflected)]` over implementing this by hand.
pub trait Reflected: Any + Debug + Send + Sync {
    /// The GUID of the most-derived type of this object.
    fn type_guid(&self) -> &'static str;

    /// Upcasts to [`Any`].
    fn as_any(&self) -> &dyn Any;

    /// Upcasts to mutable [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Upcasts a boxed object to boxed [`Any`].
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Returns the portion of this object registered under `guid`: the object
    /// itself or one of its embedded ancestors.
    fn part(&self, guid: &str) -> Option<&dyn Any>;

    /// Mutable version of [`part`](Self::part).
    fn part_mut(&mut self, guid: &str) -> Option<&mut dyn Any>;

    /// The document and section this object was loaded from, if any.
    fn origin(&self) -> Option<&Origin>;

    /// Records the document and section this object was loaded from.
    fn set_origin(&mut self, origin: Origin);

    /// Owned child objects, in traversal order.
    fn children(&self) -> &[Box<dyn Reflected>];

    /// Mutable access to the owned child objects.
    fn children_mut(&mut self) -> &mut [Box<dyn Reflected>];

    /// Appends an owned child.
    ///
    /// # Errors
    /// - Gives the child back if this type cannot own children.
    fn attach_child(&mut self, child: Box<dyn Reflected>) -> Result<(), Box<dyn Reflected>>;

    /// Removes and returns the child at `index`.
    fn detach_child(&mut self, index: usize) -> Option<Box<dyn Reflected>>;

    /// The custom unique identifier of this object, if any.
    fn unique_id(&self) -> Option<&str>;

    /// Sets the custom unique identifier of this object.
    fn set_unique_id(&mut self, id: String);

    /// Runs once after the object and all of its descendants are loaded.
    ///
    /// # Errors
    /// - Aborts the load if the object is not valid.
    fn post_load(&mut self) -> Result<(), Error>;
}

impl dyn Reflected {
    /// Returns `true` if the most-derived type is `T`.
    pub fn is<T: Reflected>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcasts to the most-derived type `T`.
    pub fn downcast_ref<T: Reflected>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Mutably downcasts to the most-derived type `T`.
    pub fn downcast_mut<T: Reflected>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }

    /// Downcasts a boxed object to the most-derived type `T`.
    ///
    /// # Errors
    /// - Gives the object back if it is not a `T`.
    pub fn downcast<T: Reflected>(self: Box<Self>) -> Result<Box<T>, Box<Self>> {
        if self.is::<T>() {
            self.into_any()
                .downcast()
                .map_err(|_| unreachable!("type checked above"))
        } else {
            Err(self)
        }
    }

    /// Returns the portion of this object that is a `T`: the object itself or
    /// an embedded ancestor.
    pub fn part_of<T: Reflected + TypeGuid>(&self) -> Option<&T> {
        self.part(T::GUID).and_then(|p| p.downcast_ref())
    }

    /// Mutable version of [`part_of`](Self::part_of).
    pub fn part_of_mut<T: Reflected + TypeGuid>(&mut self) -> Option<&mut T> {
        self.part_mut(T::GUID).and_then(|p| p.downcast_mut())
    }

    /// Counts this object and all of its descendants.
    pub fn tree_len(&self) -> usize {
        1 + self.children().iter().map(|c| c.tree_len()).sum::<usize>()
    }
}
