use std::{
    fmt,
    marker::PhantomData,
    sync::Arc,
};

use crate::{
    error::{
        Error,
        ErrorKind,
    },
    reflect::{
        Field,
        FieldKind,
        Reflected,
        TypeGuid,
        Value,
    },
};

/// Default-constructs an instance of a registered type.
pub type Factory = Arc<dyn Fn() -> Box<dyn Reflected> + Send + Sync>;

type Getter = Arc<dyn Fn(&dyn Reflected) -> Result<Value, Error> + Send + Sync>;
type Setter = Arc<dyn Fn(&mut dyn Reflected, Value) -> Result<(), Error> + Send + Sync>;

/// A getter / setter pair bound to one field of one type.
///
/// Accessors take the common [`Reflected`] base and locate the part of the
/// object that declares the field, so an accessor registered on an ancestor
/// works on every descendant.
#[derive(Clone)]
pub struct FieldAccessor {
    get: Getter,
    set: Setter,
}

impl FieldAccessor {
    /// Creates an accessor for field `name` from typed closures.
    pub fn new<T, V>(
        name: impl Into<String>,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self
    where
        T: Reflected + TypeGuid,
        V: Field,
    {
        let name: Arc<str> = name.into().into();

        Self {
            get: Arc::new(move |instance| {
                let part = instance
                    .part(T::GUID)
                    .and_then(|p| p.downcast_ref::<T>())
                    .ok_or_else(|| mismatch(T::GUID, instance.type_guid()))?;

                Ok(get(part).into_value())
            }),
            set: Arc::new(move |instance, value| {
                let found = instance.type_guid();
                let part = instance
                    .part_mut(T::GUID)
                    .and_then(|p| p.downcast_mut::<T>())
                    .ok_or_else(|| mismatch(T::GUID, found))?;

                let value = V::from_value(value)
                    .ok_or_else(|| Error::invalid_value(&*name, format!("{:?}", V::KIND)))?;

                set(part, value);
                Ok(())
            }),
        }
    }

    /// Reads the field from `instance`.
    ///
    /// # Errors
    /// - [`ErrorKind::TypeMismatch`] if `instance` does not contain the declaring type.
    pub fn get(&self, instance: &dyn Reflected) -> Result<Value, Error> {
        (self.get)(instance)
    }

    /// Writes the field on `instance`.
    ///
    /// # Errors
    /// - [`ErrorKind::TypeMismatch`] if `instance` does not contain the declaring type.
    /// - [`ErrorKind::InvalidValue`] if `value` is of the wrong kind.
    pub fn set(&self, instance: &mut dyn Reflected, value: Value) -> Result<(), Error> {
        (self.set)(instance, value)
    }
}

fn mismatch(expected: &str, found: &str) -> Error {
    ErrorKind::TypeMismatch {
        expected: expected.to_owned(),
        found: found.to_owned(),
    }
    .into()
}

/// One named, typed field of a registered type.
#[derive(Clone)]
pub struct ReflectedField {
    name: String,
    kind: FieldKind,
    accessor: FieldAccessor,
}

impl ReflectedField {
    /// The field name, used verbatim as the document key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// The field accessor.
    pub fn accessor(&self) -> &FieldAccessor {
        &self.accessor
    }
}

impl fmt::Debug for ReflectedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectedField")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Reflection metadata for one reconstructible type.
#[derive(Clone)]
pub struct TypeDescriptor {
    pub(crate) guid: String,
    pub(crate) parent: Option<String>,
    pub(crate) display_name: String,
    pub(crate) factory: Factory,
    pub(crate) fields: Vec<ReflectedField>,
}

impl TypeDescriptor {
    /// Starts building a descriptor for `T`.
    ///
    /// # Example
    /// ```
    /// # use bevy_persist::prelude::*;
    /// #[derive(Reflected, Default, Debug)]
    /// #[reflected(guid = "6c1f6b1e-0000-4000-8000-000000000001")]
    /// struct Counter {
    ///     #[reflected(origin)]
    ///     origin: Option<Origin>,
    ///     count: u32,
    /// }
    ///
    /// let mut registry = TypeRegistry::new();
    /// registry
    ///     .register(
    ///         TypeDescriptor::of::<Counter>("Counter")
    ///             .field("count", |c| c.count, |c, v| c.count = v),
    ///     )
    ///     .unwrap();
    /// ```
    pub fn of<T>(display_name: impl Into<String>) -> TypeBuilder<T>
    where
        T: Reflected + TypeGuid + Default,
    {
        TypeBuilder {
            descriptor: Self {
                guid: T::GUID.to_owned(),
                parent: None,
                display_name: display_name.into(),
                factory: Arc::new(|| Box::new(T::default())),
                fields: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    /// The type's GUID.
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// The parent type's GUID, or `None` for root types.
    pub fn parent_guid(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// The human-readable name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Default-constructs an instance.
    pub fn create(&self) -> Box<dyn Reflected> {
        (self.factory)()
    }

    /// Fields declared by this type alone, in registration order.
    pub fn own_fields(&self) -> &[ReflectedField] {
        &self.fields
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("guid", &self.guid)
            .field("parent", &self.parent)
            .field("display_name", &self.display_name)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`TypeDescriptor`] with typed field accessors.
pub struct TypeBuilder<T> {
    descriptor: TypeDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypeBuilder<T>
where
    T: Reflected + TypeGuid,
{
    /// Declares `P` as the parent type.
    ///
    /// `T` must embed a `P` reachable through [`Reflected::part`].
    #[must_use]
    pub fn parent<P: TypeGuid>(mut self) -> Self {
        self.descriptor.parent = Some(P::GUID.to_owned());
        self
    }

    /// Declares a field.
    ///
    /// Only [`Field`] types can be declared, so every registered field is
    /// representable in a document.
    #[must_use]
    pub fn field<V: Field>(
        mut self,
        name: impl Into<String>,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();

        self.descriptor.fields.push(ReflectedField {
            accessor: FieldAccessor::new(name.as_str(), get, set),
            name,
            kind: V::KIND,
        });
        self
    }

    /// Finishes the descriptor.
    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}

impl<T> From<TypeBuilder<T>> for TypeDescriptor
where
    T: Reflected + TypeGuid,
{
    fn from(builder: TypeBuilder<T>) -> Self {
        builder.build()
    }
}
