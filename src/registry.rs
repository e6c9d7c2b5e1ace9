//! [`TypeRegistry`] holds the reflection metadata of every persistent type.

use std::collections::{
    HashMap,
    HashSet,
};

use crate::{
    document::RESERVED_PREFIX,
    error::{
        Error,
        ErrorKind,
    },
    reflect::{
        Reflected,
        ReflectedField,
        TypeDescriptor,
    },
};

/// The registry of types that can be saved and loaded, keyed by GUID.
///
/// Populated once during startup and treated as read-only afterwards: share
/// it by reference (or behind an [`Arc`](std::sync::Arc)) with every
/// serializer and deserializer.
#[derive(Clone, Default, Debug)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type.
    ///
    /// A type's parent must be registered before the type itself, which rules
    /// out ancestry cycles.
    ///
    /// # Errors
    /// - [`ErrorKind::DuplicateType`] if the GUID is already registered.
    /// - [`ErrorKind::CyclicInheritance`] if the type is its own parent.
    /// - [`ErrorKind::UnknownType`] if the parent is not registered.
    /// - [`ErrorKind::ReservedField`] if a field name starts with `.`.
    /// - [`ErrorKind::DuplicateField`] if a field name repeats within the type
    ///   or collides with an ancestor's field.
    pub fn register(&mut self, descriptor: impl Into<TypeDescriptor>) -> Result<(), Error> {
        let descriptor = descriptor.into();
        let guid = descriptor.guid().to_owned();

        self.check(&descriptor)
            .map_err(|e| e.with_context(format!("registering type `{guid}`")))?;

        self.types.insert(guid, descriptor);
        Ok(())
    }

    fn check(&self, descriptor: &TypeDescriptor) -> Result<(), Error> {
        let guid = descriptor.guid();

        if self.types.contains_key(guid) {
            return Err(ErrorKind::DuplicateType { guid: guid.into() }.into());
        }

        if let Some(parent) = descriptor.parent_guid() {
            if parent == guid {
                return Err(ErrorKind::CyclicInheritance { guid: guid.into() }.into());
            }

            if !self.types.contains_key(parent) {
                return Err(ErrorKind::UnknownType {
                    guid: parent.into(),
                }
                .into());
            }
        }

        if let Some(field) = descriptor
            .own_fields()
            .iter()
            .find(|f| f.name().starts_with(RESERVED_PREFIX))
        {
            return Err(ErrorKind::ReservedField {
                guid: guid.into(),
                field: field.name().into(),
            }
            .into());
        }

        let mut seen = HashSet::new();

        let inherited = descriptor
            .parent_guid()
            .map(|parent| self.ancestry(parent))
            .into_iter()
            .flatten()
            .flat_map(TypeDescriptor::own_fields);

        for field in descriptor.own_fields().iter().chain(inherited) {
            if !seen.insert(field.name()) {
                return Err(ErrorKind::DuplicateField {
                    guid: guid.into(),
                    field: field.name().into(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Returns `true` if the GUID is registered.
    pub fn contains(&self, guid: &str) -> bool {
        self.types.contains_key(guid)
    }

    /// Returns the descriptor registered under `guid`.
    ///
    /// # Errors
    /// - [`ErrorKind::UnknownType`] if the GUID is not registered.
    pub fn get(&self, guid: &str) -> Result<&TypeDescriptor, Error> {
        self.types.get(guid).ok_or_else(|| {
            ErrorKind::UnknownType {
                guid: guid.to_owned(),
            }
            .into()
        })
    }

    /// Iterates over all registered descriptors, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates over `guid` and its ancestors, most-derived first.
    ///
    /// Yields nothing if `guid` is not registered.
    pub fn ancestry<'a>(&'a self, guid: &str) -> impl Iterator<Item = &'a TypeDescriptor> + use<'a> {
        let mut next = self.types.get(guid);

        // Parents are registered first, so chains are acyclic.
        std::iter::from_fn(move || {
            let current = next?;
            next = current.parent_guid().and_then(|p| self.types.get(p));
            Some(current)
        })
        .take(self.types.len())
    }

    /// Returns `true` if `child` is `parent` or one of its descendants.
    pub fn is_derived_from(&self, child: &str, parent: &str) -> bool {
        self.ancestry(child).any(|d| d.guid() == parent)
    }

    /// Iterates over the fully-resolved field table of `guid`: its own fields,
    /// then its parent's, up the chain.
    ///
    /// # Errors
    /// - [`ErrorKind::UnknownType`] if the GUID is not registered.
    pub fn fields<'a>(
        &'a self,
        guid: &str,
    ) -> Result<impl Iterator<Item = &'a ReflectedField> + use<'a>, Error> {
        self.get(guid)?;
        Ok(self.ancestry(guid).flat_map(TypeDescriptor::own_fields))
    }

    /// Finds a field of `guid` or any of its ancestors by name.
    pub fn field(&self, guid: &str, name: &str) -> Option<&ReflectedField> {
        self.ancestry(guid)
            .flat_map(TypeDescriptor::own_fields)
            .find(|f| f.name() == name)
    }

    /// Default-constructs an instance of `guid`.
    ///
    /// # Errors
    /// - [`ErrorKind::UnknownType`] if the GUID is not registered.
    pub fn create(&self, guid: &str) -> Result<Box<dyn Reflected>, Error> {
        self.get(guid).map(TypeDescriptor::create)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    #[derive(Reflected, Default, Debug)]
    #[reflected(guid = "test-base")]
    struct Base {
        #[reflected(origin)]
        origin: Option<Origin>,
        a: i32,
    }

    #[derive(Reflected, Default, Debug)]
    #[reflected(guid = "test-derived")]
    struct Derived {
        #[reflected(base)]
        base: Base,
        b: String,
    }

    #[derive(Reflected, Default, Debug)]
    #[reflected(guid = "test-leaf")]
    struct Leaf {
        #[reflected(base)]
        base: Derived,
        c: bool,
    }

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();

        registry
            .register(TypeDescriptor::of::<Base>("Base").field("a", |t| t.a, |t, v| t.a = v))
            .unwrap();
        registry
            .register(
                TypeDescriptor::of::<Derived>("Derived")
                    .parent::<Base>()
                    .field("b", |t| t.b.clone(), |t, v| t.b = v),
            )
            .unwrap();
        registry
            .register(
                TypeDescriptor::of::<Leaf>("Leaf")
                    .parent::<Derived>()
                    .field("c", |t| t.c, |t, v| t.c = v),
            )
            .unwrap();

        registry
    }

    #[test]
    fn test_field_order_is_most_derived_first() {
        let registry = registry();
        let names = registry
            .fields("test-leaf")
            .unwrap()
            .map(ReflectedField::name)
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_is_derived_from() {
        let registry = registry();

        assert!(registry.is_derived_from("test-leaf", "test-base"));
        assert!(registry.is_derived_from("test-leaf", "test-leaf"));
        assert!(!registry.is_derived_from("test-base", "test-leaf"));
        assert!(!registry.is_derived_from("missing", "test-base"));
    }

    #[test]
    fn test_inherited_accessors() {
        let registry = registry();
        let mut leaf = registry.create("test-leaf").unwrap();

        registry
            .field("test-leaf", "a")
            .unwrap()
            .accessor()
            .set(leaf.as_mut(), Value::I32(9))
            .unwrap();

        assert_eq!(leaf.downcast_ref::<Leaf>().unwrap().base.base.a, 9);
        assert_eq!(
            registry.field("test-leaf", "a").unwrap().accessor().get(leaf.as_ref()).unwrap(),
            Value::I32(9)
        );
    }

    #[test]
    fn test_accessor_rejects_unrelated_type() {
        let registry = registry();
        let base = registry.create("test-base").unwrap();

        let err = registry
            .field("test-leaf", "c")
            .unwrap()
            .accessor()
            .get(base.as_ref())
            .unwrap_err();

        assert!(matches!(err.kind(), ErrorKind::TypeMismatch { .. }));
    }

    #[test]
    fn test_duplicate_type() {
        let mut registry = registry();
        let err = registry.register(TypeDescriptor::of::<Base>("Again")).unwrap_err();

        assert!(matches!(err.kind(), ErrorKind::DuplicateType { .. }));
    }

    #[test]
    fn test_parent_must_be_registered_first() {
        let mut registry = TypeRegistry::new();
        let err = registry
            .register(TypeDescriptor::of::<Derived>("Derived").parent::<Base>())
            .unwrap_err();

        assert!(matches!(err.kind(), ErrorKind::UnknownType { guid } if guid == "test-base"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_self_parent() {
        let mut registry = TypeRegistry::new();
        let err = registry
            .register(TypeDescriptor::of::<Base>("Base").parent::<Base>())
            .unwrap_err();

        assert!(matches!(err.kind(), ErrorKind::CyclicInheritance { .. }));
    }

    #[test]
    fn test_field_collision_with_ancestor() {
        let mut registry = TypeRegistry::new();
        registry
            .register(TypeDescriptor::of::<Base>("Base").field("a", |t| t.a, |t, v| t.a = v))
            .unwrap();

        let err = registry
            .register(
                TypeDescriptor::of::<Derived>("Derived")
                    .parent::<Base>()
                    .field("a", |t| t.b.clone(), |t, v| t.b = v),
            )
            .unwrap_err();

        assert!(matches!(err.kind(), ErrorKind::DuplicateField { field, .. } if field == "a"));
    }

    #[test]
    fn test_reserved_field_names() {
        let mut registry = TypeRegistry::new();

        for name in [".id", ".parent", ".path_to_original", ".custom"] {
            let err = registry
                .register(TypeDescriptor::of::<Base>("Base").field(name, |t| t.a, |t, v| t.a = v))
                .unwrap_err();

            assert!(matches!(err.kind(), ErrorKind::ReservedField { field, .. } if field == name));
        }

        assert!(registry.is_empty());
    }

    #[test]
    fn test_wrong_value_kind_names_the_field() {
        let registry = registry();
        let mut leaf = registry.create("test-leaf").unwrap();

        let err = registry
            .field("test-leaf", "b")
            .unwrap()
            .accessor()
            .set(leaf.as_mut(), Value::Bool(true))
            .unwrap_err();

        assert!(matches!(err.kind(), ErrorKind::InvalidValue { field, .. } if field == "b"));
    }

    #[test]
    fn test_unknown_type() {
        let err = registry().create("nope").unwrap_err();

        assert!(matches!(err.kind(), ErrorKind::UnknownType { .. }));
    }
}
