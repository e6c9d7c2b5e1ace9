//! Built-in scene types.

use bevy::math::{
    Vec3,
    Vec4,
};

use crate::{
    error::Error,
    geometry::MeshGeometry,
    reflect::{
        Origin,
        Reflected,
        TypeDescriptor,
    },
    registry::TypeRegistry,
};

/// A named node in a scene tree. Owns its children exclusively.
#[derive(Reflected, Debug)]
#[reflected(guid = "3f2a6c1e-8d4b-4e8a-9c57-0b1d2e3f4a51")]
pub struct Node {
    /// Display name.
    pub name: String,
    /// Whether the node and its children are shown.
    pub visible: bool,
    /// Position relative to the parent.
    pub translation: Vec3,
    /// Scale relative to the parent.
    pub scale: Vec3,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Owned children, in traversal order.
    #[reflected(children)]
    pub children: Vec<Box<dyn Reflected>>,
    /// Custom unique identifier.
    #[reflected(id)]
    pub id: Option<String>,
    /// Where the node was loaded from.
    #[reflected(origin)]
    pub origin: Option<Origin>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: String::new(),
            visible: true,
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            tags: Vec::new(),
            children: Vec::new(),
            id: None,
            origin: None,
        }
    }
}

impl Node {
    /// Creates a node with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Appends an owned child.
    pub fn add_child(&mut self, child: impl Reflected) {
        self.children.push(Box::new(child));
    }

    /// Builder form of [`add_child`](Self::add_child).
    #[must_use]
    pub fn with_child(mut self, child: impl Reflected) -> Self {
        self.add_child(child);
        self
    }
}

/// A [`Node`] carrying renderable geometry.
#[derive(Reflected, Debug, Default)]
#[reflected(guid = "9c21d7b0-56e3-4f1a-8b2d-7e4c6a9f0d12", post_load = "MeshNode::validate")]
pub struct MeshNode {
    /// The embedded node.
    #[reflected(base)]
    pub node: Node,
    /// Geometry, stored in a binary side file.
    pub mesh: MeshGeometry,
    /// Name of the material to render with.
    pub material: String,
    /// Whether the mesh casts shadows.
    pub cast_shadows: bool,
}

impl MeshNode {
    /// Creates a mesh node with the given name and geometry.
    pub fn new(name: impl Into<String>, mesh: MeshGeometry) -> Self {
        Self {
            node: Node::new(name),
            mesh,
            ..Default::default()
        }
    }

    fn validate(&mut self) -> Result<(), Error> {
        self.mesh
            .validate()
            .map_err(|e| e.with_context(format!("validating mesh of `{}`", self.node.name)))
    }
}

/// Surface parameters shared by meshes.
#[derive(Reflected, Debug)]
#[reflected(guid = "b4e8f2a3-1c6d-4d9b-a07e-5f3c2b1a8e64")]
pub struct Material {
    /// Linear RGBA base colour.
    pub base_color: Vec4,
    /// Perceptual roughness in `0.0..=1.0`.
    pub roughness: f32,
    /// Metalness in `0.0..=1.0`.
    pub metallic: f32,
    /// Texture asset paths.
    pub textures: Vec<String>,
    /// Linear RGB emitted light.
    pub emissive: Vec3,
    /// Custom unique identifier.
    #[reflected(id)]
    pub id: Option<String>,
    /// Where the material was loaded from.
    #[reflected(origin)]
    pub origin: Option<Origin>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            roughness: 0.5,
            metallic: 0.0,
            textures: Vec::new(),
            emissive: Vec3::ZERO,
            id: None,
            origin: None,
        }
    }
}

/// Registers [`Node`], [`MeshNode`] and [`Material`].
///
/// # Errors
/// - [`ErrorKind::DuplicateType`](crate::ErrorKind::DuplicateType) if any of
///   them is already registered.
pub fn register_scene_types(registry: &mut TypeRegistry) -> Result<(), Error> {
    registry.register(
        TypeDescriptor::of::<Node>("Node")
            .field("name", |n| n.name.clone(), |n, v| n.name = v)
            .field("visible", |n| n.visible, |n, v| n.visible = v)
            .field("translation", |n| n.translation, |n, v| n.translation = v)
            .field("scale", |n| n.scale, |n, v| n.scale = v)
            .field("tags", |n| n.tags.clone(), |n, v| n.tags = v),
    )?;

    registry.register(
        TypeDescriptor::of::<MeshNode>("MeshNode")
            .parent::<Node>()
            .field("mesh", |m| m.mesh.clone(), |m, v| m.mesh = v)
            .field("material", |m| m.material.clone(), |m, v| m.material = v)
            .field("cast_shadows", |m| m.cast_shadows, |m, v| m.cast_shadows = v),
    )?;

    registry.register(
        TypeDescriptor::of::<Material>("Material")
            .field("base_color", |m| m.base_color, |m, v| m.base_color = v)
            .field("roughness", |m| m.roughness, |m, v| m.roughness = v)
            .field("metallic", |m| m.metallic, |m, v| m.metallic = v)
            .field("textures", |m| m.textures.clone(), |m, v| m.textures = v)
            .field("emissive", |m| m.emissive, |m, v| m.emissive = v),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use bevy::math::Vec2;

    use super::*;
    use crate::{
        ErrorKind,
        geometry::Vertex,
    };

    #[test]
    fn test_registration() {
        let mut registry = TypeRegistry::new();
        register_scene_types(&mut registry).unwrap();

        assert_eq!(registry.len(), 3);
        assert!(registry.is_derived_from(
            <MeshNode as crate::reflect::TypeGuid>::GUID,
            <Node as crate::reflect::TypeGuid>::GUID
        ));

        let err = register_scene_types(&mut registry).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DuplicateType { .. }));
    }

    #[test]
    fn test_mesh_node_delegates_to_node() {
        let mut mesh_node = MeshNode::new("rock", MeshGeometry::default());
        mesh_node.node.add_child(Node::new("pebble"));

        let object: &mut dyn Reflected = &mut mesh_node;
        object.set_unique_id("rock-1".into());
        object.set_origin(Origin::new("/scenes/a.toml", "0.x"));

        assert_eq!(object.children().len(), 1);
        assert_eq!(object.unique_id(), Some("rock-1"));
        assert_eq!(object.part_of::<Node>().map(|n| n.name.as_str()), Some("rock"));
        assert_eq!(mesh_node.node.origin.as_ref().map(|o| o.section.as_str()), Some("0.x"));
    }

    #[test]
    fn test_post_load_validates_geometry() {
        let vertex = Vertex::new(Vec3::ZERO, Vec3::Y, Vec2::ZERO);
        let mut mesh_node = MeshNode::new("broken", MeshGeometry::new(vec![vertex], vec![0, 1]));

        let err = mesh_node.post_load().unwrap_err();

        assert!(matches!(err.kind(), ErrorKind::InvalidValue { .. }));
        assert_eq!(err.context().len(), 1);
    }

    #[test]
    fn test_material_has_no_children() {
        let mut material = Material::default();
        let object: &mut dyn Reflected = &mut material;

        assert!(object.attach_child(Box::new(Node::new("x"))).is_err());
        assert!(object.children().is_empty());
    }
}
