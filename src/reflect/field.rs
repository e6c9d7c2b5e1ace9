use bevy::math::{
    Vec2,
    Vec3,
    Vec4,
};
use toml::Table;

use crate::{
    error::{
        Error,
        ErrorKind,
    },
    geometry::{
        MeshGeometry,
        Vertex,
    },
};

/// A scalar or vector kind that can be stored inline or inside an array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// `bool`
    Bool,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `f32`
    F32,
    /// `String`
    String,
    /// [`Vec2`]
    Vec2,
    /// [`Vec3`]
    Vec3,
    /// [`Vec4`]
    Vec4,
}

impl PrimitiveKind {
    fn describe(self) -> &'static str {
        match self {
            Self::Bool => "boolean",
            Self::I32 => "32-bit signed integer",
            Self::I64 => "64-bit signed integer",
            Self::U32 => "32-bit unsigned integer",
            Self::U64 => "64-bit unsigned integer",
            Self::F32 => "float",
            Self::String => "string",
            Self::Vec2 => "array of 2 floats",
            Self::Vec3 => "array of 3 floats",
            Self::Vec4 => "array of 4 floats",
        }
    }
}

/// The kind of a reflected field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// A single primitive.
    Primitive(PrimitiveKind),
    /// A homogeneous array of primitives.
    Array(PrimitiveKind),
    /// Mesh geometry, stored in a binary side file.
    Mesh,
}

impl FieldKind {
    /// Returns `true` for the blob kind, which is never written inline.
    pub fn is_blob(self) -> bool {
        matches!(self, Self::Mesh)
    }
}

/// A type-erased field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// `bool`
    Bool(bool),
    /// `i32`
    I32(i32),
    /// `i64`
    I64(i64),
    /// `u32`
    U32(u32),
    /// `u64`
    U64(u64),
    /// `f32`
    F32(f32),
    /// `String`
    String(String),
    /// [`Vec2`]
    Vec2(Vec2),
    /// [`Vec3`]
    Vec3(Vec3),
    /// [`Vec4`]
    Vec4(Vec4),
    /// A homogeneous array.
    Array(Vec<Value>),
    /// Mesh geometry.
    Mesh(MeshGeometry),
}

impl Value {
    /// Encodes the value as a document value.
    ///
    /// Mesh geometry is encoded as an inline table, which is only used by
    /// self-contained text copies.
    ///
    /// # Errors
    /// - [`ErrorKind::LimitExceeded`] if a `u64` does not fit the document's
    ///   signed 64-bit integers.
    pub fn to_toml(&self) -> Result<toml::Value, Error> {
        Ok(match self {
            Self::Bool(v) => toml::Value::Boolean(*v),
            Self::I32(v) => toml::Value::Integer(i64::from(*v)),
            Self::I64(v) => toml::Value::Integer(*v),
            Self::U32(v) => toml::Value::Integer(i64::from(*v)),
            Self::U64(v) => toml::Value::Integer(i64::try_from(*v).map_err(|_| {
                Error::new(ErrorKind::LimitExceeded {
                    what: "u64 field value",
                    count: *v,
                    max: i64::MAX as u64,
                })
            })?),
            Self::F32(v) => toml::Value::Float(f64::from(*v)),
            Self::String(v) => toml::Value::String(v.clone()),
            Self::Vec2(v) => floats(&v.to_array()),
            Self::Vec3(v) => floats(&v.to_array()),
            Self::Vec4(v) => floats(&v.to_array()),
            Self::Array(items) => toml::Value::Array(
                items
                    .iter()
                    .map(Self::to_toml)
                    .collect::<Result<_, _>>()?,
            ),
            Self::Mesh(mesh) => toml::Value::Table(mesh_to_table(mesh)),
        })
    }

    /// Decodes a document value as the given kind.
    ///
    /// # Errors
    /// - [`ErrorKind::InvalidValue`] if the value has the wrong shape.
    pub fn from_toml(kind: FieldKind, value: &toml::Value, field: &str) -> Result<Self, Error> {
        match kind {
            FieldKind::Primitive(p) => primitive_from_toml(p, value, field),
            FieldKind::Array(p) => {
                let items = value.as_array().ok_or_else(|| {
                    Error::invalid_value(field, format!("array of {}", p.describe()))
                })?;

                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| primitive_from_toml(p, item, &format!("{field}[{i}]")))
                    .collect::<Result<_, _>>()
                    .map(Self::Array)
            }
            FieldKind::Mesh => value
                .as_table()
                .ok_or_else(|| Error::invalid_value(field, "inline mesh table"))
                .and_then(|t| mesh_from_table(t, field))
                .map(Self::Mesh),
        }
    }
}

fn floats(values: &[f32]) -> toml::Value {
    toml::Value::Array(
        values
            .iter()
            .map(|v| toml::Value::Float(f64::from(*v)))
            .collect(),
    )
}

#[allow(clippy::cast_possible_truncation)]
fn float_from_toml(value: &toml::Value) -> Option<f32> {
    match value {
        toml::Value::Float(f) => Some(*f as f32),
        toml::Value::Integer(i) => Some(*i as f32),
        _ => None,
    }
}

fn floats_from_toml<const N: usize>(value: &toml::Value) -> Option<[f32; N]> {
    let items = value.as_array().filter(|a| a.len() == N)?;
    let mut out = [0.0; N];

    for (slot, item) in out.iter_mut().zip(items) {
        *slot = float_from_toml(item)?;
    }

    Some(out)
}

fn primitive_from_toml(kind: PrimitiveKind, value: &toml::Value, field: &str) -> Result<Value, Error> {
    let decoded = match kind {
        PrimitiveKind::Bool => value.as_bool().map(Value::Bool),
        PrimitiveKind::I32 => value
            .as_integer()
            .and_then(|i| i32::try_from(i).ok())
            .map(Value::I32),
        PrimitiveKind::I64 => value.as_integer().map(Value::I64),
        PrimitiveKind::U32 => value
            .as_integer()
            .and_then(|i| u32::try_from(i).ok())
            .map(Value::U32),
        PrimitiveKind::U64 => value
            .as_integer()
            .and_then(|i| u64::try_from(i).ok())
            .map(Value::U64),
        PrimitiveKind::F32 => float_from_toml(value).map(Value::F32),
        PrimitiveKind::String => value.as_str().map(|s| Value::String(s.to_owned())),
        PrimitiveKind::Vec2 => floats_from_toml(value).map(|a| Value::Vec2(Vec2::from_array(a))),
        PrimitiveKind::Vec3 => floats_from_toml(value).map(|a| Value::Vec3(Vec3::from_array(a))),
        PrimitiveKind::Vec4 => floats_from_toml(value).map(|a| Value::Vec4(Vec4::from_array(a))),
    };

    decoded.ok_or_else(|| Error::invalid_value(field, kind.describe()))
}

const MESH_INDICES: &str = "indices";
const MESH_POSITIONS: &str = "positions";
const MESH_NORMALS: &str = "normals";
const MESH_UVS: &str = "uvs";

fn mesh_to_table(mesh: &MeshGeometry) -> Table {
    let mut table = Table::new();

    table.insert(
        MESH_INDICES.into(),
        toml::Value::Array(
            mesh.indices
                .iter()
                .map(|i| toml::Value::Integer(i64::from(*i)))
                .collect(),
        ),
    );

    let stream = |f: fn(&Vertex) -> toml::Value| {
        toml::Value::Array(mesh.vertices.iter().map(f).collect())
    };

    table.insert(MESH_POSITIONS.into(), stream(|v| floats(&v.position.to_array())));
    table.insert(MESH_NORMALS.into(), stream(|v| floats(&v.normal.to_array())));
    table.insert(MESH_UVS.into(), stream(|v| floats(&v.uv.to_array())));

    table
}

fn mesh_from_table(table: &Table, field: &str) -> Result<MeshGeometry, Error> {
    let array = |key: &str| {
        table
            .get(key)
            .and_then(toml::Value::as_array)
            .ok_or_else(|| Error::invalid_value(format!("{field}.{key}"), "array"))
    };

    let indices = array(MESH_INDICES)?
        .iter()
        .map(|i| i.as_integer().and_then(|i| u16::try_from(i).ok()))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| Error::invalid_value(format!("{field}.{MESH_INDICES}"), "16-bit indices"))?;

    let positions = array(MESH_POSITIONS)?;
    let normals = array(MESH_NORMALS)?;
    let uvs = array(MESH_UVS)?;

    if positions.len() != normals.len() || positions.len() != uvs.len() {
        return Err(Error::invalid_value(field, "vertex streams of equal length"));
    }

    let vertices = positions
        .iter()
        .zip(normals)
        .zip(uvs)
        .map(|((p, n), t)| {
            Some(Vertex::new(
                Vec3::from_array(floats_from_toml(p)?),
                Vec3::from_array(floats_from_toml(n)?),
                Vec2::from_array(floats_from_toml(t)?),
            ))
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| Error::invalid_value(field, "vertex attribute arrays"))?;

    Ok(MeshGeometry::new(vertices, indices))
}

mod sealed {
    pub trait Sealed {}
}

/// A value type that can be stored in a reflected field.
///
/// Sealed: only the kinds representable in a document implement it, so an
/// unrepresentable field cannot be registered.
pub trait Field: sealed::Sealed + Sized + Send + Sync + 'static {
    /// The kind recorded for fields of this type.
    const KIND: FieldKind;

    /// Erases the value.
    fn into_value(self) -> Value;

    /// Recovers the value, or returns `None` if it holds a different kind.
    fn from_value(value: Value) -> Option<Self>;
}

/// A [`Field`] that can also be an array element.
pub trait Primitive: Field {
    /// The element kind.
    const PRIMITIVE: PrimitiveKind;
}

macro_rules! impl_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Field for $ty {
                const KIND: FieldKind = FieldKind::Primitive(PrimitiveKind::$variant);

                fn into_value(self) -> Value {
                    Value::$variant(self)
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }

            impl Primitive for $ty {
                const PRIMITIVE: PrimitiveKind = PrimitiveKind::$variant;
            }
        )*
    };
}

impl_primitive! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    String => String,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
}

impl<P: Primitive> sealed::Sealed for Vec<P> {}

impl<P: Primitive> Field for Vec<P> {
    const KIND: FieldKind = FieldKind::Array(P::PRIMITIVE);

    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(Field::into_value).collect())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(P::from_value).collect(),
            _ => None,
        }
    }
}

impl sealed::Sealed for MeshGeometry {}

impl Field for MeshGeometry {
    const KIND: FieldKind = FieldKind::Mesh;

    fn into_value(self) -> Value {
        Value::Mesh(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(kind: FieldKind, value: &Value) -> Value {
        let encoded = value.to_toml().unwrap();
        Value::from_toml(kind, &encoded, "field").unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(roundtrip(i32::KIND, &Value::I32(-7)), Value::I32(-7));
        assert_eq!(roundtrip(u64::KIND, &Value::U64(1 << 40)), Value::U64(1 << 40));
        assert_eq!(roundtrip(f32::KIND, &Value::F32(0.1)), Value::F32(0.1));
        assert_eq!(
            roundtrip(Vec3::KIND, &Value::Vec3(Vec3::new(1.5, -2.0, 0.1))),
            Value::Vec3(Vec3::new(1.5, -2.0, 0.1))
        );
    }

    #[test]
    fn test_vectors_are_float_arrays() {
        let encoded = Value::Vec4(Vec4::new(1.0, 2.0, 3.0, 4.0)).to_toml().unwrap();

        assert_eq!(encoded.as_array().map(Vec::len), Some(4));
        assert!(encoded.as_array().unwrap().iter().all(toml::Value::is_float));
    }

    #[test]
    fn test_integer_accepted_for_float() {
        let decoded = Value::from_toml(f32::KIND, &toml::Value::Integer(3), "f").unwrap();
        assert_eq!(decoded, Value::F32(3.0));
    }

    #[test]
    fn test_out_of_range_integer() {
        let err = Value::from_toml(u32::KIND, &toml::Value::Integer(-1), "count").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidValue { field, .. } if field == "count"));

        let err = Value::U64(u64::MAX).to_toml().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::LimitExceeded { .. }));
    }

    #[test]
    fn test_array_element_errors_name_the_index() {
        let value = toml::Value::Array(vec![toml::Value::Boolean(true), toml::Value::Integer(1)]);
        let err = Value::from_toml(Vec::<bool>::KIND, &value, "flags").unwrap_err();

        assert!(matches!(err.kind(), ErrorKind::InvalidValue { field, .. } if field == "flags[1]"));
    }

    #[test]
    fn test_typed_recovery() {
        let value = vec![String::from("a"), String::from("b")].into_value();

        assert_eq!(
            Vec::<String>::from_value(value.clone()),
            Some(vec!["a".into(), "b".into()])
        );
        assert_eq!(Vec::<i32>::from_value(value), None);
    }

    #[test]
    fn test_inline_mesh() {
        let mesh = MeshGeometry::new(
            vec![
                Vertex::new(Vec3::ZERO, Vec3::Y, Vec2::ZERO),
                Vertex::new(Vec3::X, Vec3::Y, Vec2::X),
                Vertex::new(Vec3::Z, Vec3::Y, Vec2::Y),
            ],
            vec![0, 1, 2],
        );

        assert_eq!(roundtrip(FieldKind::Mesh, &Value::Mesh(mesh.clone())), Value::Mesh(mesh));
    }
}
