//! Mesh geometry and its binary side-file codec.
//!
//! Layout (little-endian, no padding):
//!
//! ```text
//! u32              index count
//! u16 × count      indices
//! u32              vertex count
//! f32[3] × count   positions
//! f32[3] × count   normals
//! f32[2] × count   uvs
//! ```

use bevy::math::{
    Vec2,
    Vec3,
};

use crate::error::{
    Error,
    ErrorKind,
};

/// The on-disk index type.
pub type Index = u16;

/// Tolerance used when comparing vertex attributes.
pub const GEOMETRY_EPSILON: f32 = 1e-5;

const COUNT_SIZE: usize = size_of::<u32>();
const INDEX_SIZE: usize = size_of::<Index>();
const VEC3_SIZE: usize = 3 * size_of::<f32>();
const VEC2_SIZE: usize = 2 * size_of::<f32>();

/// A single mesh vertex.
#[derive(Clone, Copy, Debug, Default)]
pub struct Vertex {
    /// Object-space position.
    pub position: Vec3,
    /// Surface normal.
    pub normal: Vec3,
    /// Texture coordinate.
    pub uv: Vec2,
}

impl Vertex {
    /// Creates a new vertex.
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// Returns `true` if every component is within `epsilon` of `other`.
    pub fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.position.abs_diff_eq(other.position, epsilon)
            && self.normal.abs_diff_eq(other.normal, epsilon)
            && self.uv.abs_diff_eq(other.uv, epsilon)
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.abs_diff_eq(other, GEOMETRY_EPSILON)
    }
}

/// Indexed triangle geometry stored in a binary side file.
///
/// Equality compares indices exactly and vertices within [`GEOMETRY_EPSILON`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshGeometry {
    /// Vertex attributes.
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into [`vertices`](Self::vertices).
    pub indices: Vec<Index>,
}

impl MeshGeometry {
    /// Creates geometry from vertices and indices.
    pub fn new(vertices: Vec<Vertex>, indices: Vec<Index>) -> Self {
        Self { vertices, indices }
    }

    /// Returns `true` if there are no vertices and no indices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.indices.is_empty()
    }

    /// Checks that every index refers to an existing vertex.
    ///
    /// # Errors
    /// - [`ErrorKind::InvalidValue`] naming the first out-of-range index.
    pub fn validate(&self) -> Result<(), Error> {
        let count = self.vertices.len();

        match self.indices.iter().position(|&i| usize::from(i) >= count) {
            Some(at) => Err(Error::invalid_value(
                format!("indices[{at}]"),
                format!("index below the vertex count {count}"),
            )),
            None => Ok(()),
        }
    }

    /// Encodes the geometry into its binary side-file layout.
    ///
    /// # Errors
    /// - [`ErrorKind::LimitExceeded`] if either count exceeds [`u32::MAX`].
    ///   Nothing is encoded in that case.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let index_count = check_count("index", self.indices.len())?;
        let vertex_count = check_count("vertex", self.vertices.len())?;

        let mut buf = Vec::with_capacity(self.encoded_len());

        buf.extend_from_slice(&index_count.to_le_bytes());
        for index in &self.indices {
            buf.extend_from_slice(&index.to_le_bytes());
        }

        buf.extend_from_slice(&vertex_count.to_le_bytes());
        for vertex in &self.vertices {
            write_floats(&mut buf, &vertex.position.to_array());
        }
        for vertex in &self.vertices {
            write_floats(&mut buf, &vertex.normal.to_array());
        }
        for vertex in &self.vertices {
            write_floats(&mut buf, &vertex.uv.to_array());
        }

        Ok(buf)
    }

    /// Decodes geometry from its binary side-file layout.
    ///
    /// # Errors
    /// - [`ErrorKind::UnexpectedEndOfFile`] if any array is truncated.
    /// - [`ErrorKind::SizeMismatch`] if bytes remain after the last array.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::new(bytes);

        let index_count = reader.count()?;
        let indices = reader
            .take(index_count, INDEX_SIZE)?
            .chunks_exact(INDEX_SIZE)
            .map(|c| Index::from_le_bytes([c[0], c[1]]))
            .collect::<Vec<_>>();

        let vertex_count = reader.count()?;
        let positions = reader.take(vertex_count, VEC3_SIZE)?;
        let normals = reader.take(vertex_count, VEC3_SIZE)?;
        let uvs = reader.take(vertex_count, VEC2_SIZE)?;

        if reader.offset != bytes.len() {
            return Err(ErrorKind::SizeMismatch {
                expected: reader.offset,
                actual: bytes.len(),
            }
            .into());
        }

        let vertices = positions
            .chunks_exact(VEC3_SIZE)
            .zip(normals.chunks_exact(VEC3_SIZE))
            .zip(uvs.chunks_exact(VEC2_SIZE))
            .map(|((p, n), t)| {
                Vertex::new(
                    Vec3::from_array(read_floats(p)),
                    Vec3::from_array(read_floats(n)),
                    Vec2::from_array(read_floats(t)),
                )
            })
            .collect();

        Ok(Self { vertices, indices })
    }

    fn encoded_len(&self) -> usize {
        2 * COUNT_SIZE
            + self.indices.len() * INDEX_SIZE
            + self.vertices.len() * (2 * VEC3_SIZE + VEC2_SIZE)
    }
}

fn check_count(what: &'static str, count: usize) -> Result<u32, Error> {
    u32::try_from(count).map_err(|_| {
        ErrorKind::LimitExceeded {
            what,
            count: count as u64,
            max: u64::from(u32::MAX),
        }
        .into()
    })
}

fn write_floats(buf: &mut Vec<u8>, values: &[f32]) {
    for value in values {
        buf.extend_from_slice(&value.to_le_bytes());
    }
}

fn read_floats<const N: usize>(bytes: &[u8]) -> [f32; N] {
    let mut out = [0.0; N];

    for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    out
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take_bytes(&mut self, needed: usize) -> Result<&'a [u8], Error> {
        if needed > self.remaining() {
            return Err(ErrorKind::UnexpectedEndOfFile {
                needed,
                remaining: self.remaining(),
            }
            .into());
        }

        let slice = &self.bytes[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    fn count(&mut self) -> Result<usize, Error> {
        let bytes = self.take_bytes(COUNT_SIZE)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize)
    }

    fn take(&mut self, count: usize, stride: usize) -> Result<&'a [u8], Error> {
        // Saturate so a hostile count reports truncation rather than overflowing.
        let needed = count.saturating_mul(stride);
        self.take_bytes(needed)
    }
}
