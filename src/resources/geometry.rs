//! Geometry
//!
//! CPU-side vertex data: named attributes, an optional index, material groups
//! and a draw range. Every attribute and the index carry a version counter;
//! the renderer re-uploads a buffer only when its version moved.

use glam::{Affine3A, Vec3};
use rustc_hash::FxHashMap;

// ============================================================================
// Attribute data
// ============================================================================

/// Component storage of a vertex attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    F32(Vec<f32>),
    U16(Vec<u16>),
    U8(Vec<u8>),
}

impl AttributeData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::U8(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn component_size(&self) -> usize {
        match self {
            Self::F32(_) => 4,
            Self::U16(_) => 2,
            Self::U8(_) => 1,
        }
    }

    /// Raw little-endian bytes, as uploaded to a vertex buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::U16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::U8(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    data: AttributeData,
    pub item_size: u32,
    pub normalized: bool,
    /// Instancing divisor; 0 means per-vertex.
    pub divisor: u32,
    version: u64,
}

impl Attribute {
    #[must_use]
    pub fn new(data: AttributeData, item_size: u32) -> Self {
        Self {
            data,
            item_size: item_size.max(1),
            normalized: false,
            divisor: 0,
            version: 0,
        }
    }

    #[must_use]
    pub fn f32(data: Vec<f32>, item_size: u32) -> Self {
        Self::new(AttributeData::F32(data), item_size)
    }

    #[must_use]
    pub fn vec3(data: &[Vec3]) -> Self {
        Self::f32(data.iter().flat_map(|v| v.to_array()).collect(), 3)
    }

    #[must_use]
    pub fn instanced(mut self, divisor: u32) -> Self {
        self.divisor = divisor;
        self
    }

    #[must_use]
    pub fn normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    /// Number of items (vertices, or instances for instanced attributes).
    #[must_use]
    pub fn count(&self) -> u32 {
        (self.data.len() / self.item_size as usize) as u32
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &AttributeData {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_data(&mut self, data: AttributeData) {
        self.data = data;
        self.version += 1;
    }

    /// Flags the data for re-upload after in-place edits.
    pub fn needs_update(&mut self) {
        self.version += 1;
    }

    pub fn data_mut(&mut self) -> &mut AttributeData {
        self.version += 1;
        &mut self.data
    }
}

// ============================================================================
// Index
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum IndexData {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, i: usize) -> Option<u32> {
        match self {
            Self::U16(v) => v.get(i).map(|&x| u32::from(x)),
            Self::U32(v) => v.get(i).copied(),
        }
    }

    #[must_use]
    pub fn bytes_per_element(&self) -> u32 {
        match self {
            Self::U16(_) => 2,
            Self::U32(_) => 4,
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::U16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::U32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexBuffer {
    data: IndexData,
    version: u64,
}

impl IndexBuffer {
    #[must_use]
    pub fn new(data: IndexData) -> Self {
        Self { data, version: 0 }
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &IndexData {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn count(&self) -> u32 {
        self.data.len() as u32
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_data(&mut self, data: IndexData) {
        self.data = data;
        self.version += 1;
    }
}

// ============================================================================
// Groups, ranges, bounds
// ============================================================================

/// A sub-range of the geometry drawn with one slot of a multi-material mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryGroup {
    pub start: u32,
    pub count: u32,
    pub material_index: usize,
}

/// Portion of the geometry drawn; `count: None` means "to the end".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawRange {
    pub start: u32,
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    #[must_use]
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// The sphere in the space of `matrix`, scaled by its largest axis scale.
    #[must_use]
    pub fn transform(&self, matrix: &Affine3A) -> Self {
        let center = matrix.transform_point3(self.center);
        let max_scale = matrix
            .matrix3
            .x_axis
            .length_squared()
            .max(matrix.matrix3.y_axis.length_squared())
            .max(matrix.matrix3.z_axis.length_squared())
            .sqrt();
        Self {
            center,
            radius: self.radius * max_scale,
        }
    }
}

// ============================================================================
// Geometry
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Geometry {
    attributes: FxHashMap<String, Attribute>,
    index: Option<IndexBuffer>,
    pub groups: Vec<GeometryGroup>,
    pub draw_range: DrawRange,
    /// Instance count for instanced drawing; `None` draws non-instanced.
    pub instance_count: Option<u32>,
    /// Used for frustum culling when present.
    pub bounding_sphere: Option<BoundingSphere>,
    layout_version: u64,
}

impl Geometry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_attribute(mut self, name: &str, attribute: Attribute) -> Self {
        self.set_attribute(name, attribute);
        self
    }

    #[must_use]
    pub fn with_index(mut self, index: IndexData) -> Self {
        self.set_index(Some(index));
        self
    }

    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &FxHashMap<String, Attribute> {
        &self.attributes
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attributes.get_mut(name)
    }

    pub fn set_attribute(&mut self, name: &str, attribute: Attribute) {
        self.attributes.insert(name.to_owned(), attribute);
        self.layout_version += 1;
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        let removed = self.attributes.remove(name);
        if removed.is_some() {
            self.layout_version += 1;
        }
        removed
    }

    #[inline]
    #[must_use]
    pub fn index(&self) -> Option<&IndexBuffer> {
        self.index.as_ref()
    }

    pub fn index_mut(&mut self) -> Option<&mut IndexBuffer> {
        self.index.as_mut()
    }

    pub fn set_index(&mut self, index: Option<IndexData>) {
        self.index = index.map(IndexBuffer::new);
        self.layout_version += 1;
    }

    /// Bumped when attributes or the index are added, replaced or removed.
    #[inline]
    #[must_use]
    pub fn layout_version(&self) -> u64 {
        self.layout_version
    }

    pub fn add_group(&mut self, start: u32, count: u32, material_index: usize) {
        self.groups.push(GeometryGroup {
            start,
            count,
            material_index,
        });
    }

    pub fn clear_groups(&mut self) {
        self.groups.clear();
    }

    pub fn set_draw_range(&mut self, start: u32, count: Option<u32>) {
        self.draw_range = DrawRange { start, count };
    }
}
