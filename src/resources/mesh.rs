use crate::assets::{GeometryHandle, MaterialHandle};

/// Primitive topology used when drawing a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
    Lines,
    LineStrip,
    LineLoop,
    Points,
}

impl DrawMode {
    #[inline]
    #[must_use]
    pub fn is_line(self) -> bool {
        matches!(self, Self::Lines | Self::LineStrip | Self::LineLoop)
    }
}

/// Material slot(s) of a mesh.
///
/// A multi-material mesh draws each geometry group with the material at the
/// group's `material_index`; empty slots are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshMaterial {
    Single(MaterialHandle),
    Multi(Vec<Option<MaterialHandle>>),
}

impl MeshMaterial {
    /// Handles of every populated slot.
    pub fn handles(&self) -> impl Iterator<Item = MaterialHandle> + '_ {
        let (single, slots): (Option<MaterialHandle>, &[Option<MaterialHandle>]) = match self {
            Self::Single(handle) => (Some(*handle), &[]),
            Self::Multi(slots) => (None, slots.as_slice()),
        };
        single.into_iter().chain(slots.iter().flatten().copied())
    }
}

/// Drawable component: a geometry drawn with one or more materials.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub geometry: GeometryHandle,
    pub material: MeshMaterial,
    pub draw_mode: DrawMode,
}

impl Mesh {
    #[must_use]
    pub fn new(geometry: GeometryHandle, material: MaterialHandle) -> Self {
        Self {
            geometry,
            material: MeshMaterial::Single(material),
            draw_mode: DrawMode::Triangles,
        }
    }

    #[must_use]
    pub fn multi(geometry: GeometryHandle, materials: Vec<Option<MaterialHandle>>) -> Self {
        Self {
            geometry,
            material: MeshMaterial::Multi(materials),
            draw_mode: DrawMode::Triangles,
        }
    }

    #[must_use]
    pub fn with_draw_mode(mut self, mode: DrawMode) -> Self {
        self.draw_mode = mode;
        self
    }
}
