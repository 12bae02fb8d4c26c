use std::borrow::Cow;

use glam::Affine3A;

use crate::resources::Mesh;
use crate::scene::NodeHandle;
use crate::scene::camera::Camera;
use crate::scene::transform::Transform;

/// What a node contributes to the frame, matched by the traversals.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Pure transform node.
    Group,
    Mesh(Mesh),
    Camera(Camera),
    /// Skeleton joint; transform-only as far as rendering is concerned.
    Bone,
}

/// A scene node.
///
/// # Hierarchy
///
/// Nodes form a tree through handles into the owning [`Scene`](super::Scene)
/// arena:
/// - `parent`: `None` for the scene root and for detached nodes
/// - `children`: owned child handles, in insertion order
///
/// # Visibility
///
/// An invisible node is skipped together with its whole subtree when the
/// render list is built.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: Cow<'static, str>,

    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,

    pub transform: Transform,

    pub visible: bool,
    /// Meshes with a bounding sphere outside the camera frustum are skipped.
    pub frustum_culled: bool,

    pub kind: NodeKind,
}

impl Node {
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            visible: true,
            frustum_culled: true,
            kind,
        }
    }

    #[must_use]
    pub fn group(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    #[must_use]
    pub fn mesh(name: impl Into<Cow<'static, str>>, mesh: Mesh) -> Self {
        Self::new(name, NodeKind::Mesh(mesh))
    }

    #[must_use]
    pub fn camera(name: impl Into<Cow<'static, str>>, camera: Camera) -> Self {
        Self::new(name, NodeKind::Camera(camera))
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.transform.world_matrix
    }

    #[inline]
    #[must_use]
    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    #[inline]
    pub fn as_mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_camera(&self) -> Option<&Camera> {
        match &self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    #[inline]
    pub fn as_camera_mut(&mut self) -> Option<&mut Camera> {
        match &mut self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::group("")
    }
}
