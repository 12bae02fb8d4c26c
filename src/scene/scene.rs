use std::borrow::Cow;

use glam::{Affine3A, Quat, Vec3};
use slotmap::SlotMap;

use crate::errors::{MythGlError, Result};
use crate::resources::Mesh;
use crate::scene::NodeHandle;
use crate::scene::camera::Camera;
use crate::scene::node::{Node, NodeKind};
use crate::scene::transform_system;

/// Scene graph
///
/// Owns every node in an arena and designates one of them as the root. Nodes
/// are reachable for rendering only through the root; a node created with
/// [`Scene::create_node`] stays detached until attached somewhere below it.
pub struct Scene {
    pub(crate) nodes: SlotMap<NodeHandle, Node>,
    root: NodeHandle,

    /// When `false`, the renderer draws with the world matrices as they are
    /// instead of propagating the scene first.
    pub auto_update: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::group("Scene"));
        Self {
            nodes,
            root,
            auto_update: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &SlotMap<NodeHandle, Node> {
        &self.nodes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn build_node(&'_ mut self, name: impl Into<Cow<'static, str>>) -> NodeBuilder<'_> {
        NodeBuilder::new(self, name)
    }

    // ========================================================================
    // Insertion & hierarchy
    // ========================================================================

    /// Inserts a node without a parent; it is not rendered until attached.
    pub fn create_node(&mut self, node: Node) -> NodeHandle {
        let mut node = node;
        node.parent = None;
        node.children.clear();
        self.nodes.insert(node)
    }

    /// Inserts a node as a child of the root.
    pub fn add_node(&mut self, node: Node) -> NodeHandle {
        let handle = self.create_node(node);
        self.link(handle, self.root);
        handle
    }

    pub fn add_to_parent(&mut self, node: Node, parent: NodeHandle) -> Result<NodeHandle> {
        if !self.nodes.contains_key(parent) {
            return Err(MythGlError::NodeNotFound(parent));
        }
        let handle = self.create_node(node);
        self.link(handle, parent);
        Ok(handle)
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> NodeHandle {
        self.add_node(Node::mesh("Mesh", mesh))
    }

    pub fn add_camera(&mut self, camera: Camera) -> NodeHandle {
        self.add_node(Node::camera("Camera", camera))
    }

    /// Makes `child` a child of `parent`, detaching it from its previous
    /// parent first.
    ///
    /// Fails on stale handles, on self-attachment, and when `parent` is a
    /// descendant of `child`.
    pub fn attach(&mut self, child: NodeHandle, parent: NodeHandle) -> Result<()> {
        if child == parent {
            return Err(MythGlError::SelfAttachment(child));
        }
        if !self.nodes.contains_key(child) {
            return Err(MythGlError::NodeNotFound(child));
        }
        if !self.nodes.contains_key(parent) {
            return Err(MythGlError::NodeNotFound(parent));
        }
        if self.is_ancestor_of(child, parent) {
            return Err(MythGlError::CyclicAttachment { child, parent });
        }

        self.unlink(child);
        self.link(child, parent);
        Ok(())
    }

    /// Detaches `child` from its parent. The node stays alive but is no
    /// longer rendered.
    pub fn detach(&mut self, child: NodeHandle) -> Result<()> {
        if !self.nodes.contains_key(child) {
            return Err(MythGlError::NodeNotFound(child));
        }
        self.unlink(child);
        Ok(())
    }

    /// Destroys a node together with its whole subtree.
    ///
    /// The root cannot be removed. Returns whether anything was removed.
    pub fn remove_node(&mut self, handle: NodeHandle) -> bool {
        if handle == self.root {
            log::warn!("Scene root cannot be removed");
            return false;
        }
        if !self.nodes.contains_key(handle) {
            return false;
        }

        self.unlink(handle);

        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.children);
            }
        }
        true
    }

    /// `true` if `ancestor` appears on the parent chain of `node`.
    #[must_use]
    pub fn is_ancestor_of(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut cursor = self.nodes.get(node).and_then(|n| n.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(current).and_then(|n| n.parent);
        }
        false
    }

    fn link(&mut self, child: NodeHandle, parent: NodeHandle) {
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
            c.transform.mark_world_dirty();
        }
    }

    fn unlink(&mut self, child: NodeHandle) {
        let old_parent = self.nodes.get(child).and_then(|n| n.parent);
        if let Some(p) = old_parent
            && let Some(parent) = self.nodes.get_mut(p)
            && let Some(i) = parent.children.iter().position(|&x| x == child)
        {
            parent.children.remove(i);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
            c.transform.mark_world_dirty();
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    #[must_use]
    pub fn get_node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    pub fn get_node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[must_use]
    pub fn camera(&self, handle: NodeHandle) -> Option<&Camera> {
        self.nodes.get(handle).and_then(Node::as_camera)
    }

    pub fn camera_mut(&mut self, handle: NodeHandle) -> Option<&mut Camera> {
        self.nodes.get_mut(handle).and_then(Node::as_camera_mut)
    }

    pub fn set_visible(&mut self, handle: NodeHandle, visible: bool) -> Result<()> {
        let node = self
            .nodes
            .get_mut(handle)
            .ok_or(MythGlError::NodeNotFound(handle))?;
        node.visible = visible;
        Ok(())
    }

    // ========================================================================
    // Matrix propagation
    // ========================================================================

    /// Propagates world matrices through everything reachable from the root.
    pub fn update_matrix_world(&mut self) {
        transform_system::update_hierarchy(&mut self.nodes, self.root, false);
    }

    /// Propagates world matrices through the subtree rooted at `handle`.
    pub fn update_subtree(&mut self, handle: NodeHandle, force: bool) {
        transform_system::update_hierarchy(&mut self.nodes, handle, force);
    }

    // ========================================================================
    // World-space queries (refresh the ancestor chain only)
    // ========================================================================

    pub fn world_matrix(&mut self, handle: NodeHandle) -> Result<Affine3A> {
        transform_system::update_world_chain(&mut self.nodes, handle)
            .ok_or(MythGlError::NodeNotFound(handle))
    }

    pub fn world_position(&mut self, handle: NodeHandle) -> Result<Vec3> {
        self.world_matrix(handle).map(|m| Vec3::from(m.translation))
    }

    pub fn world_rotation(&mut self, handle: NodeHandle) -> Result<Quat> {
        self.world_matrix(handle)
            .map(|m| m.to_scale_rotation_translation().1)
    }

    pub fn world_scale(&mut self, handle: NodeHandle) -> Result<Vec3> {
        self.world_matrix(handle)
            .map(|m| m.to_scale_rotation_translation().0)
    }

    /// Facing direction in world space: -Z for cameras, +Z for other nodes.
    pub fn world_direction(&mut self, handle: NodeHandle) -> Result<Vec3> {
        let rotation = self.world_rotation(handle)?;
        let is_camera = matches!(
            self.nodes.get(handle).map(|n| &n.kind),
            Some(NodeKind::Camera(_))
        );
        let local = if is_camera { Vec3::NEG_Z } else { Vec3::Z };
        Ok((rotation * local).normalize_or_zero())
    }
}

/// Chained node construction.
pub struct NodeBuilder<'a> {
    scene: &'a mut Scene,
    node: Node,
    parent: Option<NodeHandle>,
}

impl<'a> NodeBuilder<'a> {
    pub fn new(scene: &'a mut Scene, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            scene,
            node: Node::group(name),
            parent: None,
        }
    }

    #[must_use]
    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.node.transform.position = Vec3::new(x, y, z);
        self
    }

    #[must_use]
    pub fn with_scale(mut self, s: f32) -> Self {
        self.node.transform.scale = Vec3::splat(s);
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: NodeHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.node.kind = NodeKind::Mesh(mesh);
        self
    }

    #[must_use]
    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.node.kind = NodeKind::Camera(camera);
        self
    }

    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.node.visible = visible;
        self
    }

    /// Inserts the node under its parent (the root by default).
    pub fn build(self) -> Result<NodeHandle> {
        match self.parent {
            Some(parent) => self.scene.add_to_parent(self.node, parent),
            None => Ok(self.scene.add_node(self.node)),
        }
    }
}
