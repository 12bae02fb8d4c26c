//! Render List
//!
//! Per-frame draw records, rebuilt from the scene graph before drawing.
//!
//! [`RenderListBuilder`] walks the scene from its root in depth-first
//! pre-order using the world matrices of the last propagation. An invisible
//! node hides its whole subtree. Every visible mesh contributes one
//! [`RenderItem`] per material: a single-material mesh one item for the whole
//! geometry, a multi-material mesh one item per geometry group whose slot is
//! populated.
//!
//! Items are bucketed by their material's `transparent` flag and keyed by the
//! clip-space depth of the node's world position. Opaque items sort nearest
//! first, transparent items farthest first; both sorts are stable.

use glam::Vec3;
use log::debug;

use crate::assets::{AssetStore, GeometryHandle, MaterialHandle};
use crate::resources::{DrawMode, GeometryGroup, MeshMaterial};
use crate::scene::{Camera, Node, NodeHandle, NodeKind, Scene};

/// One scheduled draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderItem {
    pub node: NodeHandle,
    pub geometry: GeometryHandle,
    pub material: MaterialHandle,
    /// Sub-range for multi-material meshes.
    pub group: Option<GeometryGroup>,
    /// NDC depth of the node origin.
    pub z: f32,
    pub draw_mode: DrawMode,
}

#[derive(Debug, Clone, Default)]
pub struct RenderList {
    pub opaque: Vec<RenderItem>,
    pub transparent: Vec<RenderItem>,
}

impl RenderList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.opaque.clear();
        self.transparent.clear();
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }

    pub fn push(&mut self, item: RenderItem, transparent: bool) {
        if transparent {
            self.transparent.push(item);
        } else {
            self.opaque.push(item);
        }
    }

    /// Opaque ascending, transparent descending by `z`; ties keep insertion
    /// order.
    pub fn sort(&mut self) {
        self.opaque.sort_by(|a, b| a.z.total_cmp(&b.z));
        self.transparent.sort_by(|a, b| b.z.total_cmp(&a.z));
    }

    /// Opaque items followed by transparent items.
    pub fn iter(&self) -> impl Iterator<Item = &RenderItem> {
        self.opaque.iter().chain(&self.transparent)
    }
}

/// Fills a [`RenderList`] from a scene; keeps its traversal stack between
/// frames.
#[derive(Debug, Default)]
pub struct RenderListBuilder {
    stack: Vec<NodeHandle>,
}

impl RenderListBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears `list` and refills it with everything `camera` sees in `scene`.
    pub fn build(
        &mut self,
        list: &mut RenderList,
        scene: &Scene,
        camera: &Camera,
        assets: &AssetStore,
        sort_objects: bool,
    ) {
        list.clear();
        self.stack.clear();
        self.stack.push(scene.root());

        while let Some(handle) = self.stack.pop() {
            let Some(node) = scene.get_node(handle) else {
                continue;
            };
            if !node.visible {
                continue;
            }

            if let NodeKind::Mesh(_) = node.kind {
                Self::collect(list, handle, node, camera, assets);
            }

            self.stack.extend(node.children().iter().rev().copied());
        }

        if sort_objects {
            list.sort();
        }
    }

    fn collect(
        list: &mut RenderList,
        handle: NodeHandle,
        node: &Node,
        camera: &Camera,
        assets: &AssetStore,
    ) {
        let NodeKind::Mesh(mesh) = &node.kind else {
            return;
        };
        let Some(geometry) = assets.geometries.get(mesh.geometry) else {
            debug!("Mesh '{}' has no geometry; skipped", node.name);
            return;
        };

        let world = node.world_matrix();
        if node.frustum_culled
            && let Some(sphere) = geometry.bounding_sphere
        {
            let bounds = sphere.transform(world);
            if !camera.frustum().intersects_sphere(bounds.center, bounds.radius) {
                return;
            }
        }

        let z = camera
            .view_projection_matrix()
            .project_point3(Vec3::from(world.translation))
            .z;

        let mut push = |material: MaterialHandle, group: Option<GeometryGroup>| {
            let Some(resolved) = assets.materials.get(material) else {
                debug!("Mesh '{}' references a missing material; skipped", node.name);
                return;
            };
            if !resolved.visible {
                return;
            }
            list.push(
                RenderItem {
                    node: handle,
                    geometry: mesh.geometry,
                    material,
                    group,
                    z,
                    draw_mode: mesh.draw_mode,
                },
                resolved.transparent,
            );
        };

        match &mesh.material {
            MeshMaterial::Single(material) => push(*material, None),
            MeshMaterial::Multi(slots) => {
                for group in &geometry.groups {
                    match slots.get(group.material_index) {
                        Some(Some(material)) => push(*material, Some(*group)),
                        _ => debug!(
                            "Mesh '{}' has no material in slot {}; group skipped",
                            node.name, group.material_index
                        ),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{BoundingSphere, Geometry, Material, Mesh};
    use glam::Vec3;

    struct Fixture {
        scene: Scene,
        assets: AssetStore,
        camera: NodeHandle,
        opaque: MaterialHandle,
        transparent: MaterialHandle,
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new();
        let mut assets = AssetStore::new();
        let camera = scene.add_camera(Camera::new_perspective(60.0, 1.0, 0.1, 100.0));
        if let Some(node) = scene.get_node_mut(camera) {
            node.transform.look_at(Vec3::Z, Vec3::Y);
        }
        let opaque = assets.materials.insert(Material::new("", ""));
        let transparent = assets
            .materials
            .insert(Material::new("", "").with_transparent(true));
        Fixture {
            scene,
            assets,
            camera,
            opaque,
            transparent,
        }
    }

    impl Fixture {
        fn mesh_at(&mut self, z: f32, material: MaterialHandle) -> NodeHandle {
            let geometry = self.assets.geometries.insert(Geometry::new());
            let node = self.scene.add_mesh(Mesh::new(geometry, material));
            if let Some(n) = self.scene.get_node_mut(node) {
                n.transform.position = Vec3::new(0.0, 0.0, z);
            }
            node
        }

        fn build(&mut self, sort: bool) -> RenderList {
            self.scene.update_matrix_world();
            let mut list = RenderList::new();
            let camera = self.scene.camera(self.camera).unwrap();
            RenderListBuilder::new().build(&mut list, &self.scene, camera, &self.assets, sort);
            list
        }
    }

    #[test]
    fn buckets_sort_in_opposite_directions() {
        let mut f = fixture();
        let (o, t) = (f.opaque, f.transparent);
        let far_opaque = f.mesh_at(20.0, o);
        let near_opaque = f.mesh_at(5.0, o);
        let near_clear = f.mesh_at(4.0, t);
        let far_clear = f.mesh_at(30.0, t);

        let list = f.build(true);
        let opaque: Vec<_> = list.opaque.iter().map(|i| i.node).collect();
        let transparent: Vec<_> = list.transparent.iter().map(|i| i.node).collect();
        assert_eq!(opaque, vec![near_opaque, far_opaque]);
        assert_eq!(transparent, vec![far_clear, near_clear]);
    }

    #[test]
    fn equal_depths_keep_traversal_order() {
        let mut f = fixture();
        let o = f.opaque;
        let nodes: Vec<_> = (0..4).map(|_| f.mesh_at(10.0, o)).collect();
        let list = f.build(true);
        let order: Vec<_> = list.opaque.iter().map(|i| i.node).collect();
        assert_eq!(order, nodes);
    }

    #[test]
    fn invisible_nodes_hide_their_subtree() {
        let mut f = fixture();
        let o = f.opaque;
        let parent = f.mesh_at(5.0, o);
        let child = f.mesh_at(6.0, o);
        f.scene.attach(child, parent).unwrap();
        f.scene.set_visible(parent, false).unwrap();

        assert!(f.build(true).is_empty());
    }

    #[test]
    fn multi_material_meshes_emit_one_item_per_populated_group() {
        let mut f = fixture();
        let mut geometry = Geometry::new();
        geometry.add_group(0, 3, 0);
        geometry.add_group(3, 3, 1);
        geometry.add_group(6, 3, 5);
        let geometry = f.assets.geometries.insert(geometry);
        let mesh = Mesh::multi(geometry, vec![Some(f.opaque), None]);
        let node = f.scene.add_mesh(mesh);
        if let Some(n) = f.scene.get_node_mut(node) {
            n.transform.position.z = 5.0;
        }

        let list = f.build(true);
        assert_eq!(list.len(), 1);
        assert_eq!(list.opaque[0].group.map(|g| g.start), Some(0));
    }

    #[test]
    fn missing_and_hidden_materials_are_skipped() {
        let mut f = fixture();
        let hidden = {
            let mut m = Material::new("", "");
            m.visible = false;
            f.assets.materials.insert(m)
        };
        let gone = f.assets.materials.insert(Material::new("", ""));
        f.assets.materials.remove(gone);

        f.mesh_at(5.0, hidden);
        f.mesh_at(5.0, gone);
        assert!(f.build(true).is_empty());
    }

    #[test]
    fn frustum_culling_uses_bounding_sphere() {
        let mut f = fixture();
        let o = f.opaque;
        let behind = f.mesh_at(-10.0, o);
        let unculled = f.mesh_at(-10.0, o);
        for node in [behind, unculled] {
            let geometry = f.scene.get_node(node).unwrap().as_mesh().unwrap().geometry;
            f.assets.geometries[geometry].bounding_sphere =
                Some(BoundingSphere::new(Vec3::ZERO, 1.0));
        }
        f.scene.get_node_mut(unculled).unwrap().frustum_culled = false;

        let list = f.build(true);
        assert_eq!(list.len(), 1);
        assert_eq!(list.opaque[0].node, unculled);
    }
}
