//! Transform and propagation tests
//!
//! Tests for:
//! - Lazy local-matrix rebuilds, Euler angles, look_at, set_local_matrix
//! - Hierarchical world-matrix propagation through the scene graph
//! - Ancestor-chain world queries

use glam::{Affine3A, Mat4, Quat, Vec3};
use myth_gl::scene::transform::Transform;
use myth_gl::scene::{Node, NodeHandle, Scene};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f32 = 1e-5;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
}

fn affine_approx(a: &Affine3A, b: &Affine3A) -> bool {
    Mat4::from(*a).abs_diff_eq(Mat4::from(*b), 1e-4)
}

fn group_at(scene: &mut Scene, parent: NodeHandle, position: Vec3) -> NodeHandle {
    let mut node = Node::group("group");
    node.transform.position = position;
    scene.add_to_parent(node, parent).unwrap()
}

// ============================================================================
// Transform
// ============================================================================

#[test]
fn each_trs_component_triggers_one_rebuild() {
    let mut t = Transform::new();
    assert_eq!(t.scale, Vec3::ONE);
    assert!(t.update_local_matrix(), "a fresh transform always builds once");

    let edits: [fn(&mut Transform); 3] = [
        |t| t.position = Vec3::new(1.0, 2.0, 3.0),
        |t| t.rotation = Quat::from_rotation_y(FRAC_PI_2),
        |t| t.scale = Vec3::splat(2.0),
    ];
    for edit in edits {
        edit(&mut t);
        assert!(t.update_local_matrix());
        assert!(!t.update_local_matrix());
    }

    let mat = Mat4::from(*t.local_matrix());
    assert!(vec3_approx(mat.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0)));
    assert!(approx_eq(mat.transform_vector3(Vec3::X).length(), 2.0));
}

#[test]
fn euler_angles_read_back_in_xyz_order() {
    let mut t = Transform::new();
    t.set_rotation_euler(0.3, -0.7, 1.2);
    let euler = t.rotation_euler();
    assert!(vec3_approx(euler, Vec3::new(0.3, -0.7, 1.2)));
}

#[test]
fn look_at_turns_cameras_toward_the_target() {
    let mut t = Transform::new();
    t.position = Vec3::new(0.0, 0.0, 5.0);
    t.look_at(Vec3::ZERO, Vec3::Y);
    assert!(vec3_approx(t.rotation * Vec3::NEG_Z, Vec3::NEG_Z));

    t.look_at(Vec3::new(5.0, 0.0, 5.0), Vec3::Y);
    assert!(vec3_approx(t.rotation * Vec3::NEG_Z, Vec3::X));

    // Straight up the up axis is degenerate.
    let before = t.rotation;
    t.look_at(Vec3::new(0.0, 50.0, 5.0), Vec3::Y);
    assert_eq!(t.rotation, before);
}

#[test]
fn set_local_matrix_keeps_trs_in_sync() {
    let rotation = Quat::from_rotation_y(FRAC_PI_4);
    let mat = Affine3A::from_scale_rotation_translation(
        Vec3::new(2.0, 3.0, 1.5),
        rotation,
        Vec3::new(5.0, -3.0, 7.0),
    );
    let mut t = Transform::new();
    t.set_local_matrix(mat);

    assert!(vec3_approx(t.position, Vec3::new(5.0, -3.0, 7.0)));
    assert!(vec3_approx(t.scale, Vec3::new(2.0, 3.0, 1.5)));
    assert!(t.rotation.abs_diff_eq(rotation, 1e-4));
    assert!(t.is_world_dirty());
    assert!(!t.update_local_matrix());
}

// ============================================================================
// Propagation
// ============================================================================

#[test]
fn world_matrix_composes_parent_and_local() {
    let mut scene = Scene::new();
    let root = scene.root();
    let a = group_at(&mut scene, root, Vec3::new(1.0, 0.0, 0.0));
    let b = group_at(&mut scene, a, Vec3::new(0.0, 2.0, 0.0));
    let c = group_at(&mut scene, b, Vec3::new(0.0, 0.0, 3.0));
    scene.get_node_mut(b).unwrap().transform.rotation = Quat::from_rotation_z(FRAC_PI_2);

    scene.update_matrix_world();

    for handle in [a, b, c] {
        let node = scene.get_node(handle).unwrap();
        let parent = scene.get_node(node.parent().unwrap()).unwrap();
        let expected = *parent.world_matrix() * *node.transform.local_matrix();
        assert!(affine_approx(node.world_matrix(), &expected));
        assert!(!node.transform.is_world_dirty());
    }

    let root_node = scene.get_node(root).unwrap();
    assert!(affine_approx(
        root_node.world_matrix(),
        root_node.transform.local_matrix()
    ));
}

#[test]
fn moving_root_updates_untouched_descendants() {
    let mut scene = Scene::new();
    let root = scene.root();
    let parent = group_at(&mut scene, root, Vec3::ZERO);
    let child = group_at(&mut scene, parent, Vec3::new(0.0, 1.0, 0.0));
    let grandchild = group_at(&mut scene, child, Vec3::new(0.0, 1.0, 0.0));
    scene.update_matrix_world();

    scene.get_node_mut(parent).unwrap().transform.position = Vec3::new(10.0, 0.0, 0.0);
    scene.update_matrix_world();

    let world = |h| Vec3::from(scene.get_node(h).unwrap().world_matrix().translation);
    assert!(vec3_approx(world(child), Vec3::new(10.0, 1.0, 0.0)));
    assert!(vec3_approx(world(grandchild), Vec3::new(10.0, 2.0, 0.0)));
}

#[test]
fn reparenting_marks_world_dirty_and_recomputes() {
    let mut scene = Scene::new();
    let root = scene.root();
    let left = group_at(&mut scene, root, Vec3::new(-5.0, 0.0, 0.0));
    let right = group_at(&mut scene, root, Vec3::new(5.0, 0.0, 0.0));
    let leaf = group_at(&mut scene, left, Vec3::new(0.0, 1.0, 0.0));
    scene.update_matrix_world();

    scene.attach(leaf, right).unwrap();
    assert!(scene.get_node(leaf).unwrap().transform.is_world_dirty());
    assert_eq!(scene.get_node(left).unwrap().children().len(), 0);

    scene.update_matrix_world();
    let translation = scene.get_node(leaf).unwrap().world_matrix().translation;
    assert!(vec3_approx(Vec3::from(translation), Vec3::new(5.0, 1.0, 0.0)));
}

#[test]
fn world_queries_refresh_only_the_ancestor_chain() {
    let mut scene = Scene::new();
    let root = scene.root();
    let parent = group_at(&mut scene, root, Vec3::ZERO);
    let queried = group_at(&mut scene, parent, Vec3::new(1.0, 0.0, 0.0));
    let sibling = group_at(&mut scene, parent, Vec3::new(-1.0, 0.0, 0.0));
    scene.update_matrix_world();

    {
        let node = scene.get_node_mut(parent).unwrap();
        node.transform.position = Vec3::new(0.0, 4.0, 0.0);
        node.transform.scale = Vec3::splat(2.0);
    }

    let position = scene.world_position(queried).unwrap();
    assert!(vec3_approx(position, Vec3::new(2.0, 4.0, 0.0)));
    assert!(vec3_approx(scene.world_scale(queried).unwrap(), Vec3::splat(2.0)));

    // Not visited, but flagged so the next full pass picks it up.
    assert!(scene.get_node(sibling).unwrap().transform.is_world_dirty());
    scene.update_matrix_world();
    let sibling_world = scene.get_node(sibling).unwrap().world_matrix().translation;
    assert!(vec3_approx(Vec3::from(sibling_world), Vec3::new(-2.0, 4.0, 0.0)));
}

#[test]
fn world_direction_faces_positive_z_for_plain_nodes() {
    let mut scene = Scene::new();
    let root = scene.root();
    let node = group_at(&mut scene, root, Vec3::ZERO);
    scene.get_node_mut(node).unwrap().transform.rotation = Quat::from_rotation_y(FRAC_PI_2);

    let direction = scene.world_direction(node).unwrap();
    assert!(vec3_approx(direction, Vec3::new(1.0, 0.0, 0.0)));
}

#[test]
fn manual_matrices_are_respected() {
    let mut scene = Scene::new();
    let root = scene.root();
    let node = group_at(&mut scene, root, Vec3::ZERO);
    {
        let n = scene.get_node_mut(node).unwrap();
        n.transform.matrix_auto_update = false;
        n.transform
            .set_local_matrix(Affine3A::from_translation(Vec3::new(0.0, 0.0, -7.0)));
        n.transform.position = Vec3::new(100.0, 0.0, 0.0);
    }
    scene.update_matrix_world();

    let translation = scene.get_node(node).unwrap().world_matrix().translation;
    assert!(vec3_approx(Vec3::from(translation), Vec3::new(0.0, 0.0, -7.0)));
}
