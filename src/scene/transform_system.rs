//! Transform System
//!
//! World-matrix propagation over the node arena, kept apart from [`Scene`]
//! so it only borrows the `nodes` map.
//!
//! # Propagation rule
//!
//! For every visited node, in depth-first pre-order:
//! 1. rebuild the local matrix from TRS if `matrix_auto_update` is on
//! 2. if the world matrix is dirty or an ancestor's changed, recompute it
//!    (`parent.world * local`, or `local` for a node without parent)
//! 3. descend, forcing every child to recompute once this node changed
//!
//! Each child list is snapshotted onto the work stack when its parent is
//! visited, so every node is reached exactly once per pass.
//!
//! [`Scene`]: crate::scene::Scene

use glam::Affine3A;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::scene::NodeHandle;
use crate::scene::node::{Node, NodeKind};

/// Recomputes a node's world matrix if needed and returns whether it changed.
#[inline]
fn update_node(node: &mut Node, parent_world: Option<&Affine3A>, force: bool) -> bool {
    node.transform.update_local_matrix();

    if !(node.transform.world_dirty || force) {
        return false;
    }

    let world = match parent_world {
        Some(parent) => *parent * node.transform.local_matrix,
        None => node.transform.local_matrix,
    };
    node.transform.set_world_matrix(world);

    if let NodeKind::Camera(camera) = &mut node.kind {
        camera.update_view(&world);
    }

    true
}

/// Propagates world matrices through the subtree rooted at `root`.
///
/// `root`'s parent world matrix (if any) is read as-is; pass `force` to
/// recompute every world matrix in the subtree unconditionally.
pub fn update_hierarchy(nodes: &mut SlotMap<NodeHandle, Node>, root: NodeHandle, force: bool) {
    let parent_world = nodes
        .get(root)
        .and_then(|n| n.parent)
        .and_then(|p| nodes.get(p))
        .map(|p| p.transform.world_matrix);

    // (node, parent world, ancestor changed)
    let mut stack: Vec<(NodeHandle, Option<Affine3A>, bool)> = Vec::with_capacity(64);
    stack.push((root, parent_world, force));

    while let Some((handle, parent_world, force)) = stack.pop() {
        let Some(node) = nodes.get_mut(handle) else {
            continue;
        };

        let changed = update_node(node, parent_world.as_ref(), force);
        let world = node.transform.world_matrix;
        let force_children = force || changed;

        for &child in node.children.iter().rev() {
            stack.push((child, Some(world), force_children));
        }
    }
}

/// Brings the world matrix of `handle` up to date by walking only its
/// ancestor chain, top-down.
///
/// Siblings are not visited; instead the children of every ancestor that had
/// to be recomputed are flagged dirty so a later full pass still refreshes
/// them. Returns `None` if the handle is stale.
pub fn update_world_chain(
    nodes: &mut SlotMap<NodeHandle, Node>,
    handle: NodeHandle,
) -> Option<Affine3A> {
    let mut chain: SmallVec<[NodeHandle; 16]> = SmallVec::new();
    let mut cursor = Some(handle);
    while let Some(current) = cursor {
        let node = nodes.get(current)?;
        chain.push(current);
        cursor = node.parent;
    }

    let mut parent_world: Option<Affine3A> = None;
    let mut force = false;

    for &current in chain.iter().rev() {
        let node = nodes.get_mut(current)?;
        let changed = update_node(node, parent_world.as_ref(), force);
        parent_world = Some(node.transform.world_matrix);

        if changed {
            force = true;
            let children: SmallVec<[NodeHandle; 8]> = node.children.iter().copied().collect();
            for child in children {
                if let Some(child) = nodes.get_mut(child) {
                    child.transform.mark_world_dirty();
                }
            }
        }
    }

    parent_world
}
