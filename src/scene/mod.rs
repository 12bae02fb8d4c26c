//! Scene Graph Module
//!
//! Manages the node hierarchy and its per-node data:
//! - [`Node`]: a scene node (parent/child links, transform, visibility, kind)
//! - [`Transform`]: position, rotation, scale plus cached local/world matrices
//! - [`Scene`]: the node arena with its root node
//! - [`Camera`]: projection parameters and derived view/frustum data
//! - [`transform_system`]: world-matrix propagation, decoupled from `Scene`

pub mod camera;
pub mod node;
pub mod scene;
pub mod transform;
pub mod transform_system;

pub use camera::{Camera, Frustum, ProjectionType};
pub use node::{Node, NodeKind};
pub use scene::{NodeBuilder, Scene};
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a [`Node`] stored in a [`Scene`] arena.
    ///
    /// Parent links are plain handles, never owning references.
    pub struct NodeHandle;
}
