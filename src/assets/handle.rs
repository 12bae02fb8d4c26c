//! Asset Handles
//!
//! Generational keys identifying assets stored in an [`AssetStore`](super::AssetStore).
//!
//! A handle is a stable identity: the renderer keys every piece of GPU-side
//! state (compiled program, vertex buffers, texture objects) by it, so two
//! materials are never confused even when their contents are identical.

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a [`Geometry`](crate::resources::Geometry).
    pub struct GeometryHandle;
    /// Handle to a [`Material`](crate::resources::Material).
    pub struct MaterialHandle;
    /// Handle to a [`Texture`](crate::resources::Texture).
    pub struct TextureHandle;
    /// Handle to a [`RenderTarget`](crate::resources::RenderTarget).
    pub struct RenderTargetHandle;
}
