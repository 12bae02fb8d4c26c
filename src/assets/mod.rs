//! Asset Storage
//!
//! The [`AssetStore`] owns the geometries, materials, textures and render
//! targets referenced by the scene graph. Scene nodes only hold handles.
//!
//! ```rust,ignore
//! let mut assets = AssetStore::new();
//! let geometry = assets.geometries.insert(Geometry::new());
//! let material = assets.materials.insert(Material::new(VERTEX, FRAGMENT));
//! scene.add_mesh(Mesh::new(geometry, material));
//! ```

pub mod handle;

pub use handle::{GeometryHandle, MaterialHandle, RenderTargetHandle, TextureHandle};

use slotmap::SlotMap;

use crate::resources::{Geometry, Material, RenderTarget, Texture};

/// Arena storage for every asset kind the renderer consumes.
#[derive(Debug, Default)]
pub struct AssetStore {
    pub geometries: SlotMap<GeometryHandle, Geometry>,
    pub materials: SlotMap<MaterialHandle, Material>,
    pub textures: SlotMap<TextureHandle, Texture>,
    pub render_targets: SlotMap<RenderTargetHandle, RenderTarget>,
}

impl AssetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a render target together with the texture that exposes its
    /// color attachment to materials.
    pub fn add_render_target(&mut self, mut target: RenderTarget) -> RenderTargetHandle {
        let texture = self
            .textures
            .insert(Texture::attachment(target.width, target.height));
        target.texture = Some(texture);
        self.render_targets.insert(target)
    }

    /// Removes a render target and its attachment texture.
    pub fn remove_render_target(&mut self, handle: RenderTargetHandle) -> Option<RenderTarget> {
        let target = self.render_targets.remove(handle)?;
        if let Some(texture) = target.texture {
            self.textures.remove(texture);
        }
        Some(target)
    }
}
