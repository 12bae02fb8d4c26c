#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! # Myth GL
//!
//! A retained-mode 3D scene renderer for GL-style immediate-mode drivers.
//!
//! Build a [`Scene`] of nodes, keep geometries, materials and textures in an
//! [`AssetStore`], and hand both to a [`Renderer`] once per frame. The
//! renderer propagates transforms, sorts what the camera sees, compiles and
//! caches programs, uploads uniforms and issues draw calls through a
//! [`GraphicsDriver`](renderer::GraphicsDriver).
//!
//! ```rust,ignore
//! use myth_gl::prelude::*;
//!
//! let mut assets = AssetStore::new();
//! let geometry = assets.geometries.insert(cube_geometry());
//! let material = assets.materials.insert(Material::new(VERTEX, FRAGMENT));
//!
//! let mut scene = Scene::new();
//! let cube = scene.add_mesh(Mesh::new(geometry, material));
//! let camera = scene.add_camera(Camera::new_perspective(45.0, 1.5, 0.1, 100.0));
//!
//! let mut renderer = Renderer::new(RecordingDriver::new(), RendererSettings::default());
//! renderer.render(&mut scene, camera, &mut assets);
//! ```

pub mod assets;
pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod utils;

pub use assets::{AssetStore, GeometryHandle, MaterialHandle, RenderTargetHandle, TextureHandle};
pub use errors::{MythGlError, Result};
pub use renderer::{RenderInfo, Renderer, RendererSettings};
pub use resources::{
    Attribute, Geometry, IndexData, Material, Mesh, RenderTarget, Side, Texture, UniformValue,
};
pub use scene::{Camera, Node, NodeHandle, NodeKind, Scene};
pub use utils::interner;

/// Common imports for building and rendering scenes.
pub mod prelude {
    pub use crate::assets::{
        AssetStore, GeometryHandle, MaterialHandle, RenderTargetHandle, TextureHandle,
    };
    pub use crate::renderer::driver::{GraphicsDriver, RecordingDriver};
    pub use crate::renderer::{Renderer, RendererSettings};
    pub use crate::resources::{
        Attribute, Blending, DrawMode, Geometry, IndexData, Material, Mesh, RenderTarget, Side,
        Texture, UniformEntry, UniformValue,
    };
    pub use crate::scene::{Camera, Node, NodeHandle, NodeKind, Scene};
}
