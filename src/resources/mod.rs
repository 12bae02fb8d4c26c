//! Resource Types
//!
//! Plain CPU-side data consumed by the renderer:
//! - [`Geometry`]: vertex attributes, index, groups, draw range
//! - [`Material`]: shader sources, defines, uniforms, render state
//! - [`Texture`]: RGBA8 images
//! - [`Mesh`]: the drawable component attached to scene nodes
//! - [`RenderTarget`]: offscreen framebuffer description

pub mod geometry;
pub mod material;
pub mod mesh;
pub mod render_target;
pub mod shader_defines;
pub mod texture;
pub mod uniforms;

pub use geometry::{
    Attribute, AttributeData, BoundingSphere, DrawRange, Geometry, GeometryGroup, IndexBuffer,
    IndexData,
};
pub use material::{
    BlendEquation, BlendFactor, BlendState, Blending, DepthFunc, Material, PolygonOffset, Side,
};
pub use mesh::{DrawMode, Mesh, MeshMaterial};
pub use render_target::RenderTarget;
pub use shader_defines::ShaderDefines;
pub use texture::{FilterMode, SamplerParams, Texture, WrapMode};
pub use uniforms::{UniformEntry, UniformValue};
