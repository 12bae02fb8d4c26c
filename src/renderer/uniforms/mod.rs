//! Uniform Binder
//!
//! Resolves material uniform values against the uniforms a linked program
//! actually exposes:
//!
//! - [`path`]: decomposes driver-reported names (`lights[1].color`)
//! - [`tree`]: the per-program uniform tree and its upload routines

pub mod path;
pub mod tree;

pub use path::{LeafKind, UniformId, UniformPath, parse_uniform_path};
pub use tree::{
    ProgramUniforms, PureArrayUniform, SamplerBinding, SingleUniform, StructuredUniform,
    UniformContainer, UniformNode, UniformScratch, UploadContext,
};
