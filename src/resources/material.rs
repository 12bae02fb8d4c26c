//! Materials
//!
//! A [`Material`] pairs GLSL vertex/fragment sources and preprocessor defines
//! with a flat uniform table and the fixed-function state (culling, blending,
//! depth) the renderer applies before drawing with it.
//!
//! The renderer compiles one program per distinct `(defines, sources)`
//! combination. Changing sources or defines on a material that was already
//! drawn requires setting [`Material::needs_update`]; the renderer clears the
//! flag once the program has been rebuilt.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::resources::shader_defines::ShaderDefines;
use crate::resources::uniforms::{UniformEntry, UniformValue};

// ============================================================================
// Fixed-function state
// ============================================================================

/// Which faces are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendEquation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    DstColor,
    OneMinusDstColor,
    SrcAlphaSaturate,
}

/// Fully resolved blend configuration, as handed to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlendState {
    pub equation: BlendEquation,
    pub equation_alpha: BlendEquation,
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendState {
    #[must_use]
    pub const fn new(equation: BlendEquation, src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            equation,
            equation_alpha: equation,
            src,
            dst,
            src_alpha: src,
            dst_alpha: dst,
        }
    }
}

/// Blending presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Blending {
    NoBlending,
    #[default]
    Normal,
    Additive,
    Subtractive,
    Multiply,
    Custom(BlendState),
}

impl Blending {
    /// Resolves the preset into a driver blend state; `None` disables blending.
    #[must_use]
    pub fn resolve(self, premultiplied_alpha: bool) -> Option<BlendState> {
        use BlendEquation::Add;
        use BlendFactor::{One, OneMinusSrcAlpha, OneMinusSrcColor, SrcAlpha, SrcColor, Zero};

        let separate = |src, dst, src_alpha, dst_alpha| BlendState {
            equation: Add,
            equation_alpha: Add,
            src,
            dst,
            src_alpha,
            dst_alpha,
        };

        let state = match (self, premultiplied_alpha) {
            (Self::NoBlending, _) => return None,
            (Self::Custom(state), _) => state,

            (Self::Normal, true) => separate(One, OneMinusSrcAlpha, One, OneMinusSrcAlpha),
            (Self::Additive, true) => BlendState::new(Add, One, One),
            (Self::Subtractive, true) => separate(Zero, Zero, OneMinusSrcColor, OneMinusSrcAlpha),
            (Self::Multiply, true) => separate(Zero, SrcColor, Zero, SrcAlpha),

            (Self::Normal, false) => separate(SrcAlpha, OneMinusSrcAlpha, One, OneMinusSrcAlpha),
            (Self::Additive, false) => BlendState::new(Add, SrcAlpha, One),
            (Self::Subtractive, false) => BlendState::new(Add, Zero, OneMinusSrcColor),
            (Self::Multiply, false) => BlendState::new(Add, Zero, SrcColor),
        };

        Some(state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DepthFunc {
    Never,
    Always,
    Less,
    #[default]
    LessEqual,
    Equal,
    GreaterEqual,
    Greater,
    NotEqual,
}

/// Polygon offset applied while drawing, in driver units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PolygonOffset {
    pub factor: f32,
    pub units: f32,
}

// ============================================================================
// Material
// ============================================================================

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,

    // === Program inputs ===
    pub vertex_shader: String,
    pub fragment_shader: String,
    pub defines: ShaderDefines,
    /// Attribute forced to location 0 before linking.
    pub index0_attribute_name: Option<String>,
    /// Set after changing sources or defines; cleared by the renderer.
    pub needs_update: bool,

    uniforms: FxHashMap<String, UniformEntry>,
    uniforms_version: u64,

    // === Render state ===
    pub visible: bool,
    pub transparent: bool,
    pub side: Side,
    pub blending: Blending,
    pub premultiplied_alpha: bool,
    pub depth_func: DepthFunc,
    pub depth_test: bool,
    pub depth_write: bool,
    pub color_write: bool,
    pub polygon_offset: Option<PolygonOffset>,

    pub wireframe: bool,
    pub wireframe_linewidth: f32,
    pub linewidth: f32,
}

impl Material {
    #[must_use]
    pub fn new(vertex_shader: impl Into<String>, fragment_shader: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            defines: ShaderDefines::new(),
            index0_attribute_name: None,
            needs_update: false,

            uniforms: FxHashMap::default(),
            uniforms_version: 0,

            visible: true,
            transparent: false,
            side: Side::Front,
            blending: Blending::Normal,
            premultiplied_alpha: false,
            depth_func: DepthFunc::LessEqual,
            depth_test: true,
            depth_write: true,
            color_write: true,
            polygon_offset: None,

            wireframe: false,
            wireframe_linewidth: 1.0,
            linewidth: 1.0,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    #[must_use]
    pub fn with_define(mut self, key: &str, value: &str) -> Self {
        self.defines.set(key, value);
        self
    }

    #[must_use]
    pub fn with_uniform(mut self, name: &str, value: impl Into<UniformValue>) -> Self {
        self.set_uniform(name, value);
        self
    }

    // ========================================================================
    // Uniform table
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn uniforms(&self) -> &FxHashMap<String, UniformEntry> {
        &self.uniforms
    }

    /// Bumped whenever an entry is added or removed (not on value changes).
    #[inline]
    #[must_use]
    pub fn uniforms_version(&self) -> u64 {
        self.uniforms_version
    }

    /// Sets a uniform value, creating the entry if needed. The entry's
    /// `needs_update` flag is left untouched.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
        let value = value.into();
        if let Some(entry) = self.uniforms.get_mut(name) {
            entry.value = value;
        } else {
            self.uniforms.insert(name.to_owned(), UniformEntry::new(value));
            self.uniforms_version += 1;
        }
    }

    /// Inserts or replaces a whole entry.
    pub fn insert_uniform(&mut self, name: &str, entry: UniformEntry) {
        if self.uniforms.insert(name.to_owned(), entry).is_none() {
            self.uniforms_version += 1;
        }
    }

    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<&UniformEntry> {
        self.uniforms.get(name)
    }

    pub fn uniform_mut(&mut self, name: &str) -> Option<&mut UniformEntry> {
        self.uniforms.get_mut(name)
    }

    pub fn remove_uniform(&mut self, name: &str) -> Option<UniformEntry> {
        let removed = self.uniforms.remove(name);
        if removed.is_some() {
            self.uniforms_version += 1;
        }
        removed
    }
}
