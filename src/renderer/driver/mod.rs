//! Graphics Driver Interface
//!
//! The renderer talks to the GPU exclusively through [`GraphicsDriver`], a
//! GL-style immediate-mode call surface. Implementations wrap a real context
//! (OpenGL ES / WebGL bindings) or, for tests and benches, the
//! [`RecordingDriver`] which records every call.
//!
//! Driver objects are plain integer ids. The renderer never assumes they
//! survive a context loss.

pub mod recording;

pub use recording::{DriverCall, RecordedUniform, RecordingDriver};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::resources::{BlendEquation, BlendFactor, DepthFunc, SamplerParams};

// ============================================================================
// Object ids
// ============================================================================

macro_rules! driver_id {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);
        )*
    };
}

driver_id! {
    ShaderId,
    ProgramId,
    BufferId,
    TextureId,
    FramebufferId,
    RenderbufferId,
}

/// Location of an active uniform inside a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

// ============================================================================
// Enumerations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    DepthTest,
    CullFace,
    ScissorTest,
    PolygonOffsetFill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    #[inline]
    #[must_use]
    pub fn bytes(self) -> u32 {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// Component type of a vertex attribute pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    F32,
    U16,
    U8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullFace {
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    Ccw,
    Cw,
}

/// Color attachment format of an offscreen target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorFormat {
    #[default]
    Rgba8,
    Rgba32F,
}

impl ColorFormat {
    #[inline]
    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Rgba32F => 16,
        }
    }
}

bitflags! {
    /// Buffers cleared by [`GraphicsDriver::clear`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u8 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Integer rectangle in drawing-buffer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Scales position and size by `factor`, rounding down.
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            x: (self.x as f32 * factor).floor() as i32,
            y: (self.y as f32 * factor).floor() as i32,
            width: (self.width as f32 * factor).floor() as u32,
            height: (self.height as f32 * factor).floor() as u32,
        }
    }
}

// ============================================================================
// Introspection
// ============================================================================

/// GL type tags reported for active uniforms and attributes.
pub mod gl_types {
    pub const FLOAT: u32 = 0x1406;
    pub const FLOAT_VEC2: u32 = 0x8B50;
    pub const FLOAT_VEC3: u32 = 0x8B51;
    pub const FLOAT_VEC4: u32 = 0x8B52;
    pub const INT: u32 = 0x1404;
    pub const INT_VEC2: u32 = 0x8B53;
    pub const INT_VEC3: u32 = 0x8B54;
    pub const INT_VEC4: u32 = 0x8B55;
    pub const BOOL: u32 = 0x8B56;
    pub const BOOL_VEC2: u32 = 0x8B57;
    pub const BOOL_VEC3: u32 = 0x8B58;
    pub const BOOL_VEC4: u32 = 0x8B59;
    pub const FLOAT_MAT2: u32 = 0x8B5A;
    pub const FLOAT_MAT3: u32 = 0x8B5B;
    pub const FLOAT_MAT4: u32 = 0x8B5C;
    pub const SAMPLER_2D: u32 = 0x8B5E;
    pub const SAMPLER_3D: u32 = 0x8B5F;
    pub const SAMPLER_CUBE: u32 = 0x8B60;
    pub const SAMPLER_2D_SHADOW: u32 = 0x8B62;
    pub const SAMPLER_2D_ARRAY: u32 = 0x8DC1;
    pub const UNSIGNED_INT: u32 = 0x1405;
    pub const INT_SAMPLER_2D: u32 = 0x8DCA;
    pub const UNSIGNED_INT_SAMPLER_2D: u32 = 0x8DD2;
}

/// Uniform type as understood by the binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    FloatVec2,
    FloatVec3,
    FloatVec4,
    Int,
    IntVec2,
    IntVec3,
    IntVec4,
    Bool,
    BoolVec2,
    BoolVec3,
    BoolVec4,
    FloatMat2,
    FloatMat3,
    FloatMat4,
    Sampler2D,
    Sampler3D,
    SamplerCube,
    Sampler2DShadow,
    Sampler2DArray,
    IntSampler2D,
    UIntSampler2D,
    /// A type tag the binder has no setter for.
    Unsupported(u32),
}

impl UniformType {
    #[must_use]
    pub fn from_gl(code: u32) -> Self {
        use gl_types as gl;
        match code {
            gl::FLOAT => Self::Float,
            gl::FLOAT_VEC2 => Self::FloatVec2,
            gl::FLOAT_VEC3 => Self::FloatVec3,
            gl::FLOAT_VEC4 => Self::FloatVec4,
            gl::INT => Self::Int,
            gl::INT_VEC2 => Self::IntVec2,
            gl::INT_VEC3 => Self::IntVec3,
            gl::INT_VEC4 => Self::IntVec4,
            gl::BOOL => Self::Bool,
            gl::BOOL_VEC2 => Self::BoolVec2,
            gl::BOOL_VEC3 => Self::BoolVec3,
            gl::BOOL_VEC4 => Self::BoolVec4,
            gl::FLOAT_MAT2 => Self::FloatMat2,
            gl::FLOAT_MAT3 => Self::FloatMat3,
            gl::FLOAT_MAT4 => Self::FloatMat4,
            gl::SAMPLER_2D => Self::Sampler2D,
            gl::SAMPLER_3D => Self::Sampler3D,
            gl::SAMPLER_CUBE => Self::SamplerCube,
            gl::SAMPLER_2D_SHADOW => Self::Sampler2DShadow,
            gl::SAMPLER_2D_ARRAY => Self::Sampler2DArray,
            gl::INT_SAMPLER_2D => Self::IntSampler2D,
            gl::UNSIGNED_INT_SAMPLER_2D => Self::UIntSampler2D,
            other => Self::Unsupported(other),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_sampler(self) -> bool {
        matches!(
            self,
            Self::Sampler2D
                | Self::Sampler3D
                | Self::SamplerCube
                | Self::Sampler2DShadow
                | Self::Sampler2DArray
                | Self::IntSampler2D
                | Self::UIntSampler2D
        )
    }
}

/// An active uniform or attribute as reported after linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveInfo {
    pub name: String,
    /// GL type tag, see [`gl_types`].
    pub gl_type: u32,
    /// Array length; 1 for non-arrays.
    pub size: i32,
}

/// Payload of a `uniform*` call. Slices are tightly packed, matrices
/// column-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformData<'a> {
    /// `uniform{1,2,3,4}fv`
    Floats { components: u8, data: &'a [f32] },
    /// `uniform{1,2,3,4}iv`
    Ints { components: u8, data: &'a [i32] },
    /// `uniformMatrix{2,3,4}fv`, never transposed
    Matrix { dim: u8, data: &'a [f32] },
}

// ============================================================================
// Driver trait
// ============================================================================

/// GL-style immediate-mode graphics driver.
///
/// Every call is synchronous from the caller's point of view except
/// [`read_pixels`](GraphicsDriver::read_pixels), which blocks until the GPU
/// has finished.
pub trait GraphicsDriver {
    // --- Shaders & programs ---
    fn create_shader(&mut self, stage: ShaderStage) -> ShaderId;
    fn shader_source(&mut self, shader: ShaderId, source: &str);
    fn compile_shader(&mut self, shader: ShaderId);
    fn shader_info_log(&mut self, shader: ShaderId) -> String;
    fn delete_shader(&mut self, shader: ShaderId);

    fn create_program(&mut self) -> ProgramId;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);
    fn bind_attrib_location(&mut self, program: ProgramId, index: u32, name: &str);
    fn link_program(&mut self, program: ProgramId);
    fn program_link_status(&mut self, program: ProgramId) -> bool;
    fn program_info_log(&mut self, program: ProgramId) -> String;
    fn use_program(&mut self, program: Option<ProgramId>);
    fn delete_program(&mut self, program: ProgramId);

    // --- Introspection ---
    fn active_uniform_count(&mut self, program: ProgramId) -> u32;
    fn active_uniform(&mut self, program: ProgramId, index: u32) -> Option<ActiveInfo>;
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn active_attribute_count(&mut self, program: ProgramId) -> u32;
    fn active_attribute(&mut self, program: ProgramId, index: u32) -> Option<ActiveInfo>;
    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<u32>;

    // --- Uniforms ---
    fn uniform(&mut self, location: UniformLocation, data: UniformData<'_>);

    // --- Buffers & vertex input ---
    fn create_buffer(&mut self) -> BufferId;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]);
    fn delete_buffer(&mut self, buffer: BufferId);

    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn disable_vertex_attrib_array(&mut self, index: u32);
    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: u32,
        component: ComponentType,
        normalized: bool,
        stride: u32,
        offset: u32,
    );
    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32);

    // --- Textures ---
    fn create_texture(&mut self) -> TextureId;
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, texture: Option<TextureId>);
    fn tex_image_2d(&mut self, width: u32, height: u32, format: ColorFormat, data: Option<&[u8]>);
    fn tex_parameters(&mut self, params: SamplerParams);
    fn delete_texture(&mut self, texture: TextureId);

    // --- Framebuffers ---
    fn create_framebuffer(&mut self) -> FramebufferId;
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);
    fn framebuffer_texture(&mut self, texture: TextureId);
    fn create_renderbuffer(&mut self) -> RenderbufferId;
    fn renderbuffer_depth_storage(&mut self, renderbuffer: RenderbufferId, width: u32, height: u32);
    fn framebuffer_depth_renderbuffer(&mut self, renderbuffer: RenderbufferId);
    fn check_framebuffer_complete(&mut self) -> bool;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId);

    // --- Fixed-function state ---
    fn viewport(&mut self, rect: Rect);
    fn scissor(&mut self, rect: Rect);
    fn enable(&mut self, capability: Capability);
    fn disable(&mut self, capability: Capability);
    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation);
    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );
    fn depth_func(&mut self, func: DepthFunc);
    fn depth_mask(&mut self, enabled: bool);
    fn color_mask(&mut self, enabled: bool);
    fn cull_face(&mut self, face: CullFace);
    fn front_face(&mut self, face: FrontFace);
    fn line_width(&mut self, width: f32);
    fn polygon_offset(&mut self, factor: f32, units: f32);

    // --- Clearing ---
    fn clear_color(&mut self, rgba: [f32; 4]);
    fn clear_depth(&mut self, depth: f32);
    fn clear_stencil(&mut self, stencil: i32);
    fn clear(&mut self, flags: ClearFlags);

    // --- Drawing ---
    fn draw_arrays(&mut self, mode: PrimitiveMode, first: u32, count: u32);
    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32, index_type: IndexType, offset: u32);
    fn draw_arrays_instanced(&mut self, mode: PrimitiveMode, first: u32, count: u32, instances: u32);
    fn draw_elements_instanced(
        &mut self,
        mode: PrimitiveMode,
        count: u32,
        index_type: IndexType,
        offset: u32,
        instances: u32,
    );

    // --- Read-back ---
    /// Reads pixels of the bound framebuffer into `out` (blocking).
    fn read_pixels(&mut self, rect: Rect, out: &mut [u8]);
}
