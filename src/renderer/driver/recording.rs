//! Recording Driver
//!
//! A headless [`GraphicsDriver`] that records every state-changing call as an
//! owned [`DriverCall`] and simulates just enough of a GL implementation for
//! the renderer to run end to end:
//!
//! - shader compilation fails when the source contains an `#error` directive
//! - linking requires one compiled vertex and one compiled fragment stage
//! - introspection scans the GLSL for `uniform`, `attribute` / `in`
//!   declarations and `struct` definitions, and reports active uniforms the
//!   way GL does (`lights[1].color`, `weights[0]` with size N, ...)
//!
//! Query calls (`*_info_log`, `active_*`, `*_location`, status checks) are not
//! recorded.
//!
//! Object names are never reused unless [`RecordingDriver::reuse_names`] is
//! set; then a deleted name is handed out again by the next `create_*` of the
//! same kind, lowest first, as GL implementations commonly do.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use super::{
    ActiveInfo, BufferId, BufferTarget, Capability, ClearFlags, ColorFormat, ComponentType,
    CullFace, FramebufferId, FrontFace, GraphicsDriver, IndexType, PrimitiveMode, ProgramId, Rect,
    RenderbufferId, ShaderId, ShaderStage, TextureId, UniformData, UniformLocation, gl_types,
};
use crate::resources::{BlendEquation, BlendFactor, DepthFunc, SamplerParams};

/// Owned copy of a uniform payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedUniform {
    Floats { components: u8, data: Vec<f32> },
    Ints { components: u8, data: Vec<i32> },
    Matrix { dim: u8, data: Vec<f32> },
}

impl From<UniformData<'_>> for RecordedUniform {
    fn from(data: UniformData<'_>) -> Self {
        match data {
            UniformData::Floats { components, data } => Self::Floats {
                components,
                data: data.to_vec(),
            },
            UniformData::Ints { components, data } => Self::Ints {
                components,
                data: data.to_vec(),
            },
            UniformData::Matrix { dim, data } => Self::Matrix {
                dim,
                data: data.to_vec(),
            },
        }
    }
}

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    CreateShader { shader: ShaderId, stage: ShaderStage },
    ShaderSource { shader: ShaderId },
    CompileShader(ShaderId),
    DeleteShader(ShaderId),
    CreateProgram(ProgramId),
    AttachShader { program: ProgramId, shader: ShaderId },
    BindAttribLocation { program: ProgramId, index: u32, name: String },
    LinkProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    DeleteProgram(ProgramId),

    Uniform { location: UniformLocation, name: String, value: RecordedUniform },

    CreateBuffer(BufferId),
    BindBuffer { target: BufferTarget, buffer: Option<BufferId> },
    BufferData { target: BufferTarget, len: usize },
    DeleteBuffer(BufferId),
    EnableVertexAttribArray(u32),
    DisableVertexAttribArray(u32),
    VertexAttribPointer {
        index: u32,
        size: u32,
        component: ComponentType,
        normalized: bool,
        stride: u32,
        offset: u32,
    },
    VertexAttribDivisor { index: u32, divisor: u32 },

    CreateTexture(TextureId),
    ActiveTexture(u32),
    BindTexture(Option<TextureId>),
    TexImage2D { width: u32, height: u32, format: ColorFormat, has_data: bool },
    TexParameters(SamplerParams),
    DeleteTexture(TextureId),

    CreateFramebuffer(FramebufferId),
    BindFramebuffer(Option<FramebufferId>),
    FramebufferTexture(TextureId),
    CreateRenderbuffer(RenderbufferId),
    RenderbufferDepthStorage { renderbuffer: RenderbufferId, width: u32, height: u32 },
    FramebufferDepthRenderbuffer(RenderbufferId),
    DeleteFramebuffer(FramebufferId),
    DeleteRenderbuffer(RenderbufferId),

    Viewport(Rect),
    Scissor(Rect),
    Enable(Capability),
    Disable(Capability),
    BlendEquationSeparate { rgb: BlendEquation, alpha: BlendEquation },
    BlendFuncSeparate {
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    },
    DepthFunc(DepthFunc),
    DepthMask(bool),
    ColorMask(bool),
    CullFace(CullFace),
    FrontFace(FrontFace),
    LineWidth(f32),
    PolygonOffset { factor: f32, units: f32 },

    ClearColor([f32; 4]),
    ClearDepth(f32),
    ClearStencil(i32),
    Clear(ClearFlags),

    DrawArrays { mode: PrimitiveMode, first: u32, count: u32, instances: Option<u32> },
    DrawElements {
        mode: PrimitiveMode,
        count: u32,
        index_type: IndexType,
        offset: u32,
        instances: Option<u32>,
    },

    ReadPixels(Rect),
}

impl DriverCall {
    #[inline]
    #[must_use]
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::DrawArrays { .. } | Self::DrawElements { .. })
    }
}

// ============================================================================
// Simulated objects
// ============================================================================

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramObject {
    shaders: Vec<ShaderId>,
    bound_attributes: Vec<(u32, String)>,
    linked: bool,
    log: String,
    uniforms: Vec<ActiveInfo>,
    uniform_locations: FxHashMap<String, i32>,
    attributes: Vec<ActiveInfo>,
    attribute_locations: FxHashMap<String, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NameKind {
    Shader,
    Program,
    Buffer,
    Texture,
    Framebuffer,
    Renderbuffer,
}

/// Headless driver that records calls; see the module docs.
#[derive(Debug)]
pub struct RecordingDriver {
    calls: Vec<DriverCall>,
    next_id: u32,
    next_location: i32,
    freed: FxHashMap<NameKind, BTreeSet<u32>>,

    shaders: FxHashMap<u32, ShaderObject>,
    programs: FxHashMap<u32, ProgramObject>,
    location_names: FxHashMap<i32, String>,

    live_buffers: usize,
    live_textures: usize,
    live_framebuffers: usize,

    /// Result of `check_framebuffer_complete`.
    pub framebuffer_complete: bool,
    /// Appended to the program log of the next successful link.
    pub link_warning: Option<String>,
    /// Byte written by `read_pixels`.
    pub read_fill: u8,
    /// Hand deleted object names out again.
    pub reuse_names: bool,
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDriver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            next_id: 1,
            next_location: 0,
            freed: FxHashMap::default(),
            shaders: FxHashMap::default(),
            programs: FxHashMap::default(),
            location_names: FxHashMap::default(),
            live_buffers: 0,
            live_textures: 0,
            live_framebuffers: 0,
            framebuffer_complete: true,
            link_warning: None,
            read_fill: 0xff,
            reuse_names: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn calls(&self) -> &[DriverCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<DriverCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Recorded draw calls, in order.
    pub fn draw_calls(&self) -> impl Iterator<Item = &DriverCall> {
        self.calls.iter().filter(|c| c.is_draw())
    }

    #[must_use]
    pub fn count(&self, predicate: impl Fn(&DriverCall) -> bool) -> usize {
        self.calls.iter().filter(|c| predicate(c)).count()
    }

    /// Values uploaded to uniforms with the given active name, in order.
    #[must_use]
    pub fn uniform_uploads(&self, name: &str) -> Vec<&RecordedUniform> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DriverCall::Uniform {
                    name: n, value, ..
                } if n == name => Some(value),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.live_buffers
    }

    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.live_textures
    }

    #[must_use]
    pub fn live_framebuffers(&self) -> usize {
        self.live_framebuffers
    }

    fn alloc_id(&mut self, kind: NameKind) -> u32 {
        if self.reuse_names
            && let Some(id) = self.freed.get_mut(&kind).and_then(BTreeSet::pop_first)
        {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn free_id(&mut self, kind: NameKind, id: u32) {
        if self.reuse_names {
            self.freed.entry(kind).or_default().insert(id);
        }
    }

    fn link(&mut self, program: ProgramId) {
        let Some(object) = self.programs.get(&program.0) else {
            return;
        };

        let mut vertex: Option<&ShaderObject> = None;
        let mut fragment: Option<&ShaderObject> = None;
        for id in &object.shaders {
            if let Some(shader) = self.shaders.get(&id.0) {
                match shader.stage {
                    ShaderStage::Vertex => vertex = Some(shader),
                    ShaderStage::Fragment => fragment = Some(shader),
                }
            }
        }

        let (vertex, fragment) = match (vertex, fragment) {
            (Some(v), Some(f)) if v.compiled && f.compiled => (v, f),
            (Some(v), Some(_)) => {
                let failed = if v.compiled { "fragment" } else { "vertex" };
                let log = format!("ERROR: {failed} shader did not compile");
                self.fail_link(program, log);
                return;
            }
            _ => {
                self.fail_link(program, "ERROR: missing shader stage".to_owned());
                return;
            }
        };

        let vs = glsl::scan(&vertex.source, ShaderStage::Vertex);
        let fs = glsl::scan(&fragment.source, ShaderStage::Fragment);

        let mut uniforms: Vec<ActiveInfo> = Vec::new();
        for info in vs.uniforms.into_iter().chain(fs.uniforms) {
            if !uniforms.iter().any(|u| u.name == info.name) {
                uniforms.push(info);
            }
        }

        let mut uniform_locations = FxHashMap::default();
        for info in &uniforms {
            let location = self.next_location;
            self.next_location += 1;
            uniform_locations.insert(info.name.clone(), location);
            if let Some(base) = info.name.strip_suffix("[0]") {
                uniform_locations.insert(base.to_owned(), location);
            }
            self.location_names.insert(location, info.name.clone());
        }

        let bound = self
            .programs
            .get(&program.0)
            .map(|p| p.bound_attributes.clone())
            .unwrap_or_default();
        let mut attribute_locations: FxHashMap<String, u32> = FxHashMap::default();
        let mut used: Vec<u32> = Vec::new();
        for (index, name) in &bound {
            if vs.attributes.iter().any(|a| &a.name == name) {
                attribute_locations.insert(name.clone(), *index);
                used.push(*index);
            }
        }
        let mut next = 0u32;
        for attribute in &vs.attributes {
            if attribute_locations.contains_key(&attribute.name) {
                continue;
            }
            let slots = glsl::attribute_slots(attribute.gl_type);
            while (next..next + slots).any(|s| used.contains(&s)) {
                next += 1;
            }
            attribute_locations.insert(attribute.name.clone(), next);
            used.extend(next..next + slots);
            next += slots;
        }

        let log = self.link_warning.take().unwrap_or_default();
        if let Some(object) = self.programs.get_mut(&program.0) {
            object.linked = true;
            object.log = log;
            object.uniforms = uniforms;
            object.uniform_locations = uniform_locations;
            object.attributes = vs.attributes;
            object.attribute_locations = attribute_locations;
        }
    }

    fn fail_link(&mut self, program: ProgramId, log: String) {
        if let Some(object) = self.programs.get_mut(&program.0) {
            object.linked = false;
            object.log = log;
            object.uniforms.clear();
            object.attributes.clear();
        }
    }
}

impl GraphicsDriver for RecordingDriver {
    fn create_shader(&mut self, stage: ShaderStage) -> ShaderId {
        let shader = ShaderId(self.alloc_id(NameKind::Shader));
        self.shaders.insert(
            shader.0,
            ShaderObject {
                stage,
                source: String::new(),
                compiled: false,
                log: String::new(),
            },
        );
        self.calls.push(DriverCall::CreateShader { shader, stage });
        shader
    }

    fn shader_source(&mut self, shader: ShaderId, source: &str) {
        if let Some(object) = self.shaders.get_mut(&shader.0) {
            source.clone_into(&mut object.source);
        }
        self.calls.push(DriverCall::ShaderSource { shader });
    }

    fn compile_shader(&mut self, shader: ShaderId) {
        if let Some(object) = self.shaders.get_mut(&shader.0) {
            match glsl::find_error_directive(&object.source) {
                Some((line, message)) => {
                    object.compiled = false;
                    object.log = format!("ERROR: 0:{line}: '#error' : {message}");
                }
                None => {
                    object.compiled = true;
                    object.log.clear();
                }
            }
        }
        self.calls.push(DriverCall::CompileShader(shader));
    }

    fn shader_info_log(&mut self, shader: ShaderId) -> String {
        self.shaders
            .get(&shader.0)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        // Attached shaders stay readable until the program goes away.
        self.calls.push(DriverCall::DeleteShader(shader));
    }

    fn create_program(&mut self) -> ProgramId {
        let program = ProgramId(self.alloc_id(NameKind::Program));
        self.programs.insert(program.0, ProgramObject::default());
        self.calls.push(DriverCall::CreateProgram(program));
        program
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if let Some(object) = self.programs.get_mut(&program.0) {
            object.shaders.push(shader);
        }
        self.calls.push(DriverCall::AttachShader { program, shader });
    }

    fn bind_attrib_location(&mut self, program: ProgramId, index: u32, name: &str) {
        if let Some(object) = self.programs.get_mut(&program.0) {
            object.bound_attributes.push((index, name.to_owned()));
        }
        self.calls.push(DriverCall::BindAttribLocation {
            program,
            index,
            name: name.to_owned(),
        });
    }

    fn link_program(&mut self, program: ProgramId) {
        self.link(program);
        self.calls.push(DriverCall::LinkProgram(program));
    }

    fn program_link_status(&mut self, program: ProgramId) -> bool {
        self.programs.get(&program.0).is_some_and(|p| p.linked)
    }

    fn program_info_log(&mut self, program: ProgramId) -> String {
        self.programs
            .get(&program.0)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.calls.push(DriverCall::UseProgram(program));
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(object) = self.programs.remove(&program.0) {
            for shader in object.shaders {
                self.shaders.remove(&shader.0);
                self.free_id(NameKind::Shader, shader.0);
            }
            self.free_id(NameKind::Program, program.0);
        }
        self.calls.push(DriverCall::DeleteProgram(program));
    }

    fn active_uniform_count(&mut self, program: ProgramId) -> u32 {
        self.programs
            .get(&program.0)
            .map_or(0, |p| p.uniforms.len() as u32)
    }

    fn active_uniform(&mut self, program: ProgramId, index: u32) -> Option<ActiveInfo> {
        self.programs
            .get(&program.0)?
            .uniforms
            .get(index as usize)
            .cloned()
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs
            .get(&program.0)?
            .uniform_locations
            .get(name)
            .map(|&l| UniformLocation(l))
    }

    fn active_attribute_count(&mut self, program: ProgramId) -> u32 {
        self.programs
            .get(&program.0)
            .map_or(0, |p| p.attributes.len() as u32)
    }

    fn active_attribute(&mut self, program: ProgramId, index: u32) -> Option<ActiveInfo> {
        self.programs
            .get(&program.0)?
            .attributes
            .get(index as usize)
            .cloned()
    }

    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs
            .get(&program.0)?
            .attribute_locations
            .get(name)
            .copied()
    }

    fn uniform(&mut self, location: UniformLocation, data: UniformData<'_>) {
        let name = self
            .location_names
            .get(&location.0)
            .cloned()
            .unwrap_or_default();
        self.calls.push(DriverCall::Uniform {
            location,
            name,
            value: data.into(),
        });
    }

    fn create_buffer(&mut self) -> BufferId {
        let buffer = BufferId(self.alloc_id(NameKind::Buffer));
        self.live_buffers += 1;
        self.calls.push(DriverCall::CreateBuffer(buffer));
        buffer
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        self.calls.push(DriverCall::BindBuffer { target, buffer });
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) {
        self.calls.push(DriverCall::BufferData {
            target,
            len: data.len(),
        });
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.live_buffers = self.live_buffers.saturating_sub(1);
        self.free_id(NameKind::Buffer, buffer.0);
        self.calls.push(DriverCall::DeleteBuffer(buffer));
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.calls.push(DriverCall::EnableVertexAttribArray(index));
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.calls.push(DriverCall::DisableVertexAttribArray(index));
    }

    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: u32,
        component: ComponentType,
        normalized: bool,
        stride: u32,
        offset: u32,
    ) {
        self.calls.push(DriverCall::VertexAttribPointer {
            index,
            size,
            component,
            normalized,
            stride,
            offset,
        });
    }

    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32) {
        self.calls
            .push(DriverCall::VertexAttribDivisor { index, divisor });
    }

    fn create_texture(&mut self) -> TextureId {
        let texture = TextureId(self.alloc_id(NameKind::Texture));
        self.live_textures += 1;
        self.calls.push(DriverCall::CreateTexture(texture));
        texture
    }

    fn active_texture(&mut self, unit: u32) {
        self.calls.push(DriverCall::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.calls.push(DriverCall::BindTexture(texture));
    }

    fn tex_image_2d(&mut self, width: u32, height: u32, format: ColorFormat, data: Option<&[u8]>) {
        self.calls.push(DriverCall::TexImage2D {
            width,
            height,
            format,
            has_data: data.is_some(),
        });
    }

    fn tex_parameters(&mut self, params: SamplerParams) {
        self.calls.push(DriverCall::TexParameters(params));
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.live_textures = self.live_textures.saturating_sub(1);
        self.free_id(NameKind::Texture, texture.0);
        self.calls.push(DriverCall::DeleteTexture(texture));
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        let framebuffer = FramebufferId(self.alloc_id(NameKind::Framebuffer));
        self.live_framebuffers += 1;
        self.calls.push(DriverCall::CreateFramebuffer(framebuffer));
        framebuffer
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.calls.push(DriverCall::BindFramebuffer(framebuffer));
    }

    fn framebuffer_texture(&mut self, texture: TextureId) {
        self.calls.push(DriverCall::FramebufferTexture(texture));
    }

    fn create_renderbuffer(&mut self) -> RenderbufferId {
        let renderbuffer = RenderbufferId(self.alloc_id(NameKind::Renderbuffer));
        self.calls.push(DriverCall::CreateRenderbuffer(renderbuffer));
        renderbuffer
    }

    fn renderbuffer_depth_storage(&mut self, renderbuffer: RenderbufferId, width: u32, height: u32) {
        self.calls.push(DriverCall::RenderbufferDepthStorage {
            renderbuffer,
            width,
            height,
        });
    }

    fn framebuffer_depth_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        self.calls
            .push(DriverCall::FramebufferDepthRenderbuffer(renderbuffer));
    }

    fn check_framebuffer_complete(&mut self) -> bool {
        self.framebuffer_complete
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.live_framebuffers = self.live_framebuffers.saturating_sub(1);
        self.free_id(NameKind::Framebuffer, framebuffer.0);
        self.calls.push(DriverCall::DeleteFramebuffer(framebuffer));
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        self.free_id(NameKind::Renderbuffer, renderbuffer.0);
        self.calls.push(DriverCall::DeleteRenderbuffer(renderbuffer));
    }

    fn viewport(&mut self, rect: Rect) {
        self.calls.push(DriverCall::Viewport(rect));
    }

    fn scissor(&mut self, rect: Rect) {
        self.calls.push(DriverCall::Scissor(rect));
    }

    fn enable(&mut self, capability: Capability) {
        self.calls.push(DriverCall::Enable(capability));
    }

    fn disable(&mut self, capability: Capability) {
        self.calls.push(DriverCall::Disable(capability));
    }

    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation) {
        self.calls
            .push(DriverCall::BlendEquationSeparate { rgb, alpha });
    }

    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.calls.push(DriverCall::BlendFuncSeparate {
            src_rgb,
            dst_rgb,
            src_alpha,
            dst_alpha,
        });
    }

    fn depth_func(&mut self, func: DepthFunc) {
        self.calls.push(DriverCall::DepthFunc(func));
    }

    fn depth_mask(&mut self, enabled: bool) {
        self.calls.push(DriverCall::DepthMask(enabled));
    }

    fn color_mask(&mut self, enabled: bool) {
        self.calls.push(DriverCall::ColorMask(enabled));
    }

    fn cull_face(&mut self, face: CullFace) {
        self.calls.push(DriverCall::CullFace(face));
    }

    fn front_face(&mut self, face: FrontFace) {
        self.calls.push(DriverCall::FrontFace(face));
    }

    fn line_width(&mut self, width: f32) {
        self.calls.push(DriverCall::LineWidth(width));
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.calls
            .push(DriverCall::PolygonOffset { factor, units });
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.calls.push(DriverCall::ClearColor(rgba));
    }

    fn clear_depth(&mut self, depth: f32) {
        self.calls.push(DriverCall::ClearDepth(depth));
    }

    fn clear_stencil(&mut self, stencil: i32) {
        self.calls.push(DriverCall::ClearStencil(stencil));
    }

    fn clear(&mut self, flags: ClearFlags) {
        self.calls.push(DriverCall::Clear(flags));
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: u32, count: u32) {
        self.calls.push(DriverCall::DrawArrays {
            mode,
            first,
            count,
            instances: None,
        });
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32, index_type: IndexType, offset: u32) {
        self.calls.push(DriverCall::DrawElements {
            mode,
            count,
            index_type,
            offset,
            instances: None,
        });
    }

    fn draw_arrays_instanced(&mut self, mode: PrimitiveMode, first: u32, count: u32, instances: u32) {
        self.calls.push(DriverCall::DrawArrays {
            mode,
            first,
            count,
            instances: Some(instances),
        });
    }

    fn draw_elements_instanced(
        &mut self,
        mode: PrimitiveMode,
        count: u32,
        index_type: IndexType,
        offset: u32,
        instances: u32,
    ) {
        self.calls.push(DriverCall::DrawElements {
            mode,
            count,
            index_type,
            offset,
            instances: Some(instances),
        });
    }

    fn read_pixels(&mut self, rect: Rect, out: &mut [u8]) {
        out.fill(self.read_fill);
        self.calls.push(DriverCall::ReadPixels(rect));
    }
}

// ============================================================================
// GLSL declaration scanning
// ============================================================================

mod glsl {
    use rustc_hash::FxHashMap;

    use super::{ActiveInfo, ShaderStage, gl_types};

    pub(super) struct Declarations {
        pub uniforms: Vec<ActiveInfo>,
        pub attributes: Vec<ActiveInfo>,
    }

    struct Declarator {
        ty: String,
        name: String,
        array: Option<u32>,
    }

    /// Finds the first `#error` directive, returning its 1-based line and text.
    pub(super) fn find_error_directive(source: &str) -> Option<(usize, String)> {
        source.lines().enumerate().find_map(|(i, line)| {
            line.trim_start()
                .strip_prefix("#error")
                .map(|rest| (i + 1, rest.trim().to_owned()))
        })
    }

    pub(super) fn type_code(ty: &str) -> Option<u32> {
        use gl_types as gl;
        Some(match ty {
            "float" => gl::FLOAT,
            "vec2" => gl::FLOAT_VEC2,
            "vec3" => gl::FLOAT_VEC3,
            "vec4" => gl::FLOAT_VEC4,
            "int" => gl::INT,
            "ivec2" => gl::INT_VEC2,
            "ivec3" => gl::INT_VEC3,
            "ivec4" => gl::INT_VEC4,
            "uint" => gl::UNSIGNED_INT,
            "bool" => gl::BOOL,
            "bvec2" => gl::BOOL_VEC2,
            "bvec3" => gl::BOOL_VEC3,
            "bvec4" => gl::BOOL_VEC4,
            "mat2" => gl::FLOAT_MAT2,
            "mat3" => gl::FLOAT_MAT3,
            "mat4" => gl::FLOAT_MAT4,
            "sampler2D" => gl::SAMPLER_2D,
            "sampler3D" => gl::SAMPLER_3D,
            "samplerCube" => gl::SAMPLER_CUBE,
            "sampler2DShadow" => gl::SAMPLER_2D_SHADOW,
            "sampler2DArray" => gl::SAMPLER_2D_ARRAY,
            "isampler2D" => gl::INT_SAMPLER_2D,
            "usampler2D" => gl::UNSIGNED_INT_SAMPLER_2D,
            _ => return None,
        })
    }

    /// Vertex attribute slots taken by a type (matrices span one per column).
    pub(super) fn attribute_slots(code: u32) -> u32 {
        match code {
            gl_types::FLOAT_MAT2 => 2,
            gl_types::FLOAT_MAT3 => 3,
            gl_types::FLOAT_MAT4 => 4,
            _ => 1,
        }
    }

    fn is_qualifier(token: &str) -> bool {
        matches!(
            token,
            "lowp" | "mediump" | "highp" | "flat" | "smooth" | "const" | "invariant"
        )
    }

    /// Strips comments, collects `#define`s and drops preprocessor lines.
    fn preprocess(source: &str) -> (String, FxHashMap<String, String>) {
        let mut defines = FxHashMap::default();
        let mut out = String::with_capacity(source.len());
        let mut in_block = false;

        for line in source.lines() {
            let mut code = String::new();
            let mut rest = line;
            loop {
                if in_block {
                    match rest.find("*/") {
                        Some(end) => {
                            rest = &rest[end + 2..];
                            in_block = false;
                        }
                        None => break,
                    }
                } else {
                    let line_comment = rest.find("//");
                    let block_comment = rest.find("/*");
                    match (line_comment, block_comment) {
                        (Some(l), Some(b)) if l < b => {
                            code.push_str(&rest[..l]);
                            break;
                        }
                        (Some(l), None) => {
                            code.push_str(&rest[..l]);
                            break;
                        }
                        (_, Some(b)) => {
                            code.push_str(&rest[..b]);
                            rest = &rest[b + 2..];
                            in_block = true;
                        }
                        (None, None) => {
                            code.push_str(rest);
                            break;
                        }
                    }
                }
            }

            let trimmed = code.trim_start();
            if let Some(directive) = trimmed.strip_prefix('#') {
                let mut parts = directive.split_whitespace();
                if parts.next() == Some("define")
                    && let Some(name) = parts.next()
                {
                    let value = parts.collect::<Vec<_>>().join(" ");
                    defines.insert(name.to_owned(), value);
                }
                continue;
            }
            out.push_str(&code);
            out.push('\n');
        }

        (out, defines)
    }

    fn tokenize(source: &str) -> Vec<&str> {
        let mut tokens = Vec::new();
        let bytes = source.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.')
                {
                    i += 1;
                }
                tokens.push(&source[start..i]);
            } else if c.is_ascii_whitespace() {
                i += 1;
            } else {
                tokens.push(&source[i..=i]);
                i += 1;
            }
        }
        tokens
    }

    fn resolve_size(token: &str, defines: &FxHashMap<String, String>) -> Option<u32> {
        let mut current = token.to_owned();
        for _ in 0..8 {
            if let Ok(n) = current.parse::<u32>() {
                return Some(n);
            }
            current = defines.get(&current)?.trim().to_owned();
        }
        None
    }

    /// Parses `TYPE name [N] (, name [N])* ;` starting at `tokens[*i]`.
    fn parse_declarators(
        tokens: &[&str],
        i: &mut usize,
        defines: &FxHashMap<String, String>,
    ) -> Vec<Declarator> {
        while *i < tokens.len() && is_qualifier(tokens[*i]) {
            *i += 1;
        }
        let Some(&ty) = tokens.get(*i) else {
            return Vec::new();
        };
        *i += 1;

        let mut out = Vec::new();
        while *i < tokens.len() {
            let name = tokens[*i];
            *i += 1;
            let mut array = None;
            if tokens.get(*i) == Some(&"[") {
                array = tokens.get(*i + 1).and_then(|t| resolve_size(t, defines));
                while *i < tokens.len() && tokens[*i] != "]" {
                    *i += 1;
                }
                *i += 1;
            }
            out.push(Declarator {
                ty: ty.to_owned(),
                name: name.to_owned(),
                array,
            });
            match tokens.get(*i) {
                Some(&",") => *i += 1,
                _ => break,
            }
        }
        while *i < tokens.len() && tokens[*i] != ";" {
            *i += 1;
        }
        out
    }

    fn expand(
        prefix: &str,
        ty: &str,
        array: Option<u32>,
        structs: &FxHashMap<String, Vec<Declarator>>,
        out: &mut Vec<ActiveInfo>,
    ) {
        if let Some(members) = structs.get(ty) {
            let mut element = |base: String| {
                for member in members {
                    let path = format!("{base}.{}", member.name);
                    expand(&path, &member.ty, member.array, structs, out);
                }
            };
            match array {
                Some(n) => (0..n).for_each(|i| element(format!("{prefix}[{i}]"))),
                None => element(prefix.to_owned()),
            }
            return;
        }

        let Some(gl_type) = type_code(ty) else {
            return;
        };
        match array {
            Some(n) => out.push(ActiveInfo {
                name: format!("{prefix}[0]"),
                gl_type,
                size: n as i32,
            }),
            None => out.push(ActiveInfo {
                name: prefix.to_owned(),
                gl_type,
                size: 1,
            }),
        }
    }

    pub(super) fn scan(source: &str, stage: ShaderStage) -> Declarations {
        let (code, defines) = preprocess(source);
        let tokens = tokenize(&code);

        let mut structs: FxHashMap<String, Vec<Declarator>> = FxHashMap::default();
        let mut uniforms = Vec::new();
        let mut attributes = Vec::new();
        let mut depth = 0usize;
        let mut parens = 0usize;
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i];
            match token {
                "{" => depth += 1,
                "}" => depth = depth.saturating_sub(1),
                "(" => parens += 1,
                ")" => parens = parens.saturating_sub(1),
                "struct" if depth == 0 => {
                    let name = tokens.get(i + 1).copied().unwrap_or_default().to_owned();
                    i += 2;
                    if tokens.get(i) == Some(&"{") {
                        i += 1;
                        let mut members = Vec::new();
                        while i < tokens.len() && tokens[i] != "}" {
                            members.extend(parse_declarators(&tokens, &mut i, &defines));
                            i += 1;
                        }
                        structs.insert(name, members);
                    }
                }
                "layout" if depth == 0 => {
                    while i < tokens.len() && tokens[i] != ")" {
                        i += 1;
                    }
                }
                "uniform" if depth == 0 => {
                    i += 1;
                    // Interface blocks are not individual uniforms.
                    if tokens.get(i + 1) == Some(&"{") {
                        continue;
                    }
                    for d in parse_declarators(&tokens, &mut i, &defines) {
                        expand(&d.name, &d.ty, d.array, &structs, &mut uniforms);
                    }
                }
                "attribute" | "in" if depth == 0 && parens == 0 && stage == ShaderStage::Vertex => {
                    i += 1;
                    for d in parse_declarators(&tokens, &mut i, &defines) {
                        if let Some(gl_type) = type_code(&d.ty) {
                            attributes.push(ActiveInfo {
                                name: d.name,
                                gl_type,
                                size: d.array.map_or(1, |n| n as i32),
                            });
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }

        Declarations {
            uniforms,
            attributes,
        }
    }

}
