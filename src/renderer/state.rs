//! Driver State Cache
//!
//! Remembers the last fixed-function state handed to the driver and drops
//! calls that would not change anything. Every setter returns whether a
//! driver call was issued.
//!
//! The cache does not own the driver; callers pass it in. After a context
//! loss, or whenever something outside the renderer may have touched the
//! context, call [`StateCache::reset`] so every next setter issues its call.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::renderer::driver::{
    BufferId, BufferTarget, Capability, CullFace, FramebufferId, FrontFace, GraphicsDriver,
    ProgramId, Rect, TextureId,
};
use crate::resources::{BlendState, DepthFunc, Material, PolygonOffset, Side};

#[derive(Debug, Default)]
pub struct StateCache {
    program: Option<Option<ProgramId>>,
    array_buffer: Option<Option<BufferId>>,
    element_buffer: Option<Option<BufferId>>,
    framebuffer: Option<Option<FramebufferId>>,
    viewport: Option<Rect>,
    scissor: Option<Rect>,

    capabilities: FxHashMap<Capability, bool>,
    blend: Option<Option<BlendState>>,
    depth_func: Option<DepthFunc>,
    depth_mask: Option<bool>,
    color_mask: Option<bool>,
    cull_face: Option<CullFace>,
    front_face: Option<FrontFace>,
    line_width: Option<f32>,
    polygon_offset: Option<PolygonOffset>,

    active_unit: Option<u32>,
    unit_bindings: FxHashMap<u32, Option<TextureId>>,

    // Vertex attribute arrays: (enabled now, enabled this draw, divisor)
    attributes: SmallVec<[(bool, bool, u32); 16]>,
}

impl StateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything; the next call of every setter reaches the driver.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // ========================================================================
    // Bindings
    // ========================================================================

    pub fn use_program<D: GraphicsDriver>(&mut self, driver: &mut D, program: Option<ProgramId>) -> bool {
        if self.program == Some(program) {
            return false;
        }
        driver.use_program(program);
        self.program = Some(program);
        true
    }

    #[inline]
    #[must_use]
    pub fn current_program(&self) -> Option<ProgramId> {
        self.program.flatten()
    }

    pub fn bind_buffer<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        target: BufferTarget,
        buffer: Option<BufferId>,
    ) -> bool {
        let slot = match target {
            BufferTarget::Array => &mut self.array_buffer,
            BufferTarget::ElementArray => &mut self.element_buffer,
        };
        if *slot == Some(buffer) {
            return false;
        }
        driver.bind_buffer(target, buffer);
        *slot = Some(buffer);
        true
    }

    /// Drops the cached binding of a buffer that is about to be deleted.
    pub fn forget_buffer(&mut self, buffer: BufferId) {
        for slot in [&mut self.array_buffer, &mut self.element_buffer] {
            if *slot == Some(Some(buffer)) {
                *slot = None;
            }
        }
    }

    pub fn bind_framebuffer<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        framebuffer: Option<FramebufferId>,
    ) -> bool {
        if self.framebuffer == Some(framebuffer) {
            return false;
        }
        driver.bind_framebuffer(framebuffer);
        self.framebuffer = Some(framebuffer);
        true
    }

    #[inline]
    #[must_use]
    pub fn current_framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer.flatten()
    }

    pub fn viewport<D: GraphicsDriver>(&mut self, driver: &mut D, rect: Rect) -> bool {
        if self.viewport == Some(rect) {
            return false;
        }
        driver.viewport(rect);
        self.viewport = Some(rect);
        true
    }

    pub fn scissor<D: GraphicsDriver>(&mut self, driver: &mut D, rect: Rect) -> bool {
        if self.scissor == Some(rect) {
            return false;
        }
        driver.scissor(rect);
        self.scissor = Some(rect);
        true
    }

    // ========================================================================
    // Capabilities & fixed-function state
    // ========================================================================

    pub fn set_capability<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        capability: Capability,
        enabled: bool,
    ) -> bool {
        if self.capabilities.get(&capability) == Some(&enabled) {
            return false;
        }
        if enabled {
            driver.enable(capability);
        } else {
            driver.disable(capability);
        }
        self.capabilities.insert(capability, enabled);
        true
    }

    #[inline]
    pub fn enable<D: GraphicsDriver>(&mut self, driver: &mut D, capability: Capability) -> bool {
        self.set_capability(driver, capability, true)
    }

    #[inline]
    pub fn disable<D: GraphicsDriver>(&mut self, driver: &mut D, capability: Capability) -> bool {
        self.set_capability(driver, capability, false)
    }

    /// Applies a resolved blend state; `None` disables blending.
    ///
    /// Equation and factors are re-issued only when they differ from the last
    /// enabled state.
    pub fn set_blending<D: GraphicsDriver>(&mut self, driver: &mut D, blend: Option<BlendState>) -> bool {
        let Some(state) = blend else {
            return self.disable(driver, Capability::Blend);
        };

        let mut changed = self.enable(driver, Capability::Blend);
        if self.blend != Some(Some(state)) {
            driver.blend_equation_separate(state.equation, state.equation_alpha);
            driver.blend_func_separate(state.src, state.dst, state.src_alpha, state.dst_alpha);
            self.blend = Some(Some(state));
            changed = true;
        }
        changed
    }

    pub fn set_depth_test<D: GraphicsDriver>(&mut self, driver: &mut D, enabled: bool) -> bool {
        self.set_capability(driver, Capability::DepthTest, enabled)
    }

    pub fn set_depth_func<D: GraphicsDriver>(&mut self, driver: &mut D, func: DepthFunc) -> bool {
        if self.depth_func == Some(func) {
            return false;
        }
        driver.depth_func(func);
        self.depth_func = Some(func);
        true
    }

    pub fn set_depth_mask<D: GraphicsDriver>(&mut self, driver: &mut D, enabled: bool) -> bool {
        if self.depth_mask == Some(enabled) {
            return false;
        }
        driver.depth_mask(enabled);
        self.depth_mask = Some(enabled);
        true
    }

    pub fn set_color_mask<D: GraphicsDriver>(&mut self, driver: &mut D, enabled: bool) -> bool {
        if self.color_mask == Some(enabled) {
            return false;
        }
        driver.color_mask(enabled);
        self.color_mask = Some(enabled);
        true
    }

    pub fn set_cull_face<D: GraphicsDriver>(&mut self, driver: &mut D, face: Option<CullFace>) -> bool {
        let Some(face) = face else {
            return self.disable(driver, Capability::CullFace);
        };
        let mut changed = self.enable(driver, Capability::CullFace);
        if self.cull_face != Some(face) {
            driver.cull_face(face);
            self.cull_face = Some(face);
            changed = true;
        }
        changed
    }

    pub fn set_front_face<D: GraphicsDriver>(&mut self, driver: &mut D, face: FrontFace) -> bool {
        if self.front_face == Some(face) {
            return false;
        }
        driver.front_face(face);
        self.front_face = Some(face);
        true
    }

    pub fn set_line_width<D: GraphicsDriver>(&mut self, driver: &mut D, width: f32) -> bool {
        if self.line_width == Some(width) {
            return false;
        }
        driver.line_width(width);
        self.line_width = Some(width);
        true
    }

    pub fn set_polygon_offset<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        offset: Option<PolygonOffset>,
    ) -> bool {
        let Some(offset) = offset else {
            return self.disable(driver, Capability::PolygonOffsetFill);
        };
        let mut changed = self.enable(driver, Capability::PolygonOffsetFill);
        if self.polygon_offset != Some(offset) {
            driver.polygon_offset(offset.factor, offset.units);
            self.polygon_offset = Some(offset);
            changed = true;
        }
        changed
    }

    /// Applies a material's culling, blending and depth state.
    ///
    /// `flip_sided` mirrors the winding order for objects whose world matrix
    /// has a negative determinant.
    pub fn set_material<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        material: &Material,
        premultiplied_alpha: bool,
        flip_sided: bool,
    ) {
        let cull = match material.side {
            Side::Double => None,
            Side::Front | Side::Back => Some(CullFace::Back),
        };
        self.set_cull_face(driver, cull);

        let mut front = if material.side == Side::Back {
            FrontFace::Cw
        } else {
            FrontFace::Ccw
        };
        if flip_sided {
            front = match front {
                FrontFace::Ccw => FrontFace::Cw,
                FrontFace::Cw => FrontFace::Ccw,
            };
        }
        self.set_front_face(driver, front);

        let blend = if material.transparent {
            material
                .blending
                .resolve(material.premultiplied_alpha || premultiplied_alpha)
        } else {
            None
        };
        self.set_blending(driver, blend);

        self.set_depth_test(driver, material.depth_test);
        self.set_depth_func(driver, material.depth_func);
        self.set_depth_mask(driver, material.depth_write);
        self.set_color_mask(driver, material.color_write);
        self.set_polygon_offset(driver, material.polygon_offset);
    }

    // ========================================================================
    // Textures
    // ========================================================================

    pub fn active_texture<D: GraphicsDriver>(&mut self, driver: &mut D, unit: u32) -> bool {
        if self.active_unit == Some(unit) {
            return false;
        }
        driver.active_texture(unit);
        self.active_unit = Some(unit);
        true
    }

    /// Binds `texture` to `unit`, selecting the unit first if needed.
    pub fn bind_texture<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        unit: u32,
        texture: Option<TextureId>,
    ) -> bool {
        if self.unit_bindings.get(&unit) == Some(&texture) {
            return false;
        }
        self.active_texture(driver, unit);
        driver.bind_texture(texture);
        self.unit_bindings.insert(unit, texture);
        true
    }

    /// Makes `texture` the target of texture-image calls: `unit` is selected
    /// even when it already holds `texture`.
    pub fn select_texture<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        unit: u32,
        texture: Option<TextureId>,
    ) {
        self.active_texture(driver, unit);
        self.bind_texture(driver, unit, texture);
    }

    /// Drops the cached binding of a program that is about to be deleted.
    pub fn forget_program(&mut self, program: ProgramId) {
        if self.program == Some(Some(program)) {
            self.program = None;
        }
    }

    /// Drops every cached unit binding of a texture that is about to be deleted.
    pub fn forget_texture(&mut self, texture: TextureId) {
        self.unit_bindings.retain(|_, bound| *bound != Some(texture));
    }

    // ========================================================================
    // Vertex attributes
    // ========================================================================

    /// Starts a geometry bind: every attribute is considered unused until
    /// enabled again.
    pub fn init_attributes(&mut self) {
        for slot in &mut self.attributes {
            slot.1 = false;
        }
    }

    /// Enables attribute array `index` with the given instancing divisor.
    pub fn enable_attribute<D: GraphicsDriver>(&mut self, driver: &mut D, index: u32, divisor: u32) {
        let i = index as usize;
        if self.attributes.len() <= i {
            self.attributes.resize(i + 1, (false, false, 0));
        }
        let slot = &mut self.attributes[i];
        slot.1 = true;
        if !slot.0 {
            driver.enable_vertex_attrib_array(index);
            slot.0 = true;
        }
        if slot.2 != divisor {
            driver.vertex_attrib_divisor(index, divisor);
            slot.2 = divisor;
        }
    }

    /// Disables every attribute array that was not enabled since
    /// [`init_attributes`](Self::init_attributes).
    pub fn disable_unused_attributes<D: GraphicsDriver>(&mut self, driver: &mut D) {
        for (index, slot) in self.attributes.iter_mut().enumerate() {
            if slot.0 && !slot.1 {
                driver.disable_vertex_attrib_array(index as u32);
                slot.0 = false;
            }
        }
    }
}
