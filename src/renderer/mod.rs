//! Rendering System
//!
//! [`Renderer`] turns a [`Scene`] into driver calls, one frame per
//! [`Renderer::render`]:
//!
//! 1. propagate world matrices (when `scene.auto_update` is set)
//! 2. build the opaque and transparent buckets ([`render_list`])
//! 3. bind the current target and auto-clear it
//! 4. for each record: program, uniforms, fixed-function state, vertex
//!    bindings, draw call
//! 5. restore depth test, depth write and color write
//!
//! # Sub-modules
//!
//! - [`driver`]: the GL-style driver interface and the recording driver
//! - [`state`]: redundant state-change filtering
//! - [`program`] / [`program_cache`]: compiled programs, shared by signature
//! - [`uniforms`]: per-program uniform tree and uploads
//! - [`geometry`] / [`texture`]: driver buffers, textures and framebuffers
//! - [`settings`] / [`info`]: configuration and frame statistics
//!
//! # Failure model
//!
//! Nothing in a frame is fatal. Missing assets, unlinkable programs, geometry
//! without positions and empty draw ranges each skip a single draw and the
//! frame carries on.

pub mod driver;
pub mod geometry;
pub mod info;
pub mod program;
pub mod program_cache;
pub mod render_list;
pub mod settings;
pub mod state;
pub mod texture;
pub mod uniforms;

pub use driver::GraphicsDriver;
pub use info::{MemoryStats, RenderInfo, RenderStats};
pub use program::{CompiledProgram, ProgramDiagnostics, ProgramSignature, ProgramSources};
pub use program_cache::{ProgramCache, ProgramHandle};
pub use render_list::{RenderItem, RenderList, RenderListBuilder};
pub use settings::RendererSettings;
pub use state::StateCache;

use glam::{Mat3, Mat4};
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use slotmap::{SecondaryMap, SlotMap};

use crate::assets::{AssetStore, GeometryHandle, MaterialHandle, RenderTargetHandle, TextureHandle};
use crate::errors::{MythGlError, Result};
use crate::renderer::driver::{
    BufferTarget, Capability, ClearFlags, ComponentType, PrimitiveMode, Rect,
};
use crate::renderer::geometry::GeometryManager;
use crate::renderer::texture::{FramebufferManager, TextureManager};
use crate::renderer::uniforms::{SamplerBinding, UniformScratch, UploadContext};
use crate::resources::{
    AttributeData, DrawMode, Geometry, GeometryGroup, IndexBuffer, Material, Texture, UniformValue,
};
use crate::scene::{Camera, NodeHandle, Scene};
use crate::utils::interner::{self, Symbol};

// ============================================================================
// Per-material bookkeeping
// ============================================================================

#[derive(Debug, Clone)]
struct MaterialProperties {
    program: ProgramHandle,
    signature: ProgramSignature,
    uniforms_version: u64,
    /// Top-level program uniforms the material has a value for.
    uniforms_list: Vec<usize>,
}

/// Uniforms the renderer feeds itself.
#[derive(Debug, Clone, Copy)]
struct BuiltinUniforms {
    projection_matrix: Symbol,
    view_matrix: Symbol,
    camera_position: Symbol,
    model_view_matrix: Symbol,
    normal_matrix: Symbol,
    model_matrix: Symbol,
}

impl BuiltinUniforms {
    fn new() -> Self {
        interner::preload_builtin_uniforms();
        Self {
            projection_matrix: interner::intern("projectionMatrix"),
            view_matrix: interner::intern("viewMatrix"),
            camera_position: interner::intern("cameraPosition"),
            model_view_matrix: interner::intern("modelViewMatrix"),
            normal_matrix: interner::intern("normalMatrix"),
            model_matrix: interner::intern("modelMatrix"),
        }
    }
}

/// Hands out texture units for one draw and binds textures to them.
struct TextureUnits<'a> {
    state: &'a mut StateCache,
    manager: &'a mut TextureManager,
    textures: &'a SlotMap<TextureHandle, Texture>,
    next: &'a mut u32,
    max: u32,
}

impl<D: GraphicsDriver> SamplerBinding<D> for TextureUnits<'_> {
    fn allocate_texture_unit(&mut self) -> u32 {
        let unit = *self.next;
        if unit >= self.max {
            warn!(
                "Trying to use {} texture units while this driver supports only {}",
                unit + 1,
                self.max
            );
        }
        *self.next += 1;
        unit
    }

    fn bind_texture(&mut self, driver: &mut D, texture: Option<TextureHandle>, unit: u32) {
        self.manager
            .bind(driver, self.state, self.textures, texture, unit);
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Retained-mode scene renderer over a [`GraphicsDriver`].
pub struct Renderer<D: GraphicsDriver> {
    driver: D,
    settings: RendererSettings,
    info: RenderInfo,

    // === Caches ===
    state: StateCache,
    programs: ProgramCache,
    materials: SecondaryMap<MaterialHandle, MaterialProperties>,
    geometries: GeometryManager,
    textures: TextureManager,
    framebuffers: FramebufferManager,

    // === Frame scratch ===
    render_list: RenderList,
    list_builder: RenderListBuilder,
    scratch: UniformScratch,
    builtins: BuiltinUniforms,

    // === Per-draw tracking ===
    current_target: Option<RenderTargetHandle>,
    current_camera: Option<NodeHandle>,
    current_material: Option<MaterialHandle>,
    current_binding: Option<(GeometryHandle, ProgramHandle, bool)>,
    texture_units: u32,

    // === Default surface ===
    viewport: Rect,
    scissor: Rect,
    scissor_test: bool,
    applied_clear_color: Option<[f32; 4]>,
}

impl<D: GraphicsDriver> Renderer<D> {
    #[must_use]
    pub fn new(driver: D, settings: RendererSettings) -> Self {
        let full = Rect::new(0, 0, settings.width, settings.height);
        Self {
            driver,
            settings,
            info: RenderInfo::new(),

            state: StateCache::new(),
            programs: ProgramCache::new(),
            materials: SecondaryMap::new(),
            geometries: GeometryManager::new(),
            textures: TextureManager::new(),
            framebuffers: FramebufferManager::new(),

            render_list: RenderList::new(),
            list_builder: RenderListBuilder::new(),
            scratch: UniformScratch::new(),
            builtins: BuiltinUniforms::new(),

            current_target: None,
            current_camera: None,
            current_material: None,
            current_binding: None,
            texture_units: 0,

            viewport: full,
            scissor: full,
            scissor_test: false,
            applied_clear_color: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    #[inline]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Settings are re-read every frame; size changes should go through
    /// [`set_size`](Self::set_size) so the viewport follows.
    #[inline]
    pub fn settings_mut(&mut self) -> &mut RendererSettings {
        &mut self.settings
    }

    #[inline]
    #[must_use]
    pub fn info(&self) -> &RenderInfo {
        &self.info
    }

    #[inline]
    #[must_use]
    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    /// The program currently used by `material`, if it was drawn or compiled.
    #[must_use]
    pub fn material_program(&self, material: MaterialHandle) -> Option<&CompiledProgram> {
        let props = self.materials.get(material)?;
        self.programs.get(props.program)
    }

    /// The render list of the last frame.
    #[inline]
    #[must_use]
    pub fn render_list(&self) -> &RenderList {
        &self.render_list
    }

    #[inline]
    #[must_use]
    pub fn render_target(&self) -> Option<RenderTargetHandle> {
        self.current_target
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Draws everything `camera` sees in `scene` into the current target.
    ///
    /// Never fails: problems with individual objects are logged and the
    /// object is skipped. A `camera` that is not a camera node skips the
    /// whole frame.
    pub fn render(&mut self, scene: &mut Scene, camera: NodeHandle, assets: &mut AssetStore) {
        self.info.begin_frame();

        if scene.auto_update {
            scene.update_matrix_world();
        }
        // A camera outside the graph is never reached by the pass above.
        if camera != scene.root() && scene.get_node(camera).is_some_and(|n| n.parent().is_none()) {
            scene.update_subtree(camera, false);
        }

        let scene: &Scene = scene;
        let Some(cam) = scene.camera(camera) else {
            warn!("Node {camera:?} is not a camera; frame skipped");
            return;
        };

        self.current_camera = None;
        self.current_material = None;
        self.current_binding = None;

        self.list_builder.build(
            &mut self.render_list,
            scene,
            cam,
            assets,
            self.settings.sort_objects,
        );

        self.bind_render_target(assets);
        if self.settings.auto_clear {
            self.clear(
                self.settings.auto_clear_color,
                self.settings.auto_clear_depth,
                self.settings.auto_clear_stencil,
            );
        }

        let list = std::mem::take(&mut self.render_list);
        for item in list.iter() {
            self.render_item(item, scene, cam, camera, assets);
        }
        self.render_list = list;

        self.state.set_depth_test(&mut self.driver, true);
        self.state.set_depth_mask(&mut self.driver, true);
        self.state.set_color_mask(&mut self.driver, true);

        if self.settings.reset_render_target_after_render && self.current_target.is_some() {
            self.set_render_target(None, assets);
        }

        self.update_memory_info();
    }

    /// Builds the programs of every material reachable from the scene root
    /// without drawing anything.
    pub fn compile(&mut self, scene: &Scene, assets: &mut AssetStore) {
        let mut stack = vec![scene.root()];
        while let Some(handle) = stack.pop() {
            let Some(node) = scene.get_node(handle) else {
                continue;
            };
            if let Some(mesh) = node.as_mesh() {
                for material in mesh.material.handles() {
                    self.prepare_material(material, &mut assets.materials);
                }
            }
            stack.extend(node.children().iter().rev().copied());
        }
        self.update_memory_info();
    }

    fn render_item(
        &mut self,
        item: &RenderItem,
        scene: &Scene,
        camera: &Camera,
        camera_handle: NodeHandle,
        assets: &mut AssetStore,
    ) {
        let Some(program) = self.prepare_material(item.material, &mut assets.materials) else {
            return;
        };

        let assets: &AssetStore = assets;
        let (Some(node), Some(geometry), Some(material)) = (
            scene.get_node(item.node),
            assets.geometries.get(item.geometry),
            assets.materials.get(item.material),
        ) else {
            return;
        };

        let Some(compiled) = self.programs.get(program) else {
            return;
        };
        if !compiled.is_runnable() {
            debug!("Skipping '{}': program {} failed to link", node.name, compiled.id());
            return;
        }
        let driver_program = compiled.driver_program();

        let Some(position) = geometry.attribute("position") else {
            debug!("Skipping '{}': geometry has no position attribute", node.name);
            return;
        };

        let wireframe = material.wireframe;
        let Some((first, count)) =
            clamp_draw_range(geometry, position.count(), item.group.as_ref(), wireframe)
        else {
            return;
        };
        let instances = geometry.instance_count;
        if instances == Some(0) {
            return;
        }

        // === Program & uniforms ===
        let refresh_program = self.state.use_program(&mut self.driver, Some(driver_program));
        let refresh_camera = refresh_program || self.current_camera != Some(camera_handle);
        let refresh_material = refresh_program || self.current_material != Some(item.material);
        self.current_camera = Some(camera_handle);
        self.current_material = Some(item.material);
        self.texture_units = 0;

        {
            let Some(uniforms) = self.programs.uniforms_mut(program) else {
                return;
            };
            let b = self.builtins;
            let mut units = TextureUnits {
                state: &mut self.state,
                manager: &mut self.textures,
                textures: &assets.textures,
                next: &mut self.texture_units,
                max: self.settings.max_texture_units,
            };
            let mut ctx = UploadContext {
                driver: &mut self.driver,
                scratch: &mut self.scratch,
                textures: &mut units,
            };

            if refresh_camera {
                let projection = UniformValue::Mat4(*camera.projection_matrix());
                let view = UniformValue::Mat4(*camera.view_matrix());
                let eye = UniformValue::Vec3(camera.position());
                uniforms.set_value_by_symbol(&mut ctx, b.projection_matrix, &projection);
                uniforms.set_value_by_symbol(&mut ctx, b.view_matrix, &view);
                uniforms.set_value_by_symbol(&mut ctx, b.camera_position, &eye);
            }

            if refresh_material && let Some(props) = self.materials.get(item.material) {
                uniforms.upload(&mut ctx, &props.uniforms_list, material.uniforms());
            }

            let model = Mat4::from(*node.world_matrix());
            let model_view = *camera.view_matrix() * model;
            let normal = normal_matrix(&model_view);
            uniforms.set_value_by_symbol(&mut ctx, b.model_view_matrix, &UniformValue::Mat4(model_view));
            uniforms.set_value_by_symbol(&mut ctx, b.normal_matrix, &UniformValue::Mat3(normal));
            uniforms.set_value_by_symbol(&mut ctx, b.model_matrix, &UniformValue::Mat4(model));
        }

        // === Fixed-function state ===
        let flip_sided = node.world_matrix().matrix3.determinant() < 0.0;
        self.state.set_material(
            &mut self.driver,
            material,
            self.settings.premultiplied_alpha,
            flip_sided,
        );

        // === Vertex input ===
        let layout_changed =
            self.geometries
                .update(&mut self.driver, &mut self.state, item.geometry, geometry);

        let index = if wireframe {
            let Some(lines) = self.geometries.wireframe_index(
                &mut self.driver,
                &mut self.state,
                item.geometry,
                geometry,
            ) else {
                debug!("Skipping '{}': no wireframe index", node.name);
                return;
            };
            Some((lines.buffer, lines.index_type))
        } else {
            self.geometries.index_buffer(item.geometry)
        };

        let binding = (item.geometry, program, wireframe);
        if layout_changed || self.current_binding != Some(binding) {
            let Some(compiled) = self.programs.get(program) else {
                return;
            };
            bind_vertex_attributes(
                &mut self.driver,
                &mut self.state,
                &self.geometries,
                compiled.attributes(),
                item.geometry,
                geometry,
            );
            self.current_binding = Some(binding);
        }

        // === Draw ===
        let mode = if wireframe {
            self.state
                .set_line_width(&mut self.driver, material.wireframe_linewidth);
            PrimitiveMode::Lines
        } else {
            if item.draw_mode.is_line() {
                self.state.set_line_width(&mut self.driver, material.linewidth);
            }
            primitive_mode(item.draw_mode)
        };

        match (index, instances) {
            (Some((buffer, index_type)), instances) => {
                let Some(offset) = first.checked_mul(index_type.bytes()) else {
                    debug!("Skipping '{}': index offset {first} overflows", node.name);
                    return;
                };
                self.state
                    .bind_buffer(&mut self.driver, BufferTarget::ElementArray, Some(buffer));
                match instances {
                    Some(n) => self
                        .driver
                        .draw_elements_instanced(mode, count, index_type, offset, n),
                    None => self.driver.draw_elements(mode, count, index_type, offset),
                }
            }
            (None, Some(n)) => self.driver.draw_arrays_instanced(mode, first, count, n),
            (None, None) => self.driver.draw_arrays(mode, first, count),
        }

        self.info.record_draw(mode, count, instances.unwrap_or(1));
    }

    // ========================================================================
    // Materials & programs
    // ========================================================================

    /// Makes sure `handle` has a current program and returns it.
    fn prepare_material(
        &mut self,
        handle: MaterialHandle,
        materials: &mut SlotMap<MaterialHandle, Material>,
    ) -> Option<ProgramHandle> {
        let material = materials.get_mut(handle)?;

        let cached = self
            .materials
            .get(handle)
            .map(|p| (p.program, p.uniforms_version));
        match cached {
            Some((program, _)) if material.needs_update || !self.programs.is_current(program) => {
                self.init_material(handle, material);
            }
            None => self.init_material(handle, material),
            Some((program, version)) if version != material.uniforms_version() => {
                let list = self
                    .programs
                    .get(program)
                    .map(|p| p.uniforms().seq_with_value(material.uniforms()))
                    .unwrap_or_default();
                if let Some(props) = self.materials.get_mut(handle) {
                    props.uniforms_list = list;
                    props.uniforms_version = material.uniforms_version();
                }
            }
            Some(_) => {}
        }

        self.materials.get(handle).map(|p| p.program)
    }

    fn release_program(&mut self, program: ProgramHandle) {
        if let Some(deleted) = self.programs.release(&mut self.driver, program) {
            self.state.forget_program(deleted);
        }
    }

    /// (Re)acquires the program of `material`, releasing the previous one
    /// when its signature changed or it went stale.
    fn init_material(&mut self, handle: MaterialHandle, material: &mut Material) {
        let sources = ProgramSources::from_material(material);
        let signature = ProgramSignature::compute(&sources);

        let previous = self.materials.get(handle).map(|p| (p.program, p.signature));
        let program = match previous {
            Some((program, old)) if old == signature && self.programs.is_current(program) => {
                program
            }
            Some((program, _)) => {
                self.release_program(program);
                self.programs
                    .acquire_sources(&mut self.driver, signature, &sources)
            }
            None => self
                .programs
                .acquire_sources(&mut self.driver, signature, &sources),
        };

        let uniforms_list = self
            .programs
            .get(program)
            .map(|p| p.uniforms().seq_with_value(material.uniforms()))
            .unwrap_or_default();

        debug!(
            "Material '{}' uses program {signature} ({} uniforms bound)",
            material.name,
            uniforms_list.len()
        );

        self.materials.insert(
            handle,
            MaterialProperties {
                program,
                signature,
                uniforms_version: material.uniforms_version(),
                uniforms_list,
            },
        );
        material.needs_update = false;
        if self.current_material == Some(handle) {
            self.current_material = None;
        }
    }

    // ========================================================================
    // Targets, viewport & clearing
    // ========================================================================

    /// Selects the target of subsequent draws and clears; `None` is the
    /// default surface. The target's framebuffer is created here on first use.
    pub fn set_render_target(&mut self, target: Option<RenderTargetHandle>, assets: &AssetStore) {
        self.current_target = target;
        self.bind_render_target(assets);
    }

    fn bind_render_target(&mut self, assets: &AssetStore) {
        let target = self
            .current_target
            .and_then(|h| assets.render_targets.get(h).map(|t| (h, t)));

        let (viewport, scissor, scissor_test) = match target {
            Some((handle, target)) => {
                let framebuffer = self.framebuffers.setup(
                    &mut self.driver,
                    &mut self.state,
                    &mut self.textures,
                    handle,
                    target,
                );
                self.state
                    .bind_framebuffer(&mut self.driver, Some(framebuffer));
                (target.viewport, target.scissor, target.scissor_test)
            }
            None => {
                if self.current_target.take().is_some() {
                    warn!("Render target no longer exists; using the default surface");
                }
                self.state.bind_framebuffer(&mut self.driver, None);
                let ratio = self.settings.pixel_ratio;
                (
                    self.viewport.scaled(ratio),
                    self.scissor.scaled(ratio),
                    self.scissor_test,
                )
            }
        };

        self.state.viewport(&mut self.driver, viewport);
        self.state.scissor(&mut self.driver, scissor);
        self.state
            .set_capability(&mut self.driver, Capability::ScissorTest, scissor_test);
    }

    /// Sets the default-surface viewport in logical pixels.
    pub fn set_viewport(&mut self, rect: Rect) {
        self.viewport = rect;
        if self.current_target.is_none() {
            let scaled = rect.scaled(self.settings.pixel_ratio);
            self.state.viewport(&mut self.driver, scaled);
        }
    }

    /// Sets the default-surface scissor box in logical pixels.
    pub fn set_scissor(&mut self, rect: Rect) {
        self.scissor = rect;
        if self.current_target.is_none() {
            let scaled = rect.scaled(self.settings.pixel_ratio);
            self.state.scissor(&mut self.driver, scaled);
        }
    }

    pub fn set_scissor_test(&mut self, enabled: bool) {
        self.scissor_test = enabled;
        if self.current_target.is_none() {
            self.state
                .set_capability(&mut self.driver, Capability::ScissorTest, enabled);
        }
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.settings.clear_color = rgba;
    }

    /// Resizes the default surface and resets its viewport and scissor to
    /// cover it.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.settings.width = width;
        self.settings.height = height;
        let full = Rect::new(0, 0, width, height);
        self.set_viewport(full);
        self.set_scissor(full);
    }

    pub fn set_pixel_ratio(&mut self, ratio: f32) {
        self.settings.pixel_ratio = ratio;
        self.set_size(self.settings.width, self.settings.height);
    }

    /// Clears the selected buffers of the bound target.
    pub fn clear(&mut self, color: bool, depth: bool, stencil: bool) {
        let mut flags = ClearFlags::empty();
        if color {
            flags |= ClearFlags::COLOR;
            let rgba = self.settings.clear_color;
            if self.applied_clear_color != Some(rgba) {
                self.driver.clear_color(rgba);
                self.applied_clear_color = Some(rgba);
            }
            self.state.set_color_mask(&mut self.driver, true);
        }
        if depth {
            flags |= ClearFlags::DEPTH;
            self.state.set_depth_mask(&mut self.driver, true);
        }
        if stencil {
            flags |= ClearFlags::STENCIL;
        }
        if !flags.is_empty() {
            self.driver.clear(flags);
        }
    }

    // ========================================================================
    // Read-back
    // ========================================================================

    /// Copies a rectangle of `target`'s color attachment into `out`.
    ///
    /// The request is rejected, without reaching the driver, when the target
    /// was never bound, the rectangle is out of bounds, `out` is too small or
    /// the framebuffer is incomplete. The previously bound framebuffer is
    /// restored afterwards.
    pub fn read_render_target_pixels(
        &mut self,
        assets: &AssetStore,
        target: RenderTargetHandle,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        out: &mut [u8],
    ) -> Result<()> {
        let result = self.read_pixels_checked(assets, target, x, y, width, height, out);
        if let Err(e) = &result {
            warn!("Read-back rejected: {e}");
        }
        result
    }

    fn read_pixels_checked(
        &mut self,
        assets: &AssetStore,
        handle: RenderTargetHandle,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        out: &mut [u8],
    ) -> Result<()> {
        let (Some(target), Some(framebuffer)) = (
            assets.render_targets.get(handle),
            self.framebuffers.framebuffer(handle),
        ) else {
            return Err(MythGlError::RenderTargetNotInitialized);
        };

        if !target.contains_rect(x, y, width, height) {
            return Err(MythGlError::ReadOutOfRange {
                x,
                y,
                width,
                height,
                target_width: target.width,
                target_height: target.height,
            });
        }

        let needed = width as usize * height as usize * target.format.bytes_per_pixel();
        if out.len() < needed {
            return Err(MythGlError::ReadBufferTooSmall {
                needed,
                actual: out.len(),
            });
        }

        let previous = self.state.current_framebuffer();
        self.state
            .bind_framebuffer(&mut self.driver, Some(framebuffer));

        let result = if self.driver.check_framebuffer_complete() {
            self.driver
                .read_pixels(Rect::new(x, y, width, height), &mut out[..needed]);
            Ok(())
        } else {
            Err(MythGlError::FramebufferIncomplete)
        };

        self.state.bind_framebuffer(&mut self.driver, previous);
        result
    }

    // ========================================================================
    // Disposal & context loss
    // ========================================================================

    /// Drops the material's program reference. Returns `false` if the
    /// material never got a program.
    pub fn dispose_material(&mut self, material: MaterialHandle) -> bool {
        let Some(props) = self.materials.remove(material) else {
            return false;
        };
        self.release_program(props.program);
        if self.current_material == Some(material) {
            self.current_material = None;
        }
        self.update_memory_info();
        true
    }

    /// Deletes the driver buffers of `geometry`.
    pub fn dispose_geometry(&mut self, geometry: GeometryHandle) -> bool {
        let disposed = self
            .geometries
            .dispose(&mut self.driver, &mut self.state, geometry);
        if self
            .current_binding
            .is_some_and(|(bound, _, _)| bound == geometry)
        {
            self.current_binding = None;
        }
        self.update_memory_info();
        disposed
    }

    /// Deletes the driver texture of `texture`.
    pub fn dispose_texture(&mut self, texture: TextureHandle) -> bool {
        let disposed = self
            .textures
            .dispose(&mut self.driver, &mut self.state, texture);
        self.update_memory_info();
        disposed
    }

    /// Deletes the framebuffer, attachment texture and depth buffer of
    /// `target`. Call before removing the target from the asset store.
    pub fn dispose_render_target(&mut self, target: RenderTargetHandle, assets: &AssetStore) -> bool {
        let texture = assets
            .render_targets
            .get(target)
            .and_then(|t| t.texture());
        let disposed = self.framebuffers.dispose(
            &mut self.driver,
            &mut self.state,
            &mut self.textures,
            target,
            texture,
        );
        if self.current_target == Some(target) {
            self.current_target = None;
        }
        self.update_memory_info();
        disposed
    }

    /// Forgets every driver object after the context was lost.
    ///
    /// No delete calls are issued. Programs are rebuilt, and buffers and
    /// textures re-uploaded, the next time they are used.
    pub fn handle_context_lost(&mut self) {
        info!("Graphics context lost; cached driver objects dropped");
        self.state.reset();
        self.programs.invalidate();
        self.geometries.forget_all();
        self.textures.forget_all();
        self.framebuffers.forget_all();

        self.current_camera = None;
        self.current_material = None;
        self.current_binding = None;
        self.applied_clear_color = None;
        self.update_memory_info();
    }

    fn update_memory_info(&mut self) {
        self.info.memory.geometries = self.geometries.len();
        self.info.memory.textures = self.textures.len();
        self.info.programs = self
            .programs
            .iter()
            .filter(|(handle, _)| self.programs.is_current(*handle))
            .count();
    }
}

// ============================================================================
// Draw helpers
// ============================================================================

fn primitive_mode(mode: DrawMode) -> PrimitiveMode {
    match mode {
        DrawMode::Triangles => PrimitiveMode::Triangles,
        DrawMode::TriangleStrip => PrimitiveMode::TriangleStrip,
        DrawMode::TriangleFan => PrimitiveMode::TriangleFan,
        DrawMode::Lines => PrimitiveMode::Lines,
        DrawMode::LineStrip => PrimitiveMode::LineStrip,
        DrawMode::LineLoop => PrimitiveMode::LineLoop,
        DrawMode::Points => PrimitiveMode::Points,
    }
}

/// Inverse transpose of the upper 3x3; zero for singular matrices.
fn normal_matrix(model_view: &Mat4) -> Mat3 {
    let m = Mat3::from_mat4(*model_view);
    if m.determinant().abs() <= f32::EPSILON {
        return Mat3::ZERO;
    }
    m.inverse().transpose()
}

/// Intersects the geometry's draw range, the group bounds and the data
/// actually present. Returns `(first, count)`, or `None` when empty.
///
/// Wireframe draws index a line list with two entries per triangle edge, so
/// every bound is doubled.
fn clamp_draw_range(
    geometry: &Geometry,
    vertex_count: u32,
    group: Option<&GeometryGroup>,
    wireframe: bool,
) -> Option<(u32, u32)> {
    let factor: i64 = if wireframe { 2 } else { 1 };

    let source = geometry.index().map_or(vertex_count, IndexBuffer::count);
    let data_count = if wireframe {
        i64::from(source / 3) * 6
    } else {
        i64::from(source)
    };

    let range_start = i64::from(geometry.draw_range.start) * factor;
    let range_end = geometry
        .draw_range
        .count
        .map_or(i64::MAX, |count| range_start + i64::from(count) * factor);

    let (group_start, group_end) = match group {
        Some(group) => {
            let start = i64::from(group.start) * factor;
            (start, start + i64::from(group.count) * factor)
        }
        None => (0, i64::MAX),
    };

    let start = range_start.max(group_start);
    let end = data_count.min(range_end).min(group_end);
    let count = end - start;
    if count <= 0 {
        return None;
    }

    match (u32::try_from(start), u32::try_from(count)) {
        (Ok(start), Ok(count)) => Some((start, count)),
        _ => {
            debug!("Draw range {start}..{end} does not fit the driver's u32 range");
            None
        }
    }
}

/// Points every program attribute the geometry provides at its buffer and
/// disables the arrays left over from the previous binding.
fn bind_vertex_attributes<D: GraphicsDriver>(
    driver: &mut D,
    state: &mut StateCache,
    buffers: &GeometryManager,
    locations: &FxHashMap<String, u32>,
    handle: GeometryHandle,
    geometry: &Geometry,
) {
    state.init_attributes();

    for (name, &location) in locations {
        let (Some(attribute), Some(buffer)) =
            (geometry.attribute(name), buffers.attribute_buffer(handle, name))
        else {
            continue;
        };

        let component = match attribute.data() {
            AttributeData::F32(_) => ComponentType::F32,
            AttributeData::U16(_) => ComponentType::U16,
            AttributeData::U8(_) => ComponentType::U8,
        };
        let bytes = attribute.data().component_size() as u32;

        // mat3 / mat4 attributes take one location per column.
        let (slots, size) = match attribute.item_size {
            9 => (3, 3),
            16 => (4, 4),
            n => (1, n),
        };
        let stride = if slots > 1 {
            attribute.item_size * bytes
        } else {
            0
        };

        state.bind_buffer(driver, BufferTarget::Array, Some(buffer));
        for slot in 0..slots {
            state.enable_attribute(driver, location + slot, attribute.divisor);
            driver.vertex_attrib_pointer(
                location + slot,
                size,
                component,
                attribute.normalized,
                stride,
                slot * size * bytes,
            );
        }
    }

    state.disable_unused_attributes(driver);
}
