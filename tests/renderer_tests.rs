//! Renderer Integration Tests
//!
//! Drives full frames through the recording driver and inspects the calls:
//! - Draw ordering between the opaque and transparent buckets
//! - Draw ranges, groups, wireframe and instancing
//! - Program rebuilds (material updates, link failures, context loss)
//! - Uniform and texture uploads
//! - Render targets, read-back and disposal

use std::collections::HashMap;

use glam::Vec3;
use myth_gl::errors::MythGlError;
use myth_gl::prelude::*;
use myth_gl::renderer::driver::{
    Capability, ClearFlags, DriverCall, FrontFace, PrimitiveMode, RecordedUniform, Rect,
    TextureId,
};

// ============================================================================
// Fixtures
// ============================================================================

const VERTEX: &str = "
    attribute vec3 position;
    uniform mat4 modelViewMatrix;
    uniform mat4 projectionMatrix;
    uniform mat3 normalMatrix;
    void main() {}
";

const FRAGMENT: &str = "uniform vec3 diffuse; void main() {}";

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn positions(vertices: usize) -> Geometry {
    Geometry::new().with_attribute("position", Attribute::f32(vec![0.0; vertices * 3], 3))
}

struct Harness {
    renderer: Renderer<RecordingDriver>,
    scene: Scene,
    assets: AssetStore,
    camera: NodeHandle,
}

impl Harness {
    fn new() -> Self {
        init_logger();
        let mut scene = Scene::new();
        let camera = scene.add_camera(Camera::new_perspective(60.0, 1.0, 0.1, 100.0));
        Self {
            renderer: Renderer::new(RecordingDriver::new(), RendererSettings::default()),
            scene,
            assets: AssetStore::new(),
            camera,
        }
    }

    fn material(&mut self, material: Material) -> MaterialHandle {
        self.assets.materials.insert(material)
    }

    fn mesh(&mut self, geometry: Geometry, material: MaterialHandle, z: f32) -> NodeHandle {
        let geometry = self.assets.geometries.insert(geometry);
        let node = self.scene.add_mesh(Mesh::new(geometry, material));
        self.scene.get_node_mut(node).unwrap().transform.position = Vec3::new(0.0, 0.0, z);
        node
    }

    fn render(&mut self) {
        self.renderer
            .render(&mut self.scene, self.camera, &mut self.assets);
    }

    fn driver(&self) -> &RecordingDriver {
        self.renderer.driver()
    }

    fn draws(&self) -> Vec<DriverCall> {
        self.driver().draw_calls().cloned().collect()
    }

    fn count(&self, predicate: impl Fn(&DriverCall) -> bool) -> usize {
        self.driver().count(predicate)
    }

    fn reset_calls(&mut self) {
        self.renderer.driver_mut().clear_calls();
    }
}

fn translation_z(upload: &RecordedUniform) -> f32 {
    match upload {
        RecordedUniform::Matrix { dim: 4, data } => data[14],
        other => panic!("expected a mat4 upload, got {other:?}"),
    }
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn opaque_objects_draw_before_transparent_ones() {
    let mut h = Harness::new();
    let solid = h.material(Material::new(VERTEX, FRAGMENT));
    let glass = h.material(Material::new(VERTEX, FRAGMENT).with_transparent(true));
    h.mesh(positions(3), glass, -10.0);
    h.mesh(positions(36), solid, -5.0);

    h.render();

    assert_eq!(h.draws().len(), 2);
    assert_eq!(h.renderer.info().render.calls, 2);
    assert_eq!(h.renderer.render_list().opaque.len(), 1);
    assert_eq!(h.renderer.render_list().transparent.len(), 1);

    let depths: Vec<f32> = h
        .driver()
        .uniform_uploads("modelViewMatrix")
        .into_iter()
        .map(translation_z)
        .collect();
    assert_eq!(depths, vec![-5.0, -10.0]);

    // Both materials compile to the same program.
    assert_eq!(h.renderer.info().programs, 1);
}

#[test]
fn transparent_objects_draw_back_to_front() {
    let mut h = Harness::new();
    let glass = h.material(Material::new(VERTEX, FRAGMENT).with_transparent(true));
    h.mesh(positions(3), glass, -3.0);
    h.mesh(positions(3), glass, -30.0);
    h.mesh(positions(3), glass, -12.0);

    h.render();

    let depths: Vec<f32> = h
        .driver()
        .uniform_uploads("modelViewMatrix")
        .into_iter()
        .map(translation_z)
        .collect();
    assert_eq!(depths, vec![-30.0, -12.0, -3.0]);
    assert!(h.count(|c| matches!(c, DriverCall::Enable(Capability::Blend))) >= 1);
}

#[test]
fn sorting_can_be_disabled() {
    let mut h = Harness::new();
    h.renderer.settings_mut().sort_objects = false;
    let solid = h.material(Material::new(VERTEX, FRAGMENT));
    h.mesh(positions(3), solid, -20.0);
    h.mesh(positions(3), solid, -2.0);

    h.render();

    let depths: Vec<f32> = h
        .driver()
        .uniform_uploads("modelViewMatrix")
        .into_iter()
        .map(translation_z)
        .collect();
    assert_eq!(depths, vec![-20.0, -2.0]);
}

#[test]
fn non_camera_node_skips_the_frame() {
    let mut h = Harness::new();
    let solid = h.material(Material::new(VERTEX, FRAGMENT));
    let mesh = h.mesh(positions(3), solid, -5.0);

    h.renderer.render(&mut h.scene, mesh, &mut h.assets);

    assert!(h.draws().is_empty());
    assert_eq!(h.count(|c| matches!(c, DriverCall::Clear(_))), 0);
    assert_eq!(h.renderer.info().frame, 1);
}

// ============================================================================
// Draw ranges & topology
// ============================================================================

#[test]
fn empty_draw_range_issues_no_draw() {
    let mut h = Harness::new();
    let solid = h.material(Material::new(VERTEX, FRAGMENT));
    let mut geometry = positions(6);
    geometry.set_draw_range(0, Some(0));
    h.mesh(geometry, solid, -5.0);

    h.render();

    assert!(h.draws().is_empty());
    assert_eq!(h.renderer.info().render.calls, 0);
}

#[test]
fn geometry_without_positions_is_skipped() {
    let mut h = Harness::new();
    let solid = h.material(Material::new(VERTEX, FRAGMENT));
    h.mesh(Geometry::new(), solid, -5.0);
    h.mesh(positions(3), solid, -6.0);

    h.render();
    assert_eq!(h.draws().len(), 1);
}

#[test]
fn draw_range_offsets_indexed_draws() {
    let mut h = Harness::new();
    let solid = h.material(Material::new(VERTEX, FRAGMENT));
    let mut geometry = positions(4).with_index(IndexData::U16(vec![0, 1, 2, 2, 1, 3]));
    geometry.set_draw_range(3, None);
    h.mesh(geometry, solid, -5.0);

    h.render();

    assert!(matches!(
        h.draws().as_slice(),
        [DriverCall::DrawElements {
            mode: PrimitiveMode::Triangles,
            count: 3,
            offset: 6,
            instances: None,
            ..
        }]
    ));
}

#[test]
fn multi_material_groups_draw_separately() {
    let mut h = Harness::new();
    let red = h.material(Material::new(VERTEX, FRAGMENT).with_uniform("diffuse", Vec3::X));
    let blue = h.material(Material::new(VERTEX, FRAGMENT).with_uniform("diffuse", Vec3::Z));

    let mut geometry = positions(6);
    geometry.add_group(0, 3, 0);
    geometry.add_group(3, 3, 1);
    let geometry = h.assets.geometries.insert(geometry);
    let node = h
        .scene
        .add_mesh(Mesh::multi(geometry, vec![Some(red), Some(blue)]));
    h.scene.get_node_mut(node).unwrap().transform.position.z = -5.0;

    h.render();

    let ranges: Vec<(u32, u32)> = h
        .draws()
        .iter()
        .filter_map(|c| match c {
            DriverCall::DrawArrays { first, count, .. } => Some((*first, *count)),
            _ => None,
        })
        .collect();
    assert_eq!(ranges, vec![(0, 3), (3, 3)]);
    assert_eq!(h.driver().uniform_uploads("diffuse").len(), 2);
}

#[test]
fn wireframe_draws_indexed_lines() {
    let mut h = Harness::new();
    let mut material = Material::new(VERTEX, FRAGMENT);
    material.wireframe = true;
    material.wireframe_linewidth = 3.0;
    let wire = h.material(material);
    h.mesh(
        positions(4).with_index(IndexData::U16(vec![0, 1, 2, 2, 1, 3])),
        wire,
        -5.0,
    );

    h.render();

    assert!(matches!(
        h.draws().as_slice(),
        [DriverCall::DrawElements {
            mode: PrimitiveMode::Lines,
            count: 12,
            offset: 0,
            ..
        }]
    ));
    assert!(h.count(|c| matches!(c, DriverCall::LineWidth(w) if (*w - 3.0).abs() < f32::EPSILON)) == 1);
    assert_eq!(h.renderer.info().render.lines, 6);
}

#[test]
fn line_modes_apply_linewidth() {
    let mut h = Harness::new();
    let mut material = Material::new(VERTEX, FRAGMENT);
    material.linewidth = 2.0;
    let line = h.material(material);
    let geometry = h.assets.geometries.insert(positions(4));
    let node = h
        .scene
        .add_mesh(Mesh::new(geometry, line).with_draw_mode(DrawMode::LineStrip));
    h.scene.get_node_mut(node).unwrap().transform.position.z = -5.0;

    h.render();

    assert!(matches!(
        h.draws().as_slice(),
        [DriverCall::DrawArrays {
            mode: PrimitiveMode::LineStrip,
            count: 4,
            ..
        }]
    ));
    assert_eq!(
        h.count(|c| matches!(c, DriverCall::LineWidth(w) if (*w - 2.0).abs() < f32::EPSILON)),
        1
    );
}

#[test]
fn mirrored_objects_flip_winding() {
    let mut h = Harness::new();
    let solid = h.material(Material::new(VERTEX, FRAGMENT));
    let node = h.mesh(positions(3), solid, -5.0);
    h.scene.get_node_mut(node).unwrap().transform.scale = Vec3::new(-1.0, 1.0, 1.0);

    h.render();
    assert!(h.count(|c| matches!(c, DriverCall::FrontFace(FrontFace::Cw))) >= 1);
}

// ============================================================================
// Instancing
// ============================================================================

const INSTANCED_VERTEX: &str = "
    attribute vec3 position;
    attribute vec3 offset;
    uniform mat4 modelViewMatrix;
    uniform mat4 projectionMatrix;
    void main() {}
";

fn instanced(count: Option<u32>) -> Geometry {
    let mut geometry = positions(3).with_attribute(
        "offset",
        Attribute::vec3(&[Vec3::ZERO, Vec3::X, Vec3::Y]).instanced(1),
    );
    geometry.instance_count = count;
    geometry
}

#[test]
fn instanced_geometry_draws_instanced() {
    let mut h = Harness::new();
    let material = h.material(Material::new(INSTANCED_VERTEX, FRAGMENT));
    h.mesh(instanced(Some(3)), material, -5.0);

    h.render();

    assert!(matches!(
        h.draws().as_slice(),
        [DriverCall::DrawArrays {
            first: 0,
            count: 3,
            instances: Some(3),
            ..
        }]
    ));
    assert_eq!(
        h.count(|c| matches!(c, DriverCall::VertexAttribDivisor { divisor: 1, .. })),
        1
    );
    assert_eq!(h.renderer.info().render.triangles, 3);
}

#[test]
fn zero_instances_issue_no_draw() {
    let mut h = Harness::new();
    let material = h.material(Material::new(INSTANCED_VERTEX, FRAGMENT));
    h.mesh(instanced(Some(0)), material, -5.0);

    h.render();
    assert!(h.draws().is_empty());
}

// ============================================================================
// Programs
// ============================================================================

fn creates(h: &Harness) -> usize {
    h.count(|c| matches!(c, DriverCall::CreateProgram(_)))
}

fn deletes(h: &Harness) -> usize {
    h.count(|c| matches!(c, DriverCall::DeleteProgram(_)))
}

#[test]
fn define_changes_need_needs_update() {
    let mut h = Harness::new();
    let handle = h.material(Material::new(VERTEX, FRAGMENT));
    h.mesh(positions(3), handle, -5.0);
    h.render();
    assert_eq!(creates(&h), 1);

    h.assets.materials[handle].defines.set("USE_FOG", "1");
    h.render();
    assert_eq!(creates(&h), 1, "defines alone do not trigger a rebuild");

    h.assets.materials[handle].needs_update = true;
    h.render();
    assert_eq!(creates(&h), 2);
    assert_eq!(deletes(&h), 1);
    assert!(!h.assets.materials[handle].needs_update);
    assert_eq!(h.draws().len(), 3);
}

#[test]
fn rebuilt_program_with_a_recycled_name_is_bound_again() {
    let mut h = Harness::new();
    h.renderer.driver_mut().reuse_names = true;
    let handle = h.material(Material::new(VERTEX, FRAGMENT));
    h.mesh(positions(3), handle, -5.0);
    h.render();

    h.assets.materials[handle].defines.set("USE_FOG", "1");
    h.assets.materials[handle].needs_update = true;
    h.reset_calls();
    h.render();

    let calls = h.driver().calls();
    let deleted = calls.iter().find_map(|c| match c {
        DriverCall::DeleteProgram(id) => Some(*id),
        _ => None,
    });
    let created = calls.iter().find_map(|c| match c {
        DriverCall::CreateProgram(id) => Some(*id),
        _ => None,
    });
    assert!(deleted.is_some());
    assert_eq!(created, deleted, "the driver hands the freed name out again");

    let bound = calls
        .iter()
        .position(|c| *c == DriverCall::UseProgram(created))
        .expect("rebuilt program must be bound");
    let drawn = calls.iter().position(DriverCall::is_draw).unwrap();
    assert!(bound < drawn);
    assert_eq!(h.driver().uniform_uploads("projectionMatrix").len(), 1);
}

#[test]
fn needs_update_with_same_sources_keeps_the_program() {
    let mut h = Harness::new();
    let handle = h.material(Material::new(VERTEX, FRAGMENT));
    h.mesh(positions(3), handle, -5.0);
    h.render();

    h.assets.materials[handle].needs_update = true;
    h.render();

    assert_eq!(creates(&h), 1);
    assert_eq!(deletes(&h), 0);
    assert!(!h.assets.materials[handle].needs_update);
}

#[test]
fn link_failures_skip_only_their_objects() {
    let mut h = Harness::new();
    let broken = h.material(Material::new(VERTEX, "#error broken\nvoid main() {}"));
    let fine = h.material(Material::new(VERTEX, FRAGMENT));
    h.mesh(positions(3), broken, -5.0);
    h.mesh(positions(3), fine, -6.0);

    h.render();

    assert_eq!(h.draws().len(), 1);
    let program = h.renderer.material_program(broken).unwrap();
    assert!(!program.is_runnable());
    let diagnostics = program.diagnostics().unwrap();
    assert!(!diagnostics.runnable);
    assert!(diagnostics.fragment_log.contains("broken"));
    assert!(h.renderer.material_program(fine).unwrap().is_runnable());
}

#[test]
fn context_loss_rebuilds_without_deleting() {
    let mut h = Harness::new();
    let handle = h.material(Material::new(VERTEX, FRAGMENT));
    h.mesh(positions(3), handle, -5.0);
    h.render();
    let before = h.renderer.material_program(handle).unwrap().id();

    h.renderer.handle_context_lost();
    h.reset_calls();
    h.render();

    assert_eq!(creates(&h), 1);
    assert_eq!(deletes(&h), 0);
    assert_eq!(h.count(|c| matches!(c, DriverCall::DeleteBuffer(_))), 0);
    assert!(h.count(|c| matches!(c, DriverCall::CreateBuffer(_))) >= 1);
    assert_eq!(h.draws().len(), 1);

    let after = h.renderer.material_program(handle).unwrap();
    assert_ne!(after.id(), before);
    assert_eq!(after.usage(), 1);
    assert_eq!(h.renderer.info().programs, 1);
}

#[test]
fn compile_builds_programs_without_drawing() {
    let mut h = Harness::new();
    let a = h.material(Material::new(VERTEX, FRAGMENT));
    let b = h.material(Material::new(VERTEX, FRAGMENT).with_define("USE_MAP", "1"));
    let parent = h.mesh(positions(3), a, -5.0);
    let child = h.mesh(positions(3), b, -5.0);
    h.scene.attach(child, parent).unwrap();

    h.renderer.compile(&h.scene, &mut h.assets);

    assert!(h.draws().is_empty());
    assert_eq!(creates(&h), 2);
    assert!(h.renderer.material_program(a).is_some());
    assert!(h.renderer.material_program(b).is_some());
    assert_eq!(h.renderer.info().programs, 2);

    // Drawing afterwards reuses them.
    h.render();
    assert_eq!(creates(&h), 2);
}

// ============================================================================
// Uniforms & textures
// ============================================================================

#[test]
fn unchanged_material_uniforms_upload_once() {
    let mut h = Harness::new();
    let handle = h.material(Material::new(VERTEX, FRAGMENT).with_uniform("diffuse", Vec3::X));
    h.mesh(positions(3), handle, -5.0);

    h.render();
    h.render();
    assert_eq!(h.driver().uniform_uploads("diffuse").len(), 1);

    h.assets.materials[handle].set_uniform("diffuse", Vec3::Y);
    h.render();
    let uploads = h.driver().uniform_uploads("diffuse");
    assert_eq!(uploads.len(), 2);
    assert_eq!(
        uploads[1],
        &RecordedUniform::Floats {
            components: 3,
            data: vec![0.0, 1.0, 0.0]
        }
    );
}

#[test]
fn suppressed_uniforms_are_not_uploaded() {
    let mut h = Harness::new();
    let mut material = Material::new(VERTEX, FRAGMENT);
    material.insert_uniform(
        "diffuse",
        UniformEntry {
            value: Vec3::ONE.into(),
            needs_update: Some(false),
        },
    );
    let handle = h.material(material);
    h.mesh(positions(3), handle, -5.0);

    h.render();
    assert!(h.driver().uniform_uploads("diffuse").is_empty());
    assert_eq!(h.draws().len(), 1);
}

#[test]
fn textures_upload_once_and_bind_to_units() {
    let mut h = Harness::new();
    let texture = h
        .assets
        .textures
        .insert(Texture::from_rgba8(2, 2, vec![0; 16]));
    let handle = h.material(
        Material::new(VERTEX, "uniform sampler2D map; void main() {}")
            .with_uniform("map", UniformValue::Texture(Some(texture))),
    );
    h.mesh(positions(3), handle, -5.0);
    h.mesh(positions(3), handle, -6.0);

    h.render();
    h.render();

    assert_eq!(h.count(|c| matches!(c, DriverCall::CreateTexture(_))), 1);
    assert_eq!(
        h.count(|c| matches!(
            c,
            DriverCall::TexImage2D {
                width: 2,
                height: 2,
                has_data: true,
                ..
            }
        )),
        1
    );
    assert_eq!(
        h.driver().uniform_uploads("map"),
        vec![&RecordedUniform::Ints {
            components: 1,
            data: vec![0]
        }]
    );
    assert_eq!(h.renderer.info().memory.textures, 1);
}

/// Follows `ActiveTexture`/`BindTexture` through the recorded calls and returns,
/// for every `TexImage2D`, its width and the texture it landed in.
fn texture_image_targets(calls: &[DriverCall]) -> Vec<(u32, Option<TextureId>)> {
    let mut active = 0;
    let mut units: HashMap<u32, Option<TextureId>> = HashMap::new();
    let mut targets = Vec::new();
    for call in calls {
        match call {
            DriverCall::ActiveTexture(unit) => active = *unit,
            DriverCall::BindTexture(texture) => {
                units.insert(active, *texture);
            }
            DriverCall::TexImage2D { width, .. } => {
                targets.push((*width, units.get(&active).copied().flatten()));
            }
            _ => {}
        }
    }
    targets
}

#[test]
fn updated_texture_reuploads_into_its_own_unit() {
    let mut h = Harness::new();
    let first = h
        .assets
        .textures
        .insert(Texture::from_rgba8(1, 1, vec![0; 4]));
    let second = h
        .assets
        .textures
        .insert(Texture::from_rgba8(3, 3, vec![0; 36]));
    let handle = h.material(
        Material::new(VERTEX, "uniform sampler2D a; uniform sampler2D b; void main() {}")
            .with_uniform("a", UniformValue::Texture(Some(first)))
            .with_uniform("b", UniformValue::Texture(Some(second))),
    );
    h.mesh(positions(3), handle, -5.0);
    h.render();

    h.assets.textures[first].set_data(2, 2, vec![255; 16]);
    h.render();

    let targets = texture_image_targets(h.driver().calls());
    let target_of = |width| {
        targets
            .iter()
            .find(|(w, _)| *w == width)
            .map(|(_, texture)| *texture)
    };
    assert_eq!(targets.len(), 3);
    assert!(target_of(1).is_some());
    assert_ne!(target_of(1), target_of(3));
    assert_eq!(target_of(2), target_of(1));
}

// ============================================================================
// Frame state
// ============================================================================

#[test]
fn auto_clear_sets_the_clear_color_once() {
    let mut h = Harness::new();
    h.renderer.set_clear_color([0.1, 0.2, 0.3, 1.0]);
    h.render();
    h.render();

    assert_eq!(
        h.count(|c| matches!(c, DriverCall::ClearColor(rgba) if *rgba == [0.1, 0.2, 0.3, 1.0])),
        1
    );
    assert_eq!(
        h.count(|c| matches!(
            c,
            DriverCall::Clear(flags) if *flags == ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL
        )),
        2
    );
}

#[test]
fn disabled_auto_clear_issues_no_clear() {
    let mut h = Harness::new();
    h.renderer.settings_mut().auto_clear = false;
    h.render();
    assert_eq!(h.count(|c| matches!(c, DriverCall::Clear(_))), 0);
}

#[test]
fn depth_and_color_writes_are_restored_after_the_frame() {
    let mut h = Harness::new();
    let mut material = Material::new(VERTEX, FRAGMENT);
    material.depth_test = false;
    material.depth_write = false;
    material.color_write = false;
    let handle = h.material(material);
    h.mesh(positions(3), handle, -5.0);

    h.render();

    let calls = h.driver().calls();
    let last_depth_test = calls.iter().rev().find_map(|c| match c {
        DriverCall::Enable(Capability::DepthTest) => Some(true),
        DriverCall::Disable(Capability::DepthTest) => Some(false),
        _ => None,
    });
    let last_depth_mask = calls.iter().rev().find_map(|c| match c {
        DriverCall::DepthMask(on) => Some(*on),
        _ => None,
    });
    let last_color_mask = calls.iter().rev().find_map(|c| match c {
        DriverCall::ColorMask(on) => Some(*on),
        _ => None,
    });
    assert_eq!(last_depth_test, Some(true));
    assert_eq!(last_depth_mask, Some(true));
    assert_eq!(last_color_mask, Some(true));
    assert_eq!(h.draws().len(), 1);
}

#[test]
fn pixel_ratio_scales_the_default_viewport() {
    let mut h = Harness::new();
    h.renderer.set_size(200, 100);
    h.renderer.set_pixel_ratio(2.0);
    h.render();

    let last_viewport = h.driver().calls().iter().rev().find_map(|c| match c {
        DriverCall::Viewport(rect) => Some(*rect),
        _ => None,
    });
    assert_eq!(last_viewport, Some(Rect::new(0, 0, 400, 200)));
}

// ============================================================================
// Render targets & read-back
// ============================================================================

#[test]
fn read_back_validates_before_reaching_the_driver() {
    let mut h = Harness::new();
    let target = h.assets.add_render_target(RenderTarget::new(4, 4));
    let mut out = vec![0u8; 64];

    let err = h
        .renderer
        .read_render_target_pixels(&h.assets, target, 0, 0, 4, 4, &mut out)
        .unwrap_err();
    assert!(matches!(err, MythGlError::RenderTargetNotInitialized));

    h.renderer.set_render_target(Some(target), &h.assets);
    h.render();
    h.renderer.set_render_target(None, &h.assets);

    let err = h
        .renderer
        .read_render_target_pixels(&h.assets, target, 2, 2, 4, 4, &mut out)
        .unwrap_err();
    assert!(matches!(err, MythGlError::ReadOutOfRange { .. }));

    let mut small = vec![0u8; 10];
    let err = h
        .renderer
        .read_render_target_pixels(&h.assets, target, 0, 0, 4, 4, &mut small)
        .unwrap_err();
    assert!(matches!(
        err,
        MythGlError::ReadBufferTooSmall {
            needed: 64,
            actual: 10
        }
    ));
    assert_eq!(h.count(|c| matches!(c, DriverCall::ReadPixels(_))), 0);
}

#[test]
fn read_back_restores_the_previous_framebuffer() {
    let mut h = Harness::new();
    h.renderer.driver_mut().read_fill = 0x7f;
    let target = h.assets.add_render_target(RenderTarget::new(4, 4));
    h.renderer.set_render_target(Some(target), &h.assets);
    h.renderer.set_render_target(None, &h.assets);
    h.reset_calls();

    let mut out = vec![0u8; 80];
    h.renderer
        .read_render_target_pixels(&h.assets, target, 1, 1, 2, 2, &mut out)
        .unwrap();

    assert!(out[..16].iter().all(|&b| b == 0x7f));
    assert!(out[16..].iter().all(|&b| b == 0));
    assert_eq!(
        h.count(|c| matches!(c, DriverCall::ReadPixels(rect) if *rect == Rect::new(1, 1, 2, 2))),
        1
    );
    let binds: Vec<bool> = h
        .driver()
        .calls()
        .iter()
        .filter_map(|c| match c {
            DriverCall::BindFramebuffer(fb) => Some(fb.is_some()),
            _ => None,
        })
        .collect();
    assert_eq!(binds, vec![true, false]);
}

#[test]
fn incomplete_framebuffers_are_not_read() {
    let mut h = Harness::new();
    let target = h.assets.add_render_target(RenderTarget::new(4, 4));
    h.renderer.set_render_target(Some(target), &h.assets);
    h.renderer.driver_mut().framebuffer_complete = false;

    let mut out = vec![0u8; 64];
    let err = h
        .renderer
        .read_render_target_pixels(&h.assets, target, 0, 0, 4, 4, &mut out)
        .unwrap_err();
    assert!(matches!(err, MythGlError::FramebufferIncomplete));
    assert_eq!(h.count(|c| matches!(c, DriverCall::ReadPixels(_))), 0);
}

#[test]
fn render_target_uses_its_own_viewport() {
    let mut h = Harness::new();
    let target = h.assets.add_render_target(RenderTarget::new(64, 32));
    h.renderer.set_render_target(Some(target), &h.assets);
    h.render();

    assert_eq!(h.renderer.render_target(), Some(target));
    assert_eq!(h.count(|c| matches!(c, DriverCall::CreateFramebuffer(_))), 1);
    assert!(h.count(|c| matches!(c, DriverCall::Viewport(rect) if *rect == Rect::new(0, 0, 64, 32))) >= 1);

    h.renderer.settings_mut().reset_render_target_after_render = true;
    h.render();
    assert_eq!(h.renderer.render_target(), None);
}

// ============================================================================
// Disposal
// ============================================================================

#[test]
fn disposal_releases_driver_objects() {
    let mut h = Harness::new();
    let material = h.material(Material::new(VERTEX, FRAGMENT));
    let node = h.mesh(positions(3), material, -5.0);
    let geometry = h.scene.get_node(node).unwrap().as_mesh().unwrap().geometry;
    h.render();
    assert_eq!(h.renderer.info().memory.geometries, 1);

    assert!(h.renderer.dispose_material(material));
    assert!(!h.renderer.dispose_material(material));
    assert_eq!(deletes(&h), 1);
    assert_eq!(h.renderer.info().programs, 0);

    assert!(h.renderer.dispose_geometry(geometry));
    assert!(!h.renderer.dispose_geometry(geometry));
    assert!(h.count(|c| matches!(c, DriverCall::DeleteBuffer(_))) >= 1);
    assert_eq!(h.renderer.info().memory.geometries, 0);

    // Still in the asset store: the next frame re-creates everything.
    h.render();
    assert_eq!(creates(&h), 2);
    assert_eq!(h.draws().len(), 2);
}

#[test]
fn disposing_a_render_target_deletes_its_framebuffer() {
    let mut h = Harness::new();
    let target = h.assets.add_render_target(RenderTarget::new(8, 8));
    h.renderer.set_render_target(Some(target), &h.assets);
    assert_eq!(h.driver().live_framebuffers(), 1);

    assert!(h.renderer.dispose_render_target(target, &h.assets));
    assert_eq!(h.driver().live_framebuffers(), 0);
    assert_eq!(h.renderer.render_target(), None);
    assert!(h.assets.remove_render_target(target).is_some());
}
