//! Frame benchmarks against the recording driver.
//!
//! Measures CPU-side frame cost: transform propagation, render-list
//! construction and full `render` calls over a grid of a few hundred meshes.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use glam::Vec3;
use myth_gl::prelude::*;
use myth_gl::renderer::{RenderList, RenderListBuilder};

const VERTEX: &str = "
    attribute vec3 position;
    attribute vec3 normal;
    uniform mat4 modelViewMatrix;
    uniform mat4 projectionMatrix;
    uniform mat3 normalMatrix;
    void main() {}
";

const FRAGMENT: &str = "uniform vec3 diffuse; uniform float opacity; void main() {}";

const GRID: i32 = 20;

struct World {
    scene: Scene,
    assets: AssetStore,
    camera: NodeHandle,
    pivot: NodeHandle,
}

fn cube() -> Geometry {
    let corners = [
        Vec3::new(-0.5, -0.5, -0.5),
        Vec3::new(0.5, -0.5, -0.5),
        Vec3::new(0.5, 0.5, -0.5),
        Vec3::new(-0.5, 0.5, -0.5),
        Vec3::new(-0.5, -0.5, 0.5),
        Vec3::new(0.5, -0.5, 0.5),
        Vec3::new(0.5, 0.5, 0.5),
        Vec3::new(-0.5, 0.5, 0.5),
    ];
    let normals: Vec<Vec3> = corners.iter().map(|c| c.normalize()).collect();
    let index = vec![
        0, 2, 1, 0, 3, 2, 4, 5, 6, 4, 6, 7, 0, 1, 5, 0, 5, 4, 2, 3, 7, 2, 7, 6, 1, 2, 6, 1, 6, 5,
        0, 4, 7, 0, 7, 3,
    ];

    let mut geometry = Geometry::new()
        .with_attribute("position", Attribute::vec3(&corners))
        .with_attribute("normal", Attribute::vec3(&normals))
        .with_index(IndexData::U16(index));
    geometry.bounding_sphere = Some(myth_gl::resources::BoundingSphere::new(Vec3::ZERO, 0.87));
    geometry
}

fn build_world() -> World {
    let mut assets = AssetStore::new();
    let geometry = assets.geometries.insert(cube());

    let palette: Vec<MaterialHandle> = (0..4)
        .map(|i| {
            let tint = Vec3::new(i as f32 / 4.0, 0.5, 1.0 - i as f32 / 4.0);
            let material = Material::new(VERTEX, FRAGMENT)
                .with_uniform("diffuse", tint)
                .with_uniform("opacity", if i % 2 == 0 { 1.0 } else { 0.5 })
                .with_transparent(i % 2 == 1);
            assets.materials.insert(material)
        })
        .collect();

    let mut scene = Scene::new();
    let pivot = scene.add_node(Node::group("pivot"));

    let mut k = 0usize;
    for x in -GRID / 2..GRID / 2 {
        for y in -GRID / 2..GRID / 2 {
            let material = palette[k % palette.len()];
            k += 1;
            let mut node = Node::mesh(format!("cube_{x}_{y}"), Mesh::new(geometry, material));
            node.transform.position = Vec3::new(x as f32 * 1.5, y as f32 * 1.5, -40.0);
            let _ = scene.add_to_parent(node, pivot);
        }
    }

    let camera = scene.add_camera(Camera::new_perspective(60.0, 16.0 / 9.0, 0.1, 200.0));

    World {
        scene,
        assets,
        camera,
        pivot,
    }
}

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("Frame");

    group.bench_function("propagate transforms (400 meshes)", |b| {
        let mut world = build_world();
        let mut angle = 0.0f32;
        b.iter(|| {
            angle += 0.01;
            if let Some(pivot) = world.scene.get_node_mut(world.pivot) {
                pivot.transform.set_rotation_euler(0.0, 0.0, angle);
            }
            world.scene.update_matrix_world();
            black_box(&world.scene);
        });
    });

    group.bench_function("build render list (400 meshes)", |b| {
        let mut world = build_world();
        world.scene.update_matrix_world();
        let mut list = RenderList::new();
        let mut builder = RenderListBuilder::new();
        b.iter(|| {
            let Some(camera) = world.scene.camera(world.camera) else {
                return;
            };
            builder.build(&mut list, &world.scene, camera, &world.assets, true);
            black_box(list.len());
        });
    });

    group.bench_function("render (400 meshes)", |b| {
        let mut world = build_world();
        let mut renderer = Renderer::new(RecordingDriver::new(), RendererSettings::default());
        let mut angle = 0.0f32;
        b.iter(|| {
            angle += 0.01;
            if let Some(pivot) = world.scene.get_node_mut(world.pivot) {
                pivot.transform.set_rotation_euler(0.0, 0.0, angle);
            }
            renderer.render(&mut world.scene, world.camera, &mut world.assets);
            renderer.driver_mut().clear_calls();
            black_box(renderer.info().render.calls);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_frame);
criterion_main!(benches);
