//! GPU Geometry
//!
//! Mirrors [`Geometry`] attributes and indices into driver buffers. Buffers
//! are uploaded on first use and re-uploaded when a version counter moves; a
//! layout change (attribute or index added, replaced or removed) re-uploads
//! everything and tells the caller that vertex bindings must be redone.

use log::debug;
use rustc_hash::FxHashMap;
use slotmap::SecondaryMap;

use crate::assets::GeometryHandle;
use crate::renderer::driver::{BufferId, BufferTarget, GraphicsDriver, IndexType};
use crate::renderer::state::StateCache;
use crate::resources::{Geometry, IndexData};

#[derive(Debug, Clone, Copy)]
struct GpuBuffer {
    buffer: BufferId,
    version: u64,
}

/// Line-list index buffer derived from the triangle index.
#[derive(Debug, Clone, Copy)]
pub struct WireframeIndex {
    pub buffer: BufferId,
    pub index_type: IndexType,
    pub count: u32,
    source_version: (u64, u64),
}

#[derive(Debug, Default)]
struct GpuGeometry {
    attributes: FxHashMap<String, GpuBuffer>,
    index: Option<(GpuBuffer, IndexType)>,
    wireframe: Option<WireframeIndex>,
    layout_version: Option<u64>,
}

#[derive(Debug, Default)]
pub struct GeometryManager {
    geometries: SecondaryMap<GeometryHandle, GpuGeometry>,
}

fn upload<D: GraphicsDriver>(
    driver: &mut D,
    state: &mut StateCache,
    target: BufferTarget,
    existing: Option<BufferId>,
    bytes: &[u8],
) -> BufferId {
    let buffer = existing.unwrap_or_else(|| driver.create_buffer());
    state.bind_buffer(driver, target, Some(buffer));
    driver.buffer_data(target, bytes);
    buffer
}

impl GeometryManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Brings the driver buffers of `handle` up to date.
    ///
    /// Returns `true` if the layout changed since the last call, in which
    /// case cached vertex bindings are invalid.
    pub fn update<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        handle: GeometryHandle,
        geometry: &Geometry,
    ) -> bool {
        if !self.geometries.contains_key(handle) {
            self.geometries.insert(handle, GpuGeometry::default());
        }
        let Some(gpu) = self.geometries.get_mut(handle) else {
            return false;
        };

        let layout_changed = gpu.layout_version != Some(geometry.layout_version());
        if layout_changed {
            let stale: Vec<String> = gpu
                .attributes
                .keys()
                .filter(|name| geometry.attribute(name).is_none())
                .cloned()
                .collect();
            for name in stale {
                if let Some(old) = gpu.attributes.remove(&name) {
                    state.forget_buffer(old.buffer);
                    driver.delete_buffer(old.buffer);
                }
            }
        }

        for (name, attribute) in geometry.attributes() {
            let existing = gpu.attributes.get(name).copied();
            if let Some(current) = existing
                && !layout_changed
                && current.version == attribute.version()
            {
                continue;
            }
            let buffer = upload(
                driver,
                state,
                BufferTarget::Array,
                existing.map(|b| b.buffer),
                &attribute.data().to_bytes(),
            );
            gpu.attributes.insert(
                name.clone(),
                GpuBuffer {
                    buffer,
                    version: attribute.version(),
                },
            );
        }

        match geometry.index() {
            Some(index) => {
                let existing = gpu.index.map(|(b, _)| b);
                let fresh = existing.is_some_and(|b| !layout_changed && b.version == index.version());
                if !fresh {
                    let buffer = upload(
                        driver,
                        state,
                        BufferTarget::ElementArray,
                        existing.map(|b| b.buffer),
                        &index.data().to_bytes(),
                    );
                    let index_type = match index.data() {
                        IndexData::U16(_) => IndexType::U16,
                        IndexData::U32(_) => IndexType::U32,
                    };
                    gpu.index = Some((
                        GpuBuffer {
                            buffer,
                            version: index.version(),
                        },
                        index_type,
                    ));
                }
            }
            None => {
                if let Some((old, _)) = gpu.index.take() {
                    state.forget_buffer(old.buffer);
                    driver.delete_buffer(old.buffer);
                }
            }
        }

        gpu.layout_version = Some(geometry.layout_version());
        layout_changed
    }

    /// Returns the line index for drawing `geometry` as wireframe, building
    /// it from the triangle index (or the implicit triangle list) when the
    /// source changed.
    pub fn wireframe_index<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        handle: GeometryHandle,
        geometry: &Geometry,
    ) -> Option<WireframeIndex> {
        let source_version = match geometry.index() {
            Some(index) => (geometry.layout_version(), index.version()),
            None => (
                geometry.layout_version(),
                geometry.attribute("position")?.version(),
            ),
        };

        let gpu = self.geometries.get_mut(handle)?;
        if let Some(wireframe) = gpu.wireframe
            && wireframe.source_version == source_version
        {
            return Some(wireframe);
        }

        let lines = wireframe_lines(geometry);
        let max = lines.iter().copied().max().unwrap_or(0);
        let (data, index_type) = if max > u32::from(u16::MAX) {
            (IndexData::U32(lines), IndexType::U32)
        } else {
            (
                IndexData::U16(lines.iter().map(|&i| i as u16).collect()),
                IndexType::U16,
            )
        };

        let count = data.len() as u32;
        let buffer = upload(
            driver,
            state,
            BufferTarget::ElementArray,
            gpu.wireframe.map(|w| w.buffer),
            &data.to_bytes(),
        );
        debug!("Built wireframe index with {count} entries");

        let wireframe = WireframeIndex {
            buffer,
            index_type,
            count,
            source_version,
        };
        gpu.wireframe = Some(wireframe);
        Some(wireframe)
    }

    #[must_use]
    pub fn attribute_buffer(&self, handle: GeometryHandle, name: &str) -> Option<BufferId> {
        self.geometries
            .get(handle)?
            .attributes
            .get(name)
            .map(|b| b.buffer)
    }

    #[must_use]
    pub fn index_buffer(&self, handle: GeometryHandle) -> Option<(BufferId, IndexType)> {
        self.geometries
            .get(handle)?
            .index
            .map(|(b, index_type)| (b.buffer, index_type))
    }

    /// Deletes every buffer of `handle`. Returns `false` if nothing was
    /// uploaded for it.
    pub fn dispose<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        handle: GeometryHandle,
    ) -> bool {
        let Some(gpu) = self.geometries.remove(handle) else {
            return false;
        };
        let buffers = gpu
            .attributes
            .values()
            .map(|b| b.buffer)
            .chain(gpu.index.map(|(b, _)| b.buffer))
            .chain(gpu.wireframe.map(|w| w.buffer));
        for buffer in buffers {
            state.forget_buffer(buffer);
            driver.delete_buffer(buffer);
        }
        true
    }

    /// Drops all bookkeeping without driver calls (the context is gone).
    pub fn forget_all(&mut self) {
        self.geometries.clear();
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }
}

/// Expands triangles into their three edges: `a b c` -> `a b b c c a`.
fn wireframe_lines(geometry: &Geometry) -> Vec<u32> {
    let triangles: Vec<u32> = match geometry.index() {
        Some(index) => (0..index.data().len())
            .filter_map(|i| index.data().get(i))
            .collect(),
        None => {
            let count = geometry.attribute("position").map_or(0, |p| p.count());
            (0..count - count % 3).collect()
        }
    };

    let mut lines = Vec::with_capacity(triangles.len() * 2);
    for tri in triangles.chunks_exact(3) {
        let (a, b, c) = (tri[0], tri[1], tri[2]);
        lines.extend_from_slice(&[a, b, b, c, c, a]);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::driver::{DriverCall, RecordingDriver};
    use crate::resources::{Attribute, AttributeData};
    use slotmap::SlotMap;

    fn triangle() -> Geometry {
        Geometry::new().with_attribute("position", Attribute::f32(vec![0.0; 9], 3))
    }

    fn uploads(driver: &RecordingDriver) -> usize {
        driver.count(|c| matches!(c, DriverCall::BufferData { .. }))
    }

    #[test]
    fn uploads_once_until_version_moves() {
        let mut driver = RecordingDriver::new();
        let mut state = StateCache::new();
        let mut keys: SlotMap<GeometryHandle, ()> = SlotMap::with_key();
        let handle = keys.insert(());
        let mut geometry = triangle();
        let mut manager = GeometryManager::new();

        assert!(manager.update(&mut driver, &mut state, handle, &geometry));
        assert!(!manager.update(&mut driver, &mut state, handle, &geometry));
        assert_eq!(uploads(&driver), 1);

        if let Some(position) = geometry.attribute_mut("position") {
            position.set_data(AttributeData::F32(vec![1.0; 9]));
        }
        assert!(!manager.update(&mut driver, &mut state, handle, &geometry));
        assert_eq!(uploads(&driver), 2);
        assert_eq!(driver.live_buffers(), 1);

        geometry.remove_attribute("position");
        assert!(manager.update(&mut driver, &mut state, handle, &geometry));
        assert_eq!(driver.live_buffers(), 0);
    }

    #[test]
    fn wireframe_expands_triangle_edges() {
        let geometry = Geometry::new()
            .with_attribute("position", Attribute::f32(vec![0.0; 12], 3))
            .with_index(IndexData::U16(vec![0, 1, 2, 2, 1, 3]));
        assert_eq!(
            wireframe_lines(&geometry),
            vec![0, 1, 1, 2, 2, 0, 2, 1, 1, 3, 3, 2]
        );

        // Non-indexed: trailing vertices that do not form a triangle are ignored.
        let loose = Geometry::new().with_attribute("position", Attribute::f32(vec![0.0; 15], 3));
        assert_eq!(wireframe_lines(&loose), vec![0, 1, 1, 2, 2, 0]);
    }

    #[test]
    fn wireframe_index_is_cached_and_widened() {
        let mut driver = RecordingDriver::new();
        let mut state = StateCache::new();
        let mut keys: SlotMap<GeometryHandle, ()> = SlotMap::with_key();
        let handle = keys.insert(());
        let mut manager = GeometryManager::new();

        let geometry = Geometry::new()
            .with_attribute("position", Attribute::f32(vec![0.0; 3 * 70_000], 3))
            .with_index(IndexData::U32(vec![0, 1, 69_999]));
        manager.update(&mut driver, &mut state, handle, &geometry);

        let first = manager
            .wireframe_index(&mut driver, &mut state, handle, &geometry)
            .unwrap();
        assert_eq!(first.index_type, IndexType::U32);
        assert_eq!(first.count, 6);

        let before = uploads(&driver);
        let again = manager
            .wireframe_index(&mut driver, &mut state, handle, &geometry)
            .unwrap();
        assert_eq!(again.buffer, first.buffer);
        assert_eq!(uploads(&driver), before);
    }

    #[test]
    fn dispose_deletes_all_buffers() {
        let mut driver = RecordingDriver::new();
        let mut state = StateCache::new();
        let mut keys: SlotMap<GeometryHandle, ()> = SlotMap::with_key();
        let handle = keys.insert(());
        let mut manager = GeometryManager::new();
        let geometry = triangle().with_index(IndexData::U16(vec![0, 1, 2]));

        manager.update(&mut driver, &mut state, handle, &geometry);
        manager.wireframe_index(&mut driver, &mut state, handle, &geometry);
        assert_eq!(driver.live_buffers(), 3);

        assert!(manager.dispose(&mut driver, &mut state, handle));
        assert_eq!(driver.live_buffers(), 0);
        assert!(!manager.dispose(&mut driver, &mut state, handle));
    }
}
