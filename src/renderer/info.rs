//! Frame Statistics
//!
//! [`RenderInfo`] counts what the last frame submitted. Per-frame counters
//! are reset at the start of every [`render`](crate::renderer::Renderer::render);
//! memory counters reflect the live driver objects after it.

use crate::renderer::driver::PrimitiveMode;

/// Per-frame draw counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Draw calls issued.
    pub calls: u32,
    pub vertices: u64,
    pub triangles: u64,
    pub lines: u64,
    pub points: u64,
}

/// Live driver-object counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub geometries: usize,
    pub textures: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderInfo {
    /// Frames rendered since the renderer was created.
    pub frame: u64,
    pub render: RenderStats,
    pub memory: MemoryStats,
    /// Programs currently held by the program cache.
    pub programs: usize,
}

impl RenderInfo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new frame.
    pub(crate) fn begin_frame(&mut self) {
        self.frame += 1;
        self.render = RenderStats::default();
    }

    /// Records one draw of `count` vertices in `mode`, `instances` times.
    pub(crate) fn record_draw(&mut self, mode: PrimitiveMode, count: u32, instances: u32) {
        let count = u64::from(count);
        let instances = u64::from(instances);
        let stats = &mut self.render;

        stats.calls += 1;
        stats.vertices += count * instances;

        let primitives = match mode {
            PrimitiveMode::Triangles => count / 3,
            PrimitiveMode::TriangleStrip | PrimitiveMode::TriangleFan => count.saturating_sub(2),
            PrimitiveMode::Lines => count / 2,
            PrimitiveMode::LineStrip => count.saturating_sub(1),
            PrimitiveMode::LineLoop | PrimitiveMode::Points => count,
        } * instances;

        match mode {
            PrimitiveMode::Triangles | PrimitiveMode::TriangleStrip | PrimitiveMode::TriangleFan => {
                stats.triangles += primitives;
            }
            PrimitiveMode::Lines | PrimitiveMode::LineStrip | PrimitiveMode::LineLoop => {
                stats.lines += primitives;
            }
            PrimitiveMode::Points => stats.points += primitives,
        }
    }
}
