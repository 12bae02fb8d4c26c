//! Renderer Settings
//!
//! Configuration consumed by [`Renderer::new`](crate::renderer::Renderer::new)
//! and read again at the start of every frame, so fields can be changed at
//! runtime through [`Renderer::settings_mut`](crate::renderer::Renderer::settings_mut).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_gl::renderer::RendererSettings;
//!
//! let settings = RendererSettings {
//!     width: 1280,
//!     height: 720,
//!     premultiplied_alpha: false,
//!     ..Default::default()
//! };
//!
//! // Or from a config file; missing fields keep their defaults.
//! let settings = RendererSettings::from_json(r#"{ "sort_objects": false }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Global renderer configuration.
///
/// # Fields
///
/// | Field                              | Description                                  | Default        |
/// |------------------------------------|----------------------------------------------|----------------|
/// | `sort_objects`                     | Depth-sort the opaque/transparent buckets    | `true`         |
/// | `auto_clear`                       | Clear the target before drawing a frame      | `true`         |
/// | `auto_clear_color`                 | ...the color buffer                          | `true`         |
/// | `auto_clear_depth`                 | ...the depth buffer                          | `true`         |
/// | `auto_clear_stencil`               | ...the stencil buffer                        | `true`         |
/// | `clear_color`                      | RGBA clear color                             | `[0, 0, 0, 0]` |
/// | `premultiplied_alpha`              | Blend presets assume premultiplied output    | `true`         |
/// | `pixel_ratio`                      | Drawing-buffer pixels per logical pixel      | `1.0`          |
/// | `width` / `height`                 | Logical size of the default surface          | `300` x `150`  |
/// | `max_texture_units`                | Sampler units available per draw             | `16`           |
/// | `reset_render_target_after_render` | Rebind the default surface after `render()`  | `false`        |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    // === Ordering ===
    pub sort_objects: bool,

    // === Clearing ===
    pub auto_clear: bool,
    pub auto_clear_color: bool,
    pub auto_clear_depth: bool,
    pub auto_clear_stencil: bool,
    pub clear_color: [f32; 4],

    // === Output ===
    /// Resolves the blending presets for premultiplied-alpha output, on top
    /// of any material that sets its own flag.
    pub premultiplied_alpha: bool,
    pub pixel_ratio: f32,
    pub width: u32,
    pub height: u32,

    // === Limits ===
    /// Units beyond this count are still handed out, with a warning.
    pub max_texture_units: u32,

    /// When set, the default surface is bound again once a frame rendered
    /// into an offscreen target has finished.
    pub reset_render_target_after_render: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            sort_objects: true,
            auto_clear: true,
            auto_clear_color: true,
            auto_clear_depth: true,
            auto_clear_stencil: true,
            clear_color: [0.0, 0.0, 0.0, 0.0],
            premultiplied_alpha: true,
            pixel_ratio: 1.0,
            width: 300,
            height: 150,
            max_texture_units: 16,
            reset_render_target_after_render: false,
        }
    }
}

impl RendererSettings {
    /// Parses settings from JSON. Absent fields take their default value.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Size of the default drawing buffer in device pixels.
    #[inline]
    #[must_use]
    pub fn drawing_buffer_size(&self) -> (u32, u32) {
        (
            (self.width as f32 * self.pixel_ratio).floor() as u32,
            (self.height as f32 * self.pixel_ratio).floor() as u32,
        )
    }
}
