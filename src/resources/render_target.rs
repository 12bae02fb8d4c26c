//! Offscreen Render Targets
//!
//! A [`RenderTarget`] describes a framebuffer with one color attachment and an
//! optional depth buffer. The renderer creates the driver objects the first
//! time the target is bound.

use crate::assets::TextureHandle;
use crate::renderer::driver::{ColorFormat, Rect};

#[derive(Debug, Clone)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
    pub depth_buffer: bool,
    pub viewport: Rect,
    pub scissor: Rect,
    pub scissor_test: bool,
    pub(crate) texture: Option<TextureHandle>,
}

impl RenderTarget {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let full = Rect::new(0, 0, width, height);
        Self {
            width,
            height,
            format: ColorFormat::Rgba8,
            depth_buffer: true,
            viewport: full,
            scissor: full,
            scissor_test: false,
            texture: None,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: ColorFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_depth_buffer(mut self, depth_buffer: bool) -> Self {
        self.depth_buffer = depth_buffer;
        self
    }

    /// Texture exposing the color attachment to materials, once the target
    /// has been inserted into an [`AssetStore`](crate::assets::AssetStore).
    #[inline]
    #[must_use]
    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    /// Whether `(x, y, width, height)` lies fully inside the target.
    #[must_use]
    pub fn contains_rect(&self, x: i32, y: i32, width: u32, height: u32) -> bool {
        x >= 0
            && y >= 0
            && u64::from(x as u32) + u64::from(width) <= u64::from(self.width)
            && u64::from(y as u32) + u64::from(height) <= u64::from(self.height)
    }
}
