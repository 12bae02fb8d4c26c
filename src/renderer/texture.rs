//! GPU Textures & Framebuffers
//!
//! [`TextureManager`] uploads [`Texture`] pixels lazily, re-uploading when the
//! texture's version moves, and binds a 1x1 white fallback for empty or
//! incomplete sampler slots. [`FramebufferManager`] creates the framebuffer,
//! color texture and optional depth renderbuffer of a [`RenderTarget`] the
//! first time it is bound, and registers the color texture so materials can
//! sample it.

use log::{debug, warn};
use slotmap::{SecondaryMap, SlotMap};

use crate::assets::{RenderTargetHandle, TextureHandle};
use crate::renderer::driver::{
    ColorFormat, FramebufferId, GraphicsDriver, RenderbufferId, TextureId,
};
use crate::renderer::state::StateCache;
use crate::resources::{RenderTarget, SamplerParams, Texture};

#[derive(Debug, Clone, Copy)]
struct GpuTexture {
    texture: TextureId,
    version: u64,
}

#[derive(Debug, Default)]
pub struct TextureManager {
    textures: SecondaryMap<TextureHandle, GpuTexture>,
    fallback: Option<TextureId>,
}

impl TextureManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handle` to `unit`, uploading it first if needed. Missing,
    /// empty or incomplete textures bind the fallback instead.
    pub fn bind<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        textures: &SlotMap<TextureHandle, Texture>,
        handle: Option<TextureHandle>,
        unit: u32,
    ) {
        let id = match handle.and_then(|h| textures.get(h).map(|t| (h, t))) {
            Some((handle, texture)) if texture.is_attachment() => match self.textures.get(handle) {
                Some(gpu) => gpu.texture,
                None => self.fallback(driver, state, unit),
            },
            Some((handle, texture)) if texture.is_complete() => {
                self.upload(driver, state, handle, texture, unit)
            }
            Some(_) => {
                debug!("Texture not ready; binding fallback on unit {unit}");
                self.fallback(driver, state, unit)
            }
            None => self.fallback(driver, state, unit),
        };
        state.bind_texture(driver, unit, Some(id));
    }

    fn upload<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        handle: TextureHandle,
        texture: &Texture,
        unit: u32,
    ) -> TextureId {
        if let Some(gpu) = self.textures.get(handle)
            && gpu.version == texture.version()
        {
            return gpu.texture;
        }

        let id = match self.textures.get(handle) {
            Some(gpu) => gpu.texture,
            None => driver.create_texture(),
        };
        state.select_texture(driver, unit, Some(id));

        let pixels = texture.data().unwrap_or_default();
        if texture.flip_y {
            let flipped = flip_rows(pixels, texture.width as usize * 4);
            driver.tex_image_2d(texture.width, texture.height, ColorFormat::Rgba8, Some(&flipped));
        } else {
            driver.tex_image_2d(texture.width, texture.height, ColorFormat::Rgba8, Some(pixels));
        }
        driver.tex_parameters(texture.sampler);

        self.textures.insert(
            handle,
            GpuTexture {
                texture: id,
                version: texture.version(),
            },
        );
        id
    }

    fn fallback<D: GraphicsDriver>(&mut self, driver: &mut D, state: &mut StateCache, unit: u32) -> TextureId {
        if let Some(id) = self.fallback {
            return id;
        }
        let id = driver.create_texture();
        state.select_texture(driver, unit, Some(id));
        driver.tex_image_2d(1, 1, ColorFormat::Rgba8, Some(&[255, 255, 255, 255]));
        driver.tex_parameters(SamplerParams::default());
        self.fallback = Some(id);
        id
    }

    /// Registers the driver texture backing a render target attachment.
    pub fn register_attachment(&mut self, handle: TextureHandle, texture: TextureId) {
        self.textures.insert(
            handle,
            GpuTexture {
                texture,
                version: 0,
            },
        );
    }

    #[must_use]
    pub fn get(&self, handle: TextureHandle) -> Option<TextureId> {
        self.textures.get(handle).map(|t| t.texture)
    }

    /// Deletes the driver texture of `handle`.
    pub fn dispose<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        handle: TextureHandle,
    ) -> bool {
        let Some(gpu) = self.textures.remove(handle) else {
            return false;
        };
        state.forget_texture(gpu.texture);
        driver.delete_texture(gpu.texture);
        true
    }

    /// Drops the record of an attachment whose texture is owned elsewhere.
    pub(crate) fn unregister(&mut self, handle: TextureHandle) {
        self.textures.remove(handle);
    }

    pub fn forget_all(&mut self) {
        self.textures.clear();
        self.fallback = None;
    }

    /// Uploaded textures, the fallback excluded.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

fn flip_rows(pixels: &[u8], row_bytes: usize) -> Vec<u8> {
    if row_bytes == 0 {
        return pixels.to_vec();
    }
    pixels
        .chunks(row_bytes)
        .rev()
        .flatten()
        .copied()
        .collect()
}

// ============================================================================
// Framebuffers
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct GpuRenderTarget {
    framebuffer: FramebufferId,
    color: TextureId,
    depth: Option<RenderbufferId>,
    width: u32,
    height: u32,
    format: ColorFormat,
    depth_buffer: bool,
    complete: bool,
}

#[derive(Debug, Default)]
pub struct FramebufferManager {
    targets: SecondaryMap<RenderTargetHandle, GpuRenderTarget>,
}

impl FramebufferManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the framebuffer of `handle`, (re)creating it when missing or
    /// when the target's size, format or depth setting changed.
    ///
    /// Leaves the framebuffer bound.
    pub fn setup<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        textures: &mut TextureManager,
        handle: RenderTargetHandle,
        target: &RenderTarget,
    ) -> FramebufferId {
        if let Some(gpu) = self.targets.get(handle)
            && gpu.width == target.width
            && gpu.height == target.height
            && gpu.format == target.format
            && gpu.depth_buffer == target.depth_buffer
        {
            return gpu.framebuffer;
        }

        if let Some(old) = self.targets.remove(handle) {
            Self::delete(driver, state, old);
        }

        let color = driver.create_texture();
        state.select_texture(driver, 0, Some(color));
        driver.tex_image_2d(target.width, target.height, target.format, None);
        driver.tex_parameters(SamplerParams::default());

        let framebuffer = driver.create_framebuffer();
        state.bind_framebuffer(driver, Some(framebuffer));
        driver.framebuffer_texture(color);

        let depth = if target.depth_buffer {
            let renderbuffer = driver.create_renderbuffer();
            driver.renderbuffer_depth_storage(renderbuffer, target.width, target.height);
            driver.framebuffer_depth_renderbuffer(renderbuffer);
            Some(renderbuffer)
        } else {
            None
        };

        let complete = driver.check_framebuffer_complete();
        if !complete {
            warn!(
                "Framebuffer for {}x{} {:?} target is incomplete",
                target.width, target.height, target.format
            );
        }

        if let Some(texture) = target.texture {
            textures.register_attachment(texture, color);
        }

        self.targets.insert(
            handle,
            GpuRenderTarget {
                framebuffer,
                color,
                depth,
                width: target.width,
                height: target.height,
                format: target.format,
                depth_buffer: target.depth_buffer,
                complete,
            },
        );
        framebuffer
    }

    #[must_use]
    pub fn framebuffer(&self, handle: RenderTargetHandle) -> Option<FramebufferId> {
        self.targets.get(handle).map(|t| t.framebuffer)
    }

    /// Completeness as reported when the framebuffer was created.
    #[must_use]
    pub fn is_complete(&self, handle: RenderTargetHandle) -> bool {
        self.targets.get(handle).is_some_and(|t| t.complete)
    }

    fn delete<D: GraphicsDriver>(driver: &mut D, state: &mut StateCache, gpu: GpuRenderTarget) {
        if state.current_framebuffer() == Some(gpu.framebuffer) {
            state.bind_framebuffer(driver, None);
        }
        driver.delete_framebuffer(gpu.framebuffer);
        if let Some(depth) = gpu.depth {
            driver.delete_renderbuffer(depth);
        }
        state.forget_texture(gpu.color);
        driver.delete_texture(gpu.color);
    }

    /// Deletes the driver objects of `handle`, including the color texture.
    pub fn dispose<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        textures: &mut TextureManager,
        handle: RenderTargetHandle,
        texture: Option<TextureHandle>,
    ) -> bool {
        let Some(gpu) = self.targets.remove(handle) else {
            return false;
        };
        if let Some(texture) = texture {
            textures.unregister(texture);
        }
        Self::delete(driver, state, gpu);
        true
    }

    pub fn forget_all(&mut self) {
        self.targets.clear();
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
