//! Textures
//!
//! RGBA8 images uploaded lazily by the renderer. A texture whose `data` is
//! `None` allocates storage without contents; render-target attachments are
//! textures of this kind whose GPU object the renderer creates itself.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    Repeat,
    #[default]
    ClampToEdge,
    MirroredRepeat,
}

/// Sampling parameters applied when the texture is (re)uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerParams {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

#[derive(Debug, Clone)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    data: Option<Vec<u8>>,
    pub sampler: SamplerParams,
    pub flip_y: bool,
    attachment: bool,
    version: u64,
}

impl Texture {
    /// Creates a texture from tightly packed RGBA8 pixels.
    #[must_use]
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            name: String::new(),
            width,
            height,
            data: Some(data),
            sampler: SamplerParams::default(),
            flip_y: false,
            attachment: false,
            version: 1,
        }
    }

    /// Storage-only texture backing a render target's color attachment.
    #[must_use]
    pub(crate) fn attachment(width: u32, height: u32) -> Self {
        Self {
            name: String::from("RenderTarget"),
            width,
            height,
            data: None,
            sampler: SamplerParams::default(),
            flip_y: false,
            attachment: true,
            version: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.attachment
    }

    pub fn set_data(&mut self, width: u32, height: u32, data: Vec<u8>) {
        self.width = width;
        self.height = height;
        self.data = Some(data);
        self.version += 1;
    }

    /// Re-upload after in-place edits or sampler changes.
    pub fn needs_update(&mut self) {
        self.version += 1;
    }

    /// `true` when the pixel buffer is large enough for the declared size.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.data
            .as_ref()
            .is_some_and(|d| d.len() >= self.width as usize * self.height as usize * 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completeness_checks_size() {
        let tex = Texture::from_rgba8(2, 2, vec![255; 16]);
        assert!(tex.is_complete());
        let short = Texture::from_rgba8(2, 2, vec![255; 15]);
        assert!(!short.is_complete());
        assert!(!Texture::attachment(4, 4).is_complete());
    }
}
