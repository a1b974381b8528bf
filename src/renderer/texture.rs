use std::path::Path;

use image::GenericImageView;
use log::debug;

use crate::renderer::device::{
    Device, FaceData, PixelFormat, Sampler, TextureDesc, TextureId, TextureKind,
};
use crate::renderer::error::RenderError;

/// A decoded image, bottom row first unless it's a cube map face.
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub channel_count: u8,
    pub data: Vec<u8>,
}

impl Image {
    pub fn load(path: &Path) -> Result<Image, RenderError> {
        Image::decode(path, true)
    }

    /// Loads a cube map face. Unlike 2D textures, faces are stored top row
    /// first.
    pub fn load_cube_face(path: &Path) -> Result<Image, RenderError> {
        Image::decode(path, false)
    }

    fn decode(path: &Path, flip: bool) -> Result<Image, RenderError> {
        let mut image = image::open(path).map_err(|source| RenderError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        if flip {
            // GL expects the first row at the bottom.
            image = image.flipv();
        }
        let (width, height) = image.dimensions();
        let channel_count = image.color().channel_count();
        let data = match channel_count {
            1 => image.into_luma8().into_raw(),
            2 => image.into_luma_alpha8().into_raw(),
            3 => image.into_rgb8().into_raw(),
            _ => image.into_rgba8().into_raw(),
        };
        debug!(
            "loaded image {}: {width}x{height}, {channel_count} channels",
            path.display()
        );
        Ok(Image {
            width,
            height,
            channel_count: channel_count.min(4),
            data,
        })
    }

    /// A single-colored RGBA image.
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Image {
        let data = (0..width * height).flat_map(|_| color).collect();
        Image {
            width,
            height,
            channel_count: 4,
            data,
        }
    }

    pub fn format(&self) -> PixelFormat {
        PixelFormat::from_channel_count(self.channel_count)
    }
}

/// Shareable reference to a texture, what materials store and bind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureRef {
    pub id: TextureId,
    pub kind: TextureKind,
}

/// A 2D or cube map texture.
pub struct Texture {
    id: TextureId,
    kind: TextureKind,
    width: u32,
    height: u32,
}

impl Texture {
    pub fn from_image(device: &mut dyn Device, image: &Image, sampler: Sampler) -> Texture {
        Texture::from_pixels(
            device,
            image.width,
            image.height,
            image.format(),
            sampler,
            Some(&image.data),
        )
    }

    /// An uninitialized texture, e.g. for a framebuffer attachment.
    pub fn empty(
        device: &mut dyn Device,
        width: u32,
        height: u32,
        format: PixelFormat,
        sampler: Sampler,
    ) -> Texture {
        Texture::from_pixels(device, width, height, format, sampler, None)
    }

    pub fn from_pixels(
        device: &mut dyn Device,
        width: u32,
        height: u32,
        format: PixelFormat,
        sampler: Sampler,
        pixels: Option<&[u8]>,
    ) -> Texture {
        let desc = TextureDesc {
            width,
            height,
            format,
            sampler,
        };
        let id = device.create_texture(&desc, pixels);
        Texture {
            id,
            kind: TextureKind::Flat,
            width,
            height,
        }
    }

    /// A cube map from six faces in +X, -X, +Y, -Y, +Z, -Z order.
    pub fn cube_from_images(device: &mut dyn Device, faces: &[Image; 6]) -> Texture {
        let face_data = faces.each_ref().map(|face| FaceData {
            width: face.width,
            height: face.height,
            format: face.format(),
            pixels: &face.data,
        });
        let id = device.create_cube_texture(&face_data);
        Texture {
            id,
            kind: TextureKind::Cube,
            width: faces[0].width,
            height: faces[0].height,
        }
    }

    pub fn handle(&self) -> TextureRef {
        TextureRef {
            id: self.id,
            kind: self.kind,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn destroy(self, device: &mut dyn Device) {
        device.delete_texture(self.id);
    }
}
