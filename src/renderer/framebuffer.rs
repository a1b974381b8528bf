use glam::Vec4;

use crate::renderer::device::{
    DepthAttachment, Device, FramebufferId, PixelFormat, RenderTarget, Sampler, Wrap,
};
use crate::renderer::error::RenderError;
use crate::renderer::texture::{Texture, TextureRef};

/// Offscreen render target: color attachments plus a depth-stencil buffer.
pub struct Framebuffer {
    id: FramebufferId,
    color_attachments: Vec<Texture>,
    width: u32,
    height: u32,
}

impl Framebuffer {
    /// Creates one color attachment per format, in attachment order.
    pub fn create(
        device: &mut dyn Device,
        width: u32,
        height: u32,
        formats: &[PixelFormat],
    ) -> Result<Framebuffer, RenderError> {
        let color_attachments = formats
            .iter()
            .map(|&format| Texture::empty(device, width, height, format, Sampler::TARGET))
            .collect::<Vec<_>>();
        let ids = color_attachments
            .iter()
            .map(|texture| texture.handle().id)
            .collect::<Vec<_>>();
        match device.create_framebuffer(&ids, DepthAttachment::Renderbuffer { width, height }) {
            Ok(id) => Ok(Framebuffer {
                id,
                color_attachments,
                width,
                height,
            }),
            Err(err) => {
                for texture in color_attachments {
                    texture.destroy(device);
                }
                Err(err)
            }
        }
    }

    pub fn target(&self) -> RenderTarget {
        RenderTarget::Offscreen(self.id)
    }

    pub fn bind(&self, device: &mut dyn Device) {
        device.bind_render_target(self.target());
    }

    pub fn color_attachment(&self, index: usize) -> TextureRef {
        self.color_attachments[index].handle()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn destroy(self, device: &mut dyn Device) {
        device.delete_framebuffer(self.id);
        for texture in self.color_attachments {
            texture.destroy(device);
        }
    }
}

/// Depth-only render target for shadow mapping. Lookups outside the map
/// read the far plane, so everything outside the light frustum is lit.
pub struct ShadowMap {
    id: FramebufferId,
    depth: Texture,
}

impl ShadowMap {
    pub fn create(
        device: &mut dyn Device,
        width: u32,
        height: u32,
    ) -> Result<ShadowMap, RenderError> {
        let sampler = Sampler {
            border_color: Some(Vec4::ONE),
            ..Sampler::TARGET.with_wrap(Wrap::ClampToBorder)
        };
        let depth = Texture::empty(device, width, height, PixelFormat::Depth, sampler);
        match device.create_framebuffer(&[], DepthAttachment::Texture(depth.handle().id)) {
            Ok(id) => Ok(ShadowMap { id, depth }),
            Err(err) => {
                depth.destroy(device);
                Err(err)
            }
        }
    }

    pub fn bind(&self, device: &mut dyn Device) {
        device.bind_render_target(RenderTarget::Offscreen(self.id));
    }

    pub fn depth(&self) -> TextureRef {
        self.depth.handle()
    }

    pub fn width(&self) -> u32 {
        self.depth.width()
    }

    pub fn height(&self) -> u32 {
        self.depth.height()
    }

    pub fn destroy(self, device: &mut dyn Device) {
        device.delete_framebuffer(self.id);
        self.depth.destroy(device);
    }
}
