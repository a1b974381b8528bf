use glam::{Mat4, Vec3, Vec4};

use crate::renderer::arena::{Assets, Handle};
use crate::renderer::camera::Viewpoint;
use crate::renderer::device::{
    Comparison, Device, FixedState, StencilAction, StencilFunc, StencilOps,
};
use crate::renderer::material::Material;
use crate::renderer::object::Object;

const STAMP: StencilFunc = StencilFunc {
    compare: Comparison::Always,
    reference: 1,
    mask: 0xFF,
};

/// An object drawn with a flat colored outline around its silhouette.
pub struct StencilBox {
    pub object: Object,
    /// Flat color material the outline is drawn with.
    pub outline_material: Handle<Material>,
    pub outline_color: Vec4,
    pub outline_size: f32,
}

impl StencilBox {
    /// Stamps the object into the stencil buffer, draws a scaled up copy
    /// everywhere the stamp isn't, then leaves the default state behind:
    /// depth test on, stencil test off, stencil func always/1 and full write mask.
    pub fn render(&self, device: &mut dyn Device, assets: &mut Assets, viewpoint: &Viewpoint) {
        let replace_on_pass = StencilOps {
            stencil_fail: StencilAction::Keep,
            depth_fail: StencilAction::Keep,
            pass: StencilAction::Replace,
        };
        device.apply_state(&FixedState {
            stencil_test: true,
            stencil_func: STAMP,
            stencil_ops: replace_on_pass,
            stencil_write_mask: 0xFF,
            ..FixedState::opaque()
        });
        self.object.render(device, assets, viewpoint, None);

        device.apply_state(&FixedState {
            depth_test: false,
            stencil_test: true,
            stencil_func: StencilFunc {
                compare: Comparison::NotEqual,
                ..STAMP
            },
            stencil_ops: replace_on_pass,
            stencil_write_mask: 0x00,
            ..FixedState::opaque()
        });
        let model =
            self.object.transform.matrix() * Mat4::from_scale(Vec3::splat(self.outline_size));
        let outline = &mut assets.materials[self.outline_material];
        outline.set_property("color", self.outline_color);
        outline.set_property("transform", viewpoint.view_projection() * model);
        outline.set_property("modelTransform", model);
        outline.apply(device);
        assets.meshes[self.object.mesh].draw(device);

        device.apply_state(&FixedState::opaque());
    }
}
