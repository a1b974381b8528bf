use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::renderer::arena::{Assets, Handle};
use crate::renderer::camera::Viewpoint;
use crate::renderer::device::{Device, Primitive, Sampler, Wrap};
use crate::renderer::error::RenderError;
use crate::renderer::gltf;
use crate::renderer::material::Material;
use crate::renderer::mesh::Mesh;
use crate::renderer::texture::{Image, Texture, TextureRef};
use crate::renderer::transform::Transform;

/// Textures used where an imported material has no map of its own.
#[derive(Clone, Copy, Debug)]
pub struct FallbackTextures {
    pub diffuse: TextureRef,
    pub specular: TextureRef,
}

struct Part {
    mesh: Handle<Mesh>,
    diffuse: TextureRef,
    specular: TextureRef,
}

/// An imported scene, drawn part by part with one material.
pub struct Model {
    parts: Vec<Part>,
    pub transform: Transform,
}

impl Model {
    pub fn load(
        device: &mut dyn Device,
        assets: &mut Assets,
        path: &Path,
        fallback: FallbackTextures,
    ) -> Result<Model, RenderError> {
        let scene = gltf::import_gltf(path)?;

        let mut loaded = HashMap::new();
        let mut materials = Vec::with_capacity(scene.materials.len());
        for material in &scene.materials {
            materials.push((
                load_texture(device, assets, &mut loaded, &material.diffuse, fallback.diffuse)?,
                load_texture(device, assets, &mut loaded, &material.specular, fallback.specular)?,
            ));
        }

        let parts = scene
            .meshes
            .into_iter()
            .map(|mesh| {
                let (diffuse, specular) = mesh
                    .material_index
                    .and_then(|i| materials.get(i).copied())
                    .unwrap_or((fallback.diffuse, fallback.specular));
                debug!("model part {}: {} vertices", mesh.name, mesh.vertices.len());
                let mesh = Mesh::create(device, mesh.vertices, &mesh.indices, Primitive::Triangles);
                Part {
                    mesh: assets.meshes.insert(mesh),
                    diffuse,
                    specular,
                }
            })
            .collect::<Vec<_>>();
        info!(
            "model {}: {} parts, {} textures",
            path.display(),
            parts.len(),
            loaded.len()
        );

        Ok(Model {
            parts,
            transform: Transform::default(),
        })
    }

    #[cfg(test)]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Draws every part with `material`, which receives the part's maps as
    /// `material.diffuse` and `material.specular`.
    pub fn render(
        &self,
        device: &mut dyn Device,
        assets: &mut Assets,
        viewpoint: &Viewpoint,
        material: Handle<Material>,
    ) {
        let model = self.transform.matrix();
        for part in &self.parts {
            let material = &mut assets.materials[material];
            material.set_property("material.diffuse", part.diffuse);
            material.set_property("material.specular", part.specular);
            material.set_property("transform", viewpoint.view_projection() * model);
            material.set_property("modelTransform", model);
            material.apply(device);
            assets.meshes[part.mesh].draw(device);
        }
    }
}

/// Loads the texture at `path` once, or hands out `fallback` if there's none.
fn load_texture(
    device: &mut dyn Device,
    assets: &mut Assets,
    loaded: &mut HashMap<PathBuf, TextureRef>,
    path: &Option<PathBuf>,
    fallback: TextureRef,
) -> Result<TextureRef, RenderError> {
    let Some(path) = path else {
        return Ok(fallback);
    };
    if let Some(&texture) = loaded.get(path) {
        return Ok(texture);
    }
    let image = Image::load(path)?;
    let texture = Texture::from_image(device, &image, Sampler::IMAGE.with_wrap(Wrap::Repeat));
    let handle = texture.handle();
    assets.textures.insert(texture);
    loaded.insert(path.clone(), handle);
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gltf::tests::write_triangle_gltf;
    use crate::renderer::recording::RecordingDevice;

    fn fallback(device: &mut RecordingDevice, assets: &mut Assets) -> FallbackTextures {
        let mut solid = |color| {
            let texture = Texture::from_image(device, &Image::solid(1, 1, color), Sampler::IMAGE);
            let handle = texture.handle();
            assets.textures.insert(texture);
            handle
        };
        FallbackTextures {
            diffuse: solid([255; 4]),
            specular: solid([0, 0, 0, 255]),
        }
    }

    #[test]
    fn loads_parts_and_their_maps() {
        let dir = std::env::temp_dir().join("deferred-scene-model-maps");
        let path = write_triangle_gltf(&dir);
        for name in ["diffuse.png", "specular.png"] {
            image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 100, 50, 255]))
                .save(dir.join(name))
                .unwrap();
        }
        let mut device = RecordingDevice::new();
        let mut assets = Assets::new();
        let fallback = fallback(&mut device, &mut assets);
        let model = Model::load(&mut device, &mut assets, &path, fallback).unwrap();
        assert_eq!(model.part_count(), 1);
        assert_eq!(assets.textures.len(), 4);
        assert_eq!(assets.meshes.len(), 1);
    }

    #[test]
    fn missing_maps_are_errors() {
        let dir = std::env::temp_dir().join("deferred-scene-model-missing-maps");
        let path = write_triangle_gltf(&dir);
        let _ = std::fs::remove_file(dir.join("diffuse.png"));
        let mut device = RecordingDevice::new();
        let mut assets = Assets::new();
        let fallback = fallback(&mut device, &mut assets);
        let result = Model::load(&mut device, &mut assets, &path, fallback);
        assert!(matches!(result, Err(RenderError::Image { .. })));
    }
}
