//! A small glTF 2.0 reader: `.gltf` JSON with external buffers and images.
//!
//! Only what the renderer draws is read: triangle primitives with positions,
//! normals and the first UV set, plus each material's base color texture and
//! `KHR_materials_specular` texture. Node transforms are baked into the
//! vertices, so every primitive comes out in model space.

use std::collections::HashMap;
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};

use glam::{Mat3, Mat4, Quat, Vec2, Vec3};
use log::{debug, warn};
use tinyjson::JsonValue;

use crate::renderer::error::RenderError;
use crate::renderer::mesh::Vertex;

const COMPONENT_UNSIGNED_BYTE: usize = 5121;
const COMPONENT_UNSIGNED_SHORT: usize = 5123;
const COMPONENT_UNSIGNED_INT: usize = 5125;
const COMPONENT_FLOAT: usize = 5126;
const MODE_TRIANGLES: usize = 4;

pub struct ImportedMesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material_index: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedMaterial {
    pub diffuse: Option<PathBuf>,
    pub specular: Option<PathBuf>,
}

pub struct ImportedScene {
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
}

pub fn import_gltf(path: &Path) -> Result<ImportedScene, RenderError> {
    let model_error = |reason: String| RenderError::Model {
        path: path.to_path_buf(),
        reason,
    };
    let json = fs::read_to_string(path).map_err(|err| model_error(err.to_string()))?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    let scene = parse(&json, base_dir).map_err(model_error)?;
    debug!(
        "imported {}: {} meshes, {} materials",
        path.display(),
        scene.meshes.len(),
        scene.materials.len()
    );
    Ok(scene)
}

type JsonObject = HashMap<String, JsonValue>;

struct Document<'a> {
    buffers: Vec<Vec<u8>>,
    buffer_views: &'a [JsonValue],
    accessors: &'a [JsonValue],
}

fn parse(json: &str, base_dir: &Path) -> Result<ImportedScene, String> {
    let root: JsonValue = json.parse().map_err(|err| format!("invalid json: {err}"))?;
    let root = take_object(&root)?;

    let mut buffers = Vec::new();
    for buffer in optional_array(root, "buffers")? {
        let buffer = take_object(buffer)?;
        let uri = take_string(field(buffer, "uri")?)?;
        let buffer_path = base_dir.join(uri);
        let data = fs::read(&buffer_path)
            .map_err(|err| format!("could not read buffer {}: {err}", buffer_path.display()))?;
        let byte_length = take_usize(field(buffer, "byteLength")?)?;
        if data.len() < byte_length {
            return Err(format!(
                "buffer {uri} is {} bytes, expected {byte_length}",
                data.len()
            ));
        }
        buffers.push(data);
    }
    let document = Document {
        buffers,
        buffer_views: optional_array(root, "bufferViews")?,
        accessors: optional_array(root, "accessors")?,
    };

    let materials = import_materials(root, base_dir)?;

    let nodes = optional_array(root, "nodes")?;
    let meshes_json = optional_array(root, "meshes")?;
    let mut meshes = Vec::new();
    let mut node_queue = root_nodes(root, nodes.len())?
        .into_iter()
        .map(|i| (Mat4::IDENTITY, i))
        .collect::<Vec<_>>();
    // Nodes form a forest; a second visit means a cycle or a shared child.
    let mut visited = vec![false; nodes.len()];
    while let Some((parent_transform, node_index)) = node_queue.pop() {
        let node = take_object(
            nodes
                .get(node_index)
                .ok_or_else(|| format!("node {node_index} does not exist"))?,
        )?;
        if mem::replace(&mut visited[node_index], true) {
            return Err(format!("node {node_index} is reached more than once"));
        }
        let transform = parent_transform * node_transform(node)?;
        if let Some(mesh_index) = node.get("mesh").map(take_usize).transpose()? {
            let mesh = take_object(
                meshes_json
                    .get(mesh_index)
                    .ok_or_else(|| format!("mesh {mesh_index} does not exist"))?,
            )?;
            let name = match mesh.get("name") {
                Some(name) => take_string(name)?.to_string(),
                None => format!("mesh{mesh_index}"),
            };
            for primitive in take_array(field(mesh, "primitives")?)? {
                let primitive = take_object(primitive)?;
                if let Some(imported) = import_primitive(&document, primitive, &name, transform)? {
                    meshes.push(imported);
                }
            }
        }
        if let Some(children) = node.get("children") {
            for child in take_array(children)? {
                node_queue.push((transform, take_usize(child)?));
            }
        }
    }

    Ok(ImportedScene { meshes, materials })
}

/// Nodes of the default scene, or every node that isn't a child when the
/// file has no scenes.
fn root_nodes(root: &JsonObject, node_count: usize) -> Result<Vec<usize>, String> {
    if let Some(scenes) = root.get("scenes") {
        let scenes = take_array(scenes)?;
        let scene_index = root.get("scene").map(take_usize).transpose()?.unwrap_or(0);
        let scene = take_object(
            scenes
                .get(scene_index)
                .ok_or_else(|| format!("scene {scene_index} does not exist"))?,
        )?;
        return match scene.get("nodes") {
            Some(nodes) => take_array(nodes)?.iter().map(take_usize).collect(),
            None => Ok(Vec::new()),
        };
    }
    let mut is_child = vec![false; node_count];
    for node in optional_array(root, "nodes")? {
        if let Some(children) = take_object(node)?.get("children") {
            for child in take_array(children)? {
                if let Some(flag) = is_child.get_mut(take_usize(child)?) {
                    *flag = true;
                }
            }
        }
    }
    Ok((0..node_count).filter(|&i| !is_child[i]).collect())
}

fn node_transform(node: &JsonObject) -> Result<Mat4, String> {
    if let Some(matrix) = node.get("matrix") {
        return Ok(Mat4::from_cols_slice(&take_floats(matrix, 16)?));
    }
    let translation = match node.get("translation") {
        Some(value) => Vec3::from_slice(&take_floats(value, 3)?),
        None => Vec3::ZERO,
    };
    let scale = match node.get("scale") {
        Some(value) => Vec3::from_slice(&take_floats(value, 3)?),
        None => Vec3::ONE,
    };
    let rotation = match node.get("rotation") {
        Some(value) => Quat::from_slice(&take_floats(value, 4)?),
        None => Quat::IDENTITY,
    };
    Ok(Mat4::from_scale_rotation_translation(scale, rotation, translation))
}

fn import_primitive(
    document: &Document,
    primitive: &JsonObject,
    name: &str,
    transform: Mat4,
) -> Result<Option<ImportedMesh>, String> {
    let mode = primitive.get("mode").map(take_usize).transpose()?;
    if mode.unwrap_or(MODE_TRIANGLES) != MODE_TRIANGLES {
        warn!("skipping non-triangle primitive of {name}");
        return Ok(None);
    }

    let attributes = take_object(field(primitive, "attributes")?)?;
    let attribute = |semantic: &str| attributes.get(semantic).map(take_usize).transpose();
    let Some(position_accessor) = attribute("POSITION")? else {
        return Err(format!("a primitive of {name} has no positions"));
    };
    let positions = read_floats(document, position_accessor, 3)?;
    let vertex_count = positions.len() / 3;
    let normals = match attribute("NORMAL")? {
        Some(accessor) => read_floats(document, accessor, 3)?,
        None => vec![0.0; vertex_count * 3],
    };
    let tex_coords = match attribute("TEXCOORD_0")? {
        Some(accessor) => read_floats(document, accessor, 2)?,
        None => vec![0.0; vertex_count * 2],
    };
    if normals.len() != vertex_count * 3 || tex_coords.len() != vertex_count * 2 {
        return Err(format!("attribute counts of {name} disagree"));
    }

    let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();
    let vertices = (0..vertex_count)
        .map(|i| {
            Vertex::new(
                transform.transform_point3(Vec3::from_slice(&positions[i * 3..])),
                (normal_matrix * Vec3::from_slice(&normals[i * 3..])).normalize_or_zero(),
                Vec2::from_slice(&tex_coords[i * 2..]),
            )
        })
        .collect::<Vec<_>>();

    let mut indices = match primitive.get("indices").map(take_usize).transpose()? {
        Some(accessor) => read_indices(document, accessor)?,
        None => (0..vertex_count as u32).collect(),
    };
    if let Some(&out_of_range) = indices.iter().find(|&&i| i as usize >= vertex_count) {
        return Err(format!("index {out_of_range} of {name} is out of range"));
    }
    // Mirroring transforms flip the winding.
    if transform.determinant() < 0.0 {
        for triangle in indices.chunks_exact_mut(3) {
            triangle.swap(1, 2);
        }
    }

    Ok(Some(ImportedMesh {
        name: name.to_string(),
        vertices,
        indices,
        material_index: primitive.get("material").map(take_usize).transpose()?,
    }))
}

/// The raw bytes of each element of an accessor.
fn accessor_elements<'a>(
    document: &'a Document,
    accessor_index: usize,
    expected_type: &str,
    component_size: usize,
    component_count: usize,
) -> Result<Vec<&'a [u8]>, String> {
    let accessor = take_object(
        document
            .accessors
            .get(accessor_index)
            .ok_or_else(|| format!("accessor {accessor_index} does not exist"))?,
    )?;
    let type_ = take_string(field(accessor, "type")?)?;
    if type_ != expected_type {
        return Err(format!(
            "accessor {accessor_index} is {type_}, expected {expected_type}"
        ));
    }
    let count = take_usize(field(accessor, "count")?)?;
    let view_index = take_usize(field(accessor, "bufferView")?)?;
    let view = take_object(
        document
            .buffer_views
            .get(view_index)
            .ok_or_else(|| format!("buffer view {view_index} does not exist"))?,
    )?;
    let buffer_index = take_usize(field(view, "buffer")?)?;
    let buffer = document
        .buffers
        .get(buffer_index)
        .ok_or_else(|| format!("buffer {buffer_index} does not exist"))?;

    let element_size = component_size * component_count;
    let offset = optional_usize(accessor, "byteOffset")? + optional_usize(view, "byteOffset")?;
    let stride = match view.get("byteStride") {
        Some(stride) => take_usize(stride)?,
        None => element_size,
    };
    (0..count)
        .map(|i| {
            let start = offset + i * stride;
            buffer
                .get(start..start + element_size)
                .ok_or_else(|| format!("accessor {accessor_index} reads past its buffer"))
        })
        .collect()
}

fn read_floats(
    document: &Document,
    accessor_index: usize,
    components: usize,
) -> Result<Vec<f32>, String> {
    let component_type = component_type(document, accessor_index)?;
    if component_type != COMPONENT_FLOAT {
        return Err(format!(
            "accessor {accessor_index} has component type {component_type}, expected FLOAT"
        ));
    }
    let type_ = match components {
        2 => "VEC2",
        3 => "VEC3",
        _ => "VEC4",
    };
    let elements = accessor_elements(document, accessor_index, type_, 4, components)?;
    Ok(elements
        .into_iter()
        .flat_map(|element| element.chunks_exact(4))
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect())
}

fn read_indices(document: &Document, accessor_index: usize) -> Result<Vec<u32>, String> {
    let component_type = component_type(document, accessor_index)?;
    let size = match component_type {
        COMPONENT_UNSIGNED_BYTE => 1,
        COMPONENT_UNSIGNED_SHORT => 2,
        COMPONENT_UNSIGNED_INT => 4,
        _ => return Err(format!("unsupported index component type {component_type}")),
    };
    let elements = accessor_elements(document, accessor_index, "SCALAR", size, 1)?;
    Ok(elements
        .into_iter()
        .map(|bytes| match *bytes {
            [a] => a as u32,
            [a, b] => u16::from_le_bytes([a, b]) as u32,
            [a, b, c, d] => u32::from_le_bytes([a, b, c, d]),
            _ => unreachable!("index size is 1, 2 or 4"),
        })
        .collect())
}

fn component_type(document: &Document, accessor_index: usize) -> Result<usize, String> {
    let accessor = take_object(
        document
            .accessors
            .get(accessor_index)
            .ok_or_else(|| format!("accessor {accessor_index} does not exist"))?,
    )?;
    take_usize(field(accessor, "componentType")?)
}

fn import_materials(root: &JsonObject, base_dir: &Path) -> Result<Vec<ImportedMaterial>, String> {
    let images = optional_array(root, "images")?;
    let textures = optional_array(root, "textures")?;
    let texture_path = |texture_info: &JsonValue| -> Result<Option<PathBuf>, String> {
        let texture_index = take_usize(field(take_object(texture_info)?, "index")?)?;
        let texture = take_object(
            textures
                .get(texture_index)
                .ok_or_else(|| format!("texture {texture_index} does not exist"))?,
        )?;
        let Some(source) = texture.get("source").map(take_usize).transpose()? else {
            return Ok(None);
        };
        let image = take_object(
            images
                .get(source)
                .ok_or_else(|| format!("image {source} does not exist"))?,
        )?;
        match image.get("uri") {
            Some(uri) => Ok(Some(base_dir.join(take_string(uri)?))),
            None => {
                warn!("image {source} is embedded in a buffer view, which isn't supported");
                Ok(None)
            }
        }
    };

    let mut materials = Vec::new();
    for material in optional_array(root, "materials")? {
        let material = take_object(material)?;
        let diffuse = match material
            .get("pbrMetallicRoughness")
            .map(take_object)
            .transpose()?
            .and_then(|pbr| pbr.get("baseColorTexture"))
        {
            Some(info) => texture_path(info)?,
            None => None,
        };
        let specular = match material
            .get("extensions")
            .map(take_object)
            .transpose()?
            .and_then(|extensions| extensions.get("KHR_materials_specular"))
            .map(take_object)
            .transpose()?
            .and_then(|specular| specular.get("specularTexture"))
        {
            Some(info) => texture_path(info)?,
            None => None,
        };
        materials.push(ImportedMaterial { diffuse, specular });
    }
    Ok(materials)
}

fn field<'a>(object: &'a JsonObject, key: &str) -> Result<&'a JsonValue, String> {
    object.get(key).ok_or_else(|| format!("missing field \"{key}\""))
}

fn optional_array<'a>(object: &'a JsonObject, key: &str) -> Result<&'a [JsonValue], String> {
    match object.get(key) {
        Some(value) => take_array(value).map(Vec::as_slice),
        None => Ok(&[]),
    }
}

fn optional_usize(object: &JsonObject, key: &str) -> Result<usize, String> {
    Ok(object.get(key).map(take_usize).transpose()?.unwrap_or(0))
}

fn take_object(value: &JsonValue) -> Result<&JsonObject, String> {
    value.get().ok_or_else(|| format!("expected an object, got {value:?}"))
}

fn take_array(value: &JsonValue) -> Result<&Vec<JsonValue>, String> {
    value.get().ok_or_else(|| format!("expected an array, got {value:?}"))
}

fn take_string(value: &JsonValue) -> Result<&str, String> {
    value
        .get::<String>()
        .map(String::as_str)
        .ok_or_else(|| format!("expected a string, got {value:?}"))
}

fn take_usize(value: &JsonValue) -> Result<usize, String> {
    match value.get::<f64>() {
        Some(&number) if number >= 0.0 && number.fract() == 0.0 => Ok(number as usize),
        _ => Err(format!("expected an index, got {value:?}")),
    }
}

fn take_floats(value: &JsonValue, count: usize) -> Result<Vec<f32>, String> {
    let values = take_array(value)?;
    if values.len() != count {
        return Err(format!("expected {count} numbers, got {}", values.len()));
    }
    values
        .iter()
        .map(|value| {
            value
                .get::<f64>()
                .map(|&number| number as f32)
                .ok_or_else(|| format!("expected a number, got {value:?}"))
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Writes a one-triangle glTF with a translated node into `dir`.
    pub(crate) fn write_triangle_gltf(dir: &Path) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let mut bin = Vec::new();
        for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&value.to_le_bytes());
        }
        for value in [0.0f32, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0] {
            bin.extend_from_slice(&value.to_le_bytes());
        }
        for value in [0.0f32, 0.0, 1.0, 0.0, 0.0, 1.0] {
            bin.extend_from_slice(&value.to_le_bytes());
        }
        for index in [0u16, 1, 2, 0] {
            bin.extend_from_slice(&index.to_le_bytes());
        }
        fs::write(dir.join("triangle.bin"), &bin).unwrap();

        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "mesh": 0, "translation": [0, 2, 0] }}],
  "meshes": [{{ "name": "triangle", "primitives": [{{
    "attributes": {{ "POSITION": 0, "NORMAL": 1, "TEXCOORD_0": 2 }},
    "indices": 3,
    "material": 0
  }}] }}],
  "materials": [{{
    "pbrMetallicRoughness": {{ "baseColorTexture": {{ "index": 0 }} }},
    "extensions": {{ "KHR_materials_specular": {{ "specularTexture": {{ "index": 1 }} }} }}
  }}],
  "textures": [{{ "source": 0 }}, {{ "source": 1 }}],
  "images": [{{ "uri": "diffuse.png" }}, {{ "uri": "specular.png" }}],
  "buffers": [{{ "uri": "triangle.bin", "byteLength": {} }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 72 }},
    {{ "buffer": 0, "byteOffset": 72, "byteLength": 24 }},
    {{ "buffer": 0, "byteOffset": 96, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3" }},
    {{ "bufferView": 0, "byteOffset": 36, "componentType": 5126, "count": 3, "type": "VEC3" }},
    {{ "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC2" }},
    {{ "bufferView": 2, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#,
            bin.len()
        );
        let path = dir.join("triangle.gltf");
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn imports_meshes_with_baked_node_transforms() {
        let dir = std::env::temp_dir().join("deferred-scene-gltf-import");
        let scene = import_gltf(&write_triangle_gltf(&dir)).unwrap();
        assert_eq!(scene.meshes.len(), 1);
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.name, "triangle");
        assert_eq!(mesh.indices, [0, 1, 2]);
        assert_eq!(mesh.material_index, Some(0));
        assert_eq!(mesh.vertices[1].position, Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(mesh.vertices[2].normal, Vec3::Z);
        assert_eq!(mesh.vertices[2].tex_coord, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn imports_diffuse_and_specular_paths() {
        let dir = std::env::temp_dir().join("deferred-scene-gltf-materials");
        let scene = import_gltf(&write_triangle_gltf(&dir)).unwrap();
        assert_eq!(
            scene.materials,
            [ImportedMaterial {
                diffuse: Some(dir.join("diffuse.png")),
                specular: Some(dir.join("specular.png")),
            }]
        );
    }

    #[test]
    fn node_cycles_are_rejected() {
        let self_parent = r#"{ "scenes": [{ "nodes": [0] }], "nodes": [{ "children": [0] }] }"#;
        let err = parse(self_parent, Path::new(".")).err().unwrap();
        assert!(err.contains("node 0"), "{err}");

        let loop_of_two = r#"{
  "scenes": [{ "nodes": [0] }],
  "nodes": [{ "children": [1] }, { "children": [0] }]
}"#;
        assert!(parse(loop_of_two, Path::new(".")).is_err());

        let shared_child = r#"{
  "scenes": [{ "nodes": [0, 1] }],
  "nodes": [{ "children": [2] }, { "children": [2] }, {}]
}"#;
        let err = parse(shared_child, Path::new(".")).err().unwrap();
        assert!(err.contains("node 2"), "{err}");
    }

    #[test]
    fn broken_files_are_model_errors() {
        let dir = std::env::temp_dir().join("deferred-scene-gltf-broken");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.gltf");
        let json = r#"{ "meshes": [{ "primitives": [{ "attributes": {} }] }], "nodes": [{ "mesh": 0 }] }"#;
        fs::write(&path, json).unwrap();
        assert!(matches!(import_gltf(&path), Err(RenderError::Model { .. })));
        assert!(matches!(
            import_gltf(&dir.join("missing.gltf")),
            Err(RenderError::Model { .. })
        ));
    }
}
