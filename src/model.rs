//! Model files decoded into CPU-side scene data.
//!
//! [`load_model`] picks a decoder from the file extension:
//!
//! - `.gltf` / `.glb`: node hierarchy, triangle primitives, base color
//!   factors and textures, animation clips
//! - `.stl`: one untextured node
//!
//! Nothing here touches the GPU, so loading can run on a worker thread.

use std::path::Path;

use glam::{Mat4, Quat, Vec3};
use gltf::animation::util::ReadOutputs;
use gltf::mesh::util::ReadIndices;

use crate::animation::{AnimationClip, Channel, ChannelValues, Interpolation};
use crate::error::AssetError;
use crate::geometry::RawGeometry;
use crate::mesh::{Transform, Vertex3d};

const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// RGBA8 pixels of a decoded texture image.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// One drawable piece of geometry with its material inputs.
#[derive(Clone, Debug)]
pub struct Primitive {
    pub geometry: RawGeometry,
    pub base_color: [f32; 4],
    /// Index into [`ModelData::images`].
    pub texture: Option<usize>,
}

/// A node of the model hierarchy.
#[derive(Clone, Debug)]
pub struct ModelNode {
    pub name: Option<String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Rest pose relative to the parent.
    pub local: Transform,
    /// Indices into [`ModelData::primitives`].
    pub primitives: Vec<usize>,
}

/// A decoded model, ready for upload.
#[derive(Clone, Debug, Default)]
pub struct ModelData {
    pub nodes: Vec<ModelNode>,
    pub roots: Vec<usize>,
    pub primitives: Vec<Primitive>,
    pub images: Vec<ImageData>,
    pub clips: Vec<AnimationClip>,
}

impl ModelData {
    /// Every node's rest pose, the starting point for animation.
    pub fn rest_pose(&self) -> Vec<Transform> {
        self.nodes.iter().map(|n| n.local).collect()
    }

    /// Model-space matrices for a pose, one per node.
    pub fn world_matrices(&self, pose: &[Transform]) -> Vec<Mat4> {
        let mut world = vec![Mat4::IDENTITY; self.nodes.len()];
        let mut stack: Vec<(usize, Mat4)> = self.roots.iter().map(|&r| (r, Mat4::IDENTITY)).collect();
        let mut visited = vec![false; self.nodes.len()];

        while let Some((index, parent)) = stack.pop() {
            let Some(node) = self.nodes.get(index) else {
                continue;
            };
            if std::mem::replace(&mut visited[index], true) {
                continue;
            }
            let local = pose.get(index).unwrap_or(&node.local).matrix();
            world[index] = parent * local;
            stack.extend(node.children.iter().map(|&c| (c, world[index])));
        }
        world
    }

    /// Total triangle count.
    pub fn triangle_count(&self) -> usize {
        self.primitives
            .iter()
            .map(|p| p.geometry.indices.len() / 3)
            .sum()
    }
}

/// Decode a model file.
pub fn load_model(path: &Path) -> Result<ModelData, AssetError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let model = match ext.as_str() {
        "gltf" | "glb" => load_gltf(path)?,
        "stl" => load_stl(path)?,
        _ => return Err(AssetError::UnsupportedFormat(ext)),
    };

    if model.triangle_count() == 0 {
        return Err(AssetError::NoGeometry(path.to_path_buf()));
    }
    log::debug!(
        "decoded {}: {} nodes, {} primitives, {} triangles, {} clips",
        path.display(),
        model.nodes.len(),
        model.primitives.len(),
        model.triangle_count(),
        model.clips.len()
    );
    Ok(model)
}

fn load_stl(path: &Path) -> Result<ModelData, AssetError> {
    let geometry = RawGeometry::from_stl_file(path)?;
    Ok(ModelData {
        nodes: vec![ModelNode {
            name: path.file_stem().map(|s| s.to_string_lossy().into_owned()),
            parent: None,
            children: Vec::new(),
            local: Transform::default(),
            primitives: vec![0],
        }],
        roots: vec![0],
        primitives: vec![Primitive {
            geometry,
            base_color: [1.0; 4],
            texture: None,
        }],
        images: Vec::new(),
        clips: Vec::new(),
    })
}

/// Whether the raw file mentions the Draco extension.
fn mentions_draco(path: &Path) -> bool {
    std::fs::read(path)
        .map(|bytes| {
            bytes
                .windows(DRACO_EXTENSION.len())
                .any(|w| w == DRACO_EXTENSION.as_bytes())
        })
        .unwrap_or(false)
}

fn load_gltf(path: &Path) -> Result<ModelData, AssetError> {
    let (doc, buffers, images) = match gltf::import(path) {
        Ok(imported) => imported,
        Err(gltf::Error::Io(source)) if !path.exists() => {
            return Err(AssetError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
        Err(source) => {
            if mentions_draco(path) {
                return Err(AssetError::DracoCompressed(path.to_path_buf()));
            }
            return Err(AssetError::Gltf {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if doc.extensions_used().any(|e| e == DRACO_EXTENSION) {
        return Err(AssetError::DracoCompressed(path.to_path_buf()));
    }

    let read_buffer = |b: gltf::Buffer| buffers.get(b.index()).map(|d| d.0.as_slice());

    let mut primitives = Vec::new();
    // glTF mesh index -> our primitive indices
    let mut mesh_primitives: Vec<Vec<usize>> = Vec::with_capacity(doc.meshes().len());
    for mesh in doc.meshes() {
        let mut ids = Vec::new();
        for prim in mesh.primitives() {
            if prim.mode() != gltf::mesh::Mode::Triangles {
                log::debug!("skipping non-triangle primitive in mesh {}", mesh.index());
                continue;
            }
            let reader = prim.reader(read_buffer);
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|n| n.collect());
            let uvs: Option<Vec<[f32; 2]>> =
                reader.read_tex_coords(0).map(|t| t.into_f32().collect());

            let vertices = positions
                .iter()
                .enumerate()
                .map(|(i, &p)| {
                    let n = normals
                        .as_ref()
                        .and_then(|n| n.get(i).copied())
                        .unwrap_or([0.0; 3]);
                    let uv = uvs.as_ref().and_then(|t| t.get(i).copied()).unwrap_or([0.0; 2]);
                    Vertex3d::new(p, n, uv)
                })
                .collect();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(ReadIndices::U8(it)) => it.map(u32::from).collect(),
                Some(ReadIndices::U16(it)) => it.map(u32::from).collect(),
                Some(ReadIndices::U32(it)) => it.collect(),
                None => (0..positions.len() as u32).collect(),
            };

            let mut geometry = RawGeometry::new(vertices, indices);
            if normals.is_none() {
                geometry.recalculate_normals();
            }

            let pbr = prim.material().pbr_metallic_roughness();
            ids.push(primitives.len());
            primitives.push(Primitive {
                geometry,
                base_color: pbr.base_color_factor(),
                texture: pbr
                    .base_color_texture()
                    .map(|info| info.texture().source().index()),
            });
        }
        mesh_primitives.push(ids);
    }

    let mut nodes: Vec<ModelNode> = doc
        .nodes()
        .map(|node| {
            let (t, r, s) = node.transform().decomposed();
            ModelNode {
                name: node.name().map(str::to_string),
                parent: None,
                children: node.children().map(|c| c.index()).collect(),
                local: Transform {
                    position: Vec3::from(t),
                    rotation: Quat::from_array(r).normalize(),
                    scale: Vec3::from(s),
                },
                primitives: node
                    .mesh()
                    .and_then(|m| mesh_primitives.get(m.index()).cloned())
                    .unwrap_or_default(),
            }
        })
        .collect();
    for index in 0..nodes.len() {
        for child in nodes[index].children.clone() {
            if let Some(c) = nodes.get_mut(child) {
                c.parent = Some(index);
            }
        }
    }

    let roots = match doc.default_scene().or_else(|| doc.scenes().next()) {
        Some(scene) => scene.nodes().map(|n| n.index()).collect(),
        None => (0..nodes.len()).filter(|&i| nodes[i].parent.is_none()).collect(),
    };

    let images = images
        .into_iter()
        .enumerate()
        .map(|(i, data)| {
            to_rgba8(&data).unwrap_or_else(|| {
                log::warn!("image {i} has unsupported format {:?}; using white", data.format);
                ImageData {
                    width: 1,
                    height: 1,
                    pixels: vec![255; 4],
                }
            })
        })
        .collect();

    let clips = doc
        .animations()
        .map(|anim| {
            let channels = anim
                .channels()
                .filter_map(|ch| read_channel(&ch, &read_buffer))
                .collect();
            let name = anim
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("clip{}", anim.index()));
            AnimationClip::new(name, channels)
        })
        .collect();

    Ok(ModelData {
        nodes,
        roots,
        primitives,
        images,
        clips,
    })
}

fn read_channel<'a, 's, F>(channel: &gltf::animation::Channel<'a>, read_buffer: &F) -> Option<Channel>
where
    F: Clone + Fn(gltf::Buffer<'a>) -> Option<&'s [u8]>,
{
    let reader = channel.reader(read_buffer.clone());
    let times: Vec<f32> = reader.read_inputs()?.collect();
    let sampler = channel.sampler();
    let (interpolation, stride) = match sampler.interpolation() {
        gltf::animation::Interpolation::Step => (Interpolation::Step, 1),
        gltf::animation::Interpolation::Linear => (Interpolation::Linear, 1),
        // Keep the value of each (in-tangent, value, out-tangent) triple
        gltf::animation::Interpolation::CubicSpline => (Interpolation::Linear, 3),
    };
    let pick = |i: usize| stride == 1 || i % 3 == 1;

    let values = match reader.read_outputs()? {
        ReadOutputs::Translations(it) => ChannelValues::Translation(
            it.enumerate().filter(|(i, _)| pick(*i)).map(|(_, v)| Vec3::from(v)).collect(),
        ),
        ReadOutputs::Rotations(it) => ChannelValues::Rotation(
            it.into_f32()
                .enumerate()
                .filter(|(i, _)| pick(*i))
                .map(|(_, v)| Quat::from_array(v).normalize())
                .collect(),
        ),
        ReadOutputs::Scales(it) => ChannelValues::Scale(
            it.enumerate().filter(|(i, _)| pick(*i)).map(|(_, v)| Vec3::from(v)).collect(),
        ),
        ReadOutputs::MorphTargetWeights(_) => return None,
    };

    Some(Channel {
        node: channel.target().node().index(),
        interpolation,
        times,
        values,
    })
}

/// Convert a decoded glTF image to RGBA8.
fn to_rgba8(data: &gltf::image::Data) -> Option<ImageData> {
    use gltf::image::Format;
    use image::{DynamicImage, ImageBuffer};

    let (w, h) = (data.width, data.height);
    let px = data.pixels.clone();
    let wide = || -> Vec<u16> {
        data.pixels
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect()
    };
    let image = match data.format {
        Format::R8 => DynamicImage::ImageLuma8(ImageBuffer::from_raw(w, h, px)?),
        Format::R8G8 => DynamicImage::ImageLumaA8(ImageBuffer::from_raw(w, h, px)?),
        Format::R8G8B8 => DynamicImage::ImageRgb8(ImageBuffer::from_raw(w, h, px)?),
        Format::R8G8B8A8 => DynamicImage::ImageRgba8(ImageBuffer::from_raw(w, h, px)?),
        Format::R16 => DynamicImage::ImageLuma16(ImageBuffer::from_raw(w, h, wide())?),
        Format::R16G16 => DynamicImage::ImageLumaA16(ImageBuffer::from_raw(w, h, wide())?),
        Format::R16G16B16 => DynamicImage::ImageRgb16(ImageBuffer::from_raw(w, h, wide())?),
        Format::R16G16B16A16 => DynamicImage::ImageRgba16(ImageBuffer::from_raw(w, h, wide())?),
        _ => return None,
    };
    Some(ImageData {
        width: w,
        height: h,
        pixels: image.to_rgba8().into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("firefly-viewer-model-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join(name);
        std::fs::write(&path, contents).expect("write temp file");
        path
    }

    // One triangle (positions only, no indices) under a translated parent node,
    // plus a two-key translation clip on the child.
    fn triangle_gltf() -> String {
        let mut bin = Vec::new();
        for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        for v in [0.0f32, 1.0] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        for v in [0.0f32, 0.0, 0.0, 0.0, 2.0, 0.0] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        let uri = format!("data:application/octet-stream;base64,{}", base64(&bin));
        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [
    {{ "name": "root", "translation": [0, 1, 0], "children": [1] }},
    {{ "name": "body", "mesh": 0 }}
  ],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }}],
  "buffers": [{{ "byteLength": {len}, "uri": "{uri}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 8 }},
    {{ "buffer": 0, "byteOffset": 44, "byteLength": 24 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0, 0, 0], "max": [1, 1, 0] }},
    {{ "bufferView": 1, "componentType": 5126, "count": 2, "type": "SCALAR",
       "min": [0], "max": [1] }},
    {{ "bufferView": 2, "componentType": 5126, "count": 2, "type": "VEC3" }}
  ],
  "animations": [{{
    "name": "lift",
    "samplers": [{{ "input": 1, "output": 2, "interpolation": "LINEAR" }}],
    "channels": [{{ "sampler": 0, "target": {{ "node": 1, "path": "translation" }} }}]
  }}]
}}"#,
            len = bin.len()
        )
    }

    fn base64(bytes: &[u8]) -> String {
        const TABLE: &[u8; 64] =
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
        let mut out = String::new();
        for chunk in bytes.chunks(3) {
            let b = [chunk[0], *chunk.get(1).unwrap_or(&0), *chunk.get(2).unwrap_or(&0)];
            let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
            for i in 0..4 {
                if i <= chunk.len() {
                    out.push(TABLE[((n >> (18 - 6 * i)) & 63) as usize] as char);
                } else {
                    out.push('=');
                }
            }
        }
        out
    }

    #[test]
    fn loads_gltf_hierarchy_and_clip() {
        let path = temp_file("triangle.gltf", triangle_gltf().as_bytes());
        let model = load_model(&path).expect("load triangle");

        assert_eq!(model.nodes.len(), 2);
        assert_eq!(model.roots, vec![0]);
        assert_eq!(model.nodes[1].parent, Some(0));
        assert_eq!(model.triangle_count(), 1);
        // Missing normals are recomputed
        assert_eq!(model.primitives[0].geometry.vertices[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(model.primitives[0].base_color, [1.0; 4]);

        let world = model.world_matrices(&model.rest_pose());
        assert_eq!(world[1].transform_point3(Vec3::ZERO), Vec3::new(0.0, 1.0, 0.0));

        assert_eq!(model.clips.len(), 1);
        assert_eq!(model.clips[0].name, "lift");
        assert_eq!(model.clips[0].duration, 1.0);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = load_model(Path::new("scene.fbx")).unwrap_err();
        assert!(matches!(err, AssetError::UnsupportedFormat(ext) if ext == "fbx"));
    }

    #[test]
    fn missing_file_reports_io() {
        let err = load_model(Path::new("no/such/model.gltf")).unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }), "{err}");
    }

    #[test]
    fn draco_models_are_reported() {
        let json = r#"{
  "asset": { "version": "2.0" },
  "extensionsUsed": ["KHR_draco_mesh_compression"],
  "extensionsRequired": ["KHR_draco_mesh_compression"],
  "meshes": [{ "primitives": [{ "attributes": {},
    "extensions": { "KHR_draco_mesh_compression": { "bufferView": 0, "attributes": {} } } }] }]
}"#;
        let path = temp_file("draco.gltf", json.as_bytes());
        let err = load_model(&path).unwrap_err();
        assert!(matches!(err, AssetError::DracoCompressed(_)), "{err}");
    }

    #[test]
    fn loads_stl_as_single_node() {
        let stl = "solid t\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\nendloop\nendfacet\nendsolid t\n";
        let path = temp_file("tri.stl", stl.as_bytes());
        let model = load_model(&path).expect("load stl");
        assert_eq!(model.nodes.len(), 1);
        assert_eq!(model.nodes[0].name.as_deref(), Some("tri"));
        assert!(model.clips.is_empty());
    }

    #[test]
    fn rgb_images_gain_opaque_alpha() {
        let data = gltf::image::Data {
            pixels: vec![10, 20, 30],
            format: gltf::image::Format::R8G8B8,
            width: 1,
            height: 1,
        };
        let image = to_rgba8(&data).expect("rgb converts");
        assert_eq!(image.pixels, vec![10, 20, 30, 255]);
    }
}
