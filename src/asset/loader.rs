use nalgebra_glm as glm;

use crate::animation::{Channel, Clip, Interpolation, Keyframes, Transform};
use crate::error::ViewerError;

/// Flattened glTF scene subtree: node hierarchy, mesh primitives, skins and
/// animation clips, all indexed by glTF node index.
pub struct LoadedModel {
    pub name: String,
    pub nodes: Vec<NodeData>,
    pub meshes: Vec<MeshData>,
    pub skins: Vec<SkinData>,
    pub clips: Vec<Clip>,
}

pub struct NodeData {
    pub name: String,
    pub parent: Option<usize>,
    pub local: Transform,
}

/// One glTF mesh primitive, kept as CPU-side arrays until the renderer
/// interleaves and uploads it.
pub struct MeshData {
    pub node: usize,
    pub skin: Option<usize>,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub joints: Vec<[u16; 4]>,
    pub weights: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
    pub base_color: [f32; 4],
    pub texture: Option<TextureData>,
}

pub struct TextureData {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub struct SkinData {
    pub joints: Vec<usize>,
    pub inverse_bind: Vec<glm::Mat4>,
}

impl LoadedModel {
    /// Rest-pose local transforms, one per node, in node-index order.
    pub fn base_pose(&self) -> Vec<Transform> {
        self.nodes.iter().map(|n| n.local).collect()
    }
}

/// World-from-node matrices for the whole hierarchy given the current
/// local transforms.
pub fn global_transforms(nodes: &[NodeData], locals: &[Transform]) -> Vec<glm::Mat4> {
    fn resolve(
        i: usize,
        nodes: &[NodeData],
        locals: &[Transform],
        memo: &mut Vec<Option<glm::Mat4>>,
    ) -> glm::Mat4 {
        if let Some(m) = memo[i] {
            return m;
        }
        let local = locals[i].matrix();
        let global = match nodes[i].parent {
            Some(p) => resolve(p, nodes, locals, memo) * local,
            None => local,
        };
        memo[i] = Some(global);
        global
    }

    let mut memo = vec![None; nodes.len()];
    (0..nodes.len())
        .map(|i| resolve(i, nodes, locals, &mut memo))
        .collect()
}

/// Fetch and parse a glTF/GLB model from a local path or an http(s) URL.
pub async fn load(path: &str) -> Result<LoadedModel, ViewerError> {
    let bytes = if path.starts_with("http://") || path.starts_with("https://") {
        let response = reqwest::get(path).await?;
        if !response.status().is_success() {
            return Err(ViewerError::Network(format!(
                "HTTP {} from {}",
                response.status(),
                path
            )));
        }
        response.bytes().await?.to_vec()
    } else {
        tokio::fs::read(path).await?
    };

    let (document, buffers, images) = gltf::import_slice(&bytes)?;
    Ok(build(path, document, buffers, images))
}

fn build(
    path: &str,
    document: gltf::Document,
    buffers: Vec<gltf::buffer::Data>,
    images: Vec<gltf::image::Data>,
) -> LoadedModel {
    let node_count = document.nodes().len();

    let mut parent = vec![None; node_count];
    for node in document.nodes() {
        for child in node.children() {
            parent[child.index()] = Some(node.index());
        }
    }

    let mut nodes = Vec::with_capacity(node_count);
    for node in document.nodes() {
        let (t, r, s) = node.transform().decomposed();
        nodes.push(NodeData {
            name: node.name().unwrap_or("").to_string(),
            parent: parent[node.index()],
            local: Transform {
                translation: glm::make_vec3(&t),
                // glTF stores quaternions as [x, y, z, w]
                rotation: glm::Quat::new(r[3], r[0], r[1], r[2]),
                scale: glm::make_vec3(&s),
            },
        });
    }

    let mut meshes = Vec::new();
    for node in document.nodes() {
        let Some(mesh) = node.mesh() else { continue };
        let skin = node.skin().map(|s| s.index());
        for primitive in mesh.primitives() {
            if let Some(data) = read_primitive(&primitive, &buffers, &images, node.index(), skin) {
                meshes.push(data);
            }
        }
    }

    let skins = document
        .skins()
        .map(|skin| {
            let joints: Vec<usize> = skin.joints().map(|j| j.index()).collect();
            let reader = skin.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));
            let inverse_bind = match reader.read_inverse_bind_matrices() {
                Some(ibms) => ibms
                    .map(|m| {
                        let flat: Vec<f32> = m.iter().flatten().copied().collect();
                        glm::make_mat4(&flat)
                    })
                    .collect(),
                None => vec![glm::Mat4::identity(); joints.len()],
            };
            SkinData {
                joints,
                inverse_bind,
            }
        })
        .collect();

    let clips = document
        .animations()
        .enumerate()
        .map(|(i, anim)| read_clip(&anim, &buffers, i))
        .collect();

    LoadedModel {
        name: path.to_string(),
        nodes,
        meshes,
        skins,
        clips,
    }
}

fn read_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    images: &[gltf::image::Data],
    node: usize,
    skin: Option<usize>,
) -> Option<MeshData> {
    let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));

    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let count = positions.len();

    let normals: Vec<[f32; 3]> = match reader.read_normals() {
        Some(iter) => iter.collect(),
        None => vec![[0.0, 1.0, 0.0]; count],
    };
    let uvs: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
        Some(iter) => iter.into_f32().collect(),
        None => vec![[0.0, 0.0]; count],
    };
    let joints: Vec<[u16; 4]> = match reader.read_joints(0) {
        Some(iter) => iter.into_u16().collect(),
        None => vec![[0; 4]; count],
    };
    let weights: Vec<[f32; 4]> = match reader.read_weights(0) {
        Some(iter) => iter.into_f32().collect(),
        None => vec![[0.0; 4]; count],
    };
    let indices: Vec<u32> = match reader.read_indices() {
        Some(iter) => iter.into_u32().collect(),
        None => (0..count as u32).collect(),
    };

    let pbr = primitive.material().pbr_metallic_roughness();
    let base_color = pbr.base_color_factor();
    let texture = pbr
        .base_color_texture()
        .and_then(|info| images.get(info.texture().source().index()))
        .and_then(image_to_rgba8);

    Some(MeshData {
        node,
        skin,
        positions,
        normals,
        uvs,
        joints,
        weights,
        indices,
        base_color,
        texture,
    })
}

fn image_to_rgba8(image: &gltf::image::Data) -> Option<TextureData> {
    use gltf::image::Format;
    let rgba = match image.format {
        Format::R8G8B8A8 => image.pixels.clone(),
        Format::R8G8B8 => image
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8 => image
            .pixels
            .iter()
            .flat_map(|&v| [v, v, v, 255])
            .collect(),
        Format::R8G8 => image
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        // 16-bit and float formats are not worth converting for a viewer
        _ => return None,
    };
    Some(TextureData {
        rgba,
        width: image.width,
        height: image.height,
    })
}

fn read_clip(animation: &gltf::Animation, buffers: &[gltf::buffer::Data], index: usize) -> Clip {
    use gltf::animation::util::ReadOutputs;
    use gltf::animation::Interpolation as GltfInterp;

    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("Clip {}", index + 1));

    let mut channels = Vec::new();
    for channel in animation.channels() {
        let reader = channel.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));
        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let times: Vec<f32> = inputs.collect();
        let Some(outputs) = reader.read_outputs() else {
            continue;
        };

        let gltf_interp = channel.sampler().interpolation();
        let interpolation = match gltf_interp {
            GltfInterp::Step => Interpolation::Step,
            // cubic-spline tangents are dropped; the value keyframes are
            // sampled linearly
            GltfInterp::Linear | GltfInterp::CubicSpline => Interpolation::Linear,
        };
        let cubic = gltf_interp == GltfInterp::CubicSpline;

        let values = match outputs {
            ReadOutputs::Translations(iter) => {
                let v: Vec<glm::Vec3> = iter.map(|t| glm::make_vec3(&t)).collect();
                Keyframes::Translation(strip_tangents(v, cubic))
            }
            ReadOutputs::Rotations(iter) => {
                let q: Vec<glm::Quat> = iter
                    .into_f32()
                    .map(|r| glm::Quat::new(r[3], r[0], r[1], r[2]))
                    .collect();
                Keyframes::Rotation(strip_tangents(q, cubic))
            }
            ReadOutputs::Scales(iter) => {
                let v: Vec<glm::Vec3> = iter.map(|s| glm::make_vec3(&s)).collect();
                Keyframes::Scale(strip_tangents(v, cubic))
            }
            ReadOutputs::MorphTargetWeights(_) => continue,
        };

        channels.push(Channel {
            node: channel.target().node().index(),
            times,
            values,
            interpolation,
        });
    }

    Clip::new(name, channels)
}

/// Cubic-spline output buffers hold (in-tangent, value, out-tangent) triples;
/// keep only the values.
fn strip_tangents<T: Copy>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if !cubic {
        return values;
    }
    values
        .chunks_exact(3)
        .map(|triple| triple[1])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_transforms_chain_through_parents() {
        let nodes = vec![
            NodeData {
                name: "root".into(),
                parent: None,
                local: Transform {
                    translation: glm::vec3(1.0, 0.0, 0.0),
                    rotation: glm::Quat::identity(),
                    scale: glm::vec3(1.0, 1.0, 1.0),
                },
            },
            NodeData {
                name: "child".into(),
                parent: Some(0),
                local: Transform {
                    translation: glm::vec3(0.0, 2.0, 0.0),
                    rotation: glm::Quat::identity(),
                    scale: glm::vec3(1.0, 1.0, 1.0),
                },
            },
        ];
        let locals: Vec<Transform> = nodes.iter().map(|n| n.local).collect();
        let globals = global_transforms(&nodes, &locals);
        let p = globals[1] * glm::vec4(0.0, 0.0, 0.0, 1.0);
        assert!((p.x - 1.0).abs() < 1e-6);
        assert!((p.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn strip_tangents_keeps_middle_of_each_triple() {
        let v = vec![0, 1, 2, 3, 4, 5];
        assert_eq!(strip_tangents(v.clone(), true), vec![1, 4]);
        assert_eq!(strip_tangents(v.clone(), false), v);
    }
}
