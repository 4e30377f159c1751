use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub joints: [u32; 4],
    pub weights: [f32; 4],
}

impl Vertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
            0 => Float32x3,
            1 => Float32x3,
            2 => Float32x2,
            3 => Uint32x4,
            4 => Float32x4,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Per-frame scene constants. Light colors arrive premultiplied by
/// intensity; `sun_dir.w` carries the shadow depth bias.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GlobalUniform {
    pub view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub ambient: [f32; 4],
    pub sun_color: [f32; 4],
    pub sun_dir: [f32; 4],
}

/// Per-draw constants. `flags[0]` is 1 for skinned meshes, whose `model`
/// is the slot placement (the joint matrices already contain the node
/// hierarchy); unskinned meshes get placement * node global instead.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MeshUniform {
    pub model: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    pub flags: [u32; 4],
}

/// Horizontal square plane centered on the origin, facing +Y.
pub fn floor_geometry(size: f32) -> (Vec<Vertex>, Vec<u32>) {
    let h = size / 2.0;
    let vertex = |x: f32, z: f32, u: f32, v: f32| Vertex {
        position: [x, 0.0, z],
        normal: [0.0, 1.0, 0.0],
        uv: [u, v],
        joints: [0; 4],
        weights: [0.0; 4],
    };
    let vertices = vec![
        vertex(-h, -h, 0.0, 0.0),
        vertex(h, -h, 1.0, 0.0),
        vertex(h, h, 1.0, 1.0),
        vertex(-h, h, 0.0, 1.0),
    ];
    let indices = vec![0, 2, 1, 0, 3, 2];
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_is_flat_and_centered() {
        let (vertices, indices) = floor_geometry(10.0);
        assert_eq!(indices.len(), 6);
        for v in &vertices {
            assert_eq!(v.position[1], 0.0);
            assert!(v.position[0].abs() <= 5.0);
            assert_eq!(v.normal, [0.0, 1.0, 0.0]);
        }
    }
}
