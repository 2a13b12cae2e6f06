//! Per-mesh transformation data for GPU rendering.
//!
//! Scene nodes keep their local transform as translation, rotation and scale
//! (the way glTF stores it). The world transform that reaches the shader is a
//! plain matrix, packed together with the mesh's emissive colour into
//! [`InstanceRaw`].

use cgmath::{Matrix, Matrix3, Matrix4, One, SquareMatrix};

use crate::data_structures::{colour::Rgb, model};

/// Local transformation: position, rotation (as quaternion), and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Build from glTF's decomposed transform. glTF stores quaternions as
    /// `[x, y, z, w]`, cgmath takes `w` first.
    pub fn from_decomposed((translation, rotation, scale): ([f32; 3], [f32; 4], [f32; 3])) -> Self {
        Self {
            position: translation.into(),
            rotation: cgmath::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
            scale: scale.into(),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/// The raw instance is the actual data stored on the GPU
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
    emissive: [f32; 3],
}

impl InstanceRaw {
    pub fn new(world: Matrix4<f32>, emissive: Rgb) -> Self {
        Self {
            model: world.into(),
            normal: normal_matrix(&world).into(),
            emissive: emissive.to_array(),
        }
    }
}

/// Inverse transpose of the upper 3x3, so normals stay perpendicular under
/// non-uniform scale. Singular matrices fall back to the plain 3x3.
pub fn normal_matrix(world: &Matrix4<f32>) -> Matrix3<f32> {
    let linear = Matrix3::from_cols(world.x.truncate(), world.y.truncate(), world.z.truncate());
    linear
        .invert()
        .map(|inverse| inverse.transpose())
        .unwrap_or(linear)
}

/**
 * As we store instance data directly in the GPU memory we need to tell what the bytes refer to:
 *
 * stride: length of an instance
 *
 * Layout: world matrix as four vec4s, normal matrix as three vec3s, emissive colour.
 * Locations continue after the five vertex attributes.
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // The shader only advances to the next instance when it starts a new instance
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // A mat4 takes up 4 vertex slots as it is technically 4 vec4s.
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 25]>() as wgpu::BufferAddress,
                    shader_location: 12,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, Quaternion, Rotation3, Vector3, Vector4};

    #[test]
    fn gltf_quaternion_order_is_converted() {
        // 90 degrees around Y in glTF order [x, y, z, w]
        let half = std::f32::consts::FRAC_1_SQRT_2;
        let instance = Instance::from_decomposed(([0.0; 3], [0.0, half, 0.0, half], [1.0; 3]));
        let expected = Quaternion::from_angle_y(Deg(90.0));
        assert!((instance.rotation.s - expected.s).abs() < 1e-6);
        assert!((instance.rotation.v.y - expected.v.y).abs() < 1e-6);
    }

    #[test]
    fn matrix_applies_scale_then_rotation_then_translation() {
        let instance = Instance {
            position: Vector3::new(1.0, 1.0, 1.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(0.5, 0.5, 0.5),
        };
        let point = instance.to_matrix() * Vector4::new(2.0, 0.0, 0.0, 1.0);
        assert_eq!(point, Vector4::new(2.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let world = Matrix4::from_nonuniform_scale(2.0, 1.0, 1.0);
        let normal = normal_matrix(&world) * Vector3::new(1.0, 0.0, 0.0);
        assert_eq!(normal, Vector3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn raw_layout_fits_attribute_offsets() {
        use model::Vertex;
        assert_eq!(std::mem::size_of::<InstanceRaw>(), 28 * 4);
        assert_eq!(InstanceRaw::desc().attributes.len(), 8);
    }
}
