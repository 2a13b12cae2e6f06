//! Scene lighting: ambient light, one directional light and the environment.
//!
//! The environment is a procedural stand-in for a prefiltered room map: a
//! bright "ceiling" colour above the horizon and a darker "floor" below. The
//! shader blurs the transition by roughness, which is enough to give metallic
//! surfaces something to reflect.

use cgmath::{InnerSpace, Vector3};
use wgpu::util::DeviceExt;

use crate::{config::SceneConfig, data_structures::colour::Rgb};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    ambient: [f32; 3],
    environment_intensity: f32,
    /// Unit vector pointing towards the light
    direction: [f32; 3],
    // Due to uniforms requiring 16 byte (4 float) spacing, we need to use a padding field here
    _padding: u32,
    colour: [f32; 3],
    _padding2: u32,
    sky: [f32; 3],
    _padding3: u32,
    ground: [f32; 3],
    _padding4: u32,
}

impl LightUniform {
    pub fn from_config(config: &SceneConfig) -> Self {
        let position = Vector3::from(config.directional_position);
        let direction = if position.magnitude2() > 0.0 {
            position.normalize()
        } else {
            Vector3::unit_y()
        };
        Self {
            ambient: Rgb::from_hex(config.ambient_colour)
                .scaled(config.ambient_intensity)
                .to_array(),
            environment_intensity: config.environment_intensity,
            direction: direction.into(),
            _padding: 0,
            colour: Rgb::from_hex(config.directional_colour)
                .scaled(config.directional_intensity)
                .to_array(),
            _padding2: 0,
            sky: Rgb::from_hex(config.environment_sky).to_array(),
            _padding3: 0,
            ground: Rgb::from_hex(config.environment_ground).to_array(),
            _padding4: 0,
        }
    }

    pub fn direction(&self) -> [f32; 3] {
        self.direction
    }
}

#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl LightResources {
    pub fn new(device: &wgpu::Device, uniform: LightUniform) -> Self {
        let buffer = mk_buffer(device, uniform);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer);
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }
}

fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("light_bind_group_layout"),
    })
}

fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: light_buffer.as_entire_binding(),
        }],
        label: Some("light_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 80);
    }

    #[test]
    fn defaults_scale_white_lights() {
        let uniform = LightUniform::from_config(&SceneConfig::default());
        assert!((uniform.ambient[0] - 0.6).abs() < 1e-5);
        assert!((uniform.colour[1] - 1.0).abs() < 1e-5);
        assert_eq!(uniform.environment_intensity, 1.0);
    }

    #[test]
    fn direction_points_from_origin_towards_the_light() {
        let uniform = LightUniform::from_config(&SceneConfig::default());
        let direction = Vector3::from(uniform.direction());
        let expected = Vector3::new(5.0, 10.0, 7.5).normalize();
        assert!((direction - expected).magnitude() < 1e-6);
    }
}
