use crate::{
    data_structures::{
        model::{Material, MaterialUniform},
        texture::Texture,
    },
    resources::scene::MaterialData,
};

/// Bind group 0 of the model shader: base colour map, normal map and the
/// material's scalar factors.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("Model material_bind_group_layout"),
    })
}

/// Upload every material of a scene. Missing maps are replaced by 1x1
/// textures, so every material binds the same layout.
pub fn load_materials(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    materials: &[MaterialData],
    images: &[image::DynamicImage],
) -> anyhow::Result<Vec<Material>> {
    materials
        .iter()
        .map(|material| {
            let name = material.name.as_str();
            // Base colour maps are sRGB, normal maps hold linear vectors
            let diffuse_texture = match material.base_colour_texture.and_then(|i| images.get(i)) {
                Some(image) => Texture::from_image(device, queue, image, Some(name), false),
                None => Texture::create_solid(device, queue, [255; 4], "white", true),
            };
            let normal_texture = match material.normal_texture.and_then(|i| images.get(i)) {
                Some(image) => Texture::from_image(device, queue, image, Some(name), true),
                None => Texture::create_solid(device, queue, Texture::FLAT_NORMAL, "flat normal", false),
            };
            let uniform = MaterialUniform::new(
                material.base_colour,
                material.metallic,
                material.roughness,
                material.alpha_mode,
            );
            Material::new(
                device,
                name,
                diffuse_texture,
                normal_texture,
                uniform,
                material.alpha_mode,
                material.double_sided,
                layout,
            )
        })
        .collect()
}
