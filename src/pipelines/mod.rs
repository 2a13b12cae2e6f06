//! Render pipelines.
//!
//! All meshes share the model shader and one pipeline layout: material (group
//! 0), camera (group 1) and light (group 2). The pipelines only differ in face
//! culling, blending and depth writes. Each comes in both windings, mirrored
//! meshes are drawn with clockwise front faces so culling and the shader's
//! `front_facing` still agree with the mesh's own winding.

pub mod basic;
pub mod transparent;

/// The same pipeline with counter-clockwise and clockwise front faces.
#[derive(Debug)]
pub struct Windings {
    pub ccw: wgpu::RenderPipeline,
    pub cw: wgpu::RenderPipeline,
}

impl Windings {
    fn new(build: impl Fn(wgpu::FrontFace) -> wgpu::RenderPipeline) -> Self {
        Self {
            ccw: build(front_face(false)),
            cw: build(front_face(true)),
        }
    }

    pub fn get(&self, mirrored: bool) -> &wgpu::RenderPipeline {
        if mirrored { &self.cw } else { &self.ccw }
    }
}

/// glTF triangles are counter-clockwise, a mirroring transform reverses them.
pub fn front_face(mirrored: bool) -> wgpu::FrontFace {
    if mirrored {
        wgpu::FrontFace::Cw
    } else {
        wgpu::FrontFace::Ccw
    }
}

#[derive(Debug)]
pub struct Pipelines {
    pub basic: Windings,
    pub double_sided: Windings,
    pub transparent: Windings,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        sample_count: u32,
        material_layout: &wgpu::BindGroupLayout,
        camera_layout: &wgpu::BindGroupLayout,
        light_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Model Pipeline Layout"),
            bind_group_layouts: &[material_layout, camera_layout, light_layout],
            push_constant_ranges: &[],
        });
        let target = basic::Target {
            format,
            sample_count,
        };
        Self {
            basic: Windings::new(|front_face| basic::mk_basic_pipeline(device, target, &layout, false, front_face)),
            double_sided: Windings::new(|front_face| {
                basic::mk_basic_pipeline(device, target, &layout, true, front_face)
            }),
            transparent: Windings::new(|front_face| {
                transparent::mk_transparent_pipeline(device, target, &layout, front_face)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrored_meshes_flip_the_front_face() {
        assert_eq!(front_face(false), wgpu::FrontFace::Ccw);
        assert_eq!(front_face(true), wgpu::FrontFace::Cw);
    }
}
