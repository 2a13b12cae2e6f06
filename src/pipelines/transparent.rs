use crate::{
    data_structures::{
        instance::InstanceRaw,
        model::{ModelVertex, Vertex},
        texture::Texture,
    },
    pipelines::basic::{Target, mk_render_pipeline, model_shader},
};

/**
 * Pipeline for glTF materials in `BLEND` mode.
 *
 * Blended meshes are drawn after everything opaque, sorted back to front. They
 * test against the depth buffer but don't write to it, and both faces are drawn
 * so the inside of glassy objects shows through.
 */
pub fn mk_transparent_pipeline(
    device: &wgpu::Device,
    target: Target,
    layout: &wgpu::PipelineLayout,
    front_face: wgpu::FrontFace,
) -> wgpu::RenderPipeline {
    mk_render_pipeline(
        device,
        layout,
        target,
        Some(wgpu::BlendState::ALPHA_BLENDING),
        Some(Texture::DEPTH_FORMAT),
        &[ModelVertex::desc(), InstanceRaw::desc()],
        model_shader(),
        front_face,
        None,
        false,
    )
}
