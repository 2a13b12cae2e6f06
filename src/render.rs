//! Render composition and pipeline batching.
//!
//! Scene nodes describe what they want drawn as a [`Render`] tree. Before the
//! render pass the tree is flattened into [`Batches`], one per pipeline:
//! opaque single sided meshes (back faces culled), opaque double sided meshes
//! and alpha blended meshes. Blended meshes are drawn last and back to front.
//! Mirrored meshes use the clockwise variant of their batch's pipeline.

use std::cmp::Ordering;

use cgmath::{InnerSpace, Point3};
use wgpu::RenderPass;

use crate::{
    data_structures::model::{DrawModel, Material, Mesh},
    pipelines::Pipelines,
};

/// Everything needed to draw one mesh once.
#[derive(Debug, Clone, Copy)]
pub struct Drawable<'a> {
    pub mesh: &'a Mesh,
    pub material: &'a Material,
    pub instance: &'a wgpu::Buffer,
    pub id: u32,
    /// World space centre, for depth sorting
    pub centre: Point3<f32>,
    pub double_sided: bool,
    /// World transform with a negative determinant
    pub mirrored: bool,
}

/// Specifies how a scene object should be rendered.
///
/// - `None` renders nothing
/// - `Default(Drawable)` renders a single opaque (or alpha masked) mesh
/// - `Transparent(Drawable)` renders a single alpha blended mesh
/// - `Composed(Vec<Render>)` recursively renders composition of multiple renders
#[derive(Debug)]
pub enum Render<'a> {
    None,
    Default(Drawable<'a>),
    Transparent(Drawable<'a>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    pub fn set_pipelines(self, batches: &mut Batches<'a>) {
        match self {
            Render::Default(drawable) => batches.push_opaque(drawable),
            Render::Transparent(drawable) => batches.transparents.push(drawable),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(batches)),
            Render::None => (),
        }
    }
}

#[derive(Debug, Default)]
pub struct Batches<'a> {
    pub basics: Vec<Drawable<'a>>,
    pub double_sided: Vec<Drawable<'a>>,
    pub transparents: Vec<Drawable<'a>>,
}

impl<'a> Batches<'a> {
    fn push_opaque(&mut self, drawable: Drawable<'a>) {
        if drawable.double_sided {
            self.double_sided.push(drawable);
        } else {
            self.basics.push(drawable);
        }
    }

    pub fn len(&self) -> usize {
        self.basics.len() + self.double_sided.len() + self.transparents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Farthest first, so nearer blended surfaces are composited on top.
    pub fn sort_transparents(&mut self, eye: Point3<f32>) {
        self.transparents
            .sort_by(|a, b| back_to_front(eye, a.centre, b.centre));
    }

    pub fn draw<'p>(
        mut self,
        render_pass: &mut RenderPass<'p>,
        pipelines: &'a Pipelines,
        eye: Point3<f32>,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
    ) where
        'a: 'p,
    {
        self.sort_transparents(eye);
        let passes = [
            (&pipelines.basic, &self.basics),
            (&pipelines.double_sided, &self.double_sided),
            (&pipelines.transparent, &self.transparents),
        ];
        for (windings, drawables) in passes {
            let mut bound = None;
            for drawable in drawables {
                if bound != Some(drawable.mirrored) {
                    render_pass.set_pipeline(windings.get(drawable.mirrored));
                    bound = Some(drawable.mirrored);
                }
                render_pass.set_vertex_buffer(1, drawable.instance.slice(..));
                render_pass.draw_mesh_instanced(
                    drawable.mesh,
                    drawable.material,
                    0..1,
                    camera_bind_group,
                    light_bind_group,
                );
            }
        }
    }
}

/// Orders `a` before `b` if it is farther from `eye`.
pub fn back_to_front(eye: Point3<f32>, a: Point3<f32>, b: Point3<f32>) -> Ordering {
    let a = (a - eye).magnitude2();
    let b = (b - eye).magnitude2();
    b.total_cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blended_meshes_sort_farthest_first() {
        let eye = Point3::new(0.0, 0.0, 10.0);
        let mut centres = vec![
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(0.0, 0.0, -5.0),
            Point3::new(3.0, 0.0, 9.0),
            Point3::new(0.0, 0.0, 0.0),
        ];
        centres.sort_by(|a, b| back_to_front(eye, *a, *b));
        assert_eq!(
            centres,
            vec![
                Point3::new(0.0, 0.0, -5.0),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 5.0),
                Point3::new(3.0, 0.0, 9.0),
            ]
        );
    }

    #[test]
    fn equal_distances_keep_their_order() {
        let eye = Point3::new(0.0, 0.0, 0.0);
        let left = Point3::new(-1.0, 0.0, 0.0);
        let right = Point3::new(1.0, 0.0, 0.0);
        assert_eq!(back_to_front(eye, left, right), Ordering::Equal);
        let mut centres = vec![left, right];
        centres.sort_by(|a, b| back_to_front(eye, *a, *b));
        assert_eq!(centres, vec![left, right]);
    }
}
