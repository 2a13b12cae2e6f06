//! Camera, projection and pointer rays.
//!
//! The camera always looks at a target point with +Y up; the [`orbit`]
//! controller moves the eye around that target. Rays for picking are built by
//! unprojecting the pointer's normalised device coordinates through the inverse
//! view-projection matrix.

pub mod orbit;

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector2, Vector3, Vector4, perspective};
use wgpu::util::DeviceExt;
use winit::dpi::{PhysicalPosition, PhysicalSize};

pub use orbit::OrbitController;

/// cgmath builds OpenGL style clip space (z in -1..1), wgpu expects z in 0..1.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, T: Into<Point3<f32>>>(position: P, target: T) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, Vector3::unit_y())
    }

    /// Cast a ray from the eye through `ndc` (both axes in -1..1, +Y up).
    ///
    /// Returns `None` when the view-projection matrix cannot be inverted, which
    /// only happens for degenerate cameras (eye == target or zero aspect).
    pub fn cast_ray(&self, ndc: Vector2<f32>, projection: &Projection) -> Option<Ray> {
        let view_proj = projection.calc_matrix() * self.calc_matrix();
        let inverse = view_proj.invert()?;
        // Any depth works for a perspective camera, the ray starts at the eye anyway.
        let far = inverse * Vector4::new(ndc.x, ndc.y, 1.0, 1.0);
        if far.w.abs() < f32::EPSILON {
            return None;
        }
        let far = Point3::from_vec(far.truncate() / far.w);
        let direction = far - self.position;
        if direction.magnitude2() < f32::EPSILON {
            return None;
        }
        Some(Ray::new(self.position, direction))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    /// Keep the aspect ratio in sync with the surface. Zero sized surfaces
    /// (minimised windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// A half line used for picking. `direction` is always normalised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, distance: f32) -> Point3<f32> {
        self.origin + self.direction * distance
    }

    /// Transform into another space. The direction is renormalised, so
    /// distances along the result are in the new space's units.
    pub fn transform(&self, matrix: &Matrix4<f32>) -> Ray {
        let origin = *matrix * self.origin.to_homogeneous();
        let origin = Point3::from_vec(origin.truncate() / origin.w);
        let direction = (*matrix * self.direction.extend(0.0)).truncate();
        Ray::new(origin, direction)
    }
}

/// Convert a window pixel position into normalised device coordinates.
pub fn pointer_to_ndc(position: PhysicalPosition<f64>, size: PhysicalSize<u32>) -> Vector2<f32> {
    if size.width == 0 || size.height == 0 {
        return Vector2::new(0.0, 0.0);
    }
    Vector2::new(
        (position.x / f64::from(size.width) * 2.0 - 1.0) as f32,
        (-(position.y / f64::from(size.height)) * 2.0 + 1.0) as f32,
    )
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Camera state plus everything the GPU needs to see it.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(
        device: &wgpu::Device,
        camera: Camera,
        controller: OrbitController,
        projection: &Projection,
    ) -> Self {
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, projection);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
            label: Some("camera_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            camera,
            controller,
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn write_to_buffer(&mut self, queue: &wgpu::Queue, projection: &Projection) {
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Deg;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn resize_keeps_aspect_equal_to_width_over_height() {
        let mut projection = Projection::new(1280, 720, Deg(40.0), 1.0, 100.0);
        for (width, height) in [(800, 600), (1, 1000), (1920, 1080), (333, 777)] {
            projection.resize(width, height);
            assert_eq!(projection.aspect(), width as f32 / height as f32);
        }
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let mut projection = Projection::new(800, 400, Deg(40.0), 1.0, 100.0);
        projection.resize(0, 300);
        assert_eq!(projection.aspect(), 2.0);
    }

    #[test]
    fn pointer_corners_map_to_ndc_corners() {
        let size = PhysicalSize::new(200, 100);
        let top_left = pointer_to_ndc(PhysicalPosition::new(0.0, 0.0), size);
        let bottom_right = pointer_to_ndc(PhysicalPosition::new(200.0, 100.0), size);
        let centre = pointer_to_ndc(PhysicalPosition::new(100.0, 50.0), size);
        assert_eq!(top_left, Vector2::new(-1.0, 1.0));
        assert_eq!(bottom_right, Vector2::new(1.0, -1.0));
        assert_eq!(centre, Vector2::new(0.0, 0.0));
    }

    #[test]
    fn centre_ray_points_at_target() {
        let camera = Camera::new((15.0, 5.0, 5.0), (0.0, 0.5, 0.0));
        let projection = Projection::new(1280, 720, Deg(40.0), 1.0, 100.0);
        let ray = camera.cast_ray(Vector2::new(0.0, 0.0), &projection).unwrap();
        let expected = (camera.target - camera.position).normalize();
        assert_eq!(ray.origin, camera.position);
        assert!(approx(ray.direction.dot(expected), 1.0));
    }

    #[test]
    fn right_edge_ray_leans_right() {
        let camera = Camera::new((0.0, 0.0, 10.0), (0.0, 0.0, 0.0));
        let projection = Projection::new(100, 100, Deg(90.0), 0.1, 100.0);
        let ray = camera.cast_ray(Vector2::new(1.0, 0.0), &projection).unwrap();
        // 90 degree fov, so the edge of the screen is 45 degrees off axis.
        assert!(approx(ray.direction.x, ray.direction.z.abs()));
        assert!(ray.direction.x > 0.0);
        assert!(approx(ray.direction.y, 0.0));
    }

    #[test]
    fn ray_transform_preserves_hit_point() {
        let ray = Ray::new(Point3::new(0.0, 0.0, 10.0), Vector3::new(0.0, 0.0, -1.0));
        let to_local = Matrix4::from_scale(2.0) * Matrix4::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let local = ray.transform(&to_local);
        assert_eq!(local.origin, Point3::new(2.0, 0.0, 20.0));
        assert!(approx(local.direction.magnitude(), 1.0));
    }
}
