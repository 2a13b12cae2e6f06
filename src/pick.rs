//! Ray picking.
//!
//! The pointer ray (see [`crate::camera::Camera::cast_ray`]) is tested against
//! the CPU copy of every mesh. Each mesh transforms the ray into its local
//! space once, rejects it early against its bounding box and then runs a
//! Möller–Trumbore test per triangle. Only the nearest hit per mesh is kept;
//! [`crate::data_structures::scene_graph::SceneGraph::raycast`] sorts the
//! per-mesh hits so the first entry is the object under the pointer.

use cgmath::{InnerSpace, Point3, Vector3};

use crate::camera::Ray;

const EPSILON: f32 = 1e-7;

/// A ray hit on a mesh. `distance` is measured in world units from the ray origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub distance: f32,
    pub point: Point3<f32>,
    pub id: u32,
}

/// Sort hits nearest first. NaN distances never come out of the triangle test,
/// so a total order over the finite values is enough.
pub fn sort_nearest_first(hits: &mut [Intersection]) {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}

/// Axis aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    /// Returns `None` for an empty point set.
    pub fn from_points<I: IntoIterator<Item = Point3<f32>>>(points: I) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self { min: first, max: first }, |aabb, p| Self {
            min: Point3::new(aabb.min.x.min(p.x), aabb.min.y.min(p.y), aabb.min.z.min(p.z)),
            max: Point3::new(aabb.max.x.max(p.x), aabb.max.y.max(p.y), aabb.max.z.max(p.z)),
        }))
    }

    pub fn centre(&self) -> Point3<f32> {
        Point3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    pub fn corners(&self) -> [Point3<f32>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }

    /// Slab test. True if the ray enters the box at or in front of its origin.
    pub fn intersects(&self, ray: &Ray) -> bool {
        let mut t_min = 0.0_f32;
        let mut t_max = f32::INFINITY;
        let origin = [ray.origin.x, ray.origin.y, ray.origin.z];
        let direction = [ray.direction.x, ray.direction.y, ray.direction.z];
        let min = [self.min.x, self.min.y, self.min.z];
        let max = [self.max.x, self.max.y, self.max.z];

        for axis in 0..3 {
            if direction[axis].abs() < EPSILON {
                if origin[axis] < min[axis] || origin[axis] > max[axis] {
                    return false;
                }
                continue;
            }
            let inverse = 1.0 / direction[axis];
            let mut t0 = (min[axis] - origin[axis]) * inverse;
            let mut t1 = (max[axis] - origin[axis]) * inverse;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}

/// Möller–Trumbore ray/triangle test. Returns the ray parameter of the hit.
///
/// Triangles are front facing when wound counter-clockwise towards the viewer;
/// with `cull_back_faces` hits from behind are ignored.
pub fn intersect_triangle(
    ray: &Ray,
    [a, b, c]: [Point3<f32>; 3],
    cull_back_faces: bool,
) -> Option<f32> {
    let edge1 = b - a;
    let edge2 = c - a;
    let p = ray.direction.cross(edge2);
    let det = edge1.dot(p);

    // Relative to the triangle's size, mesh units vary wildly between models
    let parallel = f32::EPSILON * edge1.magnitude() * edge2.magnitude() * ray.direction.magnitude();
    if cull_back_faces {
        if det <= parallel {
            return None;
        }
    } else if det.abs() <= parallel {
        return None;
    }

    let inverse_det = 1.0 / det;
    let s: Vector3<f32> = ray.origin - a;
    let u = s.dot(p) * inverse_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = ray.direction.dot(q) * inverse_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inverse_det;
    (t > EPSILON).then_some(t)
}

#[cfg(test)]
mod tests {
    use cgmath::EuclideanSpace;

    use super::*;

    fn triangle() -> [Point3<f32>; 3] {
        // Counter-clockwise when seen from +Z
        [
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn front_face_hit_reports_distance() {
        let ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
        let t = intersect_triangle(&ray, triangle(), true).unwrap();
        assert!((t - 5.0).abs() < 1e-5);
    }

    #[test]
    fn back_faces_are_culled_unless_double_sided() {
        let ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(intersect_triangle(&ray, triangle(), true), None);
        assert!(intersect_triangle(&ray, triangle(), false).is_some());
    }

    #[test]
    fn misses_and_hits_behind_the_origin_are_rejected() {
        let beside = Ray::new(Point3::new(3.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(intersect_triangle(&beside, triangle(), false), None);
        let away = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(intersect_triangle(&away, triangle(), false), None);
        let parallel = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(intersect_triangle(&parallel, triangle(), false), None);
    }

    #[test]
    fn tiny_triangles_are_still_hit() {
        let small = triangle().map(|corner| Point3::from_vec(corner.to_vec() * 1e-4));
        let ray = Ray::new(Point3::new(0.0, 0.0, 0.01), Vector3::new(0.0, 0.0, -1.0));
        let t = intersect_triangle(&ray, small, true).unwrap();
        assert!((t - 0.01).abs() < 1e-6);

        let degenerate = [Point3::new(0.0, 0.0, 0.0); 3];
        assert_eq!(intersect_triangle(&ray, degenerate, false), None);
    }

    #[test]
    fn aabb_slab_test() {
        let aabb = Aabb::from_points(triangle()).unwrap();
        assert_eq!(aabb.min, Point3::new(-1.0, -1.0, 0.0));
        assert_eq!(aabb.centre(), Point3::new(0.0, 0.0, 0.0));

        let through = Ray::new(Point3::new(0.5, 0.5, 5.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(aabb.intersects(&through));
        let beside = Ray::new(Point3::new(2.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(!aabb.intersects(&beside));
        let behind = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(!aabb.intersects(&behind));
        let diagonal = Ray::new(Point3::new(-5.0, -5.0, 0.0), Vector3::new(1.0, 1.0, 0.0));
        assert!(aabb.intersects(&diagonal));
    }

    #[test]
    fn empty_point_set_has_no_bounds() {
        assert_eq!(Aabb::from_points(Vec::new()), None);
    }

    #[test]
    fn sorting_puts_nearest_first() {
        let hit = |distance, id| Intersection {
            distance,
            point: Point3::new(0.0, 0.0, 0.0),
            id,
        };
        let mut hits = vec![hit(3.0, 1), hit(1.0, 2), hit(2.0, 3)];
        sort_nearest_first(&mut hits);
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![2, 3, 1]);
    }
}
