use cgmath::{InnerSpace, Vector2, Vector3};

use crate::data_structures::model::ModelVertex;

/**
 * Not every glTF file ships normals. Flat shading is not what the original
 * artist intended, but smooth area-weighted vertex normals are the usual
 * fallback and what other viewers do as well.
 */
pub fn compute_normals(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut normals = vec![Vector3::new(0.0_f32, 0.0, 0.0); vertices.len()];
    for c in indices.chunks_exact(3) {
        let [i0, i1, i2] = [c[0] as usize, c[1] as usize, c[2] as usize];
        let pos0: Vector3<f32> = vertices[i0].position.into();
        let pos1: Vector3<f32> = vertices[i1].position.into();
        let pos2: Vector3<f32> = vertices[i2].position.into();
        // The cross product's length is twice the triangle area, so bigger
        // faces weigh more.
        let face = (pos1 - pos0).cross(pos2 - pos0);
        normals[i0] += face;
        normals[i1] += face;
        normals[i2] += face;
    }
    for (vertex, normal) in vertices.iter_mut().zip(normals) {
        vertex.normal = if normal.magnitude2() > f32::EPSILON {
            normal.normalize().into()
        } else {
            [0.0, 1.0, 0.0]
        };
    }
}

/**
 * Normal maps need a tangent frame per vertex. glTF files without a TANGENT
 * attribute get one derived from the texture coordinates.
 */
pub fn compute_tangents(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut tangents = vec![Vector3::new(0.0_f32, 0.0, 0.0); vertices.len()];
    let mut bitangents = vec![Vector3::new(0.0_f32, 0.0, 0.0); vertices.len()];
    let mut triangles_included = vec![0_u32; vertices.len()];

    // Calculate tangents and bitangents. We're going to use the triangles, so
    // we need to loop through the indices in chunks of 3
    for c in indices.chunks_exact(3) {
        let [i0, i1, i2] = [c[0] as usize, c[1] as usize, c[2] as usize];
        let v0 = vertices[i0];
        let v1 = vertices[i1];
        let v2 = vertices[i2];

        let pos0: Vector3<f32> = v0.position.into();
        let pos1: Vector3<f32> = v1.position.into();
        let pos2: Vector3<f32> = v2.position.into();

        let uv0: Vector2<f32> = v0.tex_coords.into();
        let uv1: Vector2<f32> = v1.tex_coords.into();
        let uv2: Vector2<f32> = v2.tex_coords.into();

        // Calculate the edges of the triangle
        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;

        // This will give us a direction to calculate the tangent and bitangent
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        // Solving
        //     delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        // for T and B. Triangles with collapsed uvs have no solution.
        let denominator = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if denominator.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / denominator;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        // glTF's v axis points down the image, flip the bitangent so it points
        // up like the normal map's green channel
        let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * -r;

        for i in [i0, i1, i2] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
            triangles_included[i] += 1;
        }
    }

    // Average the tangents/bitangents
    for (i, vertex) in vertices.iter_mut().enumerate() {
        let normal = Vector3::from(vertex.normal);
        let (tangent, bitangent) = if triangles_included[i] == 0 {
            arbitrary_frame(normal)
        } else {
            let denom = 1.0 / triangles_included[i] as f32;
            (tangents[i] * denom, bitangents[i] * denom)
        };
        vertex.tangent = tangent.into();
        vertex.bitangent = bitangent.into();
    }
}

/// glTF stores the tangent as xyz plus the bitangent's sign in w.
pub fn apply_tangents<I: IntoIterator<Item = [f32; 4]>>(vertices: &mut [ModelVertex], tangents: I) {
    for (vertex, tangent) in vertices.iter_mut().zip(tangents) {
        let tangent: cgmath::Vector4<f32> = tangent.into();
        let normal = Vector3::from(vertex.normal);
        vertex.tangent = tangent.truncate().into();
        vertex.bitangent = (normal.cross(tangent.truncate()) * tangent.w).into();
    }
}

/// Any tangent frame perpendicular to `normal`, used where uvs give no direction.
fn arbitrary_frame(normal: Vector3<f32>) -> (Vector3<f32>, Vector3<f32>) {
    let helper = if normal.x.abs() < 0.9 {
        Vector3::unit_x()
    } else {
        Vector3::unit_y()
    };
    let tangent = normal.cross(helper).normalize();
    let bitangent = normal.cross(tangent);
    (tangent, bitangent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(position: [f32; 3], tex_coords: [f32; 2]) -> ModelVertex {
        ModelVertex {
            position,
            tex_coords,
            ..Default::default()
        }
    }

    /// A unit quad in the XY plane facing +Z, uvs in glTF orientation (v down).
    fn quad() -> (Vec<ModelVertex>, Vec<u32>) {
        let vertices = vec![
            vertex([0.0, 0.0, 0.0], [0.0, 1.0]),
            vertex([1.0, 0.0, 0.0], [1.0, 1.0]),
            vertex([1.0, 1.0, 0.0], [1.0, 0.0]),
            vertex([0.0, 1.0, 0.0], [0.0, 0.0]),
        ];
        (vertices, vec![0, 1, 2, 0, 2, 3])
    }

    #[test]
    fn computed_normals_face_the_winding_side() {
        let (mut vertices, indices) = quad();
        compute_normals(&mut vertices, &indices);
        for v in &vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn unreferenced_vertices_get_a_default_normal() {
        let (mut vertices, indices) = quad();
        vertices.push(vertex([5.0, 5.0, 5.0], [0.0, 0.0]));
        compute_normals(&mut vertices, &indices);
        assert_eq!(vertices[4].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn tangents_follow_u_and_bitangents_point_up() {
        let (mut vertices, indices) = quad();
        compute_normals(&mut vertices, &indices);
        compute_tangents(&mut vertices, &indices);
        for v in &vertices {
            assert!((v.tangent[0] - 1.0).abs() < 1e-5, "{:?}", v.tangent);
            assert!((v.bitangent[1] - 1.0).abs() < 1e-5, "{:?}", v.bitangent);
        }
    }

    #[test]
    fn collapsed_uvs_fall_back_to_a_perpendicular_frame() {
        let (mut vertices, indices) = quad();
        vertices.iter_mut().for_each(|v| v.tex_coords = [0.5, 0.5]);
        compute_normals(&mut vertices, &indices);
        compute_tangents(&mut vertices, &indices);
        for v in &vertices {
            let tangent = Vector3::from(v.tangent);
            assert!(tangent.x.is_finite());
            assert!(tangent.dot(Vector3::from(v.normal)).abs() < 1e-5);
            assert!((tangent.magnitude() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn gltf_tangent_sign_flips_the_bitangent() {
        let (mut vertices, _) = quad();
        vertices.iter_mut().for_each(|v| v.normal = [0.0, 0.0, 1.0]);
        apply_tangents(&mut vertices, std::iter::repeat([1.0, 0.0, 0.0, -1.0]));
        assert_eq!(vertices[0].tangent, [1.0, 0.0, 0.0]);
        assert_eq!(vertices[0].bitangent, [0.0, -1.0, 0.0]);
    }
}
