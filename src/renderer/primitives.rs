use super::vertex::{v, Vertex};
use glam::Vec3;
use std::f32::consts::PI;

/// Unit sphere centred on the origin.
pub fn sphere_mesh(segments: u32, rings: u32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
    let mut indices = Vec::with_capacity((segments * rings * 6) as usize);

    for ring in 0..=rings {
        let phi = PI * ring as f32 / rings as f32;
        let y = phi.cos();
        let ring_radius = phi.sin();

        for segment in 0..=segments {
            let theta = 2.0 * PI * segment as f32 / segments as f32;
            let x = ring_radius * theta.cos();
            let z = ring_radius * theta.sin();

            let u = segment as f32 / segments as f32;
            let tex_v = ring as f32 / rings as f32;
            let tangent = [-theta.sin(), 0.0, theta.cos(), 1.0];

            vertices.push(v([x, y, z], [x, y, z], [u, tex_v], tangent));
        }
    }

    for ring in 0..rings {
        for segment in 0..segments {
            let current = ring * (segments + 1) + segment;
            let next = current + segments + 1;

            indices.extend_from_slice(&[current, current + 1, next]);
            indices.extend_from_slice(&[current + 1, next + 1, next]);
        }
    }

    (vertices, indices)
}

/// Unit cube centred on the origin, four vertices per face so each face has
/// its own normal, uvs and tangent.
pub fn cube_mesh() -> (Vec<Vertex>, Vec<u32>) {
    // (normal, tangent) per face. Corners are generated from these so the uv
    // origin sits in the top-left of every face.
    const FACES: [([f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0]),
        ([0.0, 0.0, 1.0], [-1.0, 0.0, 0.0]),
        ([0.0, 0.0, -1.0], [1.0, 0.0, 0.0]),
    ];

    let mut verts = Vec::with_capacity(24);
    for (normal, tangent) in FACES {
        let n = Vec3::from(normal);
        let t = Vec3::from(tangent);
        let down = n.cross(t);
        let centre = n * 0.5;
        let corner = |u: f32, tex_v: f32| {
            let pos = centre + t * (u - 0.5) + down * (tex_v - 0.5);
            v(pos.into(), normal, [u, tex_v], [t.x, t.y, t.z, 1.0])
        };
        verts.push(corner(0.0, 1.0));
        verts.push(corner(0.0, 0.0));
        verts.push(corner(1.0, 0.0));
        verts.push(corner(1.0, 1.0));
    }

    (verts, quad_indices(6))
}

/// Flat ground plane on y = 0 spanning `size` units, with uvs repeating
/// `tiles` times so floor textures stay crisp.
pub fn plane_mesh(size: f32, tiles: f32) -> (Vec<Vertex>, Vec<u32>) {
    let h = size * 0.5;
    let up = [0.0, 1.0, 0.0];
    let tangent = [1.0, 0.0, 0.0, 1.0];
    let verts = vec![
        v([-h, 0.0, -h], up, [0.0, tiles], tangent),
        v([-h, 0.0, h], up, [0.0, 0.0], tangent),
        v([h, 0.0, h], up, [tiles, 0.0], tangent),
        v([h, 0.0, -h], up, [tiles, tiles], tangent),
    ];
    (verts, quad_indices(1))
}

/// Unit quad in the XY plane facing -Z, used for decals and light flares.
pub fn quad_mesh() -> (Vec<Vertex>, Vec<u32>) {
    let normal = [0.0, 0.0, -1.0];
    let tangent = [1.0, 0.0, 0.0, 1.0];
    let verts = vec![
        v([-0.5, -0.5, 0.0], normal, [0.0, 1.0], tangent),
        v([-0.5, 0.5, 0.0], normal, [0.0, 0.0], tangent),
        v([0.5, 0.5, 0.0], normal, [1.0, 0.0], tangent),
        v([0.5, -0.5, 0.0], normal, [1.0, 1.0], tangent),
    ];
    (verts, quad_indices(1))
}

fn quad_indices(quads: u32) -> Vec<u32> {
    (0..quads)
        .flat_map(|f| {
            let o = f * 4;
            [o, o + 1, o + 2, o, o + 2, o + 3]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_counts_look_right() {
        let (v, i) = cube_mesh();
        assert_eq!(v.len(), 24);
        assert_eq!(i.len(), 36);
    }

    #[test]
    fn cube_faces_wind_clockwise_seen_from_outside() {
        let (verts, idx) = cube_mesh();
        for tri in idx.chunks(3) {
            let a = Vec3::from(verts[tri[0] as usize].pos);
            let b = Vec3::from(verts[tri[1] as usize].pos);
            let c = Vec3::from(verts[tri[2] as usize].pos);
            let normal = Vec3::from(verts[tri[0] as usize].normal);
            // Left-handed clockwise winding: (b - a) x (c - a) points outward.
            let face = (b - a).cross(c - a).normalize();
            assert!(face.abs_diff_eq(normal, 1e-5), "{face:?} vs {normal:?}");
        }
    }

    #[test]
    fn cube_corners_are_unit_sized() {
        let (verts, _) = cube_mesh();
        for vert in verts {
            for c in vert.pos {
                assert!((c.abs() - 0.5).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn plane_and_quad_face_their_normals() {
        for (verts, idx) in [plane_mesh(10.0, 4.0), quad_mesh()] {
            let a = Vec3::from(verts[idx[0] as usize].pos);
            let b = Vec3::from(verts[idx[1] as usize].pos);
            let c = Vec3::from(verts[idx[2] as usize].pos);
            let face = (b - a).cross(c - a).normalize();
            assert!(face.abs_diff_eq(Vec3::from(verts[0].normal), 1e-5));
        }
    }

    #[test]
    fn sphere_vertices_lie_on_unit_sphere() {
        let (verts, idx) = sphere_mesh(16, 8);
        assert_eq!(verts.len(), 17 * 9);
        assert_eq!(idx.len(), 16 * 8 * 6);
        for vert in &verts {
            assert!((Vec3::from(vert.pos).length() - 1.0).abs() < 1e-5);
        }
        for tri in idx.chunks(3) {
            let a = Vec3::from(verts[tri[0] as usize].pos);
            let b = Vec3::from(verts[tri[1] as usize].pos);
            let c = Vec3::from(verts[tri[2] as usize].pos);
            let face = (b - a).cross(c - a);
            if face.length_squared() < 1e-10 {
                continue; // collapsed at the poles
            }
            assert!(face.dot(a + b + c) > 0.0);
        }
    }
}
