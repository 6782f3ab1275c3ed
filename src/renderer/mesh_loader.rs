// renderer/mesh_loader.rs
use std::path::Path;

use glam::{Mat3, Mat4, Vec2, Vec3};

use crate::error::{RenderError, RenderResult};
use crate::renderer::Vertex;

/// CPU-side geometry ready for upload.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// Loads every mesh of a glTF file's default scene into one index buffer,
/// baking node transforms and converting to the left-handed world.
pub fn load_gltf_mesh(path: &Path) -> RenderResult<MeshData> {
    let asset = path.display().to_string();
    let (document, buffers, _images) =
        gltf::import(path).map_err(|err| RenderError::asset(&asset, err))?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| RenderError::asset(&asset, "file contains no scene"))?;

    let mut mesh = MeshData::default();
    for node in scene.nodes() {
        append_node(&node, Mat4::IDENTITY, &buffers, &mut mesh)
            .map_err(|reason| RenderError::asset(&asset, reason))?;
    }

    if mesh.indices.is_empty() {
        return Err(RenderError::asset(&asset, "no triangles found"));
    }

    log::debug!(
        "Loaded {}: {} vertices, {} indices",
        asset,
        mesh.vertices.len(),
        mesh.indices.len()
    );
    Ok(to_left_handed(mesh))
}

fn append_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut MeshData,
) -> Result<(), String> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(gltf_mesh) = node.mesh() {
        for primitive in gltf_mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!("Skipping non-triangle primitive in mesh {:?}", gltf_mesh.name());
                continue;
            }
            append_primitive(&primitive, world, buffers, out)?;
        }
    }

    for child in node.children() {
        append_node(&child, world, buffers, out)?;
    }
    Ok(())
}

fn append_primitive(
    primitive: &gltf::Primitive,
    world: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut MeshData,
) -> Result<(), String> {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions = reader
        .read_positions()
        .ok_or("Missing positions")?
        .collect::<Vec<_>>();

    let normals = reader
        .read_normals()
        .map(|n| n.collect::<Vec<_>>())
        .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; positions.len()]);

    let uvs = reader
        .read_tex_coords(0)
        .map(|uv| uv.into_f32().collect::<Vec<_>>())
        .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);

    let indices = reader
        .read_indices()
        .map(|i| i.into_u32().collect::<Vec<_>>())
        .unwrap_or_else(|| (0..positions.len() as u32).collect());

    let tangents = reader
        .read_tangents()
        .map(|t| t.collect::<Vec<_>>())
        .unwrap_or_else(|| generate_tangents(&positions, &normals, &uvs, &indices));

    let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
    let base = out.vertices.len() as u32;

    out.vertices.extend(
        positions
            .iter()
            .zip(&normals)
            .zip(&uvs)
            .zip(&tangents)
            .map(|(((pos, normal), uv), tangent)| {
                let p = world.transform_point3(Vec3::from(*pos));
                let n = (normal_matrix * Vec3::from(*normal)).normalize_or_zero();
                let t = Mat3::from_mat4(world)
                    .mul_vec3(Vec3::new(tangent[0], tangent[1], tangent[2]))
                    .normalize_or_zero();
                Vertex {
                    pos: p.into(),
                    normal: n.into(),
                    uv: *uv,
                    tangent: [t.x, t.y, t.z, tangent[3]],
                }
            }),
    );
    out.indices.extend(indices.iter().map(|i| base + i));
    Ok(())
}

/// Mirrors Z and flips triangle winding so right-handed glTF geometry keeps
/// its shape and outward faces in the left-handed world.
pub fn to_left_handed(mut mesh: MeshData) -> MeshData {
    for v in &mut mesh.vertices {
        v.pos[2] = -v.pos[2];
        v.normal[2] = -v.normal[2];
        v.tangent[2] = -v.tangent[2];
        v.tangent[3] = -v.tangent[3];
    }
    for tri in mesh.indices.chunks_exact_mut(3) {
        tri.swap(1, 2);
    }
    mesh
}

/// Per-vertex tangents from triangle uv gradients, with the bitangent sign in `w`.
pub fn generate_tangents(
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    uvs: &[[f32; 2]],
    indices: &[u32],
) -> Vec<[f32; 4]> {
    let vertex_count = positions.len();
    let mut tangents = vec![Vec3::ZERO; vertex_count];
    let mut bitangents = vec![Vec3::ZERO; vertex_count];

    for triangle in indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
        if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
            continue;
        }

        let edge1 = Vec3::from(positions[i1]) - Vec3::from(positions[i0]);
        let edge2 = Vec3::from(positions[i2]) - Vec3::from(positions[i0]);
        let duv1 = Vec2::from(uvs[i1]) - Vec2::from(uvs[i0]);
        let duv2 = Vec2::from(uvs[i2]) - Vec2::from(uvs[i0]);

        let f = 1.0 / (duv1.x * duv2.y - duv2.x * duv1.y);
        if !f.is_finite() {
            continue;
        }
        let tangent = (edge1 * duv2.y - edge2 * duv1.y) * f;
        let bitangent = (edge2 * duv1.x - edge1 * duv2.x) * f;

        for i in [i0, i1, i2] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
        }
    }

    tangents
        .iter()
        .zip(&bitangents)
        .zip(normals)
        .map(|((t, b), n)| {
            let normal = Vec3::from(*n);
            let mut tangent = (*t - normal * normal.dot(*t)).normalize_or_zero();
            if tangent.length_squared() < 1e-4 {
                tangent = if normal.y.abs() < 0.999 {
                    Vec3::Y.cross(normal).normalize()
                } else {
                    Vec3::X.cross(normal).normalize()
                };
            }
            let handedness = if normal.cross(tangent).dot(*b) < 0.0 {
                -1.0
            } else {
                1.0
            };
            [tangent.x, tangent.y, tangent.z, handedness]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tangent_follows_increasing_u() {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let normals = [[0.0, 0.0, 1.0]; 3];
        let uvs = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let tangents = generate_tangents(&positions, &normals, &uvs, &[0, 1, 2]);

        for t in tangents {
            assert!(Vec3::new(t[0], t[1], t[2]).abs_diff_eq(Vec3::X, 1e-5));
            assert_eq!(t[3], 1.0);
        }
    }

    #[test]
    fn degenerate_uvs_fall_back_to_perpendicular_tangent() {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let normals = [[0.0, 1.0, 0.0]; 3];
        let uvs = [[0.0, 0.0]; 3];
        let tangents = generate_tangents(&positions, &normals, &uvs, &[0, 1, 2]);
        for t in tangents {
            let t = Vec3::new(t[0], t[1], t[2]);
            assert!((t.length() - 1.0).abs() < 1e-5);
            assert!(t.dot(Vec3::Y).abs() < 1e-5);
        }
    }

    #[test]
    fn left_handed_conversion_mirrors_z_and_flips_winding() {
        let vertex = |z: f32| Vertex {
            pos: [0.0, 0.0, z],
            normal: [0.0, 0.0, 1.0],
            uv: [0.0, 0.0],
            tangent: [1.0, 0.0, 0.0, 1.0],
        };
        let mesh = MeshData {
            vertices: vec![vertex(1.0), vertex(2.0), vertex(3.0)],
            indices: vec![0, 1, 2],
        };
        let converted = to_left_handed(mesh);
        assert_eq!(converted.vertices[1].pos[2], -2.0);
        assert_eq!(converted.vertices[0].normal[2], -1.0);
        assert_eq!(converted.vertices[0].tangent[3], -1.0);
        assert_eq!(converted.indices, vec![0, 2, 1]);
    }

    #[test]
    fn missing_file_reports_asset_error() {
        let err = load_gltf_mesh(Path::new("does/not/exist.glb")).unwrap_err();
        assert!(matches!(err, RenderError::AssetLoadFailed { .. }));
    }
}
