use super::techniques::catalog;
use crate::error::RenderResult;
use crate::renderer::backend::{MeshId, RenderBackend};
use crate::renderer::primitives::{cube_mesh, plane_mesh, quad_mesh, sphere_mesh};
use crate::renderer::technique::TechniqueLibrary;

pub const FLOOR_SIZE: f32 = 1000.0;
pub const FLOOR_TILES: f32 = 40.0;

/// GPU meshes used by the demo scene.
#[derive(Debug, Clone, Copy)]
pub struct SceneMeshes {
    pub cube: MeshId,
    pub sphere: MeshId,
    pub floor: MeshId,
    pub quad: MeshId,
    pub teapot: MeshId,
    pub character: MeshId,
    pub troll: MeshId,
    pub crate_box: MeshId,
    pub bike_body: MeshId,
    pub bike_wheel: MeshId,
}

impl SceneMeshes {
    pub fn load(backend: &mut dyn RenderBackend) -> RenderResult<Self> {
        let (v, i) = cube_mesh();
        let cube = backend.create_mesh("cube", &v, &i)?;
        let (v, i) = sphere_mesh(48, 24);
        let sphere = backend.create_mesh("sphere", &v, &i)?;
        let (v, i) = plane_mesh(FLOOR_SIZE, FLOOR_TILES);
        let floor = backend.create_mesh("floor", &v, &i)?;
        let (v, i) = quad_mesh();
        let quad = backend.create_mesh("quad", &v, &i)?;

        Ok(Self {
            cube,
            sphere,
            floor,
            quad,
            teapot: backend.load_mesh("models/teapot.glb")?,
            character: backend.load_mesh("models/character.glb")?,
            troll: backend.load_mesh("models/troll.glb")?,
            crate_box: backend.load_mesh("models/crate.glb")?,
            bike_body: backend.load_mesh("models/bike_body.glb")?,
            bike_wheel: backend.load_mesh("models/bike_wheel.glb")?,
        })
    }
}

/// Everything loaded up front: meshes plus the technique library.
#[derive(Debug)]
pub struct SceneAssets {
    pub meshes: SceneMeshes,
    pub techniques: TechniqueLibrary,
}

impl SceneAssets {
    /// Loads all meshes, programs and textures. Any missing asset is fatal.
    pub fn load(backend: &mut dyn RenderBackend) -> RenderResult<Self> {
        let meshes = SceneMeshes::load(backend)?;
        let techniques = TechniqueLibrary::load(backend, &catalog())?;
        Ok(Self { meshes, techniques })
    }
}
