use glam::{Vec3, Vec4Swizzles};
use winit::keyboard::KeyCode;

use super::animation::{AnimatedModel, Spin};
use super::assets::{SceneAssets, SceneMeshes};
use super::camera::Camera;
use super::effects::SceneEffects;
use super::input::{CameraKeys, InputState, ModelKeys};
use super::light::{Light, LightKind, LightSet};
use super::model::{Model, Renderable};
use super::techniques::TechniqueId;
use super::transform::Transform;
use crate::error::RenderResult;
use crate::renderer::technique::TechniqueHandle;
use crate::settings::RenderSettings;

pub const ORBIT_RADIUS: f32 = 20.0;
pub const ORBIT_SPEED: f32 = 0.7;
/// Unit primitives are scaled by this before any per-model scale.
pub const PRIMITIVE_SIZE: f32 = 10.0;

pub const PARALLAX_TOGGLE_KEY: KeyCode = KeyCode::Digit1;

/// Something the pass binder can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawableRef {
    Model(SceneModel),
    Bike,
    LightProxy(usize),
}

/// One entry of a pass's draw list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawItem {
    pub drawable: DrawableRef,
    pub technique: TechniqueHandle,
}

pub struct Drawable<'a> {
    pub renderable: &'a dyn Renderable,
    pub tint: Vec3,
}

/// Static models of the demo scene, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneModel {
    Ground,
    Character,
    Crate,
    Troll,
    Teapot,
    TvPortal,
    SpherePortal,
    Sphere,
    Decal,
    SpecularCube,
    TransitionCube,
    NormalCube,
    ParallaxCube,
    GlassCube,
    WiggleCube,
    AdditiveCube,
    CubeMapCube,
}

impl SceneModel {
    pub const ALL: [SceneModel; 17] = [
        SceneModel::Ground,
        SceneModel::Character,
        SceneModel::Crate,
        SceneModel::Troll,
        SceneModel::Teapot,
        SceneModel::TvPortal,
        SceneModel::SpherePortal,
        SceneModel::Sphere,
        SceneModel::Decal,
        SceneModel::SpecularCube,
        SceneModel::TransitionCube,
        SceneModel::NormalCube,
        SceneModel::ParallaxCube,
        SceneModel::GlassCube,
        SceneModel::WiggleCube,
        SceneModel::AdditiveCube,
        SceneModel::CubeMapCube,
    ];

    /// Models turned and moved by the I/K/J/L/U/O keys.
    pub const PRIMARY_GROUP: [SceneModel; 11] = [
        SceneModel::SpecularCube,
        SceneModel::TransitionCube,
        SceneModel::NormalCube,
        SceneModel::ParallaxCube,
        SceneModel::GlassCube,
        SceneModel::WiggleCube,
        SceneModel::AdditiveCube,
        SceneModel::Decal,
        SceneModel::Crate,
        SceneModel::Sphere,
        SceneModel::TvPortal,
    ];

    /// Models turned and moved by the T/G/F/H/R/Y keys.
    pub const SECONDARY_GROUP: [SceneModel; 4] = [
        SceneModel::SpherePortal,
        SceneModel::Teapot,
        SceneModel::Troll,
        SceneModel::CubeMapCube,
    ];

    fn placement(self, meshes: &SceneMeshes) -> Model {
        let cube = |x: f32, z: f32, scale: f32| {
            Model::at(meshes.cube, Vec3::new(x, 15.0, z), scale * PRIMITIVE_SIZE)
        };
        let turned = |mut model: Model| {
            model.set_euler(Vec3::new(0.0, 215f32.to_radians(), 0.0));
            model
        };
        match self {
            SceneModel::Ground => Model::new(meshes.floor),
            SceneModel::Character => turned(Model::at(meshes.character, Vec3::new(0.0, 0.0, -90.0), 8.0)),
            SceneModel::Crate => {
                let mut model = Model::at(meshes.crate_box, Vec3::new(0.0, 0.0, -180.0), 6.0);
                model.set_euler(Vec3::new(0.0, 40f32.to_radians(), 0.0));
                model
            }
            SceneModel::Troll => turned(Model::at(meshes.troll, Vec3::new(0.0, 0.0, 180.0), 8.0)),
            SceneModel::Teapot => Model::at(meshes.teapot, Vec3::new(-90.0, 10.0, -90.0), 1.5),
            SceneModel::TvPortal => cube(90.0, 90.0, 1.5),
            SceneModel::SpherePortal => {
                Model::at(meshes.sphere, Vec3::new(90.0, 15.0, -90.0), PRIMITIVE_SIZE)
            }
            SceneModel::Sphere => Model::at(meshes.sphere, Vec3::new(90.0, 15.0, 0.0), PRIMITIVE_SIZE),
            // Sits just in front of the wiggle cube's -Z face.
            SceneModel::Decal => Model::at(
                meshes.quad,
                Vec3::new(90.0, 15.0, -180.0 - PRIMITIVE_SIZE * 0.5 - 0.1),
                PRIMITIVE_SIZE,
            ),
            SceneModel::SpecularCube => cube(-90.0, 0.0, 1.5),
            SceneModel::TransitionCube => cube(-90.0, 90.0, 1.5),
            SceneModel::NormalCube => cube(0.0, 90.0, 1.5),
            SceneModel::ParallaxCube => cube(0.0, 0.0, 1.5),
            SceneModel::GlassCube => cube(-90.0, -180.0, 1.5),
            SceneModel::WiggleCube => cube(90.0, -180.0, 1.0),
            SceneModel::AdditiveCube => cube(-90.0, 180.0, 1.5),
            SceneModel::CubeMapCube => cube(90.0, 180.0, 1.5),
        }
    }
}

// Light roles. Indices are stable and shared with the shaders' light array.
pub const TEAPOT_LIGHT: usize = 0;
pub const WARM_LIGHT: usize = 1;
pub const NORMAL_CUBE_LIGHT: usize = 2;
pub const PARALLAX_CUBE_LIGHT: usize = 3;
pub const CHARACTER_SPOT: usize = 4;
pub const WARM_SPOT: usize = 5;
pub const BIKE_LIGHT: usize = 6;
pub const CRATE_SPOT: usize = 7;
pub const SPECULAR_CUBE_LIGHT: usize = 8;
pub const TROLL_LIGHT: usize = 9;

const COOL_WHITE: Vec3 = Vec3::new(0.8, 0.8, 1.0);
const WARM_YELLOW: Vec3 = Vec3::new(1.0, 0.8, 0.2);

/// The demo world: models, lights, cameras and per-pass draw lists.
#[derive(Debug)]
pub struct Scene {
    models: Vec<Model>,
    bike: AnimatedModel,
    lights: LightSet,
    camera: Camera,
    portal_cameras: Vec<Camera>,
    camera_keys: CameraKeys,
    effects: SceneEffects,
    color_items: Vec<DrawItem>,
    shadow_items: Vec<DrawableRef>,
    orbit_angle: f32,
    total_time: f32,
}

impl Scene {
    pub fn new(assets: &SceneAssets, settings: &RenderSettings) -> RenderResult<Self> {
        let meshes = &assets.meshes;
        let models = SceneModel::ALL
            .iter()
            .map(|m| m.placement(meshes))
            .collect();

        let mut bike = AnimatedModel::new();
        let body = bike.add_node("body", None, Some(meshes.bike_body), Transform::default())?;
        for (name, z) in [("front wheel", 5.5), ("rear wheel", -5.5)] {
            let wheel = bike.add_node(
                name,
                Some(body),
                Some(meshes.bike_wheel),
                Transform::from_translation(Vec3::new(0.0, 2.5, z)),
            )?;
            bike.set_spin(
                wheel,
                Spin {
                    axis: Vec3::X,
                    radians_per_second: std::f32::consts::TAU,
                },
            );
        }
        bike.set_position(Vec3::new(0.0, 0.0, 270.0));
        bike.set_euler(Vec3::new(0.0, 215f32.to_radians(), 0.0));
        bike.set_scale(3.0);

        let lights = Self::create_lights(meshes, settings.spotlight_cone_degrees)?;

        let camera = Camera::new(
            Vec3::new(40.0, 50.0, -300.0),
            Vec3::new(15f32.to_radians(), -18f32.to_radians(), 0.0),
        )
        .with_clip_planes(1.0, 5000.0);
        let portal_cameras = vec![
            Camera::new(
                Vec3::new(45.0, 45.0, 85.0),
                Vec3::new(20f32.to_radians(), 215f32.to_radians(), 0.0),
            ),
            Camera::new(
                Vec3::new(-150.0, 60.0, -150.0),
                Vec3::new(15f32.to_radians(), 45f32.to_radians(), 0.0),
            ),
        ];

        let mut scene = Self {
            models,
            bike,
            lights,
            camera,
            portal_cameras,
            camera_keys: CameraKeys::default(),
            effects: SceneEffects::default(),
            color_items: Self::color_draw_list(),
            shadow_items: vec![
                DrawableRef::Model(SceneModel::Ground),
                DrawableRef::Model(SceneModel::Character),
                DrawableRef::Model(SceneModel::Crate),
            ],
            orbit_angle: 0.0,
            total_time: 0.0,
        };
        scene.update(0.0, &InputState::new());

        log::info!(
            "Scene ready: {} models, {} lights ({} shadow casters), {} portals",
            scene.models.len() + 1,
            scene.lights.len(),
            scene.lights.shadow_caster_count(),
            scene.portal_cameras.len()
        );
        Ok(scene)
    }

    fn create_lights(meshes: &SceneMeshes, cone_degrees: f32) -> RenderResult<LightSet> {
        let point = |color: Vec3, intensity: f32| {
            Light::new(LightKind::Point, color, intensity).with_proxy(Model::new(meshes.quad))
        };
        let spot = |color: Vec3, intensity: f32| {
            Light::spot(color, intensity, cone_degrees, true).with_proxy(Model::new(meshes.quad))
        };

        let mut lights = LightSet::new();
        lights.push(point(COOL_WHITE, 10.0))?;
        let mut warm = point(WARM_YELLOW, 40.0);
        warm.set_position(Vec3::new(-90.0, 40.0, -90.0));
        lights.push(warm)?;
        lights.push(point(COOL_WHITE, 10.0))?;
        lights.push(point(COOL_WHITE, 10.0))?;
        lights.push(spot(COOL_WHITE, 10.0))?;
        let mut warm_spot = spot(WARM_YELLOW, 40.0);
        warm_spot.set_position(Vec3::new(-20.0, 30.0, -60.0));
        lights.push(warm_spot)?;
        lights.push(point(COOL_WHITE, 10.0))?;
        lights.push(spot(COOL_WHITE, 40.0))?;
        lights.push(point(COOL_WHITE, 10.0))?;
        lights.push(point(COOL_WHITE, 10.0))?;
        Ok(lights)
    }

    fn color_draw_list() -> Vec<DrawItem> {
        use SceneModel as M;
        use TechniqueId as T;

        let model = |m: SceneModel, t: TechniqueId| DrawItem {
            drawable: DrawableRef::Model(m),
            technique: t.handle(),
        };
        let mut items = vec![
            model(M::Ground, T::Floor),
            model(M::Character, T::ShadowMapped),
            model(M::Crate, T::CrateShadowMapped),
            model(M::Troll, T::CellOutline),
            model(M::Troll, T::CellShaded),
            model(M::SpecularCube, T::SpecularMap),
            model(M::Teapot, T::PixelLit),
            model(M::CubeMapCube, T::CubeMapped),
            model(M::TransitionCube, T::TextureTransition),
            model(M::TvPortal, T::TvPortal),
            DrawItem {
                drawable: DrawableRef::Bike,
                technique: T::Metal.handle(),
            },
            model(M::NormalCube, T::NormalMapped),
            model(M::ParallaxCube, T::ParallaxMapped),
            model(M::Sphere, T::WiggleModel),
            model(M::WiggleCube, T::WiggleTexture),
            model(M::SpherePortal, T::SpherePortal),
            // Blended objects last, after every opaque depth write.
            model(M::Decal, T::AdditiveDecal),
            model(M::AdditiveCube, T::AdditiveDecal),
            model(M::GlassCube, T::Glass),
        ];
        items.extend((0..10).map(|i| DrawItem {
            drawable: DrawableRef::LightProxy(i),
            technique: T::LightFlare.handle(),
        }));
        items
    }

    /// Advances animation by `dt` seconds. `update(0.0, ..)` is idempotent.
    pub fn update(&mut self, dt: f32, input: &InputState) {
        for model in SceneModel::PRIMARY_GROUP {
            self.model_mut(model).control(dt, input, &ModelKeys::PRIMARY);
        }
        for model in SceneModel::SECONDARY_GROUP {
            self.model_mut(model).control(dt, input, &ModelKeys::SECONDARY);
        }
        let keys = ModelKeys::PRIMARY;
        self.bike.control(dt, input, &keys);
        self.bike.control_spin(dt, input, keys.forward, keys.backward);
        self.camera.control(dt, input, &self.camera_keys);

        if input.key_hit(PARALLAX_TOGGLE_KEY) {
            self.effects.toggle_parallax();
        }

        let orbit = |centre: Vec3, radius: f32, height: f32, angle: f32| {
            centre + Vec3::new(angle.cos() * radius, height, angle.sin() * radius)
        };
        let angle = self.orbit_angle;
        let at = |scene: &Self, m: SceneModel| scene.model(m).position();

        let placements = [
            (TEAPOT_LIGHT, orbit(at(self, SceneModel::Teapot), ORBIT_RADIUS, 10.0, angle)),
            (NORMAL_CUBE_LIGHT, orbit(at(self, SceneModel::NormalCube), ORBIT_RADIUS, 0.0, angle)),
            (PARALLAX_CUBE_LIGHT, orbit(at(self, SceneModel::ParallaxCube), ORBIT_RADIUS, 0.0, angle)),
            (BIKE_LIGHT, orbit(self.bike.position(), ORBIT_RADIUS * 2.0, 15.0, angle)),
            (SPECULAR_CUBE_LIGHT, orbit(at(self, SceneModel::SpecularCube), ORBIT_RADIUS, 0.0, angle)),
            (TROLL_LIGHT, orbit(at(self, SceneModel::Troll), ORBIT_RADIUS, 10.0, angle)),
            (CHARACTER_SPOT, orbit(at(self, SceneModel::Character), ORBIT_RADIUS, 10.0, angle)),
            (CRATE_SPOT, orbit(at(self, SceneModel::Crate), ORBIT_RADIUS * 2.0, 35.0, angle)),
        ];
        for (index, position) in placements {
            if let Some(light) = self.lights.get_mut(index) {
                light.set_position(position);
            }
        }
        self.orbit_angle -= ORBIT_SPEED * dt;
        self.total_time += dt;
        let t = self.total_time;

        let character = at(self, SceneModel::Character);
        let crate_pos = at(self, SceneModel::Crate);
        let colour_change = (t.sin() + 1.0) * 0.5;
        let cycling = Vec3::new(colour_change, 0.2, 1.0 - colour_change);

        if let Some(light) = self.lights.get_mut(TEAPOT_LIGHT) {
            light.set_intensity(5.0 + 5.0 * (2.0 * t).sin());
        }
        if let Some(light) = self.lights.get_mut(WARM_LIGHT) {
            light.set_color(cycling);
        }
        for index in [CHARACTER_SPOT, WARM_SPOT] {
            if let Some(light) = self.lights.get_mut(index) {
                light.face_target(character);
            }
        }
        if let Some(light) = self.lights.get_mut(CRATE_SPOT) {
            light.face_target(crate_pos);
            light.set_color(cycling);
            light.set_intensity(20.0 + 20.0 * (2.0 * t).sin());
        }

        self.effects.animate(dt, t);
        self.model_mut(SceneModel::SpherePortal)
            .set_euler(Vec3::new(0.0, t, 0.0));
    }

    pub fn model(&self, model: SceneModel) -> &Model {
        &self.models[model as usize]
    }

    fn model_mut(&mut self, model: SceneModel) -> &mut Model {
        &mut self.models[model as usize]
    }

    pub fn bike(&self) -> &AnimatedModel {
        &self.bike
    }

    pub fn main_camera(&self) -> &Camera {
        &self.camera
    }

    pub fn portal_cameras(&self) -> &[Camera] {
        &self.portal_cameras
    }

    pub fn lights(&self) -> &LightSet {
        &self.lights
    }

    pub fn effects(&self) -> &SceneEffects {
        &self.effects
    }

    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    pub fn color_items(&self) -> &[DrawItem] {
        &self.color_items
    }

    pub fn shadow_items(&self) -> &[DrawableRef] {
        &self.shadow_items
    }

    pub fn drawable(&self, drawable: DrawableRef) -> Option<Drawable<'_>> {
        match drawable {
            DrawableRef::Model(model) => Some(Drawable {
                renderable: self.models.get(model as usize)?,
                tint: Vec3::ONE,
            }),
            DrawableRef::Bike => Some(Drawable {
                renderable: &self.bike,
                tint: Vec3::ONE,
            }),
            DrawableRef::LightProxy(index) => {
                let light = self.lights.get(index)?;
                Some(Drawable {
                    renderable: light.proxy()?,
                    tint: light.color(),
                })
            }
        }
    }

    /// World-space origin of a drawable.
    pub fn drawable_position(&self, drawable: DrawableRef) -> Option<Vec3> {
        self.drawable(drawable)
            .map(|d| d.renderable.world_matrix().w_axis.xyz())
    }
}
