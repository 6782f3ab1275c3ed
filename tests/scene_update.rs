use std::f32::consts::FRAC_PI_4;

use glam::{Mat4, Vec3};
use winit::keyboard::KeyCode;

use wgpu_portals::renderer::backend::RenderBackend;
use wgpu_portals::renderer::{primitives, RecordingBackend};
use wgpu_portals::scene::scene::{
    CHARACTER_SPOT, ORBIT_RADIUS, ORBIT_SPEED, TEAPOT_LIGHT, WARM_SPOT,
};
use wgpu_portals::scene::{
    DrawableRef, InputState, Light, LightKind, LightSet, Model, Renderable, Scene, SceneAssets,
    SceneModel,
};
use wgpu_portals::settings::RenderSettings;

fn scene() -> Scene {
    let mut backend = RecordingBackend::new(1280, 960);
    let assets = SceneAssets::load(&mut backend).unwrap();
    Scene::new(&assets, &RenderSettings::default()).unwrap()
}

fn snapshot(scene: &Scene) -> Vec<(Vec3, f32, Vec3)> {
    scene
        .lights()
        .iter()
        .map(|l| (l.position(), l.intensity(), l.color()))
        .collect()
}

/// Every transform `update` can move: models, bike nodes and camera views.
fn transforms(scene: &Scene) -> Vec<Mat4> {
    let mut all: Vec<Mat4> = SceneModel::ALL
        .iter()
        .map(|&m| scene.model(m).world_matrix())
        .collect();
    all.extend(scene.bike().node_world_matrices());
    all.push(scene.main_camera().view());
    all.extend(scene.portal_cameras().iter().map(|c| c.view()));
    all
}

const CONTROL_KEYS: [KeyCode; 22] = [
    KeyCode::KeyI,
    KeyCode::KeyK,
    KeyCode::KeyJ,
    KeyCode::KeyL,
    KeyCode::KeyU,
    KeyCode::KeyO,
    KeyCode::Period,
    KeyCode::Comma,
    KeyCode::KeyT,
    KeyCode::KeyG,
    KeyCode::KeyF,
    KeyCode::KeyH,
    KeyCode::KeyR,
    KeyCode::KeyY,
    KeyCode::ArrowUp,
    KeyCode::ArrowDown,
    KeyCode::ArrowLeft,
    KeyCode::ArrowRight,
    KeyCode::KeyW,
    KeyCode::KeyS,
    KeyCode::KeyA,
    KeyCode::KeyD,
];

#[test]
fn zero_step_update_changes_nothing() {
    let mut scene = scene();
    let mut input = InputState::new();
    // One key of each opposing pair first, then every key at once.
    for key in [KeyCode::KeyI, KeyCode::KeyJ, KeyCode::KeyU, KeyCode::Period] {
        input.press(key);
    }
    for key in [KeyCode::KeyT, KeyCode::KeyF, KeyCode::KeyR, KeyCode::ArrowUp] {
        input.press(key);
    }
    input.press(KeyCode::ArrowLeft);
    input.press(KeyCode::KeyW);
    input.press(KeyCode::KeyA);

    scene.update(0.0, &input);
    let before = snapshot(&scene);
    let matrices = transforms(&scene);
    let effects = scene.effects().clone();

    scene.update(0.0, &input);
    input.end_frame();
    for key in CONTROL_KEYS {
        input.press(key);
    }
    scene.update(0.0, &input);

    assert_eq!(snapshot(&scene), before);
    assert_eq!(transforms(&scene), matrices);
    assert_eq!(scene.effects(), &effects);
    assert_eq!(scene.total_time(), 0.0);
}

#[test]
fn primary_keys_move_only_their_group_and_the_bike() {
    let mut scene = scene();
    let before: Vec<Mat4> = SceneModel::ALL
        .iter()
        .map(|&m| scene.model(m).world_matrix())
        .collect();
    let bike_before = scene.bike().world_matrix();
    let wheels_before: Vec<_> = scene.bike().nodes().iter().map(|n| n.local).collect();

    let mut input = InputState::new();
    input.press(KeyCode::KeyI);
    scene.update(0.1, &input);

    for (&model, before) in SceneModel::ALL.iter().zip(&before) {
        // The sphere portal spins with time whatever is pressed.
        if model == SceneModel::SpherePortal {
            continue;
        }
        let moved = scene.model(model).world_matrix() != *before;
        assert_eq!(
            moved,
            SceneModel::PRIMARY_GROUP.contains(&model),
            "{model:?}"
        );
    }
    assert_ne!(scene.bike().world_matrix(), bike_before);
    let wheels: Vec<_> = scene.bike().nodes().iter().map(|n| n.local).collect();
    assert_eq!(wheels, wheels_before);
}

#[test]
fn secondary_keys_turn_the_second_group() {
    let mut scene = scene();
    let before: Vec<Mat4> = SceneModel::ALL
        .iter()
        .map(|&m| scene.model(m).world_matrix())
        .collect();
    let bike_before = scene.bike().world_matrix();

    let mut input = InputState::new();
    input.press(KeyCode::KeyH);
    scene.update(0.1, &input);

    for (&model, before) in SceneModel::ALL.iter().zip(&before) {
        if model == SceneModel::SpherePortal {
            continue;
        }
        let moved = scene.model(model).world_matrix() != *before;
        assert_eq!(
            moved,
            SceneModel::SECONDARY_GROUP.contains(&model),
            "{model:?}"
        );
    }
    assert_eq!(scene.bike().world_matrix(), bike_before);
}

#[test]
fn period_rolls_the_bike_and_spins_its_wheels() {
    let mut scene = scene();
    let start = scene.drawable_position(DrawableRef::Bike).unwrap();
    let wheels_at_rest: Vec<_> = scene.bike().nodes().iter().map(|n| n.local).collect();
    assert_eq!(scene.bike().nodes().len(), 3);

    let mut input = InputState::new();
    input.press(KeyCode::Period);
    scene.update(0.1, &input);

    let nodes = scene.bike().nodes();
    assert_eq!(nodes[0].local, wheels_at_rest[0]);
    assert_ne!(nodes[1].local.rotation, wheels_at_rest[1].rotation);
    assert_ne!(nodes[2].local.rotation, wheels_at_rest[2].rotation);
    assert_eq!(nodes[1].local.translation, wheels_at_rest[1].translation);

    let moved = scene.drawable_position(DrawableRef::Bike).unwrap();
    let direction = (moved - start).normalize();
    let facing = scene.bike().world_matrix().z_axis.truncate().normalize();
    assert!(direction.abs_diff_eq(facing, 1e-4));
    assert!(scene
        .model(SceneModel::Character)
        .position()
        .abs_diff_eq(Vec3::new(0.0, 0.0, -90.0), 1e-6));
}

#[test]
fn teapot_light_pulses_with_time() {
    let mut scene = scene();
    let input = InputState::new();
    let intensity = |scene: &Scene| scene.lights().get(TEAPOT_LIGHT).unwrap().intensity();

    assert!((intensity(&scene) - 5.0).abs() < 1e-4);
    scene.update(FRAC_PI_4, &input);
    assert!((intensity(&scene) - 10.0).abs() < 1e-4);
    scene.update(FRAC_PI_4, &input);
    assert!((intensity(&scene) - 5.0).abs() < 1e-4);
}

#[test]
fn orbiting_lights_are_placed_before_the_angle_advances() {
    let mut scene = scene();
    let input = InputState::new();
    let teapot = scene.model(SceneModel::Teapot).position();
    let light = |scene: &Scene| scene.lights().get(TEAPOT_LIGHT).unwrap().position();

    scene.update(0.5, &input);
    let first = teapot + Vec3::new(ORBIT_RADIUS, 10.0, 0.0);
    assert!(light(&scene).abs_diff_eq(first, 1e-4));

    scene.update(0.5, &input);
    let angle = -ORBIT_SPEED * 0.5;
    let second = teapot + Vec3::new(angle.cos() * ORBIT_RADIUS, 10.0, angle.sin() * ORBIT_RADIUS);
    assert!(light(&scene).abs_diff_eq(second, 1e-4));
}

#[test]
fn parallax_toggles_once_per_key_press() {
    let mut scene = scene();
    let mut input = InputState::new();
    assert!(scene.effects().parallax_enabled);

    input.press(KeyCode::Digit1);
    scene.update(0.016, &input);
    assert!(!scene.effects().parallax_enabled);

    // Still held on the next frame: no second toggle.
    input.end_frame();
    scene.update(0.016, &input);
    assert!(!scene.effects().parallax_enabled);

    input.release(KeyCode::Digit1);
    input.end_frame();
    input.press(KeyCode::Digit1);
    scene.update(0.016, &input);
    assert!(scene.effects().parallax_enabled);
}

#[test]
fn character_spotlights_keep_facing_the_character() {
    let mut scene = scene();
    let input = InputState::new();
    for _ in 0..10 {
        scene.update(0.1, &input);
    }
    let character = scene.model(SceneModel::Character).position();
    for index in [CHARACTER_SPOT, WARM_SPOT] {
        let light = scene.lights().get(index).unwrap();
        let expected = (character - light.position()).normalize();
        assert!(light.facing().abs_diff_eq(expected, 1e-4), "light {index}");
    }
}

#[test]
fn proxy_tracks_light_position() {
    let mut backend = RecordingBackend::new(64, 64);
    let (vertices, indices) = primitives::quad_mesh();
    let mesh = backend.create_mesh("flare", &vertices, &indices).unwrap();
    let mut light = Light::new(LightKind::Point, Vec3::ONE, 10.0).with_proxy(Model::new(mesh));

    light.set_position(Vec3::new(12.0, -3.0, 40.0));
    assert_eq!(light.proxy().unwrap().position(), Vec3::new(12.0, -3.0, 40.0));

    light.set_intensity(-3.0);
    assert_eq!(light.intensity(), 0.0);
}

#[test]
fn shadow_view_looks_along_the_spotlight() {
    let mut light = Light::spot(Vec3::ONE, 10.0, 60.0, true);
    light.set_position(Vec3::new(30.0, 50.0, -20.0));
    light.face_target(Vec3::new(0.0, 0.0, 10.0));

    let product = light.shadow_view() * light.world_matrix();
    assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-4));

    let viewpoint = light.shadow_viewpoint().unwrap();
    let ahead = light.position() + light.facing() * 100.0;
    let ndc = viewpoint.view_projection().project_point3(ahead);
    assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
    assert!(ndc.z > 0.0 && ndc.z < 1.0);
}

#[test]
fn fourth_shadow_caster_is_rejected() {
    let mut lights = LightSet::new();
    for _ in 0..3 {
        lights.push(Light::spot(Vec3::ONE, 10.0, 90.0, true)).unwrap();
    }
    let err = lights
        .push(Light::spot(Vec3::ONE, 10.0, 90.0, true))
        .unwrap_err();
    assert!(matches!(
        err,
        wgpu_portals::error::RenderError::InvalidState(_)
    ));
}
