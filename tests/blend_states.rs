use glam::{Mat4, Vec3, Vec4};

use wgpu_portals::renderer::backend::{
    ClearValue, FrameBudget, PassDescriptor, ProgramStage, RenderBackend, TargetDescriptor,
    TargetFormat, TargetId, TargetUsage, TechniqueBinding, Viewport,
};
use wgpu_portals::renderer::state::PipelineState;
use wgpu_portals::renderer::{FrameConstants, ModelConstants, RecordingBackend, Viewpoint};
use wgpu_portals::scene::{LightSet, SceneEffects, TechniqueId};

const BACKGROUND: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

struct Fixture {
    backend: RecordingBackend,
    color: TargetId,
    depth: TargetId,
}

fn fixture() -> Fixture {
    let mut backend = RecordingBackend::new(64, 64);
    let mut target = |label, format| {
        backend
            .create_target(&TargetDescriptor {
                label,
                width: 64,
                height: 64,
                format,
                usage: TargetUsage::ATTACHMENT,
            })
            .unwrap()
    };
    let color = target("colour", TargetFormat::Rgba8Unorm);
    let depth = target("depth", TargetFormat::Depth32Float);

    backend
        .begin_frame(FrameBudget { passes: 1, draws: 8 })
        .unwrap();
    backend.clear_target(color, ClearValue::Color(BACKGROUND));
    backend.clear_target(depth, ClearValue::Depth(1.0));
    backend
        .begin_pass(&PassDescriptor {
            label: "blend",
            color: Some(color),
            depth: Some(depth),
            viewport: Viewport::full(64, 64),
        })
        .unwrap();

    let identity = Viewpoint::new(Mat4::IDENTITY, Mat4::IDENTITY);
    let constants = FrameConstants::build(&identity, &LightSet::new(), &SceneEffects::default());
    backend.write_frame_constants(&constants).unwrap();

    Fixture {
        backend,
        color,
        depth,
    }
}

/// Draws one fragment at clip depth `z` with colour `tint`.
fn draw(fixture: &mut Fixture, state: PipelineState, tint: Vec3, z: f32) {
    let backend = &mut fixture.backend;
    let vertex = backend
        .load_program("light_model_vs", ProgramStage::Vertex)
        .unwrap();
    let pixel = backend
        .load_program("light_model_ps", ProgramStage::Pixel)
        .unwrap();
    let mesh = backend.load_mesh("Decal.obj").unwrap();
    backend
        .bind_technique(&TechniqueBinding {
            label: "blend",
            vertex,
            pixel: Some(pixel),
            textures: &[],
            samplers: &[],
            state,
        })
        .unwrap();
    backend
        .write_model_constants(&ModelConstants::new(
            Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
            tint,
        ))
        .unwrap();
    backend.draw_mesh(mesh).unwrap();
}

fn color(fixture: &Fixture) -> Vec3 {
    fixture.backend.probe_color(fixture.color).unwrap().truncate()
}

fn depth(fixture: &Fixture) -> f32 {
    fixture.backend.probe_depth(fixture.depth).unwrap()
}

#[test]
fn decals_and_flares_are_additive_without_depth_writes() {
    for id in [TechniqueId::AdditiveDecal, TechniqueId::LightFlare] {
        assert_eq!(id.technique().state, PipelineState::ADDITIVE);
    }
    assert_eq!(
        TechniqueId::Glass.technique().state,
        PipelineState::MULTIPLICATIVE
    );
}

#[test]
fn additive_draws_accumulate_and_leave_depth() {
    let mut fixture = fixture();
    let tint = Vec3::new(0.2, 0.3, 0.4);
    draw(&mut fixture, PipelineState::ADDITIVE, tint, 0.5);
    draw(&mut fixture, PipelineState::ADDITIVE, tint, 0.5);

    let expected = Vec4::from(BACKGROUND).truncate() + tint * 2.0;
    assert!(color(&fixture).abs_diff_eq(expected, 1e-5));
    assert_eq!(depth(&fixture), 1.0);
}

#[test]
fn opaque_draw_writes_depth_and_hides_later_blends() {
    let mut fixture = fixture();
    draw(&mut fixture, PipelineState::OPAQUE, Vec3::new(0.5, 0.5, 0.5), 0.25);
    assert_eq!(depth(&fixture), 0.25);

    // Behind the opaque surface: rejected by the read-only depth test.
    draw(&mut fixture, PipelineState::ADDITIVE, Vec3::ONE, 0.75);
    assert!(color(&fixture).abs_diff_eq(Vec3::splat(0.5), 1e-5));

    // In front of it: blended in, depth untouched.
    draw(&mut fixture, PipelineState::ADDITIVE, Vec3::splat(0.25), 0.1);
    assert!(color(&fixture).abs_diff_eq(Vec3::splat(0.75), 1e-5));
    assert_eq!(depth(&fixture), 0.25);
}

#[test]
fn multiplicative_draw_tints_what_is_behind_it() {
    let mut fixture = fixture();
    draw(&mut fixture, PipelineState::OPAQUE, Vec3::new(0.8, 0.6, 0.4), 0.5);
    draw(
        &mut fixture,
        PipelineState::MULTIPLICATIVE,
        Vec3::new(0.5, 1.0, 0.25),
        0.3,
    );

    assert!(color(&fixture).abs_diff_eq(Vec3::new(0.4, 0.6, 0.1), 1e-5));
    assert_eq!(depth(&fixture), 0.5);
}
