use glam::{Mat4, Quat, Vec3};

use super::input::{InputState, ModelKeys};
use super::transform::Transform;
use crate::error::RenderResult;
use crate::renderer::backend::MeshId;
use crate::renderer::binder::DrawContext;

pub const ROTATION_SPEED: f32 = 2.0;
pub const MOVEMENT_SPEED: f32 = 50.0;

/// Anything the pass binder can draw.
pub trait Renderable {
    fn world_matrix(&self) -> Mat4;

    /// Number of draw calls one `render` issues.
    fn draw_count(&self) -> u32 {
        1
    }

    fn render(&self, ctx: &mut DrawContext<'_>) -> RenderResult<()>;
}

/// A single mesh placed in the world.
#[derive(Debug, Clone)]
pub struct Model {
    mesh: MeshId,
    transform: Transform,
}

impl Model {
    pub fn new(mesh: MeshId) -> Self {
        Self {
            mesh,
            transform: Transform::default(),
        }
    }

    pub fn at(mesh: MeshId, position: Vec3, scale: f32) -> Self {
        let mut model = Self::new(mesh);
        model.set_position(position);
        model.set_scale(scale);
        model
    }

    pub fn mesh(&self) -> MeshId {
        self.mesh
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn position(&self) -> Vec3 {
        self.transform.translation
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.transform.translation = position;
    }

    pub fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.transform.rotation = rotation;
    }

    /// (pitch, yaw, roll) in radians.
    pub fn set_euler(&mut self, angles: Vec3) {
        self.transform.set_euler(angles);
    }

    pub fn scale(&self) -> Vec3 {
        self.transform.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.transform.scale = Vec3::splat(scale);
    }

    /// World-space facing direction (local +Z), unit length.
    pub fn facing(&self) -> Vec3 {
        self.transform.forward()
    }

    pub fn face_target(&mut self, target: Vec3) {
        self.transform.face_target(target);
    }

    /// Keyboard turning and moving along the local facing axis.
    pub fn control(&mut self, dt: f32, input: &InputState, keys: &ModelKeys) {
        control_transform(&mut self.transform, dt, input, keys);
    }
}

/// Turns `transform` about its local axes and moves it along its facing.
/// A zero `dt` leaves it untouched.
pub(crate) fn control_transform(
    transform: &mut Transform,
    dt: f32,
    input: &InputState,
    keys: &ModelKeys,
) {
    let turn = ROTATION_SPEED * dt;
    let pitch = input.axis(keys.turn_down, keys.turn_up) * turn;
    let yaw = input.axis(keys.turn_right, keys.turn_left) * turn;
    let roll = input.axis(keys.turn_ccw, keys.turn_cw) * turn;
    if pitch != 0.0 {
        transform.rotate_local_x(pitch);
    }
    if yaw != 0.0 {
        transform.rotate_local_y(yaw);
    }
    if roll != 0.0 {
        transform.rotate_local_z(roll);
    }

    let advance = input.axis(keys.forward, keys.backward) * MOVEMENT_SPEED * dt;
    if advance != 0.0 {
        transform.translation += transform.forward() * advance;
    }
}

impl Renderable for Model {
    fn world_matrix(&self) -> Mat4 {
        self.transform.matrix()
    }

    fn render(&self, ctx: &mut DrawContext<'_>) -> RenderResult<()> {
        ctx.draw(self.world_matrix(), self.mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::KeyCode;

    #[test]
    fn world_matrix_applies_scale_rotation_translation() {
        let mut model = Model::at(MeshId(0), Vec3::new(0.0, 0.0, -180.0), 6.0);
        model.set_euler(Vec3::new(0.0, 40f32.to_radians(), 0.0));

        let world = model.world_matrix();
        assert!(world
            .w_axis
            .truncate()
            .abs_diff_eq(Vec3::new(0.0, 0.0, -180.0), 1e-5));
        assert!((world.z_axis.truncate().length() - 6.0).abs() < 1e-4);
        assert!((model.facing().length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn forward_key_moves_along_facing() {
        let mut model = Model::new(MeshId(0));
        model.face_target(Vec3::new(10.0, 0.0, 0.0));
        let mut input = InputState::new();
        input.press(KeyCode::Period);

        model.control(0.5, &input, &ModelKeys::PRIMARY);
        assert!(model
            .position()
            .abs_diff_eq(Vec3::new(MOVEMENT_SPEED * 0.5, 0.0, 0.0), 1e-3));
    }

    #[test]
    fn held_keys_do_nothing_over_a_zero_step() {
        let mut model = Model::at(MeshId(0), Vec3::ONE, 2.0);
        model.set_euler(Vec3::new(0.3, 1.2, 0.0));
        let before = model.world_matrix();
        let mut input = InputState::new();
        for key in [KeyCode::KeyT, KeyCode::KeyH, KeyCode::KeyR, KeyCode::Period] {
            input.press(key);
        }
        model.control(0.0, &input, &ModelKeys::SECONDARY);
        assert_eq!(model.world_matrix(), before);
    }

    #[test]
    fn control_without_keys_changes_nothing() {
        let mut model = Model::at(MeshId(0), Vec3::ONE, 2.0);
        let before = model.world_matrix();
        model.control(1.0, &InputState::new(), &ModelKeys::SECONDARY);
        assert_eq!(model.world_matrix(), before);
    }
}
