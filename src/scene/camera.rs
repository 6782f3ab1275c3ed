use glam::{Mat4, Vec3};

use super::input::{CameraKeys, InputState};
use super::transform::Transform;
use crate::renderer::constants::Viewpoint;

pub const CAMERA_TURN_SPEED: f32 = 1.0;
pub const CAMERA_MOVE_SPEED: f32 = 100.0;

/// Left-handed perspective camera. The view matrix is the inverse of the
/// camera's own world matrix.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub transform: Transform,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Camera at `position` with (pitch, yaw, roll) rotation in radians.
    pub fn new(position: Vec3, rotation: Vec3) -> Self {
        let mut transform = Transform::from_translation(position);
        transform.set_euler(rotation);
        Self {
            transform,
            ..Self::default()
        }
    }

    pub fn with_clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn view(&self) -> Mat4 {
        self.transform.matrix().inverse()
    }

    pub fn proj(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_lh(self.fov_y_radians, aspect, self.near, self.far)
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.proj(aspect) * self.view()
    }

    pub fn position(&self) -> Vec3 {
        self.transform.translation
    }

    pub fn viewpoint(&self, aspect: f32) -> Viewpoint {
        Viewpoint {
            view: self.view(),
            projection: self.proj(aspect),
            position: self.position(),
        }
    }

    /// Arrow keys turn, WASD moves relative to the current facing.
    pub fn control(&mut self, dt: f32, input: &InputState, keys: &CameraKeys) {
        let turn = CAMERA_TURN_SPEED * dt;
        let pitch = input.axis(keys.turn_down, keys.turn_up) * turn;
        let yaw = input.axis(keys.turn_right, keys.turn_left) * turn;
        if pitch != 0.0 || yaw != 0.0 {
            let (y, x, _) = self.transform.rotation.to_euler(glam::EulerRot::YXZ);
            self.transform.set_euler(Vec3::new(x + pitch, y + yaw, 0.0));
        }

        let advance = input.axis(keys.forward, keys.backward);
        let strafe = input.axis(keys.right, keys.left);
        let step = (self.transform.forward() * advance + self.transform.right() * strafe)
            * CAMERA_MOVE_SPEED
            * dt;
        self.transform.translation += step;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            fov_y_radians: std::f32::consts::FRAC_PI_4,
            near: 1.0,
            far: 10_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::KeyCode;

    #[test]
    fn view_proj_is_reasonable() {
        let cam = Camera::new(Vec3::new(40.0, 50.0, -300.0), Vec3::new(0.26, -0.31, 0.0));
        let vp = cam.view_proj(4.0 / 3.0);
        let id = vp * vp.inverse();
        assert!(id.abs_diff_eq(Mat4::IDENTITY, 1e-3));
    }

    #[test]
    fn view_is_inverse_of_world() {
        let cam = Camera::new(Vec3::new(45.0, 45.0, 85.0), Vec3::new(0.35, 3.75, 0.0));
        let product = cam.view() * cam.transform.matrix();
        assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn point_ahead_projects_to_centre_with_depth_in_range() {
        let cam = Camera::new(Vec3::ZERO, Vec3::ZERO);
        let clip = cam.view_proj(1.0) * Vec3::new(0.0, 0.0, 100.0).extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn forward_key_moves_camera_along_facing() {
        let mut cam = Camera::new(Vec3::ZERO, Vec3::ZERO);
        let mut input = InputState::new();
        input.press(KeyCode::KeyW);
        cam.control(0.1, &input, &CameraKeys::default());
        assert!(cam
            .position()
            .abs_diff_eq(Vec3::new(0.0, 0.0, CAMERA_MOVE_SPEED * 0.1), 1e-3));
    }
}
