use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};

/// Translation, rotation and scale of an object in a left-handed world
/// where objects face down their local +Z axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn from_trs(t: Vec3, r: Quat, s: Vec3) -> Self {
        Self {
            translation: t,
            rotation: r,
            scale: s,
        }
    }

    pub fn from_translation(t: Vec3) -> Self {
        Self {
            translation: t,
            ..Self::default()
        }
    }

    /// Rotation from (pitch, yaw, roll) in radians, applied roll first, then pitch, then yaw.
    pub fn euler_rotation(angles: Vec3) -> Quat {
        Quat::from_euler(EulerRot::YXZ, angles.y, angles.x, angles.z)
    }

    pub fn set_euler(&mut self, angles: Vec3) {
        self.rotation = Self::euler_rotation(angles);
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn rotate_local_x(&mut self, angle: f32) {
        self.rotation = (self.rotation * Quat::from_rotation_x(angle)).normalize();
    }

    pub fn rotate_local_y(&mut self, angle: f32) {
        self.rotation = (self.rotation * Quat::from_rotation_y(angle)).normalize();
    }

    pub fn rotate_local_z(&mut self, angle: f32) {
        self.rotation = (self.rotation * Quat::from_rotation_z(angle)).normalize();
    }

    /// Turns the object so its local +Z axis points at `target`, keeping world
    /// up as close to local +Y as possible. Does nothing if `target` is the
    /// object's own position.
    pub fn face_target(&mut self, target: Vec3) {
        let to_target = target - self.translation;
        if to_target.length_squared() < 1e-12 {
            return;
        }
        let z = to_target.normalize();
        let mut x = Vec3::Y.cross(z);
        if x.length_squared() < 1e-8 {
            // Looking straight up or down: any horizontal axis will do.
            x = Vec3::X;
        }
        let x = x.normalize();
        let y = z.cross(x);
        self.rotation = Quat::from_mat3(&Mat3::from_cols(x, y, z)).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn default_is_identity() {
        let m = Transform::default().matrix();
        assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn translate_then_scale_ok() {
        let tr = Transform::from_trs(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY, Vec3::splat(2.0));
        let p = tr.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!(p.abs_diff_eq(Vec3::new(3.0, 2.0, 3.0), 1e-6));
    }

    #[test]
    fn face_target_points_forward_at_target() {
        let mut tr = Transform::from_translation(Vec3::new(-20.0, 30.0, -60.0));
        let target = Vec3::new(0.0, 0.0, -90.0);
        tr.face_target(target);

        let expected = (target - tr.translation).normalize();
        assert!(tr.forward().abs_diff_eq(expected, 1e-5));
        assert!(tr.up().y > 0.0);
    }

    #[test]
    fn face_target_at_own_position_keeps_rotation() {
        let mut tr = Transform::from_translation(Vec3::ONE);
        tr.set_euler(Vec3::new(0.0, 1.0, 0.0));
        let before = tr.rotation;
        tr.face_target(Vec3::ONE);
        assert_eq!(tr.rotation, before);
    }

    #[test]
    fn face_target_straight_down_is_finite() {
        let mut tr = Transform::from_translation(Vec3::new(0.0, 10.0, 0.0));
        tr.face_target(Vec3::ZERO);
        assert!(tr.forward().abs_diff_eq(Vec3::NEG_Y, 1e-5));
        assert!(tr.rotation.is_finite());
    }

    #[test]
    fn positive_yaw_turns_forward_towards_positive_x() {
        let mut tr = Transform::default();
        tr.set_euler(Vec3::new(0.0, FRAC_PI_2, 0.0));
        assert!(tr.forward().abs_diff_eq(Vec3::X, 1e-5));
    }
}
