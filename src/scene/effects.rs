use glam::Vec3;

pub const AMBIENT_COLOR: Vec3 = Vec3::new(0.4, 0.4, 0.5);
pub const SPECULAR_POWER: f32 = 256.0;
pub const OUTLINE_THICKNESS: f32 = 0.015;
pub const PARALLAX_DEPTH: f32 = 0.08;
pub const WIGGLE_SPEED: f32 = 3.0;

/// Shader parameters shared by every pass of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneEffects {
    pub ambient_color: Vec3,
    pub specular_power: f32,
    pub outline_color: Vec3,
    pub outline_thickness: f32,
    pub wiggle: f32,
    pub transition_factor: f32,
    pub parallax_depth: f32,
    pub parallax_enabled: bool,
    pub color_variation: Vec3,
}

impl Default for SceneEffects {
    fn default() -> Self {
        let mut effects = Self {
            ambient_color: AMBIENT_COLOR,
            specular_power: SPECULAR_POWER,
            outline_color: Vec3::ZERO,
            outline_thickness: OUTLINE_THICKNESS,
            wiggle: 0.0,
            transition_factor: 0.0,
            parallax_depth: PARALLAX_DEPTH,
            parallax_enabled: true,
            color_variation: Vec3::ONE,
        };
        effects.animate(0.0, 0.0);
        effects
    }
}

impl SceneEffects {
    /// Advances time-driven parameters. `total_time` is scene time in seconds.
    pub fn animate(&mut self, dt: f32, total_time: f32) {
        self.wiggle += WIGGLE_SPEED * dt;
        self.transition_factor = (self.wiggle.sin() + 1.0) * 0.5;
        self.color_variation = Vec3::new(
            0.5 + ((1.2 * total_time).sin() + 1.0) * 0.5,
            0.5 + ((1.5 * total_time).cos() + 1.0) * 0.5,
            0.5 + ((0.7 * total_time).sin() + 1.0) * 0.5,
        );
    }

    pub fn toggle_parallax(&mut self) {
        self.parallax_enabled = !self.parallax_enabled;
        log::info!(
            "Parallax mapping {}",
            if self.parallax_enabled { "enabled" } else { "disabled" }
        );
    }

    /// Parallax depth as uploaded: zero disables the height offset.
    pub fn effective_parallax_depth(&self) -> f32 {
        if self.parallax_enabled {
            self.parallax_depth
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_factor_stays_in_unit_range() {
        let mut effects = SceneEffects::default();
        let mut time = 0.0;
        for _ in 0..200 {
            effects.animate(0.05, time);
            time += 0.05;
            assert!((0.0..=1.0).contains(&effects.transition_factor));
            assert!(effects.color_variation.min_element() >= 0.5);
            assert!(effects.color_variation.max_element() <= 1.5);
        }
    }

    #[test]
    fn parallax_toggle_zeroes_depth() {
        let mut effects = SceneEffects::default();
        assert_eq!(effects.effective_parallax_depth(), PARALLAX_DEPTH);
        effects.toggle_parallax();
        assert_eq!(effects.effective_parallax_depth(), 0.0);
    }
}
