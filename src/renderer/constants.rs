use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::scene::effects::SceneEffects;
use crate::scene::light::LightSet;

pub const MAX_LIGHTS: usize = 10;
pub const MAX_SHADOW_CASTERS: usize = 3;

/// Where a pass renders from: the main camera, a portal camera or a shadow-casting light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
}

impl Viewpoint {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view,
            projection,
            position: view.inverse().w_axis.truncate(),
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct LightBlock {
    pub position: [f32; 3],
    pub _pad0: f32,
    /// Colour premultiplied by intensity.
    pub color: [f32; 3],
    pub _pad1: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct ShadowCasterBlock {
    pub facing: [f32; 3],
    pub cos_half_angle: f32,
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub light_index: u32,
    pub _pad: [u32; 3],
}

/// Per-pass constant block uploaded once before any draw of that pass.
///
/// Light data is identical for every pass of a frame, only the viewpoint
/// fields (`view`, `projection`, `view_projection`, `camera_position`) change.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct FrameConstants {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
    pub lights: [LightBlock; MAX_LIGHTS],
    pub shadow_casters: [ShadowCasterBlock; MAX_SHADOW_CASTERS],
    pub light_count: u32,
    pub shadow_caster_count: u32,
    pub _pad0: [u32; 2],
    pub ambient_color: [f32; 3],
    pub specular_power: f32,
    pub camera_position: [f32; 3],
    pub _pad1: f32,
    pub outline_color: [f32; 3],
    pub outline_thickness: f32,
    pub wiggle: f32,
    pub transition_factor: f32,
    pub parallax_depth: f32,
    pub _pad2: f32,
    pub color_variation: [f32; 3],
    pub _pad3: f32,
}

impl FrameConstants {
    /// Gathers lights and effect parameters, positioned for `viewpoint`.
    pub fn build(viewpoint: &Viewpoint, lights: &LightSet, effects: &SceneEffects) -> Self {
        let mut constants = Self::zeroed();

        for (block, light) in constants.lights.iter_mut().zip(lights.iter()) {
            block.position = light.position().into();
            block.color = light.radiance().into();
        }
        constants.light_count = lights.len() as u32;

        let mut casters = 0;
        for (block, (index, light)) in constants
            .shadow_casters
            .iter_mut()
            .zip(lights.shadow_casters())
        {
            let Some(projection) = light.shadow_projection() else {
                continue;
            };
            block.facing = light.facing().into();
            block.cos_half_angle = light.cos_half_angle();
            block.view = light.shadow_view().to_cols_array_2d();
            block.projection = projection.to_cols_array_2d();
            block.light_index = index as u32;
            casters += 1;
        }
        constants.shadow_caster_count = casters;

        constants.ambient_color = effects.ambient_color.into();
        constants.specular_power = effects.specular_power;
        constants.outline_color = effects.outline_color.into();
        constants.outline_thickness = effects.outline_thickness;
        constants.wiggle = effects.wiggle;
        constants.transition_factor = effects.transition_factor;
        constants.parallax_depth = effects.effective_parallax_depth();
        constants.color_variation = effects.color_variation.into();

        constants.with_viewpoint(viewpoint)
    }

    /// Copy of these constants with the viewpoint fields replaced.
    pub fn with_viewpoint(&self, viewpoint: &Viewpoint) -> Self {
        Self {
            view: viewpoint.view.to_cols_array_2d(),
            projection: viewpoint.projection.to_cols_array_2d(),
            view_projection: viewpoint.view_projection().to_cols_array_2d(),
            camera_position: viewpoint.position.into(),
            ..*self
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view_projection)
    }
}

/// Per-draw constants: world matrix and a colour tint (light flares use the light colour).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct ModelConstants {
    pub world: [[f32; 4]; 4],
    pub tint: [f32; 3],
    pub _pad: f32,
}

impl ModelConstants {
    pub fn new(world: Mat4, tint: Vec3) -> Self {
        Self {
            world: world.to_cols_array_2d(),
            tint: tint.into(),
            _pad: 0.0,
        }
    }

    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::light::{Light, LightKind};

    #[test]
    fn constant_blocks_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<LightBlock>(), 32);
        assert_eq!(std::mem::size_of::<ShadowCasterBlock>(), 160);
        assert_eq!(std::mem::size_of::<FrameConstants>(), 1088);
        assert_eq!(std::mem::size_of::<ModelConstants>(), 80);
        assert_eq!(std::mem::size_of::<FrameConstants>() % 16, 0);
    }

    #[test]
    fn viewpoint_position_is_inverse_view_translation() {
        let eye = Vec3::new(40.0, 50.0, -300.0);
        let view = Mat4::look_to_lh(eye, Vec3::Z, Vec3::Y);
        let vp = Viewpoint::new(view, Mat4::IDENTITY);
        assert!(vp.position.abs_diff_eq(eye, 1e-3));
    }

    #[test]
    fn build_premultiplies_light_colour() {
        let mut lights = LightSet::new();
        let mut light = Light::new(LightKind::Point, Vec3::new(0.8, 0.8, 1.0), 10.0);
        light.set_position(Vec3::new(1.0, 2.0, 3.0));
        lights.push(light).unwrap();

        let vp = Viewpoint::new(Mat4::IDENTITY, Mat4::IDENTITY);
        let constants = FrameConstants::build(&vp, &lights, &SceneEffects::default());

        assert_eq!(constants.light_count, 1);
        assert_eq!(constants.shadow_caster_count, 0);
        assert_eq!(constants.lights[0].position, [1.0, 2.0, 3.0]);
        assert!(Vec3::from(constants.lights[0].color).abs_diff_eq(Vec3::new(8.0, 8.0, 10.0), 1e-5));
    }

    #[test]
    fn build_encodes_a_full_light_set() {
        let mut lights = LightSet::new();
        for i in 0..MAX_LIGHTS {
            let light = if i % 3 == 0 && i < 9 {
                Light::spot(Vec3::ONE, 1.0, 60.0, true)
            } else {
                Light::new(LightKind::Point, Vec3::ONE, 1.0)
            };
            lights.push(light).unwrap();
        }
        assert!(lights.push(Light::new(LightKind::Point, Vec3::ONE, 1.0)).is_err());

        let vp = Viewpoint::new(Mat4::IDENTITY, Mat4::IDENTITY);
        let constants = FrameConstants::build(&vp, &lights, &SceneEffects::default());

        assert_eq!(constants.light_count as usize, MAX_LIGHTS);
        assert_eq!(constants.shadow_caster_count as usize, MAX_SHADOW_CASTERS);
        let indices: Vec<u32> = constants.shadow_casters.iter().map(|c| c.light_index).collect();
        assert_eq!(indices, vec![0, 3, 6]);
    }

    #[test]
    fn with_viewpoint_only_changes_view_fields() {
        let mut lights = LightSet::new();
        lights
            .push(Light::spot(Vec3::ONE, 40.0, 90.0, true))
            .unwrap();
        let a = Viewpoint::new(Mat4::IDENTITY, Mat4::IDENTITY);
        let b = Viewpoint::new(
            Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)),
            Mat4::perspective_lh(1.0, 1.0, 1.0, 100.0),
        );

        let base = FrameConstants::build(&a, &lights, &SceneEffects::default());
        let moved = base.with_viewpoint(&b);

        assert_ne!(base.view, moved.view);
        assert_ne!(base.camera_position, moved.camera_position);
        assert_eq!(base.lights, moved.lights);
        assert_eq!(base.shadow_casters, moved.shadow_casters);
        assert_eq!(moved.shadow_caster_count, 1);
    }
}
