use glam::{Mat4, Quat, Vec3};

use super::model::Model;
use super::transform::Transform;
use crate::error::{RenderError, RenderResult};
use crate::renderer::constants::{Viewpoint, MAX_LIGHTS, MAX_SHADOW_CASTERS};

pub const SHADOW_NEAR: f32 = 1.0;
pub const SHADOW_FAR: f32 = 1000.0;

/// Exponent mapping light intensity to the size of its visible flare.
pub const PROXY_SCALE_EXPONENT: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub cone_degrees: f32,
    pub casts_shadow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Point,
    Spot(SpotLight),
}

/// A coloured light, optionally drawn as a flare billboard.
///
/// When a proxy model is attached, the proxy's transform is the light's
/// transform: position, facing and shadow view all read from it.
#[derive(Debug, Clone)]
pub struct Light {
    kind: LightKind,
    transform: Transform,
    color: Vec3,
    intensity: f32,
    proxy: Option<Model>,
}

impl Light {
    pub fn new(kind: LightKind, color: Vec3, intensity: f32) -> Self {
        Self {
            kind,
            transform: Transform::default(),
            color,
            intensity: intensity.max(0.0),
            proxy: None,
        }
    }

    pub fn spot(color: Vec3, intensity: f32, cone_degrees: f32, casts_shadow: bool) -> Self {
        Self::new(
            LightKind::Spot(SpotLight {
                cone_degrees,
                casts_shadow,
            }),
            color,
            intensity,
        )
    }

    pub fn with_proxy(mut self, proxy: Model) -> Self {
        self.attach_proxy(proxy);
        self
    }

    /// Attaches a flare model, snapped to the light and sized from the
    /// current intensity. Replaces any previous proxy.
    pub fn attach_proxy(&mut self, mut proxy: Model) {
        proxy.set_position(self.transform.translation);
        proxy.set_rotation(self.transform.rotation);
        proxy.set_scale(Self::proxy_scale(self.intensity));
        self.proxy = Some(proxy);
    }

    /// Removes the proxy. The light keeps the proxy's last position and orientation.
    pub fn detach_proxy(&mut self) -> Option<Model> {
        let proxy = self.proxy.take()?;
        self.transform.translation = proxy.position();
        self.transform.rotation = proxy.rotation();
        Some(proxy)
    }

    pub fn proxy_scale(intensity: f32) -> f32 {
        intensity.max(0.0).powf(PROXY_SCALE_EXPONENT)
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    pub fn spot_settings(&self) -> Option<&SpotLight> {
        match &self.kind {
            LightKind::Spot(spot) => Some(spot),
            LightKind::Point => None,
        }
    }

    pub fn casts_shadow(&self) -> bool {
        self.spot_settings().is_some_and(|s| s.casts_shadow)
    }

    pub fn proxy(&self) -> Option<&Model> {
        self.proxy.as_ref()
    }

    pub fn position(&self) -> Vec3 {
        self.proxy
            .as_ref()
            .map_or(self.transform.translation, Model::position)
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.transform.translation = position;
        if let Some(proxy) = &mut self.proxy {
            proxy.set_position(position);
        }
    }

    pub fn rotation(&self) -> Quat {
        self.proxy
            .as_ref()
            .map_or(self.transform.rotation, Model::rotation)
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Negative intensities are clamped to zero. The proxy is rescaled to match.
    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity.max(0.0);
        if let Some(proxy) = &mut self.proxy {
            proxy.set_scale(Self::proxy_scale(self.intensity));
        }
    }

    /// Colour scaled by intensity, as the shaders consume it.
    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }

    /// Unit vector the light points along (its local +Z).
    pub fn facing(&self) -> Vec3 {
        (self.rotation() * Vec3::Z).normalize()
    }

    pub fn face_target(&mut self, target: Vec3) {
        self.transform.translation = self.position();
        self.transform.face_target(target);
        if let Some(proxy) = &mut self.proxy {
            proxy.set_rotation(self.transform.rotation);
        }
    }

    /// Rigid world matrix of the light, without the proxy's scale.
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation(), self.position())
    }

    /// View matrix looking out of the light along its facing direction.
    pub fn shadow_view(&self) -> Mat4 {
        self.world_matrix().inverse()
    }

    /// Square perspective covering the spotlight cone. Point lights have none.
    pub fn shadow_projection(&self) -> Option<Mat4> {
        self.spot_settings().map(|spot| {
            Mat4::perspective_lh(spot.cone_degrees.to_radians(), 1.0, SHADOW_NEAR, SHADOW_FAR)
        })
    }

    pub fn cos_half_angle(&self) -> f32 {
        self.spot_settings()
            .map_or(-1.0, |spot| (spot.cone_degrees.to_radians() * 0.5).cos())
    }

    pub fn shadow_viewpoint(&self) -> Option<Viewpoint> {
        let projection = self.shadow_projection()?;
        Some(Viewpoint {
            view: self.shadow_view(),
            projection,
            position: self.position(),
        })
    }
}

/// Every light in the scene, in stable index order.
#[derive(Debug, Clone, Default)]
pub struct LightSet {
    lights: Vec<Light>,
}

impl LightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a light and returns its index.
    pub fn push(&mut self, light: Light) -> RenderResult<usize> {
        if self.lights.len() >= MAX_LIGHTS {
            log::warn!("Light rejected: {MAX_LIGHTS} lights already in the set");
            return Err(RenderError::InvalidState(format!(
                "at most {MAX_LIGHTS} lights are supported"
            )));
        }
        if light.casts_shadow() && self.shadow_caster_count() >= MAX_SHADOW_CASTERS {
            log::warn!("Spotlight rejected: {MAX_SHADOW_CASTERS} shadow casters already in the set");
            return Err(RenderError::InvalidState(format!(
                "at most {MAX_SHADOW_CASTERS} shadow-casting lights are supported"
            )));
        }
        self.lights.push(light);
        Ok(self.lights.len() - 1)
    }

    pub fn get(&self, index: usize) -> Option<&Light> {
        self.lights.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Light> {
        self.lights.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter()
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Shadow-casting spotlights in index order, paired with their light index.
    /// The n-th item owns shadow map n.
    pub fn shadow_casters(&self) -> impl Iterator<Item = (usize, &Light)> {
        self.lights
            .iter()
            .enumerate()
            .filter(|(_, light)| light.casts_shadow())
    }

    pub fn shadow_caster_count(&self) -> usize {
        self.shadow_casters().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::MeshId;

    #[test]
    fn proxy_follows_light() {
        let mut light = Light::new(LightKind::Point, Vec3::ONE, 10.0).with_proxy(Model::new(MeshId(0)));
        light.set_position(Vec3::new(-90.0, 40.0, -90.0));
        light.set_intensity(40.0);

        let proxy = light.proxy().unwrap();
        assert_eq!(proxy.position(), Vec3::new(-90.0, 40.0, -90.0));
        assert!((proxy.scale().x - 40f32.powf(0.7)).abs() < 1e-4);
        assert_eq!(light.position(), proxy.position());
    }

    #[test]
    fn detached_light_keeps_its_pose() {
        let mut light = Light::spot(Vec3::ONE, 10.0, 60.0, true).with_proxy(Model::new(MeshId(0)));
        light.set_position(Vec3::new(5.0, 10.0, 0.0));
        light.face_target(Vec3::new(5.0, 0.0, 0.0));
        let facing = light.facing();

        assert!(light.detach_proxy().is_some());
        assert!(light.proxy().is_none());
        assert_eq!(light.position(), Vec3::new(5.0, 10.0, 0.0));
        assert!(light.facing().abs_diff_eq(facing, 1e-6));
        assert!(light.detach_proxy().is_none());
    }

    #[test]
    fn negative_intensity_clamps_to_zero() {
        let mut light = Light::new(LightKind::Point, Vec3::ONE, 10.0);
        light.set_intensity(-3.0);
        assert_eq!(light.intensity(), 0.0);
        assert_eq!(light.radiance(), Vec3::ZERO);
    }

    #[test]
    fn point_lights_have_no_shadow_projection() {
        let light = Light::new(LightKind::Point, Vec3::ONE, 10.0);
        assert!(light.shadow_projection().is_none());
        assert!(light.shadow_viewpoint().is_none());
        assert!(!light.casts_shadow());
    }

    #[test]
    fn light_set_limits_shadow_casters() {
        let mut lights = LightSet::new();
        for _ in 0..MAX_SHADOW_CASTERS {
            lights.push(Light::spot(Vec3::ONE, 10.0, 90.0, true)).unwrap();
        }
        assert!(lights.push(Light::spot(Vec3::ONE, 10.0, 90.0, true)).is_err());
        lights.push(Light::spot(Vec3::ONE, 10.0, 90.0, false)).unwrap();

        let indices: Vec<usize> = lights.shadow_casters().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn light_set_limits_total_lights() {
        let mut lights = LightSet::new();
        for _ in 0..MAX_LIGHTS {
            lights.push(Light::new(LightKind::Point, Vec3::ONE, 1.0)).unwrap();
        }
        assert!(lights.push(Light::new(LightKind::Point, Vec3::ONE, 1.0)).is_err());
    }
}
