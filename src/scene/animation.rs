use glam::{Mat4, Quat, Vec3};
use winit::keyboard::KeyCode;

use super::input::{InputState, ModelKeys};
use super::model::{control_transform, Renderable};
use super::transform::Transform;
use crate::error::{RenderError, RenderResult};
use crate::renderer::backend::MeshId;
use crate::renderer::binder::DrawContext;

/// Rotation a node's local transform turns through while its spin keys are held.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spin {
    pub axis: Vec3,
    pub radians_per_second: f32,
}

#[derive(Debug, Clone)]
pub struct ModelNode {
    pub name: String,
    /// Parents always precede their children.
    pub parent: Option<usize>,
    pub mesh: Option<MeshId>,
    pub local: Transform,
    pub spin: Option<Spin>,
}

/// Hierarchy of meshes sharing a root transform, e.g. a bike body with wheels.
#[derive(Debug, Clone)]
pub struct AnimatedModel {
    root: Transform,
    nodes: Vec<ModelNode>,
}

impl AnimatedModel {
    pub fn new() -> Self {
        Self {
            root: Transform::default(),
            nodes: Vec::new(),
        }
    }

    /// Appends a node. The parent, if any, must already exist.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        mesh: Option<MeshId>,
        local: Transform,
    ) -> RenderResult<usize> {
        let name = name.into();
        if let Some(parent) = parent {
            if parent >= self.nodes.len() {
                return Err(RenderError::InvalidState(format!(
                    "node {name} references missing parent {parent}"
                )));
            }
        }
        self.nodes.push(ModelNode {
            name,
            parent,
            mesh,
            local,
            spin: None,
        });
        Ok(self.nodes.len() - 1)
    }

    pub fn set_spin(&mut self, node: usize, spin: Spin) {
        if let Some(node) = self.nodes.get_mut(node) {
            node.spin = Some(spin);
        }
    }

    pub fn nodes(&self) -> &[ModelNode] {
        &self.nodes
    }

    pub fn position(&self) -> Vec3 {
        self.root.translation
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.root.translation = position;
    }

    pub fn set_euler(&mut self, angles: Vec3) {
        self.root.set_euler(angles);
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.root.scale = Vec3::splat(scale);
    }

    /// Turns every spinning node through `seconds` of its spin. Negative
    /// values spin backwards.
    pub fn spin(&mut self, seconds: f32) {
        if seconds == 0.0 {
            return;
        }
        for node in &mut self.nodes {
            if let Some(spin) = node.spin {
                let delta = Quat::from_axis_angle(spin.axis.normalize(), spin.radians_per_second * seconds);
                node.local.rotation = (node.local.rotation * delta).normalize();
            }
        }
    }

    /// Spins the wheels forward while `forward` is held and back while
    /// `backward` is held.
    pub fn control_spin(&mut self, dt: f32, input: &InputState, forward: KeyCode, backward: KeyCode) {
        self.spin(input.axis(forward, backward) * dt);
    }

    /// Moves and turns the root like a single model.
    pub fn control(&mut self, dt: f32, input: &InputState, keys: &ModelKeys) {
        control_transform(&mut self.root, dt, input, keys);
    }

    /// World matrix of every node, root transform included.
    pub fn node_world_matrices(&self) -> Vec<Mat4> {
        let root = self.root.matrix();
        let mut worlds: Vec<Mat4> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let parent = node.parent.map_or(root, |p| worlds[p]);
            worlds.push(parent * node.local.matrix());
        }
        worlds
    }
}

impl Default for AnimatedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderable for AnimatedModel {
    fn world_matrix(&self) -> Mat4 {
        self.root.matrix()
    }

    fn draw_count(&self) -> u32 {
        self.nodes.iter().filter(|n| n.mesh.is_some()).count() as u32
    }

    fn render(&self, ctx: &mut DrawContext<'_>) -> RenderResult<()> {
        for (node, world) in self.nodes.iter().zip(self.node_world_matrices()) {
            if let Some(mesh) = node.mesh {
                ctx.draw(world, mesh)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn bike() -> AnimatedModel {
        let mut model = AnimatedModel::new();
        let body = model
            .add_node("body", None, Some(MeshId(0)), Transform::default())
            .unwrap();
        let wheel = model
            .add_node(
                "front wheel",
                Some(body),
                Some(MeshId(1)),
                Transform::from_translation(Vec3::new(0.0, 0.0, 2.0)),
            )
            .unwrap();
        model.set_spin(
            wheel,
            Spin {
                axis: Vec3::X,
                radians_per_second: PI,
            },
        );
        model
    }

    #[test]
    fn children_inherit_root_transform() {
        let mut model = bike();
        model.set_position(Vec3::new(0.0, 0.0, 270.0));
        model.set_scale(3.0);

        let worlds = model.node_world_matrices();
        let wheel_origin = worlds[1].transform_point3(Vec3::ZERO);
        assert!(wheel_origin.abs_diff_eq(Vec3::new(0.0, 0.0, 276.0), 1e-4));
    }

    #[test]
    fn spin_only_moves_spinning_nodes() {
        let mut model = bike();
        let before = model.node_world_matrices();
        model.spin(0.5);
        let after = model.node_world_matrices();

        assert_eq!(before[0], after[0]);
        let up = after[1].transform_vector3(Vec3::Y);
        assert!(up.abs_diff_eq(Vec3::Z, 1e-5));
    }

    #[test]
    fn wheels_spin_only_while_a_spin_key_is_held() {
        let mut model = bike();
        let rest = model.nodes()[1].local;
        let mut input = InputState::new();

        model.control_spin(0.5, &input, KeyCode::Period, KeyCode::Comma);
        assert_eq!(model.nodes()[1].local, rest);

        input.press(KeyCode::Period);
        model.control_spin(0.5, &input, KeyCode::Period, KeyCode::Comma);
        assert_ne!(model.nodes()[1].local, rest);

        input.release(KeyCode::Period);
        input.press(KeyCode::Comma);
        model.control_spin(0.5, &input, KeyCode::Period, KeyCode::Comma);
        assert!(model.nodes()[1]
            .local
            .rotation
            .abs_diff_eq(rest.rotation, 1e-5));
        assert_eq!(model.nodes()[0].local, Transform::default());
    }

    #[test]
    fn missing_parent_is_rejected() {
        let mut model = AnimatedModel::new();
        assert!(model
            .add_node("orphan", Some(3), None, Transform::default())
            .is_err());
        assert_eq!(model.draw_count(), 0);
    }
}
