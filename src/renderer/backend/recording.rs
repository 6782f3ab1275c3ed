use std::collections::{HashMap, HashSet};

use glam::Vec4;

use super::{
    BoundTexture, ClearValue, FrameBudget, MeshId, PassDescriptor, ProgramId, ProgramStage,
    RenderBackend, SamplerBinding, TargetDescriptor, TargetFormat, TargetId, TargetUsage,
    TechniqueBinding, TextureId, TextureRef, Viewport,
};
use crate::error::{RenderError, RenderResult};
use crate::renderer::constants::{FrameConstants, ModelConstants};
use crate::renderer::state::PipelineState;
use crate::renderer::vertex::Vertex;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTarget {
        id: TargetId,
        label: String,
        width: u32,
        height: u32,
        format: TargetFormat,
    },
    ReleaseTarget(TargetId),
    BeginFrame(FrameBudget),
    Clear {
        target: TargetId,
        value: ClearValue,
    },
    BeginPass {
        label: String,
        color: Option<TargetId>,
        depth: Option<TargetId>,
        viewport: Viewport,
    },
    FrameConstants(Box<FrameConstants>),
    BindTechnique {
        label: String,
        vertex: ProgramId,
        pixel: Option<ProgramId>,
        textures: Vec<BoundTexture>,
        samplers: Vec<SamplerBinding>,
        state: PipelineState,
    },
    ModelConstants(ModelConstants),
    Draw(MeshId),
    EndPass,
    UnbindInputs(Vec<u32>),
    Present,
    AbortFrame,
}

#[derive(Debug, Clone)]
struct TargetInfo {
    format: TargetFormat,
    usage: TargetUsage,
    width: u32,
    height: u32,
}

#[derive(Debug, Default)]
struct FrameState {
    budget: FrameBudget,
    passes: u32,
    draws: u32,
    pass: Option<(Option<TargetId>, Option<TargetId>)>,
    constants: Option<FrameConstants>,
    technique: Option<PipelineState>,
    model: Option<ModelConstants>,
}

/// Headless backend that validates and logs every call instead of talking to a GPU.
///
/// Each target also carries a single probe sample (colour or depth). Clears
/// set it and every draw resolves one fragment into it: the fragment colour
/// is the model tint and its depth is the model origin projected through the
/// pass constants. This is enough to observe blend and depth-write behaviour.
#[derive(Debug)]
pub struct RecordingBackend {
    size: (u32, u32),
    targets: HashMap<TargetId, TargetInfo>,
    next_target: u32,
    programs: Vec<(String, ProgramStage)>,
    textures: Vec<String>,
    meshes: Vec<String>,
    missing_assets: HashSet<String>,
    fail_target_creation: bool,
    pending_clears: HashMap<TargetId, ClearValue>,
    probe_colors: HashMap<TargetId, Vec4>,
    probe_depths: HashMap<TargetId, f32>,
    frame: Option<FrameState>,
    commands: Vec<Command>,
    presented_frames: u64,
}

const BACK_BUFFER: TargetId = TargetId(0);

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        let mut targets = HashMap::new();
        targets.insert(
            BACK_BUFFER,
            TargetInfo {
                format: TargetFormat::Surface,
                usage: TargetUsage::ATTACHMENT,
                width,
                height,
            },
        );
        Self {
            size: (width, height),
            targets,
            next_target: 1,
            programs: Vec::new(),
            textures: Vec::new(),
            meshes: Vec::new(),
            missing_assets: HashSet::new(),
            fail_target_creation: false,
            pending_clears: HashMap::new(),
            probe_colors: HashMap::new(),
            probe_depths: HashMap::new(),
            frame: None,
            commands: Vec::new(),
            presented_frames: 0,
        }
    }

    /// Makes every later `create_target` call fail.
    pub fn fail_target_creation(&mut self) {
        self.fail_target_creation = true;
    }

    /// Makes loading the named program, texture or mesh fail.
    pub fn mark_missing(&mut self, asset: impl Into<String>) {
        self.missing_assets.insert(asset.into());
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Labels of the passes recorded so far, in order.
    pub fn pass_labels(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::BeginPass { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented_frames
    }

    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    pub fn target_size(&self, target: TargetId) -> Option<(u32, u32)> {
        self.targets.get(&target).map(|t| (t.width, t.height))
    }

    pub fn texture_name(&self, texture: TextureId) -> Option<&str> {
        self.textures.get(texture.index()).map(String::as_str)
    }

    pub fn program_name(&self, program: ProgramId) -> Option<&str> {
        self.programs.get(program.index()).map(|(name, _)| name.as_str())
    }

    pub fn probe_color(&self, target: TargetId) -> Option<Vec4> {
        self.probe_colors.get(&target).copied()
    }

    pub fn probe_depth(&self, target: TargetId) -> Option<f32> {
        self.probe_depths.get(&target).copied()
    }

    fn check_asset(&self, name: &str) -> RenderResult<()> {
        if self.missing_assets.contains(name) {
            return Err(RenderError::asset(name, "not found"));
        }
        Ok(())
    }

    fn frame_mut(&mut self, call: &str) -> RenderResult<&mut FrameState> {
        self.frame
            .as_mut()
            .ok_or_else(|| RenderError::InvalidState(format!("{call} outside of a frame")))
    }

    fn pass_mut(&mut self, call: &str) -> RenderResult<&mut FrameState> {
        let frame = self.frame_mut(call)?;
        if frame.pass.is_none() {
            return Err(RenderError::InvalidState(format!("{call} outside of a pass")));
        }
        Ok(frame)
    }

    fn check_input(&self, texture: &BoundTexture) -> RenderResult<()> {
        let TextureRef::Target(target) = texture.texture else {
            return Ok(());
        };
        let info = self.targets.get(&target).ok_or_else(|| {
            RenderError::InvalidState(format!("slot {} bound to released target {target:?}", texture.slot))
        })?;
        if !info.usage.contains(TargetUsage::SAMPLED) {
            return Err(RenderError::ResourceHazard(format!(
                "target {target:?} is not sampleable"
            )));
        }
        if let Some(Some((color, depth))) = self.frame.as_ref().map(|f| f.pass) {
            if color == Some(target) || depth == Some(target) {
                return Err(RenderError::ResourceHazard(format!(
                    "target {target:?} bound as input while attached to the current pass"
                )));
            }
        }
        Ok(())
    }

    fn apply_clear(&mut self, target: TargetId) {
        match self.pending_clears.remove(&target) {
            Some(ClearValue::Color(c)) => {
                self.probe_colors.insert(target, Vec4::from(c));
            }
            Some(ClearValue::Depth(d)) => {
                self.probe_depths.insert(target, d);
            }
            None => {}
        }
    }
}

impl RenderBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "Recording Backend"
    }

    fn back_buffer(&self) -> TargetId {
        BACK_BUFFER
    }

    fn back_buffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        if let Some(info) = self.targets.get_mut(&BACK_BUFFER) {
            info.width = width;
            info.height = height;
        }
    }

    fn create_target(&mut self, desc: &TargetDescriptor<'_>) -> RenderResult<TargetId> {
        if self.fail_target_creation || desc.width == 0 || desc.height == 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "{} ({}x{})",
                desc.label, desc.width, desc.height
            )));
        }
        let id = TargetId(self.next_target);
        self.next_target += 1;
        self.targets.insert(
            id,
            TargetInfo {
                format: desc.format,
                usage: desc.usage,
                width: desc.width,
                height: desc.height,
            },
        );
        log::trace!("RecordingBackend: created target {:?} {:?}", desc.label, id);
        self.commands.push(Command::CreateTarget {
            id,
            label: desc.label.to_string(),
            width: desc.width,
            height: desc.height,
            format: desc.format,
        });
        Ok(id)
    }

    fn release_target(&mut self, target: TargetId) {
        if target == BACK_BUFFER {
            return;
        }
        if self.targets.remove(&target).is_some() {
            self.probe_colors.remove(&target);
            self.probe_depths.remove(&target);
            self.commands.push(Command::ReleaseTarget(target));
        }
    }

    fn load_program(&mut self, name: &str, stage: ProgramStage) -> RenderResult<ProgramId> {
        self.check_asset(name)?;
        self.programs.push((name.to_string(), stage));
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn load_texture(&mut self, name: &str) -> RenderResult<TextureId> {
        self.check_asset(name)?;
        self.textures.push(name.to_string());
        Ok(TextureId(self.textures.len() as u32 - 1))
    }

    fn load_cube_texture(&mut self, faces: &[&str; 6]) -> RenderResult<TextureId> {
        for face in faces {
            self.check_asset(face)?;
        }
        self.textures.push(faces.join("|"));
        Ok(TextureId(self.textures.len() as u32 - 1))
    }

    fn create_mesh(
        &mut self,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> RenderResult<MeshId> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(RenderError::ResourceCreationFailed(format!(
                "mesh {label} has no geometry"
            )));
        }
        self.meshes.push(label.to_string());
        Ok(MeshId(self.meshes.len() as u32 - 1))
    }

    fn load_mesh(&mut self, path: &str) -> RenderResult<MeshId> {
        self.check_asset(path)?;
        self.meshes.push(path.to_string());
        Ok(MeshId(self.meshes.len() as u32 - 1))
    }

    fn begin_frame(&mut self, budget: FrameBudget) -> RenderResult<()> {
        if self.frame.is_some() {
            return Err(RenderError::InvalidState("frame already in progress".into()));
        }
        self.frame = Some(FrameState {
            budget,
            ..FrameState::default()
        });
        self.commands.push(Command::BeginFrame(budget));
        Ok(())
    }

    fn clear_target(&mut self, target: TargetId, value: ClearValue) {
        self.pending_clears.insert(target, value);
        self.commands.push(Command::Clear { target, value });
    }

    fn begin_pass(&mut self, desc: &PassDescriptor<'_>) -> RenderResult<()> {
        for target in [desc.color, desc.depth].into_iter().flatten() {
            let info = self.targets.get(&target).ok_or_else(|| {
                RenderError::InvalidState(format!("pass {} uses released target {target:?}", desc.label))
            })?;
            if !info.usage.contains(TargetUsage::ATTACHMENT) {
                return Err(RenderError::InvalidState(format!(
                    "target {target:?} cannot be rendered to"
                )));
            }
        }
        let frame = self.frame_mut("begin_pass")?;
        if frame.pass.is_some() {
            return Err(RenderError::InvalidState(format!(
                "pass {} started inside another pass",
                desc.label
            )));
        }
        frame.passes += 1;
        if frame.passes > frame.budget.passes {
            return Err(RenderError::InvalidState("frame pass budget exceeded".into()));
        }
        frame.pass = Some((desc.color, desc.depth));
        frame.constants = None;
        frame.technique = None;

        for target in [desc.color, desc.depth].into_iter().flatten() {
            self.apply_clear(target);
        }
        self.commands.push(Command::BeginPass {
            label: desc.label.to_string(),
            color: desc.color,
            depth: desc.depth,
            viewport: desc.viewport,
        });
        Ok(())
    }

    fn write_frame_constants(&mut self, constants: &FrameConstants) -> RenderResult<()> {
        self.pass_mut("write_frame_constants")?.constants = Some(*constants);
        self.commands
            .push(Command::FrameConstants(Box::new(*constants)));
        Ok(())
    }

    fn bind_technique(&mut self, binding: &TechniqueBinding<'_>) -> RenderResult<()> {
        self.pass_mut("bind_technique")?;
        for texture in binding.textures {
            self.check_input(texture)?;
        }
        self.pass_mut("bind_technique")?.technique = Some(binding.state);
        self.commands.push(Command::BindTechnique {
            label: binding.label.to_string(),
            vertex: binding.vertex,
            pixel: binding.pixel,
            textures: binding.textures.to_vec(),
            samplers: binding.samplers.to_vec(),
            state: binding.state,
        });
        Ok(())
    }

    fn write_model_constants(&mut self, constants: &ModelConstants) -> RenderResult<()> {
        self.pass_mut("write_model_constants")?.model = Some(*constants);
        self.commands.push(Command::ModelConstants(*constants));
        Ok(())
    }

    fn draw_mesh(&mut self, mesh: MeshId) -> RenderResult<()> {
        if mesh.index() >= self.meshes.len() {
            return Err(RenderError::InvalidState(format!("unknown mesh {mesh:?}")));
        }
        let frame = self.pass_mut("draw_mesh")?;
        let (Some(constants), Some(state), Some(model)) =
            (frame.constants, frame.technique, frame.model)
        else {
            return Err(RenderError::InvalidState(
                "draw before frame constants, technique and model constants were set".into(),
            ));
        };
        frame.draws += 1;
        if frame.draws > frame.budget.draws {
            return Err(RenderError::InvalidState("frame draw budget exceeded".into()));
        }
        let (color, depth) = frame.pass.unwrap_or((None, None));

        let clip = constants.view_projection_matrix() * model.world_matrix().w_axis;
        let fragment_depth = if clip.w.abs() > f32::EPSILON {
            clip.z / clip.w
        } else {
            0.0
        };
        let fragment_color = Vec4::from((glam::Vec3::from(model.tint), 1.0));

        let mut stored_depth = depth.and_then(|d| self.probe_depths.get(&d).copied());
        let mut probe = color
            .and_then(|c| self.probe_colors.get(&c).copied())
            .unwrap_or(Vec4::ZERO);
        state.resolve_fragment(&mut probe, stored_depth.as_mut(), fragment_color, fragment_depth);
        if let Some(c) = color {
            self.probe_colors.insert(c, probe);
        }
        if let (Some(d), Some(value)) = (depth, stored_depth) {
            self.probe_depths.insert(d, value);
        }

        self.commands.push(Command::Draw(mesh));
        Ok(())
    }

    fn end_pass(&mut self) -> RenderResult<()> {
        let frame = self.pass_mut("end_pass")?;
        frame.pass = None;
        self.commands.push(Command::EndPass);
        Ok(())
    }

    fn unbind_inputs(&mut self, slots: &[u32]) {
        self.commands.push(Command::UnbindInputs(slots.to_vec()));
    }

    fn present(&mut self) -> RenderResult<()> {
        let frame = self.frame_mut("present")?;
        if frame.pass.is_some() {
            return Err(RenderError::InvalidState("present inside a pass".into()));
        }
        self.frame = None;
        self.presented_frames += 1;
        self.commands.push(Command::Present);
        Ok(())
    }

    fn abort_frame(&mut self) {
        if self.frame.take().is_some() {
            self.pending_clears.clear();
            self.commands.push(Command::AbortFrame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::TargetUsage;

    fn color_target(backend: &mut RecordingBackend, usage: TargetUsage) -> TargetId {
        backend
            .create_target(&TargetDescriptor {
                label: "test",
                width: 4,
                height: 4,
                format: TargetFormat::Rgba8Unorm,
                usage,
            })
            .unwrap()
    }

    #[test]
    fn draw_outside_pass_is_rejected() {
        let mut backend = RecordingBackend::new(64, 64);
        let mesh = backend.load_mesh("cube").unwrap();
        backend
            .begin_frame(FrameBudget { passes: 1, draws: 1 })
            .unwrap();
        assert!(matches!(
            backend.draw_mesh(mesh),
            Err(RenderError::InvalidState(_))
        ));
    }

    #[test]
    fn sampling_an_attached_target_is_a_hazard() {
        let mut backend = RecordingBackend::new(64, 64);
        let target = color_target(&mut backend, TargetUsage::ATTACHMENT | TargetUsage::SAMPLED);
        let program = backend.load_program("Test_vs", ProgramStage::Vertex).unwrap();
        backend
            .begin_frame(FrameBudget { passes: 1, draws: 1 })
            .unwrap();
        backend
            .begin_pass(&PassDescriptor {
                label: "portal",
                color: Some(target),
                depth: None,
                viewport: Viewport::full(4, 4),
            })
            .unwrap();

        let textures = [BoundTexture {
            slot: 0,
            texture: TextureRef::Target(target),
        }];
        let result = backend.bind_technique(&TechniqueBinding {
            label: "self",
            vertex: program,
            pixel: None,
            textures: &textures,
            samplers: &[],
            state: PipelineState::OPAQUE,
        });
        assert!(matches!(result, Err(RenderError::ResourceHazard(_))));
    }

    #[test]
    fn missing_assets_fail_to_load() {
        let mut backend = RecordingBackend::new(64, 64);
        backend.mark_missing("Flare.jpg");
        assert!(matches!(
            backend.load_texture("Flare.jpg"),
            Err(RenderError::AssetLoadFailed { .. })
        ));
        assert!(backend.load_texture("Moogle.png").is_ok());
    }

    #[test]
    fn target_creation_failure_is_reported() {
        let mut backend = RecordingBackend::new(64, 64);
        backend.fail_target_creation();
        let result = backend.create_target(&TargetDescriptor {
            label: "shadow",
            width: 16,
            height: 16,
            format: TargetFormat::Depth32Float,
            usage: TargetUsage::ATTACHMENT,
        });
        assert!(matches!(result, Err(RenderError::ResourceCreationFailed(_))));
    }
}
