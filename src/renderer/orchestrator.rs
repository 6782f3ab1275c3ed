use std::fmt;

use super::backend::{FrameBudget, PassDescriptor, RenderBackend, TargetId};
use super::binder::{PassBinder, PassContext, PassStats};
use super::constants::FrameConstants;
use super::targets::RenderTargets;
use super::technique::{TechniqueHandle, TechniqueLibrary};
use crate::error::{RenderError, RenderResult};
use crate::scene::{DrawItem, Scene};

/// Where the orchestrator is within a frame.
///
/// A frame always walks Idle, every portal pass, every shadow pass, the
/// main pass, Present, and back to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    Idle,
    PortalPass(usize),
    ShadowPass(usize),
    MainPass,
    Present,
}

impl FrameStage {
    /// The stage after this one for a frame with `portals` portal passes and
    /// `casters` shadow passes.
    pub fn next(self, portals: usize, casters: usize) -> FrameStage {
        let first_shadow = || {
            if casters > 0 {
                FrameStage::ShadowPass(0)
            } else {
                FrameStage::MainPass
            }
        };
        match self {
            FrameStage::Idle if portals > 0 => FrameStage::PortalPass(0),
            FrameStage::Idle => first_shadow(),
            FrameStage::PortalPass(i) if i + 1 < portals => FrameStage::PortalPass(i + 1),
            FrameStage::PortalPass(_) => first_shadow(),
            FrameStage::ShadowPass(i) if i + 1 < casters => FrameStage::ShadowPass(i + 1),
            FrameStage::ShadowPass(_) => FrameStage::MainPass,
            FrameStage::MainPass => FrameStage::Present,
            FrameStage::Present => FrameStage::Idle,
        }
    }
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameStage::Idle => write!(f, "idle"),
            FrameStage::PortalPass(i) => write!(f, "portal pass {i}"),
            FrameStage::ShadowPass(i) => write!(f, "shadow pass {i}"),
            FrameStage::MainPass => write!(f, "main pass"),
            FrameStage::Present => write!(f, "present"),
        }
    }
}

/// Targets written so far this frame and by which pass.
#[derive(Debug, Default, Clone)]
pub struct FrameLedger {
    written: Vec<(TargetId, FrameStage)>,
}

impl FrameLedger {
    pub fn reset(&mut self) {
        self.written.clear();
    }

    pub fn record(&mut self, target: TargetId, stage: FrameStage) {
        self.written.push((target, stage));
    }

    pub fn was_written(&self, target: TargetId) -> bool {
        self.writer(target).is_some()
    }

    pub fn writer(&self, target: TargetId) -> Option<FrameStage> {
        self.written
            .iter()
            .rev()
            .find(|(t, _)| *t == target)
            .map(|(_, stage)| *stage)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub passes: u32,
    pub draw_calls: u32,
    pub shadow_draw_calls: u32,
    pub technique_binds: u32,
    pub skipped_binds: u32,
}

impl FrameStats {
    fn add_pass(&mut self, pass: PassStats, shadow: bool) {
        self.passes += 1;
        self.draw_calls += pass.draw_calls;
        if shadow {
            self.shadow_draw_calls += pass.draw_calls;
        }
        self.technique_binds += pass.technique_binds;
        self.skipped_binds += pass.skipped_binds;
    }
}

/// Records one frame as an ordered sequence of passes: portals first, then
/// one depth-only pass per shadow-casting light, then the main pass.
#[derive(Debug)]
pub struct FrameOrchestrator {
    targets: RenderTargets,
    techniques: TechniqueLibrary,
    depth_only: TechniqueHandle,
    binder: PassBinder,
    stage: FrameStage,
    ledger: FrameLedger,
    background: [f32; 4],
    frame_index: u64,
    last_stats: FrameStats,
}

impl FrameOrchestrator {
    /// Takes ownership of `targets`. If the techniques cannot be served by
    /// them, the targets are released before the error is returned.
    pub fn new(
        backend: &mut dyn RenderBackend,
        targets: RenderTargets,
        techniques: TechniqueLibrary,
        depth_only: TechniqueHandle,
        background: [f32; 4],
    ) -> RenderResult<Self> {
        if let Err(err) = Self::validate(&targets, &techniques, depth_only) {
            targets.release_all(backend);
            return Err(err);
        }

        Ok(Self {
            targets,
            techniques,
            depth_only,
            binder: PassBinder::new(),
            stage: FrameStage::Idle,
            ledger: FrameLedger::default(),
            background,
            frame_index: 0,
            last_stats: FrameStats::default(),
        })
    }

    fn validate(
        targets: &RenderTargets,
        techniques: &TechniqueLibrary,
        depth_only: TechniqueHandle,
    ) -> RenderResult<()> {
        let depth = techniques.get(depth_only).ok_or_else(|| {
            RenderError::InvalidState("depth-only technique is not loaded".into())
        })?;
        if depth.pixel.is_some() {
            return Err(RenderError::InvalidState(format!(
                "shadow technique {} must be depth-only",
                depth.name
            )));
        }
        if techniques.shadow_maps_required() > targets.shadow_map_count() {
            return Err(RenderError::InvalidState(format!(
                "techniques sample {} shadow maps but only {} exist",
                techniques.shadow_maps_required(),
                targets.shadow_map_count()
            )));
        }
        if techniques.portals_required() > targets.portal_count() {
            return Err(RenderError::InvalidState(format!(
                "techniques sample {} portals but only {} exist",
                techniques.portals_required(),
                targets.portal_count()
            )));
        }
        Ok(())
    }

    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    pub fn targets(&self) -> &RenderTargets {
        &self.targets
    }

    pub fn techniques(&self) -> &TechniqueLibrary {
        &self.techniques
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn resize(
        &mut self,
        backend: &mut dyn RenderBackend,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        self.targets.resize(backend, width, height)
    }

    /// Records and presents one frame. On failure the partial frame is
    /// dropped and the orchestrator returns to idle.
    pub fn render_frame(
        &mut self,
        backend: &mut dyn RenderBackend,
        scene: &Scene,
    ) -> RenderResult<FrameStats> {
        if self.stage != FrameStage::Idle {
            return Err(RenderError::InvalidState(format!(
                "frame started while in {}",
                self.stage
            )));
        }

        match self.record_frame(backend, scene) {
            Ok(stats) => {
                self.stage = FrameStage::Idle;
                self.frame_index += 1;
                self.last_stats = stats;
                Ok(stats)
            }
            Err(err) => {
                log::warn!(
                    "Frame {} aborted during {}: {}",
                    self.frame_index,
                    self.stage,
                    err
                );
                backend.abort_frame();
                self.targets.unbind_all();
                self.binder.begin_pass();
                self.stage = FrameStage::Idle;
                Err(err)
            }
        }
    }

    fn record_frame(
        &mut self,
        backend: &mut dyn RenderBackend,
        scene: &Scene,
    ) -> RenderResult<FrameStats> {
        let portals = scene.portal_cameras().len();
        let casters = scene.lights().shadow_caster_count();
        if portals > self.targets.portal_count() {
            return Err(RenderError::InvalidState(format!(
                "scene has {portals} portals but only {} portal targets exist",
                self.targets.portal_count()
            )));
        }
        if casters > self.targets.shadow_map_count() {
            return Err(RenderError::InvalidState(format!(
                "scene has {casters} shadow casters but only {} shadow maps exist",
                self.targets.shadow_map_count()
            )));
        }

        backend.begin_frame(frame_budget(scene, portals, casters))?;
        self.ledger.reset();

        let main_viewport = self.targets.back_buffer().viewport();
        let main_view = scene.main_camera().viewpoint(main_viewport.aspect());
        let base = FrameConstants::build(&main_view, scene.lights(), scene.effects());

        let mut stats = FrameStats::default();
        let mut stage = FrameStage::Idle.next(portals, casters);
        loop {
            self.stage = stage;
            match stage {
                FrameStage::PortalPass(i) => {
                    let pass = self.portal_pass(backend, scene, &base, i)?;
                    stats.add_pass(pass, false);
                }
                FrameStage::ShadowPass(i) => {
                    let pass = self.shadow_pass(backend, scene, &base, i)?;
                    stats.add_pass(pass, true);
                }
                FrameStage::MainPass => {
                    let pass = self.main_pass(backend, scene, &base)?;
                    stats.add_pass(pass, false);
                }
                FrameStage::Present => {
                    backend.present()?;
                    break;
                }
                FrameStage::Idle => break,
            }
            stage = stage.next(portals, casters);
        }

        log::trace!(
            "Frame {}: {} passes, {} draws, {} binds ({} skipped)",
            self.frame_index,
            stats.passes,
            stats.draw_calls,
            stats.technique_binds,
            stats.skipped_binds
        );
        Ok(stats)
    }

    fn portal_pass(
        &mut self,
        backend: &mut dyn RenderBackend,
        scene: &Scene,
        base: &FrameConstants,
        index: usize,
    ) -> RenderResult<PassStats> {
        let portal = self
            .targets
            .portal(index)
            .ok_or_else(|| RenderError::InvalidState(format!("portal {index} does not exist")))?;
        let (color, depth) = (portal.color.id(), portal.depth.id());
        let viewport = portal.color.viewport();
        let camera = scene.portal_cameras().get(index).ok_or_else(|| {
            RenderError::InvalidState(format!("portal {index} has no camera"))
        })?;
        let constants = base.with_viewpoint(&camera.viewpoint(viewport.aspect()));

        self.targets
            .clear(backend, color, Some(self.background), None)?;
        self.targets.clear(backend, depth, None, Some(1.0))?;
        let label = format!("portal {index}");
        self.color_pass(backend, scene, &constants, &label, color, depth)
    }

    fn shadow_pass(
        &mut self,
        backend: &mut dyn RenderBackend,
        scene: &Scene,
        base: &FrameConstants,
        index: usize,
    ) -> RenderResult<PassStats> {
        let (light_index, light) = scene.lights().shadow_casters().nth(index).ok_or_else(|| {
            RenderError::InvalidState(format!("no shadow caster for shadow map {index}"))
        })?;
        let viewpoint = light.shadow_viewpoint().ok_or_else(|| {
            RenderError::InvalidState(format!("light {light_index} has no shadow projection"))
        })?;
        let target = self
            .targets
            .shadow_map(index)
            .ok_or_else(|| RenderError::InvalidState(format!("shadow map {index} does not exist")))?;
        let (target_id, viewport) = (target.id(), target.viewport());

        self.targets.ensure_writable(target_id)?;
        self.targets.clear(backend, target_id, None, Some(1.0))?;

        let label = format!("shadow {index} (light {light_index})");
        backend.begin_pass(&PassDescriptor {
            label: &label,
            color: None,
            depth: Some(target_id),
            viewport,
        })?;
        backend.write_frame_constants(&base.with_viewpoint(&viewpoint))?;

        self.binder.begin_pass();
        let ctx = PassContext {
            stage: self.stage,
            color: None,
            depth: Some(target_id),
            ledger: &self.ledger,
        };
        let depth_only = self.depth_only;
        let items = scene.shadow_items().iter().map(|&drawable| DrawItem {
            drawable,
            technique: depth_only,
        });
        let stats = self
            .binder
            .run(backend, &ctx, items, scene, &self.techniques, &mut self.targets)?;
        backend.end_pass()?;
        self.binder.finish_pass(backend, &mut self.targets);

        self.ledger.record(target_id, self.stage);
        Ok(stats)
    }

    fn main_pass(
        &mut self,
        backend: &mut dyn RenderBackend,
        scene: &Scene,
        base: &FrameConstants,
    ) -> RenderResult<PassStats> {
        let color = self.targets.back_buffer().id();
        let depth = self.targets.main_depth().id();
        self.targets
            .clear(backend, color, Some(self.background), None)?;
        self.targets.clear(backend, depth, None, Some(1.0))?;
        self.color_pass(backend, scene, base, "main", color, depth)
    }

    fn color_pass(
        &mut self,
        backend: &mut dyn RenderBackend,
        scene: &Scene,
        constants: &FrameConstants,
        label: &str,
        color: TargetId,
        depth: TargetId,
    ) -> RenderResult<PassStats> {
        self.targets.ensure_writable(color)?;
        self.targets.ensure_writable(depth)?;
        let viewport = self
            .targets
            .viewport_for(color)
            .ok_or_else(|| RenderError::InvalidState(format!("{label} target is unknown")))?;

        backend.begin_pass(&PassDescriptor {
            label,
            color: Some(color),
            depth: Some(depth),
            viewport,
        })?;
        backend.write_frame_constants(constants)?;

        self.binder.begin_pass();
        let ctx = PassContext {
            stage: self.stage,
            color: Some(color),
            depth: Some(depth),
            ledger: &self.ledger,
        };
        let items = scene.color_items().iter().copied();
        let stats = self
            .binder
            .run(backend, &ctx, items, scene, &self.techniques, &mut self.targets)?;
        backend.end_pass()?;
        self.binder.finish_pass(backend, &mut self.targets);

        self.ledger.record(color, self.stage);
        self.ledger.record(depth, self.stage);
        Ok(stats)
    }

    /// Releases every target owned by the orchestrator.
    pub fn shutdown(self, backend: &mut dyn RenderBackend) {
        self.targets.release_all(backend);
    }
}

fn frame_budget(scene: &Scene, portals: usize, casters: usize) -> FrameBudget {
    let color_draws: u32 = scene
        .color_items()
        .iter()
        .filter_map(|item| scene.drawable(item.drawable))
        .map(|d| d.renderable.draw_count())
        .sum();
    let shadow_draws: u32 = scene
        .shadow_items()
        .iter()
        .filter_map(|r| scene.drawable(*r))
        .map(|d| d.renderable.draw_count())
        .sum();
    FrameBudget {
        passes: (portals + casters + 1) as u32,
        draws: color_draws * (portals as u32 + 1) + shadow_draws * casters as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::RecordingBackend;
    use crate::renderer::state::PipelineState;
    use crate::renderer::targets::TargetConfig;
    use crate::renderer::technique::{Technique, TextureSource};

    #[test]
    fn rejected_orchestrator_releases_its_targets() {
        const NEEDS_TWO_SHADOW_MAPS: Technique = Technique {
            name: "Lit",
            vertex_program: "pixel_lighting_vs",
            pixel_program: Some("shadow_mapping_ps"),
            textures: &[(1, TextureSource::ShadowMap(1))],
            samplers: &[],
            state: PipelineState::OPAQUE,
        };
        let mut backend = RecordingBackend::new(320, 240);
        let techniques =
            TechniqueLibrary::load(&mut backend, &[Technique::DEPTH_ONLY, NEEDS_TWO_SHADOW_MAPS])
                .unwrap();
        let targets = RenderTargets::create(
            &mut backend,
            &TargetConfig {
                shadow_map_size: 64,
                shadow_maps: 1,
                portal_sizes: vec![(32, 32)],
            },
        )
        .unwrap();
        assert_eq!(backend.live_targets(), 1 + 1 + 1 + 2);

        let depth_only = techniques.handle(0).unwrap();
        let err = FrameOrchestrator::new(&mut backend, targets, techniques, depth_only, [0.0; 4])
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidState(_)));
        assert_eq!(backend.live_targets(), 1);
    }

    #[test]
    fn stages_follow_fixed_order() {
        let mut stage = FrameStage::Idle;
        let mut order = Vec::new();
        loop {
            stage = stage.next(2, 3);
            order.push(stage);
            if stage == FrameStage::Idle {
                break;
            }
        }
        assert_eq!(
            order,
            vec![
                FrameStage::PortalPass(0),
                FrameStage::PortalPass(1),
                FrameStage::ShadowPass(0),
                FrameStage::ShadowPass(1),
                FrameStage::ShadowPass(2),
                FrameStage::MainPass,
                FrameStage::Present,
                FrameStage::Idle,
            ]
        );
    }

    #[test]
    fn empty_frame_goes_straight_to_main_pass() {
        assert_eq!(FrameStage::Idle.next(0, 0), FrameStage::MainPass);
        assert_eq!(FrameStage::PortalPass(0).next(1, 0), FrameStage::MainPass);
    }

    #[test]
    fn ledger_reports_latest_writer() {
        let mut ledger = FrameLedger::default();
        let target = TargetId(4);
        assert!(!ledger.was_written(target));
        ledger.record(target, FrameStage::ShadowPass(0));
        ledger.record(target, FrameStage::MainPass);
        assert_eq!(ledger.writer(target), Some(FrameStage::MainPass));
        ledger.reset();
        assert!(!ledger.was_written(target));
    }
}
