use std::collections::BTreeSet;

use glam::{Mat4, Vec3};

use super::backend::{BoundTexture, MeshId, RenderBackend, TargetId, TechniqueBinding, TextureRef};
use super::constants::ModelConstants;
use super::orchestrator::{FrameLedger, FrameStage};
use super::targets::RenderTargets;
use super::technique::{ResolvedSource, TechniqueHandle, TechniqueLibrary};
use crate::error::{RenderError, RenderResult};
use crate::scene::{DrawItem, Scene};

/// Handed to [`crate::scene::Renderable::render`]; uploads per-draw
/// constants and issues the draw call.
pub struct DrawContext<'a> {
    backend: &'a mut dyn RenderBackend,
    tint: Vec3,
    draws: u32,
}

impl<'a> DrawContext<'a> {
    pub fn new(backend: &'a mut dyn RenderBackend, tint: Vec3) -> Self {
        Self {
            backend,
            tint,
            draws: 0,
        }
    }

    pub fn draw(&mut self, world: Mat4, mesh: MeshId) -> RenderResult<()> {
        self.backend
            .write_model_constants(&ModelConstants::new(world, self.tint))?;
        self.backend.draw_mesh(mesh)?;
        self.draws += 1;
        Ok(())
    }

    pub fn draws(&self) -> u32 {
        self.draws
    }
}

/// The pass currently being recorded.
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    pub stage: FrameStage,
    pub color: Option<TargetId>,
    pub depth: Option<TargetId>,
    /// Targets written by earlier passes of this frame.
    pub ledger: &'a FrameLedger,
}

impl PassContext<'_> {
    fn writes(&self, target: TargetId) -> bool {
        self.color == Some(target) || self.depth == Some(target)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub draw_calls: u32,
    pub technique_binds: u32,
    pub skipped_binds: u32,
}

/// Walks a pass's draw list: binds each item's technique, resolves its
/// texture inputs, then lets the drawable issue its draws.
#[derive(Debug, Default)]
pub struct PassBinder {
    current: Option<(TechniqueHandle, Vec<BoundTexture>)>,
    input_slots: BTreeSet<u32>,
    textures: Vec<BoundTexture>,
}

impl PassBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_pass(&mut self) {
        self.current = None;
        self.input_slots.clear();
    }

    pub fn run(
        &mut self,
        backend: &mut dyn RenderBackend,
        ctx: &PassContext<'_>,
        items: impl IntoIterator<Item = DrawItem>,
        scene: &Scene,
        techniques: &TechniqueLibrary,
        targets: &mut RenderTargets,
    ) -> RenderResult<PassStats> {
        let mut stats = PassStats::default();

        for item in items {
            let drawable = scene.drawable(item.drawable).ok_or_else(|| {
                RenderError::InvalidState(format!("draw item {:?} has no drawable", item.drawable))
            })?;

            self.bind(backend, ctx, item.technique, techniques, targets, &mut stats)?;

            let mut draw = DrawContext::new(backend, drawable.tint);
            drawable.renderable.render(&mut draw)?;
            stats.draw_calls += draw.draws();
        }

        Ok(stats)
    }

    fn bind(
        &mut self,
        backend: &mut dyn RenderBackend,
        ctx: &PassContext<'_>,
        handle: TechniqueHandle,
        techniques: &TechniqueLibrary,
        targets: &mut RenderTargets,
        stats: &mut PassStats,
    ) -> RenderResult<()> {
        let technique = techniques.get(handle).ok_or_else(|| {
            RenderError::InvalidState(format!("unknown technique {handle:?}"))
        })?;

        self.textures.clear();
        for &(slot, source) in &technique.textures {
            let texture = resolve_input(ctx, source, targets)?;
            self.textures.push(BoundTexture { slot, texture });
        }

        if let Some((current, bound)) = &self.current {
            if *current == handle && *bound == self.textures {
                stats.skipped_binds += 1;
                return Ok(());
            }
        }

        backend.bind_technique(&TechniqueBinding {
            label: technique.name,
            vertex: technique.vertex,
            pixel: technique.pixel,
            textures: &self.textures,
            samplers: &technique.samplers,
            state: technique.state,
        })?;
        stats.technique_binds += 1;

        for bound in &self.textures {
            if let TextureRef::Target(target) = bound.texture {
                targets.mark_bound(target);
                self.input_slots.insert(bound.slot);
            }
        }
        self.current = Some((handle, self.textures.clone()));
        Ok(())
    }

    /// Unbinds every slot that received a render target during this pass.
    pub fn finish_pass(&mut self, backend: &mut dyn RenderBackend, targets: &mut RenderTargets) {
        if !self.input_slots.is_empty() {
            let slots: Vec<u32> = self.input_slots.iter().copied().collect();
            backend.unbind_inputs(&slots);
        }
        targets.unbind_all();
        self.input_slots.clear();
        self.current = None;
    }
}

fn resolve_input(
    ctx: &PassContext<'_>,
    source: ResolvedSource,
    targets: &RenderTargets,
) -> RenderResult<TextureRef> {
    let target = match source {
        ResolvedSource::Texture(texture) => return Ok(TextureRef::Asset(texture)),
        ResolvedSource::ShadowMap(i) => targets
            .shadow_map(i)
            .ok_or_else(|| RenderError::InvalidState(format!("shadow map {i} does not exist")))?
            .id(),
        ResolvedSource::Portal(i) => targets
            .portal(i)
            .ok_or_else(|| RenderError::InvalidState(format!("portal {i} does not exist")))?
            .color
            .id(),
    };

    if ctx.writes(target) {
        log::trace!("{:?} samples its own target, substituting fallback", ctx.stage);
        return Ok(TextureRef::Fallback);
    }
    if ctx.stage == FrameStage::MainPass && !ctx.ledger.was_written(target) {
        return Err(RenderError::PassOrder(format!(
            "main pass samples {source:?} before it was rendered this frame"
        )));
    }
    Ok(TextureRef::Target(target))
}
