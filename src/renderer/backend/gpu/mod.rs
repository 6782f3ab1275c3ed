//! wgpu implementation of [`RenderBackend`].
//!
//! Bind group 0 holds the per-pass frame constants and group 1 the per-draw
//! model constants, both as dynamic offsets into uniform rings. Group 2 holds
//! a technique's textures and samplers.

mod context;
mod pipeline;
mod resources;
mod uniforms;

use std::collections::HashMap;
use std::mem;
use std::path::PathBuf;
use std::sync::Arc;

use winit::window::Window;

use self::context::GpuContext;
use self::pipeline::{LayoutEntry, PipelineBuilder, TextureKind, DEPTH_FORMAT};
use self::resources::{Fallbacks, GpuMesh, GpuTarget, GpuTexture, Samplers};
use self::uniforms::UniformRing;
use super::{
    BoundTexture, ClearValue, FrameBudget, MeshId, PassDescriptor, ProgramId, ProgramStage,
    RenderBackend, TargetDescriptor, TargetFormat, TargetId, TargetUsage, TechniqueBinding,
    TextureId, TextureRef,
};
use crate::error::{RenderError, RenderResult};
use crate::renderer::constants::{FrameConstants, ModelConstants};
use crate::renderer::mesh_loader::load_gltf_mesh;
use crate::renderer::state::{PipelineState, SamplerKind};
use crate::renderer::vertex::Vertex;
use crate::settings::RenderSettings;

const BACK_BUFFER: TargetId = TargetId(0);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    vertex: ProgramId,
    pixel: Option<ProgramId>,
    state: PipelineState,
    color: Option<wgpu::TextureFormat>,
    has_depth: bool,
    layout: Vec<LayoutEntry>,
}

struct TechniqueLayout {
    textures: wgpu::BindGroupLayout,
    pipeline: wgpu::PipelineLayout,
}

struct FrameInFlight {
    encoder: wgpu::CommandEncoder,
    surface: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

struct ActivePass {
    pass: wgpu::RenderPass<'static>,
    color: Option<TargetId>,
    depth: Option<TargetId>,
    color_format: Option<wgpu::TextureFormat>,
    technique_bound: bool,
    frame_bound: bool,
    model_bound: bool,
}

pub struct WgpuBackend {
    context: GpuContext,
    asset_dir: PathBuf,
    frame_layout: wgpu::BindGroupLayout,
    model_layout: wgpu::BindGroupLayout,
    frame_ring: UniformRing,
    model_ring: UniformRing,
    programs: Vec<wgpu::ShaderModule>,
    textures: Vec<GpuTexture>,
    meshes: Vec<GpuMesh>,
    targets: Vec<Option<GpuTarget>>,
    fallbacks: Fallbacks,
    samplers: Samplers,
    layouts: HashMap<Vec<LayoutEntry>, TechniqueLayout>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    pending_clears: HashMap<TargetId, ClearValue>,
    frame: Option<FrameInFlight>,
    pass: Option<ActivePass>,
}

impl WgpuBackend {
    pub fn new(window: Arc<Window>, settings: &RenderSettings) -> RenderResult<Self> {
        let context = pollster::block_on(GpuContext::new(window, settings))?;
        let device = &context.device;

        let frame_size = mem::size_of::<FrameConstants>() as u64;
        let model_size = mem::size_of::<ModelConstants>() as u64;
        let frame_layout = UniformRing::layout(device, "frame constants", frame_size);
        let model_layout = UniformRing::layout(device, "model constants", model_size);
        let frame_ring = UniformRing::new(device, &frame_layout, "frame constants", frame_size, 8);
        let model_ring = UniformRing::new(device, &model_layout, "model constants", model_size, 256);

        let fallbacks = Fallbacks::new(device, &context.queue);
        let samplers = Samplers::new(device);

        Ok(Self {
            asset_dir: settings.asset_dir.clone(),
            frame_layout,
            model_layout,
            frame_ring,
            model_ring,
            programs: Vec::new(),
            textures: Vec::new(),
            meshes: Vec::new(),
            // Slot 0 is the back buffer, whose view changes every frame.
            targets: vec![None],
            fallbacks,
            samplers,
            layouts: HashMap::new(),
            pipelines: HashMap::new(),
            pending_clears: HashMap::new(),
            frame: None,
            pass: None,
            context,
        })
    }

    fn target(&self, id: TargetId) -> RenderResult<&GpuTarget> {
        self.targets
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| RenderError::InvalidState(format!("target {:?} does not exist", id)))
    }

    fn pass_mut(&mut self, call: &str) -> RenderResult<&mut ActivePass> {
        self.pass
            .as_mut()
            .ok_or_else(|| RenderError::InvalidState(format!("{call} outside a pass")))
    }

    /// Pending clears turn into the attachment's load op.
    fn load_op<T>(
        &mut self,
        target: TargetId,
        clear: impl FnOnce(ClearValue) -> Option<T>,
    ) -> wgpu::LoadOp<T> {
        match self.pending_clears.remove(&target).and_then(clear) {
            Some(value) => wgpu::LoadOp::Clear(value),
            None => wgpu::LoadOp::Load,
        }
    }

    fn texture_kind(
        &self,
        bound: &BoundTexture,
        binding: &TechniqueBinding<'_>,
    ) -> RenderResult<TextureKind> {
        match bound.texture {
            TextureRef::Asset(id) => self
                .textures
                .get(id.index())
                .map(|texture| texture.kind)
                .ok_or_else(|| RenderError::InvalidState(format!("texture {:?} does not exist", id))),
            TextureRef::Target(id) => {
                if id == BACK_BUFFER {
                    return Err(RenderError::ResourceHazard(
                        "the back buffer cannot be sampled".into(),
                    ));
                }
                let target = self.target(id)?;
                if !target.sampled {
                    return Err(RenderError::ResourceHazard(format!(
                        "target {:?} was not created for sampling",
                        id
                    )));
                }
                Ok(target.kind())
            }
            TextureRef::Fallback => {
                let compare = binding.samplers.iter().any(|s| {
                    s.slot == bound.slot && s.kind == SamplerKind::ShadowCompare
                });
                Ok(if compare {
                    TextureKind::Depth
                } else {
                    TextureKind::Color
                })
            }
        }
    }

    fn texture_view(
        &self,
        texture: TextureRef,
        kind: TextureKind,
    ) -> RenderResult<&wgpu::TextureView> {
        Ok(match texture {
            TextureRef::Asset(id) => &self.textures[id.index()].view,
            TextureRef::Target(id) => &self.target(id)?.view,
            TextureRef::Fallback if kind == TextureKind::Depth => &self.fallbacks.depth.view,
            TextureRef::Fallback => &self.fallbacks.color.view,
        })
    }

    fn layout_for(&mut self, entries: &[LayoutEntry]) -> &TechniqueLayout {
        let device = &self.context.device;
        let frame_layout = &self.frame_layout;
        let model_layout = &self.model_layout;
        self.layouts.entry(entries.to_vec()).or_insert_with(|| {
            let wgpu_entries: Vec<_> = entries.iter().map(|e| e.to_wgpu()).collect();
            let textures = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("technique textures"),
                entries: &wgpu_entries,
            });
            let pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("technique"),
                bind_group_layouts: &[frame_layout, model_layout, &textures],
                push_constant_ranges: &[],
            });
            TechniqueLayout { textures, pipeline }
        })
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey, label: &str) -> RenderResult<()> {
        if self.pipelines.contains_key(key) {
            return Ok(());
        }
        self.layout_for(&key.layout);
        let layout = &self.layouts[&key.layout].pipeline;
        let vertex = &self.programs[key.vertex.index()];
        let fragment = key.pixel.map(|id| &self.programs[id.index()]);

        let pipeline = self.context.scoped(
            |device| {
                let mut builder = PipelineBuilder::new(device, layout, vertex).with_label(label);
                if let Some(module) = fragment {
                    builder = builder.with_fragment(module);
                }
                builder
                    .with_state(key.state, key.color, key.has_depth)
                    .build()
            },
            |err| RenderError::ResourceCreationFailed(format!("pipeline {label}: {err}")),
        )?;
        log::debug!("Created pipeline for {} ({} cached)", label, self.pipelines.len() + 1);
        self.pipelines.insert(key.clone(), pipeline);
        Ok(())
    }
}

/// Every program sees the shared constant blocks and lighting helpers.
fn program_source(body: &str) -> String {
    format!(
        "{}\n{}\n{}",
        include_str!("../../../shader/constants.wgsl"),
        include_str!("../../../shader/lighting.wgsl"),
        body
    )
}

fn attachment_view<'a>(
    targets: &'a [Option<GpuTarget>],
    surface: &'a wgpu::TextureView,
    id: TargetId,
) -> RenderResult<&'a wgpu::TextureView> {
    if id == BACK_BUFFER {
        return Ok(surface);
    }
    targets
        .get(id.index())
        .and_then(Option::as_ref)
        .map(|target| &target.view)
        .ok_or_else(|| RenderError::InvalidState(format!("target {:?} does not exist", id)))
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn back_buffer(&self) -> TargetId {
        BACK_BUFFER
    }

    fn back_buffer_size(&self) -> (u32, u32) {
        (self.context.config.width, self.context.config.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
    }

    fn set_vsync(&mut self, enabled: bool) {
        self.context.set_vsync(enabled);
    }

    fn create_target(&mut self, desc: &TargetDescriptor<'_>) -> RenderResult<TargetId> {
        let format = match desc.format {
            TargetFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TargetFormat::Depth32Float => DEPTH_FORMAT,
            TargetFormat::Surface => self.context.config.format,
        };
        let sampled = desc.usage.contains(TargetUsage::SAMPLED);
        let target = self.context.scoped(
            |device| GpuTarget::new(device, desc.label, desc.width, desc.height, format, sampled),
            |err| RenderError::ResourceCreationFailed(format!("target {}: {err}", desc.label)),
        )?;

        let id = TargetId(self.targets.len() as u32);
        self.targets.push(Some(target));
        log::debug!("Created target {} {:?} ({}x{})", desc.label, id, desc.width, desc.height);
        Ok(id)
    }

    fn release_target(&mut self, target: TargetId) {
        if target == BACK_BUFFER {
            return;
        }
        if let Some(slot) = self.targets.get_mut(target.index()) {
            *slot = None;
        }
        self.pending_clears.remove(&target);
    }

    fn load_program(&mut self, name: &str, stage: ProgramStage) -> RenderResult<ProgramId> {
        let path = self.asset_dir.join("shaders").join(format!("{name}.wgsl"));
        let body = std::fs::read_to_string(&path)
            .map_err(|err| RenderError::asset(path.display().to_string(), err))?;
        let source = program_source(&body);

        let module = self.context.scoped(
            |device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(name),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                })
            },
            |err| RenderError::asset(name, err),
        )?;

        log::info!("Loaded {:?} program {}", stage, name);
        self.programs.push(module);
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn load_texture(&mut self, name: &str) -> RenderResult<TextureId> {
        let path = self.asset_dir.join("textures").join(name);
        let image = resources::read_image(&path)?;
        let queue = &self.context.queue;
        let texture = self.context.scoped(
            |device| resources::texture_from_image(device, queue, name, image),
            |err| RenderError::asset(name, err),
        )?;

        log::info!("Loaded texture {}", name);
        self.textures.push(texture);
        Ok(TextureId(self.textures.len() as u32 - 1))
    }

    fn load_cube_texture(&mut self, faces: &[&str; 6]) -> RenderResult<TextureId> {
        let images = faces
            .iter()
            .map(|face| resources::read_image(&self.asset_dir.join("textures").join(face)))
            .collect::<RenderResult<Vec<_>>>()?;
        let label = faces[0];
        let queue = &self.context.queue;
        let texture = self
            .context
            .scoped(
                |device| resources::cube_from_images(device, queue, label, images),
                |err| RenderError::asset(label, err),
            )??;

        log::info!("Loaded cube map starting at {}", label);
        self.textures.push(texture);
        Ok(TextureId(self.textures.len() as u32 - 1))
    }

    fn create_mesh(
        &mut self,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> RenderResult<MeshId> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(RenderError::ResourceCreationFailed(format!("mesh {label} is empty")));
        }
        let mesh = self.context.scoped(
            |device| GpuMesh::new(device, label, vertices, indices),
            |err| RenderError::ResourceCreationFailed(format!("mesh {label}: {err}")),
        )?;
        self.meshes.push(mesh);
        Ok(MeshId(self.meshes.len() as u32 - 1))
    }

    fn load_mesh(&mut self, path: &str) -> RenderResult<MeshId> {
        let data = load_gltf_mesh(&self.asset_dir.join(path))?;
        log::info!("Loaded mesh {} ({} triangles)", path, data.indices.len() / 3);
        self.create_mesh(path, &data.vertices, &data.indices)
    }

    fn begin_frame(&mut self, budget: FrameBudget) -> RenderResult<()> {
        if self.context.is_lost() {
            return Err(RenderError::DeviceLost);
        }
        if self.frame.is_some() {
            return Err(RenderError::InvalidState("frame already in progress".into()));
        }

        let device = &self.context.device;
        self.frame_ring.begin_frame(device, &self.frame_layout, budget.passes);
        self.model_ring.begin_frame(device, &self.model_layout, budget.draws);

        let surface = self.context.surface.get_current_texture()?;
        let view = surface.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame"),
        });
        self.frame = Some(FrameInFlight {
            encoder,
            surface,
            view,
        });
        Ok(())
    }

    fn clear_target(&mut self, target: TargetId, value: ClearValue) {
        self.pending_clears.insert(target, value);
    }

    fn begin_pass(&mut self, desc: &PassDescriptor<'_>) -> RenderResult<()> {
        if self.pass.is_some() {
            return Err(RenderError::InvalidState(format!(
                "pass {} started inside another pass",
                desc.label
            )));
        }

        let color_load = desc.color.map(|id| {
            self.load_op(id, |value| match value {
                ClearValue::Color([r, g, b, a]) => Some(wgpu::Color {
                    r: r as f64,
                    g: g as f64,
                    b: b as f64,
                    a: a as f64,
                }),
                ClearValue::Depth(_) => None,
            })
        });
        let depth_load = desc.depth.map(|id| {
            self.load_op(id, |value| match value {
                ClearValue::Depth(depth) => Some(depth),
                ClearValue::Color(_) => None,
            })
        });

        let color_format = match desc.color {
            Some(BACK_BUFFER) => Some(self.context.config.format),
            Some(id) => Some(self.target(id)?.format),
            None => None,
        };
        if let Some(id) = desc.depth {
            if self.target(id)?.format != DEPTH_FORMAT {
                return Err(RenderError::InvalidState(format!(
                    "pass {} attaches a colour target as depth",
                    desc.label
                )));
            }
        }

        let frame = self
            .frame
            .as_mut()
            .ok_or_else(|| RenderError::InvalidState("begin_pass outside a frame".into()))?;
        let FrameInFlight { encoder, view, .. } = frame;
        let surface_view: &wgpu::TextureView = view;
        let color_view = desc
            .color
            .map(|id| attachment_view(&self.targets, surface_view, id))
            .transpose()?;
        let depth_view = desc
            .depth
            .map(|id| attachment_view(&self.targets, surface_view, id))
            .transpose()?;

        let color_attachments: Vec<_> = color_view
            .zip(color_load)
            .map(|(view, load)| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .into_iter()
            .collect();
        let depth_attachment = depth_view.zip(depth_load).map(|(view, load)| {
            wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }
        });

        let mut pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(desc.label),
                color_attachments: &color_attachments,
                depth_stencil_attachment: depth_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            })
            .forget_lifetime();

        let vp = desc.viewport;
        pass.set_viewport(vp.x, vp.y, vp.width, vp.height, vp.min_depth, vp.max_depth);

        self.pass = Some(ActivePass {
            pass,
            color: desc.color,
            depth: desc.depth,
            color_format,
            technique_bound: false,
            frame_bound: false,
            model_bound: false,
        });
        Ok(())
    }

    fn write_frame_constants(&mut self, constants: &FrameConstants) -> RenderResult<()> {
        self.pass_mut("write_frame_constants")?;
        let offset = self.frame_ring.push(bytemuck::bytes_of(constants))?;
        if let Some(active) = self.pass.as_mut() {
            active.pass.set_bind_group(0, &self.frame_ring.bind_group, &[offset]);
            active.frame_bound = true;
        }
        Ok(())
    }

    fn bind_technique(&mut self, binding: &TechniqueBinding<'_>) -> RenderResult<()> {
        let (color, depth, color_format) = {
            let active = self.pass_mut("bind_technique")?;
            (active.color, active.depth, active.color_format)
        };

        let mut entries = Vec::with_capacity(binding.textures.len() + binding.samplers.len());
        for bound in binding.textures {
            if let TextureRef::Target(id) = bound.texture {
                if Some(id) == color || Some(id) == depth {
                    return Err(RenderError::ResourceHazard(format!(
                        "{} samples target {:?} while it is attached",
                        binding.label, id
                    )));
                }
            }
            entries.push(LayoutEntry::Texture {
                slot: bound.slot,
                kind: self.texture_kind(bound, binding)?,
            });
        }
        entries.extend(
            binding
                .samplers
                .iter()
                .map(|s| LayoutEntry::Sampler {
                    slot: s.slot,
                    kind: s.kind,
                }),
        );
        entries.sort_by_key(|e| e.binding());

        let key = PipelineKey {
            vertex: binding.vertex,
            pixel: binding.pixel,
            state: binding.state,
            color: color_format,
            has_depth: depth.is_some(),
            layout: entries,
        };
        self.ensure_pipeline(&key, binding.label)?;

        let mut group_entries = Vec::with_capacity(key.layout.len());
        for entry in &key.layout {
            let resource = match *entry {
                LayoutEntry::Texture { slot, kind } => {
                    let texture = binding
                        .textures
                        .iter()
                        .find(|t| t.slot == slot)
                        .map(|t| t.texture)
                        .ok_or_else(|| {
                            RenderError::InvalidState(format!("texture slot {slot} vanished"))
                        })?;
                    wgpu::BindingResource::TextureView(self.texture_view(texture, kind)?)
                }
                LayoutEntry::Sampler { kind, .. } => {
                    wgpu::BindingResource::Sampler(self.samplers.get(kind))
                }
            };
            group_entries.push(wgpu::BindGroupEntry {
                binding: entry.binding(),
                resource,
            });
        }
        let bind_group = self.context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(binding.label),
            layout: &self.layouts[&key.layout].textures,
            entries: &group_entries,
        });

        let pipeline = &self.pipelines[&key];
        if let Some(active) = self.pass.as_mut() {
            active.pass.set_pipeline(pipeline);
            active.pass.set_bind_group(2, &bind_group, &[]);
            active.technique_bound = true;
        }
        Ok(())
    }

    fn write_model_constants(&mut self, constants: &ModelConstants) -> RenderResult<()> {
        self.pass_mut("write_model_constants")?;
        let offset = self.model_ring.push(bytemuck::bytes_of(constants))?;
        if let Some(active) = self.pass.as_mut() {
            active.pass.set_bind_group(1, &self.model_ring.bind_group, &[offset]);
            active.model_bound = true;
        }
        Ok(())
    }

    fn draw_mesh(&mut self, mesh: MeshId) -> RenderResult<()> {
        let Some(gpu_mesh) = self.meshes.get(mesh.index()) else {
            return Err(RenderError::InvalidState(format!("mesh {:?} does not exist", mesh)));
        };
        let active = self
            .pass
            .as_mut()
            .ok_or_else(|| RenderError::InvalidState("draw outside a pass".into()))?;
        if !(active.technique_bound && active.frame_bound && active.model_bound) {
            return Err(RenderError::InvalidState(
                "draw before technique and constants were bound".into(),
            ));
        }

        active.pass.set_vertex_buffer(0, gpu_mesh.vertices.slice(..));
        active
            .pass
            .set_index_buffer(gpu_mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
        active.pass.draw_indexed(0..gpu_mesh.index_count, 0, 0..1);
        Ok(())
    }

    fn end_pass(&mut self) -> RenderResult<()> {
        self.pass
            .take()
            .map(drop)
            .ok_or_else(|| RenderError::InvalidState("end_pass without a pass".into()))
    }

    fn unbind_inputs(&mut self, slots: &[u32]) {
        // Bind groups do not outlive their pass in wgpu; nothing stays bound.
        log::trace!("Unbinding input slots {:?}", slots);
    }

    fn present(&mut self) -> RenderResult<()> {
        if self.pass.is_some() {
            return Err(RenderError::InvalidState("present inside a pass".into()));
        }
        let frame = self
            .frame
            .take()
            .ok_or_else(|| RenderError::InvalidState("present without a frame".into()))?;

        self.frame_ring.flush(&self.context.queue);
        self.model_ring.flush(&self.context.queue);
        self.context.queue.submit(Some(frame.encoder.finish()));
        frame.surface.present();

        if self.context.is_lost() {
            return Err(RenderError::DeviceLost);
        }
        Ok(())
    }

    fn abort_frame(&mut self) {
        self.pass = None;
        if self.frame.take().is_some() {
            log::warn!("Dropped partially recorded frame");
        }
        self.frame_ring.discard();
        self.model_ring.discard();
        self.pending_clears.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_blocks_match_shader_layout() {
        // Offsets as laid out by the uniform rules in shader/constants.wgsl.
        assert_eq!(mem::size_of::<FrameConstants>(), 1088);
        assert_eq!(mem::offset_of!(FrameConstants, lights), 192);
        assert_eq!(mem::offset_of!(FrameConstants, shadow_casters), 512);
        assert_eq!(mem::offset_of!(FrameConstants, ambient_color), 1008);
        assert_eq!(mem::offset_of!(FrameConstants, color_variation), 1072);
        assert_eq!(mem::size_of::<ModelConstants>(), 80);
    }

    #[test]
    fn programs_are_prefixed_with_shared_declarations() {
        let source = program_source("@vertex fn vs_main() {}");
        assert!(source.contains("var<uniform> frame: FrameConstants"));
        assert!(source.contains("fn light_surface("));
        assert!(source.ends_with("@vertex fn vs_main() {}"));
    }
}
