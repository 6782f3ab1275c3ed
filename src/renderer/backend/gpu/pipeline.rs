use crate::renderer::state::{BlendMode, CullMode, DepthMode, PipelineState, SamplerKind};
use crate::renderer::vertex::Vertex;

/// First binding used for samplers in the technique bind group; texture
/// slot `n` lives at binding `n`, sampler slot `n` at `SAMPLER_BINDING_BASE + n`.
pub(crate) const SAMPLER_BINDING_BASE: u32 = 16;

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TextureKind {
    Color,
    Cube,
    Depth,
}

/// One entry of a technique's texture/sampler bind group layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LayoutEntry {
    Texture { slot: u32, kind: TextureKind },
    Sampler { slot: u32, kind: SamplerKind },
}

impl LayoutEntry {
    pub(crate) fn binding(self) -> u32 {
        match self {
            LayoutEntry::Texture { slot, .. } => slot,
            LayoutEntry::Sampler { slot, .. } => SAMPLER_BINDING_BASE + slot,
        }
    }

    pub(crate) fn to_wgpu(self) -> wgpu::BindGroupLayoutEntry {
        let ty = match self {
            LayoutEntry::Texture { kind, .. } => wgpu::BindingType::Texture {
                sample_type: match kind {
                    TextureKind::Depth => wgpu::TextureSampleType::Depth,
                    _ => wgpu::TextureSampleType::Float { filterable: true },
                },
                view_dimension: match kind {
                    TextureKind::Cube => wgpu::TextureViewDimension::Cube,
                    _ => wgpu::TextureViewDimension::D2,
                },
                multisampled: false,
            },
            LayoutEntry::Sampler { kind, .. } => wgpu::BindingType::Sampler(match kind {
                SamplerKind::ShadowCompare => wgpu::SamplerBindingType::Comparison,
                SamplerKind::Anisotropic | SamplerKind::Point => {
                    wgpu::SamplerBindingType::Filtering
                }
            }),
        };
        wgpu::BindGroupLayoutEntry {
            binding: self.binding(),
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty,
            count: None,
        }
    }
}

pub(crate) fn blend_state(mode: BlendMode) -> Option<wgpu::BlendState> {
    let component = match mode {
        BlendMode::Opaque => return None,
        BlendMode::Additive => wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
        BlendMode::Multiplicative => wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::Dst,
            dst_factor: wgpu::BlendFactor::Zero,
            operation: wgpu::BlendOperation::Add,
        },
    };
    Some(wgpu::BlendState {
        color: component,
        alpha: component,
    })
}

pub(crate) fn cull_face(mode: CullMode) -> Option<wgpu::Face> {
    match mode {
        CullMode::Back => Some(wgpu::Face::Back),
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::None => None,
    }
}

/// Depth state for a pipeline rendering into a depth attachment. Depth-only
/// pipelines get a slope bias to keep shadow maps from self-shadowing.
pub(crate) fn depth_stencil(mode: DepthMode, depth_only: bool) -> wgpu::DepthStencilState {
    let (depth_write_enabled, depth_compare) = match mode {
        DepthMode::ReadWrite => (true, wgpu::CompareFunction::LessEqual),
        DepthMode::ReadOnly => (false, wgpu::CompareFunction::LessEqual),
        DepthMode::Disabled => (false, wgpu::CompareFunction::Always),
    };
    let bias = if depth_only {
        wgpu::DepthBiasState {
            constant: 2,
            slope_scale: 2.0,
            clamp: 0.0,
        }
    } else {
        wgpu::DepthBiasState::default()
    };
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled,
        depth_compare,
        stencil: wgpu::StencilState::default(),
        bias,
    }
}

/// Builder for technique pipelines. Vertex and pixel programs are separate
/// modules, each exposing `vs_main` / `fs_main`.
pub(crate) struct PipelineBuilder<'a> {
    device: &'a wgpu::Device,
    label: Option<&'a str>,
    layout: &'a wgpu::PipelineLayout,
    vertex: &'a wgpu::ShaderModule,
    fragment: Option<&'a wgpu::ShaderModule>,
    color_targets: Vec<Option<wgpu::ColorTargetState>>,
    depth_stencil: Option<wgpu::DepthStencilState>,
    primitive: wgpu::PrimitiveState,
}

impl<'a> PipelineBuilder<'a> {
    pub(crate) fn new(
        device: &'a wgpu::Device,
        layout: &'a wgpu::PipelineLayout,
        vertex: &'a wgpu::ShaderModule,
    ) -> Self {
        Self {
            device,
            label: None,
            layout,
            vertex,
            fragment: None,
            color_targets: Vec::new(),
            depth_stencil: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                // Meshes are wound clockwise in the left-handed world.
                front_face: wgpu::FrontFace::Cw,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
        }
    }

    pub(crate) fn with_label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub(crate) fn with_fragment(mut self, module: &'a wgpu::ShaderModule) -> Self {
        self.fragment = Some(module);
        self
    }

    pub(crate) fn with_color_target(
        mut self,
        format: wgpu::TextureFormat,
        blend: Option<wgpu::BlendState>,
    ) -> Self {
        self.color_targets.push(Some(wgpu::ColorTargetState {
            format,
            blend,
            write_mask: wgpu::ColorWrites::ALL,
        }));
        self
    }

    pub(crate) fn with_depth_stencil(mut self, state: wgpu::DepthStencilState) -> Self {
        self.depth_stencil = Some(state);
        self
    }

    pub(crate) fn with_cull(mut self, face: Option<wgpu::Face>) -> Self {
        self.primitive.cull_mode = face;
        self
    }

    /// Applies every field of a technique's fixed-function state.
    pub(crate) fn with_state(
        self,
        state: PipelineState,
        color: Option<wgpu::TextureFormat>,
        has_depth: bool,
    ) -> Self {
        let depth_only = self.fragment.is_none();
        let mut builder = self.with_cull(cull_face(state.cull));
        if let Some(format) = color {
            builder = builder.with_color_target(format, blend_state(state.blend));
        }
        if has_depth {
            builder = builder.with_depth_stencil(depth_stencil(state.depth, depth_only));
        }
        builder
    }

    pub(crate) fn build(self) -> wgpu::RenderPipeline {
        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: self.label,
            layout: Some(self.layout),
            vertex: wgpu::VertexState {
                module: self.vertex,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: self.fragment.map(|module| wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &self.color_targets,
                compilation_options: Default::default(),
            }),
            primitive: self.primitive,
            depth_stencil: self.depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn additive_adds_source_to_destination() {
        let blend = blend_state(BlendMode::Additive).unwrap();
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(blend.color.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(blend.color.operation, wgpu::BlendOperation::Add);
    }

    #[test]
    fn multiplicative_scales_destination() {
        let blend = blend_state(BlendMode::Multiplicative).unwrap();
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::Dst);
        assert_eq!(blend.color.dst_factor, wgpu::BlendFactor::Zero);
        assert!(blend_state(BlendMode::Opaque).is_none());
    }

    #[test]
    fn blended_states_keep_depth_test_but_skip_writes() {
        let state = depth_stencil(PipelineState::ADDITIVE.depth, false);
        assert!(!state.depth_write_enabled);
        assert_eq!(state.depth_compare, wgpu::CompareFunction::LessEqual);

        let opaque = depth_stencil(PipelineState::OPAQUE.depth, false);
        assert!(opaque.depth_write_enabled);
        assert_eq!(opaque.bias, wgpu::DepthBiasState::default());
    }

    #[test]
    fn depth_only_pipelines_are_biased() {
        let state = depth_stencil(DepthMode::ReadWrite, true);
        assert!(state.bias.slope_scale > 0.0);
    }

    #[test]
    fn outline_culls_front_faces() {
        assert_eq!(cull_face(PipelineState::OUTLINE.cull), Some(wgpu::Face::Front));
        assert_eq!(cull_face(CullMode::None), None);
    }

    #[test]
    fn samplers_bind_after_textures() {
        let texture = LayoutEntry::Texture {
            slot: 2,
            kind: TextureKind::Depth,
        };
        let sampler = LayoutEntry::Sampler {
            slot: 2,
            kind: SamplerKind::ShadowCompare,
        };
        assert_eq!(texture.binding(), 2);
        assert_eq!(sampler.binding(), SAMPLER_BINDING_BASE + 2);
        assert!(matches!(
            sampler.to_wgpu().ty,
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison)
        ));
    }
}
