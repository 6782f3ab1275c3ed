use glam::Vec4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    Opaque,
    /// dst + src
    Additive,
    /// dst * src
    Multiplicative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthMode {
    #[default]
    ReadWrite,
    /// Depth tested but never written.
    ReadOnly,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    Back,
    Front,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    /// Linear filtering, 16x anisotropy, wrapping.
    Anisotropic,
    /// Nearest filtering, clamped. Used for lookup ramps.
    Point,
    /// Depth comparison sampler for shadow maps.
    ShadowCompare,
}

/// Fixed-function state selected by a technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PipelineState {
    pub blend: BlendMode,
    pub depth: DepthMode,
    pub cull: CullMode,
}

impl PipelineState {
    pub const OPAQUE: Self = Self {
        blend: BlendMode::Opaque,
        depth: DepthMode::ReadWrite,
        cull: CullMode::Back,
    };

    /// Inflated outline hull: only back faces are drawn.
    pub const OUTLINE: Self = Self {
        cull: CullMode::Front,
        ..Self::OPAQUE
    };

    pub const ADDITIVE: Self = Self {
        blend: BlendMode::Additive,
        depth: DepthMode::ReadOnly,
        cull: CullMode::None,
    };

    pub const MULTIPLICATIVE: Self = Self {
        blend: BlendMode::Multiplicative,
        depth: DepthMode::ReadOnly,
        cull: CullMode::None,
    };

    pub fn writes_depth(&self) -> bool {
        self.depth == DepthMode::ReadWrite
    }

    pub fn tests_depth(&self) -> bool {
        self.depth != DepthMode::Disabled
    }

    /// Reference blend equation, matching what the GPU backend configures.
    pub fn blend_color(&self, dst: Vec4, src: Vec4) -> Vec4 {
        match self.blend {
            BlendMode::Opaque => src,
            BlendMode::Additive => dst + src,
            BlendMode::Multiplicative => dst * src,
        }
    }

    /// Writes a fragment into a single-sample colour/depth pair, honouring
    /// depth test, depth write and blending. Returns whether it passed.
    pub fn resolve_fragment(
        &self,
        color: &mut Vec4,
        depth: Option<&mut f32>,
        src_color: Vec4,
        src_depth: f32,
    ) -> bool {
        match depth {
            Some(stored) if self.tests_depth() => {
                if src_depth > *stored {
                    return false;
                }
                if self.writes_depth() {
                    *stored = src_depth;
                }
            }
            _ => {}
        }
        *color = self.blend_color(*color, src_color);
        true
    }
}
