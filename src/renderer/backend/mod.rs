//! Thin contract over the graphics API.
//!
//! The renderer core records frames purely through [`RenderBackend`]. The
//! wgpu implementation draws to a window; [`RecordingBackend`] keeps a
//! command log for headless runs and tests.

mod recording;
pub mod gpu;

use bitflags::bitflags;

use crate::error::RenderResult;
use crate::renderer::constants::{FrameConstants, ModelConstants};
use crate::renderer::state::{PipelineState, SamplerKind};
use crate::renderer::vertex::Vertex;

pub use recording::{Command, RecordingBackend};

macro_rules! handle {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle!(TargetId);
handle!(MeshId);
handle!(TextureId);
handle!(ProgramId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    Rgba8Unorm,
    Depth32Float,
    /// Whatever format the window surface was configured with.
    Surface,
}

impl TargetFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, TargetFormat::Depth32Float)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TargetUsage: u8 {
        const ATTACHMENT = 1 << 0;
        const SAMPLED = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDescriptor<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: TargetFormat,
    pub usage: TargetUsage,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    Depth(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramStage {
    Vertex,
    Pixel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor<'a> {
    pub label: &'a str,
    pub color: Option<TargetId>,
    pub depth: Option<TargetId>,
    pub viewport: Viewport,
}

/// Texture bound to a technique slot once target indices have been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureRef {
    Asset(TextureId),
    Target(TargetId),
    /// 1x1 black stand-in for a target that the current pass is writing.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundTexture {
    pub slot: u32,
    pub texture: TextureRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerBinding {
    pub slot: u32,
    pub kind: SamplerKind,
}

/// Everything a backend needs to make a technique current.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TechniqueBinding<'a> {
    pub label: &'a str,
    pub vertex: ProgramId,
    /// `None` for depth-only techniques.
    pub pixel: Option<ProgramId>,
    pub textures: &'a [BoundTexture],
    pub samplers: &'a [SamplerBinding],
    pub state: PipelineState,
}

/// Upper bounds for one frame, used to size per-pass and per-draw constant storage
/// before recording starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameBudget {
    pub passes: u32,
    pub draws: u32,
}

pub trait RenderBackend {
    fn name(&self) -> &'static str;

    /// Handle of the window back buffer. Always valid.
    fn back_buffer(&self) -> TargetId;
    fn back_buffer_size(&self) -> (u32, u32);
    fn resize(&mut self, width: u32, height: u32);
    fn set_vsync(&mut self, _enabled: bool) {}

    fn create_target(&mut self, desc: &TargetDescriptor<'_>) -> RenderResult<TargetId>;
    fn release_target(&mut self, target: TargetId);

    fn load_program(&mut self, name: &str, stage: ProgramStage) -> RenderResult<ProgramId>;
    fn load_texture(&mut self, name: &str) -> RenderResult<TextureId>;
    fn load_cube_texture(&mut self, faces: &[&str; 6]) -> RenderResult<TextureId>;
    fn create_mesh(&mut self, label: &str, vertices: &[Vertex], indices: &[u32])
        -> RenderResult<MeshId>;
    fn load_mesh(&mut self, path: &str) -> RenderResult<MeshId>;

    fn begin_frame(&mut self, budget: FrameBudget) -> RenderResult<()>;
    /// Clears are applied when `target` is next attached to a pass.
    fn clear_target(&mut self, target: TargetId, value: ClearValue);
    fn begin_pass(&mut self, desc: &PassDescriptor<'_>) -> RenderResult<()>;
    fn write_frame_constants(&mut self, constants: &FrameConstants) -> RenderResult<()>;
    fn bind_technique(&mut self, binding: &TechniqueBinding<'_>) -> RenderResult<()>;
    fn write_model_constants(&mut self, constants: &ModelConstants) -> RenderResult<()>;
    fn draw_mesh(&mut self, mesh: MeshId) -> RenderResult<()>;
    fn end_pass(&mut self) -> RenderResult<()>;
    /// Detaches texture inputs from the given slots.
    fn unbind_inputs(&mut self, slots: &[u32]);
    fn present(&mut self) -> RenderResult<()>;
    /// Drops any partially recorded frame.
    fn abort_frame(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_aspect() {
        assert_eq!(Viewport::full(512, 512).aspect(), 1.0);
        assert!((Viewport::full(1280, 960).aspect() - 4.0 / 3.0).abs() < 1e-6);
        assert_eq!(Viewport::full(0, 0).aspect(), 1.0);
    }
}
