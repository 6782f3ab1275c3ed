pub mod backend;
pub mod binder;
pub mod constants;
pub mod mesh_loader;
pub mod orchestrator;
pub mod primitives;
pub mod state;
pub mod targets;
pub mod technique;
pub mod vertex;

pub use backend::{RecordingBackend, RenderBackend};
pub use constants::{FrameConstants, ModelConstants, Viewpoint};
pub use orchestrator::{FrameOrchestrator, FrameStage, FrameStats};
pub use targets::{RenderTargets, TargetConfig};
pub use technique::{Technique, TechniqueLibrary};
pub use vertex::Vertex;
