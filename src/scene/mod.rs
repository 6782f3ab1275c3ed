// scene/mod.rs

pub mod animation;
pub mod assets;
pub mod camera;
pub mod effects;
pub mod input;
pub mod light;
pub mod model;
pub mod scene;
pub mod techniques;
pub mod transform;

// Re-export commonly used types
pub use animation::AnimatedModel;
pub use assets::{SceneAssets, SceneMeshes};
pub use camera::Camera;
pub use effects::SceneEffects;
pub use input::InputState;
pub use light::{Light, LightKind, LightSet};
pub use model::{Model, Renderable};
pub use scene::{DrawItem, Drawable, DrawableRef, Scene, SceneModel};
pub use techniques::TechniqueId;
pub use transform::Transform;
