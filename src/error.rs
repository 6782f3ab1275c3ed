use thiserror::Error;

/// Errors raised while creating GPU resources or recording a frame.
///
/// Initialisation errors are fatal: the app never reaches the render loop.
/// Errors during a frame abort that frame.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    #[error("failed to load asset {asset}: {reason}")]
    AssetLoadFailed { asset: String, reason: String },
    #[error("GPU device lost")]
    DeviceLost,
    #[error("resource hazard: {0}")]
    ResourceHazard(String),
    #[error("pass ordering violated: {0}")]
    PassOrder(String),
    #[error("invalid render state: {0}")]
    InvalidState(String),
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

impl RenderError {
    pub fn asset(asset: impl Into<String>, reason: impl ToString) -> Self {
        Self::AssetLoadFailed {
            asset: asset.into(),
            reason: reason.to_string(),
        }
    }

    /// Surface errors that are fixed by reconfiguring the swapchain.
    pub fn is_surface_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)
        )
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Top-level error returned by [`crate::run`].
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RenderError::ResourceCreationFailed("portal texture".to_string());
        assert_eq!(err.to_string(), "resource creation failed: portal texture");

        let err = RenderError::asset("Brick1.jpg", "file not found");
        assert_eq!(
            err.to_string(),
            "failed to load asset Brick1.jpg: file not found"
        );
    }

    #[test]
    fn only_lost_and_outdated_surfaces_are_recoverable() {
        assert!(RenderError::from(wgpu::SurfaceError::Lost).is_surface_recoverable());
        assert!(RenderError::from(wgpu::SurfaceError::Outdated).is_surface_recoverable());
        assert!(!RenderError::from(wgpu::SurfaceError::OutOfMemory).is_surface_recoverable());
        assert!(!RenderError::DeviceLost.is_surface_recoverable());
    }
}
