pub mod app;
pub mod error;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod time;

use app::{App, DemoSession};
use error::{AppError, RenderResult};
use renderer::{FrameStats, RecordingBackend};
use scene::InputState;
use settings::RenderSettings;
use winit::event_loop::EventLoop;

/// Fixed step used when rendering without a window.
pub const HEADLESS_FRAME_TIME: f32 = 1.0 / 60.0;

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Opens the window and runs the demo until it is closed.
pub fn run() -> Result<(), AppError> {
    init_logging();

    log::info!("Starting wgpu portals demo");

    let settings = RenderSettings::load();
    let event_loop = EventLoop::new()?;
    let mut app = App::new(settings);

    let result = event_loop.run_app(&mut app);

    if let Err(ref err) = result {
        log::error!("Application error: {}", err);
    }
    if let Some(err) = app.take_error() {
        return Err(err.into());
    }

    log::info!("Application shutdown complete");

    result.map_err(AppError::from)
}

/// Renders `frames` frames through the recording backend and returns the
/// statistics of each one.
pub fn run_headless(settings: &RenderSettings, frames: u32) -> RenderResult<Vec<FrameStats>> {
    let size = settings.resolution;
    let mut backend = RecordingBackend::new(size.width, size.height);
    let mut session = DemoSession::new(&mut backend, settings)?;
    let input = InputState::new();

    let mut stats = Vec::with_capacity(frames as usize);
    for _ in 0..frames {
        session.update(HEADLESS_FRAME_TIME, &input);
        stats.push(session.render(&mut backend)?);
    }

    log::info!("Rendered {} headless frames", backend.presented_frames());
    log::debug!("Passes: {}", backend.pass_labels().join(", "));
    session.shutdown(&mut backend);
    Ok(stats)
}
