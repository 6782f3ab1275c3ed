// app.rs
use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::error::{RenderError, RenderResult};
use crate::renderer::backend::gpu::WgpuBackend;
use crate::renderer::backend::RenderBackend;
use crate::renderer::{FrameOrchestrator, FrameStats, RenderTargets, TargetConfig};
use crate::scene::{InputState, Scene, SceneAssets, TechniqueId};
use crate::settings::RenderSettings;
use crate::time::FrameTimer;

const TITLE: &str = "wgpu portals";
pub const VSYNC_TOGGLE_KEY: KeyCode = KeyCode::KeyP;

/// Scene plus the orchestrator that draws it, independent of the backend.
#[derive(Debug)]
pub struct DemoSession {
    scene: Scene,
    orchestrator: FrameOrchestrator,
}

impl DemoSession {
    /// Loads every asset and creates all render targets. Fails on the first
    /// missing asset or target.
    pub fn new(backend: &mut dyn RenderBackend, settings: &RenderSettings) -> RenderResult<Self> {
        let assets = SceneAssets::load(backend)?;
        let portal = (settings.portal_size.width, settings.portal_size.height);
        let config = TargetConfig {
            shadow_map_size: settings.shadow_map_size,
            shadow_maps: assets.techniques.shadow_maps_required(),
            portal_sizes: vec![portal; assets.techniques.portals_required()],
        };
        let targets = RenderTargets::create(backend, &config)?;

        let scene = match Scene::new(&assets, settings) {
            Ok(scene) => scene,
            Err(err) => {
                targets.release_all(backend);
                return Err(err);
            }
        };
        let orchestrator = FrameOrchestrator::new(
            backend,
            targets,
            assets.techniques,
            TechniqueId::DepthOnly.handle(),
            settings.background_color,
        )?;

        log::info!(
            "Scene ready on {}: {} lights, {} shadow casters, {} portals",
            backend.name(),
            scene.lights().len(),
            scene.lights().shadow_caster_count(),
            scene.portal_cameras().len()
        );
        Ok(Self {
            scene,
            orchestrator,
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn orchestrator(&self) -> &FrameOrchestrator {
        &self.orchestrator
    }

    pub fn update(&mut self, dt: f32, input: &InputState) {
        self.scene.update(dt, input);
    }

    pub fn render(&mut self, backend: &mut dyn RenderBackend) -> RenderResult<FrameStats> {
        self.orchestrator.render_frame(backend, &self.scene)
    }

    pub fn resize(
        &mut self,
        backend: &mut dyn RenderBackend,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        backend.resize(width, height);
        self.orchestrator.resize(backend, width, height)
    }

    pub fn shutdown(self, backend: &mut dyn RenderBackend) {
        self.orchestrator.shutdown(backend);
    }
}

struct Running {
    window: Arc<Window>,
    backend: WgpuBackend,
    session: DemoSession,
}

pub struct App {
    settings: RenderSettings,
    running: Option<Running>,
    input: InputState,
    timer: FrameTimer,
    vsync: bool,
    error: Option<RenderError>,
}

impl App {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            vsync: settings.vsync(),
            settings,
            running: None,
            input: InputState::new(),
            timer: FrameTimer::new(),
            error: None,
        }
    }

    /// The error that stopped the event loop, if any.
    pub fn take_error(&mut self) -> Option<RenderError> {
        self.error.take()
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> RenderResult<Running> {
        let size = self.settings.resolution;
        let attributes = Window::default_attributes()
            .with_title(TITLE)
            .with_inner_size(PhysicalSize::new(size.width, size.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| RenderError::ResourceCreationFailed(format!("window: {err}")))?,
        );

        let mut backend = WgpuBackend::new(Arc::clone(&window), &self.settings)?;
        let session = DemoSession::new(&mut backend, &self.settings)?;
        Ok(Running {
            window,
            backend,
            session,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: RenderError) {
        log::error!("Fatal: {}", err);
        self.error = Some(err);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(running) = self.running.as_mut() else {
            return;
        };

        let dt = self.timer.tick();
        if self.input.key_hit(VSYNC_TOGGLE_KEY) {
            self.vsync = !self.vsync;
            log::info!("Vsync {}", if self.vsync { "on" } else { "off" });
            running.backend.set_vsync(self.vsync);
        }
        running.session.update(dt, &self.input);
        self.input.end_frame();

        match running.session.render(&mut running.backend) {
            Ok(_) => {
                if let Some(sample) = self.timer.record(dt) {
                    running.window.set_title(&format!(
                        "{TITLE} - {:.2} ms ({:.0} fps)",
                        sample.frame_time_ms, sample.fps
                    ));
                }
            }
            Err(err) if err.is_surface_recoverable() => {
                log::warn!("Surface needs reconfiguring: {}", err);
                let size = running.window.inner_size();
                if let Err(err) =
                    running
                        .session
                        .resize(&mut running.backend, size.width, size.height)
                {
                    self.fail(event_loop, err);
                    return;
                }
            }
            Err(err @ RenderError::DeviceLost)
            | Err(err @ RenderError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                self.fail(event_loop, err);
                return;
            }
            Err(err) => log::warn!("Frame skipped: {}", err),
        }

        running.window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => {
                running.window.request_redraw();
                self.running = Some(running);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        if id != running.window.id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if size.width == 0 || size.height == 0 {
                    return;
                }
                if let Err(err) =
                    running
                        .session
                        .resize(&mut running.backend, size.width, size.height)
                {
                    self.fail(event_loop, err);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => match (code, state) {
                (KeyCode::Escape, ElementState::Pressed) => event_loop.exit(),
                (_, ElementState::Pressed) if !repeat => self.input.press(code),
                (_, ElementState::Released) => self.input.release(code),
                _ => {}
            },
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(Running {
            mut backend,
            session,
            ..
        }) = self.running.take()
        {
            session.shutdown(&mut backend);
        }
    }
}
