use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub present_mode: PresentModeSetting,
    #[serde(default = "RenderSettings::default_shadow_map_size")]
    pub shadow_map_size: u32,
    #[serde(default = "Resolution::portal")]
    pub portal_size: Resolution,
    #[serde(default = "RenderSettings::default_asset_dir")]
    pub asset_dir: PathBuf,
    #[serde(default = "RenderSettings::default_background_color")]
    pub background_color: [f32; 4],
    #[serde(default = "RenderSettings::default_spotlight_cone_degrees")]
    pub spotlight_cone_degrees: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            present_mode: PresentModeSetting::default(),
            shadow_map_size: Self::default_shadow_map_size(),
            portal_size: Resolution::portal(),
            asset_dir: Self::default_asset_dir(),
            background_color: Self::default_background_color(),
            spotlight_cone_degrees: Self::default_spotlight_cone_degrees(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    fn validate(mut self) -> Self {
        if self.shadow_map_size == 0 {
            warn!("Shadow map size must be greater than zero. Using default value.");
            self.shadow_map_size = Self::default_shadow_map_size();
        }

        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        if self.portal_size.width == 0 || self.portal_size.height == 0 {
            warn!("Portal size must be greater than zero. Using default portal size.");
            self.portal_size = Resolution::portal();
        }

        if !(self.spotlight_cone_degrees > 0.0 && self.spotlight_cone_degrees < 180.0) {
            warn!(
                "Spotlight cone of {} degrees is out of range. Using default cone.",
                self.spotlight_cone_degrees
            );
            self.spotlight_cone_degrees = Self::default_spotlight_cone_degrees();
        }

        self
    }

    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = self.present_mode.to_wgpu();
        if available.contains(&desired) {
            return desired;
        }

        warn!(
            "Requested present mode {:?} is not supported. Falling back to FIFO.",
            desired
        );

        if available.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            available
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        }
    }

    /// Whether the configured present mode waits for vertical blank.
    pub fn vsync(&self) -> bool {
        matches!(
            self.present_mode,
            PresentModeSetting::Fifo | PresentModeSetting::FifoRelaxed | PresentModeSetting::AutoVsync
        )
    }

    const fn default_shadow_map_size() -> u32 {
        2048
    }

    fn default_asset_dir() -> PathBuf {
        PathBuf::from("assets")
    }

    const fn default_background_color() -> [f32; 4] {
        [0.2, 0.2, 0.3, 1.0]
    }

    const fn default_spotlight_cone_degrees() -> f32 {
        90.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn portal() -> Self {
        Self {
            width: 512,
            height: 512,
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 960,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    #[default]
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

impl PresentModeSetting {
    pub fn to_wgpu(self) -> wgpu::PresentMode {
        match self {
            PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
            PresentModeSetting::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
            PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModeSetting::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModeSetting::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}
