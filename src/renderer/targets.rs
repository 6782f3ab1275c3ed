use std::collections::BTreeSet;

use super::backend::{
    ClearValue, RenderBackend, TargetDescriptor, TargetFormat, TargetId, TargetUsage, Viewport,
};
use crate::error::{RenderError, RenderResult};

/// A render target owned by [`RenderTargets`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    id: TargetId,
    label: String,
    format: TargetFormat,
    width: u32,
    height: u32,
}

impl RenderTarget {
    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    pub fn is_depth(&self) -> bool {
        self.format.is_depth()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::full(self.width, self.height)
    }
}

/// Colour plus depth pair a portal camera renders into.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalTarget {
    pub color: RenderTarget,
    pub depth: RenderTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetConfig {
    pub shadow_map_size: u32,
    pub shadow_maps: usize,
    pub portal_sizes: Vec<(u32, u32)>,
}

/// Owns every offscreen target plus the main depth buffer, and tracks which
/// targets are currently bound as shader inputs.
#[derive(Debug)]
pub struct RenderTargets {
    back_buffer: RenderTarget,
    main_depth: RenderTarget,
    shadow_maps: Vec<RenderTarget>,
    portals: Vec<PortalTarget>,
    bound_inputs: BTreeSet<TargetId>,
}

impl RenderTargets {
    /// Creates the main depth buffer, one depth target per shadow map and a
    /// colour/depth pair per portal. Partially created targets are released
    /// if any creation fails.
    pub fn create(backend: &mut dyn RenderBackend, config: &TargetConfig) -> RenderResult<Self> {
        let mut created: Vec<RenderTarget> = Vec::new();
        match Self::create_all(backend, config, &mut created) {
            Ok(targets) => Ok(targets),
            Err(err) => {
                for target in created {
                    backend.release_target(target.id);
                }
                Err(err)
            }
        }
    }

    fn create_all(
        backend: &mut dyn RenderBackend,
        config: &TargetConfig,
        created: &mut Vec<RenderTarget>,
    ) -> RenderResult<Self> {
        let (width, height) = backend.back_buffer_size();
        let back_buffer = RenderTarget {
            id: backend.back_buffer(),
            label: "back buffer".to_string(),
            format: TargetFormat::Surface,
            width,
            height,
        };

        let main_depth = Self::create_depth_target(backend, "main depth", width, height, false)?;
        created.push(main_depth.clone());

        let mut shadow_maps = Vec::with_capacity(config.shadow_maps);
        for i in 0..config.shadow_maps {
            let label = format!("shadow map {i}");
            let size = config.shadow_map_size;
            let target = Self::create_depth_target(backend, &label, size, size, true)?;
            created.push(target.clone());
            shadow_maps.push(target);
        }

        let mut portals = Vec::with_capacity(config.portal_sizes.len());
        for (i, &(w, h)) in config.portal_sizes.iter().enumerate() {
            let color = Self::create_color_target(backend, &format!("portal {i}"), w, h)?;
            created.push(color.clone());
            let depth =
                Self::create_depth_target(backend, &format!("portal {i} depth"), w, h, false)?;
            created.push(depth.clone());
            portals.push(PortalTarget { color, depth });
        }

        log::info!(
            "Created render targets: {} shadow maps at {}px, {} portals",
            shadow_maps.len(),
            config.shadow_map_size,
            portals.len()
        );

        Ok(Self {
            back_buffer,
            main_depth,
            shadow_maps,
            portals,
            bound_inputs: BTreeSet::new(),
        })
    }

    /// Sampleable colour target.
    pub fn create_color_target(
        backend: &mut dyn RenderBackend,
        label: &str,
        width: u32,
        height: u32,
    ) -> RenderResult<RenderTarget> {
        Self::create_target(
            backend,
            label,
            width,
            height,
            TargetFormat::Rgba8Unorm,
            TargetUsage::ATTACHMENT | TargetUsage::SAMPLED,
        )
    }

    /// Depth target, optionally sampleable (shadow maps).
    pub fn create_depth_target(
        backend: &mut dyn RenderBackend,
        label: &str,
        width: u32,
        height: u32,
        sampled: bool,
    ) -> RenderResult<RenderTarget> {
        let mut usage = TargetUsage::ATTACHMENT;
        if sampled {
            usage |= TargetUsage::SAMPLED;
        }
        Self::create_target(backend, label, width, height, TargetFormat::Depth32Float, usage)
    }

    fn create_target(
        backend: &mut dyn RenderBackend,
        label: &str,
        width: u32,
        height: u32,
        format: TargetFormat,
        usage: TargetUsage,
    ) -> RenderResult<RenderTarget> {
        if width == 0 || height == 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "{label} has zero size ({width}x{height})"
            )));
        }
        let id = backend.create_target(&TargetDescriptor {
            label,
            width,
            height,
            format,
            usage,
        })?;
        Ok(RenderTarget {
            id,
            label: label.to_string(),
            format,
            width,
            height,
        })
    }

    pub fn back_buffer(&self) -> &RenderTarget {
        &self.back_buffer
    }

    pub fn main_depth(&self) -> &RenderTarget {
        &self.main_depth
    }

    pub fn shadow_map(&self, index: usize) -> Option<&RenderTarget> {
        self.shadow_maps.get(index)
    }

    pub fn shadow_map_count(&self) -> usize {
        self.shadow_maps.len()
    }

    pub fn portal(&self, index: usize) -> Option<&PortalTarget> {
        self.portals.get(index)
    }

    pub fn portal_count(&self) -> usize {
        self.portals.len()
    }

    /// Viewport covering the whole of `target`.
    pub fn viewport_for(&self, target: TargetId) -> Option<Viewport> {
        self.find(target).map(RenderTarget::viewport)
    }

    fn find(&self, target: TargetId) -> Option<&RenderTarget> {
        std::iter::once(&self.back_buffer)
            .chain(std::iter::once(&self.main_depth))
            .chain(self.shadow_maps.iter())
            .chain(self.portals.iter().flat_map(|p| [&p.color, &p.depth]))
            .find(|t| t.id == target)
    }

    /// Schedules a clear. Colour targets take `color`, depth targets take `depth`.
    pub fn clear(
        &self,
        backend: &mut dyn RenderBackend,
        target: TargetId,
        color: Option<[f32; 4]>,
        depth: Option<f32>,
    ) -> RenderResult<()> {
        let info = self
            .find(target)
            .ok_or_else(|| RenderError::InvalidState(format!("clear of unknown target {target:?}")))?;
        self.ensure_writable(target)?;
        let value = match (info.is_depth(), color, depth) {
            (true, None, Some(d)) => ClearValue::Depth(d),
            (false, Some(c), None) => ClearValue::Color(c),
            _ => {
                return Err(RenderError::InvalidState(format!(
                    "clear values do not match the format of {}",
                    info.label
                )))
            }
        };
        backend.clear_target(target, value);
        Ok(())
    }

    /// Fails if `target` is still bound as a shader input.
    pub fn ensure_writable(&self, target: TargetId) -> RenderResult<()> {
        if self.bound_inputs.contains(&target) {
            let label = self.find(target).map_or("unknown", |t| t.label.as_str());
            return Err(RenderError::ResourceHazard(format!(
                "{label} is bound as an input and cannot be written"
            )));
        }
        Ok(())
    }

    pub fn mark_bound(&mut self, target: TargetId) {
        self.bound_inputs.insert(target);
    }

    pub fn is_bound(&self, target: TargetId) -> bool {
        self.bound_inputs.contains(&target)
    }

    pub fn unbind_all(&mut self) {
        self.bound_inputs.clear();
    }

    /// Recreates the main depth buffer to follow a window resize.
    pub fn resize(
        &mut self,
        backend: &mut dyn RenderBackend,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        if width == 0 || height == 0 || (width, height) == self.main_depth.size() {
            return Ok(());
        }
        let depth = Self::create_depth_target(backend, "main depth", width, height, false)?;
        backend.release_target(self.main_depth.id);
        self.main_depth = depth;
        self.back_buffer.width = width;
        self.back_buffer.height = height;
        Ok(())
    }

    pub fn release(backend: &mut dyn RenderBackend, target: RenderTarget) {
        backend.release_target(target.id);
    }

    /// Releases every owned target. The back buffer belongs to the backend.
    pub fn release_all(self, backend: &mut dyn RenderBackend) {
        Self::release(backend, self.main_depth);
        for target in self.shadow_maps {
            Self::release(backend, target);
        }
        for portal in self.portals {
            Self::release(backend, portal.color);
            Self::release(backend, portal.depth);
        }
    }
}
