use std::collections::HashMap;

use super::backend::{ProgramId, ProgramStage, RenderBackend, SamplerBinding, TextureId};
use super::state::{PipelineState, SamplerKind};
use crate::error::{RenderError, RenderResult};

/// Where a technique's texture slot gets its texture from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSource {
    File(&'static str),
    CubeFaces(&'static [&'static str; 6]),
    /// Depth texture of the n-th shadow-casting light.
    ShadowMap(usize),
    /// Colour texture of the n-th portal.
    Portal(usize),
}

/// Data-driven description of how a drawable is shaded.
///
/// Techniques are plain data: the pass binder walks them generically, so
/// adding a shading style means adding a table entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Technique {
    pub name: &'static str,
    pub vertex_program: &'static str,
    /// `None` for depth-only rendering.
    pub pixel_program: Option<&'static str>,
    pub textures: &'static [(u32, TextureSource)],
    pub samplers: &'static [(u32, SamplerKind)],
    pub state: PipelineState,
}

impl Technique {
    pub const DEPTH_ONLY: Technique = Technique {
        name: "DepthOnly",
        vertex_program: "basic_transform_vs",
        pixel_program: None,
        textures: &[],
        samplers: &[],
        state: PipelineState::OPAQUE,
    };

    pub fn is_depth_only(&self) -> bool {
        self.pixel_program.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TechniqueHandle(pub(crate) u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedSource {
    Texture(TextureId),
    ShadowMap(usize),
    Portal(usize),
}

/// A technique whose program and texture names have been loaded.
#[derive(Debug, Clone)]
pub struct ResolvedTechnique {
    pub name: &'static str,
    pub vertex: ProgramId,
    pub pixel: Option<ProgramId>,
    pub textures: Vec<(u32, ResolvedSource)>,
    pub samplers: Vec<SamplerBinding>,
    pub state: PipelineState,
}

impl ResolvedTechnique {
    pub fn texture_slots(&self) -> impl Iterator<Item = u32> + '_ {
        self.textures.iter().map(|(slot, _)| *slot)
    }
}

/// Loaded techniques, addressed by the position they were registered in.
#[derive(Debug, Default)]
pub struct TechniqueLibrary {
    techniques: Vec<ResolvedTechnique>,
    max_shadow_map: Option<usize>,
    max_portal: Option<usize>,
}

impl TechniqueLibrary {
    /// Loads every program and texture referenced by `techniques`. Shared
    /// names are only loaded once. Any missing asset aborts the load.
    pub fn load(backend: &mut dyn RenderBackend, techniques: &[Technique]) -> RenderResult<Self> {
        let mut programs: HashMap<(&'static str, bool), ProgramId> = HashMap::new();
        let mut textures: HashMap<TextureSource, TextureId> = HashMap::new();
        let mut library = TechniqueLibrary::default();

        for technique in techniques {
            let vertex = match programs.get(&(technique.vertex_program, false)) {
                Some(id) => *id,
                None => {
                    let id = backend.load_program(technique.vertex_program, ProgramStage::Vertex)?;
                    programs.insert((technique.vertex_program, false), id);
                    id
                }
            };
            let pixel = match technique.pixel_program {
                Some(name) => Some(match programs.get(&(name, true)) {
                    Some(id) => *id,
                    None => {
                        let id = backend.load_program(name, ProgramStage::Pixel)?;
                        programs.insert((name, true), id);
                        id
                    }
                }),
                None => None,
            };

            let mut resolved = Vec::with_capacity(technique.textures.len());
            for &(slot, source) in technique.textures {
                let source = match source {
                    TextureSource::ShadowMap(i) => {
                        library.max_shadow_map = library.max_shadow_map.max(Some(i));
                        ResolvedSource::ShadowMap(i)
                    }
                    TextureSource::Portal(i) => {
                        library.max_portal = library.max_portal.max(Some(i));
                        ResolvedSource::Portal(i)
                    }
                    TextureSource::File(name) => {
                        ResolvedSource::Texture(load_cached(&mut textures, source, || {
                            backend.load_texture(name)
                        })?)
                    }
                    TextureSource::CubeFaces(faces) => {
                        ResolvedSource::Texture(load_cached(&mut textures, source, || {
                            backend.load_cube_texture(faces)
                        })?)
                    }
                };
                resolved.push((slot, source));
            }

            if technique.is_depth_only() && !resolved.is_empty() {
                return Err(RenderError::InvalidState(format!(
                    "depth-only technique {} must not sample textures",
                    technique.name
                )));
            }

            library.techniques.push(ResolvedTechnique {
                name: technique.name,
                vertex,
                pixel,
                textures: resolved,
                samplers: technique
                    .samplers
                    .iter()
                    .map(|&(slot, kind)| SamplerBinding { slot, kind })
                    .collect(),
                state: technique.state,
            });
        }

        log::info!(
            "Loaded {} techniques ({} programs, {} textures)",
            library.techniques.len(),
            programs.len(),
            textures.len()
        );
        Ok(library)
    }

    pub fn handle(&self, index: usize) -> Option<TechniqueHandle> {
        (index < self.techniques.len()).then_some(TechniqueHandle(index as u16))
    }

    pub fn get(&self, handle: TechniqueHandle) -> Option<&ResolvedTechnique> {
        self.techniques.get(handle.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }

    /// Number of shadow maps the techniques expect to exist.
    pub fn shadow_maps_required(&self) -> usize {
        self.max_shadow_map.map_or(0, |i| i + 1)
    }

    /// Number of portal targets the techniques expect to exist.
    pub fn portals_required(&self) -> usize {
        self.max_portal.map_or(0, |i| i + 1)
    }
}

fn load_cached(
    cache: &mut HashMap<TextureSource, TextureId>,
    source: TextureSource,
    load: impl FnOnce() -> RenderResult<TextureId>,
) -> RenderResult<TextureId> {
    if let Some(id) = cache.get(&source) {
        return Ok(*id);
    }
    let id = load()?;
    cache.insert(source, id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::RecordingBackend;

    const LIT: Technique = Technique {
        name: "Lit",
        vertex_program: "pixel_lighting_vs",
        pixel_program: Some("pixel_lighting_ps"),
        textures: &[(0, TextureSource::File("Stone.png")), (1, TextureSource::ShadowMap(2))],
        samplers: &[(0, SamplerKind::Anisotropic), (1, SamplerKind::ShadowCompare)],
        state: PipelineState::OPAQUE,
    };

    const LIT_PORTAL: Technique = Technique {
        name: "LitPortal",
        vertex_program: "pixel_lighting_vs",
        pixel_program: Some("portal_ps"),
        textures: &[(0, TextureSource::Portal(0)), (1, TextureSource::File("Stone.png"))],
        samplers: &[(0, SamplerKind::Anisotropic)],
        state: PipelineState::OPAQUE,
    };

    #[test]
    fn shared_programs_and_textures_load_once() {
        let mut backend = RecordingBackend::new(64, 64);
        let library =
            TechniqueLibrary::load(&mut backend, &[LIT, LIT_PORTAL, Technique::DEPTH_ONLY]).unwrap();

        let lit = library.get(library.handle(0).unwrap()).unwrap();
        let portal = library.get(library.handle(1).unwrap()).unwrap();
        let depth = library.get(library.handle(2).unwrap()).unwrap();

        assert_eq!(backend.program_name(lit.vertex), Some("pixel_lighting_vs"));
        assert_eq!(lit.texture_slots().collect::<Vec<_>>(), vec![0, 1]);
        let ResolvedSource::Texture(stone) = lit.textures[0].1 else {
            panic!("slot 0 should hold a file texture");
        };
        assert_eq!(backend.texture_name(stone), Some("Stone.png"));
        assert_eq!(lit.vertex, portal.vertex);
        assert_ne!(lit.pixel, portal.pixel);
        assert_eq!(lit.textures[0].1, portal.textures[1].1);
        assert!(depth.pixel.is_none());
        assert_eq!(library.shadow_maps_required(), 3);
        assert_eq!(library.portals_required(), 1);
        assert!(library.handle(3).is_none());
    }

    #[test]
    fn missing_texture_aborts_load() {
        let mut backend = RecordingBackend::new(64, 64);
        backend.mark_missing("Stone.png");
        let err = TechniqueLibrary::load(&mut backend, &[LIT]).unwrap_err();
        assert!(matches!(err, RenderError::AssetLoadFailed { .. }));
    }

    #[test]
    fn depth_only_with_textures_is_rejected() {
        const BROKEN: Technique = Technique {
            textures: &[(0, TextureSource::File("Stone.png"))],
            ..Technique::DEPTH_ONLY
        };
        let mut backend = RecordingBackend::new(64, 64);
        assert!(TechniqueLibrary::load(&mut backend, &[BROKEN]).is_err());
    }
}
