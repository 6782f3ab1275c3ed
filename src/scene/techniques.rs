use crate::renderer::state::{PipelineState, SamplerKind};
use crate::renderer::technique::{Technique, TechniqueHandle, TextureSource};

use SamplerKind::{Anisotropic, Point, ShadowCompare};
use TextureSource::{File, Portal, ShadowMap};

pub const CUBE_MAP_FACES: [&str; 6] = [
    "cubemap/right.jpg",
    "cubemap/left.jpg",
    "cubemap/top.jpg",
    "cubemap/bottom.jpg",
    "cubemap/front.jpg",
    "cubemap/back.jpg",
];

/// Every shading style used by the demo scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TechniqueId {
    DepthOnly,
    Floor,
    ShadowMapped,
    CrateShadowMapped,
    CellOutline,
    CellShaded,
    SpecularMap,
    PixelLit,
    CubeMapped,
    TextureTransition,
    TvPortal,
    Metal,
    NormalMapped,
    ParallaxMapped,
    WiggleModel,
    WiggleTexture,
    SpherePortal,
    AdditiveDecal,
    Glass,
    LightFlare,
}

impl TechniqueId {
    pub const ALL: [TechniqueId; 20] = [
        TechniqueId::DepthOnly,
        TechniqueId::Floor,
        TechniqueId::ShadowMapped,
        TechniqueId::CrateShadowMapped,
        TechniqueId::CellOutline,
        TechniqueId::CellShaded,
        TechniqueId::SpecularMap,
        TechniqueId::PixelLit,
        TechniqueId::CubeMapped,
        TechniqueId::TextureTransition,
        TechniqueId::TvPortal,
        TechniqueId::Metal,
        TechniqueId::NormalMapped,
        TechniqueId::ParallaxMapped,
        TechniqueId::WiggleModel,
        TechniqueId::WiggleTexture,
        TechniqueId::SpherePortal,
        TechniqueId::AdditiveDecal,
        TechniqueId::Glass,
        TechniqueId::LightFlare,
    ];

    /// Handle into a library loaded from [`catalog`].
    pub fn handle(self) -> TechniqueHandle {
        TechniqueHandle(self as u16)
    }

    pub fn technique(self) -> Technique {
        const LIT: Technique = Technique {
            name: "PixelLit",
            vertex_program: "pixel_lighting_vs",
            pixel_program: Some("pixel_lighting_ps"),
            textures: &[(0, File("StoneDiffuseSpecular.png"))],
            samplers: &[(0, Anisotropic)],
            state: PipelineState::OPAQUE,
        };

        match self {
            TechniqueId::DepthOnly => Technique::DEPTH_ONLY,
            TechniqueId::Floor => Technique {
                name: "Floor",
                vertex_program: "floor_vs",
                pixel_program: Some("floor_ps"),
                textures: &[
                    (0, File("CobbleDiffuseSpecular.png")),
                    (1, File("CobbleNormalHeight.png")),
                    (2, ShadowMap(0)),
                    (3, ShadowMap(1)),
                    (4, ShadowMap(2)),
                ],
                samplers: &[
                    (0, Anisotropic),
                    (1, Anisotropic),
                    (2, ShadowCompare),
                    (3, ShadowCompare),
                    (4, ShadowCompare),
                ],
                ..LIT
            },
            TechniqueId::ShadowMapped => Technique {
                name: "ShadowMapped",
                vertex_program: "shadow_mapping_vs",
                pixel_program: Some("shadow_mapping_ps"),
                textures: &[
                    (0, File("TrollDiffuseSpecular.png")),
                    (1, ShadowMap(0)),
                    (2, ShadowMap(1)),
                ],
                samplers: &[(0, Anisotropic), (1, ShadowCompare), (2, ShadowCompare)],
                ..LIT
            },
            TechniqueId::CrateShadowMapped => Technique {
                name: "CrateShadowMapped",
                vertex_program: "shadow_mapping_vs",
                pixel_program: Some("crate_shadow_mapping_ps"),
                textures: &[(0, File("CargoA.png")), (1, ShadowMap(2))],
                samplers: &[(0, Anisotropic), (1, ShadowCompare)],
                ..LIT
            },
            TechniqueId::CellOutline => Technique {
                name: "CellOutline",
                vertex_program: "cell_outline_vs",
                pixel_program: Some("cell_outline_ps"),
                textures: &[],
                samplers: &[],
                state: PipelineState::OUTLINE,
            },
            TechniqueId::CellShaded => Technique {
                name: "CellShaded",
                vertex_program: "pixel_lighting_vs",
                pixel_program: Some("cell_shading_ps"),
                textures: &[(0, File("Green.png")), (1, File("CellGradient.png"))],
                samplers: &[(0, Anisotropic), (1, Point)],
                ..LIT
            },
            TechniqueId::SpecularMap => Technique {
                name: "SpecularMap",
                vertex_program: "transform_lighting_vs",
                pixel_program: Some("texture_lighting_ps"),
                ..LIT
            },
            TechniqueId::PixelLit => LIT,
            TechniqueId::CubeMapped => Technique {
                name: "CubeMapped",
                pixel_program: Some("cube_map_lighting_ps"),
                textures: &[(0, TextureSource::CubeFaces(&CUBE_MAP_FACES))],
                ..LIT
            },
            TechniqueId::TextureTransition => Technique {
                name: "TextureTransition",
                pixel_program: Some("texture_transition_ps"),
                textures: &[(0, File("Wood2.jpg")), (1, File("Brick1.jpg"))],
                samplers: &[(0, Anisotropic), (1, Anisotropic)],
                ..LIT
            },
            TechniqueId::TvPortal => Technique {
                name: "TvPortal",
                pixel_program: Some("tv_portal_ps"),
                textures: &[(0, Portal(0)), (1, File("tv.png"))],
                samplers: &[(0, Anisotropic), (1, Anisotropic)],
                ..LIT
            },
            TechniqueId::Metal => Technique {
                name: "Metal",
                vertex_program: "metal_vs",
                pixel_program: Some("metal_ps"),
                textures: &[(0, File("MetalDiffuseSpecular.png"))],
                ..LIT
            },
            TechniqueId::NormalMapped => Technique {
                name: "NormalMapped",
                vertex_program: "normal_mapping_vs",
                pixel_program: Some("normal_mapping_ps"),
                textures: &[
                    (0, File("PatternDiffuseSpecular.png")),
                    (1, File("PatternNormal.png")),
                ],
                samplers: &[(0, Anisotropic), (1, Anisotropic)],
                ..LIT
            },
            TechniqueId::ParallaxMapped => Technique {
                name: "ParallaxMapped",
                vertex_program: "normal_mapping_vs",
                pixel_program: Some("parallax_mapping_ps"),
                textures: &[
                    (0, File("TechDiffuseSpecular.png")),
                    (1, File("TechNormalHeight.png")),
                ],
                samplers: &[(0, Anisotropic), (1, Anisotropic)],
                ..LIT
            },
            TechniqueId::WiggleModel => Technique {
                name: "WiggleModel",
                vertex_program: "wiggle_model_vs",
                textures: &[(0, File("Brick1.jpg"))],
                ..LIT
            },
            TechniqueId::WiggleTexture => Technique {
                name: "WiggleTexture",
                pixel_program: Some("wiggle_texture_ps"),
                textures: &[(0, File("Brick1.jpg"))],
                ..LIT
            },
            TechniqueId::SpherePortal => Technique {
                name: "SpherePortal",
                vertex_program: "light_model_vs",
                pixel_program: Some("light_model_ps"),
                textures: &[(0, Portal(1))],
                ..LIT
            },
            TechniqueId::AdditiveDecal => Technique {
                name: "AdditiveDecal",
                textures: &[(0, File("Moogle.png"))],
                state: PipelineState::ADDITIVE,
                ..LIT
            },
            TechniqueId::Glass => Technique {
                name: "Glass",
                vertex_program: "light_model_vs",
                pixel_program: Some("light_model_ps"),
                textures: &[(0, File("Glass.jpg"))],
                state: PipelineState::MULTIPLICATIVE,
                ..LIT
            },
            TechniqueId::LightFlare => Technique {
                name: "LightFlare",
                vertex_program: "light_model_vs",
                pixel_program: Some("light_model_ps"),
                textures: &[(0, File("Flare.jpg"))],
                state: PipelineState::ADDITIVE,
                ..LIT
            },
        }
    }
}

/// Technique table in [`TechniqueId`] order.
pub fn catalog() -> Vec<Technique> {
    TechniqueId::ALL.iter().map(|id| id.technique()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_order_matches_ids() {
        let table = catalog();
        for (index, id) in TechniqueId::ALL.iter().enumerate() {
            assert_eq!(id.handle(), TechniqueHandle(index as u16));
            assert_eq!(table[index], id.technique());
        }
    }

    #[test]
    fn only_depth_only_lacks_a_pixel_program() {
        for id in TechniqueId::ALL {
            assert_eq!(id.technique().is_depth_only(), id == TechniqueId::DepthOnly);
        }
    }

    #[test]
    fn every_shadow_map_slot_uses_a_compare_sampler() {
        for id in TechniqueId::ALL {
            let technique = id.technique();
            for (slot, source) in technique.textures {
                if matches!(source, TextureSource::ShadowMap(_)) {
                    assert!(technique
                        .samplers
                        .iter()
                        .any(|(s, kind)| s == slot && *kind == ShadowCompare));
                }
            }
        }
    }

    #[test]
    fn blended_techniques_never_write_depth() {
        for id in [TechniqueId::AdditiveDecal, TechniqueId::Glass, TechniqueId::LightFlare] {
            assert!(!id.technique().state.writes_depth());
        }
    }
}
