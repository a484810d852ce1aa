//! Material parser driven by a script of per-material outputs.

use rustc_hash::FxHashMap;

use prism_core::backend::SceneBackend;
use prism_core::host::MaterialParser;
use prism_core::ids::{MaterialRef, ShaderHandle, TimeValue, VolumeShaderHandle};
use prism_core::material::{BoundaryInterpolation, Color, Displacement, ShaderBuild};

/// What the parser produces for one material.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialScript {
    pub color: Color,
    pub emissive: bool,
    /// `true` makes shader creation fail.
    pub broken: bool,
    pub volume: bool,
    pub displacement: Option<DisplacementScript>,
}

impl Default for MaterialScript {
    fn default() -> Self {
        Self {
            color: Color::new(0.5, 0.5, 0.5),
            emissive: false,
            broken: false,
            volume: false,
            displacement: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplacementScript {
    pub min_height: f32,
    pub max_height: f32,
    pub subdivision: u32,
    pub direct: bool,
}

impl Default for DisplacementScript {
    fn default() -> Self {
        Self {
            min_height: 0.0,
            max_height: 1.0,
            subdivision: 2,
            direct: false,
        }
    }
}

/// [`MaterialParser`] returning scripted results.
///
/// Shaders and displacement maps are created as flat shaders on the
/// backend. Every call creates new objects, as a real parser would, so a
/// caller that drops them without releasing leaks them.
#[derive(Debug, Default)]
pub struct ScriptedParser {
    scripts: FxHashMap<MaterialRef, MaterialScript>,
    displacement_maps: Vec<ShaderHandle>,
    volumes: Vec<VolumeShaderHandle>,
    shader_builds: FxHashMap<MaterialRef, usize>,
}

impl ScriptedParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&mut self, material: MaterialRef, script: MaterialScript) {
        self.scripts.insert(material, script);
    }

    pub fn script_mut(&mut self, material: MaterialRef) -> &mut MaterialScript {
        self.scripts.entry(material).or_default()
    }

    /// Number of `create_shader` calls for `material`.
    #[must_use]
    pub fn shader_builds(&self, material: MaterialRef) -> usize {
        self.shader_builds.get(&material).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_shader_builds(&self) -> usize {
        self.shader_builds.values().sum()
    }

    /// Every displacement map handed out, in creation order.
    #[must_use]
    pub fn displacement_maps(&self) -> &[ShaderHandle] {
        &self.displacement_maps
    }

    /// Every volume shader handed out, in creation order.
    #[must_use]
    pub fn volumes(&self) -> &[VolumeShaderHandle] {
        &self.volumes
    }

    fn lookup(&self, material: MaterialRef) -> MaterialScript {
        self.scripts.get(&material).cloned().unwrap_or_default()
    }
}

impl MaterialParser for ScriptedParser {
    fn create_shader(
        &mut self,
        backend: &mut dyn SceneBackend,
        material: MaterialRef,
        _time: TimeValue,
    ) -> Option<ShaderBuild> {
        *self.shader_builds.entry(material).or_default() += 1;
        let script = self.lookup(material);
        if script.broken {
            return None;
        }
        let shader = backend.create_flat_shader(script.color).ok()?;
        Some(ShaderBuild {
            shader,
            emissive: script.emissive,
        })
    }

    fn create_volume_shader(
        &mut self,
        _backend: &mut dyn SceneBackend,
        material: MaterialRef,
        _time: TimeValue,
    ) -> Option<VolumeShaderHandle> {
        if !self.lookup(material).volume {
            return None;
        }
        let volume = VolumeShaderHandle(1_000_001 + self.volumes.len() as u64);
        self.volumes.push(volume);
        Some(volume)
    }

    fn displacement(
        &mut self,
        backend: &mut dyn SceneBackend,
        material: MaterialRef,
        _time: TimeValue,
    ) -> Option<Displacement> {
        let script = self.lookup(material).displacement?;
        let map = backend.create_flat_shader(Color::new(1.0, 1.0, 1.0)).ok()?;
        self.displacement_maps.push(map);
        Some(Displacement {
            map,
            min_height: script.min_height,
            max_height: script.max_height,
            subdivision: script.subdivision,
            crease_weight: 0.0,
            boundary: BoundaryInterpolation::EdgeAndCorner,
            direct: script.direct,
        })
    }
}
