//! Material-side value types shared by the host, the parser and the backend.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::ids::{MaterialId, ShaderHandle};

/// What a shape's material slot currently resolves to.
///
/// `Disabled` is distinct from `Unassigned`: an unassigned slot renders with
/// the node's wireframe colour, a disabled sub-material slot renders flat
/// black. Neither participates in the material cache or the user index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MaterialSlot {
    #[default]
    Unassigned,
    Disabled,
    Assigned(MaterialId),
}

impl MaterialSlot {
    /// Returns the material id when the slot holds a real material.
    #[inline]
    #[must_use]
    pub fn material(self) -> Option<MaterialId> {
        match self {
            Self::Assigned(id) => Some(id),
            Self::Unassigned | Self::Disabled => None,
        }
    }
}

/// Host material class identifier, compared by identity.
///
/// Material kinds the bridge knows about are recognised by comparing against
/// the associated constants; everything else is treated as a generic material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassId(pub u32, pub u32);

impl ClassId {
    /// Multi/sub-object container material.
    pub const MULTI_MATERIAL: ClassId = ClassId(0x0000_0200, 0);
    /// Native physically based material of the renderer plugin.
    pub const PBR_MATERIAL: ClassId = ClassId(0x5c6a_2c3e, 0x1b6e_7a10);
    /// Uber material of the renderer plugin.
    pub const UBER_MATERIAL: ClassId = ClassId(0x6a2e_5d0f, 0x2c7b_1e44);
    /// Shadow catcher material of the renderer plugin.
    pub const SHADOW_CATCHER: ClassId = ClassId(0x7f3a_0b21, 0x4d1c_6e52);
}

/// Parameter identifier inside a host material's parameter block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamId(pub u16);

impl ParamId {
    /// "Casts shadows" toggle on the renderer plugin's own materials.
    pub const CASTS_SHADOWS: ParamId = ParamId(900);
    /// "Shadow catcher" toggle on the renderer plugin's own materials.
    pub const SHADOW_CATCHER: ParamId = ParamId(901);
}

bitflags! {
    /// Shadow participation of a shape.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ShadowFlags: u8 {
        const CASTS_SHADOWS  = 1 << 0;
        const SHADOW_CATCHER = 1 << 1;
    }
}

impl Default for ShadowFlags {
    /// Unrecognised material types cast shadows and do not catch them.
    fn default() -> Self {
        Self::CASTS_SHADOWS
    }
}

/// How displaced subdivision treats open boundaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundaryInterpolation {
    #[default]
    EdgeAndCorner,
    EdgeOnly,
}

/// Resolved displacement of a material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Displacement {
    /// Shader producing the displacement height.
    pub map: ShaderHandle,
    pub min_height: f32,
    pub max_height: f32,
    pub subdivision: u32,
    pub crease_weight: f32,
    pub boundary: BoundaryInterpolation,
    /// Displacement applied straight to the base mesh vertices rather than to
    /// an adaptively subdivided surface.
    pub direct: bool,
}

/// Result of compiling a material into a backend shader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderBuild {
    pub shader: ShaderHandle,
    /// Whether the shader graph contains at least one emissive component.
    pub emissive: bool,
}

/// Linear RGB colour used for flat diagnostic shaders.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);
    pub const MAGENTA: Color = Color::new(1.0, 0.0, 1.0);

    #[inline]
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Builds a colour from 8-bit components (host wireframe colours).
    #[inline]
    #[must_use]
    pub fn from_rgb8(rgb: [u8; 3]) -> Self {
        Self::new(
            f32::from(rgb[0]) / 255.0,
            f32::from(rgb[1]) / 255.0,
            f32::from(rgb[2]) / 255.0,
        )
    }
}
