//! Synchronization & Render Settings
//!
//! Two configuration structs drive the bridge:
//!
//! - [`SyncSettings`]: how host geometry and materials are translated.
//! - [`RenderSettings`]: how a render session runs and presents frames.
//!
//! Both are plain data with sensible defaults and can be loaded from JSON.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use prism::settings::{RenderSettings, Termination};
//!
//! // Default: unlimited progressive rendering
//! let settings = RenderSettings::default();
//!
//! // Production render that stops after 256 passes
//! let settings = RenderSettings {
//!     termination: Termination::pass_count(256),
//!     ..Default::default()
//! };
//!
//! // From a JSON preset; missing fields keep their defaults
//! let settings = RenderSettings::from_json_str(r#"{ "width": 1920, "height": 1080 }"#)?;
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{PrismError, Result};
use crate::material::Color;

// ---------------------------------------------------------------------------
// SyncSettings
// ---------------------------------------------------------------------------

/// Geometry and material translation settings.
///
/// | Field                | Description                                        | Default   |
/// |----------------------|----------------------------------------------------|-----------|
/// | `master_scale`       | Host units to backend metres                       | `1.0`     |
/// | `flip_odd_parity`    | Swap winding of mirrored nodes                     | `true`    |
/// | `error_color`        | Flat colour used when a material fails to compile  | Magenta   |
/// | `disabled_color`     | Flat colour of disabled sub-material slots         | Black     |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// Scale applied to every position and translation sent to the backend.
    pub master_scale: f32,

    /// When a node's world transform is mirrored (negative determinant), swap
    /// the first two corners of each triangle and mirror U so faces keep
    /// pointing outwards and textures read correctly.
    pub flip_odd_parity: bool,

    /// Diagnostic colour for slots whose material produced no shader.
    pub error_color: Color,

    /// Colour of disabled sub-material slots.
    pub disabled_color: Color,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            master_scale: 1.0,
            flip_odd_parity: true,
            error_color: Color::MAGENTA,
            disabled_color: Color::BLACK,
        }
    }
}

impl SyncSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        log::debug!("sync settings loaded: {settings:?}");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.master_scale.is_finite() && self.master_scale > 0.0) {
            return Err(PrismError::InvalidSetting {
                field: "master_scale",
                reason: format!("must be a positive number, got {}", self.master_scale),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Termination
// ---------------------------------------------------------------------------

/// When a render loop stops by itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// Never self-terminates; only an abort ends the loop.
    #[default]
    None,
    /// Stops after `passes` completed passes.
    PassCount { passes: u32 },
    /// Stops once `seconds` of wall time have elapsed.
    WallClock { seconds: f64 },
}

impl Termination {
    #[inline]
    #[must_use]
    pub fn pass_count(passes: u32) -> Self {
        Self::PassCount { passes }
    }

    #[inline]
    #[must_use]
    pub fn wall_clock(limit: Duration) -> Self {
        Self::WallClock {
            seconds: limit.as_secs_f64(),
        }
    }

    /// Returns `true` once the policy's limit has been reached.
    #[must_use]
    pub fn is_reached(&self, passes: u32, elapsed: Duration) -> bool {
        match *self {
            Self::None => false,
            Self::PassCount { passes: limit } => passes >= limit,
            Self::WallClock { seconds } => elapsed.as_secs_f64() >= seconds,
        }
    }
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// Tone mapping operator applied when composing a presentable bitmap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneMapping {
    #[default]
    Linear,
    Reinhard,
}

/// Region of interest in pixels, origin at the top left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

// ---------------------------------------------------------------------------
// RenderSettings
// ---------------------------------------------------------------------------

/// Configuration of one render session.
///
/// | Field               | Description                                 | Default   |
/// |---------------------|---------------------------------------------|-----------|
/// | `width`, `height`   | Frame buffer size in pixels                 | 640 × 480 |
/// | `termination`       | Self-termination policy                     | `None`    |
/// | `region`            | Optional region of interest                 | `None`    |
/// | `exposure`          | Exposure in stops                           | `0.0`     |
/// | `tone_mapping`      | Tone mapping operator                       | `Linear`  |
/// | `gamma`             | Display gamma                               | `2.2`     |
/// | `ui_poll_ms`        | UI thread polling cadence                   | `30`      |
/// | `frame_copy_ms`     | Frame-copy helper sleep interval            | `10`      |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub termination: Termination,
    pub region: Option<Region>,
    pub exposure: f32,
    pub tone_mapping: ToneMapping,
    pub gamma: f32,
    pub ui_poll_ms: u64,
    pub frame_copy_ms: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            termination: Termination::None,
            region: None,
            exposure: 0.0,
            tone_mapping: ToneMapping::Linear,
            gamma: 2.2,
            ui_poll_ms: 30,
            frame_copy_ms: 10,
        }
    }
}

impl RenderSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        log::debug!("render settings loaded: {settings:?}");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PrismError::InvalidSetting {
                field: "width/height",
                reason: format!("frame size {}x{} is empty", self.width, self.height),
            });
        }
        match self.termination {
            Termination::PassCount { passes: 0 } => {
                return Err(PrismError::InvalidSetting {
                    field: "termination",
                    reason: "pass count limit must be at least 1".into(),
                });
            }
            Termination::WallClock { seconds } if !(seconds.is_finite() && seconds > 0.0) => {
                return Err(PrismError::InvalidSetting {
                    field: "termination",
                    reason: format!("wall clock limit must be positive, got {seconds}"),
                });
            }
            _ => {}
        }
        if let Some(r) = self.region
            && (r.width == 0
                || r.height == 0
                || r.x.saturating_add(r.width) > self.width
                || r.y.saturating_add(r.height) > self.height)
        {
            return Err(PrismError::InvalidSetting {
                field: "region",
                reason: format!(
                    "region {}x{}+{}+{} does not fit the {}x{} frame",
                    r.width, r.height, r.x, r.y, self.width, self.height
                ),
            });
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(PrismError::InvalidSetting {
                field: "gamma",
                reason: format!("must be positive, got {}", self.gamma),
            });
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn ui_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ui_poll_ms)
    }

    #[inline]
    #[must_use]
    pub fn frame_copy_interval(&self) -> Duration {
        Duration::from_millis(self.frame_copy_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termination_limits() {
        let t = Termination::pass_count(5);
        assert!(!t.is_reached(4, Duration::ZERO));
        assert!(t.is_reached(5, Duration::ZERO));

        let t = Termination::wall_clock(Duration::from_secs(2));
        assert!(!t.is_reached(100, Duration::from_millis(1999)));
        assert!(t.is_reached(0, Duration::from_secs(2)));

        assert!(!Termination::None.is_reached(u32::MAX, Duration::MAX));
    }

    #[test]
    fn region_must_fit_frame() {
        let settings = RenderSettings {
            region: Some(Region {
                x: 600,
                y: 0,
                width: 100,
                height: 10,
            }),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
