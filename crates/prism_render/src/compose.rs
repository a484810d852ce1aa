//! Frame composition.
//!
//! Turns a resolved [`Frame`] into an 8-bit RGBA [`Bitmap`] the host can
//! display. Each colour channel goes through:
//!
//! 1. exposure: `v * 2^exposure`
//! 2. tone mapping: identity (`Linear`) or `v / (1 + v)` (`Reinhard`)
//! 3. clamp to `[0, 1]`, then gamma encode `v^(1/gamma)`
//!
//! Alpha is stored linearly.

use std::fmt;

use prism_core::settings::{RenderSettings, ToneMapping};

use crate::frame::Frame;

/// 8-bit RGBA image, rows top to bottom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 4]>,
}

impl Bitmap {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0; 4]; width as usize * height as usize],
        }
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x < self.width && y < self.height {
            let index = y as usize * self.width as usize + x as usize;
            self.pixels[index] = rgba;
        }
    }
}

/// Overlay hook run after tone mapping, e.g. to draw a render stamp.
pub type StampFn = Box<dyn Fn(&mut Bitmap, &Frame) + Send + Sync>;

pub struct FrameCompositor {
    exposure_scale: f32,
    tone_mapping: ToneMapping,
    inv_gamma: f32,
    stamp: Option<StampFn>,
}

impl FrameCompositor {
    #[must_use]
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            exposure_scale: settings.exposure.exp2(),
            tone_mapping: settings.tone_mapping,
            inv_gamma: 1.0 / settings.gamma,
            stamp: None,
        }
    }

    #[must_use]
    pub fn with_stamp(mut self, stamp: impl Fn(&mut Bitmap, &Frame) + Send + Sync + 'static) -> Self {
        self.stamp = Some(Box::new(stamp));
        self
    }

    #[must_use]
    pub fn compose(&self, frame: &Frame) -> Bitmap {
        let mut bitmap = Bitmap::default();
        self.compose_into(frame, &mut bitmap);
        bitmap
    }

    /// Composes into an existing bitmap, reallocating only on size change.
    pub fn compose_into(&self, frame: &Frame, bitmap: &mut Bitmap) {
        if bitmap.width != frame.width || bitmap.height != frame.height {
            *bitmap = Bitmap::new(frame.width, frame.height);
        }

        for ((out, rgb), &alpha) in bitmap
            .pixels
            .iter_mut()
            .zip(&frame.color)
            .zip(&frame.alpha)
        {
            *out = [
                self.map_channel(rgb[0]),
                self.map_channel(rgb[1]),
                self.map_channel(rgb[2]),
                to_u8(alpha),
            ];
        }

        if let Some(stamp) = &self.stamp {
            stamp(bitmap, frame);
        }
    }

    #[inline]
    fn map_channel(&self, value: f32) -> u8 {
        let v = value.max(0.0) * self.exposure_scale;
        let v = match self.tone_mapping {
            ToneMapping::Linear => v,
            ToneMapping::Reinhard => v / (1.0 + v),
        };
        to_u8(v.clamp(0.0, 1.0).powf(self.inv_gamma))
    }
}

impl fmt::Debug for FrameCompositor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCompositor")
            .field("exposure_scale", &self.exposure_scale)
            .field("tone_mapping", &self.tone_mapping)
            .field("inv_gamma", &self.inv_gamma)
            .field("stamp", &self.stamp.is_some())
            .finish()
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(rgb: [f32; 3], alpha: f32) -> Frame {
        Frame {
            width: 1,
            height: 1,
            pass: 1,
            epoch: 0,
            color: vec![rgb],
            alpha: vec![alpha],
        }
    }

    fn linear() -> RenderSettings {
        RenderSettings {
            gamma: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn linear_without_gamma_is_a_plain_quantize() {
        let bitmap = FrameCompositor::new(&linear()).compose(&frame([0.0, 0.5, 2.0], 1.0));
        assert_eq!(bitmap.pixels[0], [0, 128, 255, 255]);
    }

    #[test]
    fn exposure_is_in_stops() {
        let settings = RenderSettings {
            exposure: 1.0,
            ..linear()
        };
        let bitmap = FrameCompositor::new(&settings).compose(&frame([0.25, 0.0, 0.0], 0.5));
        assert_eq!(bitmap.pixels[0], [128, 0, 0, 128]);
    }

    #[test]
    fn reinhard_compresses_highlights() {
        let settings = RenderSettings {
            tone_mapping: ToneMapping::Reinhard,
            ..linear()
        };
        let bitmap = FrameCompositor::new(&settings).compose(&frame([1.0, 3.0, 0.0], 1.0));
        assert_eq!(bitmap.pixels[0][0], 128);
        assert_eq!(bitmap.pixels[0][1], 191);
    }

    #[test]
    fn stamp_runs_last() {
        let compositor = FrameCompositor::new(&linear())
            .with_stamp(|bitmap, frame| bitmap.set_pixel(0, 0, [frame.pass as u8, 0, 0, 255]));
        let bitmap = compositor.compose(&frame([1.0; 3], 1.0));
        assert_eq!(bitmap.pixel(0, 0), Some([1, 0, 0, 255]));
    }
}
