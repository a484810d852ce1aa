//! Render backend surface.
//!
//! Frame buffer and pass operations of the path tracer. The backend object
//! is moved into the render session and only touched under the render
//! target lock, which is why it must be `Send`.

use prism_core::backend::BackendResult;
use prism_core::settings::Region;

/// Raw accumulation buffers read back from the backend.
///
/// `color` holds the accumulated radiance with the accumulated sample weight
/// in the fourth component; `alpha` holds accumulated coverage. Dividing by
/// the weight yields the displayable values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub color: Vec<[f32; 4]>,
    pub alpha: Vec<f32>,
}

impl RawFrame {
    #[inline]
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

pub trait RenderBackend: Send {
    fn create_frame_buffers(&mut self, width: u32, height: u32) -> BackendResult<()>;

    /// Resets accumulation to zero.
    fn clear_frame_buffers(&mut self) -> BackendResult<()>;

    /// Renders one progressive pass over the whole frame or `region`.
    ///
    /// Blocks until the pass completes and cannot be interrupted.
    fn render_pass(&mut self, region: Option<Region>) -> BackendResult<()>;

    /// Copies the current accumulation out of the backend.
    fn read_accumulation(&mut self) -> BackendResult<RawFrame>;

    fn destroy_frame_buffers(&mut self);

    /// Destroys the backend context. Nothing may be called afterwards.
    fn destroy_context(&mut self);
}
