//! Camera translation.
//!
//! Host cameras look down their local -Z axis with +Y up. The backend camera
//! is positioned with a look-at triple; lengths are converted with the
//! master scale like every other position.

use glam::{Mat4, Vec3};

use prism_core::backend::{BackendResult, CameraParams, Projection, SceneBackend};
use prism_core::ids::CameraHandle;

/// Host camera state at the render time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraDesc {
    /// Camera-to-world transform.
    pub transform: Mat4,
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
    pub focal_distance: Option<f32>,
    /// Output width / height.
    pub aspect: f32,
}

impl CameraDesc {
    #[must_use]
    pub fn perspective(transform: Mat4, fov_y: f32, aspect: f32) -> Self {
        Self {
            transform,
            projection: Projection::Perspective { fov_y },
            near: 0.1,
            far: 10_000.0,
            focal_distance: None,
            aspect,
        }
    }

    /// Eye, target and up in backend units.
    #[must_use]
    pub fn look_at(&self, scale: f32) -> (Vec3, Vec3, Vec3) {
        let eye = self.transform.w_axis.truncate() * scale;
        let forward = -self.transform.z_axis.truncate().normalize_or(Vec3::NEG_Z);
        let up = self.transform.y_axis.truncate().normalize_or(Vec3::Y);
        let distance = self.focal_distance.map_or(1.0, |d| d * scale);
        (eye, eye + forward * distance, up)
    }

    /// Backend camera parameters in backend units.
    #[must_use]
    pub fn params(&self, scale: f32) -> CameraParams {
        let projection = match self.projection {
            Projection::Perspective { fov_y } => Projection::Perspective { fov_y },
            Projection::Orthographic { width } => Projection::Orthographic {
                width: width * scale,
            },
        };
        CameraParams {
            projection,
            near: self.near * scale,
            far: self.far * scale,
            focal_distance: self.focal_distance.map(|d| d * scale),
            aspect: self.aspect,
        }
    }
}

/// Creates the camera on first use and pushes `desc` onto it.
pub(crate) fn sync_camera(
    backend: &mut dyn SceneBackend,
    camera: &mut Option<CameraHandle>,
    desc: &CameraDesc,
    scale: f32,
) -> BackendResult<CameraHandle> {
    let handle = match *camera {
        Some(handle) => handle,
        None => {
            let handle = backend.create_camera()?;
            *camera = Some(handle);
            handle
        }
    };
    backend.set_camera_params(handle, &desc.params(scale))?;
    let (eye, target, up) = desc.look_at(scale);
    backend.look_at(handle, eye, target, up)?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_at_follows_local_negative_z() {
        let desc = CameraDesc::perspective(
            Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0)),
            1.0,
            1.5,
        );
        let (eye, target, up) = desc.look_at(0.5);
        assert_eq!(eye, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(target, Vec3::new(0.0, 0.0, 4.0));
        assert_eq!(up, Vec3::Y);
    }

    #[test]
    fn lengths_are_scaled() {
        let desc = CameraDesc {
            projection: Projection::Orthographic { width: 20.0 },
            focal_distance: Some(4.0),
            ..CameraDesc::perspective(Mat4::IDENTITY, 1.0, 1.0)
        };
        let params = desc.params(0.1);
        assert_eq!(params.projection, Projection::Orthographic { width: 2.0 });
        assert!((params.near - 0.01).abs() < 1e-6);
        assert_eq!(params.focal_distance, Some(0.4));
    }
}
