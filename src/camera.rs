//! Camera model: pinhole intrinsics and the fixed scene extrinsic.
//!
//! Image resolution and field of view are derived from the intrinsics under a
//! rectilinear pinhole model: the principal point is assumed centered, so the
//! sensor is `2*cx` by `2*cy` pixels, and the horizontal field of view spans
//! the full sensor width relative to the focal length.
//!
//! The engine expresses camera orientation with the optical axis along local
//! +x, +y left, +z down. Pose labels live in a conventional world frame, so
//! the extrinsic is the mount rotation right-multiplied by a fixed
//! axis-permutation (camera x -> scene z, camera y -> -scene x,
//! camera z -> -scene y). All environments share one mount pose, so the
//! extrinsic is computed once per run.

use crate::config::CameraConfig;
use crate::Pose;
use glam::{Mat3, Mat4, Vec3};
use ndarray::{arr2, Array2};

/// Pinhole projection parameters in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Image width in pixels (`2 * cx`).
    pub fn width(&self) -> u32 {
        (self.cx * 2.0) as u32
    }

    /// Image height in pixels (`2 * cy`).
    pub fn height(&self) -> u32 {
        (self.cy * 2.0) as u32
    }

    /// Horizontal field of view in degrees: `2 * atan2(cx, fx)`.
    pub fn horizontal_fov_deg(&self) -> f64 {
        2.0 * self.cx.atan2(self.fx).to_degrees()
    }

    /// The 3x3 camera matrix `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn camera_matrix(&self) -> Array2<f64> {
        arr2(&[
            [self.fx, 0.0, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ])
    }
}

impl From<&CameraConfig> for CameraIntrinsics {
    fn from(cfg: &CameraConfig) -> Self {
        Self::new(cfg.fx, cfg.fy, cfg.cx, cfg.cy)
    }
}

/// Sensor properties handed to the engine when creating a camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSensorProps {
    pub width: u32,
    pub height: u32,
    pub horizontal_fov_deg: f32,
    pub far_plane: f32,
}

impl CameraSensorProps {
    pub fn from_intrinsics(intrinsics: &CameraIntrinsics, far_plane: f32) -> Self {
        Self {
            width: intrinsics.width(),
            height: intrinsics.height(),
            horizontal_fov_deg: intrinsics.horizontal_fov_deg() as f32,
            far_plane,
        }
    }
}

/// Axis permutation from the camera frame (x optical, y left, z down) to the
/// scene frame, as columns: row-major `[[0,0,1],[-1,0,0],[0,-1,0]]`.
pub const AXIS_CORRECTION: Mat3 = Mat3::from_cols(
    Vec3::new(0.0, -1.0, 0.0),
    Vec3::new(0.0, 0.0, -1.0),
    Vec3::new(1.0, 0.0, 0.0),
);

/// Fixed 4x4 extrinsic mapping camera-local axes into the scene frame used
/// for pose labels.
pub fn camera_extrinsic(mount: &Pose) -> Mat4 {
    let rot = Mat3::from_quat(mount.rotation) * AXIS_CORRECTION;
    Mat4::from_cols(
        rot.x_axis.extend(0.0),
        rot.y_axis.extend(0.0),
        rot.z_axis.extend(0.0),
        mount.position.extend(1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn test_resolution_and_fov_roundtrip() {
        let intr = CameraIntrinsics::new(1000.0, 1000.0, 320.0, 240.0);
        assert_eq!(intr.width(), 640);
        assert_eq!(intr.height(), 480);

        let expected = 2.0 * (320.0f64).atan2(1000.0).to_degrees();
        assert!((intr.horizontal_fov_deg() - expected).abs() < 1e-9);
        // ~35.49 degrees for this sensor
        assert!((intr.horizontal_fov_deg() - 35.489).abs() < 0.01);
    }

    #[test]
    fn test_camera_matrix_layout() {
        let intr = CameraIntrinsics::new(1780.0, 1790.0, 972.0, 600.0);
        let k = intr.camera_matrix();
        assert_eq!(k.shape(), &[3, 3]);
        assert_eq!(k[[0, 0]], 1780.0);
        assert_eq!(k[[1, 1]], 1790.0);
        assert_eq!(k[[0, 2]], 972.0);
        assert_eq!(k[[1, 2]], 600.0);
        assert_eq!(k[[2, 2]], 1.0);
        assert_eq!(k[[1, 0]], 0.0);
    }

    #[test]
    fn test_sensor_props_from_intrinsics() {
        let intr = CameraIntrinsics::new(1000.0, 1000.0, 320.0, 240.0);
        let props = CameraSensorProps::from_intrinsics(&intr, 1.0);
        assert_eq!(props.width, 640);
        assert_eq!(props.height, 480);
        assert_eq!(props.far_plane, 1.0);
        assert!((props.horizontal_fov_deg - 35.489).abs() < 0.01);
    }

    #[test]
    fn test_axis_correction_entries() {
        // Row-major [[0,0,1],[-1,0,0],[0,-1,0]]
        let m = AXIS_CORRECTION;
        assert_eq!(m.row(0), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(m.row(1), Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(m.row(2), Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_extrinsic_identity_mount() {
        let mount = Pose::new(Vec3::new(0.0, 0.16, 0.7), Quat::IDENTITY);
        let extr = camera_extrinsic(&mount);

        // Rotation block equals the bare axis correction.
        let rot = Mat3::from_mat4(extr);
        assert!((rot.x_axis - AXIS_CORRECTION.x_axis).length() < 1e-6);
        assert!((rot.y_axis - AXIS_CORRECTION.y_axis).length() < 1e-6);
        assert!((rot.z_axis - AXIS_CORRECTION.z_axis).length() < 1e-6);

        // Translation column carries the mount position.
        let t = extr.w_axis;
        assert!((t.truncate() - Vec3::new(0.0, 0.16, 0.7)).length() < 1e-6);
        assert_eq!(t.w, 1.0);
    }

    #[test]
    fn test_extrinsic_maps_scene_z_to_optical_axis() {
        // After correction, the scene-frame +z column must be the camera's
        // optical axis (+x in the mount frame) for any mount rotation.
        let mount = Pose::new(
            Vec3::ZERO,
            Quat::from_euler(glam::EulerRot::ZYX, 1.3, -0.4, 0.2),
        );
        let extr = camera_extrinsic(&mount);
        let scene_z = Mat3::from_mat4(extr) * Vec3::Z;
        let optical = mount.rotation * Vec3::X;
        assert!((scene_z - optical).length() < 1e-5);
    }
}
