//! YAML configuration for a generation run.
//!
//! The document has a single `simulation` section carrying the engine
//! parameters, the iteration/environment counts, the target object and
//! dataset identifiers, the randomization and stable-pose filtering knobs,
//! and a nested `camera` section with the pinhole intrinsics and the fixed
//! camera mount pose. Every field is consumed exactly once at startup.
//!
//! A copy of the loaded document is written into the dataset directory as
//! `config.yaml` so a dataset always records the parameters that produced it.

use crate::{Error, Pose};
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenConfig {
    pub simulation: SimulationConfig,
}

/// Simulation and dataset-generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Physics time step in seconds.
    pub dt: f64,
    /// Physics substeps per step.
    pub substeps: u32,
    /// Solver thread count.
    pub num_threads: u32,
    /// Run the physics pipeline on the GPU.
    pub use_gpu: bool,
    pub compute_device_id: i32,
    pub graphics_device_id: i32,
    /// Number of parallel environments; each yields one sample per iteration.
    pub num_envs: usize,
    /// Number of iterations to run.
    pub num_iters: usize,
    /// Zero-padding width for sample indices in output filenames.
    pub file_zero_padding_num: usize,
    /// Object identifier, e.g. `obj_01`.
    pub target_object: String,
    /// Dataset identifier the object belongs to, e.g. `egad_eval`.
    pub target_dataset: String,
    /// Planar randomization range: x/y offsets are uniform over `[-R, R]`.
    pub object_rand_pose_range: f32,
    /// Stable poses below this probability are dropped from the catalog.
    pub min_stable_pose_prob: f64,
    /// At most this many stable poses are retained.
    pub max_num_stable_pose: usize,
    /// Root directory for object assets and stable-pose files.
    pub assets_root: PathBuf,
    /// Root directory that receives per-object dataset directories.
    pub output_root: PathBuf,
    pub camera: CameraConfig,
}

/// Pinhole camera intrinsics plus the fixed mount pose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// Far clipping plane in meters.
    pub far_plane: f32,
    pub mount: MountConfig,
}

/// Camera mount pose relative to each environment origin.
///
/// The orientation is expressed as intrinsic Z-Y-X Euler angles in degrees,
/// applied yaw, then pitch, then roll. In the resulting frame the camera's
/// local +x axis is the optical axis, +y points left, +z points down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountConfig {
    pub position: [f32; 3],
    pub roll_deg: f32,
    pub pitch_deg: f32,
    pub yaw_deg: f32,
}

impl MountConfig {
    /// Mount pose as a rigid transform.
    pub fn pose(&self) -> Pose {
        Pose::new(
            Vec3::from(self.position),
            Quat::from_euler(
                EulerRot::ZYX,
                self.yaw_deg.to_radians(),
                self.pitch_deg.to_radians(),
                self.roll_deg.to_radians(),
            ),
        )
    }
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.16, 0.7],
            roll_deg: 0.0,
            pitch_deg: 103.5,
            yaw_deg: 90.0,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        // Zivid Two at full resolution (1944 x 1200).
        Self {
            fx: 1780.0,
            fy: 1780.0,
            cx: 972.0,
            cy: 600.0,
            far_plane: 1.0,
            mount: MountConfig::default(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            substeps: 5,
            num_threads: 4,
            use_gpu: false,
            compute_device_id: 0,
            graphics_device_id: 0,
            num_envs: 64,
            num_iters: 100,
            file_zero_padding_num: 6,
            target_object: "obj".to_string(),
            target_dataset: "dataset".to_string(),
            object_rand_pose_range: 0.05,
            min_stable_pose_prob: 0.01,
            max_num_stable_pose: 10,
            assets_root: PathBuf::from("assets"),
            output_root: PathBuf::from("datasets"),
            camera: CameraConfig::default(),
        }
    }
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Object asset file relative to `assets_root`:
    /// `<dataset>/<object>/<object>.urdf`.
    pub fn object_asset_file(&self) -> PathBuf {
        PathBuf::from(&self.target_dataset)
            .join(&self.target_object)
            .join(format!("{}.urdf", self.target_object))
    }

    /// Directory holding `stable_poses.npy` and `stable_prob.npy`.
    pub fn stable_pose_dir(&self) -> PathBuf {
        self.assets_root
            .join(&self.target_dataset)
            .join(&self.target_object)
    }

    /// Per-object dataset directory under `output_root`.
    pub fn dataset_dir(&self) -> PathBuf {
        self.output_root.join(&self.target_object)
    }
}

impl GenConfig {
    /// Load a configuration document from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: GenConfig = serde_yaml::from_str(&contents)?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Write a snapshot of this configuration next to the generated data.
    pub fn snapshot<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let contents = serde_yaml::to_string(self)?;
        fs::write(path, contents)?;
        info!(path = %path.display(), "saved configuration snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_reference_run() {
        let sim = SimulationConfig::default();
        assert_eq!(sim.dt, 0.01);
        assert_eq!(sim.substeps, 5);
        assert_eq!(sim.file_zero_padding_num, 6);
        assert_eq!(sim.object_rand_pose_range, 0.05);
        assert_eq!(sim.camera.far_plane, 1.0);
        assert_eq!(sim.camera.mount.position, [0.0, 0.16, 0.7]);
        assert_eq!(sim.camera.mount.pitch_deg, 103.5);
        assert_eq!(sim.camera.mount.yaw_deg, 90.0);
    }

    #[test]
    fn test_asset_paths() {
        let mut sim = SimulationConfig::default();
        sim.target_dataset = "egad_eval".to_string();
        sim.target_object = "A0".to_string();
        assert_eq!(
            sim.object_asset_file(),
            PathBuf::from("egad_eval/A0/A0.urdf")
        );
        assert_eq!(sim.stable_pose_dir(), PathBuf::from("assets/egad_eval/A0"));
        assert_eq!(sim.dataset_dir(), PathBuf::from("datasets/A0"));
    }

    #[test]
    fn test_mount_pose_orientation() {
        // Pitch 90 about Y rotates the optical axis (+x) straight down.
        let mount = MountConfig {
            position: [0.0, 0.0, 1.0],
            roll_deg: 0.0,
            pitch_deg: 90.0,
            yaw_deg: 0.0,
        };
        let pose = mount.pose();
        let optical = pose.rotation * Vec3::X;
        assert!((optical - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = GenConfig::default();
        config.simulation.num_envs = 7;
        config.simulation.target_object = "mug".to_string();
        config.snapshot(&path).unwrap();

        let loaded = GenConfig::load(&path).unwrap();
        assert_eq!(loaded.simulation.num_envs, 7);
        assert_eq!(loaded.simulation.target_object, "mug");
        assert_eq!(loaded.simulation.camera.fx, config.simulation.camera.fx);
    }

    #[test]
    fn test_load_missing_file() {
        let result = GenConfig::load("/nonexistent/config.yaml");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "simulation: [not, a, mapping]").unwrap();
        assert!(matches!(GenConfig::load(&path), Err(Error::Yaml(_))));
    }
}
