//! Frame capture and sample export.
//!
//! After the engine has stepped, each environment's camera yields a depth
//! buffer and a segmentation buffer. Depth arrives in the engine's
//! negative-range convention and is negated so stored values are positive
//! distances; segmentation is reduced to a boolean object mask (only one
//! object exists per environment, so per-instance ids carry no information
//! at this stage).
//!
//! Samples are persisted as three `.npy` artifacts named by role and a
//! zero-padded global index: `image_<idx>.npy`, `mask_<idx>.npy`,
//! `pose_<idx>.npy` under the dataset's `data/` directory. A sample's three
//! artifacts are written atomically: all land under temporary names first
//! and are renamed together, so a failed write never leaves a mismatched
//! depth/mask/pose triple behind.

use crate::engine::SimEngine;
use crate::scene::SceneSet;
use crate::{Error, Pose};
use ndarray::{Array1, Array2};
use ndarray_npy::WriteNpyExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

/// One exported training sample.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Depth image in meters, positive range, shaped `(height, width)`.
    pub depth: Array2<f32>,
    /// Object mask: true where the pixel belongs to the tagged object.
    pub mask: Array2<bool>,
    /// Object pose as `[px, py, pz, qx, qy, qz, qw]`.
    pub pose: [f32; 7],
}

/// Negate an engine depth buffer into positive distances.
pub fn positive_depth(raw: &Array2<f32>) -> Array2<f32> {
    raw.mapv(|d| -d)
}

/// Reduce a segmentation buffer to an object/background mask.
pub fn object_mask(segmentation: &Array2<u32>) -> Array2<bool> {
    segmentation.mapv(|id| id != 0)
}

/// Read back all camera buffers for the last rendered frame and pair them
/// with the poses composed this iteration.
pub fn capture_samples<E: SimEngine>(
    engine: &mut E,
    scene: &SceneSet,
    poses: &[Pose],
) -> Result<Vec<Sample>, Error> {
    let mut samples = Vec::with_capacity(scene.num_envs());
    for (instance, pose) in scene.envs().iter().zip(poses) {
        let raw = engine.depth_image(instance.env, instance.camera)?;
        let segmentation = engine.segmentation_image(instance.env, instance.camera)?;
        samples.push(Sample {
            depth: positive_depth(&raw),
            mask: object_mask(&segmentation),
            pose: pose.to_vector(),
        });
    }
    Ok(samples)
}

/// Writes samples into a dataset's `data/` directory.
pub struct SampleWriter {
    data_dir: PathBuf,
    padding: usize,
    num_envs: usize,
}

impl SampleWriter {
    /// Create the writer and the `data/` subdirectory under `dataset_dir`.
    pub fn create(dataset_dir: &Path, padding: usize, num_envs: usize) -> Result<Self, Error> {
        let data_dir = dataset_dir.join("data");
        fs::create_dir_all(&data_dir)?;
        info!(dir = %data_dir.display(), "writing samples");
        Ok(Self {
            data_dir,
            padding,
            num_envs,
        })
    }

    /// Path of one artifact: `<data>/<role>_<zero-padded index>.npy`.
    pub fn artifact_path(&self, role: &str, index: usize) -> PathBuf {
        self.data_dir
            .join(format!("{}_{:0width$}.npy", role, index, width = self.padding))
    }

    /// Persist one iteration's samples; environment `e` of iteration `n`
    /// receives global index `n * num_envs + e`.
    pub fn write_iteration(&self, iteration: usize, samples: &[Sample]) -> Result<(), Error> {
        for (env_idx, sample) in samples.iter().enumerate() {
            self.write_sample(iteration * self.num_envs + env_idx, sample)?;
        }
        Ok(())
    }

    /// Write one sample's three artifacts atomically.
    pub fn write_sample(&self, index: usize, sample: &Sample) -> Result<(), Error> {
        let finals = [
            self.artifact_path("image", index),
            self.artifact_path("mask", index),
            self.artifact_path("pose", index),
        ];
        let temps: Vec<PathBuf> = finals.iter().map(|p| tmp_path(p)).collect();

        let pose = Array1::from(sample.pose.to_vec());
        let written = (|| -> Result<(), Error> {
            sample.depth.write_npy(File::create(&temps[0])?)?;
            sample.mask.write_npy(File::create(&temps[1])?)?;
            pose.write_npy(File::create(&temps[2])?)?;
            Ok(())
        })();

        if let Err(err) = written {
            remove_all(&temps);
            return Err(err);
        }

        for (i, (tmp, path)) in temps.iter().zip(finals.iter()).enumerate() {
            if let Err(err) = fs::rename(tmp, path) {
                // Roll back so no partial triple survives.
                remove_all(&finals[..i]);
                remove_all(&temps[i..]);
                return Err(err.into());
            }
        }
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

fn remove_all<P: AsRef<Path>>(paths: &[P]) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}
