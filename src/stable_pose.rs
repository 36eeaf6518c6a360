//! Stable-pose catalog: filtered resting poses with sampling weights.
//!
//! A stable-pose estimation process (external to this crate) produces two
//! `.npy` artifacts per object: an `N x 4 x 4` array of resting transforms
//! sorted by descending probability, and a parallel length-`N` probability
//! array. The catalog drops entries below a probability threshold, truncates
//! to a maximum size, renormalizes the remainder to sum to 1, and serves
//! probability-weighted draws.
//!
//! Each retained pose also carries a rotational symmetry order: order `k`
//! means the object's appearance in that resting orientation repeats every
//! `2*pi/k` of yaw, so the randomizer constrains its yaw draw accordingly.
//! The order is assigned at catalog build time; the two quaternion scalar
//! values known to mark quarter-turn-symmetric orientations in the reference
//! data map to order 4, everything else to order 1.

use crate::{Error, Pose};
use glam::{Mat3, Quat, Vec3};
use ndarray::{Array1, Array3, ArrayView2};
use ndarray_npy::ReadNpyExt;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::f32::consts::TAU;
use std::fs::File;
use std::path::Path;

/// Quaternion scalar components observed on quarter-turn-symmetric resting
/// orientations in the reference stable-pose data.
pub const SYMMETRIC_SENTINEL_W: [f32; 2] = [-0.706636, 0.000685];

/// Symmetry order assigned to sentinel-matched poses.
pub const QUARTER_TURN_ORDER: u32 = 4;

const SENTINEL_TOLERANCE: f32 = 1e-6;

/// One physically stable resting orientation with its probability mass.
#[derive(Debug, Clone)]
pub struct StablePose {
    pub pose: Pose,
    /// Probability mass after renormalization; catalog entries sum to 1.
    pub probability: f64,
    /// Rotational symmetry order; yaw randomization spans `2*pi / order`.
    pub symmetry_order: u32,
}

impl StablePose {
    /// Width of the yaw interval this pose may be randomized over.
    pub fn yaw_range(&self) -> f32 {
        TAU / self.symmetry_order.max(1) as f32
    }
}

/// Symmetry order for a resting orientation, from its quaternion scalar.
pub fn classify_symmetry(rotation: Quat) -> u32 {
    if SYMMETRIC_SENTINEL_W
        .iter()
        .any(|&w| (rotation.w - w).abs() < SENTINEL_TOLERANCE)
    {
        QUARTER_TURN_ORDER
    } else {
        1
    }
}

/// Filtered, renormalized stable poses with a weighted sampler.
#[derive(Debug, Clone)]
pub struct StablePoseCatalog {
    poses: Vec<StablePose>,
    sampler: WeightedIndex<f64>,
}

impl StablePoseCatalog {
    /// Load `stable_poses.npy` and `stable_prob.npy` from an object's asset
    /// directory and build the filtered catalog.
    pub fn load<P: AsRef<Path>>(
        dir: P,
        min_prob: f64,
        max_poses: usize,
    ) -> Result<Self, Error> {
        let dir = dir.as_ref();
        let poses_path = dir.join("stable_poses.npy");
        let probs_path = dir.join("stable_prob.npy");
        if !poses_path.exists() {
            return Err(Error::AssetNotFound(poses_path));
        }
        if !probs_path.exists() {
            return Err(Error::AssetNotFound(probs_path));
        }

        let transforms = Array3::<f64>::read_npy(File::open(&poses_path)?)?;
        let probabilities = Array1::<f64>::read_npy(File::open(&probs_path)?)?;

        let shape = transforms.shape();
        if shape[1] != 4 || shape[2] != 4 {
            return Err(Error::StablePose(format!(
                "expected N x 4 x 4 transforms, got {:?}",
                shape
            )));
        }

        let poses: Vec<Pose> = transforms
            .outer_iter()
            .map(|m| pose_from_matrix(m.view()))
            .collect();

        Self::from_parts(poses, probabilities.to_vec(), min_prob, max_poses)
    }

    /// Build a catalog from already-decoded poses and probabilities.
    ///
    /// Inputs are assumed pre-sorted by descending probability, so dropping
    /// low-probability entries and truncating keeps the most likely resting
    /// orientations, with pose i matching probability i throughout.
    pub fn from_parts(
        poses: Vec<Pose>,
        probabilities: Vec<f64>,
        min_prob: f64,
        max_poses: usize,
    ) -> Result<Self, Error> {
        let kept: Vec<f64> = probabilities
            .into_iter()
            .filter(|p| *p > min_prob)
            .take(max_poses)
            .collect();

        if kept.is_empty() {
            return Err(Error::EmptyCatalog {
                min_prob,
                max_poses,
            });
        }
        if poses.len() < kept.len() {
            return Err(Error::StablePose(format!(
                "{} poses for {} retained probabilities",
                poses.len(),
                kept.len()
            )));
        }

        let total: f64 = kept.iter().sum();
        let poses: Vec<StablePose> = poses
            .into_iter()
            .take(kept.len())
            .zip(kept.iter())
            .map(|(pose, p)| StablePose {
                pose,
                probability: p / total,
                symmetry_order: classify_symmetry(pose.rotation),
            })
            .collect();

        let sampler = WeightedIndex::new(poses.iter().map(|p| p.probability))
            .map_err(|e| Error::StablePose(e.to_string()))?;

        Ok(Self { poses, sampler })
    }

    /// Draw a stable pose weighted by probability.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &StablePose {
        &self.poses[self.sampler.sample(rng)]
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn poses(&self) -> &[StablePose] {
        &self.poses
    }
}

/// Decompose a 4x4 row-major transform into position plus quaternion.
fn pose_from_matrix(m: ArrayView2<f64>) -> Pose {
    let position = Vec3::new(m[[0, 3]] as f32, m[[1, 3]] as f32, m[[2, 3]] as f32);
    let rot = Mat3::from_cols(
        Vec3::new(m[[0, 0]] as f32, m[[1, 0]] as f32, m[[2, 0]] as f32),
        Vec3::new(m[[0, 1]] as f32, m[[1, 1]] as f32, m[[2, 1]] as f32),
        Vec3::new(m[[0, 2]] as f32, m[[1, 2]] as f32, m[[2, 2]] as f32),
    );
    Pose::new(position, Quat::from_mat3(&rot).normalize())
}
