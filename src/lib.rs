//! pose-datagen: labeled synthetic depth datasets for 6-DoF pose estimation
//!
//! This library places a rigid object into randomized, physically-plausible
//! resting poses inside many parallel simulated scenes and captures each scene
//! with a fixed virtual depth camera. Every iteration yields one sample per
//! environment: a depth image, a boolean object mask, and the ground-truth
//! object pose as a 7-element vector.
//!
//! The physics/rendering engine is an external collaborator behind the narrow
//! [`SimEngine`] trait. The crate ships [`SyntheticEngine`], an analytic
//! backend used for tests and smoke runs without a GPU or physics stack.
//!
//! # Usage
//!
//! ```ignore
//! use pose_datagen::{DatasetGenerator, GenConfig, SimParams, SyntheticEngine};
//!
//! let config = GenConfig::load("cfg/config.yaml")?;
//! let engine = SyntheticEngine::new(SimParams::from_config(&config.simulation));
//!
//! // save_results = true, viewer = false (headless)
//! let mut generator = DatasetGenerator::new(engine, config, true, false)?;
//! generator.run()?;
//! ```
//!
//! Each run writes, per object, a dataset directory containing a `config.yaml`
//! snapshot and a `data/` subdirectory with `image_<idx>.npy`,
//! `mask_<idx>.npy`, and `pose_<idx>.npy` per sample, where `<idx>` is the
//! zero-padded global sample index `iteration * num_envs + env`.

use glam::{Quat, Vec3};
use std::path::PathBuf;
use thiserror::Error;

pub mod camera;
pub mod capture;
pub mod config;
pub mod driver;
pub mod engine;
pub mod fixtures;
pub mod randomizer;
pub mod scene;
pub mod stable_pose;

pub use camera::{CameraIntrinsics, CameraSensorProps};
pub use capture::{Sample, SampleWriter};
pub use config::{CameraConfig, GenConfig, MountConfig, SimulationConfig};
pub use driver::DatasetGenerator;
pub use engine::{
    ActorHandle, AssetHandle, AssetOptions, CameraHandle, EnvBounds, EnvHandle, GroundPlane,
    SimEngine, SimParams,
};
pub use fixtures::SyntheticEngine;
pub use randomizer::PoseRandomizer;
pub use scene::{EnvironmentInstance, SceneSet, OBJECT_SEG_ID};
pub use stable_pose::{StablePose, StablePoseCatalog};

/// A rigid transform: position plus unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Serializable pose layout: `[px, py, pz, qx, qy, qz, qw]`.
    pub fn to_vector(&self) -> [f32; 7] {
        [
            self.position.x,
            self.position.y,
            self.position.z,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
            self.rotation.w,
        ]
    }

    pub fn from_vector(v: [f32; 7]) -> Self {
        Self {
            position: Vec3::new(v[0], v[1], v[2]),
            rotation: Quat::from_xyzw(v[3], v[4], v[5], v[6]),
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Errors from dataset generation.
///
/// Configuration and asset errors abort before any environment is created;
/// engine and export errors abort the current run. The iteration driver does
/// not attempt recovery from any of these.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("asset not found: {}", .0.display())]
    AssetNotFound(PathBuf),

    #[error(
        "stable pose catalog is empty after filtering \
         (min_stable_pose_prob={min_prob}, max_num_stable_pose={max_poses})"
    )]
    EmptyCatalog { min_prob: f64, max_poses: usize },

    #[error("invalid stable pose data: {0}")]
    StablePose(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read npy artifact: {0}")]
    NpyRead(#[from] ndarray_npy::ReadNpyError),

    #[error("failed to write npy artifact: {0}")]
    NpyWrite(#[from] ndarray_npy::WriteNpyError),
}
