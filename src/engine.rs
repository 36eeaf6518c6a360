//! The simulation/rendering engine boundary.
//!
//! The generation pipeline depends only on this narrow contract: environment
//! and actor/sensor creation, rigid transform and velocity mutation, one
//! blocking simulate+render step, and per-camera buffer readback. Any engine
//! that can satisfy it plugs in without touching the rest of the crate; the
//! in-tree [`crate::fixtures::SyntheticEngine`] is the reference
//! implementation for tests.
//!
//! Depth buffers cross this boundary in the engine's native convention:
//! negative range along the optical axis. Capture negates them.

use crate::camera::CameraSensorProps;
use crate::config::SimulationConfig;
use crate::{Error, Pose};
use glam::Vec3;
use ndarray::Array2;
use std::path::Path;

/// Handle to one simulated environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvHandle(pub usize);

/// Handle to an actor within an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorHandle(pub usize);

/// Handle to a camera sensor within an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraHandle(pub usize);

/// Handle to a loaded asset, shared across environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetHandle(pub usize);

/// Engine-level simulation parameters, consumed once at engine construction.
#[derive(Debug, Clone)]
pub struct SimParams {
    pub dt: f64,
    pub substeps: u32,
    pub num_threads: u32,
    pub use_gpu: bool,
    pub compute_device_id: i32,
    pub graphics_device_id: i32,
    /// World gravity; the randomizer disables it per object anyway so the
    /// commanded pose holds during imaging.
    pub gravity: Vec3,
}

impl SimParams {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            dt: config.dt,
            substeps: config.substeps,
            num_threads: config.num_threads,
            use_gpu: config.use_gpu,
            compute_device_id: config.compute_device_id,
            graphics_device_id: config.graphics_device_id,
            gravity: Vec3::new(0.0, 0.0, -9.81),
        }
    }
}

impl Default for SimParams {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

/// Static ground plane parameters.
#[derive(Debug, Clone, Copy)]
pub struct GroundPlane {
    pub normal: Vec3,
    pub distance: f32,
    pub static_friction: f32,
    pub dynamic_friction: f32,
    pub restitution: f32,
}

impl Default for GroundPlane {
    fn default() -> Self {
        Self {
            normal: Vec3::Z,
            distance: 0.0,
            static_friction: 0.3,
            dynamic_friction: 0.15,
            restitution: 0.0,
        }
    }
}

/// Asset loading options forwarded to the engine's importer.
#[derive(Debug, Clone, Copy)]
pub struct AssetOptions {
    pub fix_base_link: bool,
    pub armature: f32,
    pub thickness: f32,
    pub override_inertia: bool,
    pub convex_decomposition: ConvexDecomposition,
}

/// V-HACD convex decomposition parameters.
#[derive(Debug, Clone, Copy)]
pub struct ConvexDecomposition {
    pub resolution: u32,
    pub max_convex_hulls: u32,
    pub max_vertices_per_hull: u32,
}

impl Default for AssetOptions {
    fn default() -> Self {
        Self {
            fix_base_link: false,
            armature: 0.001,
            thickness: 0.001,
            override_inertia: true,
            convex_decomposition: ConvexDecomposition {
                resolution: 300_000,
                max_convex_hulls: 50,
                max_vertices_per_hull: 1000,
            },
        }
    }
}

/// Spatial bounds of one environment cell in the grid layout.
#[derive(Debug, Clone, Copy)]
pub struct EnvBounds {
    pub lower: Vec3,
    pub upper: Vec3,
}

impl Default for EnvBounds {
    fn default() -> Self {
        Self {
            lower: Vec3::new(-0.1, -0.1, 0.0),
            upper: Vec3::new(0.1, 0.1, 0.002),
        }
    }
}

/// Narrow contract every physics/rendering backend must satisfy.
///
/// All calls are synchronous; [`SimEngine::step`] blocks until simulation and
/// rendering for every environment have completed, after which camera buffers
/// for the frame may be fetched.
pub trait SimEngine {
    /// Add the static ground plane to the simulation.
    fn add_ground(&mut self, plane: &GroundPlane) -> Result<(), Error>;

    /// Load an object asset; `file` is relative to `root`.
    fn load_asset(
        &mut self,
        root: &Path,
        file: &Path,
        options: &AssetOptions,
    ) -> Result<AssetHandle, Error>;

    /// Create one environment cell in a grid with `envs_per_row` columns.
    fn create_env(&mut self, bounds: &EnvBounds, envs_per_row: usize) -> Result<EnvHandle, Error>;

    /// Instantiate an actor from a loaded asset.
    fn create_actor(
        &mut self,
        env: EnvHandle,
        asset: AssetHandle,
        pose: &Pose,
        name: &str,
        collision_group: i32,
        segmentation_id: u32,
    ) -> Result<ActorHandle, Error>;

    /// Create a camera sensor in an environment.
    fn create_camera(
        &mut self,
        env: EnvHandle,
        props: &CameraSensorProps,
    ) -> Result<CameraHandle, Error>;

    /// Set a camera's mount transform within its environment.
    fn set_camera_transform(
        &mut self,
        env: EnvHandle,
        camera: CameraHandle,
        pose: &Pose,
    ) -> Result<(), Error>;

    /// Open an interactive viewer looking from `eye` toward `target`.
    /// Failure is fatal when a viewer was requested.
    fn create_viewer(&mut self, eye: Vec3, target: Vec3) -> Result<(), Error>;

    /// Write an actor's rigid-body transform.
    fn set_rigid_transform(
        &mut self,
        env: EnvHandle,
        actor: ActorHandle,
        pose: &Pose,
    ) -> Result<(), Error>;

    /// Write an actor's linear and angular velocity.
    fn set_rigid_velocity(
        &mut self,
        env: EnvHandle,
        actor: ActorHandle,
        linear: Vec3,
        angular: Vec3,
    ) -> Result<(), Error>;

    /// Enable or disable gravity for one actor.
    fn set_gravity_enabled(
        &mut self,
        env: EnvHandle,
        actor: ActorHandle,
        enabled: bool,
    ) -> Result<(), Error>;

    /// Advance the simulation one step and render all camera sensors.
    fn step(&mut self) -> Result<(), Error>;

    /// Fetch a camera's depth buffer for the last rendered frame, in the
    /// engine's negative-range convention, shaped `(height, width)`.
    fn depth_image(&mut self, env: EnvHandle, camera: CameraHandle)
        -> Result<Array2<f32>, Error>;

    /// Fetch a camera's segmentation buffer for the last rendered frame;
    /// pixels carry the actor's segmentation id, background is 0.
    fn segmentation_image(
        &mut self,
        env: EnvHandle,
        camera: CameraHandle,
    ) -> Result<Array2<u32>, Error>;

    /// Draw debug axes for a transform, if visualization is active.
    fn draw_axes(&mut self, env: EnvHandle, pose: &Pose) -> Result<(), Error>;

    /// Clear debug lines accumulated since the last call.
    fn clear_debug_lines(&mut self);
}
