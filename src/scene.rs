//! Scene set: the parallel environments built once at startup.
//!
//! Each environment owns one object actor placed at a canonical stable pose
//! drawn from the catalog, and one camera sensor at the shared mount pose.
//! Environments are arranged on a square-ish grid purely for spatial layout.
//! The canonical pose is fixed for the run; only the object's dynamic state
//! is mutated afterwards, by the pose randomizer.

use crate::camera::{camera_extrinsic, CameraIntrinsics, CameraSensorProps};
use crate::config::SimulationConfig;
use crate::engine::{AssetOptions, EnvBounds, GroundPlane, SimEngine};
use crate::engine::{ActorHandle, CameraHandle, EnvHandle};
use crate::stable_pose::{StablePose, StablePoseCatalog};
use crate::{Error, Pose};
use glam::{Mat4, Quat};
use rand::Rng;
use tracing::info;

/// Segmentation id carried by object pixels; background/ground pixels are 0.
pub const OBJECT_SEG_ID: u32 = 1;

/// One simulated scene: object actor, camera sensor, canonical pose.
#[derive(Debug, Clone)]
pub struct EnvironmentInstance {
    pub env: EnvHandle,
    pub object: ActorHandle,
    pub camera: CameraHandle,
    /// The stable pose this environment represents, fixed for the run.
    pub canonical_pose: StablePose,
}

/// All environments of a run plus the shared camera geometry.
pub struct SceneSet {
    envs: Vec<EnvironmentInstance>,
    intrinsics: CameraIntrinsics,
    camera_mount: Pose,
    camera_extrinsic: Mat4,
}

impl SceneSet {
    /// Build `num_envs` environments: ground plane, object asset, one actor
    /// at a catalog-sampled canonical pose and one camera per environment.
    pub fn build<E: SimEngine, R: Rng + ?Sized>(
        engine: &mut E,
        config: &SimulationConfig,
        catalog: &StablePoseCatalog,
        rng: &mut R,
    ) -> Result<Self, Error> {
        engine.add_ground(&GroundPlane::default())?;

        let asset = engine.load_asset(
            &config.assets_root,
            &config.object_asset_file(),
            &AssetOptions::default(),
        )?;

        let intrinsics = CameraIntrinsics::from(&config.camera);
        let props = CameraSensorProps::from_intrinsics(&intrinsics, config.camera.far_plane);
        let mount = config.camera.mount.pose();
        let extrinsic = camera_extrinsic(&mount);

        let envs_per_row = (config.num_envs as f64).sqrt().ceil().max(1.0) as usize;
        info!(num_envs = config.num_envs, envs_per_row, "creating environments");

        let mut envs = Vec::with_capacity(config.num_envs);
        for idx in 0..config.num_envs {
            let env = engine.create_env(&EnvBounds::default(), envs_per_row)?;

            let canonical = catalog.sample(rng).clone();
            let object = engine.create_actor(
                env,
                asset,
                &canonical.pose,
                "object",
                idx as i32,
                OBJECT_SEG_ID,
            )?;

            let camera = engine.create_camera(env, &props)?;
            engine.set_camera_transform(env, camera, &mount)?;

            envs.push(EnvironmentInstance {
                env,
                object,
                camera,
                canonical_pose: canonical,
            });
        }

        Ok(Self {
            envs,
            intrinsics,
            camera_mount: mount,
            camera_extrinsic: extrinsic,
        })
    }

    pub fn envs(&self) -> &[EnvironmentInstance] {
        &self.envs
    }

    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// The shared camera mount pose (engine camera convention).
    pub fn camera_mount(&self) -> &Pose {
        &self.camera_mount
    }

    /// The fixed camera extrinsic in the pose-label frame, identical for
    /// every environment.
    pub fn camera_extrinsic(&self) -> Mat4 {
        self.camera_extrinsic
    }

    /// Draw the extrinsic axes in every environment, for visual inspection
    /// of the camera placement.
    pub fn visualize_camera_axes<E: SimEngine>(&self, engine: &mut E) -> Result<(), Error> {
        let pose = Pose::new(
            self.camera_mount.position,
            Quat::from_mat4(&self.camera_extrinsic),
        );
        for instance in &self.envs {
            engine.draw_axes(instance.env, &pose)?;
        }
        Ok(())
    }
}
