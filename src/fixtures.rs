//! Synthetic engine backend for testing without a GPU or physics stack.
//!
//! [`SyntheticEngine`] implements the full [`SimEngine`] contract with
//! analytic raycasting instead of real simulation and rendering: per-pixel
//! camera rays (optical axis +x, +y left, +z down) are intersected with the
//! ground plane z = 0 and with a bounding sphere centered at each object's
//! position. Depth is returned in the engine convention (negative range
//! along the optical axis); sphere hits carry the actor's segmentation id.
//!
//! There are no dynamics: transforms hold exactly as commanded, which is
//! also what the capture pipeline requires of a real engine (velocities
//! zeroed, gravity disabled). The backend is deterministic and pure CPU,
//! so the whole pipeline can run in CI and in unit tests.

use crate::camera::CameraSensorProps;
use crate::engine::{
    ActorHandle, AssetHandle, AssetOptions, CameraHandle, EnvBounds, EnvHandle, GroundPlane,
    SimEngine, SimParams,
};
use crate::{Error, Pose};
use glam::Vec3;
use ndarray::Array2;
use std::path::{Path, PathBuf};

const DEFAULT_OBJECT_RADIUS: f32 = 0.05;

#[derive(Debug, Clone)]
struct ActorState {
    pose: Pose,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    gravity_enabled: bool,
    segmentation_id: u32,
}

#[derive(Debug, Clone)]
struct CameraState {
    props: CameraSensorProps,
    transform: Pose,
}

#[derive(Debug, Clone, Default)]
struct EnvState {
    actors: Vec<ActorState>,
    cameras: Vec<CameraState>,
}

/// Analytic in-memory engine backend.
pub struct SyntheticEngine {
    #[allow(dead_code)]
    params: SimParams,
    object_radius: f32,
    envs: Vec<EnvState>,
    assets: Vec<PathBuf>,
    envs_per_row: Option<usize>,
    has_ground: bool,
    viewer_open: bool,
    viewer_unavailable: bool,
    debug_lines: usize,
    stepped: bool,
}

impl SyntheticEngine {
    pub fn new(params: SimParams) -> Self {
        Self {
            params,
            object_radius: DEFAULT_OBJECT_RADIUS,
            envs: Vec::new(),
            assets: Vec::new(),
            envs_per_row: None,
            has_ground: false,
            viewer_open: false,
            viewer_unavailable: false,
            debug_lines: 0,
            stepped: false,
        }
    }

    /// Radius of the bounding sphere standing in for the object mesh.
    pub fn with_object_radius(mut self, radius: f32) -> Self {
        self.object_radius = radius;
        self
    }

    /// Make subsequent viewer creation fail, to exercise the fatal path.
    pub fn refuse_viewer(&mut self) {
        self.viewer_unavailable = true;
    }

    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }

    pub fn envs_per_row(&self) -> Option<usize> {
        self.envs_per_row
    }

    pub fn viewer_open(&self) -> bool {
        self.viewer_open
    }

    pub fn debug_line_count(&self) -> usize {
        self.debug_lines
    }

    pub fn object_pose(&self, env: EnvHandle, actor: ActorHandle) -> Option<Pose> {
        self.actor(env, actor).map(|a| a.pose)
    }

    pub fn object_velocity(&self, env: EnvHandle, actor: ActorHandle) -> Option<(Vec3, Vec3)> {
        self.actor(env, actor)
            .map(|a| (a.linear_velocity, a.angular_velocity))
    }

    pub fn gravity_enabled(&self, env: EnvHandle, actor: ActorHandle) -> Option<bool> {
        self.actor(env, actor).map(|a| a.gravity_enabled)
    }

    pub fn segmentation_id(&self, env: EnvHandle, actor: ActorHandle) -> Option<u32> {
        self.actor(env, actor).map(|a| a.segmentation_id)
    }

    pub fn camera_transform(&self, env: EnvHandle, camera: CameraHandle) -> Option<Pose> {
        self.envs
            .get(env.0)
            .and_then(|e| e.cameras.get(camera.0))
            .map(|c| c.transform)
    }

    fn actor(&self, env: EnvHandle, actor: ActorHandle) -> Option<&ActorState> {
        self.envs.get(env.0).and_then(|e| e.actors.get(actor.0))
    }

    fn actor_mut(&mut self, env: EnvHandle, actor: ActorHandle) -> Result<&mut ActorState, Error> {
        self.envs
            .get_mut(env.0)
            .and_then(|e| e.actors.get_mut(actor.0))
            .ok_or_else(|| Error::Engine(format!("unknown actor {:?} in env {:?}", actor, env)))
    }

    /// Raycast one camera: returns the engine-convention depth buffer and
    /// the segmentation buffer, shaped `(height, width)`.
    fn render(&self, env: EnvHandle, camera: CameraHandle) -> Result<(Array2<f32>, Array2<u32>), Error> {
        if !self.stepped {
            return Err(Error::Engine(
                "camera buffers requested before the first step".to_string(),
            ));
        }
        let env_state = self
            .envs
            .get(env.0)
            .ok_or_else(|| Error::Engine(format!("unknown env {:?}", env)))?;
        let cam = env_state
            .cameras
            .get(camera.0)
            .ok_or_else(|| Error::Engine(format!("unknown camera {:?} in env {:?}", camera, env)))?;

        let width = cam.props.width as usize;
        let height = cam.props.height as usize;
        let cx = cam.props.width as f32 / 2.0;
        let cy = cam.props.height as f32 / 2.0;
        // Square pixels: focal length from the horizontal field of view.
        let focal = cx / (cam.props.horizontal_fov_deg.to_radians() / 2.0).tan();
        let far = cam.props.far_plane;

        let origin = cam.transform.position;
        let mut depth = Array2::from_elem((height, width), -far);
        let mut segmentation = Array2::zeros((height, width));

        for v in 0..height {
            for u in 0..width {
                // Camera frame: +x optical axis, +y left, +z down.
                let dir_cam = Vec3::new(
                    1.0,
                    (cx - u as f32) / focal,
                    (v as f32 - cy) / focal,
                )
                .normalize();
                let dir = cam.transform.rotation * dir_cam;

                let mut nearest: Option<(f32, u32)> = None;

                if self.has_ground && dir.z < -1e-6 {
                    let t = -origin.z / dir.z;
                    if t > 0.0 {
                        nearest = Some((t, 0));
                    }
                }

                for actor in &env_state.actors {
                    if let Some(t) = ray_sphere(origin, dir, actor.pose.position, self.object_radius)
                    {
                        if nearest.map_or(true, |(best, _)| t < best) {
                            nearest = Some((t, actor.segmentation_id));
                        }
                    }
                }

                if let Some((t, id)) = nearest {
                    let axial = t * dir_cam.x;
                    if axial <= far {
                        depth[[v, u]] = -axial;
                        segmentation[[v, u]] = id;
                    }
                }
            }
        }

        Ok((depth, segmentation))
    }
}

/// Nearest positive ray/sphere intersection parameter, if any.
fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let b = oc.dot(dir);
    let discriminant = b * b - (oc.length_squared() - radius * radius);
    if discriminant < 0.0 {
        return None;
    }
    let t = -b - discriminant.sqrt();
    (t > 0.0).then_some(t)
}

impl SimEngine for SyntheticEngine {
    fn add_ground(&mut self, _plane: &GroundPlane) -> Result<(), Error> {
        self.has_ground = true;
        Ok(())
    }

    fn load_asset(
        &mut self,
        root: &Path,
        file: &Path,
        _options: &AssetOptions,
    ) -> Result<AssetHandle, Error> {
        // The analytic backend renders a bounding sphere, so the mesh file is
        // recorded but never opened.
        self.assets.push(root.join(file));
        Ok(AssetHandle(self.assets.len() - 1))
    }

    fn create_env(&mut self, _bounds: &EnvBounds, envs_per_row: usize) -> Result<EnvHandle, Error> {
        self.envs_per_row = Some(envs_per_row);
        self.envs.push(EnvState::default());
        Ok(EnvHandle(self.envs.len() - 1))
    }

    fn create_actor(
        &mut self,
        env: EnvHandle,
        asset: AssetHandle,
        pose: &Pose,
        _name: &str,
        _collision_group: i32,
        segmentation_id: u32,
    ) -> Result<ActorHandle, Error> {
        if asset.0 >= self.assets.len() {
            return Err(Error::Engine(format!("unknown asset {:?}", asset)));
        }
        let env_state = self
            .envs
            .get_mut(env.0)
            .ok_or_else(|| Error::Engine(format!("unknown env {:?}", env)))?;
        env_state.actors.push(ActorState {
            pose: *pose,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            gravity_enabled: true,
            segmentation_id,
        });
        Ok(ActorHandle(env_state.actors.len() - 1))
    }

    fn create_camera(
        &mut self,
        env: EnvHandle,
        props: &CameraSensorProps,
    ) -> Result<CameraHandle, Error> {
        let env_state = self
            .envs
            .get_mut(env.0)
            .ok_or_else(|| Error::Engine(format!("unknown env {:?}", env)))?;
        env_state.cameras.push(CameraState {
            props: *props,
            transform: Pose::IDENTITY,
        });
        Ok(CameraHandle(env_state.cameras.len() - 1))
    }

    fn set_camera_transform(
        &mut self,
        env: EnvHandle,
        camera: CameraHandle,
        pose: &Pose,
    ) -> Result<(), Error> {
        let cam = self
            .envs
            .get_mut(env.0)
            .and_then(|e| e.cameras.get_mut(camera.0))
            .ok_or_else(|| Error::Engine(format!("unknown camera {:?} in env {:?}", camera, env)))?;
        cam.transform = *pose;
        Ok(())
    }

    fn create_viewer(&mut self, _eye: Vec3, _target: Vec3) -> Result<(), Error> {
        if self.viewer_unavailable {
            return Err(Error::Engine("failed to create viewer".to_string()));
        }
        self.viewer_open = true;
        Ok(())
    }

    fn set_rigid_transform(
        &mut self,
        env: EnvHandle,
        actor: ActorHandle,
        pose: &Pose,
    ) -> Result<(), Error> {
        self.actor_mut(env, actor)?.pose = *pose;
        Ok(())
    }

    fn set_rigid_velocity(
        &mut self,
        env: EnvHandle,
        actor: ActorHandle,
        linear: Vec3,
        angular: Vec3,
    ) -> Result<(), Error> {
        let state = self.actor_mut(env, actor)?;
        state.linear_velocity = linear;
        state.angular_velocity = angular;
        Ok(())
    }

    fn set_gravity_enabled(
        &mut self,
        env: EnvHandle,
        actor: ActorHandle,
        enabled: bool,
    ) -> Result<(), Error> {
        self.actor_mut(env, actor)?.gravity_enabled = enabled;
        Ok(())
    }

    fn step(&mut self) -> Result<(), Error> {
        // No dynamics: commanded transforms hold exactly.
        self.stepped = true;
        Ok(())
    }

    fn depth_image(
        &mut self,
        env: EnvHandle,
        camera: CameraHandle,
    ) -> Result<Array2<f32>, Error> {
        Ok(self.render(env, camera)?.0)
    }

    fn segmentation_image(
        &mut self,
        env: EnvHandle,
        camera: CameraHandle,
    ) -> Result<Array2<u32>, Error> {
        Ok(self.render(env, camera)?.1)
    }

    fn draw_axes(&mut self, _env: EnvHandle, _pose: &Pose) -> Result<(), Error> {
        self.debug_lines += 3;
        Ok(())
    }

    fn clear_debug_lines(&mut self) {
        self.debug_lines = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{EulerRot, Quat};

    /// 64x64 camera one meter above the origin, optical axis straight down.
    fn downward_camera_engine() -> (SyntheticEngine, EnvHandle, CameraHandle, AssetHandle) {
        let mut engine = SyntheticEngine::new(SimParams::default());
        engine.add_ground(&GroundPlane::default()).unwrap();
        let asset = engine
            .load_asset(Path::new("assets"), Path::new("obj/obj.urdf"), &AssetOptions::default())
            .unwrap();
        let env = engine.create_env(&EnvBounds::default(), 1).unwrap();

        let props = CameraSensorProps {
            width: 64,
            height: 64,
            horizontal_fov_deg: 60.0,
            far_plane: 2.0,
        };
        let camera = engine.create_camera(env, &props).unwrap();
        let mount = Pose::new(
            Vec3::new(0.0, 0.0, 1.0),
            Quat::from_euler(EulerRot::ZYX, 0.0, std::f32::consts::FRAC_PI_2, 0.0),
        );
        engine.set_camera_transform(env, camera, &mount).unwrap();
        (engine, env, camera, asset)
    }

    #[test]
    fn test_buffers_require_step() {
        let (mut engine, env, camera, _) = downward_camera_engine();
        assert!(engine.depth_image(env, camera).is_err());
        engine.step().unwrap();
        assert!(engine.depth_image(env, camera).is_ok());
    }

    #[test]
    fn test_ground_depth_is_negative_range() {
        let (mut engine, env, camera, _) = downward_camera_engine();
        engine.step().unwrap();
        let depth = engine.depth_image(env, camera).unwrap();
        assert_eq!(depth.shape(), &[64, 64]);

        // Center pixel looks straight down from one meter up.
        let center = depth[[32, 32]];
        assert!(center < 0.0, "engine depth must be negative range");
        assert!((center + 1.0).abs() < 0.01, "center depth {}", center);
    }

    #[test]
    fn test_object_sphere_appears_in_segmentation() {
        let (mut engine, env, camera, asset) = downward_camera_engine();
        let pose = Pose::new(Vec3::new(0.0, 0.0, 0.05), Quat::IDENTITY);
        engine
            .create_actor(env, asset, &pose, "object", 0, 7)
            .unwrap();
        engine.step().unwrap();

        let segmentation = engine.segmentation_image(env, camera).unwrap();
        let depth = engine.depth_image(env, camera).unwrap();

        // The sphere sits under the image center.
        assert_eq!(segmentation[[32, 32]], 7);
        // Sphere surface is nearer than the ground.
        assert!(depth[[32, 32]].abs() < 1.0);
        // Corners see only ground.
        assert_eq!(segmentation[[0, 0]], 0);

        let object_pixels = segmentation.iter().filter(|&&id| id != 0).count();
        assert!(object_pixels > 0);
        assert!(object_pixels < 64 * 64);
    }

    #[test]
    fn test_far_plane_limits_depth() {
        let mut engine = SyntheticEngine::new(SimParams::default());
        // No ground: every ray misses, so all depth sits at the far plane.
        let env = engine.create_env(&EnvBounds::default(), 1).unwrap();
        let props = CameraSensorProps {
            width: 8,
            height: 8,
            horizontal_fov_deg: 60.0,
            far_plane: 1.5,
        };
        let camera = engine.create_camera(env, &props).unwrap();
        engine.step().unwrap();
        let depth = engine.depth_image(env, camera).unwrap();
        assert!(depth.iter().all(|&d| d == -1.5));
    }

    #[test]
    fn test_viewer_refusal_is_an_error() {
        let mut engine = SyntheticEngine::new(SimParams::default());
        engine.refuse_viewer();
        let result = engine.create_viewer(Vec3::new(0.5, 0.5, 2.0), Vec3::new(0.5, 0.5, 0.0));
        assert!(matches!(result, Err(Error::Engine(_))));
        assert!(!engine.viewer_open());
    }

    #[test]
    fn test_ray_sphere_hit_and_miss() {
        let origin = Vec3::new(0.0, 0.0, 1.0);
        let down = Vec3::new(0.0, 0.0, -1.0);
        let t = ray_sphere(origin, down, Vec3::new(0.0, 0.0, 0.0), 0.1).unwrap();
        assert!((t - 0.9).abs() < 1e-6);
        assert!(ray_sphere(origin, down, Vec3::new(1.0, 0.0, 0.0), 0.1).is_none());
    }
}
