//! Per-iteration pose randomization.
//!
//! Each iteration every environment's object receives a new world pose that
//! still represents its canonical stable orientation: a uniform planar offset
//! plus a yaw rotation applied on the left. The yaw draw is constrained by
//! the pose's rotational symmetry order so visually duplicate samples are not
//! generated for orientations whose appearance repeats under partial turns.
//!
//! The commanded pose must hold exactly during imaging, so the object's
//! velocities are zeroed and gravity is disabled for it after each write.

use crate::engine::SimEngine;
use crate::scene::SceneSet;
use crate::stable_pose::StablePose;
use crate::{Error, Pose};
use glam::{Quat, Vec3};
use rand::Rng;

/// Fixed vertical offset placing the object just above the ground plane.
pub const DROP_HEIGHT: f32 = 0.0021;

/// Draws randomized stable poses and writes them into the engine.
#[derive(Debug, Clone, Copy)]
pub struct PoseRandomizer {
    range: f32,
}

impl PoseRandomizer {
    /// `range` bounds the planar offset: x and y are uniform over
    /// `[-range, range)`.
    pub fn new(range: f32) -> Self {
        Self { range }
    }

    /// Compute and apply a new randomized pose for every environment.
    /// Returns the composed poses in environment order for export.
    pub fn randomize<E: SimEngine, R: Rng + ?Sized>(
        &self,
        engine: &mut E,
        scene: &SceneSet,
        rng: &mut R,
    ) -> Result<Vec<Pose>, Error> {
        let mut poses = Vec::with_capacity(scene.num_envs());

        for instance in scene.envs() {
            let offset = Vec3::new(
                self.sample_offset(rng),
                self.sample_offset(rng),
                DROP_HEIGHT,
            );
            let yaw = draw_yaw(&instance.canonical_pose, rng);
            let pose = compose_pose(&instance.canonical_pose.pose, Quat::from_rotation_z(yaw), offset);

            engine.set_rigid_transform(instance.env, instance.object, &pose)?;
            engine.set_rigid_velocity(instance.env, instance.object, Vec3::ZERO, Vec3::ZERO)?;
            engine.set_gravity_enabled(instance.env, instance.object, false)?;

            poses.push(pose);
        }

        // Debug lines from the previous iteration are stale once poses move.
        engine.clear_debug_lines();

        Ok(poses)
    }

    fn sample_offset<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.range > 0.0 {
            rng.gen_range(-self.range..self.range)
        } else {
            0.0
        }
    }
}

/// Yaw angle for one randomization, uniform over the pose's symmetry range:
/// `[0, 2*pi)` for asymmetric poses, `[0, 2*pi/order)` otherwise.
pub fn draw_yaw<R: Rng + ?Sized>(pose: &StablePose, rng: &mut R) -> f32 {
    rng.gen_range(0.0..pose.yaw_range())
}

/// Compose a randomized world pose from a canonical stable pose:
/// `position = q_random * p_stable + offset`,
/// `orientation = normalize(q_random * q_stable)`.
pub fn compose_pose(stable: &Pose, q_random: Quat, offset: Vec3) -> Pose {
    Pose::new(
        q_random * stable.position + offset,
        (q_random * stable.rotation).normalize(),
    )
}
