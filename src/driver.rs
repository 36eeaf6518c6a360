//! The iteration driver: owns the engine and runs the generation loop.
//!
//! Each iteration is randomize -> engine step -> capture -> export, repeated
//! exactly `num_iters` times. Every stage call blocks until complete; there
//! is no overlap between iterations and no retry logic. Any error aborts the
//! run, which is the right behavior for a batch data-generation job: a loud
//! failure beats a silently partial dataset.

use crate::capture::{capture_samples, SampleWriter};
use crate::config::GenConfig;
use crate::engine::SimEngine;
use crate::randomizer::PoseRandomizer;
use crate::scene::SceneSet;
use crate::stable_pose::StablePoseCatalog;
use crate::Error;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::time::Instant;
use tracing::info;

/// Owns every run-scoped resource: engine, scene set, randomizer, writer,
/// and the run's RNG.
pub struct DatasetGenerator<E: SimEngine> {
    engine: E,
    scene: SceneSet,
    randomizer: PoseRandomizer,
    writer: Option<SampleWriter>,
    config: GenConfig,
    rng: StdRng,
}

impl<E: SimEngine> DatasetGenerator<E> {
    /// Bootstrap a run: load and filter the stable-pose catalog, optionally
    /// open a viewer, build the scene set, and prepare the dataset directory
    /// (with a config snapshot) when persistence is requested.
    pub fn new(engine: E, config: GenConfig, save_results: bool, viewer: bool) -> Result<Self, Error> {
        Self::with_rng(engine, config, save_results, viewer, StdRng::from_entropy())
    }

    /// Like [`DatasetGenerator::new`] but with a caller-provided RNG, for
    /// reproducible runs and tests.
    pub fn with_rng(
        mut engine: E,
        config: GenConfig,
        save_results: bool,
        viewer: bool,
        mut rng: StdRng,
    ) -> Result<Self, Error> {
        let sim = &config.simulation;

        let catalog = StablePoseCatalog::load(
            sim.stable_pose_dir(),
            sim.min_stable_pose_prob,
            sim.max_num_stable_pose,
        )?;
        info!(
            object = %sim.target_object,
            stable_poses = catalog.len(),
            "stable pose catalog loaded"
        );

        if viewer {
            engine.create_viewer(Vec3::new(0.5, 0.5, 2.0), Vec3::new(0.5, 0.5, 0.0))?;
        }

        let scene = SceneSet::build(&mut engine, sim, &catalog, &mut rng)?;

        let writer = if save_results {
            let dataset_dir = sim.dataset_dir();
            fs::create_dir_all(&dataset_dir)?;
            config.snapshot(dataset_dir.join("config.yaml"))?;
            Some(SampleWriter::create(
                &dataset_dir,
                sim.file_zero_padding_num,
                sim.num_envs,
            )?)
        } else {
            None
        };

        let randomizer = PoseRandomizer::new(sim.object_rand_pose_range);

        Ok(Self {
            engine,
            scene,
            randomizer,
            writer,
            config,
            rng,
        })
    }

    pub fn scene(&self) -> &SceneSet {
        &self.scene
    }

    /// Run all configured iterations; each yields `num_envs` samples.
    pub fn run(&mut self) -> Result<(), Error> {
        let num_iters = self.config.simulation.num_iters;
        let num_envs = self.config.simulation.num_envs;

        for iteration in 0..num_iters {
            let started = Instant::now();

            let poses = self
                .randomizer
                .randomize(&mut self.engine, &self.scene, &mut self.rng)?;
            self.engine.step()?;
            let samples = capture_samples(&mut self.engine, &self.scene, &poses)?;

            if let Some(writer) = &self.writer {
                writer.write_iteration(iteration, &samples)?;
            }

            info!(
                iteration,
                samples = iteration * num_envs,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "iteration complete"
            );
        }
        Ok(())
    }
}
