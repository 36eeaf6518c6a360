//! Integration test: the full generation pipeline on the synthetic backend.
//!
//! Exercises catalog loading, scene construction, pose randomization,
//! capture, and atomic export end to end, without a GPU or physics engine.
//! The dataset layout and index contract are checked against real files in
//! a temporary directory.

use glam::Quat;
use ndarray::{Array1, Array2, Array3};
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use pose_datagen::{DatasetGenerator, GenConfig, SimParams, SyntheticEngine};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::{self, File};
use std::path::Path;
use tempfile::TempDir;

/// Write a two-pose stable-pose catalog into the assets layout.
fn write_stable_pose_files(dir: &Path) {
    fs::create_dir_all(dir).unwrap();

    let mut transforms = Array3::<f64>::zeros((2, 4, 4));
    for n in 0..2 {
        for i in 0..4 {
            transforms[[n, i, i]] = 1.0;
        }
    }
    // Both poses rest slightly above the origin.
    transforms[[0, 2, 3]] = 0.02;
    transforms[[1, 2, 3]] = 0.03;

    transforms
        .write_npy(File::create(dir.join("stable_poses.npy")).unwrap())
        .unwrap();
    ndarray::arr1(&[0.7, 0.3])
        .write_npy(File::create(dir.join("stable_prob.npy")).unwrap())
        .unwrap();
}

fn test_config(root: &Path) -> GenConfig {
    let mut config = GenConfig::default();
    let sim = &mut config.simulation;
    sim.num_envs = 4;
    sim.num_iters = 2;
    sim.file_zero_padding_num = 6;
    sim.target_dataset = "test_dataset".to_string();
    sim.target_object = "test_object".to_string();
    sim.assets_root = root.join("assets");
    sim.output_root = root.join("datasets");
    // Small sensor keeps the analytic render fast: 64 x 48 pixels.
    sim.camera.fx = 160.0;
    sim.camera.fy = 160.0;
    sim.camera.cx = 32.0;
    sim.camera.cy = 24.0;
    sim.camera.far_plane = 2.0;
    // Straight-down camera one meter above the environment origin.
    sim.camera.mount.position = [0.0, 0.0, 1.0];
    sim.camera.mount.roll_deg = 0.0;
    sim.camera.mount.pitch_deg = 90.0;
    sim.camera.mount.yaw_deg = 0.0;
    config
}

#[test]
fn test_end_to_end_dataset_generation() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    write_stable_pose_files(&config.simulation.stable_pose_dir());
    let dataset_dir = config.simulation.dataset_dir();

    let engine = SyntheticEngine::new(SimParams::from_config(&config.simulation));
    let mut generator = DatasetGenerator::with_rng(
        engine,
        config,
        true,
        false,
        StdRng::seed_from_u64(1234),
    )
    .unwrap();
    generator.run().unwrap();

    // Config snapshot next to the data.
    assert!(dataset_dir.join("config.yaml").exists());

    // 4 envs x 2 iters = 8 samples, 3 artifacts each, 24 files total.
    let data_dir = dataset_dir.join("data");
    let file_count = fs::read_dir(&data_dir).unwrap().count();
    assert_eq!(file_count, 24);

    for idx in 0..8 {
        for role in ["image", "mask", "pose"] {
            let path = data_dir.join(format!("{}_{:06}.npy", role, idx));
            assert!(path.exists(), "missing {}", path.display());
        }
    }
    // No sample past the last global index.
    assert!(!data_dir.join("image_000008.npy").exists());

    for idx in 0..8 {
        let pose =
            Array1::<f32>::read_npy(File::open(data_dir.join(format!("pose_{:06}.npy", idx))).unwrap())
                .unwrap();
        assert_eq!(pose.len(), 7, "pose vector must have 7 components");

        // Quaternion component is normalized.
        let q = Quat::from_xyzw(pose[3], pose[4], pose[5], pose[6]);
        assert!((q.length() - 1.0).abs() < 1e-3, "|q| = {}", q.length());

        // Planar offset within the configured range, fixed drop height above
        // the canonical resting heights (0.02 / 0.03).
        assert!(pose[0].abs() <= 0.05 + 1e-6);
        assert!(pose[1].abs() <= 0.05 + 1e-6);
        assert!(pose[2] > 0.02 && pose[2] < 0.04);

        let depth =
            Array2::<f32>::read_npy(File::open(data_dir.join(format!("image_{:06}.npy", idx))).unwrap())
                .unwrap();
        assert_eq!(depth.shape(), &[48, 64]);
        // Exported depth is positive range.
        assert!(depth.iter().all(|&d| d > 0.0));
        // The ground plane sits roughly a meter from the camera.
        let center = depth[[24, 32]];
        assert!(center > 0.5 && center <= 1.01, "center depth {}", center);

        let mask =
            Array2::<bool>::read_npy(File::open(data_dir.join(format!("mask_{:06}.npy", idx))).unwrap())
                .unwrap();
        assert_eq!(mask.shape(), &[48, 64]);
        let object_pixels = mask.iter().filter(|&&m| m).count();
        assert!(object_pixels > 0, "object must be visible in sample {}", idx);
        assert!(object_pixels < 48 * 64, "object cannot fill the frame");
    }
}

#[test]
fn test_headless_run_without_persistence() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    write_stable_pose_files(&config.simulation.stable_pose_dir());
    let dataset_dir = config.simulation.dataset_dir();

    let engine = SyntheticEngine::new(SimParams::from_config(&config.simulation));
    let mut generator = DatasetGenerator::with_rng(
        engine,
        config,
        false,
        false,
        StdRng::seed_from_u64(99),
    )
    .unwrap();
    generator.run().unwrap();

    assert!(!dataset_dir.exists(), "nothing may be written without --save-results");
}
