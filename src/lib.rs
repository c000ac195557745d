#![doc = include_str!("../README.md")]


mod array_stats;
pub use array_stats::nanmedian;

mod cdpp;
pub use cdpp::CdppEstimator;

mod error;
pub use error::HaloError;

mod objective;
pub use objective::{
    FirstOrder, SecondOrder, Smoothness, SmoothnessTrait, WeightedFluxObjective, diff_1, diff_2,
};

mod psf;
pub use psf::gaussian_psf;

mod reconstruct;
pub use reconstruct::{
    HaloReconstruction, HaloReconstructor, median_normalized, raw_light_curve,
    weighted_light_curve,
};

mod scene;
pub use scene::{PixelCube, SceneConfig, SensitivityMap, Trajectory};

mod solver;
pub use solver::{
    CobylaWeightSolver, WeightFitResult, WeightSolver, WeightSolverTrait, random_simplex_weights,
    uniform_weights,
};

pub mod synthetic;

mod sweep;
pub use sweep::{SceneRealization, SweepRecord, jitter_realizations, reconstruct_scene, run_sweep};

pub use ndarray;
