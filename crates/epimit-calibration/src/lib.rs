//! Parameter calibration for the continuous-time compartment models.
//!
//! Five candidate formulations of the epidemic model are fit against the
//! historical daily series: trajectories come from a fixed-step RK4 or an
//! adaptive Dormand-Prince 5(4) integrator, the objective is the sum of
//! squared residuals between predicted and observed compartment counts, and
//! the search runs on argmin's gradient-free Nelder-Mead or Particle Swarm
//! solvers. Fits can cover the full series, a sweep over every
//! (variant, solver, integrator) combination, or independent fixed-length
//! windows of the series.

mod error;
mod fit;
mod integrate;
mod model;
mod optimization;
mod problem;
mod types;

pub use error::CalibrationError;
pub use fit::Calibrator;
pub use integrate::{integrate, IntegrationMethod};
pub use model::{CovariateDay, CovariateSeries, ModelVariant, VariantParams, MODEL_VARIANTS};
pub use optimization::{
    optimize, NelderMeadConfig, OptimizerMethod, ParticleSwarmConfig, SolverRun,
};
pub use problem::CalibrationProblem;
pub use types::{FitArtifact, FitParameters, ParameterSpec};
