//! Fit orchestration: single fits, sweeps, and windowed refits.

use std::time::Instant;

use log::{info, warn};

use epimit_core::{DatasetRow, HistoricalDataset};

use crate::error::CalibrationError;
use crate::integrate::IntegrationMethod;
use crate::model::{CovariateSeries, ModelVariant};
use crate::optimization::{optimize, OptimizerMethod};
use crate::problem::CalibrationProblem;
use crate::types::{FitArtifact, FitParameters};

/// Fits model variants against a historical dataset.
pub struct Calibrator {
    dataset: HistoricalDataset,
    population: f64,
    constrained_beta: bool,
}

impl Calibrator {
    pub fn new(dataset: HistoricalDataset, population: f64) -> Self {
        Self {
            dataset,
            population,
            constrained_beta: true,
        }
    }

    /// Drop the lower bound on beta. Particle swarm then becomes
    /// unavailable, since it samples within finite bounds.
    pub fn with_unconstrained_beta(mut self) -> Self {
        self.constrained_beta = false;
        self
    }

    fn build_problem(
        &self,
        rows: &[DatasetRow],
        covariates: CovariateSeries,
        variant: ModelVariant,
        integrator: IntegrationMethod,
    ) -> Result<CalibrationProblem, CalibrationError> {
        let observed = rows
            .iter()
            .map(|r| variant.state_from_grid(&r.grid))
            .collect();
        CalibrationProblem::new(
            variant,
            integrator,
            FitParameters::for_variant(variant, self.constrained_beta),
            covariates,
            observed,
            self.population,
        )
    }

    fn run_fit(
        &self,
        rows: &[DatasetRow],
        covariates: CovariateSeries,
        variant: ModelVariant,
        optimizer: &OptimizerMethod,
        integrator: IntegrationMethod,
    ) -> Result<FitArtifact, CalibrationError> {
        let started = Instant::now();

        let problem = self.build_problem(rows, covariates.clone(), variant, integrator)?;
        let names = problem.parameter_names();
        let run = optimize(problem, optimizer)?;

        // The executor consumed the problem; rebuild it to evaluate the
        // residuals at the best point.
        let problem = self.build_problem(rows, covariates, variant, integrator)?;
        let parameters =
            FitParameters::for_variant(variant, self.constrained_beta).project(&run.best_parameters);
        let residuals = problem.residual(&parameters)?;
        let residual_norm = residuals.iter().map(|r| r * r).sum::<f64>().sqrt();

        Ok(FitArtifact {
            variant,
            optimizer: optimizer.name().to_string(),
            integrator,
            parameters,
            parameter_names: names,
            residual_norm,
            residuals,
            iterations: run.iterations,
            converged: run.converged,
            termination_reason: run.termination_reason,
            runtime_seconds: started.elapsed().as_secs_f64(),
        })
    }

    /// Fit one variant over the full series.
    pub fn fit(
        &self,
        variant: ModelVariant,
        optimizer: &OptimizerMethod,
        integrator: IntegrationMethod,
    ) -> Result<FitArtifact, CalibrationError> {
        let covariates = CovariateSeries::from_dataset(&self.dataset);
        let artifact = self.run_fit(self.dataset.rows(), covariates, variant, optimizer, integrator)?;
        info!(
            "fit {:?} with {} / {}: residual norm {:.4e} in {} iterations",
            variant,
            artifact.optimizer,
            artifact.integrator.name(),
            artifact.residual_norm,
            artifact.iterations,
        );
        Ok(artifact)
    }

    /// Run every (variant, optimizer, integrator) combination sequentially.
    /// Attempts are independent; a failed one is logged and skipped.
    pub fn sweep(
        &self,
        variants: &[ModelVariant],
        optimizers: &[OptimizerMethod],
        integrators: &[IntegrationMethod],
    ) -> Vec<FitArtifact> {
        let mut artifacts = Vec::new();
        for &variant in variants {
            for optimizer in optimizers {
                for &integrator in integrators {
                    match self.fit(variant, optimizer, integrator) {
                        Ok(artifact) => artifacts.push(artifact),
                        Err(err) => warn!(
                            "fit {:?} with {} / {} failed: {err}",
                            variant,
                            optimizer.name(),
                            integrator.name(),
                        ),
                    }
                }
            }
        }
        artifacts
    }

    /// Split the series into contiguous windows of `window_len` days (the
    /// last one ragged) and fit each window independently, with its own
    /// initial state from the window's first row.
    pub fn fit_windows(
        &self,
        window_len: usize,
        variant: ModelVariant,
        optimizer: &OptimizerMethod,
        integrator: IntegrationMethod,
    ) -> Result<Vec<FitArtifact>, CalibrationError> {
        if window_len == 0 {
            return Err(CalibrationError::EmptyTimeGrid);
        }

        let covariates = CovariateSeries::from_dataset(&self.dataset);
        let rows = self.dataset.rows();

        let mut artifacts = Vec::new();
        for (index, window) in rows.chunks(window_len).enumerate() {
            let start = index * window_len;
            let artifact = self.run_fit(
                window,
                covariates.window(start, window.len()),
                variant,
                optimizer,
                integrator,
            )?;
            artifacts.push(artifact);
        }
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::{NelderMeadConfig, ParticleSwarmConfig};
    use epimit_core::{Compartment, CompartmentGrid, TIERS};

    fn dataset(n: usize) -> HistoricalDataset {
        let rows = (0..n)
            .map(|d| {
                let mut grid = CompartmentGrid::new();
                let [uv, fv, bv] = TIERS;
                grid.set(Compartment::Susceptible, uv, 9_000_000.0 - 500.0 * d as f64);
                grid.set(Compartment::Susceptible, fv, 7_000_000.0);
                grid.set(Compartment::Susceptible, bv, 3_000_000.0);
                grid.set(Compartment::Exposed, uv, 15_000.0);
                grid.set(Compartment::Exposed, fv, 8_000.0);
                grid.set(Compartment::Exposed, bv, 2_000.0);
                grid.set(Compartment::Infected, uv, 7_000.0 + 100.0 * d as f64);
                grid.set(Compartment::Infected, fv, 3_000.0);
                grid.set(Compartment::Infected, bv, 800.0);
                grid.set(Compartment::Recovered, uv, 400_000.0 + 400.0 * d as f64);
                epimit_core::DatasetRow {
                    date: d as i64,
                    grid,
                    new_cases: 1_200.0,
                    pct_uv_to_fv: 0.002,
                    pct_fv_to_bv: 0.001,
                }
            })
            .collect();
        HistoricalDataset::new(rows).unwrap()
    }

    const POPULATION: f64 = 19_453_734.0;

    fn quick_nm() -> OptimizerMethod {
        OptimizerMethod::NelderMead(NelderMeadConfig::new().with_max_iterations(30))
    }

    fn quick_integrator() -> IntegrationMethod {
        IntegrationMethod::Rk4 { dt: 1.0 }
    }

    #[test]
    fn fit_produces_a_consistent_artifact() {
        let calibrator = Calibrator::new(dataset(8), POPULATION);
        let artifact = calibrator
            .fit(ModelVariant::V2, &quick_nm(), quick_integrator())
            .unwrap();

        assert_eq!(artifact.optimizer, "Nelder-Mead");
        assert_eq!(artifact.parameters.len(), artifact.parameter_names.len());
        assert_eq!(artifact.residuals.len(), 8 * 18);

        let norm = artifact.residuals.iter().map(|r| r * r).sum::<f64>().sqrt();
        assert!((artifact.residual_norm - norm).abs() <= norm * 1e-12);

        // The best point respects the box after projection.
        let bounds = FitParameters::for_variant(ModelVariant::V2, true).bounds();
        for (value, (min, max)) in artifact.parameters.iter().zip(bounds) {
            assert!(*value >= min && *value <= max);
        }
    }

    #[test]
    fn fitting_does_not_worsen_the_initial_guess() {
        let calibrator = Calibrator::new(dataset(8), POPULATION);
        let params = FitParameters::for_variant(ModelVariant::V2, true);
        let covariates = CovariateSeries::from_dataset(&calibrator.dataset);
        let problem = calibrator
            .build_problem(
                calibrator.dataset.rows(),
                covariates,
                ModelVariant::V2,
                quick_integrator(),
            )
            .unwrap();
        let initial = problem.residual(&params.initial_values()).unwrap();
        let initial_norm = initial.iter().map(|r| r * r).sum::<f64>().sqrt();

        let artifact = calibrator
            .fit(ModelVariant::V2, &quick_nm(), quick_integrator())
            .unwrap();
        assert!(artifact.residual_norm <= initial_norm);
    }

    #[test]
    fn sweep_covers_the_cartesian_product() {
        let calibrator = Calibrator::new(dataset(6), POPULATION);
        let optimizers = [
            quick_nm(),
            OptimizerMethod::ParticleSwarm(
                ParticleSwarmConfig::new()
                    .with_num_particles(8)
                    .with_max_iterations(5),
            ),
        ];
        let artifacts = calibrator.sweep(
            &[ModelVariant::V2, ModelVariant::V5],
            &optimizers,
            &[quick_integrator()],
        );
        assert_eq!(artifacts.len(), 4);
        assert!(artifacts.iter().any(|a| a.optimizer == "Particle Swarm"));
        assert!(artifacts
            .iter()
            .any(|a| a.variant == ModelVariant::V5 && a.residuals.len() == 6 * 15));
    }

    #[test]
    fn windows_cover_the_series_with_a_ragged_tail() {
        let calibrator = Calibrator::new(dataset(70), POPULATION);
        let artifacts = calibrator
            .fit_windows(30, ModelVariant::V5, &quick_nm(), quick_integrator())
            .unwrap();
        assert_eq!(artifacts.len(), 3);
        assert_eq!(artifacts[0].residuals.len(), 30 * 15);
        assert_eq!(artifacts[2].residuals.len(), 10 * 15);
    }

    #[test]
    fn zero_window_length_is_rejected() {
        let calibrator = Calibrator::new(dataset(10), POPULATION);
        assert!(calibrator
            .fit_windows(0, ModelVariant::V2, &quick_nm(), quick_integrator())
            .is_err());
    }

    #[test]
    fn particle_swarm_requires_finite_bounds() {
        let calibrator = Calibrator::new(dataset(6), POPULATION).with_unconstrained_beta();
        let pso = OptimizerMethod::ParticleSwarm(
            ParticleSwarmConfig::new()
                .with_num_particles(4)
                .with_max_iterations(2),
        );
        let err = calibrator.fit(ModelVariant::V2, &pso, quick_integrator());
        assert!(matches!(err, Err(CalibrationError::InvalidBounds { .. })));
    }
}
