use argmin::core::{CostFunction, Error};

use crate::error::CalibrationError;
use crate::integrate::{integrate, IntegrationMethod};
use crate::model::{CovariateSeries, ModelVariant};
use crate::types::FitParameters;

/// A fit of one model variant against an observed trajectory.
///
/// Holds everything a cost evaluation needs: the variant, the integration
/// method, the covariate series, the observation matrix (rows over the time
/// grid, columns in the variant's state order), and the initial state taken
/// from the first observed row.
pub struct CalibrationProblem {
    variant: ModelVariant,
    method: IntegrationMethod,
    parameters: FitParameters,
    covariates: CovariateSeries,
    observed: Vec<Vec<f64>>,
    t_grid: Vec<f64>,
    y0: Vec<f64>,
    population: f64,
}

impl CalibrationProblem {
    pub fn new(
        variant: ModelVariant,
        method: IntegrationMethod,
        parameters: FitParameters,
        covariates: CovariateSeries,
        observed: Vec<Vec<f64>>,
        population: f64,
    ) -> Result<Self, CalibrationError> {
        if observed.is_empty() {
            return Err(CalibrationError::EmptyTimeGrid);
        }
        for row in &observed {
            if row.len() != variant.state_len() {
                return Err(CalibrationError::ShapeMismatch {
                    what: "observation columns",
                    expected: variant.state_len(),
                    actual: row.len(),
                });
            }
        }
        if parameters.len() != FitParameters::for_variant(variant, true).len() {
            return Err(CalibrationError::ShapeMismatch {
                what: "parameters",
                expected: FitParameters::for_variant(variant, true).len(),
                actual: parameters.len(),
            });
        }

        let t_grid = (0..observed.len()).map(|i| i as f64).collect();
        let y0 = observed[0].clone();

        Ok(Self {
            variant,
            method,
            parameters,
            covariates,
            observed,
            t_grid,
            y0,
            population,
        })
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn method(&self) -> IntegrationMethod {
        self.method
    }

    pub fn num_parameters(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.names()
    }

    pub fn initial_parameters(&self) -> Vec<f64> {
        self.parameters.initial_values()
    }

    pub fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        self.parameters.bounds()
    }

    /// Predicted trajectory at the given (already projected) parameters.
    pub fn predict(&self, values: &[f64]) -> Result<Vec<Vec<f64>>, CalibrationError> {
        integrate(
            self.variant,
            values,
            &self.covariates,
            &self.y0,
            &self.t_grid,
            self.population,
            self.method,
        )
    }

    /// Predicted minus observed, flattened row-major. Proposals outside the
    /// box are projected onto it first.
    pub fn residual(&self, values: &[f64]) -> Result<Vec<f64>, CalibrationError> {
        if values.len() != self.parameters.len() {
            return Err(CalibrationError::ShapeMismatch {
                what: "parameters",
                expected: self.parameters.len(),
                actual: values.len(),
            });
        }
        let projected = self.parameters.project(values);
        let predicted = self.predict(&projected)?;

        let mut residual = Vec::with_capacity(self.observed.len() * self.variant.state_len());
        for (pred_row, obs_row) in predicted.iter().zip(&self.observed) {
            for (p, o) in pred_row.iter().zip(obs_row) {
                residual.push(p - o);
            }
        }
        Ok(residual)
    }
}

impl CostFunction for CalibrationProblem {
    type Param = Vec<f64>;
    type Output = f64;

    /// Sum of squared residuals.
    fn cost(&self, params: &Self::Param) -> Result<Self::Output, Error> {
        let residual = self.residual(params).map_err(Error::new)?;
        Ok(residual.iter().map(|r| r * r).sum())
    }
}
