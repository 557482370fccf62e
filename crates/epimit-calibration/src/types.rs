use serde::{Deserialize, Serialize};

use crate::integrate::IntegrationMethod;
use crate::model::ModelVariant;

/// One parameter to fit: its name, box bounds, and starting value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub min_bound: f64,
    pub max_bound: f64,
    pub initial: f64,
}

impl ParameterSpec {
    fn new(name: &str, min_bound: f64, max_bound: f64, initial: f64) -> Self {
        Self {
            name: name.to_string(),
            min_bound,
            max_bound,
            initial,
        }
    }
}

/// The ordered parameter vector for one model variant.
///
/// Ordering is fixed: `beta`, `alpha`, then per-tier groups (uv, fv, bv) for
/// `zeta`, `delta`, `gamma_i`, `gamma_h`, `mu_i`, `mu_h`, `sigma_s`, and,
/// for re-susceptible variants, `sigma_r`. Variants without a hospitalized
/// compartment omit the `delta`, `gamma_h`, and `mu_h` groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitParameters {
    specs: Vec<ParameterSpec>,
}

const TIER_SUFFIXES: [&str; 3] = ["uv", "fv", "bv"];

impl FitParameters {
    /// Parameter set for a variant, with the calibrated study's bounds and
    /// starting values. An unconstrained beta drops its lower bound, which
    /// excludes bounded solvers such as particle swarm.
    pub fn for_variant(variant: ModelVariant, constrained_beta: bool) -> Self {
        let beta_min = if constrained_beta {
            0.0
        } else {
            f64::NEG_INFINITY
        };

        let mut specs = vec![
            ParameterSpec::new("beta", beta_min, 1.0, 0.37),
            ParameterSpec::new("alpha", 0.0, 1.0, 1.0),
        ];

        let mut group = |name: &str, min: f64, max: f64, initials: [f64; 3]| {
            for (suffix, initial) in TIER_SUFFIXES.iter().zip(initials) {
                specs.push(ParameterSpec::new(
                    &format!("{name}_{suffix}"),
                    min,
                    max,
                    initial,
                ));
            }
        };

        group("zeta", 0.0, 0.4, [0.615, 0.039, 0.346]);
        if variant.has_hospitalized() {
            group("delta", 0.0, 0.1, [0.715, 0.05, 0.235]);
        }
        group("gamma_i", 0.0, 1.0, [0.6108, 0.0388, 0.3502]);
        if variant.has_hospitalized() {
            group("gamma_h", 0.0, 1.0, [0.6108, 0.0388, 0.3502]);
        }
        group("mu_i", 0.0, 0.1, [0.000_111_942_027; 3]);
        if variant.has_hospitalized() {
            group("mu_h", 0.0, 0.2, [0.000_111_942_027; 3]);
        }
        group("sigma_s", 0.0, 1.0, [0.000_111_942_027; 3]);
        if variant.resusceptible() {
            group("sigma_r", 0.0, 1.0, [0.111_942_027; 3]);
        }

        Self { specs }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    pub fn initial_values(&self) -> Vec<f64> {
        self.specs.iter().map(|s| s.initial).collect()
    }

    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.specs
            .iter()
            .map(|s| (s.min_bound, s.max_bound))
            .collect()
    }

    /// Clamp a proposal onto the box. Unbounded solvers explore outside the
    /// feasible region; evaluating the projected point keeps the fit inside
    /// it without rejecting the proposal outright.
    pub fn project(&self, values: &[f64]) -> Vec<f64> {
        self.specs
            .iter()
            .zip(values)
            .map(|(spec, &v)| v.clamp(spec.min_bound, spec.max_bound))
            .collect()
    }
}

/// Immutable record of one completed fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitArtifact {
    pub variant: ModelVariant,
    /// Solver name, e.g. "Nelder-Mead".
    pub optimizer: String,
    pub integrator: IntegrationMethod,
    /// Best parameter values found, in `parameter_names` order.
    pub parameters: Vec<f64>,
    pub parameter_names: Vec<String>,
    /// Euclidean norm of `residuals`.
    pub residual_norm: f64,
    /// Predicted minus observed at the best parameters, flattened row-major.
    pub residuals: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    pub termination_reason: String,
    pub runtime_seconds: f64,
}

impl FitArtifact {
    /// Parameters keyed by name.
    pub fn parameters_map(&self) -> std::collections::HashMap<String, f64> {
        self.parameter_names
            .iter()
            .cloned()
            .zip(self.parameters.iter().copied())
            .collect()
    }
}
