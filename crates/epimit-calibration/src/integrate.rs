use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;
use crate::model::{CovariateSeries, ModelVariant, VariantParams};

/// How trajectories are produced from the variant's right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum IntegrationMethod {
    /// Classic fourth-order Runge-Kutta with a fixed step. Substeps never
    /// exceed `dt`; each requested grid interval is subdivided evenly.
    Rk4 { dt: f64 },
    /// Dormand-Prince 5(4) with adaptive step-size control, landing exactly
    /// on each requested grid point.
    DormandPrince45 { rtol: f64, atol: f64 },
}

impl Default for IntegrationMethod {
    fn default() -> Self {
        IntegrationMethod::DormandPrince45 {
            rtol: 1e-6,
            atol: 1e-6,
        }
    }
}

impl IntegrationMethod {
    pub fn name(self) -> &'static str {
        match self {
            IntegrationMethod::Rk4 { .. } => "RK4",
            IntegrationMethod::DormandPrince45 { .. } => "DP45",
        }
    }
}

/// Integrate a model variant over `t_grid`, returning the state vector at
/// every grid point (the first row is `y0` itself).
pub fn integrate(
    variant: ModelVariant,
    values: &[f64],
    covariates: &CovariateSeries,
    y0: &[f64],
    t_grid: &[f64],
    population: f64,
    method: IntegrationMethod,
) -> Result<Vec<Vec<f64>>, CalibrationError> {
    if t_grid.is_empty() {
        return Err(CalibrationError::EmptyTimeGrid);
    }
    if y0.len() != variant.state_len() {
        return Err(CalibrationError::ShapeMismatch {
            what: "state components",
            expected: variant.state_len(),
            actual: y0.len(),
        });
    }

    let params = VariantParams::unpack(variant, values);
    let f = |t: f64, y: &[f64]| variant.derivative(t, y, &params, covariates, population);

    let mut y = y0.to_vec();
    let mut out = Vec::with_capacity(t_grid.len());
    out.push(y.clone());

    for span in t_grid.windows(2) {
        let (t0, t1) = (span[0], span[1]);
        match method {
            IntegrationMethod::Rk4 { dt } => rk4_span(&f, t0, t1, &mut y, dt),
            IntegrationMethod::DormandPrince45 { rtol, atol } => {
                dp45_span(&f, t0, t1, &mut y, rtol, atol)?
            }
        }
        out.push(y.clone());
    }

    Ok(out)
}

fn axpy(y: &[f64], a: f64, x: &[f64]) -> Vec<f64> {
    y.iter().zip(x).map(|(&yi, &xi)| yi + a * xi).collect()
}

/// Advance `y` from `t0` to `t1` with fixed RK4 substeps of at most `dt`.
fn rk4_span(f: &impl Fn(f64, &[f64]) -> Vec<f64>, t0: f64, t1: f64, y: &mut Vec<f64>, dt: f64) {
    let span = t1 - t0;
    if span <= 0.0 {
        return;
    }
    let steps = (span / dt).ceil().max(1.0) as usize;
    let h = span / steps as f64;

    for step in 0..steps {
        let t = t0 + h * step as f64;
        let k1 = f(t, y);
        let k2 = f(t + h / 2.0, &axpy(y, h / 2.0, &k1));
        let k3 = f(t + h / 2.0, &axpy(y, h / 2.0, &k2));
        let k4 = f(t + h, &axpy(y, h, &k3));
        for (yi, (((k1i, k2i), k3i), k4i)) in y
            .iter_mut()
            .zip(k1.iter().zip(&k2).zip(&k3).zip(&k4))
        {
            *yi += h / 6.0 * (k1i + 2.0 * k2i + 2.0 * k3i + k4i);
        }
    }
}

// Dormand-Prince 5(4) tableau.
const A2: f64 = 1.0 / 5.0;
const A3: [f64; 2] = [3.0 / 40.0, 9.0 / 40.0];
const A4: [f64; 3] = [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0];
const A5: [f64; 4] = [
    19372.0 / 6561.0,
    -25360.0 / 2187.0,
    64448.0 / 6561.0,
    -212.0 / 729.0,
];
const A6: [f64; 5] = [
    9017.0 / 3168.0,
    -355.0 / 33.0,
    46732.0 / 5247.0,
    49.0 / 176.0,
    -5103.0 / 18656.0,
];
const B: [f64; 6] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];
const E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];
const C: [f64; 6] = [1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

/// Advance `y` from `t0` to `t1` with adaptive DP45 steps.
fn dp45_span(
    f: &impl Fn(f64, &[f64]) -> Vec<f64>,
    t0: f64,
    t1: f64,
    y: &mut Vec<f64>,
    rtol: f64,
    atol: f64,
) -> Result<(), CalibrationError> {
    let span = t1 - t0;
    if span <= 0.0 {
        return Ok(());
    }
    let h_min = span * 1e-12;
    let mut t = t0;
    let mut h = span;

    while t < t1 {
        h = h.min(t1 - t);
        if h < h_min {
            return Err(CalibrationError::StepUnderflow { t });
        }

        let k1 = f(t, y);
        let k2 = f(t + C[0] * h, &axpy(y, h * A2, &k1));
        let y3 = combine(y, h, &[(&k1, A3[0]), (&k2, A3[1])]);
        let k3 = f(t + C[1] * h, &y3);
        let y4 = combine(y, h, &[(&k1, A4[0]), (&k2, A4[1]), (&k3, A4[2])]);
        let k4 = f(t + C[2] * h, &y4);
        let y5 = combine(
            y,
            h,
            &[(&k1, A5[0]), (&k2, A5[1]), (&k3, A5[2]), (&k4, A5[3])],
        );
        let k5 = f(t + C[3] * h, &y5);
        let y6 = combine(
            y,
            h,
            &[
                (&k1, A6[0]),
                (&k2, A6[1]),
                (&k3, A6[2]),
                (&k4, A6[3]),
                (&k5, A6[4]),
            ],
        );
        let k6 = f(t + C[4] * h, &y6);
        let y_new = combine(
            y,
            h,
            &[
                (&k1, B[0]),
                (&k3, B[2]),
                (&k4, B[3]),
                (&k5, B[4]),
                (&k6, B[5]),
            ],
        );
        let k7 = f(t + h, &y_new);

        // Weighted RMS of the embedded error estimate.
        let mut err_sq = 0.0;
        for i in 0..y.len() {
            let e = h
                * (E[0] * k1[i]
                    + E[2] * k3[i]
                    + E[3] * k4[i]
                    + E[4] * k5[i]
                    + E[5] * k6[i]
                    + E[6] * k7[i]);
            let scale = atol + rtol * y[i].abs().max(y_new[i].abs());
            err_sq += (e / scale).powi(2);
        }
        let err = (err_sq / y.len() as f64).sqrt();

        if err <= 1.0 {
            t += h;
            *y = y_new;
        }

        let factor = if err == 0.0 {
            5.0
        } else {
            (0.9 * err.powf(-0.2)).clamp(0.2, 5.0)
        };
        h *= factor;
    }

    Ok(())
}

fn combine(y: &[f64], h: f64, terms: &[(&Vec<f64>, f64)]) -> Vec<f64> {
    let mut out = y.to_vec();
    for (k, a) in terms {
        for (oi, ki) in out.iter_mut().zip(k.iter()) {
            *oi += h * a * ki;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FitParameters;
    use epimit_core::{Compartment, CompartmentGrid, TIERS};

    fn covariates(n: usize) -> CovariateSeries {
        let rows: Vec<epimit_core::DatasetRow> = (0..n)
            .map(|d| epimit_core::DatasetRow {
                date: d as i64,
                grid: CompartmentGrid::new(),
                new_cases: 1_000.0,
                pct_uv_to_fv: 0.002,
                pct_fv_to_bv: 0.001,
            })
            .collect();
        CovariateSeries::from_dataset(&epimit_core::HistoricalDataset::new(rows).unwrap())
    }

    fn initial_state(variant: ModelVariant) -> Vec<f64> {
        let mut grid = CompartmentGrid::new();
        let [uv, fv, bv] = TIERS;
        grid.set(Compartment::Susceptible, uv, 9_000_000.0);
        grid.set(Compartment::Susceptible, fv, 7_000_000.0);
        grid.set(Compartment::Susceptible, bv, 3_000_000.0);
        grid.set(Compartment::Exposed, uv, 15_000.0);
        grid.set(Compartment::Exposed, fv, 8_000.0);
        grid.set(Compartment::Exposed, bv, 2_000.0);
        grid.set(Compartment::Infected, uv, 7_000.0);
        grid.set(Compartment::Infected, fv, 3_000.0);
        grid.set(Compartment::Infected, bv, 800.0);
        grid.set(Compartment::Recovered, uv, 400_000.0);
        grid.set(Compartment::Recovered, fv, 250_000.0);
        grid.set(Compartment::Recovered, bv, 30_000.0);
        variant.state_from_grid(&grid)
    }

    const POPULATION: f64 = 19_453_734.0;

    fn grid_of(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn empty_grid_is_rejected() {
        let variant = ModelVariant::V2;
        let values = FitParameters::for_variant(variant, true).initial_values();
        let err = integrate(
            variant,
            &values,
            &covariates(5),
            &initial_state(variant),
            &[],
            POPULATION,
            IntegrationMethod::default(),
        );
        assert!(matches!(err, Err(CalibrationError::EmptyTimeGrid)));
    }

    #[test]
    fn wrong_state_length_is_rejected() {
        let variant = ModelVariant::V5;
        let values = FitParameters::for_variant(variant, true).initial_values();
        let err = integrate(
            variant,
            &values,
            &covariates(5),
            &initial_state(ModelVariant::V1), // 18 states for a 15-state model
            &grid_of(5),
            POPULATION,
            IntegrationMethod::default(),
        );
        assert!(matches!(
            err,
            Err(CalibrationError::ShapeMismatch {
                expected: 15,
                actual: 18,
                ..
            })
        ));
    }

    #[test]
    fn first_row_is_the_initial_state() {
        let variant = ModelVariant::V1;
        let values = FitParameters::for_variant(variant, true).initial_values();
        let y0 = initial_state(variant);
        let out = integrate(
            variant,
            &values,
            &covariates(10),
            &y0,
            &grid_of(10),
            POPULATION,
            IntegrationMethod::Rk4 { dt: 0.5 },
        )
        .unwrap();
        assert_eq!(out.len(), 10);
        assert_eq!(out[0], y0);
    }

    #[test]
    fn rk4_and_dp45_agree_on_a_short_run() {
        let variant = ModelVariant::V2;
        let values = FitParameters::for_variant(variant, true).initial_values();
        let y0 = initial_state(variant);
        let t = grid_of(6);
        let cov = covariates(6);

        let fixed = integrate(
            variant,
            &values,
            &cov,
            &y0,
            &t,
            POPULATION,
            IntegrationMethod::Rk4 { dt: 0.05 },
        )
        .unwrap();
        let adaptive = integrate(
            variant,
            &values,
            &cov,
            &y0,
            &t,
            POPULATION,
            IntegrationMethod::DormandPrince45 {
                rtol: 1e-8,
                atol: 1e-8,
            },
        )
        .unwrap();

        for (row_f, row_a) in fixed.iter().zip(&adaptive) {
            for (a, b) in row_f.iter().zip(row_a) {
                let scale = a.abs().max(1.0);
                assert!(
                    (a - b).abs() / scale < 1e-5,
                    "integrators disagree: {a} vs {b}"
                );
            }
        }
    }

    #[test]
    fn trajectories_conserve_the_population() {
        let variant = ModelVariant::V3;
        let values = FitParameters::for_variant(variant, true).initial_values();
        let y0 = initial_state(variant);
        let total0: f64 = y0.iter().sum();
        let out = integrate(
            variant,
            &values,
            &covariates(15),
            &y0,
            &grid_of(15),
            POPULATION,
            IntegrationMethod::default(),
        )
        .unwrap();
        for row in &out {
            let total: f64 = row.iter().sum();
            assert!((total - total0).abs() / total0 < 1e-6);
        }
    }
}
