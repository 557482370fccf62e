use serde::{Deserialize, Serialize};

use epimit_core::{Compartment, CompartmentGrid, HistoricalDataset, TIERS};

use crate::error::CalibrationError;

/// The five candidate formulations of the continuous-time compartment
/// model, differing along three axes: whether recovered individuals become
/// susceptible again, whether the exposure rate is scaled by the day's
/// reported new cases, and whether a hospitalized compartment is modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelVariant {
    /// Re-susceptibility, constant exposure rate, hospitalized compartment.
    V1,
    /// No re-susceptibility, constant exposure rate, hospitalized.
    V2,
    /// Re-susceptibility, case-scaled exposure rate, hospitalized.
    V3,
    /// No re-susceptibility, case-scaled exposure rate, hospitalized; the
    /// acutely infected take no part in vaccination flows.
    V4,
    /// No re-susceptibility, case-scaled exposure rate, no hospitalized
    /// compartment (15 states instead of 18).
    V5,
}

pub const MODEL_VARIANTS: [ModelVariant; 5] = [
    ModelVariant::V1,
    ModelVariant::V2,
    ModelVariant::V3,
    ModelVariant::V4,
    ModelVariant::V5,
];

impl ModelVariant {
    pub fn id(self) -> u8 {
        match self {
            ModelVariant::V1 => 1,
            ModelVariant::V2 => 2,
            ModelVariant::V3 => 3,
            ModelVariant::V4 => 4,
            ModelVariant::V5 => 5,
        }
    }

    pub fn resusceptible(self) -> bool {
        matches!(self, ModelVariant::V1 | ModelVariant::V3)
    }

    pub fn scales_beta_by_cases(self) -> bool {
        matches!(self, ModelVariant::V3 | ModelVariant::V4 | ModelVariant::V5)
    }

    pub fn has_hospitalized(self) -> bool {
        !matches!(self, ModelVariant::V5)
    }

    /// Whether the infected compartment participates in vaccination flows.
    pub fn vaccinates_infected(self) -> bool {
        matches!(self, ModelVariant::V1 | ModelVariant::V2 | ModelVariant::V3)
    }

    /// Length of the state vector: 3 tiers for each modeled compartment.
    pub fn state_len(self) -> usize {
        if self.has_hospitalized() {
            18
        } else {
            15
        }
    }

    /// Compartments in state-vector order.
    pub fn compartments(self) -> Vec<Compartment> {
        let mut out = vec![
            Compartment::Susceptible,
            Compartment::Exposed,
            Compartment::Infected,
        ];
        if self.has_hospitalized() {
            out.push(Compartment::Hospitalized);
        }
        out.push(Compartment::Recovered);
        out.push(Compartment::Deceased);
        out
    }

    /// Column labels of the state vector, e.g. `Infected_FV`.
    pub fn state_names(self) -> Vec<String> {
        self.compartments()
            .iter()
            .flat_map(|c| TIERS.iter().map(move |t| format!("{}_{}", c.name(), t.suffix())))
            .collect()
    }

    /// Flatten a compartment grid into this variant's state vector,
    /// compartment-major with tiers innermost.
    pub fn state_from_grid(self, grid: &CompartmentGrid) -> Vec<f64> {
        self.compartments()
            .iter()
            .flat_map(|&c| TIERS.iter().map(move |&t| grid.get(c, t)))
            .collect()
    }

    /// Time derivative of the state vector at `(t, y)`.
    pub fn derivative(
        self,
        t: f64,
        y: &[f64],
        params: &VariantParams,
        covariates: &CovariateSeries,
        population: f64,
    ) -> Vec<f64> {
        let day = covariates.at(t);
        let p1 = day.uv_to_fv;
        let p2 = day.fv_to_bv;

        let beta = if self.scales_beta_by_cases() {
            params.beta * day.new_cases
        } else {
            params.beta
        };

        let with_h = self.has_hospitalized();
        let s = &y[0..3];
        let e = &y[3..6];
        let i = &y[6..9];
        let (h, r): (&[f64], &[f64]) = if with_h {
            (&y[9..12], &y[12..15])
        } else {
            (&[], &y[9..12])
        };

        // Standard incidence with the infected total floored at one.
        let total_infections = (i[0] + i[1] + i[2]).max(1.0);
        let foi = beta * total_infections.powf(params.alpha) / population;

        // Net vaccination flow for tier k of a compartment: uv drains into
        // fv, fv into bv.
        let ladder = |x: &[f64], k: usize| match k {
            0 => -p1 * x[0],
            1 => p1 * x[0] - p2 * x[1],
            _ => p2 * x[1],
        };

        let mut dy = Vec::with_capacity(y.len());

        for k in 0..3 {
            let mut ds = -foi * s[k] + params.sigma_s[k] * e[k] + ladder(s, k);
            if self.resusceptible() {
                ds += params.sigma_r[k] * r[k];
            }
            dy.push(ds);
        }

        for k in 0..3 {
            let de =
                foi * s[k] - (params.zeta[k] + params.sigma_s[k]) * e[k] + ladder(e, k);
            dy.push(de);
        }

        for k in 0..3 {
            let mut di = params.zeta[k] * e[k]
                - (params.delta[k] + params.gamma_i[k] + params.mu_i[k]) * i[k];
            if self.vaccinates_infected() {
                di += ladder(i, k);
            }
            dy.push(di);
        }

        if with_h {
            for k in 0..3 {
                dy.push(params.delta[k] * i[k] - (params.gamma_h[k] + params.mu_h[k]) * h[k]);
            }
        }

        for k in 0..3 {
            let mut dr = params.gamma_i[k] * i[k] + ladder(r, k);
            if with_h {
                dr += params.gamma_h[k] * h[k];
            }
            if self.resusceptible() {
                dr -= params.sigma_r[k] * r[k];
            }
            dy.push(dr);
        }

        for k in 0..3 {
            let mut dd = params.mu_i[k] * i[k];
            if with_h {
                dd += params.mu_h[k] * h[k];
            }
            dy.push(dd);
        }

        dy
    }
}

impl TryFrom<u8> for ModelVariant {
    type Error = CalibrationError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(ModelVariant::V1),
            2 => Ok(ModelVariant::V2),
            3 => Ok(ModelVariant::V3),
            4 => Ok(ModelVariant::V4),
            5 => Ok(ModelVariant::V5),
            _ => Err(CalibrationError::UnknownVariant { id }),
        }
    }
}

/// Parameter vector unpacked into named groups, in the `FitParameters`
/// ordering for the variant. Groups the variant does not use stay zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantParams {
    pub beta: f64,
    pub alpha: f64,
    pub zeta: [f64; 3],
    pub delta: [f64; 3],
    pub gamma_i: [f64; 3],
    pub gamma_h: [f64; 3],
    pub mu_i: [f64; 3],
    pub mu_h: [f64; 3],
    /// Exposed → Susceptible resolution.
    pub sigma_s: [f64; 3],
    /// Recovered → Susceptible (re-susceptible variants only).
    pub sigma_r: [f64; 3],
}

impl VariantParams {
    pub fn unpack(variant: ModelVariant, values: &[f64]) -> Self {
        let mut cursor = values.iter().copied();
        let mut next = || cursor.next().unwrap_or(0.0);

        let beta = next();
        let alpha = next();
        let mut triple = || [next(), next(), next()];

        let mut p = VariantParams {
            beta,
            alpha,
            ..VariantParams::default()
        };
        p.zeta = triple();
        if variant.has_hospitalized() {
            p.delta = triple();
        }
        p.gamma_i = triple();
        if variant.has_hospitalized() {
            p.gamma_h = triple();
        }
        p.mu_i = triple();
        if variant.has_hospitalized() {
            p.mu_h = triple();
        }
        p.sigma_s = triple();
        if variant.resusceptible() {
            p.sigma_r = triple();
        }
        p
    }
}

/// The covariates the right-hand side reads per day: daily vaccination
/// transition fractions and reported new cases. Continuous time indexes the
/// series by its integer part, clamped to the final entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovariateSeries {
    uv_to_fv: Vec<f64>,
    fv_to_bv: Vec<f64>,
    new_cases: Vec<f64>,
}

/// One day of covariate values.
#[derive(Debug, Clone, Copy)]
pub struct CovariateDay {
    pub uv_to_fv: f64,
    pub fv_to_bv: f64,
    pub new_cases: f64,
}

impl CovariateSeries {
    pub fn from_dataset(dataset: &HistoricalDataset) -> Self {
        Self {
            uv_to_fv: dataset.rows().iter().map(|r| r.pct_uv_to_fv).collect(),
            fv_to_bv: dataset.rows().iter().map(|r| r.pct_fv_to_bv).collect(),
            new_cases: dataset.rows().iter().map(|r| r.new_cases).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.uv_to_fv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uv_to_fv.is_empty()
    }

    /// The sub-series covering `range`, for windowed fits.
    pub fn window(&self, start: usize, len: usize) -> Self {
        let end = (start + len).min(self.len());
        Self {
            uv_to_fv: self.uv_to_fv[start..end].to_vec(),
            fv_to_bv: self.fv_to_bv[start..end].to_vec(),
            new_cases: self.new_cases[start..end].to_vec(),
        }
    }

    pub fn at(&self, t: f64) -> CovariateDay {
        let idx = (t.max(0.0) as usize).min(self.len() - 1);
        CovariateDay {
            uv_to_fv: self.uv_to_fv[idx],
            fv_to_bv: self.fv_to_bv[idx],
            new_cases: self.new_cases[idx],
        }
    }
}
