use epimit_core::{Compartment, CompartmentGrid, EpochRates, VaccinationTier, TIERS};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use Compartment::{Deceased, Exposed, Hospitalized, Infected, Recovered, Susceptible};

/// Daily vaccination-tier transition fractions read from the historical
/// dataset (or pinned to the historical average under mask-mandate actions).
#[derive(Clone, Copy, Debug)]
pub struct VaccinationUptake {
    /// Unvaccinated → FullyVaccinated fraction for the day.
    pub uv_to_fv: f64,
    /// FullyVaccinated → BoosterVaccinated fraction for the day.
    pub fv_to_bv: f64,
}

/// Result of advancing the compartment grid one day.
#[derive(Clone, Debug)]
pub struct DynamicsOutcome {
    pub grid: CompartmentGrid,
    /// Incident cases this day: total Exposed → Infected inflow.
    pub new_cases: f64,
    /// Whole-population delta introduced by integer truncation. All flows
    /// are internal, so any change in the grand total is truncation drift.
    pub truncation_drift: f64,
}

/// Draw a Gaussian sample around `mean` with standard deviation
/// `fraction * |mean|`. A degenerate spread returns the mean unchanged.
pub(crate) fn sample_rate(rng: &mut StdRng, mean: f64, fraction: f64) -> f64 {
    let sd = fraction * mean.abs();
    match Normal::new(mean, sd) {
        Ok(dist) => dist.sample(rng),
        Err(_) => mean,
    }
}

/// Counts are whole people: truncate toward zero, then floor at zero so a
/// large single-day outflow cannot drive a compartment negative.
fn whole(count: f64) -> f64 {
    count.trunc().max(0.0)
}

/// Advance the compartment grid one day with the given (already sampled)
/// rates. Every new cell is computed from the previous day's grid, so this
/// is a pure old-state → new-state transition.
pub fn step_dynamics(
    grid: &CompartmentGrid,
    rates: &EpochRates,
    uptake: VaccinationUptake,
    population: f64,
) -> DynamicsOutcome {
    let [uv, fv, bv] = TIERS;
    let p1 = uptake.uv_to_fv;
    let p2 = uptake.fv_to_bv;

    // Force of infection, floored at one infected individual so a zero
    // count cannot produce 0^alpha artifacts.
    let total_infected = grid.infected_total().max(1.0);
    let foi = rates.beta * total_infected.powf(rates.alpha) / population;

    let s = |t: VaccinationTier| grid.get(Susceptible, t);
    let e = |t: VaccinationTier| grid.get(Exposed, t);
    let i = |t: VaccinationTier| grid.get(Infected, t);
    let h = |t: VaccinationTier| grid.get(Hospitalized, t);
    let r = |t: VaccinationTier| grid.get(Recovered, t);
    let d = |t: VaccinationTier| grid.get(Deceased, t);

    let mut next = CompartmentGrid::new();

    // Susceptible: infection outflow, exposure resolution inflow, and the
    // vaccination ladder UV → FV → BV.
    let tr = |t: VaccinationTier| rates.tier(t);
    next.set(
        Susceptible,
        uv,
        whole(s(uv) - foi * s(uv) + tr(uv).sigma_s * e(uv) - p1 * s(uv)),
    );
    next.set(
        Susceptible,
        fv,
        whole(s(fv) - foi * s(fv) + tr(fv).sigma_s * e(fv) + p1 * s(uv) - p2 * s(fv)),
    );
    next.set(
        Susceptible,
        bv,
        whole(s(bv) - foi * s(bv) + tr(bv).sigma_s * e(bv) + p2 * s(fv)),
    );

    // Exposed: exposure from both Susceptible and Recovered, resolution
    // back to Susceptible/Recovered, progression to Infected, vaccination.
    for (t, from, to) in [(uv, None, Some(fv)), (fv, Some(uv), Some(bv)), (bv, Some(fv), None)] {
        let rt = tr(t);
        let mut value = e(t) + foi * s(t) + foi * r(t)
            - (rt.zeta_s + rt.zeta_r + rt.sigma_s + rt.sigma_r) * e(t);
        if let Some(src) = from {
            value += if src == uv { p1 * e(uv) } else { p2 * e(fv) };
        }
        if let Some(dst) = to {
            value -= if dst == fv { p1 * e(t) } else { p2 * e(t) };
        }
        next.set(Exposed, t, whole(value));
    }

    // Infected: progression from Exposed, outflow to Hospitalized,
    // Recovered, and Deceased. No vaccination flow for the acutely ill.
    let mut new_cases = 0.0;
    for &t in &TIERS {
        let rt = tr(t);
        let incident = (rt.zeta_s + rt.zeta_r) * e(t);
        new_cases += incident;
        next.set(
            Infected,
            t,
            whole(i(t) + incident - (rt.delta + rt.gamma_i + rt.mu_i) * i(t)),
        );
    }
    let new_cases = whole(new_cases);

    // Hospitalized.
    for &t in &TIERS {
        let rt = tr(t);
        next.set(
            Hospitalized,
            t,
            whole(h(t) + rt.delta * i(t) - (rt.gamma_h + rt.mu_h) * h(t)),
        );
    }

    // Recovered: recoveries in, re-exposure out, vaccination ladder.
    next.set(
        Recovered,
        uv,
        whole(
            r(uv) - foi * r(uv)
                + tr(uv).sigma_r * e(uv)
                + tr(uv).gamma_i * i(uv)
                + tr(uv).gamma_h * h(uv)
                - p1 * r(uv),
        ),
    );
    next.set(
        Recovered,
        fv,
        whole(
            r(fv) - foi * r(fv)
                + tr(fv).sigma_r * e(fv)
                + tr(fv).gamma_i * i(fv)
                + tr(fv).gamma_h * h(fv)
                + p1 * r(uv)
                - p2 * r(fv),
        ),
    );
    next.set(
        Recovered,
        bv,
        whole(
            r(bv) - foi * r(bv)
                + tr(bv).sigma_r * e(bv)
                + tr(bv).gamma_i * i(bv)
                + tr(bv).gamma_h * h(bv)
                + p2 * r(fv),
        ),
    );

    // Deceased.
    for &t in &TIERS {
        let rt = tr(t);
        next.set(Deceased, t, whole(d(t) + rt.mu_i * i(t) + rt.mu_h * h(t)));
    }

    let truncation_drift = next.grand_total() - grid.grand_total();

    DynamicsOutcome {
        grid: next,
        new_cases,
        truncation_drift,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epimit_core::{RateTable, COMPARTMENTS};
    use rand::SeedableRng;

    fn seeded_grid() -> CompartmentGrid {
        let mut g = CompartmentGrid::new();
        let [uv, fv, bv] = TIERS;
        g.set(Susceptible, uv, 8_000_000.0);
        g.set(Susceptible, fv, 6_000_000.0);
        g.set(Susceptible, bv, 2_000_000.0);
        g.set(Exposed, uv, 20_000.0);
        g.set(Exposed, fv, 10_000.0);
        g.set(Exposed, bv, 3_000.0);
        g.set(Infected, uv, 9_000.0);
        g.set(Infected, fv, 4_000.0);
        g.set(Infected, bv, 1_000.0);
        g.set(Hospitalized, uv, 900.0);
        g.set(Hospitalized, fv, 300.0);
        g.set(Hospitalized, bv, 50.0);
        g.set(Recovered, uv, 1_500_000.0);
        g.set(Recovered, fv, 900_000.0);
        g.set(Recovered, bv, 100_000.0);
        g.set(Deceased, uv, 40_000.0);
        g.set(Deceased, fv, 5_000.0);
        g.set(Deceased, bv, 500.0);
        g
    }

    fn epoch_rates() -> EpochRates {
        RateTable::calibrated().epoch(7).unwrap()
    }

    #[test]
    fn counts_stay_non_negative_and_whole() {
        let out = step_dynamics(
            &seeded_grid(),
            &epoch_rates(),
            VaccinationUptake {
                uv_to_fv: 0.002,
                fv_to_bv: 0.001,
            },
            19_453_734.0,
        );
        for &c in &COMPARTMENTS {
            for &t in &TIERS {
                let v = out.grid.get(c, t);
                assert!(v >= 0.0, "{c:?}/{t:?} went negative: {v}");
                assert_eq!(v, v.trunc(), "{c:?}/{t:?} not whole: {v}");
            }
        }
    }

    #[test]
    fn extreme_outflow_rates_floor_at_zero() {
        // Rates far above 1/day would drive compartments negative without
        // the floor. Exposed is emptied so no inflow masks the effect.
        let mut grid = seeded_grid();
        for &t in &TIERS {
            grid.set(Exposed, t, 0.0);
        }
        let rates = epoch_rates().map(|_| 5.0).with_beta(0.0);
        let out = step_dynamics(
            &grid,
            &rates,
            VaccinationUptake {
                uv_to_fv: 0.0,
                fv_to_bv: 0.0,
            },
            19_453_734.0,
        );
        for &t in &TIERS {
            assert_eq!(out.grid.get(Infected, t), 0.0);
        }
    }

    #[test]
    fn truncation_drift_is_bounded_by_cell_count() {
        let out = step_dynamics(
            &seeded_grid(),
            &epoch_rates(),
            VaccinationUptake {
                uv_to_fv: 0.002,
                fv_to_bv: 0.001,
            },
            19_453_734.0,
        );
        // Each of the 18 cells discards less than one person, and flows in
        // transit between cells can add at most a few more.
        assert!(out.truncation_drift.abs() < 100.0, "{}", out.truncation_drift);
    }

    #[test]
    fn zero_infected_uses_unit_floor_not_nan() {
        let mut g = seeded_grid();
        for &t in &TIERS {
            g.set(Infected, t, 0.0);
        }
        let out = step_dynamics(
            &g,
            &epoch_rates(),
            VaccinationUptake {
                uv_to_fv: 0.0,
                fv_to_bv: 0.0,
            },
            19_453_734.0,
        );
        for &c in &COMPARTMENTS {
            for &t in &TIERS {
                assert!(out.grid.get(c, t).is_finite());
            }
        }
    }

    #[test]
    fn degenerate_noise_returns_the_mean() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(sample_rate(&mut rng, 0.0, 0.05), 0.0);
        assert_eq!(sample_rate(&mut rng, 0.3, 0.0), 0.3);
    }

    #[test]
    fn identical_inputs_give_identical_outputs() {
        let grid = seeded_grid();
        let rates = epoch_rates();
        let uptake = VaccinationUptake {
            uv_to_fv: 0.002,
            fv_to_bv: 0.001,
        };
        let a = step_dynamics(&grid, &rates, uptake, 19_453_734.0);
        let b = step_dynamics(&grid, &rates, uptake, 19_453_734.0);
        assert_eq!(a.grid, b.grid);
        assert_eq!(a.new_cases, b.new_cases);
    }
}
