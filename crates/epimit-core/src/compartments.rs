use serde::{Deserialize, Serialize};

/// An epidemiological compartment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compartment {
    Susceptible,
    Exposed,
    Infected,
    Hospitalized,
    Recovered,
    Deceased,
}

/// Vaccination tier partitioning every compartment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VaccinationTier {
    Unvaccinated,
    FullyVaccinated,
    BoosterVaccinated,
}

/// All compartments in canonical order.
pub const COMPARTMENTS: [Compartment; 6] = [
    Compartment::Susceptible,
    Compartment::Exposed,
    Compartment::Infected,
    Compartment::Hospitalized,
    Compartment::Recovered,
    Compartment::Deceased,
];

/// All vaccination tiers in canonical order.
pub const TIERS: [VaccinationTier; 3] = [
    VaccinationTier::Unvaccinated,
    VaccinationTier::FullyVaccinated,
    VaccinationTier::BoosterVaccinated,
];

impl Compartment {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Compartment::Susceptible => "Susceptible",
            Compartment::Exposed => "Exposed",
            Compartment::Infected => "Infected",
            Compartment::Hospitalized => "Hospitalized",
            Compartment::Recovered => "Recovered",
            Compartment::Deceased => "Deceased",
        }
    }
}

impl VaccinationTier {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn suffix(self) -> &'static str {
        match self {
            VaccinationTier::Unvaccinated => "UV",
            VaccinationTier::FullyVaccinated => "FV",
            VaccinationTier::BoosterVaccinated => "BV",
        }
    }
}

/// The 6×3 grid of sub-population counts: one cell per
/// (compartment, vaccination tier) pair.
///
/// Counts are whole people stored as `f64`. Vaccination-tier totals are
/// always recomputed from the grid rather than evolved separately, so the
/// invariant "sum over tiers == compartment total" holds by construction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompartmentGrid {
    counts: [[f64; 3]; 6],
}

impl CompartmentGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, c: Compartment, t: VaccinationTier) -> f64 {
        self.counts[c.index()][t.index()]
    }

    pub fn set(&mut self, c: Compartment, t: VaccinationTier, value: f64) {
        self.counts[c.index()][t.index()] = value;
    }

    /// Total across vaccination tiers for one compartment.
    pub fn compartment_total(&self, c: Compartment) -> f64 {
        self.counts[c.index()].iter().sum()
    }

    /// Total across compartments for one vaccination tier, deceased included.
    pub fn tier_total(&self, t: VaccinationTier) -> f64 {
        self.counts.iter().map(|row| row[t.index()]).sum()
    }

    /// Every living individual (all compartments except Deceased).
    pub fn living_total(&self) -> f64 {
        self.grand_total() - self.compartment_total(Compartment::Deceased)
    }

    /// All 18 cells summed, deceased included.
    pub fn grand_total(&self) -> f64 {
        self.counts.iter().flatten().sum()
    }

    pub fn infected_total(&self) -> f64 {
        self.compartment_total(Compartment::Infected)
    }

    /// The grid flattened in (compartment-major, tier-minor) order.
    pub fn to_vec(&self) -> Vec<f64> {
        self.counts.iter().flatten().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> CompartmentGrid {
        let mut g = CompartmentGrid::new();
        for (i, &c) in COMPARTMENTS.iter().enumerate() {
            for (j, &t) in TIERS.iter().enumerate() {
                g.set(c, t, (i * 3 + j) as f64);
            }
        }
        g
    }

    #[test]
    fn tier_sums_match_compartment_totals() {
        let g = sample_grid();
        for &c in &COMPARTMENTS {
            let by_tier: f64 = TIERS.iter().map(|&t| g.get(c, t)).sum();
            assert_eq!(by_tier, g.compartment_total(c));
        }
        let by_tier: f64 = TIERS.iter().map(|&t| g.tier_total(t)).sum();
        assert_eq!(by_tier, g.grand_total());
    }

    #[test]
    fn living_excludes_deceased() {
        let g = sample_grid();
        let deceased = g.compartment_total(Compartment::Deceased);
        assert_eq!(g.living_total(), g.grand_total() - deceased);
    }

    #[test]
    fn flattening_is_compartment_major() {
        let g = sample_grid();
        let v = g.to_vec();
        assert_eq!(v.len(), 18);
        assert_eq!(v[0], g.get(Compartment::Susceptible, VaccinationTier::Unvaccinated));
        assert_eq!(v[17], g.get(Compartment::Deceased, VaccinationTier::BoosterVaccinated));
    }
}
