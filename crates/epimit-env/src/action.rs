use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// Number of discrete actions.
pub const ACTION_COUNT: usize = 12;

/// Prevalence threshold at which action 0 switches from economic recovery
/// to decay and from a mild to a strong exposure-rate boost.
pub(crate) const PREVALENCE_THRESHOLD: f64 = 0.001;

/// A single intervention type an action may activate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intervention {
    /// No non-pharmaceutical or partial measures in force.
    NoNpmPm,
    SocialDistancing,
    Lockdown,
    MaskMandate,
    VaccinationMandate,
}

/// All interventions in mask order.
pub const INTERVENTIONS: [Intervention; 5] = [
    Intervention::NoNpmPm,
    Intervention::SocialDistancing,
    Intervention::Lockdown,
    Intervention::MaskMandate,
    Intervention::VaccinationMandate,
];

impl Intervention {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Minimum consecutive days once started. Ending earlier is a
    /// minimum-duration violation.
    pub fn min_period(self) -> u32 {
        match self {
            Intervention::NoNpmPm => 14,
            Intervention::SocialDistancing => 28,
            Intervention::Lockdown => 14,
            Intervention::MaskMandate => 28,
            Intervention::VaccinationMandate => 0,
        }
    }

    /// Maximum consecutive days before the intervention must stop.
    ///
    /// The vaccination-mandate cap of 0 makes its maximum-duration check
    /// trivially true after every step, so vaccination actions are legal
    /// only on the very first step of an episode. Intentional: the mandate
    /// is modeled as capped immediately.
    pub fn max_period(self) -> u32 {
        match self {
            Intervention::NoNpmPm => 56,
            Intervention::SocialDistancing => 112,
            Intervention::Lockdown => 42,
            Intervention::MaskMandate => 180,
            Intervention::VaccinationMandate => 0,
        }
    }

    /// The actions that activate this intervention, as a 12-bit set.
    pub fn action_bits(self) -> u16 {
        fn bits(actions: &[u8]) -> u16 {
            actions.iter().fold(0u16, |acc, &a| acc | (1 << a))
        }
        match self {
            Intervention::NoNpmPm => bits(&[0]),
            Intervention::SocialDistancing => bits(&[1, 5, 6, 10]),
            Intervention::Lockdown => bits(&[2, 7, 8, 11]),
            Intervention::MaskMandate => bits(&[3, 5, 7, 9, 10, 11]),
            Intervention::VaccinationMandate => bits(&[4, 6, 8, 9, 10, 11]),
        }
    }
}

/// A policy action: an integer 0..=11 encoding a subset of interventions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action(u8);

impl Action {
    pub fn new(value: i64) -> Result<Self, EnvError> {
        if (0..ACTION_COUNT as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(EnvError::InvalidAction { value })
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn includes(self, intervention: Intervention) -> bool {
        intervention.action_bits() & (1 << self.0) != 0
    }

    /// Multiplier applied to the epoch's baseline exposure rate. Action 0
    /// boosts exposure, more strongly once prevalence crosses 0.1%.
    pub fn beta_multiplier(self, infected_fraction: f64) -> f64 {
        match self.0 {
            0 => {
                if infected_fraction >= PREVALENCE_THRESHOLD {
                    1.4
                } else {
                    1.1
                }
            }
            1 => 0.95,
            2 => 0.85,
            3 => 0.925,
            4 => 0.95,
            5 => 0.875,
            6 => 0.825,
            7 => 0.75,
            8 => 0.80,
            9 => 0.90,
            10 => 0.60,
            11 => 0.60,
            _ => unreachable!("action validated at construction"),
        }
    }

    /// Multiplier applied to the economic-and-social rate. Under action 0
    /// the rate recovers (capped at 100 by the caller) while prevalence is
    /// low and decays once it crosses the threshold.
    pub fn economic_multiplier(self, infected_fraction: f64) -> f64 {
        match self.0 {
            0 => {
                if infected_fraction < PREVALENCE_THRESHOLD {
                    1.005
                } else {
                    0.999
                }
            }
            1 => 0.9965,
            2 => 0.997,
            3 => 0.9965,
            4 => 0.994,
            5 => 0.9965,
            6 => 0.993,
            7 => 0.994,
            8 => 0.993,
            9 => 0.9935,
            10 => 0.9925,
            11 => 0.9925,
            _ => unreachable!("action validated at construction"),
        }
    }

    /// Actions including a mask mandate alongside at most one other
    /// measure model a distinct vaccination campaign: the unvaccinated to
    /// fully-vaccinated uptake is pinned to the historical average instead
    /// of the day's reported value.
    pub fn forces_average_uptake(self) -> bool {
        matches!(self.0, 3 | 5 | 6 | 7)
    }
}

impl TryFrom<i64> for Action {
    type Error = EnvError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_actions_are_rejected() {
        assert!(Action::new(-1).is_err());
        assert!(Action::new(12).is_err());
        for a in 0..12 {
            assert!(Action::new(a).is_ok());
        }
    }

    #[test]
    fn memberships_match_the_association_table() {
        let cases: [(Intervention, &[u8]); 5] = [
            (Intervention::NoNpmPm, &[0]),
            (Intervention::SocialDistancing, &[1, 5, 6, 10]),
            (Intervention::Lockdown, &[2, 7, 8, 11]),
            (Intervention::MaskMandate, &[3, 5, 7, 9, 10, 11]),
            (Intervention::VaccinationMandate, &[4, 6, 8, 9, 10, 11]),
        ];
        for (intervention, members) in cases {
            for a in 0..12u8 {
                let action = Action::new(a as i64).unwrap();
                assert_eq!(
                    action.includes(intervention),
                    members.contains(&a),
                    "action {a} vs {intervention:?}"
                );
            }
        }
    }

    #[test]
    fn action_zero_multipliers_depend_on_prevalence() {
        let a0 = Action::new(0).unwrap();
        assert_eq!(a0.beta_multiplier(0.0005), 1.1);
        assert_eq!(a0.beta_multiplier(0.001), 1.4);
        assert_eq!(a0.economic_multiplier(0.0005), 1.005);
        assert_eq!(a0.economic_multiplier(0.01), 0.999);
    }

    #[test]
    fn mask_mandate_subset_forces_average_uptake() {
        for a in 0..12i64 {
            let action = Action::new(a).unwrap();
            assert_eq!(action.forces_average_uptake(), [3, 5, 6, 7].contains(&a));
        }
    }
}
