use serde::{Deserialize, Serialize};

use crate::action::{Action, Intervention, ACTION_COUNT, INTERVENTIONS};

/// Duration-constraint state for the five interventions: consecutive-day
/// counters, the derived `allowed`/`required` flags, and the 12-slot
/// legality mask over actions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyState {
    /// Consecutive days each intervention has been continuously active.
    counters: [u32; 5],
    allowed: [bool; 5],
    required: [bool; 5],
    mask: [bool; ACTION_COUNT],
}

impl Default for PolicyState {
    fn default() -> Self {
        Self {
            counters: [0; 5],
            allowed: [true; 5],
            required: [false; 5],
            mask: [true; ACTION_COUNT],
        }
    }
}

impl PolicyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, i: Intervention) -> u32 {
        self.counters[i.index()]
    }

    pub fn is_allowed(&self, i: Intervention) -> bool {
        self.allowed[i.index()]
    }

    pub fn is_required(&self, i: Intervention) -> bool {
        self.required[i.index()]
    }

    /// Which of the 12 actions are currently legal.
    pub fn allowed_actions_mask(&self) -> [bool; ACTION_COUNT] {
        self.mask
    }

    /// Advance counters for one applied action: +1 for every intervention
    /// the action activates, reset to 0 for every other intervention.
    pub fn record_action(&mut self, action: Action) {
        for &i in &INTERVENTIONS {
            if action.includes(i) {
                self.counters[i.index()] += 1;
            } else {
                self.counters[i.index()] = 0;
            }
        }
    }

    /// Recompute violations, `allowed`/`required` flags, and the action
    /// mask from the current counters.
    pub fn refresh(&mut self) {
        let min_violation: [bool; 5] = INTERVENTIONS
            .map(|i| 0 < self.counters[i.index()] && self.counters[i.index()] < i.min_period());
        let max_violation: [bool; 5] =
            INTERVENTIONS.map(|i| self.counters[i.index()] >= i.max_period());

        let [no_npm_min, sdm_min, lockdown_min, mask_min, vacc_min] = min_violation;
        let [no_npm_max, sdm_max, lockdown_max, mask_max, vacc_max] = max_violation;

        // Stopping an intervention below its minimum duration is a
        // violation, so it stays required until the minimum is met.
        self.required = min_violation;

        // Pairwise exclusions: nothing may start while the no-intervention
        // minimum is pending, and SDM/lockdown block each other's starts.
        self.allowed = [
            !sdm_min && !lockdown_min && !mask_min && !vacc_min && !no_npm_max,
            !no_npm_min && !lockdown_min && !sdm_max,
            !no_npm_min && !sdm_min && !lockdown_max,
            !no_npm_min && !mask_max,
            !no_npm_min && !vacc_max,
        ];

        self.mask = self.derive_mask();
    }

    /// Intersect the memberships of required interventions, subtract those
    /// of disallowed ones; with nothing required, fall back to the union of
    /// allowed memberships minus the disallowed ones.
    fn derive_mask(&self) -> [bool; ACTION_COUNT] {
        let mut actions: Option<u16> = None;

        for &i in &INTERVENTIONS {
            if self.required[i.index()] {
                let bits = i.action_bits();
                actions = Some(match actions {
                    Some(a) => a & bits,
                    None => bits,
                });
            }
        }

        for &i in &INTERVENTIONS {
            if !self.allowed[i.index()] && !self.required[i.index()] {
                match actions.as_mut() {
                    Some(a) => *a &= !i.action_bits(),
                    None => break,
                }
            }
        }

        let bits = actions.unwrap_or_else(|| {
            let mut union = 0u16;
            for &i in &INTERVENTIONS {
                if self.allowed[i.index()] {
                    union |= i.action_bits();
                }
            }
            for &i in &INTERVENTIONS {
                if !self.allowed[i.index()] {
                    union &= !i.action_bits();
                }
            }
            union
        });

        let mut mask = [false; ACTION_COUNT];
        for (a, slot) in mask.iter_mut().enumerate() {
            *slot = bits & (1 << a) != 0;
        }
        mask
    }
}
