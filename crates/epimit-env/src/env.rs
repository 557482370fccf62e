use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use epimit_core::{CompartmentGrid, HistoricalDataset, RateTable};

use crate::action::{Action, ACTION_COUNT};
use crate::dynamics::{sample_rate, step_dynamics, VaccinationUptake};
use crate::error::EnvError;
use crate::policy::PolicyState;

/// Average daily unvaccinated → fully-vaccinated uptake over the study
/// period, substituted for the reported value under vaccination-campaign
/// actions.
const AVERAGE_UV_TO_FV_UPTAKE: f64 = 0.007_084_760_245_099_044;

/// Simulation parameters. `Default` reproduces the calibrated study setup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Total (living plus deceased) reference population.
    pub population: f64,
    /// Day offset into the historical series where episodes start.
    pub start_offset: usize,
    /// Episode horizon in days.
    pub max_timesteps: usize,
    /// Weight of the infected fraction in the reward penalty.
    pub infection_coefficient: f64,
    /// Standard deviation of per-step rate noise, as a fraction of the mean.
    pub noise_fraction: f64,
    /// Uptake substituted under vaccination-campaign actions.
    pub forced_uv_to_fv_uptake: f64,
    /// RNG seed. `reset` reseeds from this value, so a given seed and
    /// action sequence replays exactly.
    pub seed: u64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            population: 19_453_734.0,
            start_offset: 214,
            max_timesteps: 181,
            infection_coefficient: 500_000.0,
            noise_fraction: 0.05,
            forced_uv_to_fv_uptake: AVERAGE_UV_TO_FV_UPTAKE,
            seed: 0,
        }
    }
}

/// What a policy learner sees after each step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Infected count as a fraction of the population.
    pub infected_fraction: f64,
    /// Economic-and-social rate, normalized from 0..=100 to 0..=1.
    pub economic_rate: f64,
    pub previous_action: u8,
    pub current_action: u8,
}

impl Observation {
    pub fn to_array(self) -> [f64; 4] {
        [
            self.infected_fraction,
            self.economic_rate,
            f64::from(self.previous_action),
            f64::from(self.current_action),
        ]
    }
}

/// Diagnostics accompanying each step.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StepInfo {
    /// Absolute day of the calibrated timeline this step simulated.
    pub day: usize,
    /// Epoch whose calibrated rates were sampled.
    pub epoch: usize,
    pub new_cases: f64,
    /// Un-normalized economic-and-social rate, 0..=100.
    pub economic_rate: f64,
    pub infected_total: f64,
    pub deceased_total: f64,
    /// Population delta lost to (or gained from) count truncation.
    pub truncation_drift: f64,
}

/// Outcome of one environment step.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// One recorded step of an episode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub timestep: usize,
    pub action: u8,
    /// Compartment totals [S, E, I, H, R, D] summed over tiers.
    pub compartment_totals: [f64; 6],
    pub new_cases: f64,
    pub economic_rate: f64,
    pub reward: f64,
}

/// Per-step trajectory of the current episode, cleared on `reset`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EpisodeHistory {
    records: Vec<EpisodeRecord>,
}

impl EpisodeHistory {
    pub fn records(&self) -> &[EpisodeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn push(&mut self, record: EpisodeRecord) {
        self.records.push(record);
    }

    fn clear(&mut self) {
        self.records.clear();
    }
}

/// The mitigation-policy simulation environment.
///
/// Drives the daily compartment dynamics under a policy's actions and
/// scores each day by infection burden against economic activity. The
/// legality mask reports which actions respect the duration constraints;
/// `step` itself accepts any in-range action, leaving constraint handling
/// to the learner.
pub struct MitigationEnv {
    dataset: HistoricalDataset,
    rates: RateTable,
    cfg: EnvConfig,
    rng: StdRng,
    grid: CompartmentGrid,
    economic_rate: f64,
    timestep: usize,
    policy: PolicyState,
    previous_action: Action,
    current_action: Action,
    history: EpisodeHistory,
}

impl MitigationEnv {
    pub fn new(dataset: HistoricalDataset, rates: RateTable, cfg: EnvConfig) -> Self {
        let grid = dataset.grid_at(cfg.start_offset);
        let rng = StdRng::seed_from_u64(cfg.seed);
        Self {
            dataset,
            rates,
            cfg,
            rng,
            grid,
            economic_rate: 100.0,
            timestep: 0,
            policy: PolicyState::new(),
            previous_action: Action::default(),
            current_action: Action::default(),
            history: EpisodeHistory::default(),
        }
    }

    /// Rewind to the start of the study window and reseed the RNG.
    pub fn reset(&mut self) -> Observation {
        self.rng = StdRng::seed_from_u64(self.cfg.seed);
        self.grid = self.dataset.grid_at(self.cfg.start_offset);
        self.economic_rate = 100.0;
        self.timestep = 0;
        self.policy = PolicyState::new();
        self.previous_action = Action::default();
        self.current_action = Action::default();
        self.history.clear();
        self.observation()
    }

    /// Simulate one day under `action`.
    pub fn step(&mut self, action: Action) -> Result<StepResult, EnvError> {
        let infected_fraction = self.grid.infected_total() / self.cfg.population;

        self.previous_action = self.current_action;
        self.current_action = action;

        let day = self.timestep + self.cfg.start_offset;
        let epoch = RateTable::epoch_for_day(day);
        let means = self.rates.epoch(epoch)?;
        let beta = means.beta * action.beta_multiplier(infected_fraction);

        self.economic_rate =
            (self.economic_rate * action.economic_multiplier(infected_fraction)).min(100.0);

        self.policy.record_action(action);

        let noise = self.cfg.noise_fraction;
        let rng = &mut self.rng;
        let sampled = means
            .with_beta(beta)
            .map(|mean| sample_rate(rng, mean, noise));

        let row = self.dataset.row(day);
        let uptake = VaccinationUptake {
            uv_to_fv: if action.forces_average_uptake() {
                self.cfg.forced_uv_to_fv_uptake
            } else {
                row.pct_uv_to_fv
            },
            fv_to_bv: row.pct_fv_to_bv,
        };

        let outcome = step_dynamics(&self.grid, &sampled, uptake, self.cfg.population);
        self.grid = outcome.grid;

        self.policy.refresh();
        self.timestep += 1;

        let infected_total = self.grid.infected_total();
        let reward = -self.cfg.infection_coefficient * infected_total / self.cfg.population
            + self.economic_rate;
        let done = infected_total >= 0.99 * self.cfg.population
            || self.timestep >= self.cfg.max_timesteps;

        debug!(
            "day {day} action {} infected {infected_total} esr {:.2} reward {reward:.2}",
            action.value(),
            self.economic_rate,
        );

        let info = StepInfo {
            day,
            epoch,
            new_cases: outcome.new_cases,
            economic_rate: self.economic_rate,
            infected_total,
            deceased_total: self
                .grid
                .compartment_total(epimit_core::Compartment::Deceased),
            truncation_drift: outcome.truncation_drift,
        };

        self.history.push(EpisodeRecord {
            timestep: self.timestep - 1,
            action: action.value(),
            compartment_totals: epimit_core::COMPARTMENTS
                .map(|c| self.grid.compartment_total(c)),
            new_cases: outcome.new_cases,
            economic_rate: self.economic_rate,
            reward,
        });

        Ok(StepResult {
            observation: self.observation(),
            reward,
            done,
            info,
        })
    }

    pub fn observation(&self) -> Observation {
        Observation {
            infected_fraction: self.grid.infected_total() / self.cfg.population,
            economic_rate: self.economic_rate / 100.0,
            previous_action: self.previous_action.value(),
            current_action: self.current_action.value(),
        }
    }

    /// Which of the 12 actions respect the duration constraints right now.
    pub fn allowed_actions_mask(&self) -> [bool; ACTION_COUNT] {
        self.policy.allowed_actions_mask()
    }

    pub fn grid(&self) -> &CompartmentGrid {
        &self.grid
    }

    pub fn economic_rate(&self) -> f64 {
        self.economic_rate
    }

    pub fn timestep(&self) -> usize {
        self.timestep
    }

    pub fn policy(&self) -> &PolicyState {
        &self.policy
    }

    pub fn history(&self) -> &EpisodeHistory {
        &self.history
    }

    pub fn config(&self) -> &EnvConfig {
        &self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epimit_core::{Compartment, DatasetRow, COMPARTMENTS, TIERS};

    fn seeded_row(date: i64) -> DatasetRow {
        let mut grid = CompartmentGrid::new();
        let [uv, fv, bv] = TIERS;
        grid.set(Compartment::Susceptible, uv, 8_000_000.0);
        grid.set(Compartment::Susceptible, fv, 6_000_000.0);
        grid.set(Compartment::Susceptible, bv, 2_000_000.0);
        grid.set(Compartment::Exposed, uv, 20_000.0);
        grid.set(Compartment::Exposed, fv, 10_000.0);
        grid.set(Compartment::Exposed, bv, 3_000.0);
        grid.set(Compartment::Infected, uv, 9_000.0);
        grid.set(Compartment::Infected, fv, 4_000.0);
        grid.set(Compartment::Infected, bv, 1_000.0);
        grid.set(Compartment::Hospitalized, uv, 900.0);
        grid.set(Compartment::Hospitalized, fv, 300.0);
        grid.set(Compartment::Hospitalized, bv, 50.0);
        grid.set(Compartment::Recovered, uv, 1_500_000.0);
        grid.set(Compartment::Recovered, fv, 900_000.0);
        grid.set(Compartment::Recovered, bv, 100_000.0);
        grid.set(Compartment::Deceased, uv, 40_000.0);
        grid.set(Compartment::Deceased, fv, 5_000.0);
        grid.set(Compartment::Deceased, bv, 500.0);
        DatasetRow {
            date,
            grid,
            new_cases: 3_000.0,
            pct_uv_to_fv: 0.002,
            pct_fv_to_bv: 0.001,
        }
    }

    fn test_env(seed: u64) -> MitigationEnv {
        let dataset = HistoricalDataset::new(vec![seeded_row(0)]).unwrap();
        let cfg = EnvConfig {
            start_offset: 0,
            seed,
            ..EnvConfig::default()
        };
        MitigationEnv::new(dataset, RateTable::calibrated(), cfg)
    }

    #[test]
    fn reset_returns_the_initial_observation() {
        let mut env = test_env(1);
        let obs = env.reset();
        assert_eq!(obs.economic_rate, 1.0);
        assert_eq!(obs.previous_action, 0);
        assert_eq!(obs.current_action, 0);
        assert!(obs.infected_fraction > 0.0);
        assert!(env.history().is_empty());
    }

    #[test]
    fn same_seed_and_actions_replay_exactly() {
        let mut a = test_env(42);
        let mut b = test_env(42);
        a.reset();
        b.reset();
        for action in [0i64, 1, 1, 5, 2, 0] {
            let ra = a.step(Action::new(action).unwrap()).unwrap();
            let rb = b.step(Action::new(action).unwrap()).unwrap();
            assert_eq!(ra.observation, rb.observation);
            assert_eq!(ra.reward, rb.reward);
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = test_env(1);
        let mut b = test_env(2);
        a.reset();
        b.reset();
        let ra = a.step(Action::new(1).unwrap()).unwrap();
        let rb = b.step(Action::new(1).unwrap()).unwrap();
        assert_ne!(ra.observation.infected_fraction, rb.observation.infected_fraction);
    }

    #[test]
    fn economic_rate_never_exceeds_cap() {
        let mut env = test_env(3);
        env.reset();
        for _ in 0..30 {
            let result = env.step(Action::new(0).unwrap()).unwrap();
            assert!(result.info.economic_rate <= 100.0);
            assert!(result.observation.economic_rate <= 1.0);
        }
    }

    #[test]
    fn episode_terminates_at_the_horizon() {
        let mut env = test_env(4);
        env.reset();
        let mut done = false;
        for step in 0..env.config().max_timesteps {
            let result = env.step(Action::new(0).unwrap()).unwrap();
            done = result.done;
            if done {
                assert_eq!(step + 1, env.timestep());
                break;
            }
        }
        assert!(done);
        assert!(env.timestep() <= 181);
    }

    #[test]
    fn counts_remain_non_negative_over_a_full_episode() {
        let mut env = test_env(5);
        env.reset();
        loop {
            let result = env.step(Action::new(2).unwrap()).unwrap();
            for &c in &COMPARTMENTS {
                for &t in &TIERS {
                    assert!(env.grid().get(c, t) >= 0.0);
                }
            }
            if result.done {
                break;
            }
        }
    }

    #[test]
    fn step_zero_restricts_the_mask_to_action_zero() {
        let mut env = test_env(6);
        env.reset();
        assert_eq!(env.allowed_actions_mask(), [true; ACTION_COUNT]);
        env.step(Action::new(0).unwrap()).unwrap();
        let mask = env.allowed_actions_mask();
        assert!(mask[0]);
        assert!(mask[1..].iter().all(|&m| !m));
    }

    #[test]
    fn history_tracks_every_step() {
        let mut env = test_env(7);
        env.reset();
        env.step(Action::new(1).unwrap()).unwrap();
        env.step(Action::new(1).unwrap()).unwrap();
        assert_eq!(env.history().len(), 2);
        let rec = &env.history().records()[1];
        assert_eq!(rec.timestep, 1);
        assert_eq!(rec.action, 1);
        assert_eq!(rec.compartment_totals.len(), 6);
        env.reset();
        assert!(env.history().is_empty());
    }

    #[test]
    fn observation_array_layout_is_stable() {
        let obs = Observation {
            infected_fraction: 0.25,
            economic_rate: 0.5,
            previous_action: 3,
            current_action: 7,
        };
        assert_eq!(obs.to_array(), [0.25, 0.5, 3.0, 7.0]);
    }

    #[test]
    fn observation_survives_serialization() {
        let obs = Observation {
            infected_fraction: 0.1,
            economic_rate: 0.9,
            previous_action: 1,
            current_action: 2,
        };
        let json = serde_json::to_string(&obs).unwrap();
        let back: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(obs, back);
    }
}
