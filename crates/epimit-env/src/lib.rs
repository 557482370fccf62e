//! Discrete-time stochastic simulation of epidemic mitigation policy.
//!
//! The environment advances an 18-cell compartment grid one day per
//! `step(action)`, where the action selects a combination of
//! non-pharmaceutical and vaccination interventions. It exposes the
//! gym-style reset/step/observe contract an external policy learner drives,
//! together with a per-action legality mask derived from minimum and
//! maximum intervention durations.

mod action;
mod dynamics;
mod env;
mod error;
mod policy;

pub use action::{Action, Intervention, ACTION_COUNT, INTERVENTIONS};
pub use dynamics::{step_dynamics, DynamicsOutcome, VaccinationUptake};
pub use env::{
    EnvConfig, EpisodeHistory, EpisodeRecord, MitigationEnv, Observation, StepInfo, StepResult,
};
pub use error::EnvError;
pub use policy::PolicyState;
