//! Shared compartment data model for the epidemic mitigation project.
//!
//! This crate owns the types both the policy simulation environment and the
//! parameter calibration engine are built on: the epidemiological
//! compartments stratified by vaccination tier, the epoch-indexed table of
//! calibrated transition rates, and the historical daily dataset the two
//! components read their initial conditions and covariates from.

mod compartments;
mod dataset;
mod error;
mod rates;

pub use compartments::{Compartment, CompartmentGrid, VaccinationTier, COMPARTMENTS, TIERS};
pub use dataset::{DatasetRow, HistoricalDataset};
pub use error::CoreError;
pub use rates::{EpochRates, RateTable, TierRates, EPOCHS, EPOCH_LEN};
