use serde::{Deserialize, Serialize};

use crate::compartments::{CompartmentGrid, COMPARTMENTS, TIERS};
use crate::error::CoreError;

/// One day of the cleaned historical series.
///
/// Upstream ETL guarantees a complete daily series with consistent units;
/// this type only re-checks the invariants the core depends on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatasetRow {
    /// Date as a day ordinal (strictly increasing by 1 across the series).
    pub date: i64,
    /// Per-compartment, per-tier population counts.
    pub grid: CompartmentGrid,
    /// Reported new cases for this day.
    pub new_cases: f64,
    /// Fraction of unvaccinated individuals becoming fully vaccinated today.
    pub pct_uv_to_fv: f64,
    /// Fraction of fully vaccinated individuals receiving a booster today.
    pub pct_fv_to_bv: f64,
}

/// The daily historical dataset both the simulation environment and the
/// calibration engine read from. Rows are indexed by day offset from the
/// start of the series; lookups past the end clamp to the last row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoricalDataset {
    rows: Vec<DatasetRow>,
}

impl HistoricalDataset {
    pub fn new(rows: Vec<DatasetRow>) -> Result<Self, CoreError> {
        if rows.is_empty() {
            return Err(CoreError::EmptyDataset);
        }
        for (i, pair) in rows.windows(2).enumerate() {
            if pair[1].date <= pair[0].date {
                return Err(CoreError::NonMonotonicDates { row: i + 1 });
            }
        }
        for (i, row) in rows.iter().enumerate() {
            for &c in &COMPARTMENTS {
                for &t in &TIERS {
                    let value = row.grid.get(c, t);
                    if value < 0.0 {
                        return Err(CoreError::NegativeCount {
                            row: i,
                            column: c.name(),
                            value,
                        });
                    }
                }
            }
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        false // construction rejects empty series
    }

    /// Row for a day offset, clamped to the final row past the series end.
    pub fn row(&self, day: usize) -> &DatasetRow {
        &self.rows[day.min(self.rows.len() - 1)]
    }

    /// Compartment grid snapshot at a day offset (clamped).
    pub fn grid_at(&self, day: usize) -> CompartmentGrid {
        self.row(day).grid.clone()
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }
}
