//! JSON artifact for a normalized E/p grid.

use std::path::Path;

use eop_core::{EopGrid, Result};
use serde::{Deserialize, Serialize};

/// One ring column of the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingColumn {
    /// Signed ring index.
    pub ring: i32,
    /// Weight below the E/p range.
    pub underflow: f64,
    /// In-range bin contents, low edge to high edge.
    pub bins: Vec<f64>,
    /// Weight at or above the E/p range.
    pub overflow: f64,
}

impl RingColumn {
    /// Column total including the flow cells.
    pub fn total(&self) -> f64 {
        self.underflow + self.bins.iter().sum::<f64>() + self.overflow
    }
}

/// Serialized form of a (normalized) E/p grid.
///
/// Written once after normalization and never rewritten; readers get the
/// flow cells alongside the in-range bins because the normalization
/// divisor includes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridArtifact {
    /// Grid name.
    pub name: String,
    /// Subsample the grid was filled from ("full", "odd", "even").
    pub subsample: String,
    /// Number of in-range E/p bins.
    pub eop_bins: usize,
    /// Lower edge of the E/p range.
    pub eop_min: f64,
    /// Upper edge of the E/p range.
    pub eop_max: f64,
    /// In-ring fills accumulated before normalization.
    pub entries: u64,
    /// Fills dropped for falling outside the ring range.
    pub out_of_ring: u64,
    /// One column per ring, lowest ring first.
    pub columns: Vec<RingColumn>,
}

impl GridArtifact {
    /// Snapshot `grid` for writing.
    pub fn from_grid(grid: &EopGrid, subsample: &str) -> Self {
        let axis = grid.axis();
        let columns = grid
            .columns()
            .map(|(ring, cells)| RingColumn {
                ring,
                underflow: cells[0],
                bins: cells[1..=axis.n_bins()].to_vec(),
                overflow: cells[axis.n_bins() + 1],
            })
            .collect();
        GridArtifact {
            name: grid.name().to_string(),
            subsample: subsample.to_string(),
            eop_bins: axis.n_bins(),
            eop_min: axis.min(),
            eop_max: axis.max(),
            entries: grid.entries(),
            out_of_ring: grid.out_of_ring(),
            columns,
        }
    }

    /// Write the artifact as pretty JSON to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Read an artifact back from `path`.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
