//! The ring-indexed E/p grid: accumulation and per-ring normalization.

use crate::error::{Error, Result};

/// Number of ring columns: rings `RING_MIN..=RING_MAX`, ring 0 included.
pub const N_RINGS: usize = 171;

/// First ring index covered by the grid.
pub const RING_MIN: i32 = -85;

/// Last ring index covered by the grid.
pub const RING_MAX: i32 = 85;

/// Column index for a ring, or `None` outside [`RING_MIN`, `RING_MAX`].
pub fn ring_column(ring: i32) -> Option<usize> {
    if (RING_MIN..=RING_MAX).contains(&ring) {
        Some((ring - RING_MIN) as usize)
    } else {
        None
    }
}

/// Uniform E/p axis with under/overflow cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EopAxis {
    n_bins: usize,
    min: f64,
    max: f64,
}

impl EopAxis {
    /// Default lower edge of the E/p range.
    pub const DEFAULT_MIN: f64 = 0.2;
    /// Default upper edge of the E/p range.
    pub const DEFAULT_MAX: f64 = 1.9;
    /// Default number of in-range bins.
    pub const DEFAULT_BINS: usize = 100;

    /// A validated axis over `[min, max)` split into `n_bins` equal bins.
    pub fn new(n_bins: usize, min: f64, max: f64) -> Result<Self> {
        if n_bins == 0 {
            return Err(Error::Config("E/p axis needs at least one bin".into()));
        }
        if !min.is_finite() || !max.is_finite() || !(min < max) {
            return Err(Error::Config(format!("invalid E/p axis range [{}, {})", min, max)));
        }
        Ok(Self { n_bins, min, max })
    }

    /// Number of in-range bins.
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Lower edge of the first in-range bin.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Upper edge of the last in-range bin.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Bin width.
    pub fn width(&self) -> f64 {
        (self.max - self.min) / self.n_bins as f64
    }

    /// Cell index for a ratio, in projection convention:
    /// 0 = underflow, 1..=n_bins = in range, n_bins + 1 = overflow.
    pub fn cell_of(&self, x: f64) -> usize {
        if x < self.min {
            0
        } else if x >= self.max {
            self.n_bins + 1
        } else {
            // Clamp guards the roundoff case where x just under max lands on n_bins.
            let idx = ((x - self.min) / self.width()) as usize;
            idx.min(self.n_bins - 1) + 1
        }
    }
}

impl Default for EopAxis {
    fn default() -> Self {
        Self { n_bins: Self::DEFAULT_BINS, min: Self::DEFAULT_MIN, max: Self::DEFAULT_MAX }
    }
}

/// Outcome of [`EopGrid::normalize_rings`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeSummary {
    /// Ring columns scaled to unit total.
    pub normalized: usize,
    /// Ring columns with zero total, left as zeros.
    pub degenerate: Vec<i32>,
}

/// 2D accumulator: one E/p column per crystal ring.
///
/// Each column stores `[underflow, bin 1 .. bin n, overflow]`. Filling
/// accumulates unit weights; [`EopGrid::normalize_rings`] turns each column
/// into a probability density in place. The normalization divisor includes
/// the flow cells, so entries outside the E/p range still dilute the
/// in-range shape; with a mis-set axis range most of the weight can sit in
/// the flows even though every column sums to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct EopGrid {
    name: String,
    axis: EopAxis,
    /// Row-major cells: ring column `c` occupies `c * (n_bins + 2)` onward.
    cells: Vec<f64>,
    entries: u64,
    out_of_ring: u64,
}

impl EopGrid {
    /// An empty grid over `axis`.
    pub fn new(name: impl Into<String>, axis: EopAxis) -> Self {
        let cells = vec![0.0; N_RINGS * (axis.n_bins() + 2)];
        Self { name: name.into(), axis, cells, entries: 0, out_of_ring: 0 }
    }

    /// Grid name, carried into the output artifact.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The E/p axis.
    pub fn axis(&self) -> EopAxis {
        self.axis
    }

    /// In-ring fills accumulated so far.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Fills dropped because the ring was outside [`RING_MIN`, `RING_MAX`].
    pub fn out_of_ring(&self) -> u64 {
        self.out_of_ring
    }

    /// Every ring covered by the grid, in column order.
    pub fn rings() -> std::ops::RangeInclusive<i32> {
        RING_MIN..=RING_MAX
    }

    fn stride(&self) -> usize {
        self.axis.n_bins() + 2
    }

    /// Add unit weight at (`ring`, `ratio`).
    ///
    /// Ratios outside the axis range land in the column's flow cells;
    /// rings outside the grid are counted and dropped.
    pub fn fill(&mut self, ring: i32, ratio: f64) {
        let Some(col) = ring_column(ring) else {
            self.out_of_ring += 1;
            return;
        };
        let cell = col * self.stride() + self.axis.cell_of(ratio);
        self.cells[cell] += 1.0;
        self.entries += 1;
    }

    /// Full cell slice for a ring: `[underflow, bins.., overflow]`.
    pub fn column(&self, ring: i32) -> Option<&[f64]> {
        let col = ring_column(ring)?;
        let s = self.stride();
        Some(&self.cells[col * s..(col + 1) * s])
    }

    /// Column total including the flow cells.
    pub fn column_total(&self, ring: i32) -> Option<f64> {
        self.column(ring).map(|cells| cells.iter().sum())
    }

    /// Iterate columns in ring order with their full cell slices.
    pub fn columns(&self) -> impl Iterator<Item = (i32, &[f64])> {
        Self::rings().zip(self.cells.chunks_exact(self.stride()))
    }

    /// Sum of all cell weights, flows included.
    pub fn total_weight(&self) -> f64 {
        self.cells.iter().sum()
    }

    /// Element-wise sum of `other` into `self`.
    ///
    /// The axes must match exactly. Together with index subsampling this
    /// lets the odd and even grids recombine into the full one.
    pub fn merge(&mut self, other: &EopGrid) -> Result<()> {
        if self.axis != other.axis {
            return Err(Error::Validation(format!(
                "cannot merge grids with different axes: {:?} vs {:?}",
                self.axis, other.axis
            )));
        }
        for (a, b) in self.cells.iter_mut().zip(&other.cells) {
            *a += b;
        }
        self.entries += other.entries;
        self.out_of_ring += other.out_of_ring;
        Ok(())
    }

    /// Normalize every ring column to unit total, flow cells included.
    ///
    /// Columns with zero total are left at zero and reported in the
    /// summary; ring 0 has no crystals, so it shows up there on every
    /// run. A normalized column totals 1, so a second pass divides by 1
    /// and leaves the grid unchanged.
    pub fn normalize_rings(&mut self) -> NormalizeSummary {
        let s = self.stride();
        let mut summary = NormalizeSummary::default();
        for (col, ring) in Self::rings().enumerate() {
            let cells = &mut self.cells[col * s..(col + 1) * s];
            let total: f64 = cells.iter().sum();
            if total == 0.0 {
                log::warn!("ring {}: empty E/p column, leaving it unnormalized", ring);
                summary.degenerate.push(ring);
                continue;
            }
            for c in cells.iter_mut() {
                *c /= total;
            }
            summary.normalized += 1;
        }
        summary
    }
}
