//! Sequential scan: subsampling, selection, and grid filling.

use crate::error::{Error, Result};
use crate::extract::Extractor;
use crate::grid::EopGrid;
use crate::select::Selection;
use crate::source::EventSource;

/// Which slice of the entry sequence to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subsample {
    /// Every entry.
    #[default]
    Full,
    /// Odd entry indices only.
    Odd,
    /// Even entry indices only.
    Even,
}

impl Subsample {
    /// Whether the entry at `index` belongs to this subsample.
    ///
    /// Odd and even are disjoint and together cover every index, so the
    /// full grid equals the merge of the odd and even grids.
    pub fn contains(self, index: u64) -> bool {
        match self {
            Subsample::Full => true,
            Subsample::Odd => index % 2 == 1,
            Subsample::Even => index % 2 == 0,
        }
    }

    /// Label used in logs and artifacts.
    pub fn label(self) -> &'static str {
        match self {
            Subsample::Full => "full",
            Subsample::Odd => "odd",
            Subsample::Even => "even",
        }
    }
}

/// Counters reported by [`scan_events`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Entries read from the source, before subsampling.
    pub entries_read: u64,
    /// (event, slot) pairs passing the selection.
    pub selected: u64,
    /// Grid fills, i.e. selected pairs with nonzero momentum.
    pub fills: u64,
}

/// Entries between progress log lines.
const PROGRESS_EVERY: u64 = 100_000;

/// Fill `grid` from every event the source yields.
///
/// Candidates failing the selection are skipped. Candidates with exactly
/// zero momentum are skipped silently; calibration ntuples carry them as
/// placeholder tracks, so they are not an error. Fails up front when the
/// source has no entries.
pub fn scan_events<S: EventSource + ?Sized>(
    source: &mut S,
    selection: &Selection,
    extractor: &Extractor,
    subsample: Subsample,
    grid: &mut EopGrid,
) -> Result<ScanStats> {
    if source.entries() == 0 {
        return Err(Error::EmptyInput);
    }

    let mut stats = ScanStats::default();
    while let Some(event) = source.next_event() {
        let event = event?;
        let index = stats.entries_read;
        stats.entries_read += 1;
        if stats.entries_read % PROGRESS_EVERY == 0 {
            log::debug!("scanned {} entries", stats.entries_read);
        }
        if !subsample.contains(index) {
            continue;
        }
        for (slot, cand) in event.candidates().iter().enumerate() {
            if !selection.accepts(&event, slot) {
                continue;
            }
            stats.selected += 1;
            let p = extractor.momentum(cand);
            if p == 0.0 {
                continue;
            }
            grid.fill(extractor.ring_index(cand), extractor.energy(cand) / p);
            stats.fills += 1;
        }
    }
    Ok(stats)
}
