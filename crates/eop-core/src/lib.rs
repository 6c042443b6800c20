//! # eop-core
//!
//! Core pipeline for building E/p intercalibration inputs: the event and
//! candidate data model, compiled selection expressions, quantity
//! extraction, and the ring-indexed E/p grid with its per-ring
//! normalization.
//!
//! ## Example
//!
//! ```
//! use eop_core::grid::{EopAxis, EopGrid};
//!
//! let mut grid = EopGrid::new("EopEta", EopAxis::default());
//! grid.fill(-14, 1.03);
//! grid.fill(-14, 0.97);
//! let summary = grid.normalize_rings();
//! assert_eq!(summary.normalized, 1);
//! assert_eq!(grid.column_total(-14), Some(1.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod calib;
pub mod error;
pub mod event;
pub mod extract;
pub mod grid;
pub mod scan;
pub mod select;
pub mod source;

pub use calib::IcTable;
pub use error::{Error, Result};
pub use event::{Candidate, Event, RecHit, Seed};
pub use extract::Extractor;
pub use grid::{EopAxis, EopGrid, NormalizeSummary};
pub use scan::{ScanStats, Subsample, scan_events};
pub use select::{Field, Selection};
pub use source::{EventSource, MemorySource};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
