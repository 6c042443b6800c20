//! # eop-ntuple
//!
//! File-format layer of the E/p pipeline: multi-file reduced-ntuple
//! chains (one JSON event record per line, memory-mapped), the
//! intercalibration text-table loader, and the JSON grid artifact.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod chain;
pub mod datasource;
pub mod ic;

pub use artifact::{GridArtifact, RingColumn};
pub use chain::NtupleChain;
pub use datasource::DataSource;
pub use ic::load_ic_table;
