//! `eopeta`: builds the ring-by-ring E/p distributions used to rescale
//! electron momenta during ECAL intercalibration.

mod cfg;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use eop_core::{scan_events, EopAxis, EopGrid, EventSource, Extractor, Selection, Subsample};
use eop_ntuple::{load_ic_table, GridArtifact, NtupleChain};

use crate::cfg::{CfgFile, Overrides, Settings};

#[derive(Parser)]
#[command(name = "eopeta")]
#[command(about = "Builds the per-ring E/p distributions from reduced calibration ntuples")]
#[command(version)]
struct Cli {
    /// Config file with the input chain and job options
    #[arg(long, value_name = "PATH")]
    cfg: PathBuf,

    /// Intercalibration table (name and text file), overriding the cfg
    #[arg(long = "inputIC", num_args = 2, value_names = ["NAME", "PATH"])]
    input_ic: Option<Vec<String>>,

    /// E/p axis range, overriding the cfg
    #[arg(long = "Eopweightrange", num_args = 2, value_names = ["MIN", "MAX"])]
    eop_range: Option<Vec<f64>>,

    /// Number of E/p bins, overriding the cfg
    #[arg(long = "Eopweightbins", value_name = "N")]
    eop_bins: Option<usize>,

    /// Output artifact path, overriding the cfg
    #[arg(long = "BuildEopEta_output", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Process odd entry indices only
    #[arg(long, conflicts_with = "even")]
    odd: bool,

    /// Process even entry indices only
    #[arg(long)]
    even: bool,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    let cfg = CfgFile::parse(&cli.cfg)?;
    let overrides = Overrides {
        ic: match cli.input_ic.as_deref() {
            Some([name, path]) => Some((name.clone(), PathBuf::from(path))),
            _ => None,
        },
        eop_range: match cli.eop_range.as_deref() {
            Some([lo, hi]) => Some((*lo, *hi)),
            _ => None,
        },
        eop_bins: cli.eop_bins,
        output: cli.output,
    };
    let settings = Settings::resolve(&cfg, overrides)?;

    let subsample = if cli.odd {
        Subsample::Odd
    } else if cli.even {
        Subsample::Even
    } else {
        Subsample::Full
    };

    run(&settings, subsample)
}

fn run(settings: &Settings, subsample: Subsample) -> Result<()> {
    // A broken selection must surface before any event I/O happens.
    let selection = Selection::compile(&settings.selection)?;

    let mut extractor = Extractor::new().with_fbrem_correction(settings.apply_fbrem);
    if let Some((name, path)) = &settings.ic {
        let table = load_ic_table(name, path)?;
        tracing::info!(table = name.as_str(), crystals = table.len(), "loaded intercalibration constants");
        extractor = extractor.with_ic(table);
    }

    let axis = EopAxis::new(settings.eop_bins, settings.eop_min, settings.eop_max)?;
    tracing::info!(bins = axis.n_bins(), min = axis.min(), max = axis.max(), "E/p axis configured");

    let mut chain = NtupleChain::open(&settings.files)?;
    tracing::info!(
        files = chain.n_files(),
        entries = chain.entries(),
        subsample = subsample.label(),
        "opened input chain"
    );

    let mut grid = EopGrid::new("EopEta", axis);
    let stats = scan_events(&mut chain, &selection, &extractor, subsample, &mut grid)?;
    tracing::info!(
        entries = stats.entries_read,
        selected = stats.selected,
        fills = stats.fills,
        out_of_ring = grid.out_of_ring(),
        "scan complete"
    );

    let summary = grid.normalize_rings();
    if !summary.degenerate.is_empty() {
        tracing::warn!(
            normalized = summary.normalized,
            degenerate = summary.degenerate.len(),
            "some rings collected no entries"
        );
    }

    let artifact = GridArtifact::from_grid(&grid, subsample.label());
    artifact
        .write(&settings.output)
        .with_context(|| format!("failed to write {}", settings.output.display()))?;
    tracing::info!(path = %settings.output.display(), "wrote E/p grid");
    Ok(())
}
