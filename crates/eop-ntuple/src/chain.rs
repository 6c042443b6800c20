//! Multi-file reduced-ntuple chain.
//!
//! Each input file holds one JSON event record per line. Entry counts are
//! fixed when the chain is opened; records decode lazily, one entry per
//! [`EventSource::next_event`] call, and decode failures carry the file
//! and line they came from.

use std::path::PathBuf;

use eop_core::event::MAX_CANDIDATES;
use eop_core::{Candidate, Error, Event, EventSource, RecHit, Result, Seed};
use serde::Deserialize;

use crate::datasource::DataSource;

// ── Wire records ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EventRecord {
    run: u32,
    lumi: u32,
    event: u64,
    #[serde(default)]
    mee: f32,
    candidates: Vec<CandidateRecord>,
}

#[derive(Debug, Deserialize)]
struct CandidateRecord {
    charge: i32,
    seed_ix: i32,
    seed_iy: i32,
    eta_sc: f32,
    phi_sc: f32,
    eta: f32,
    phi: f32,
    energy_raw: f32,
    energy: f32,
    #[serde(default)]
    energy_es: f32,
    p: f32,
    #[serde(default)]
    fbrem: f32,
    #[serde(default)]
    rechits: Option<RecHitBlock>,
}

/// Rechits are stored as parallel arrays, one element per hit.
#[derive(Debug, Deserialize)]
struct RecHitBlock {
    energy: Vec<f32>,
    fraction: Vec<f32>,
    ix: Vec<i32>,
    iy: Vec<i32>,
    iz: Vec<i32>,
    flag: Vec<i32>,
}

impl RecHitBlock {
    fn into_hits(self) -> Result<Vec<RecHit>> {
        let n = self.energy.len();
        let lens =
            [self.fraction.len(), self.ix.len(), self.iy.len(), self.iz.len(), self.flag.len()];
        if lens.iter().any(|&l| l != n) {
            return Err(Error::Ntuple(format!(
                "rechit arrays have mismatched lengths ({} energies vs {:?})",
                n, lens
            )));
        }
        let hits = (0..n)
            .map(|i| RecHit {
                energy: self.energy[i],
                fraction: self.fraction[i],
                ix: self.ix[i],
                iy: self.iy[i],
                iz: self.iz[i],
                flag: self.flag[i],
            })
            .collect();
        Ok(hits)
    }
}

impl CandidateRecord {
    fn into_candidate(self, slot: usize) -> Result<Candidate> {
        let rechits = match self.rechits {
            Some(block) => {
                // Only the first two slots carry clusters with rechits.
                if slot >= 2 {
                    return Err(Error::Ntuple(format!("slot {} carries rechits", slot)));
                }
                Some(block.into_hits()?)
            }
            None => None,
        };
        Ok(Candidate {
            charge: self.charge,
            seed: Seed { ix: self.seed_ix, iy: self.seed_iy },
            eta_sc: self.eta_sc,
            phi_sc: self.phi_sc,
            eta: self.eta,
            phi: self.phi,
            energy_raw: self.energy_raw,
            energy: self.energy,
            energy_es: self.energy_es,
            p: self.p,
            fbrem: self.fbrem,
            rechits,
        })
    }
}

fn decode_record(line: &[u8]) -> Result<Event> {
    let rec: EventRecord = serde_json::from_slice(line)?;
    if rec.candidates.len() > MAX_CANDIDATES {
        return Err(Error::Ntuple(format!(
            "{} candidates in one event (limit {})",
            rec.candidates.len(),
            MAX_CANDIDATES
        )));
    }
    let mut event = Event::new(rec.run, rec.lumi, rec.event);
    event.mee = rec.mee;
    for (slot, cand) in rec.candidates.into_iter().enumerate() {
        event.push_candidate(cand.into_candidate(slot)?)?;
    }
    Ok(event)
}

// ── Chain ──────────────────────────────────────────────────────

#[derive(Debug)]
struct ChainFile {
    /// Path (or a placeholder for in-memory buffers), used in errors.
    label: String,
    data: DataSource,
    entries: u64,
}

impl ChainFile {
    fn new(label: String, data: DataSource) -> Self {
        let entries = count_records(&data);
        Self { label, data, entries }
    }
}

/// Number of non-blank lines in a file image.
fn count_records(data: &[u8]) -> u64 {
    data.split(|&b| b == b'\n').filter(|line| !is_blank(line)).count() as u64
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}

/// Ordered chain of ntuple files exposed as one event sequence.
#[derive(Debug)]
pub struct NtupleChain {
    files: Vec<ChainFile>,
    entries: u64,
    current: usize,
    offset: usize,
    line: u64,
}

impl NtupleChain {
    /// Open every file in `paths`, in order.
    ///
    /// The chain's entry count is the sum of the per-file record counts,
    /// established here by scanning record boundaries.
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        if paths.is_empty() {
            return Err(Error::Config("input chain needs at least one file".into()));
        }
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let data = DataSource::open(path)
                .map_err(|e| Error::Ntuple(format!("failed to open {}: {}", path.display(), e)))?;
            files.push(ChainFile::new(path.display().to_string(), data));
        }
        Ok(Self::from_files(files))
    }

    /// Chain over in-memory file images, in order.
    pub fn from_bytes(buffers: Vec<Vec<u8>>) -> Self {
        let files = buffers
            .into_iter()
            .enumerate()
            .map(|(i, buf)| ChainFile::new(format!("<memory:{}>", i), DataSource::Owned(buf)))
            .collect();
        Self::from_files(files)
    }

    fn from_files(files: Vec<ChainFile>) -> Self {
        let entries = files.iter().map(|f| f.entries).sum();
        Self { files, entries, current: 0, offset: 0, line: 0 }
    }

    /// Number of files in the chain.
    pub fn n_files(&self) -> usize {
        self.files.len()
    }
}

impl EventSource for NtupleChain {
    fn entries(&self) -> u64 {
        self.entries
    }

    fn next_event(&mut self) -> Option<Result<Event>> {
        loop {
            let file = self.files.get(self.current)?;
            if self.offset >= file.data.len() {
                self.current += 1;
                self.offset = 0;
                self.line = 0;
                continue;
            }
            let rest = &file.data[self.offset..];
            let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
            let record = &rest[..end];
            self.offset += end + 1;
            self.line += 1;
            if is_blank(record) {
                continue;
            }
            let context = format!("{}:{}", file.label, self.line);
            return Some(
                decode_record(record).map_err(|e| Error::Ntuple(format!("{}: {}", context, e))),
            );
        }
    }
}
