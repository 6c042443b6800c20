//! Event and candidate data model for the reduced calibration ntuples.

use crate::error::{Error, Result};

/// EB/EE transition: superclusters with |eta| below this sit in the barrel.
pub const BARREL_ETA_MAX: f32 = 1.479;

/// Maximum number of candidate slots per event.
pub const MAX_CANDIDATES: usize = 3;

/// Seed-crystal coordinates of a supercluster.
///
/// In the barrel `ix` is the signed crystal ring (ieta) and `iy` the
/// azimuthal index (iphi); in the endcaps they are the plain (ix, iy)
/// crystal coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed {
    /// First seed coordinate (ieta in the barrel).
    pub ix: i32,
    /// Second seed coordinate (iphi in the barrel).
    pub iy: i32,
}

/// One reconstructed hit attached to a candidate's cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecHit {
    /// Deposited energy (GeV).
    pub energy: f32,
    /// Fraction of the hit assigned to this cluster.
    pub fraction: f32,
    /// First crystal coordinate (ieta in the barrel).
    pub ix: i32,
    /// Second crystal coordinate (iphi in the barrel).
    pub iy: i32,
    /// Detector side (0 in the barrel).
    pub iz: i32,
    /// Reconstruction quality flag.
    pub flag: i32,
}

/// One electron candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Track charge.
    pub charge: i32,
    /// Seed crystal of the supercluster.
    pub seed: Seed,
    /// Supercluster pseudorapidity.
    pub eta_sc: f32,
    /// Supercluster azimuth.
    pub phi_sc: f32,
    /// Track pseudorapidity.
    pub eta: f32,
    /// Track azimuth.
    pub phi: f32,
    /// Uncalibrated supercluster energy (GeV).
    pub energy_raw: f32,
    /// Calibrated cluster energy (GeV).
    pub energy: f32,
    /// Preshower energy (GeV); zero in the barrel.
    pub energy_es: f32,
    /// Track momentum at the vertex (GeV).
    pub p: f32,
    /// Fraction of the momentum lost to bremsstrahlung.
    pub fbrem: f32,
    /// Cluster rechits; present only on the first two slots.
    pub rechits: Option<Vec<RecHit>>,
}

impl Candidate {
    /// Whether the supercluster sits in the barrel.
    pub fn is_barrel(&self) -> bool {
        self.eta_sc.abs() < BARREL_ETA_MAX
    }
}

/// One event: identifiers plus up to [`MAX_CANDIDATES`] candidates in slot order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    /// Run number.
    pub run: u32,
    /// Luminosity block.
    pub lumi: u32,
    /// Event number within the run.
    pub event: u64,
    /// Invariant mass of the candidate pair (GeV); zero when absent.
    pub mee: f32,
    candidates: Vec<Candidate>,
}

impl Event {
    /// Create an event with no candidates.
    pub fn new(run: u32, lumi: u32, event: u64) -> Self {
        Self { run, lumi, event, mee: 0.0, candidates: Vec::new() }
    }

    /// Append a candidate to the next free slot.
    ///
    /// Fails once all [`MAX_CANDIDATES`] slots are taken.
    pub fn push_candidate(&mut self, cand: Candidate) -> Result<()> {
        if self.candidates.len() >= MAX_CANDIDATES {
            return Err(Error::Validation(format!(
                "event {} has more than {} candidates",
                self.event, MAX_CANDIDATES
            )));
        }
        self.candidates.push(cand);
        Ok(())
    }

    /// Candidates in slot order.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }
}
