//! Candidate-level quantities feeding the E/p grid.

use crate::calib::IcTable;
use crate::event::Candidate;

/// Computes energy, momentum, and ring index for a candidate.
///
/// Holds the optional intercalibration table and the momentum-correction
/// switch, both resolved once at startup.
#[derive(Debug, Default)]
pub struct Extractor {
    ic: Option<IcTable>,
    apply_fbrem: bool,
}

impl Extractor {
    /// Extractor with no intercalibration and no momentum correction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the intercalibration constants in `table` to cluster energies.
    pub fn with_ic(mut self, table: IcTable) -> Self {
        self.ic = Some(table);
        self
    }

    /// Scale momenta by (1 - fbrem) to undo bremsstrahlung losses.
    pub fn with_fbrem_correction(mut self, apply: bool) -> Self {
        self.apply_fbrem = apply;
        self
    }

    /// The loaded intercalibration table, if any.
    pub fn ic(&self) -> Option<&IcTable> {
        self.ic.as_ref()
    }

    /// Cluster energy with the intercalibration constant applied.
    ///
    /// Crystals absent from the table keep the uncorrected energy.
    pub fn energy(&self, cand: &Candidate) -> f64 {
        let e = f64::from(cand.energy);
        self.ic
            .as_ref()
            .and_then(|table| table.correction(cand.seed.ix, cand.seed.iy))
            .map_or(e, |ic| e * ic)
    }

    /// Track momentum at the vertex, optionally bremsstrahlung-corrected.
    pub fn momentum(&self, cand: &Candidate) -> f64 {
        let p = f64::from(cand.p);
        if self.apply_fbrem { p * (1.0 - f64::from(cand.fbrem)) } else { p }
    }

    /// Ring index of the seed crystal: the signed ieta ring in the barrel,
    /// the second seed coordinate otherwise.
    pub fn ring_index(&self, cand: &Candidate) -> i32 {
        if cand.is_barrel() { cand.seed.ix } else { cand.seed.iy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Seed;
    use approx::assert_relative_eq;

    fn candidate(seed: Seed, eta_sc: f32, energy: f32, p: f32, fbrem: f32) -> Candidate {
        Candidate {
            charge: -1,
            seed,
            eta_sc,
            phi_sc: 0.0,
            eta: eta_sc,
            phi: 0.0,
            energy_raw: energy,
            energy,
            energy_es: 0.0,
            p,
            fbrem,
            rechits: None,
        }
    }

    #[test]
    fn energy_uses_table_when_present() {
        let mut table = IcTable::new("ic");
        table.insert(-14, 211, 1.05);
        let ex = Extractor::new().with_ic(table);

        let hit = candidate(Seed { ix: -14, iy: 211 }, -0.25, 40.0, 38.0, 0.0);
        assert_relative_eq!(ex.energy(&hit), 42.0, epsilon = 1e-6);

        let miss = candidate(Seed { ix: 30, iy: 5 }, 0.5, 40.0, 38.0, 0.0);
        assert_relative_eq!(ex.energy(&miss), 40.0, epsilon = 1e-6);
    }

    #[test]
    fn energy_without_table_is_uncorrected() {
        let ex = Extractor::new();
        let cand = candidate(Seed { ix: 2, iy: 2 }, 0.1, 41.2, 40.0, 0.0);
        assert_relative_eq!(ex.energy(&cand), 41.2, epsilon = 1e-6);
    }

    #[test]
    fn momentum_correction_is_opt_in() {
        let cand = candidate(Seed { ix: 2, iy: 2 }, 0.1, 40.0, 50.0, 0.2);
        assert_relative_eq!(Extractor::new().momentum(&cand), 50.0, epsilon = 1e-6);

        let ex = Extractor::new().with_fbrem_correction(true);
        assert_relative_eq!(ex.momentum(&cand), 40.0, epsilon = 1e-6);
    }

    #[test]
    fn ring_index_follows_detector_region() {
        let ex = Extractor::new();
        let barrel = candidate(Seed { ix: -14, iy: 211 }, -0.25, 40.0, 40.0, 0.0);
        assert_eq!(ex.ring_index(&barrel), -14);

        let endcap = candidate(Seed { ix: 55, iy: 60 }, 2.1, 40.0, 40.0, 0.0);
        assert_eq!(ex.ring_index(&endcap), 60);
    }

    #[test]
    fn energy_over_momentum_ratios() {
        let ex = Extractor::new();
        let a = candidate(Seed { ix: -14, iy: 211 }, -0.25, 41.2, 40.0, 0.0);
        let b = candidate(Seed { ix: 20, iy: 33 }, 0.36, 33.0, 55.0, 0.0);
        assert_relative_eq!(ex.energy(&a) / ex.momentum(&a), 1.03, epsilon = 1e-6);
        assert_relative_eq!(ex.energy(&b) / ex.momentum(&b), 0.6, epsilon = 1e-6);
    }
}
