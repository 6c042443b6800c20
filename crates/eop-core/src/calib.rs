//! Intercalibration constant tables.

use std::collections::HashMap;

/// A named set of per-crystal intercalibration constants, keyed by the
/// seed-crystal coordinates (ieta, iphi).
#[derive(Debug, Clone, Default)]
pub struct IcTable {
    name: String,
    constants: HashMap<(i32, i32), f64>,
}

impl IcTable {
    /// An empty table called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), constants: HashMap::new() }
    }

    /// Table name, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of crystals with a constant.
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    /// Whether the table holds no constants.
    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Set the constant for a crystal; returns the value it replaces, if any.
    pub fn insert(&mut self, ieta: i32, iphi: i32, ic: f64) -> Option<f64> {
        self.constants.insert((ieta, iphi), ic)
    }

    /// Constant for the given crystal, if present.
    pub fn correction(&self, ieta: i32, iphi: i32) -> Option<f64> {
        self.constants.get(&(ieta, iphi)).copied()
    }
}
