//! Intercalibration table loader.
//!
//! Plain text, one crystal per line: `ieta iphi iz ic [err]`,
//! whitespace separated, `#` starts a comment.

use std::path::Path;

use eop_core::{Error, IcTable, Result};

/// Load the table stored at `path` under the given name.
pub fn load_ic_table(name: &str, path: &Path) -> Result<IcTable> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Calib(format!("failed to read {}: {}", path.display(), e)))?;
    parse_ic_text(name, &text, &path.display().to_string())
}

fn parse_ic_text(name: &str, text: &str, label: &str) -> Result<IcTable> {
    let mut table = IcTable::new(name);
    for (idx, raw) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = match raw.find('#') {
            Some(i) => &raw[..i],
            None => raw,
        };
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.is_empty() {
            continue;
        }
        if cols.len() < 4 {
            return Err(Error::Calib(format!(
                "{}:{}: expected `ieta iphi iz ic [err]`, got {} column(s)",
                label,
                lineno,
                cols.len()
            )));
        }
        let ieta: i32 = parse_col(label, lineno, "ieta", cols[0])?;
        let iphi: i32 = parse_col(label, lineno, "iphi", cols[1])?;
        let _iz: i32 = parse_col(label, lineno, "iz", cols[2])?;
        let ic: f64 = parse_col(label, lineno, "ic", cols[3])?;
        if table.insert(ieta, iphi, ic).is_some() {
            log::warn!(
                "{}:{}: duplicate constant for ({}, {}), keeping the last",
                label,
                lineno,
                ieta,
                iphi
            );
        }
    }
    if table.is_empty() {
        return Err(Error::Calib(format!("{}: no constants found", label)));
    }
    Ok(table)
}

fn parse_col<T: std::str::FromStr>(label: &str, lineno: usize, col: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Calib(format!("{}:{}: invalid {} value '{}'", label, lineno, col, raw)))
}
