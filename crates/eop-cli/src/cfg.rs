//! Line-based job config files and the resolved settings.
//!
//! The format is a small block-scoped key/value language: `#` starts a
//! comment, `<Block>` / `</Block>` delimit a section, and inside a section
//! each line is `key value...` (first token the key, the rest its values).
//! The dotted form `Block.key value...` works at top level. Later
//! assignments override earlier ones.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use eop_core::{EopAxis, Error, Result};

/// Output path used when neither the cfg nor the CLI names one.
pub const DEFAULT_OUTPUT: &str = "EopEta.json";

/// A parsed config file: flat `Block.key` options.
#[derive(Debug, Default)]
pub struct CfgFile {
    options: HashMap<String, Vec<String>>,
}

impl CfgFile {
    /// Parse the config file at `path`.
    pub fn parse(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse_str(&text, &path.display().to_string())
    }

    /// Parse config text, with `label` naming the source in errors.
    pub fn parse_str(text: &str, label: &str) -> Result<Self> {
        let mut options = HashMap::new();
        let mut block: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let lineno = idx + 1;
            let line = match raw.find('#') {
                Some(pos) => &raw[..pos],
                None => raw,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(name) = line.strip_prefix("</").and_then(|r| r.strip_suffix('>')) {
                match block.take() {
                    Some(open) if open == name => {}
                    Some(open) => {
                        return Err(Error::Config(format!(
                            "{}:{}: </{}> closes <{}>",
                            label, lineno, name, open
                        )));
                    }
                    None => {
                        return Err(Error::Config(format!(
                            "{}:{}: </{}> without an open block",
                            label, lineno, name
                        )));
                    }
                }
                continue;
            }
            if let Some(name) = line.strip_prefix('<').and_then(|r| r.strip_suffix('>')) {
                if let Some(open) = &block {
                    return Err(Error::Config(format!(
                        "{}:{}: <{}> opened inside <{}>",
                        label, lineno, name, open
                    )));
                }
                block = Some(name.to_string());
                continue;
            }

            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            let values: Vec<String> = tokens.map(str::to_string).collect();
            let full_key = match &block {
                Some(name) => format!("{}.{}", name, key),
                None if key.contains('.') => key.to_string(),
                None => {
                    return Err(Error::Config(format!(
                        "{}:{}: option `{}` outside any block",
                        label, lineno, key
                    )));
                }
            };
            if values.is_empty() {
                return Err(Error::Config(format!(
                    "{}:{}: option `{}` has no value",
                    label, lineno, full_key
                )));
            }
            options.insert(full_key, values);
        }

        if let Some(open) = block {
            return Err(Error::Config(format!("{}: <{}> never closed", label, open)));
        }
        Ok(Self { options })
    }

    /// All values of an option, if set.
    pub fn values(&self, key: &str) -> Option<&[String]> {
        self.options.get(key).map(Vec::as_slice)
    }

    /// Single value of an option, rejecting multi-valued assignments.
    pub fn value(&self, key: &str) -> Result<Option<&str>> {
        match self.values(key) {
            None => Ok(None),
            Some([v]) => Ok(Some(v)),
            Some(vals) => Err(Error::Config(format!(
                "option `{}` expects one value, got {}",
                key,
                vals.len()
            ))),
        }
    }
}

/// CLI flags that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    /// Intercalibration table name and path.
    pub ic: Option<(String, PathBuf)>,
    /// E/p axis range.
    pub eop_range: Option<(f64, f64)>,
    /// Number of E/p bins.
    pub eop_bins: Option<usize>,
    /// Output artifact path.
    pub output: Option<PathBuf>,
}

/// Everything a job needs, resolved as CLI over cfg over defaults.
#[derive(Debug)]
pub struct Settings {
    /// Input ntuple files, in chain order.
    pub files: Vec<PathBuf>,
    /// Selection expression source.
    pub selection: String,
    /// Number of in-range E/p bins.
    pub eop_bins: usize,
    /// Lower edge of the E/p range.
    pub eop_min: f64,
    /// Upper edge of the E/p range.
    pub eop_max: f64,
    /// Intercalibration table name and path, if any.
    pub ic: Option<(String, PathBuf)>,
    /// Whether to undo bremsstrahlung losses on the momentum.
    pub apply_fbrem: bool,
    /// Output artifact path.
    pub output: PathBuf,
}

impl Settings {
    /// Resolve job settings from a parsed cfg and the CLI overrides.
    ///
    /// `Input.files` is the one mandatory option. A missing axis range or
    /// bin count falls back to the defaults with a warning, since a
    /// mis-set range silently pushes weight into the flow cells.
    pub fn resolve(cfg: &CfgFile, over: Overrides) -> Result<Self> {
        let files: Vec<PathBuf> = cfg
            .values("Input.files")
            .ok_or_else(|| Error::Config("cfg is missing Input.files".into()))?
            .iter()
            .map(PathBuf::from)
            .collect();

        let selection = match cfg.values("Input.selection") {
            Some(tokens) => tokens.join(" "),
            None => "1".to_string(),
        };

        let (eop_min, eop_max) = match over.eop_range {
            Some(range) => range,
            None => match cfg.values("Input.Eopweightrange") {
                Some([lo, hi]) => (
                    parse_num(lo, "Input.Eopweightrange")?,
                    parse_num(hi, "Input.Eopweightrange")?,
                ),
                Some(vals) => {
                    return Err(Error::Config(format!(
                        "Input.Eopweightrange expects `min max`, got {} values",
                        vals.len()
                    )));
                }
                None => {
                    tracing::warn!(
                        "Eopweightrange not set, using [{}, {})",
                        EopAxis::DEFAULT_MIN,
                        EopAxis::DEFAULT_MAX
                    );
                    (EopAxis::DEFAULT_MIN, EopAxis::DEFAULT_MAX)
                }
            },
        };

        let eop_bins = match over.eop_bins {
            Some(n) => n,
            None => match cfg.value("Input.Eopweightbins")? {
                Some(raw) => parse_num(raw, "Input.Eopweightbins")?,
                None => {
                    tracing::warn!("Eopweightbins not set, using {}", EopAxis::DEFAULT_BINS);
                    EopAxis::DEFAULT_BINS
                }
            },
        };

        let ic = match over.ic {
            Some(pair) => Some(pair),
            None => match cfg.values("Input.inputIC") {
                Some([name, path]) => Some((name.clone(), PathBuf::from(path))),
                Some(vals) => {
                    return Err(Error::Config(format!(
                        "Input.inputIC expects `name path`, got {} values",
                        vals.len()
                    )));
                }
                None => None,
            },
        };

        let apply_fbrem = match cfg.value("Input.applyFbrem")? {
            Some("true" | "1") => true,
            Some("false" | "0") | None => false,
            Some(other) => {
                return Err(Error::Config(format!(
                    "Input.applyFbrem expects true or false, got `{}`",
                    other
                )));
            }
        };

        let output = match over.output {
            Some(path) => path,
            None => cfg
                .value("Output.BuildEopEta_output")?
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
        };

        Ok(Settings {
            files,
            selection,
            eop_bins,
            eop_min,
            eop_max,
            ic,
            apply_fbrem,
            output,
        })
    }
}

fn parse_num<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Config(format!("option `{}`: `{}` is not a number", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CFG: &str = "\
# job configuration
<Input>
  files a.jsonl b.jsonl
  selection energy / p > 0.5
  Eopweightrange 0.3 1.8
  Eopweightbins 60
  inputIC run2022 constants.txt
  applyFbrem true
</Input>
<Output>
  BuildEopEta_output grid.json
</Output>
";

    #[test]
    fn parses_blocks_and_comments() {
        let cfg = CfgFile::parse_str(FULL_CFG, "<test>").unwrap();
        assert_eq!(cfg.values("Input.files").unwrap(), ["a.jsonl", "b.jsonl"]);
        assert_eq!(cfg.values("Input.selection").unwrap(), ["energy", "/", "p", ">", "0.5"]);
        assert_eq!(cfg.value("Output.BuildEopEta_output").unwrap(), Some("grid.json"));
        assert!(cfg.values("job").is_none());
    }

    #[test]
    fn dotted_keys_work_at_top_level() {
        let cfg = CfgFile::parse_str("Input.files a.jsonl\nOutput.BuildEopEta_output o.json\n", "<test>")
            .unwrap();
        assert_eq!(cfg.values("Input.files").unwrap(), ["a.jsonl"]);
        assert_eq!(cfg.value("Output.BuildEopEta_output").unwrap(), Some("o.json"));
    }

    #[test]
    fn later_assignments_override_earlier() {
        let text = "<Input>\nfiles a.jsonl\nfiles b.jsonl c.jsonl\n</Input>\n";
        let cfg = CfgFile::parse_str(text, "<test>").unwrap();
        assert_eq!(cfg.values("Input.files").unwrap(), ["b.jsonl", "c.jsonl"]);
    }

    #[test]
    fn block_structure_is_enforced() {
        let unclosed = CfgFile::parse_str("<Input>\nfiles a\n", "<test>").unwrap_err();
        assert!(unclosed.to_string().contains("never closed"));

        let mismatched = CfgFile::parse_str("<Input>\n</Output>\n", "<test>").unwrap_err();
        assert!(mismatched.to_string().contains("</Output> closes <Input>"));

        let stray = CfgFile::parse_str("</Input>\n", "<test>").unwrap_err();
        assert!(stray.to_string().contains("without an open block"));

        let nested = CfgFile::parse_str("<Input>\n<Output>\n", "<test>").unwrap_err();
        assert!(nested.to_string().contains("opened inside"));
    }

    #[test]
    fn bare_key_outside_block_is_an_error() {
        let err = CfgFile::parse_str("files a.jsonl\n", "<test>").unwrap_err();
        assert!(err.to_string().contains("outside any block"), "got: {}", err);
    }

    #[test]
    fn key_without_value_is_an_error() {
        let err = CfgFile::parse_str("<Input>\nfiles\n</Input>\n", "<test>").unwrap_err();
        assert!(err.to_string().contains("has no value"), "got: {}", err);
    }

    #[test]
    fn single_value_accessor_rejects_lists() {
        let cfg = CfgFile::parse_str("<Input>\nfiles a b\n</Input>\n", "<test>").unwrap();
        assert!(cfg.value("Input.files").is_err());
    }

    #[test]
    fn resolve_reads_the_full_cfg() {
        let cfg = CfgFile::parse_str(FULL_CFG, "<test>").unwrap();
        let s = Settings::resolve(&cfg, Overrides::default()).unwrap();
        assert_eq!(s.files, [PathBuf::from("a.jsonl"), PathBuf::from("b.jsonl")]);
        assert_eq!(s.selection, "energy / p > 0.5");
        assert_eq!(s.eop_bins, 60);
        assert_eq!(s.eop_min, 0.3);
        assert_eq!(s.eop_max, 1.8);
        assert_eq!(s.ic, Some(("run2022".to_string(), PathBuf::from("constants.txt"))));
        assert!(s.apply_fbrem);
        assert_eq!(s.output, PathBuf::from("grid.json"));
    }

    #[test]
    fn resolve_applies_defaults() {
        let cfg = CfgFile::parse_str("<Input>\nfiles a.jsonl\n</Input>\n", "<test>").unwrap();
        let s = Settings::resolve(&cfg, Overrides::default()).unwrap();
        assert_eq!(s.selection, "1");
        assert_eq!(s.eop_bins, EopAxis::DEFAULT_BINS);
        assert_eq!(s.eop_min, EopAxis::DEFAULT_MIN);
        assert_eq!(s.eop_max, EopAxis::DEFAULT_MAX);
        assert_eq!(s.ic, None);
        assert!(!s.apply_fbrem);
        assert_eq!(s.output, PathBuf::from(DEFAULT_OUTPUT));
    }

    #[test]
    fn resolve_requires_input_files() {
        let cfg = CfgFile::parse_str("<Output>\nBuildEopEta_output o.json\n</Output>\n", "<test>")
            .unwrap();
        let err = Settings::resolve(&cfg, Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("Input.files"), "got: {}", err);
    }

    #[test]
    fn cli_overrides_beat_the_cfg() {
        let cfg = CfgFile::parse_str(FULL_CFG, "<test>").unwrap();
        let over = Overrides {
            ic: Some(("cli".to_string(), PathBuf::from("cli.txt"))),
            eop_range: Some((0.0, 2.0)),
            eop_bins: Some(17),
            output: Some(PathBuf::from("cli.json")),
        };
        let s = Settings::resolve(&cfg, over).unwrap();
        assert_eq!(s.ic, Some(("cli".to_string(), PathBuf::from("cli.txt"))));
        assert_eq!((s.eop_min, s.eop_max), (0.0, 2.0));
        assert_eq!(s.eop_bins, 17);
        assert_eq!(s.output, PathBuf::from("cli.json"));
    }

    #[test]
    fn bad_option_values_are_errors() {
        let bad_range =
            CfgFile::parse_str("<Input>\nfiles a\nEopweightrange 0.2\n</Input>\n", "<test>")
                .unwrap();
        assert!(Settings::resolve(&bad_range, Overrides::default()).is_err());

        let bad_bins =
            CfgFile::parse_str("<Input>\nfiles a\nEopweightbins many\n</Input>\n", "<test>")
                .unwrap();
        assert!(Settings::resolve(&bad_bins, Overrides::default()).is_err());

        let bad_ic = CfgFile::parse_str("<Input>\nfiles a\ninputIC lonely\n</Input>\n", "<test>")
            .unwrap();
        assert!(Settings::resolve(&bad_ic, Overrides::default()).is_err());

        let bad_fbrem =
            CfgFile::parse_str("<Input>\nfiles a\napplyFbrem maybe\n</Input>\n", "<test>")
                .unwrap();
        assert!(Settings::resolve(&bad_fbrem, Overrides::default()).is_err());
    }
}
