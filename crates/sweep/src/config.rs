//! TOML sweep configuration with validated, defaulted dimension lists.

use std::path::{Path, PathBuf};

use device::{Direction, Memory};
use log::{error, warn};
use pattern::{Mode, PatternKind};
use serde::Deserialize;
use thiserror::Error;

/// Largest configurable payload, one GiB.
pub const MAX_PATTERN_SIZE: usize = 1 << 30;

const LEGAL_DEPTHS: [u32; 5] = [16, 64, 256, 1024, 2048];
const LEGAL_BLOCK_SIZES: [usize; 4] = [16, 64, 256, 1024];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("configuration file {path} failed to parse")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{value:?} is not a valid value for the {option:?} option")]
    InvalidValue { option: &'static str, value: String },
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    bitfiles_path: String,
    output: RawOutput,
    params: RawParams,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    results_path: String,
    resultfile_name: String,
    result_sep: String,
    headers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawParams {
    mode: Option<Vec<String>>,
    direction: Option<Vec<String>>,
    memory: Option<Vec<String>>,
    depth: Option<Vec<u32>>,
    pattern: Option<Vec<String>>,
    pattern_size: Option<Vec<u64>>,
    block_size: Option<Vec<u64>>,
    iterations: i64,
    statistic_iter: i64,
}

/// Validated sweep parameters.
#[derive(Clone, Debug)]
pub struct SweepConfig {
    /// Directory holding the bitstreams, organized per mode.
    pub bitfiles_path: PathBuf,
    /// Full path of the results file.
    pub results_path: PathBuf,
    /// Field separator for result rows.
    pub result_sep: String,
    /// Optional column header override.
    pub headers: Option<Vec<String>>,
    pub modes: Vec<Mode>,
    pub directions: Vec<Direction>,
    pub memories: Vec<Memory>,
    pub depths: Vec<u32>,
    pub pattern_kinds: Vec<PatternKind>,
    pub pattern_sizes: Vec<usize>,
    pub block_sizes: Vec<usize>,
    /// Transfer repetitions measured inside one test case.
    pub iterations: u32,
    /// Statistical repetitions of every test case.
    pub statistic_iter: u32,
}

impl SweepConfig {
    /// Loads and validates the configuration at `path`.
    pub fn load(path: &Path) -> Result<SweepConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        SweepConfig::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<SweepConfig, ConfigError> {
        let modes = named_list(raw.params.mode, "mode", Mode::from_name, &Mode::ALL)?;
        // `bidir` is synthesized by the sweep for duplex mode and cannot be
        // configured directly.
        let directions = named_list(
            raw.params.direction,
            "direction",
            |name| {
                Direction::CONFIGURABLE
                    .into_iter()
                    .find(|d| d.as_str() == name)
            },
            &Direction::CONFIGURABLE,
        )?;
        let memories = named_list(raw.params.memory, "memory", Memory::from_name, &Memory::ALL)?;
        let pattern_kinds = named_list(
            raw.params.pattern,
            "pattern",
            PatternKind::from_name,
            &PatternKind::ALL,
        )?;

        let depths = member_list(raw.params.depth, "depth", &LEGAL_DEPTHS)?;
        let pattern_sizes = pattern_size_list(raw.params.pattern_size)?;
        let block_sizes = member_list(
            raw.params.block_size.map(sizes_to_usize),
            "block_size",
            &LEGAL_BLOCK_SIZES,
        )?;

        Ok(SweepConfig {
            bitfiles_path: PathBuf::from(raw.bitfiles_path),
            results_path: PathBuf::from(raw.output.results_path).join(raw.output.resultfile_name),
            result_sep: raw.output.result_sep,
            headers: raw.output.headers,
            modes,
            directions,
            memories,
            depths,
            pattern_kinds,
            pattern_sizes,
            block_sizes,
            iterations: positive_count(raw.params.iterations, "iterations"),
            statistic_iter: positive_count(raw.params.statistic_iter, "statistic_iter"),
        })
    }
}

fn sizes_to_usize(sizes: Vec<u64>) -> Vec<usize> {
    sizes.into_iter().map(|s| s as usize).collect()
}

/// Validates a list of names against the legal set, falling back to the full
/// set when the option is absent or empty.
fn named_list<T: Copy>(
    values: Option<Vec<String>>,
    option: &'static str,
    lookup: impl Fn(&str) -> Option<T>,
    defaults: &[T],
) -> Result<Vec<T>, ConfigError> {
    let values = values.unwrap_or_default();
    if values.is_empty() {
        warn!("overriding the {option} option with {} defaults", defaults.len());
        return Ok(defaults.to_vec());
    }
    values
        .into_iter()
        .map(|name| {
            lookup(&name).ok_or(ConfigError::InvalidValue {
                option,
                value: name,
            })
        })
        .collect()
}

/// Same as [`named_list`] for numeric options validated by set membership.
fn member_list<T: Copy + Eq + ToString>(
    values: Option<Vec<T>>,
    option: &'static str,
    legal: &[T],
) -> Result<Vec<T>, ConfigError> {
    let values = values.unwrap_or_default();
    if values.is_empty() {
        warn!("overriding the {option} option with {} defaults", legal.len());
        return Ok(legal.to_vec());
    }
    for value in &values {
        if !legal.contains(value) {
            return Err(ConfigError::InvalidValue {
                option,
                value: value.to_string(),
            });
        }
    }
    Ok(values)
}

/// Pattern sizes must be powers of two between 16 bytes and one GiB; absent
/// or empty means the whole range.
fn pattern_size_list(values: Option<Vec<u64>>) -> Result<Vec<usize>, ConfigError> {
    let values = values.unwrap_or_default();
    if values.is_empty() {
        let mut sizes = Vec::new();
        let mut size = 16usize;
        while size <= MAX_PATTERN_SIZE {
            sizes.push(size);
            size += size;
        }
        warn!("overriding the pattern_size option with {} defaults", sizes.len());
        return Ok(sizes);
    }
    values
        .into_iter()
        .map(|size| {
            let valid = size.is_power_of_two() && (16..=MAX_PATTERN_SIZE as u64).contains(&size);
            if valid {
                Ok(size as usize)
            } else {
                Err(ConfigError::InvalidValue {
                    option: "pattern_size",
                    value: size.to_string(),
                })
            }
        })
        .collect()
}

fn positive_count(value: i64, option: &str) -> u32 {
    if value <= 0 {
        error!("{option} must be greater than 0, using the default of 1");
        1
    } else {
        value as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(text: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fifobench.toml");
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(text.as_bytes()).expect("write");
        (dir, path)
    }

    const MINIMAL: &str = r#"
bitfiles_path = "bitfiles"

[output]
results_path = "results"
resultfile_name = "fifo.csv"
result_sep = ";"

[params]
iterations = 10
statistic_iter = 2
"#;

    #[test]
    fn absent_lists_fall_back_to_the_full_legal_sets() {
        let (_dir, path) = write_config(MINIMAL);
        let cfg = SweepConfig::load(&path).expect("load");
        assert_eq!(cfg.modes, Mode::ALL);
        assert_eq!(cfg.directions, Direction::CONFIGURABLE);
        assert_eq!(cfg.memories, Memory::ALL);
        assert_eq!(cfg.depths, LEGAL_DEPTHS);
        assert_eq!(cfg.pattern_kinds, PatternKind::ALL);
        assert_eq!(cfg.pattern_sizes.first(), Some(&16));
        assert_eq!(cfg.pattern_sizes.last(), Some(&MAX_PATTERN_SIZE));
        assert_eq!(cfg.iterations, 10);
        assert_eq!(cfg.statistic_iter, 2);
        assert_eq!(cfg.results_path, Path::new("results/fifo.csv"));
    }

    #[test]
    fn configured_lists_pass_validation() {
        let text = MINIMAL.replace(
            "[params]",
            "[params]\nmode = [\"32bit\", \"duplex\"]\ndepth = [64, 2048]\npattern_size = [1024]\n",
        );
        let (_dir, path) = write_config(&text);
        let cfg = SweepConfig::load(&path).expect("load");
        assert_eq!(cfg.modes, [Mode::Bit32, Mode::Duplex]);
        assert_eq!(cfg.depths, [64, 2048]);
        assert_eq!(cfg.pattern_sizes, [1024]);
    }

    #[test]
    fn unknown_names_are_rejected() {
        let text = MINIMAL.replace("[params]", "[params]\nmode = [\"64bit\"]\n");
        let (_dir, path) = write_config(&text);
        match SweepConfig::load(&path) {
            Err(ConfigError::InvalidValue { option, value }) => {
                assert_eq!(option, "mode");
                assert_eq!(value, "64bit");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn illegal_depths_and_sizes_are_rejected() {
        let text = MINIMAL.replace("[params]", "[params]\ndepth = [100]\n");
        let (_dir, path) = write_config(&text);
        assert!(SweepConfig::load(&path).is_err());

        let text = MINIMAL.replace("[params]", "[params]\npattern_size = [1000]\n");
        let (_dir, path) = write_config(&text);
        assert!(SweepConfig::load(&path).is_err());
    }

    #[test]
    fn non_positive_iteration_counts_are_sanitized() {
        let text = MINIMAL
            .replace("iterations = 10", "iterations = 0")
            .replace("statistic_iter = 2", "statistic_iter = -3");
        let (_dir, path) = write_config(&text);
        let cfg = SweepConfig::load(&path).expect("load");
        assert_eq!(cfg.iterations, 1);
        assert_eq!(cfg.statistic_iter, 1);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        assert!(matches!(
            SweepConfig::load(Path::new("/nonexistent/fifobench.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
