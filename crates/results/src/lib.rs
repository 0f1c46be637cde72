//! Derived metrics and the append-only results file.
//!
//! One measurement plus its test case turns into one delimited text row:
//! total and per-iteration time on both sides of the cable, throughput in
//! bytes per second, and the error tally. The file starts with a fixed,
//! versioned header row and grows by exactly one row per leaf test case;
//! nothing is ever batched or rewritten.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use executor::{Measurement, TestCase};
use log::info;
use thiserror::Error;

/// Clock frequency of the FIFO test logic, in MHz. Converts device cycle
/// counts into microseconds.
pub const FIFO_CLOCK_MHZ: f64 = 100.8;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Column headers, in row order. Versioned: analysis tooling keys on these
/// exact strings.
pub const DEFAULT_HEADERS: [&str; 18] = [
    "Time",
    "Mode",
    "Direction",
    "FifoMemoryType",
    "FifoDepth",
    "PatternSize",
    "BlockSize",
    "DataPattern",
    "Iterations",
    "StatisticalIter",
    "CountsInFPGA",
    "FPGA time(total) [us]",
    "FPGA time(per iteration) [us]",
    "PC time(total) [us]",
    "PC time(per iteration) [us]",
    "SpeedPC [B/s]",
    "SpeedFPGA [B/s]",
    "Errors",
];

/// Failure to open or extend the results file. Fatal for the whole run.
#[derive(Debug, Error)]
#[error("unable to append to results file {path}")]
pub struct RecorderError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
}

/// Time and throughput figures derived from one measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivedMetrics {
    pub device_counts: u64,
    pub device_total_us: f64,
    pub device_per_iter_us: f64,
    pub host_total_us: f64,
    pub host_per_iter_us: f64,
    /// Host-observed transfer speed, bytes per second.
    pub host_speed: f64,
    /// Device-observed transfer speed, bytes per second.
    pub device_speed: f64,
}

impl DerivedMetrics {
    /// Pure arithmetic: no device or file access.
    pub fn new(case: &TestCase, measurement: &Measurement, iterations: u32) -> DerivedMetrics {
        let iterations = f64::from(iterations);
        let size = case.pattern_size as f64;

        let host_total_us = measurement.host_total.as_secs_f64() * MICROS_PER_SECOND;
        let host_per_iter_us = host_total_us / iterations;
        let host_speed = size * MICROS_PER_SECOND / host_per_iter_us;

        let device_total_us = measurement.device_counts as f64 / FIFO_CLOCK_MHZ;
        let device_per_iter_us = device_total_us / iterations;
        let device_speed = size * MICROS_PER_SECOND / device_per_iter_us;

        DerivedMetrics {
            device_counts: measurement.device_counts,
            device_total_us,
            device_per_iter_us,
            host_total_us,
            host_per_iter_us,
            host_speed,
            device_speed,
        }
    }
}

/// Appends one delimited row per recorded test case.
pub struct ResultsRecorder {
    path: PathBuf,
    separator: String,
    headers: Vec<String>,
}

impl ResultsRecorder {
    pub fn new(path: impl Into<PathBuf>, separator: impl Into<String>) -> ResultsRecorder {
        ResultsRecorder {
            path: path.into(),
            separator: separator.into(),
            headers: DEFAULT_HEADERS.iter().map(|h| h.to_string()).collect(),
        }
    }

    /// Replaces the default column headers (configuration override).
    pub fn with_headers(mut self, headers: Vec<String>) -> ResultsRecorder {
        self.headers = headers;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the header row. Called exactly once, at run start.
    pub fn write_header(&self) -> Result<(), RecorderError> {
        let mut line = String::new();
        for header in &self.headers {
            line.push_str(header);
            line.push_str(&self.separator);
        }
        self.append_line(&line)?;
        info!("headers written to {}", self.path.display());
        Ok(())
    }

    /// Derives metrics for one measurement and appends its row.
    pub fn record(
        &self,
        case: &TestCase,
        measurement: &Measurement,
        iterations: u32,
    ) -> Result<(), RecorderError> {
        let metrics = DerivedMetrics::new(case, measurement, iterations);
        info!(
            "host speed {:.0} B/s, device speed {:.0} B/s, {} errors",
            metrics.host_speed, metrics.device_speed, measurement.errors
        );

        let sep = &self.separator;
        let mut row = String::new();
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        write!(
            row,
            "{timestamp}{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}",
            case.mode,
            case.direction,
            case.memory,
            case.depth,
            case.pattern_size,
            case.block_size,
            case.pattern_kind,
            iterations,
            case.stat_iteration,
        )
        .expect("write to string");
        write!(
            row,
            "{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}",
            metrics.device_counts,
            metrics.device_total_us,
            metrics.device_per_iter_us,
            metrics.host_total_us,
            metrics.host_per_iter_us,
            metrics.host_speed,
            metrics.device_speed,
            measurement.errors,
        )
        .expect("write to string");

        self.append_line(&row)
    }

    fn append_line(&self, line: &str) -> Result<(), RecorderError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| RecorderError {
                path: self.path.clone(),
                source,
            })?;
        writeln!(file, "{line}").map_err(|source| RecorderError {
            path: self.path.clone(),
            source,
        })
    }
}
