//! Sweep configuration and orchestration.
//!
//! The configuration file lists the values for every test dimension; the
//! controller walks their legal cartesian combinations, reconfigures the
//! FPGA whenever a bitstream-affecting dimension changes, and hands every
//! leaf test case to the executor and its measurement to the recorder.

mod config;
mod controller;

pub use config::{ConfigError, SweepConfig, MAX_PATTERN_SIZE};
pub use controller::{RunError, SweepController, DUPLEX_DEPTH};
