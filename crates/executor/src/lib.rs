//! Runs one test case against the device and measures it.
//!
//! A [`TestCase`] is an immutable description of one leaf of the sweep; the
//! executor drives the device through the matching transfer shape (read,
//! write, or duplex loopback), brackets every blocking device call with
//! monotonic clock reads, and returns a [`Measurement`] with the host-side
//! elapsed time, the device-side cycle count and the mismatch tally.

mod run;

pub use run::{prepare, run};

use std::time::Duration;

use device::{Direction, Memory};
use pattern::{Mode, PatternKind};

/// One leaf combination of the sweep. Built fresh per test case and never
/// mutated; every loop level passes it down by reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    pub mode: Mode,
    pub direction: Direction,
    pub memory: Memory,
    /// FIFO element count of the loaded bitstream.
    pub depth: u32,
    pub pattern_kind: PatternKind,
    /// Payload bytes per transfer.
    pub pattern_size: usize,
    /// Chunk size for duplex transfers; equals `pattern_size` otherwise.
    pub block_size: usize,
    /// 1-based statistical repetition index.
    pub stat_iteration: u32,
}

/// Raw counters produced by one executor run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Measurement {
    /// Host wall time accumulated around the device calls.
    pub host_total: Duration,
    /// Device cycle counter, reconstructed from the two count wires.
    pub device_counts: u64,
    /// Data-integrity mismatches. For write direction this is the
    /// generator-side tally read back from the error wire; for read and
    /// duplex it comes from host-side verification.
    pub errors: u64,
}
