//! Deterministic test-pattern generation and verification.
//!
//! Transfer payloads range up to a gibibyte, so the harness never keeps a
//! reference copy of what it wrote. The expected byte for every position is
//! recomputed from a small amount of generator state, and one stepping
//! routine serves both filling a buffer before a write and checking a buffer
//! after a read. Fill and check share the same code path so they cannot
//! drift apart.

mod engine;

pub use engine::{check, fill};

use std::fmt;

/// Bus width / operation family of a FIFO test bitstream.
///
/// The mode decides the register width the generator RTL counts with, and
/// therefore how the counter and walking patterns step through a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Symmetric 32-bit bus on both FIFO ports.
    Bit32,
    /// Non-symmetric bus widths; the generator uses a 64-bit register.
    NonSym,
    /// Bidirectional loopback image, 32-bit registers.
    Duplex,
}

impl Mode {
    /// Every supported mode, in sweep order.
    pub const ALL: [Mode; 3] = [Mode::Bit32, Mode::NonSym, Mode::Duplex];

    /// Name used in configuration files and bitstream file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Bit32 => "32bit",
            Mode::NonSym => "nonsym",
            Mode::Duplex => "duplex",
        }
    }

    /// Looks up a mode by its configuration name.
    pub fn from_name(name: &str) -> Option<Mode> {
        Mode::ALL.into_iter().find(|m| m.as_str() == name)
    }

    /// Register sizing used by the counter and walking patterns.
    pub fn register_params(self) -> RegisterParams {
        let params = match self {
            // The shipped RTL counts 4-byte registers with a signed value,
            // so the wrap threshold is the signed maximum, not 2^32 - 1.
            Mode::Bit32 | Mode::Duplex => RegisterParams {
                width: 4,
                ceiling: i32::MAX as u64,
            },
            Mode::NonSym => RegisterParams {
                width: 8,
                ceiling: u64::MAX,
            },
        };
        log::debug!(
            "register width {} with wrap ceiling {:#x}",
            params.width,
            params.ceiling
        );
        params
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the four deterministic byte-sequence algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// Free-running byte counter.
    Counter8,
    /// Register-width counter emitted little-endian.
    Counter32,
    /// Single bit walking left through the register.
    Walking1,
    /// Bit-packed ASIC readout frames (id, channel, LFSR amplitude,
    /// pseudo-timestamp).
    AsicFrame,
}

impl PatternKind {
    /// Every supported pattern, in sweep order.
    pub const ALL: [PatternKind; 4] = [
        PatternKind::Counter8,
        PatternKind::Counter32,
        PatternKind::Walking1,
        PatternKind::AsicFrame,
    ];

    /// Name used in configuration files and result rows.
    pub fn as_str(self) -> &'static str {
        match self {
            PatternKind::Counter8 => "counter_8bit",
            PatternKind::Counter32 => "counter_32bit",
            PatternKind::Walking1 => "walking_1",
            PatternKind::AsicFrame => "asic",
        }
    }

    /// Looks up a pattern by its configuration name.
    pub fn from_name(name: &str) -> Option<PatternKind> {
        PatternKind::ALL.into_iter().find(|p| p.as_str() == name)
    }

    /// Numeric code programmed into the device's pattern-select register.
    pub fn wire_code(self) -> u32 {
        match self {
            PatternKind::Counter8 => 0,
            PatternKind::Counter32 => 1,
            PatternKind::Walking1 => 2,
            PatternKind::AsicFrame => 3,
        }
    }

    /// Inverse of [`wire_code`](Self::wire_code).
    pub fn from_wire_code(code: u32) -> Option<PatternKind> {
        PatternKind::ALL.into_iter().find(|p| p.wire_code() == code)
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Register sizing derived from a [`Mode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterParams {
    /// Bytes emitted per counter step.
    pub width: usize,
    /// Counter value above which the generator wraps to zero.
    pub ceiling: u64,
}
