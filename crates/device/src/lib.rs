//! Host-side contract for the USB-attached FIFO test hardware.
//!
//! The benchmark core only depends on this narrow surface: blocking block
//! transfers, wire register access, trigger activation and bitstream
//! (re)configuration. How a backend talks to physical hardware is its own
//! business; the sweep and the executors are written against [`Device`] so a
//! software model can stand in for the real board.

use std::fmt;
use std::path::Path;

use pattern::Mode;
use thiserror::Error;

/// Register, pipe and trigger address map baked into every FIFO test
/// bitstream. All backends and call sites share these constants; scattered
/// literals are not allowed anywhere else.
pub mod endpoints {
    /// Wire-in selecting the pattern the generator RTL produces.
    pub const PATTERN_TO_GENERATE: u8 = 0x00;
    /// Wire-out with the low half of the transfer cycle counter.
    pub const NUMBER_OF_COUNTS_A: u8 = 0x20;
    /// Wire-out with the high half of the transfer cycle counter.
    pub const NUMBER_OF_COUNTS_B: u8 = 0x21;
    /// Wire-out with the generator-side mismatch tally.
    pub const ERROR_COUNT: u8 = 0x22;
    /// Trigger-in endpoint carrying the bits in [`trigger`].
    pub const TRIGGER: u8 = 0x40;
    /// Host-to-FPGA pipe.
    pub const PIPE_IN: u8 = 0x80;
    /// FPGA-to-host pipe.
    pub const PIPE_OUT: u8 = 0xA0;

    /// Bits on the [`TRIGGER`](self::TRIGGER) endpoint.
    pub mod trigger {
        /// Full reset of FIFO, counters and checker state.
        pub const RESET: u8 = 0;
        /// Starts the device-side cycle counter.
        pub const START_TIMER: u8 = 1;
        /// Stops the device-side cycle counter.
        pub const STOP_TIMER: u8 = 2;
        /// Rewinds the pattern generator/checker to its seed.
        pub const RESET_PATTERN: u8 = 3;
    }
}

/// Errors surfaced by a device backend. All of them are fatal for the run.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device dropped off the bus mid-run.
    #[error("device disconnected")]
    Disconnected,
    /// Loading a bitstream failed.
    #[error("bitstream configuration failed for {path}: {reason}")]
    ConfigureFailed { path: String, reason: String },
    /// A blocking block transfer failed.
    #[error("block transfer on pipe {pipe:#04x} failed: {reason}")]
    TransferFailed { pipe: u8, reason: String },
}

/// Blocking capability surface of the FIFO test hardware.
pub trait Device {
    /// Loads the bitstream at `path` into the FPGA.
    fn configure(&mut self, path: &Path) -> Result<(), DeviceError>;

    /// Whether the device is still attached and usable.
    fn is_open(&self) -> bool;

    /// Blocking block write of `data` to the given pipe endpoint.
    fn write_block(&mut self, pipe: u8, data: &[u8]) -> Result<(), DeviceError>;

    /// Blocking block read into `data` from the given pipe endpoint.
    fn read_block(&mut self, pipe: u8, data: &mut [u8]) -> Result<(), DeviceError>;

    /// Stages a wire-in value; takes effect on [`commit_registers`](Self::commit_registers).
    fn set_register(&mut self, addr: u8, value: u32);

    /// Commits all staged wire-in values to the hardware.
    fn commit_registers(&mut self);

    /// Activates one trigger bit on a trigger-in endpoint.
    fn activate_trigger(&mut self, addr: u8, bit: u8) -> Result<(), DeviceError>;

    /// Reads one wire-out register.
    fn read_wire(&mut self, addr: u8) -> u32;

    /// Reconstructs a 64-bit counter from a low/high wire-out pair.
    fn read_counter(&mut self, low: u8, high: u8) -> u64 {
        let low = self.read_wire(low) as u64;
        let high = self.read_wire(high) as u64;
        low | (high << 32)
    }
}

/// Fails with [`DeviceError::Disconnected`] when the device has gone away.
pub fn check_open(dev: &impl Device) -> Result<(), DeviceError> {
    if dev.is_open() {
        log::debug!("device is open");
        Ok(())
    } else {
        Err(DeviceError::Disconnected)
    }
}

/// Transfer direction of a FIFO test bitstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// FPGA-to-host transfers only.
    Read,
    /// Host-to-FPGA transfers only.
    Write,
    /// Loopback write+read, synthesized for duplex mode.
    Bidir,
}

impl Direction {
    /// Directions a configuration file may list; `Bidir` is synthesized by
    /// the sweep for duplex mode and never configured directly.
    pub const CONFIGURABLE: [Direction; 2] = [Direction::Read, Direction::Write];

    /// Name used in configuration files and bitstream file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Read => "read",
            Direction::Write => "write",
            Direction::Bidir => "bidir",
        }
    }

    /// Looks up a direction by its configuration name.
    pub fn from_name(name: &str) -> Option<Direction> {
        [Direction::Read, Direction::Write, Direction::Bidir]
            .into_iter()
            .find(|d| d.as_str() == name)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-chip memory primitive the FIFO is built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Memory {
    /// Dedicated block RAM.
    BlockRam,
    /// LUT-based distributed RAM.
    DistributedRam,
    /// Shift-register primitives.
    ShiftRegister,
}

impl Memory {
    /// Every supported memory implementation, in sweep order.
    pub const ALL: [Memory; 3] = [
        Memory::BlockRam,
        Memory::DistributedRam,
        Memory::ShiftRegister,
    ];

    /// Name used in configuration files and bitstream file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Memory::BlockRam => "blockram",
            Memory::DistributedRam => "distributedram",
            Memory::ShiftRegister => "shiftregister",
        }
    }

    /// Looks up a memory kind by its configuration name.
    pub fn from_name(name: &str) -> Option<Memory> {
        Memory::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File name of the bitstream implementing one corner of the sweep, by the
/// fixed `{direction}_{mode}_fifo_{memory}_{depth}.bit` convention.
pub fn bitstream_file_name(
    direction: Direction,
    mode: Mode,
    memory: Memory,
    depth: u32,
) -> String {
    format!("{direction}_{mode}_fifo_{memory}_{depth}.bit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitstream_names_follow_the_path_convention() {
        assert_eq!(
            bitstream_file_name(Direction::Read, Mode::Bit32, Memory::BlockRam, 1024),
            "read_32bit_fifo_blockram_1024.bit"
        );
        assert_eq!(
            bitstream_file_name(Direction::Bidir, Mode::Duplex, Memory::ShiftRegister, 2048),
            "bidir_duplex_fifo_shiftregister_2048.bit"
        );
    }

    #[test]
    fn names_round_trip_through_lookup() {
        for direction in Direction::CONFIGURABLE {
            assert_eq!(Direction::from_name(direction.as_str()), Some(direction));
        }
        for memory in Memory::ALL {
            assert_eq!(Memory::from_name(memory.as_str()), Some(memory));
        }
        assert_eq!(Direction::from_name("sideways"), None);
    }
}
