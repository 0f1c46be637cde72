//! Software model of the FIFO test hardware.
//!
//! `SimDevice` implements the [`Device`] contract well enough to run the
//! whole sweep without a board attached: it learns its personality from the
//! bitstream file name it is asked to load, serves pattern data on the read
//! pipe, checks pattern data arriving on the write pipe, and echoes blocks
//! in duplex images. Integration tests drive it exactly like the real
//! hardware; the CLI exposes it as the `sim` backend.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use device::{endpoints, Device, DeviceError, Direction, Memory};
use pattern::{Mode, PatternKind};

/// Personality parsed from a `{direction}_{mode}_fifo_{memory}_{depth}.bit`
/// file name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bitstream {
    pub direction: Direction,
    pub mode: Mode,
    pub memory: Memory,
    pub depth: u32,
}

impl Bitstream {
    fn parse(path: &Path) -> Option<Bitstream> {
        let stem = path.file_stem()?.to_str()?;
        let mut parts = stem.split('_');
        let direction = Direction::from_name(parts.next()?)?;
        let mode = Mode::from_name(parts.next()?)?;
        if parts.next()? != "fifo" {
            return None;
        }
        let memory = Memory::from_name(parts.next()?)?;
        let depth = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Bitstream {
            direction,
            mode,
            memory,
            depth,
        })
    }
}

/// In-memory stand-in for the FIFO test board.
pub struct SimDevice {
    open: bool,
    loaded: Option<Bitstream>,
    staged: HashMap<u8, u32>,
    committed: HashMap<u8, u32>,
    pattern: Option<PatternKind>,
    echo: VecDeque<u8>,
    timer_running: bool,
    cycles: u64,
    errors: u64,
    configured: Vec<String>,
    fail_next_transfer: bool,
    corrupt_echo_byte: Option<usize>,
}

impl SimDevice {
    pub fn new() -> SimDevice {
        SimDevice {
            open: true,
            loaded: None,
            staged: HashMap::new(),
            committed: HashMap::new(),
            pattern: None,
            echo: VecDeque::new(),
            timer_running: false,
            cycles: 0,
            errors: 0,
            configured: Vec::new(),
            fail_next_transfer: false,
            corrupt_echo_byte: None,
        }
    }

    /// Builds a device already configured for one sweep corner, skipping the
    /// bitstream-name round trip. Test convenience.
    pub fn with_bitstream(
        direction: Direction,
        mode: Mode,
        memory: Memory,
        depth: u32,
    ) -> SimDevice {
        let mut dev = SimDevice::new();
        dev.loaded = Some(Bitstream {
            direction,
            mode,
            memory,
            depth,
        });
        dev
    }

    /// Currently loaded personality, if any.
    pub fn loaded(&self) -> Option<Bitstream> {
        self.loaded
    }

    /// File names of every bitstream configured so far, in order.
    pub fn configured_bitstreams(&self) -> &[String] {
        &self.configured
    }

    /// Simulates the device dropping off the bus.
    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    /// Makes the next block transfer fail.
    pub fn fail_next_transfer(&mut self) {
        self.fail_next_transfer = true;
    }

    /// Corrupts the byte at `index` of the next echoed block.
    pub fn corrupt_echo_byte(&mut self, index: usize) {
        self.corrupt_echo_byte = Some(index);
    }

    fn bitstream(&self) -> Result<Bitstream, DeviceError> {
        self.loaded.ok_or(DeviceError::ConfigureFailed {
            path: "<none>".into(),
            reason: "no bitstream loaded".into(),
        })
    }

    fn take_transfer_fault(&mut self, pipe: u8) -> Result<(), DeviceError> {
        if self.fail_next_transfer {
            self.fail_next_transfer = false;
            return Err(DeviceError::TransferFailed {
                pipe,
                reason: "injected fault".into(),
            });
        }
        Ok(())
    }

    fn count_cycles(&mut self, bytes: usize, mode: Mode) {
        if self.timer_running {
            // One cycle moves one bus word.
            self.cycles += bytes.div_ceil(mode.register_params().width) as u64;
        }
    }
}

impl Default for SimDevice {
    fn default() -> Self {
        SimDevice::new()
    }
}

impl Device for SimDevice {
    fn configure(&mut self, path: &Path) -> Result<(), DeviceError> {
        let bitstream = Bitstream::parse(path).ok_or_else(|| DeviceError::ConfigureFailed {
            path: path.display().to_string(),
            reason: "file name does not describe a FIFO test bitstream".into(),
        })?;
        log::debug!("sim device reconfigured from {}", path.display());
        self.loaded = Some(bitstream);
        self.configured.push(
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        self.echo.clear();
        self.cycles = 0;
        self.errors = 0;
        self.timer_running = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write_block(&mut self, pipe: u8, data: &[u8]) -> Result<(), DeviceError> {
        self.take_transfer_fault(pipe)?;
        let bitstream = self.bitstream()?;
        if bitstream.mode == Mode::Duplex {
            self.echo.extend(data);
        } else if let Some(kind) = self.pattern {
            // The hardware checker consumes the incoming stream from its
            // seed; the executors rewind it before every burst.
            self.errors += pattern::check(data, kind, bitstream.mode);
        }
        self.count_cycles(data.len(), bitstream.mode);
        Ok(())
    }

    fn read_block(&mut self, pipe: u8, data: &mut [u8]) -> Result<(), DeviceError> {
        self.take_transfer_fault(pipe)?;
        let bitstream = self.bitstream()?;
        if bitstream.mode == Mode::Duplex {
            if self.echo.len() < data.len() {
                return Err(DeviceError::TransferFailed {
                    pipe,
                    reason: "loopback FIFO underrun".into(),
                });
            }
            for byte in data.iter_mut() {
                *byte = self.echo.pop_front().unwrap_or_default();
            }
            if let Some(index) = self.corrupt_echo_byte.take() {
                if index < data.len() {
                    data[index] ^= 0xFF;
                }
            }
        } else {
            let kind = self.pattern.unwrap_or(PatternKind::Counter8);
            pattern::fill(data, kind, bitstream.mode);
        }
        self.count_cycles(data.len(), bitstream.mode);
        Ok(())
    }

    fn set_register(&mut self, addr: u8, value: u32) {
        self.staged.insert(addr, value);
    }

    fn commit_registers(&mut self) {
        for (addr, value) in self.staged.drain() {
            self.committed.insert(addr, value);
        }
        if let Some(&code) = self.committed.get(&endpoints::PATTERN_TO_GENERATE) {
            self.pattern = PatternKind::from_wire_code(code);
        }
    }

    fn activate_trigger(&mut self, _addr: u8, bit: u8) -> Result<(), DeviceError> {
        match bit {
            endpoints::trigger::RESET => {
                self.echo.clear();
                self.cycles = 0;
                self.errors = 0;
                self.timer_running = false;
            }
            endpoints::trigger::START_TIMER => self.timer_running = true,
            endpoints::trigger::STOP_TIMER => self.timer_running = false,
            // Pattern generation restarts from the seed on every transfer
            // here, so the rewind trigger has nothing to do.
            endpoints::trigger::RESET_PATTERN => {}
            _ => {}
        }
        Ok(())
    }

    fn read_wire(&mut self, addr: u8) -> u32 {
        match addr {
            endpoints::NUMBER_OF_COUNTS_A => self.cycles as u32,
            endpoints::NUMBER_OF_COUNTS_B => (self.cycles >> 32) as u32,
            endpoints::ERROR_COUNT => self.errors as u32,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device::endpoints::trigger;
    use std::path::PathBuf;

    #[test]
    fn parses_personality_from_bitstream_names() {
        let mut dev = SimDevice::new();
        let path = PathBuf::from("bitfiles/32bit/read_32bit_fifo_blockram_1024.bit");
        dev.configure(&path).expect("configure");
        assert_eq!(
            dev.loaded(),
            Some(Bitstream {
                direction: Direction::Read,
                mode: Mode::Bit32,
                memory: Memory::BlockRam,
                depth: 1024,
            })
        );
        assert_eq!(
            dev.configured_bitstreams(),
            ["read_32bit_fifo_blockram_1024.bit"]
        );
    }

    #[test]
    fn rejects_unrelated_file_names() {
        let mut dev = SimDevice::new();
        assert!(dev.configure(Path::new("blinky.bit")).is_err());
        assert!(dev
            .configure(Path::new("read_32bit_fifo_blockram_1024_extra.bit"))
            .is_err());
    }

    #[test]
    fn serves_the_selected_pattern_on_the_read_pipe() {
        let mut dev =
            SimDevice::with_bitstream(Direction::Read, Mode::Bit32, Memory::BlockRam, 1024);
        dev.set_register(
            endpoints::PATTERN_TO_GENERATE,
            PatternKind::Counter8.wire_code(),
        );
        dev.commit_registers();
        let mut buf = [0u8; 16];
        dev.read_block(endpoints::PIPE_OUT, &mut buf).expect("read");
        assert_eq!(buf[..4], [0, 1, 2, 3]);
    }

    #[test]
    fn tallies_write_mismatches_on_the_error_wire() {
        let mut dev =
            SimDevice::with_bitstream(Direction::Write, Mode::Bit32, Memory::BlockRam, 1024);
        dev.set_register(
            endpoints::PATTERN_TO_GENERATE,
            PatternKind::Counter32.wire_code(),
        );
        dev.commit_registers();

        let mut good = vec![0u8; 64];
        pattern::fill(&mut good, PatternKind::Counter32, Mode::Bit32);
        dev.write_block(endpoints::PIPE_IN, &good).expect("write");
        assert_eq!(dev.read_wire(endpoints::ERROR_COUNT), 0);

        good[10] ^= 0x01;
        dev.write_block(endpoints::PIPE_IN, &good).expect("write");
        assert!(dev.read_wire(endpoints::ERROR_COUNT) >= 1);
    }

    #[test]
    fn duplex_images_echo_written_blocks() {
        let mut dev =
            SimDevice::with_bitstream(Direction::Bidir, Mode::Duplex, Memory::BlockRam, 2048);
        let sent: Vec<u8> = (0u8..64).collect();
        dev.write_block(endpoints::PIPE_IN, &sent).expect("write");
        let mut received = vec![0u8; 64];
        dev.read_block(endpoints::PIPE_OUT, &mut received)
            .expect("read");
        assert_eq!(sent, received);
    }

    #[test]
    fn cycle_counter_only_runs_between_timer_triggers() {
        let mut dev =
            SimDevice::with_bitstream(Direction::Read, Mode::Bit32, Memory::BlockRam, 1024);
        dev.set_register(
            endpoints::PATTERN_TO_GENERATE,
            PatternKind::Counter8.wire_code(),
        );
        dev.commit_registers();

        let mut buf = [0u8; 64];
        dev.read_block(endpoints::PIPE_OUT, &mut buf).expect("read");
        assert_eq!(
            dev.read_counter(endpoints::NUMBER_OF_COUNTS_A, endpoints::NUMBER_OF_COUNTS_B),
            0
        );

        dev.activate_trigger(endpoints::TRIGGER, trigger::START_TIMER)
            .expect("trigger");
        dev.read_block(endpoints::PIPE_OUT, &mut buf).expect("read");
        dev.activate_trigger(endpoints::TRIGGER, trigger::STOP_TIMER)
            .expect("trigger");
        assert_eq!(
            dev.read_counter(endpoints::NUMBER_OF_COUNTS_A, endpoints::NUMBER_OF_COUNTS_B),
            16
        );
    }

    #[test]
    fn injected_faults_fail_one_transfer() {
        let mut dev =
            SimDevice::with_bitstream(Direction::Read, Mode::Bit32, Memory::BlockRam, 1024);
        dev.fail_next_transfer();
        let mut buf = [0u8; 4];
        assert!(dev.read_block(endpoints::PIPE_OUT, &mut buf).is_err());
        assert!(dev.read_block(endpoints::PIPE_OUT, &mut buf).is_ok());
    }
}
