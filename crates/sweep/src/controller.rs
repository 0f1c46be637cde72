//! Nested-loop enumeration of the legal combination space.

use std::path::PathBuf;

use device::{bitstream_file_name, check_open, Device, DeviceError, Direction, Memory};
use executor::TestCase;
use log::{info, warn};
use pattern::{Mode, PatternKind};
use results::{RecorderError, ResultsRecorder};
use thiserror::Error;

use crate::SweepConfig;

/// Duplex loopback images are only built at this FIFO depth; the configured
/// depth list does not apply to them.
pub const DUPLEX_DEPTH: u32 = 2048;

/// Depth the hardware substitutes for 16 in non-symmetric write images (the
/// narrow-to-wide FIFO cannot be built that shallow).
const NONSYM_WRITE_MIN_DEPTH: u32 = 32;

/// Any failure that aborts the sweep. There is no retry and no partial
/// checkpoint; the run either completes or stops here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Recorder(#[from] RecorderError),
}

/// Drives the full sweep: mode, direction, memory, depth, pattern size,
/// block size (duplex only), pattern kind, statistical iteration.
pub struct SweepController<'a, D: Device> {
    dev: &'a mut D,
    cfg: &'a SweepConfig,
    recorder: &'a ResultsRecorder,
}

impl<'a, D: Device> SweepController<'a, D> {
    pub fn new(
        dev: &'a mut D,
        cfg: &'a SweepConfig,
        recorder: &'a ResultsRecorder,
    ) -> SweepController<'a, D> {
        SweepController { dev, cfg, recorder }
    }

    pub fn run(&mut self) -> Result<(), RunError> {
        for &mode in &self.cfg.modes {
            info!("transfer mode set to: {mode}");
            self.run_mode(mode)?;
        }
        Ok(())
    }

    fn run_mode(&mut self, mode: Mode) -> Result<(), RunError> {
        let memories = match mode {
            // The non-symmetric FIFO is only implemented in block RAM.
            Mode::NonSym => {
                warn!("for nonsym mode the only valid memory is blockram");
                vec![Memory::BlockRam]
            }
            _ => self.cfg.memories.clone(),
        };
        let directions = match mode {
            Mode::Duplex => vec![Direction::Bidir],
            _ => self.cfg.directions.clone(),
        };

        for &direction in &directions {
            info!("transfer direction set to: {direction}");
            for &memory in &memories {
                info!("fifo memory set to: {memory}");
                self.run_depths(mode, direction, memory)?;
            }
        }
        Ok(())
    }

    /// Applies the mode/direction-specific depth overrides.
    fn depth_set(&self, mode: Mode, direction: Direction) -> Vec<u32> {
        match (mode, direction) {
            (Mode::Duplex, _) => vec![DUPLEX_DEPTH],
            (Mode::NonSym, Direction::Write) => self
                .cfg
                .depths
                .iter()
                .map(|&depth| {
                    if depth == 16 {
                        warn!("depth 16 is unavailable for nonsym write, using {NONSYM_WRITE_MIN_DEPTH}");
                        NONSYM_WRITE_MIN_DEPTH
                    } else {
                        depth
                    }
                })
                .collect(),
            _ => self.cfg.depths.clone(),
        }
    }

    fn run_depths(
        &mut self,
        mode: Mode,
        direction: Direction,
        memory: Memory,
    ) -> Result<(), RunError> {
        for depth in self.depth_set(mode, direction) {
            info!("fifo depth set to: {depth}");
            // Depth is the innermost bitstream-affecting dimension, so this
            // is where the (expensive) reconfiguration lives.
            self.configure_bitstream(mode, direction, memory, depth)?;

            for &pattern_size in &self.cfg.pattern_sizes {
                info!("pattern size set to: {pattern_size}");
                check_open(self.dev)?;

                for block_size in block_sizes_for(self.cfg, mode, pattern_size) {
                    for &pattern_kind in &self.cfg.pattern_kinds {
                        info!("pattern set to: {pattern_kind}");
                        for stat_iteration in 1..=self.cfg.statistic_iter {
                            info!("statistical iteration: {stat_iteration}");
                            let case = TestCase {
                                mode,
                                direction,
                                memory,
                                depth,
                                pattern_kind,
                                pattern_size,
                                block_size,
                                stat_iteration,
                            };
                            let measurement =
                                executor::run(self.dev, &case, self.cfg.iterations)?;
                            self.recorder
                                .record(&case, &measurement, self.cfg.iterations)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn configure_bitstream(
        &mut self,
        mode: Mode,
        direction: Direction,
        memory: Memory,
        depth: u32,
    ) -> Result<(), DeviceError> {
        let file = bitstream_file_name(direction, mode, memory, depth);
        let path: PathBuf = self.cfg.bitfiles_path.join(mode.as_str()).join(file);
        info!("loading bitstream {}", path.display());
        self.dev.configure(&path)
    }
}

/// Duplex transfers walk the pattern in configured blocks; every other shape
/// moves the whole pattern at once.
fn block_sizes_for(cfg: &SweepConfig, mode: Mode, pattern_size: usize) -> Vec<usize> {
    match mode {
        Mode::Duplex => cfg
            .block_sizes
            .iter()
            .copied()
            .filter(|&block| block <= pattern_size && pattern_size % block == 0)
            .collect(),
        _ => vec![pattern_size],
    }
}
