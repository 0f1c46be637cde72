//! The three transfer shapes and their timing disciplines.

use std::time::{Duration, Instant};

use device::endpoints::{self, trigger};
use device::{Device, DeviceError, Direction};
use log::debug;

use crate::{Measurement, TestCase};

/// Programs the pattern-select register and resets the device-side state.
/// Runs before every executor dispatch.
pub fn prepare(dev: &mut impl Device, case: &TestCase) -> Result<(), DeviceError> {
    dev.set_register(
        endpoints::PATTERN_TO_GENERATE,
        case.pattern_kind.wire_code(),
    );
    dev.commit_registers();
    dev.activate_trigger(endpoints::TRIGGER, trigger::RESET)
}

/// Runs one test case end-to-end and returns its measurement.
///
/// Dispatches on the transfer direction; duplex mode always arrives with the
/// synthesized [`Direction::Bidir`]. After the transfer loop the device
/// cycle counter is snapshotted, and for write direction the host-side error
/// tally is replaced by the generator-side error wire (the host never sees
/// the data the FPGA checked).
pub fn run(
    dev: &mut impl Device,
    case: &TestCase,
    iterations: u32,
) -> Result<Measurement, DeviceError> {
    prepare(dev, case)?;
    let mut measurement = match case.direction {
        Direction::Read => run_read(dev, case, iterations),
        Direction::Write => run_write(dev, case, iterations),
        Direction::Bidir => run_duplex(dev, case, iterations),
    }?;

    measurement.device_counts =
        dev.read_counter(endpoints::NUMBER_OF_COUNTS_A, endpoints::NUMBER_OF_COUNTS_B);
    if case.direction == Direction::Write {
        measurement.errors = dev.read_wire(endpoints::ERROR_COUNT) as u64;
    }
    Ok(measurement)
}

/// Read shape: per-iteration timing, host-side verification after the clock
/// stops so checking cost never pollutes the transfer latency.
fn run_read(
    dev: &mut impl Device,
    case: &TestCase,
    iterations: u32,
) -> Result<Measurement, DeviceError> {
    let mut data = vec![0u8; case.pattern_size];
    let mut host_total = Duration::ZERO;
    let mut errors = 0u64;

    for iteration in 0..iterations {
        debug!("read iteration {iteration}");
        dev.activate_trigger(endpoints::TRIGGER, trigger::RESET_PATTERN)?;

        let started = Instant::now();
        dev.activate_trigger(endpoints::TRIGGER, trigger::START_TIMER)?;
        dev.read_block(endpoints::PIPE_OUT, &mut data)?;
        dev.activate_trigger(endpoints::TRIGGER, trigger::STOP_TIMER)?;
        host_total += started.elapsed();

        errors += pattern::check(&data, case.pattern_kind, case.mode);
    }

    Ok(Measurement {
        host_total,
        device_counts: 0,
        errors,
    })
}

/// Write shape: the buffer is filled once and one clock spans the whole
/// burst; write throughput is deliberately an aggregate figure.
fn run_write(
    dev: &mut impl Device,
    case: &TestCase,
    iterations: u32,
) -> Result<Measurement, DeviceError> {
    let mut data = vec![0u8; case.pattern_size];
    pattern::fill(&mut data, case.pattern_kind, case.mode);

    let started = Instant::now();
    dev.activate_trigger(endpoints::TRIGGER, trigger::START_TIMER)?;
    for iteration in 0..iterations {
        debug!("write iteration {iteration}");
        dev.activate_trigger(endpoints::TRIGGER, trigger::RESET_PATTERN)?;
        dev.write_block(endpoints::PIPE_IN, &data)?;
    }
    dev.activate_trigger(endpoints::TRIGGER, trigger::STOP_TIMER)?;
    let host_total = started.elapsed();

    Ok(Measurement {
        host_total,
        device_counts: 0,
        errors: 0,
    })
}

/// Duplex shape: walk the pattern in blocks, write each block and read it
/// straight back, then compare the echo byte-for-byte. Round-trip fidelity
/// is the property under test, so no pattern regeneration here; one error
/// per unequal block, matching the block granularity of the hardware
/// report.
fn run_duplex(
    dev: &mut impl Device,
    case: &TestCase,
    iterations: u32,
) -> Result<Measurement, DeviceError> {
    let mut data = vec![0u8; case.pattern_size];
    pattern::fill(&mut data, case.pattern_kind, case.mode);
    let mut received = vec![0u8; case.block_size];
    let mut host_total = Duration::ZERO;
    let mut errors = 0u64;

    for iteration in 0..iterations {
        debug!("duplex iteration {iteration}");
        for sent in data.chunks(case.block_size) {
            dev.activate_trigger(endpoints::TRIGGER, trigger::RESET)?;

            let started = Instant::now();
            dev.activate_trigger(endpoints::TRIGGER, trigger::START_TIMER)?;
            dev.write_block(endpoints::PIPE_IN, sent)?;
            dev.read_block(endpoints::PIPE_OUT, &mut received[..sent.len()])?;
            dev.activate_trigger(endpoints::TRIGGER, trigger::STOP_TIMER)?;
            host_total += started.elapsed();

            if sent != &received[..sent.len()] {
                debug!("echoed block does not match the block sent");
                errors += 1;
            }
        }
    }

    Ok(Measurement {
        host_total,
        device_counts: 0,
        errors,
    })
}
