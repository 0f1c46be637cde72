//! The shared stepping routine behind pattern fill and pattern check.

use crate::{Mode, PatternKind, RegisterParams};

/// Where a generation pass sends each expected byte.
///
/// Filling writes the byte into the buffer; checking compares it against the
/// buffer and counts mismatches. Every pattern algorithm talks to a [`Pass`]
/// only, so generation and verification execute identical stepping logic.
enum Action<'a> {
    Fill(&'a mut [u8]),
    Check(&'a [u8]),
}

struct Pass<'a> {
    action: Action<'a>,
    errors: u64,
}

impl Pass<'_> {
    fn put(&mut self, index: usize, expected: u8) {
        match &mut self.action {
            Action::Fill(buf) => buf[index] = expected,
            Action::Check(buf) => {
                if buf[index] != expected {
                    self.errors += 1;
                }
            }
        }
    }

    fn len(&self) -> usize {
        match &self.action {
            Action::Fill(buf) => buf.len(),
            Action::Check(buf) => buf.len(),
        }
    }

    fn filling(&self) -> bool {
        matches!(self.action, Action::Fill(_))
    }
}

/// Writes the pattern into `buf`, starting from the generator seed.
pub fn fill(buf: &mut [u8], kind: PatternKind, mode: Mode) {
    let mut pass = Pass {
        action: Action::Fill(buf),
        errors: 0,
    };
    run(&mut pass, kind, mode);
    log::debug!("generated {kind} pattern for {mode} mode");
}

/// Compares `buf` against the regenerated pattern and returns the number of
/// mismatched bytes (mismatched frames count per compared byte).
pub fn check(buf: &[u8], kind: PatternKind, mode: Mode) -> u64 {
    let mut pass = Pass {
        action: Action::Check(buf),
        errors: 0,
    };
    run(&mut pass, kind, mode);
    if pass.errors > 0 {
        log::warn!("{} mismatches while checking {kind} pattern", pass.errors);
    }
    pass.errors
}

fn run(pass: &mut Pass<'_>, kind: PatternKind, mode: Mode) {
    let params = mode.register_params();
    match kind {
        PatternKind::Counter8 => counter8(pass, params.ceiling),
        PatternKind::Counter32 => counter_register(pass, params),
        PatternKind::Walking1 => walking1(pass, params),
        PatternKind::AsicFrame => asic_frames(pass),
    }
}

/// Emits the little-endian bytes of `value` into one register-width group,
/// truncated at the buffer edge.
fn emit_register(pass: &mut Pass<'_>, base: usize, value: u64, width: usize) {
    for offset in 0..width {
        let index = base + offset;
        if index >= pass.len() {
            break;
        }
        pass.put(index, (value >> (offset * 8)) as u8);
    }
}

fn counter8(pass: &mut Pass<'_>, ceiling: u64) {
    let mut iter: u64 = 0;
    for index in 0..pass.len() {
        pass.put(index, iter as u8);
        if iter > ceiling {
            iter = 0;
        } else {
            iter = iter.wrapping_add(1);
        }
    }
}

fn counter_register(pass: &mut Pass<'_>, params: RegisterParams) {
    let mut iter: u64 = 0;
    let mut base = 0;
    while base < pass.len() {
        emit_register(pass, base, iter, params.width);
        if iter > params.ceiling {
            iter = 0;
        } else {
            iter = iter.wrapping_add(1);
        }
        base += params.width;
    }
}

fn walking1(pass: &mut Pass<'_>, params: RegisterParams) {
    // The bit walks up to ceiling/2 + 1 and then restarts from bit zero.
    let last = params.ceiling / 2 + 1;
    let mut iter: u64 = 1;
    let mut base = 0;
    while base < pass.len() {
        emit_register(pass, base, iter, params.width);
        if iter == last {
            iter = 1;
        } else {
            iter *= 2;
        }
        base += params.width;
    }
}

const ASIC_FRAME_LEN: usize = 8;
/// Only the id/channel/amplitude bytes of each frame carry data the readout
/// checker validates; the timestamp bytes are written but never compared.
const ASIC_CHECKED_LEN: usize = 3;

const AMPLITUDE_SEED: u16 = 0x123;
const MAX_ID: u8 = 15;

/// One step of the amplitude LFSR: taps at bits 11, 5 and 3
/// (x^12 + x^6 + x^4).
fn lfsr_step(amplitude: u16) -> u16 {
    (amplitude << 1) | (((amplitude >> 11) ^ (amplitude >> 5) ^ (amplitude >> 3)) & 1)
}

/// Bit-packs one 8-byte readout frame.
fn pack_frame(id: u8, channel: u8, amplitude: u16, timestamp: u64) -> [u8; ASIC_FRAME_LEN] {
    [
        id | (channel << 4),
        (channel >> 4) | ((amplitude as u8) << 4),
        (amplitude >> 4) as u8,
        ((amplitude >> 12) as u8) | ((timestamp as u8) << 4),
        (timestamp >> 4) as u8,
        (timestamp >> 12) as u8,
        (timestamp >> 20) as u8,
        (timestamp >> 28) as u8,
    ]
}

fn asic_frames(pass: &mut Pass<'_>) {
    let mut id: u8 = 1;
    let mut channel: u8 = 1;
    let mut amplitude = AMPLITUDE_SEED;
    let mut base = 0;
    while base < pass.len() {
        amplitude = lfsr_step(amplitude);
        // The running byte offset stands in for the readout clock.
        let timestamp = base as u64;
        let frame = pack_frame(id, channel, amplitude, timestamp);

        let visible = if pass.filling() {
            ASIC_FRAME_LEN
        } else {
            ASIC_CHECKED_LEN
        };
        for (offset, byte) in frame.iter().enumerate().take(visible) {
            let index = base + offset;
            if index >= pass.len() {
                break;
            }
            pass.put(index, *byte);
        }

        if channel == u8::MAX {
            channel = 1;
            id = if id == MAX_ID { 1 } else { id + 1 };
        } else {
            channel += 1;
        }
        base += ASIC_FRAME_LEN;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_at(buf: &[u8], index: usize, width: usize) -> u64 {
        let mut value = 0u64;
        for offset in (0..width).rev() {
            value = (value << 8) | buf[index * width + offset] as u64;
        }
        value
    }

    #[test]
    fn fill_then_check_is_clean_for_every_kind_and_mode() {
        for mode in Mode::ALL {
            for kind in PatternKind::ALL {
                let mut buf = vec![0u8; 4096];
                fill(&mut buf, kind, mode);
                assert_eq!(
                    check(&buf, kind, mode),
                    0,
                    "round trip failed for {kind} in {mode} mode"
                );
            }
        }
    }

    #[test]
    fn counter8_counts_bytes_without_wrapping_below_the_ceiling() {
        let mut buf = vec![0u8; 300];
        fill(&mut buf, PatternKind::Counter8, Mode::Bit32);
        for (i, byte) in buf.iter().enumerate() {
            assert_eq!(*byte, i as u8, "byte {i}");
        }
        // The wrap threshold is i32::MAX: the counter keeps incrementing past
        // 255 (the low byte repeats) and the reset branch is unreachable for
        // any realistic pattern size.
        assert_eq!(buf[256], 0);
        assert_eq!(buf[257], 1);
    }

    #[test]
    fn counter32_emits_little_endian_register_values() {
        let mut buf = vec![0u8; 32];
        fill(&mut buf, PatternKind::Counter32, Mode::Bit32);
        for reg in 0..8 {
            assert_eq!(register_at(&buf, reg, 4), reg as u64);
        }
    }

    #[test]
    fn counter32_uses_eight_byte_registers_in_nonsym_mode() {
        let mut buf = vec![0u8; 32];
        fill(&mut buf, PatternKind::Counter32, Mode::NonSym);
        for reg in 0..4 {
            assert_eq!(register_at(&buf, reg, 8), reg as u64);
        }
    }

    #[test]
    fn counter32_truncates_a_trailing_partial_register() {
        let mut buf = vec![0xAAu8; 10];
        fill(&mut buf, PatternKind::Counter32, Mode::Bit32);
        // Third register only has two bytes of room: low bytes of value 2.
        assert_eq!(&buf[8..], &[2, 0]);
        assert_eq!(check(&buf, PatternKind::Counter32, Mode::Bit32), 0);
    }

    #[test]
    fn walking1_doubles_and_wraps_after_bit_thirty() {
        // 31 doubling steps reach 2^30, then the bit restarts at 1.
        let mut buf = vec![0u8; 33 * 4];
        fill(&mut buf, PatternKind::Walking1, Mode::Bit32);
        for reg in 0..31 {
            assert_eq!(register_at(&buf, reg, 4), 1 << reg, "register {reg}");
        }
        assert_eq!(register_at(&buf, 31, 4), 1);
        assert_eq!(register_at(&buf, 32, 4), 2);
    }

    #[test]
    fn walking1_covers_the_full_register_in_nonsym_mode() {
        let mut buf = vec![0u8; 65 * 8];
        fill(&mut buf, PatternKind::Walking1, Mode::NonSym);
        for reg in 0..64 {
            assert_eq!(register_at(&buf, reg, 8), 1u64 << reg, "register {reg}");
        }
        assert_eq!(register_at(&buf, 64, 8), 1);
    }

    #[test]
    fn amplitude_lfsr_matches_hand_computed_sequence() {
        let mut amplitude = AMPLITUDE_SEED;
        let mut sequence = Vec::new();
        for _ in 0..5 {
            amplitude = lfsr_step(amplitude);
            sequence.push(amplitude);
        }
        assert_eq!(sequence, [0x247, 0x48E, 0x91D, 0x123A, 0x2474]);
    }

    #[test]
    fn first_asic_frame_packs_id_channel_and_amplitude() {
        let mut buf = vec![0u8; 16];
        fill(&mut buf, PatternKind::AsicFrame, Mode::Bit32);
        // id 1, channel 1, amplitude 0x247, timestamp 0.
        assert_eq!(&buf[..8], &[0x11, 0x70, 0x24, 0x00, 0x00, 0x00, 0x00, 0x00]);
        // Second frame: channel 2, amplitude 0x48E, timestamp 8.
        assert_eq!(buf[8], 0x21);
        assert_eq!(buf[9], 0xE0);
        assert_eq!(buf[10], 0x48);
        assert_eq!(buf[11], 0x80);
    }

    #[test]
    fn corrupting_one_byte_is_detected_for_register_patterns() {
        for kind in [
            PatternKind::Counter8,
            PatternKind::Counter32,
            PatternKind::Walking1,
        ] {
            let mut buf = vec![0u8; 1024];
            fill(&mut buf, kind, Mode::Bit32);
            buf[513] ^= 0x40;
            assert!(
                check(&buf, kind, Mode::Bit32) >= 1,
                "corruption missed for {kind}"
            );
        }
    }

    #[test]
    fn asic_check_ignores_the_timestamp_bytes() {
        // The checker only compares the first three bytes of each frame, so
        // corruption confined to bytes 4..8 must go unnoticed.
        let mut buf = vec![0u8; 64];
        fill(&mut buf, PatternKind::AsicFrame, Mode::Bit32);
        for offset in 4..8 {
            buf[16 + offset] ^= 0xFF;
        }
        assert_eq!(check(&buf, PatternKind::AsicFrame, Mode::Bit32), 0);

        buf[16] ^= 0x01;
        assert!(check(&buf, PatternKind::AsicFrame, Mode::Bit32) >= 1);
    }

    #[test]
    fn asic_channel_wrap_advances_the_id() {
        // Frame 255 (offset 255 * 8) is the first with channel wrapped back
        // to 1 and id advanced to 2.
        let frames = 256;
        let mut buf = vec![0u8; frames * 8];
        fill(&mut buf, PatternKind::AsicFrame, Mode::Bit32);
        let low_nibble = buf[255 * 8] & 0x0F;
        let channel_low = buf[255 * 8] >> 4;
        assert_eq!(low_nibble, 2);
        assert_eq!(channel_low, 1);
    }
}
