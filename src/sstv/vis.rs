//! VIS (Vertical Interval Signaling) header
//!
//! 910 ms calibration header announcing the mode: leader, break, leader,
//! start bit, seven LSB-first data bits, even parity, stop bit.

use super::modes::SYNC_FREQ;

/// Leader tone frequency
pub const LEADER_FREQ: f64 = 1900.0;

/// Data bit 1
pub const BIT_ONE_FREQ: f64 = 1100.0;

/// Data bit 0
pub const BIT_ZERO_FREQ: f64 = 1300.0;

const LEADER_MS: f64 = 300.0;
const BREAK_MS: f64 = 10.0;
const BIT_MS: f64 = 30.0;

/// Total header duration in milliseconds
pub const VIS_DURATION_MS: f64 = 2.0 * LEADER_MS + BREAK_MS + 10.0 * BIT_MS;

/// Tone sequence `(duration_ms, freq_hz)` for a 7-bit VIS code
pub fn vis_tones(code: u8) -> Vec<(f64, f64)> {
    let code = code & 0x7f;
    let mut tones = vec![
        (LEADER_MS, LEADER_FREQ),
        (BREAK_MS, SYNC_FREQ),
        (LEADER_MS, LEADER_FREQ),
        (BIT_MS, SYNC_FREQ),
    ];
    let bit_freq = |set: bool| if set { BIT_ONE_FREQ } else { BIT_ZERO_FREQ };
    for bit in 0..7 {
        tones.push((BIT_MS, bit_freq((code >> bit) & 1 == 1)));
    }
    tones.push((BIT_MS, bit_freq(code.count_ones() % 2 == 1)));
    tones.push((BIT_MS, SYNC_FREQ));
    tones
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_duration() {
        let total: f64 = vis_tones(44).iter().map(|(ms, _)| ms).sum();
        assert_eq!(total, VIS_DURATION_MS);
        assert_eq!(VIS_DURATION_MS, 910.0);
    }

    #[test]
    fn test_martin_m1_bits_and_parity() {
        // 44 = 0b0101100, three bits set -> parity bit 1
        let tones = vis_tones(44);
        let bits: Vec<bool> = tones[4..11].iter().map(|&(_, f)| f == BIT_ONE_FREQ).collect();
        assert_eq!(bits, vec![false, false, true, true, false, true, false]);
        assert_eq!(tones[11].1, BIT_ONE_FREQ);
        assert_eq!(tones[12], (BIT_MS, SYNC_FREQ));
    }

    #[test]
    fn test_even_code_has_zero_parity() {
        // 8 = one bit set -> parity 1; 40 = two bits -> parity 0
        assert_eq!(vis_tones(8)[11].1, BIT_ONE_FREQ);
        assert_eq!(vis_tones(40)[11].1, BIT_ZERO_FREQ);
    }
}
