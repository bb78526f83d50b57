//! PSG lookup tables.
//!
//! All tables are immutable constants: the 32-level logarithmic DAC curve,
//! the envelope waveforms, register write masks and the 4-bit DigiDrum
//! expansion curve.

/// Measured YM2149 DAC output for the 32 internal amplitude levels,
/// normalised to 1.0.
///
/// The chip's DAC is logarithmic; the 4-bit fixed volumes address every
/// second entry (`level << 1`) while the envelope generator uses the full
/// 5-bit range.
pub const VOLUME_TABLE: [f32; 32] = [
    0.0,
    0.0,
    0.004_654_001_7,
    0.007_721_065_1,
    0.010_955_978,
    0.013_962_005,
    0.016_998_550,
    0.020_019_837,
    0.024_368_658,
    0.029_694_057,
    0.035_065_232,
    0.040_390_631,
    0.048_538_949,
    0.058_335_241,
    0.068_055_238,
    0.077_775_235,
    0.092_515_450,
    0.111_085_679,
    0.129_747_463,
    0.148_485_542,
    0.176_668_956,
    0.211_551_080,
    0.246_387_427,
    0.281_101_701,
    0.333_730_068,
    0.400_427_253,
    0.467_383_841,
    0.534_431_983,
    0.635_172_045,
    0.758_007_172,
    0.879_926_757,
    1.0,
];

/// Register write masks. Values written to a register are ANDed with the
/// corresponding mask before being stored.
pub const REG_MASK: [u8; 16] = [
    0xFF, 0x0F, // tone A period
    0xFF, 0x0F, // tone B period
    0xFF, 0x0F, // tone C period
    0x1F, // noise period
    0x3F, // mixer
    0x1F, 0x1F, 0x1F, // volumes (bit 4 = envelope)
    0xFF, 0xFF, // envelope period
    0x0F, // envelope shape
    0xFF, 0xFF, // effect data (YM5/YM6)
];

/// Expansion curve for 4-bit packed DigiDrum samples.
///
/// The low nibble of each stored byte indexes this table to recover an
/// 8-bit unsigned sample; the curve follows the chip's logarithmic DAC
/// (volume table scaled to a byte).
pub const DIGIDRUM_4BIT: [u8; 16] = [
    0, 1, 2, 2, 4, 6, 9, 12, 17, 24, 35, 48, 72, 103, 165, 255,
];

/// Maps the 16 envelope shape register values onto the 10 unique waveforms
/// stored in [`ENV_DATA`].
///
/// Shapes 0-3 all decay once and hold at zero; shapes 4-7 all attack once
/// and drop to zero; shapes 8-15 are distinct.
pub const SHAPE_MAP: [usize; 16] = [0, 0, 0, 0, 1, 1, 1, 1, 2, 3, 4, 5, 6, 7, 8, 9];

/// Steps per envelope phase.
const PHASE_STEPS: usize = 32;

/// Envelope entries per waveform: 4 phases of 32 steps. The first two
/// phases cover positions -64..-1 (the attack/decay ramp), the last two
/// positions 0..63 (the sustain loop region).
pub const ENV_STEPS: usize = 4 * PHASE_STEPS;

/// Each waveform is four phases, each a (start, end) amplitude pair that is
/// interpolated over 32 steps. 1 means full level (31), 0 means silence.
const ENV_PHASES: [[(u8, u8); 4]; 10] = [
    // shapes 0-3: decay once, hold 0
    [(1, 0), (0, 0), (0, 0), (0, 0)],
    // shapes 4-7: attack once, hold 0
    [(0, 1), (0, 0), (0, 0), (0, 0)],
    // shape 8: repeating sawtooth down
    [(1, 0), (1, 0), (1, 0), (1, 0)],
    // shape 9: decay once, hold 0
    [(1, 0), (0, 0), (0, 0), (0, 0)],
    // shape 10: repeating triangle (down first)
    [(1, 0), (0, 1), (1, 0), (0, 1)],
    // shape 11: decay once, hold max
    [(1, 0), (1, 1), (1, 1), (1, 1)],
    // shape 12: repeating sawtooth up
    [(0, 1), (0, 1), (0, 1), (0, 1)],
    // shape 13: attack once, hold max
    [(0, 1), (1, 1), (1, 1), (1, 1)],
    // shape 14: repeating triangle (up first)
    [(0, 1), (1, 0), (0, 1), (1, 0)],
    // shape 15: attack once, hold 0
    [(0, 1), (0, 0), (0, 0), (0, 0)],
];

/// The 10 envelope waveforms, 128 five-bit levels each.
///
/// Indexed as `ENV_DATA[SHAPE_MAP[shape] * ENV_STEPS + (position + 64)]`
/// with `position` in -64..=63.
pub static ENV_DATA: [u8; 10 * ENV_STEPS] = build_env_data();

const fn build_env_data() -> [u8; 10 * ENV_STEPS] {
    let mut data = [0u8; 10 * ENV_STEPS];
    let mut wave = 0;
    while wave < 10 {
        let mut phase = 0;
        while phase < 4 {
            let (start, end) = ENV_PHASES[wave][phase];
            let mut step = 0;
            while step < PHASE_STEPS {
                let level = match (start, end) {
                    (0, 0) => 0,
                    (1, 1) => 31,
                    (0, 1) => step as u8,
                    _ => 31 - step as u8,
                };
                data[wave * ENV_STEPS + phase * PHASE_STEPS + step] = level;
                step += 1;
            }
            phase += 1;
        }
        wave += 1;
    }
    data
}
