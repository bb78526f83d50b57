//! YM5/YM6 special-effect slot decoder.
//!
//! Each 16-byte frame carries two effect slots built from MFP timer
//! settings:
//! - Slot 1: code in r1\[7:4\], prescaler in r6\[7:5\], counter in r14
//! - Slot 2: code in r3\[7:4\], prescaler in r8\[7:5\], counter in r15
//!
//! The timer frequency is `MFP_CLOCK / (prescaler * counter)`; a zero
//! prescaler or counter means the slot is inactive.

/// MFP timer prescaler values, indexed by the 3-bit control field.
const MFP_PREDIV: [u32; 8] = [0, 4, 10, 16, 50, 64, 100, 200];

/// Atari ST MFP (MC68901) clock in Hz.
pub const MFP_CLOCK: u32 = ay3_common::ATARI_MFP_CLOCK_HZ;

/// A decoded effect request for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectCommand {
    /// Square-gating SID voice.
    Sid {
        /// Channel index (0=A, 1=B, 2=C).
        voice: u8,
        /// Gate frequency in Hz.
        freq: u32,
        /// Gate volume (0-15).
        volume: u8,
    },
    /// Sinusoidal SID voice.
    SinusSid {
        /// Channel index (0=A, 1=B, 2=C).
        voice: u8,
        /// Modulation frequency in Hz.
        freq: u32,
        /// Peak volume (0-15).
        volume: u8,
    },
    /// DigiDrum sample start.
    DigiDrum {
        /// Channel index (0=A, 1=B, 2=C).
        voice: u8,
        /// Index into the file's drum bank.
        index: u8,
        /// Replay frequency in Hz.
        freq: u32,
    },
    /// Sync Buzzer envelope retrigger.
    SyncBuzzer {
        /// Retrigger frequency in Hz.
        freq: u32,
        /// Envelope shape, taken from R13's low nibble even when the
        /// frame suppresses the R13 register write.
        env_shape: u8,
    },
}

#[inline]
fn timer_freq(prediv_reg: u8, counter: u8) -> Option<u32> {
    let prediv = MFP_PREDIV[((prediv_reg >> 5) & 0x07) as usize];
    if prediv == 0 || counter == 0 {
        return None;
    }
    Some(MFP_CLOCK / (prediv * counter as u32))
}

/// Decode one YM6 effect slot.
///
/// Code nibble map: 0 none; 1-3 SID voice A-C; 5-7 DigiDrum voice A-C;
/// 9-11 Sinus SID voice A-C; 13-15 Sync Buzzer. Codes 4, 8 and 12 are
/// reserved and decode to none.
fn decode_slot_ym6(
    code_reg: u8,
    prediv_reg: u8,
    counter: u8,
    frame: &[u8; 16],
) -> Option<EffectCommand> {
    let code = (code_reg >> 4) & 0x0F;
    if code == 0 {
        return None;
    }

    let freq = timer_freq(prediv_reg, counter)?;

    match code {
        0x1..=0x3 => {
            let voice = code - 1;
            Some(EffectCommand::Sid {
                voice,
                freq,
                volume: frame[8 + voice as usize] & 0x0F,
            })
        }
        0x5..=0x7 => {
            let voice = code - 5;
            Some(EffectCommand::DigiDrum {
                voice,
                index: frame[8 + voice as usize] & 0x1F,
                freq,
            })
        }
        0x9..=0xB => {
            let voice = code - 9;
            Some(EffectCommand::SinusSid {
                voice,
                freq,
                volume: frame[8 + voice as usize] & 0x0F,
            })
        }
        0xD..=0xF => Some(EffectCommand::SyncBuzzer {
            freq,
            env_shape: frame[13] & 0x0F,
        }),
        _ => None,
    }
}

/// Decode both effect slots of a YM6 frame.
pub fn decode_effects_ym6(frame: &[u8; 16]) -> [Option<EffectCommand>; 2] {
    [
        decode_slot_ym6(frame[1], frame[6], frame[14], frame),
        decode_slot_ym6(frame[3], frame[8], frame[15], frame),
    ]
}

/// Decode the YM5 effects of a frame.
///
/// YM5 only knows SID (2-bit voice selector in r1\[5:4\], timer from
/// r6/r14) and DigiDrum (selector in r3\[5:4\], drum index in the voice's
/// volume register, timer from r8/r15). Selector 0 means absent.
pub fn decode_effects_ym5(frame: &[u8; 16]) -> [Option<EffectCommand>; 2] {
    let mut slots = [None, None];

    let sid_code = (frame[1] >> 4) & 0x03;
    if sid_code != 0 {
        let voice = sid_code - 1;
        slots[0] = timer_freq(frame[6], frame[14]).map(|freq| EffectCommand::Sid {
            voice,
            freq,
            volume: frame[8 + voice as usize] & 0x0F,
        });
    }

    let drum_code = (frame[3] >> 4) & 0x03;
    if drum_code != 0 {
        let voice = drum_code - 1;
        slots[1] = timer_freq(frame[8], frame[15]).map(|freq| EffectCommand::DigiDrum {
            voice,
            index: frame[8 + voice as usize] & 0x1F,
            freq,
        });
    }

    slots
}
