//! Table-driven integer oscillators.
//!
//! Phase is a 15-bit wrapping integer (one period = 32768 steps). Square,
//! sine and sawtooth outputs are scaled by `amplitude / 16384`; noise is
//! scaled by `amplitude` directly.

use std::f64::consts::PI;
use std::sync::OnceLock;

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;
use serde::Serialize;

/// Number of phase steps in one oscillator period.
pub const PERIOD: usize = 32768;
const PHASE_MASK: i32 = 0x7FFF;
const NOISE_SEED: u64 = 0x5EED_50FF;
/// Phase steps per noise table entry.
const NOISE_STRIDE: i32 = 2607;

/// Supported waveform shapes, by wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Off,
    Square,
    Sine,
    Sawtooth,
    Noise,
}

impl Waveform {
    /// Map a wire code to a shape. Unknown codes are silent.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Waveform::Square,
            2 => Waveform::Sine,
            3 => Waveform::Sawtooth,
            4 => Waveform::Noise,
            _ => Waveform::Off,
        }
    }
}

struct Tables {
    sine: Vec<i32>,
    noise: Vec<i32>,
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let sine = (0..PERIOD)
            .map(|i| ((i as f64 * PI / 16384.0).sin() * 16384.0).round() as i32)
            .collect();

        let mut rng = Pcg32::seed_from_u64(NOISE_SEED);
        let noise = (0..PERIOD)
            .map(|_| (rng.next_u32() & 0x2) as i32 - 1)
            .collect();

        log::trace!("oscillator tables initialized ({PERIOD} entries)");
        Tables { sine, noise }
    })
}

/// Sample value of `form` at `phase`, scaled by `amplitude`.
pub fn generate(form: Waveform, phase: i32, amplitude: i32) -> i32 {
    let amp = amplitude as i64;
    match form {
        Waveform::Square => {
            if phase & PHASE_MASK < 16384 {
                amplitude
            } else {
                amplitude.wrapping_neg()
            }
        }
        Waveform::Sine => {
            let s = tables().sine[(phase & PHASE_MASK) as usize] as i64;
            ((s * amp) >> 14) as i32
        }
        Waveform::Sawtooth => ((((phase & PHASE_MASK) as i64 * amp) >> 14) - amp) as i32,
        // Scaled by the raw amplitude, without the 14-bit downshift the other
        // shapes use. Kept as found in existing track data.
        Waveform::Noise => {
            let idx = ((phase / NOISE_STRIDE) & PHASE_MASK) as usize;
            (tables().noise[idx] as i64 * amp) as i32
        }
        Waveform::Off => 0,
    }
}
