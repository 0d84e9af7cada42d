//! Time-varying IIR filter built from cascaded complex pole pairs.
//!
//! Each direction (onset taps feed forward, release taps feed back) holds up
//! to four second-order sections. For a given envelope position every section
//! contributes `1 - 2·g·cos(θ)·z⁻¹ + g²·z⁻²`; the sections are multiplied out
//! into a single direct-form polynomial of order `2·pairs`.

use std::f64::consts::PI;

use serde::Serialize;

use crate::cursor::Cursor;
use crate::error::FormatError;

use super::envelope::Envelope;

/// Maximum number of pole pairs per direction.
pub const MAX_PAIRS: usize = 4;
/// Maximum cascade order per direction.
pub const MAX_ORDER: usize = MAX_PAIRS * 2;

/// Reference frequency of code 0 (C1, in Hz).
const BASE_FREQUENCY: f64 = 32.703197;
/// Half of the 22050 Hz output rate. Fixed by the format.
const PHASE_CLOCK: f64 = 11025.0;
const FIXED_ONE: f64 = 65536.0;

/// Which half of the filter a set of taps belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Onset,
    Release,
}

impl Direction {
    fn index(self) -> usize {
        match self {
            Direction::Onset => 0,
            Direction::Release => 1,
        }
    }
}

/// Parsed filter parameters. All tables are indexed
/// `[direction][start = 0 / end = 1][pair]`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Filter {
    pub pairs: [usize; 2],
    /// Makeup gain at envelope start and end, in 1/327.68 dB units.
    pub unities: [u16; 2],
    pub frequencies: [[[u16; MAX_PAIRS]; 2]; 2],
    pub ranges: [[[u16; MAX_PAIRS]; 2]; 2],
}

/// Cascade taps for one envelope position, in float and 16.16 fixed point.
///
/// Callers own one of these per rendering loop; [`Filter::eval`] overwrites
/// the direction it is asked for.
#[derive(Debug, Clone, Default)]
pub struct Coefficients {
    unity: f64,
    unity16: i64,
    order: [usize; 2],
    taps: [[f64; MAX_ORDER]; 2],
    taps16: [[i64; MAX_ORDER]; 2],
}

impl Coefficients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overall linear gain computed by the last onset evaluation.
    pub fn unity(&self) -> f64 {
        self.unity
    }

    /// [`Coefficients::unity`] in 16.16 fixed point.
    pub fn unity16(&self) -> i64 {
        self.unity16
    }

    pub fn order(&self, direction: Direction) -> usize {
        self.order[direction.index()]
    }

    pub fn taps(&self, direction: Direction) -> &[f64] {
        let d = direction.index();
        &self.taps[d][..self.order[d]]
    }

    pub fn fixed(&self, direction: Direction) -> &[i64] {
        let d = direction.index();
        &self.taps16[d][..self.order[d]]
    }
}

impl Filter {
    /// Read a filter record. When the parameters move over the tone's life
    /// (any migration bit set, or differing unities) a breakpoint shape
    /// follows and is read into `envelope`.
    pub fn read(
        &mut self,
        input: &mut Cursor<'_>,
        envelope: &mut Envelope,
    ) -> Result<(), FormatError> {
        let count = input.u8()?;
        let onset = count >> 4;
        let release = count & 0xF;

        if onset as usize > MAX_PAIRS || release as usize > MAX_PAIRS {
            return Err(FormatError::InvalidPairCount { onset, release });
        }

        self.pairs = [onset as usize, release as usize];

        if count == 0 {
            self.unities = [0, 0];
            return Ok(());
        }

        self.unities = [input.u16()?, input.u16()?];
        // Bit `direction * 4 + pair` set: that pair has distinct end values.
        let migration = input.u8()?;

        for d in 0..2 {
            for p in 0..self.pairs[d] {
                self.frequencies[d][0][p] = input.u16()?;
                self.ranges[d][0][p] = input.u16()?;
            }
        }

        for d in 0..2 {
            for p in 0..self.pairs[d] {
                if migration & (1 << (d * 4 + p)) != 0 {
                    self.frequencies[d][1][p] = input.u16()?;
                    self.ranges[d][1][p] = input.u16()?;
                } else {
                    self.frequencies[d][1][p] = self.frequencies[d][0][p];
                    self.ranges[d][1][p] = self.ranges[d][0][p];
                }
            }
        }

        if migration != 0 || self.unities[0] != self.unities[1] {
            log::trace!("filter varies over time (migration={migration:#04x})");
            envelope.read_shape(input)?;
        }
        Ok(())
    }

    /// True when either direction has at least one section.
    pub fn is_active(&self) -> bool {
        self.pairs[0] > 0 || self.pairs[1] > 0
    }

    /// Compute the cascade for `direction` at `position` (0 = onset, 1 = fully
    /// released) into `coef`, returning its order.
    ///
    /// An onset evaluation also refreshes the overall unity gain, and only
    /// onset taps are scaled by it. Release taps are left unscaled. This
    /// matches existing track data and has not been verified as deliberate.
    pub fn eval(&self, direction: Direction, position: f64, coef: &mut Coefficients) -> usize {
        let d = direction.index();

        if direction == Direction::Onset {
            let start = self.unities[0] as f64;
            let end = self.unities[1] as f64;
            let db = (start + (end - start) * position) / 327.68;
            coef.unity = 10f64.powf(-db / 20.0);
            coef.unity16 = (coef.unity * FIXED_ONE) as i64;
        }

        let pairs = self.pairs[d];
        let order = pairs * 2;
        coef.order[d] = order;
        if pairs == 0 {
            return 0;
        }

        let taps = &mut coef.taps[d];
        let (a, b) = self.section(direction, 0, position);
        taps[0] = a;
        taps[1] = b;

        for n in 1..pairs {
            let (a, b) = self.section(direction, n, position);

            // Multiply the degree-2n polynomial by (1 + a·z⁻¹ + b·z⁻²).
            // Highest terms first so lower inputs are still unmodified.
            taps[n * 2 + 1] = taps[n * 2 - 1] * b;
            taps[n * 2] = taps[n * 2 - 1] * a + taps[n * 2 - 2] * b;
            for k in (2..n * 2).rev() {
                taps[k] += taps[k - 1] * a + taps[k - 2] * b;
            }
            taps[1] += taps[0] * a + b;
            taps[0] += a;
        }

        if direction == Direction::Onset {
            for t in taps[..order].iter_mut() {
                *t *= coef.unity;
            }
        }

        for (fixed, &t) in coef.taps16[d].iter_mut().zip(&coef.taps[d][..order]) {
            *fixed = (t * FIXED_ONE) as i64;
        }

        order
    }

    /// First and second order terms of one section's quadratic.
    fn section(&self, direction: Direction, pair: usize, position: f64) -> (f64, f64) {
        let g = self.gain(direction, pair, position);
        let theta = self.phase(direction, pair, position);
        (-2.0 * g * theta.cos(), g * g)
    }

    /// Pole radius of `pair` at `position`.
    pub fn gain(&self, direction: Direction, pair: usize, position: f64) -> f64 {
        let d = direction.index();
        let a = self.ranges[d][0][pair] as f64;
        let b = self.ranges[d][1][pair] as f64;
        let g = (a + (b - a) * position) * (100.0 / 65536.0);
        1.0 - 10f64.powf(-g / 20.0)
    }

    /// Pole angle of `pair` at `position`, in radians per output sample.
    pub fn phase(&self, direction: Direction, pair: usize, position: f64) -> f64 {
        let d = direction.index();
        let a = self.frequencies[d][0][pair] as f64;
        let b = self.frequencies[d][1][pair] as f64;
        normalize((a + (b - a) * position) / 8192.0)
    }
}

/// Octaves above C1 to angular frequency against the 11025 Hz clock.
pub fn normalize(octaves: f64) -> f64 {
    BASE_FREQUENCY * 2f64.powf(octaves) * PI / PHASE_CLOCK
}
