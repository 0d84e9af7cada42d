//! Piecewise-linear envelope stepped in integer ticks.

use serde::Serialize;

use crate::cursor::Cursor;
use crate::error::FormatError;

use super::oscillator::Waveform;

/// A breakpoint envelope. Durations and peaks are 16-bit fractions of the
/// stepping period and of full scale respectively.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Oscillator shape used when this envelope drives a waveform.
    pub form: Waveform,
    pub start: i32,
    pub end: i32,
    pub durations: Vec<u16>,
    pub peaks: Vec<u16>,
}

impl Default for Envelope {
    /// A single linear ramp from 0 to full scale.
    fn default() -> Self {
        Envelope {
            form: Waveform::Off,
            start: 0,
            end: 0,
            durations: vec![0, 65535],
            peaks: vec![0, 65535],
        }
    }
}

impl Envelope {
    /// Read a full envelope record: form, start, end, shape.
    pub fn read(&mut self, input: &mut Cursor<'_>) -> Result<(), FormatError> {
        self.form = Waveform::from_code(input.u8()?);
        self.start = input.i32()?;
        self.end = input.i32()?;
        self.read_shape(input)
    }

    /// Read only the breakpoint list.
    pub fn read_shape(&mut self, input: &mut Cursor<'_>) -> Result<(), FormatError> {
        let segments = input.u8()? as usize;
        self.durations = Vec::with_capacity(segments);
        self.peaks = Vec::with_capacity(segments);
        for _ in 0..segments {
            self.durations.push(input.u16()?);
            self.peaks.push(input.u16()?);
        }
        Ok(())
    }

    pub fn segments(&self) -> usize {
        self.peaks.len()
    }

    /// Start walking the breakpoints from the beginning.
    pub fn stepper(&self) -> Stepper<'_> {
        Stepper {
            shape: self,
            threshold: 0,
            position: 0,
            delta: 0,
            amplitude: 0,
            ticks: 0,
        }
    }
}

/// Playback state over an [`Envelope`]. Levels are kept in 17.15 fixed point.
#[derive(Debug, Clone)]
pub struct Stepper<'a> {
    shape: &'a Envelope,
    threshold: i32,
    position: usize,
    delta: i32,
    amplitude: i32,
    ticks: i32,
}

impl Stepper<'_> {
    /// Advance one tick and return the level in `[0, 65535]`. `period` is
    /// the number of ticks a duration of 65536 spans.
    pub fn step(&mut self, period: usize) -> i32 {
        let peaks = &self.shape.peaks;
        if peaks.is_empty() {
            return 0;
        }

        if self.ticks >= self.threshold {
            self.amplitude = (peaks[self.position] as i32) << 15;
            self.position = (self.position + 1).min(peaks.len() - 1);
            self.threshold =
                (self.shape.durations[self.position] as f64 / 65536.0 * period as f64) as i32;
            if self.threshold > self.ticks {
                let target = (peaks[self.position] as i32) << 15;
                self.delta = (target - self.amplitude) / (self.threshold - self.ticks);
            }
        }

        // Past the last breakpoint the sum may wrap; the level is taken
        // before the add and stays exact.
        self.amplitude = self.amplitude.wrapping_add(self.delta);
        self.ticks += 1;
        self.amplitude.wrapping_sub(self.delta) >> 15
    }
}
