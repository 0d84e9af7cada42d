//! Mixer — sums tone outputs into a signed 8-bit buffer with hard clipping.

/// A summing mixer that accumulates tones into one 8-bit track buffer.
#[derive(Debug, Clone, Default)]
pub struct Mixer {
    buffer: Vec<i8>,
}

impl Mixer {
    pub fn new() -> Self {
        Mixer { buffer: Vec::new() }
    }

    /// Prepare a buffer of `num_samples` filled with zeros.
    pub fn clear(&mut self, num_samples: usize) {
        self.buffer.clear();
        self.buffer.resize(num_samples, 0);
    }

    /// Add 16-bit range `samples` starting at `offset`. Each value is reduced
    /// to 8 bits before the add; the sum is clipped to `[-128, 127]`.
    /// Samples falling past the end of the buffer are dropped.
    pub fn add(&mut self, offset: usize, samples: &[i32]) {
        let Some(dest) = self.buffer.get_mut(offset..) else {
            return;
        };
        for (out, &s) in dest.iter_mut().zip(samples) {
            *out = saturate(*out as i32 + (s >> 8));
        }
    }

    /// Length of the buffer once `[begin, end)` plays `loops` times, or
    /// `None` when that does not fit in `usize`.
    pub fn repeated_len(&self, begin: usize, end: usize, loops: u32) -> Option<usize> {
        let extra = usize::try_from(loops.saturating_sub(1)).ok()?;
        end.saturating_sub(begin)
            .checked_mul(extra)?
            .checked_add(self.buffer.len())
    }

    /// Repeat `[begin, end)` so it plays `loops` times in total, moving
    /// everything after `end` behind the last repetition. Invalid regions,
    /// `loops <= 1` and lengths overflowing `usize` leave the buffer untouched.
    pub fn repeat(&mut self, begin: usize, end: usize, loops: u32) {
        if loops <= 1 || begin >= end || end > self.buffer.len() {
            return;
        }
        let Some(total) = self.repeated_len(begin, end, loops) else {
            return;
        };
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&self.buffer[..end]);
        for _ in 1..loops {
            out.extend_from_slice(&self.buffer[begin..end]);
        }
        out.extend_from_slice(&self.buffer[end..]);
        self.buffer = out;
    }

    pub fn samples(&self) -> &[i8] {
        &self.buffer
    }

    pub fn into_samples(self) -> Vec<i8> {
        self.buffer
    }

    /// Access the raw buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Is the buffer empty?
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Clip an accumulator to the signed 8-bit range.
pub fn saturate(acc: i32) -> i8 {
    if acc > 127 {
        127
    } else if acc < -128 {
        -128
    } else {
        acc as i8
    }
}
