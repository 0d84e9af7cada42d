//! Tone — one voice of a track: up to five detuned oscillators shaped by
//! pitch and volume envelopes, optional vibrato/tremolo, gating, echo and the
//! time-varying IIR filter.

use serde::Serialize;

use crate::cursor::Cursor;
use crate::error::FormatError;

use super::envelope::{Envelope, Stepper};
use super::filter::{Coefficients, Direction, Filter};
use super::oscillator::{Waveform, generate};

/// Oscillators per tone.
pub const MAX_OSCILLATORS: usize = 5;
/// Pitch offset unit: a tenth of a semitone (2^(1/120)).
const PITCH_RATIO: f64 = 1.0057929410678534;
/// Filter coefficients are refreshed every this many samples.
const FILTER_UPDATE_INTERVAL: usize = 128;
/// Tones shorter than this render as silence.
const MIN_LENGTH_MS: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Oscillator {
    /// Percentage of the volume envelope.
    pub volume: i32,
    /// Detune in tenths of a semitone.
    pub pitch: i32,
    /// Start offset in milliseconds.
    pub delay: i32,
}

/// A low-frequency modulator: `rate` sets the speed, `depth` the amount, and
/// `rate.form` the waveform.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Modulation {
    pub rate: Envelope,
    pub depth: Envelope,
}

/// On/off chopping. The gate toggles whenever its counter passes a threshold
/// taken from `silence` while muted and from `sound` while open.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Gate {
    pub silence: Envelope,
    pub sound: Envelope,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Tone {
    pub pitch: Envelope,
    pub volume: Envelope,
    pub vibrato: Option<Modulation>,
    pub tremolo: Option<Modulation>,
    pub gate: Option<Gate>,
    pub oscillators: Vec<Oscillator>,
    /// Echo delay in milliseconds.
    pub delay_time: i32,
    /// Echo feedback in percent.
    pub delay_feedback: i32,
    /// Length in milliseconds.
    pub length: u16,
    /// Start offset within the track in milliseconds.
    pub start: u16,
    pub filter: Filter,
    pub filter_envelope: Envelope,
}

/// Read an optional envelope pair, flagged by a non-zero leading byte.
fn read_pair(input: &mut Cursor<'_>) -> Result<Option<(Envelope, Envelope)>, FormatError> {
    if input.u8()? == 0 {
        return Ok(None);
    }
    input.rewind(1);
    let mut first = Envelope::default();
    first.read(input)?;
    let mut second = Envelope::default();
    second.read(input)?;
    Ok(Some((first, second)))
}

impl Tone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&mut self, input: &mut Cursor<'_>) -> Result<(), FormatError> {
        self.pitch.read(input)?;
        self.volume.read(input)?;
        self.vibrato = read_pair(input)?.map(|(rate, depth)| Modulation { rate, depth });
        self.tremolo = read_pair(input)?.map(|(rate, depth)| Modulation { rate, depth });
        self.gate = read_pair(input)?.map(|(silence, sound)| Gate { silence, sound });

        self.oscillators.clear();
        loop {
            let pos = input.position();
            let volume = input.smart()?;
            if volume == 0 {
                break;
            }
            if self.oscillators.len() == MAX_OSCILLATORS {
                return Err(FormatError::TooManyOscillators { pos });
            }
            let pitch = input.signed_smart()?;
            let delay = input.smart()?;
            self.oscillators.push(Oscillator {
                volume,
                pitch,
                delay,
            });
        }

        self.delay_time = input.smart()?;
        self.delay_feedback = input.smart()?;
        self.length = input.u16()?;
        self.start = input.u16()?;
        self.filter.read(input, &mut self.filter_envelope)?;
        Ok(())
    }

    /// Render `sample_count` samples spanning `length_ms`. Values are
    /// 16-bit range held in `i32`.
    pub fn generate(&self, sample_count: usize, length_ms: u32) -> Vec<i32> {
        let mut samples = vec![0i32; sample_count];
        if length_ms < MIN_LENGTH_MS || sample_count == 0 {
            return samples;
        }

        let samples_per_ms = sample_count as f64 / length_ms as f64;
        self.synthesize(&mut samples, samples_per_ms);
        if let Some(gate) = &self.gate {
            gate.apply(&mut samples);
        }
        self.echo(&mut samples, samples_per_ms);
        if self.filter.is_active() {
            self.apply_filter(&mut samples);
        }

        for s in samples.iter_mut() {
            *s = (*s).clamp(-32768, 32767);
        }
        samples
    }

    fn synthesize(&self, samples: &mut [i32], samples_per_ms: f64) {
        let n = samples.len();
        let mut pitch = self.pitch.stepper();
        let mut volume = self.volume.stepper();
        let mut vibrato = self.vibrato.as_ref().map(|m| Lfo::new(m, samples_per_ms));
        let mut tremolo = self.tremolo.as_ref().map(|m| Lfo::new(m, samples_per_ms));

        let sweep = (self.pitch.end - self.pitch.start) as f64 * 32.768 / samples_per_ms;
        let base = (self.pitch.start as f64 * 32.768 / samples_per_ms) as i32;
        let mut voices: Vec<VoiceState> = self
            .oscillators
            .iter()
            .map(|o| VoiceState {
                delay: (o.delay as f64 * samples_per_ms) as usize,
                volume_step: (o.volume << 14) / 100,
                pitch_step: (sweep * PITCH_RATIO.powi(o.pitch)) as i32,
                pitch_base: base,
                phase: 0,
            })
            .collect();

        for i in 0..n {
            let mut pitch_change = pitch.step(n);
            let mut volume_change = volume.step(n);

            if let Some(lfo) = vibrato.as_mut() {
                pitch_change += lfo.next(n) >> 1;
            }
            if let Some(lfo) = tremolo.as_mut() {
                let scale = (lfo.next(n) >> 1) as i64 + 32768;
                volume_change = ((volume_change as i64 * scale) >> 15) as i32;
            }

            for v in voices.iter_mut() {
                let pos = v.delay + i;
                if pos >= n {
                    continue;
                }
                let amplitude = ((volume_change as i64 * v.volume_step as i64) >> 15) as i32;
                let value = generate(self.pitch.form, v.phase, amplitude);
                samples[pos] = samples[pos].wrapping_add(value);
                let advance = ((pitch_change as i64 * v.pitch_step as i64) >> 16) as i32;
                v.phase = v.phase.wrapping_add(advance).wrapping_add(v.pitch_base);
            }
        }
    }

    fn echo(&self, samples: &mut [i32], samples_per_ms: f64) {
        if self.delay_time <= 0 || self.delay_feedback <= 0 {
            return;
        }
        let delay = (self.delay_time as f64 * samples_per_ms) as usize;
        if delay == 0 {
            return;
        }
        let feedback = self.delay_feedback as i64;
        for i in delay..samples.len() {
            let wet = (samples[i - delay] as i64 * feedback / 100) as i32;
            samples[i] = samples[i].wrapping_add(wet);
        }
    }

    /// Run the direct-form cascade in place. The input is read `order(onset)`
    /// samples ahead of the output so filtered values can overwrite it.
    fn apply_filter(&self, samples: &mut [i32]) {
        let n = samples.len();
        let period = n + 1;
        let mut coef = Coefficients::new();
        let mut envelope = self.filter_envelope.stepper();

        let position = envelope.step(period) as f64 / 65536.0;
        let ahead = self.filter.eval(Direction::Onset, position, &mut coef);
        let behind = self.filter.eval(Direction::Release, position, &mut coef);
        if n < ahead + behind {
            log::debug!("tone too short for filter of order {ahead}+{behind}, skipping");
            return;
        }

        let body = n - ahead;
        let mut position = position;
        for i in 0..body {
            if i > 0 && i % FILTER_UPDATE_INTERVAL == 0 {
                self.filter.eval(Direction::Onset, position, &mut coef);
                self.filter.eval(Direction::Release, position, &mut coef);
            }
            let mut y = (samples[i + ahead] as i64 * coef.unity16()) >> 16;
            for (k, &c) in coef.fixed(Direction::Onset).iter().enumerate() {
                y += (samples[i + ahead - 1 - k] as i64 * c) >> 16;
            }
            for (k, &c) in coef.fixed(Direction::Release).iter().enumerate().take(i) {
                y -= (samples[i - 1 - k] as i64 * c) >> 16;
            }
            samples[i] = y as i32;
            position = envelope.step(period) as f64 / 65536.0;
        }

        // Tail: the input runs out, so only the taps still inside it apply.
        for i in body..n {
            let mut y = 0i64;
            for (k, &c) in coef.fixed(Direction::Onset).iter().enumerate().skip(i + ahead - n) {
                y += (samples[i + ahead - 1 - k] as i64 * c) >> 16;
            }
            for (k, &c) in coef.fixed(Direction::Release).iter().enumerate() {
                y -= (samples[i - 1 - k] as i64 * c) >> 16;
            }
            samples[i] = y as i32;
        }
    }
}

impl Gate {
    fn apply(&self, samples: &mut [i32]) {
        let n = samples.len();
        let mut silence = self.silence.stepper();
        let mut sound = self.sound.stepper();
        let (start, end) = (self.silence.start as i64, self.silence.end as i64);
        let mut counter = 0i64;
        let mut muted = true;

        for s in samples.iter_mut() {
            let closed = silence.step(n) as i64;
            let open = sound.step(n) as i64;
            let level = if muted { closed } else { open };
            let threshold = start + (((end - start) * level) >> 8);
            counter += 256;
            if counter >= threshold {
                counter = 0;
                muted = !muted;
            }
            if muted {
                *s = 0;
            }
        }
    }
}

struct VoiceState {
    delay: usize,
    volume_step: i32,
    pitch_step: i32,
    pitch_base: i32,
    phase: i32,
}

/// Running state of a [`Modulation`].
struct Lfo<'a> {
    rate: Stepper<'a>,
    depth: Stepper<'a>,
    form: Waveform,
    step: i32,
    base: i32,
    phase: i32,
}

impl<'a> Lfo<'a> {
    fn new(m: &'a Modulation, samples_per_ms: f64) -> Self {
        Lfo {
            rate: m.rate.stepper(),
            depth: m.depth.stepper(),
            form: m.rate.form,
            step: ((m.rate.end - m.rate.start) as f64 * 32.768 / samples_per_ms) as i32,
            base: (m.rate.start as f64 * 32.768 / samples_per_ms) as i32,
            phase: 0,
        }
    }

    fn next(&mut self, period: usize) -> i32 {
        let rate = self.rate.step(period);
        let depth = self.depth.step(period);
        let value = generate(self.form, self.phase, depth);
        let advance = ((rate as i64 * self.step as i64) >> 16) as i32;
        self.phase = self.phase.wrapping_add(advance).wrapping_add(self.base);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(form: Waveform, start: i32, end: i32, level: u16) -> Envelope {
        Envelope {
            form,
            start,
            end,
            durations: vec![0, 65535],
            peaks: vec![level, level],
        }
    }

    /// A square tone at roughly 440 Hz, full volume, one oscillator.
    fn square_tone(length: u16) -> Tone {
        // phase advance per sample = start * 32.768 / samples_per_ms;
        // 440 Hz at 22.05 samples/ms needs 32768 * 440 / 22050 ≈ 654 steps.
        Tone {
            pitch: flat(Waveform::Square, 440, 440, 0),
            volume: flat(Waveform::Off, 0, 0, 65535),
            oscillators: vec![Oscillator {
                volume: 100,
                pitch: 0,
                delay: 0,
            }],
            length,
            ..Tone::default()
        }
    }

    #[test]
    fn short_tone_is_silent() {
        let tone = square_tone(5);
        let out = tone.generate(110, 5);
        assert_eq!(out.len(), 110);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn square_tone_has_two_levels() {
        let tone = square_tone(100);
        let out = tone.generate(2205, 100);
        let peak = *out.iter().max().unwrap();
        assert!(peak > 16000, "Square should be loud, peak {peak}");
        assert!(out.iter().all(|&s| s == peak || s == -peak || s == 0));
        assert!(out.contains(&-peak));
    }

    #[test]
    fn output_is_clamped_to_16_bits() {
        let mut tone = square_tone(100);
        tone.oscillators = vec![
            Oscillator {
                volume: 400,
                pitch: 0,
                delay: 0,
            };
            MAX_OSCILLATORS
        ];
        let out = tone.generate(2205, 100);
        assert!(out.iter().all(|&s| (-32768..=32767).contains(&s)));
        assert!(out.contains(&32767));
    }

    #[test]
    fn oscillator_delay_leaves_leading_silence() {
        let mut tone = square_tone(100);
        tone.oscillators[0].delay = 50;
        let out = tone.generate(2205, 100);
        assert!(out[..1102].iter().all(|&s| s == 0));
        assert!(out[1103..].iter().any(|&s| s != 0));
    }

    #[test]
    fn gate_mutes_start() {
        let mut tone = square_tone(100);
        tone.gate = Some(Gate {
            // Stay muted for 100 samples, then open for 100.
            silence: flat(Waveform::Off, 25600, 25600, 0),
            sound: flat(Waveform::Off, 0, 0, 0),
        });
        let out = tone.generate(2205, 100);
        assert!(out[..99].iter().all(|&s| s == 0));
        assert!(out[100..200].iter().any(|&s| s != 0));
    }

    #[test]
    fn echo_adds_delayed_copy() {
        let mut dry = square_tone(100);
        dry.oscillators[0].volume = 10;
        let mut wet = dry.clone();
        wet.delay_time = 10;
        wet.delay_feedback = 50;
        let a = dry.generate(2205, 100);
        let b = wet.generate(2205, 100);
        assert_eq!(a[..220], b[..220]);
        assert_ne!(a[221..], b[221..]);
    }

    #[test]
    fn filtered_tone_stays_finite_and_changes_output() {
        let mut tone = square_tone(100);
        tone.filter = Filter {
            pairs: [2, 2],
            unities: [0, 0],
            frequencies: [[[40000, 45000, 0, 0]; 2]; 2],
            ranges: [[[20000, 15000, 0, 0]; 2]; 2],
        };
        let plain = square_tone(100).generate(2205, 100);
        let out = tone.generate(2205, 100);
        assert_eq!(out.len(), 2205);
        assert_ne!(plain, out);
        assert!(out.iter().all(|&s| (-32768..=32767).contains(&s)));
    }

    /// One onset and one release pair whose parameters and makeup gain
    /// move over the default filter envelope ramp.
    fn migrating_filter_tone() -> Tone {
        Tone {
            filter: Filter {
                pairs: [1, 1],
                unities: [0, 6000],
                frequencies: [
                    [[20000, 0, 0, 0], [50000, 0, 0, 0]],
                    [[30000, 0, 0, 0], [10000, 0, 0, 0]],
                ],
                ranges: [
                    [[10000, 0, 0, 0], [30000, 0, 0, 0]],
                    [[20000, 0, 0, 0], [5000, 0, 0, 0]],
                ],
            },
            ..Tone::default()
        }
    }

    /// Out-of-place direct form: onset taps over the input, release taps
    /// over earlier outputs. With `refresh` the coefficients are evaluated
    /// again every update interval, otherwise only at the first sample.
    fn reference_filter(tone: &Tone, input: &[i32], refresh: bool) -> Vec<i32> {
        let n = input.len();
        let period = n + 1;
        let mut envelope = tone.filter_envelope.stepper();
        let mut coef = Coefficients::new();
        let mut out = vec![0i32; n];
        let mut position = envelope.step(period) as f64 / 65536.0;
        let ahead = tone.filter.pairs[0] * 2;

        for i in 0..n {
            let in_body = i + ahead < n;
            if i == 0 || (refresh && in_body && i % FILTER_UPDATE_INTERVAL == 0) {
                tone.filter.eval(Direction::Onset, position, &mut coef);
                tone.filter.eval(Direction::Release, position, &mut coef);
            }
            let mut y = 0i64;
            if in_body {
                y += (input[i + ahead] as i64 * coef.unity16()) >> 16;
            }
            for (k, &c) in coef.fixed(Direction::Onset).iter().enumerate() {
                if let Some(&x) = input.get(i + ahead - 1 - k) {
                    y += (x as i64 * c) >> 16;
                }
            }
            for (k, &c) in coef.fixed(Direction::Release).iter().enumerate().take(i) {
                y -= (out[i - 1 - k] as i64 * c) >> 16;
            }
            out[i] = y as i32;
            if in_body {
                position = envelope.step(period) as f64 / 65536.0;
            }
        }
        out
    }

    fn filter_input(n: usize) -> Vec<i32> {
        let mut input: Vec<i32> = (0..n).map(|i| ((i * 7919) % 2001) as i32 * 8 - 8000).collect();
        input[0] = 30000;
        input
    }

    #[test]
    fn time_varying_filter_matches_direct_form() {
        let tone = migrating_filter_tone();
        let input = filter_input(300);
        let mut samples = input.clone();
        tone.apply_filter(&mut samples);
        assert_eq!(samples, reference_filter(&tone, &input, true));
        assert!(samples.iter().any(|&s| s != 0));
    }

    #[test]
    fn filter_coefficients_refresh_every_interval() {
        let tone = migrating_filter_tone();
        let input = filter_input(300);
        let mut samples = input.clone();
        tone.apply_filter(&mut samples);
        let frozen = reference_filter(&tone, &input, false);
        let split = FILTER_UPDATE_INTERVAL;
        assert_eq!(samples[..split], frozen[..split]);
        assert_ne!(samples[split..], frozen[split..]);
    }

    #[test]
    fn filter_skipped_when_tone_too_short() {
        let mut tone = square_tone(10);
        tone.filter.pairs = [4, 4];
        let out = tone.generate(7, 10);
        assert_eq!(out, square_tone(10).generate(7, 10));
    }

    #[test]
    fn reads_minimal_tone() {
        let data = [
            1, 0, 0, 0, 0, 0, 0, 0, 0, 0, // pitch: square, no shape
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // volume
            0, 0, 0, // no vibrato, tremolo, gate
            100, 64, 0, // oscillator
            0, // terminator
            0, 0, // delay time, feedback
            0, 100, 0, 20, // length, start
            0, // filter
        ];
        let mut c = Cursor::new(&data);
        let mut tone = Tone::new();
        tone.read(&mut c).unwrap();
        assert_eq!(c.remaining(), 0);
        assert_eq!(tone.pitch.form, Waveform::Square);
        assert_eq!(tone.oscillators, vec![Oscillator { volume: 100, pitch: 0, delay: 0 }]);
        assert_eq!(tone.length, 100);
        assert_eq!(tone.start, 20);
        assert!(tone.vibrato.is_none() && tone.gate.is_none());
        assert!(!tone.filter.is_active());
    }

    #[test]
    fn sixth_oscillator_is_rejected() {
        let mut data = vec![0u8; 23];
        data[0] = 1;
        for _ in 0..6 {
            data.extend_from_slice(&[10, 64, 0]);
        }
        data.push(0);
        let mut tone = Tone::new();
        assert!(matches!(
            tone.read(&mut Cursor::new(&data)),
            Err(FormatError::TooManyOscillators { pos: 38 })
        ));
    }
}
