//! Track decoding: ten tone slots plus loop markers, and the multi-track
//! stream that indexes them.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::cursor::Cursor;
use crate::dsp::renderer;
use crate::dsp::tone::Tone;
use crate::error::{FormatError, SoundError};
use crate::options::RenderOptions;

/// Tone slots per track.
pub const TONE_SLOTS: usize = 10;
/// Index value that terminates a multi-track stream.
const END_OF_STREAM: u16 = 0xFFFF;
/// Granularity of leading-silence trimming, in milliseconds.
const TRIM_UNIT_MS: u16 = 20;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub tones: [Option<Tone>; TONE_SLOTS],
    /// Loop region start. Stored as read and carried through plain
    /// rendering untouched; looping and trimming read it as milliseconds,
    /// the unit of tone starts, and convert it to output frames.
    pub loop_begin: u16,
    /// Loop region end, in the same unit as `loop_begin`.
    pub loop_end: u16,
}

impl Track {
    /// Read one track record. A non-zero byte opens a tone slot and is
    /// itself the first byte of the tone record.
    pub fn read(input: &mut Cursor<'_>) -> Result<Self, FormatError> {
        let mut track = Track::default();
        for (slot, entry) in track.tones.iter_mut().enumerate() {
            if input.u8()? == 0 {
                continue;
            }
            input.rewind(1);
            let mut tone = Tone::new();
            tone.read(input).map_err(|e| FormatError::InvalidTone {
                slot,
                source: Box::new(e),
            })?;
            *entry = Some(tone);
        }
        track.loop_begin = input.u16()?;
        track.loop_end = input.u16()?;
        Ok(track)
    }

    /// Decode a standalone track record.
    pub fn decode(data: &[u8]) -> Result<Self, FormatError> {
        Track::read(&mut Cursor::new(data))
    }

    /// Present tones, in slot order.
    pub fn tones(&self) -> impl Iterator<Item = &Tone> {
        self.tones.iter().flatten()
    }

    /// End of the last tone in milliseconds; 0 when no tone is present.
    pub fn duration_ms(&self) -> u32 {
        self.tones()
            .map(|t| t.start as u32 + t.length as u32)
            .max()
            .unwrap_or(0)
    }

    fn has_loop(&self) -> bool {
        self.loop_begin < self.loop_end
    }

    /// Move every tone (and a valid loop region) earlier by the silence they
    /// share, in 20 ms units. Returns the shift in those units.
    pub fn trim_leading_silence(&mut self) -> u32 {
        let mut shift = self.tones().map(|t| t.start / TRIM_UNIT_MS).min();
        if self.has_loop() {
            let begin = self.loop_begin / TRIM_UNIT_MS;
            shift = Some(shift.map_or(begin, |s| s.min(begin)));
        }

        let Some(shift) = shift.filter(|&s| s > 0) else {
            return 0;
        };
        let offset = shift * TRIM_UNIT_MS;
        for tone in self.tones.iter_mut().flatten() {
            tone.start -= offset;
        }
        if self.has_loop() {
            self.loop_begin -= offset;
            self.loop_end -= offset;
        }
        log::debug!("trimmed {offset} ms of leading silence");
        shift as u32
    }

    /// Render to signed 8-bit samples, playing the loop region `loops` times.
    pub fn mix(&self, loops: u32) -> Result<Vec<i8>, SoundError> {
        renderer::render_samples(self, loops)
    }

    /// Render to a WAV container.
    pub fn render_wav(&self, options: &RenderOptions) -> Result<Vec<u8>, SoundError> {
        renderer::render_wav(self, options)
    }
}

/// Read a stream of `(u16 index, track)` records up to the `0xFFFF` index.
pub fn load_tracks<R: Read>(mut reader: R) -> Result<BTreeMap<u16, Track>, SoundError> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;

    let mut input = Cursor::new(&data);
    let mut tracks = BTreeMap::new();
    let mut counter = 0;

    loop {
        let index = input.u16()?;
        if index == END_OF_STREAM {
            break;
        }
        let track = Track::read(&mut input).map_err(|e| FormatError::InvalidTrack {
            index,
            counter,
            source: Box::new(e),
        })?;
        tracks.insert(index, track);
        counter += 1;
    }

    log::debug!("loaded {} tracks ({} bytes)", tracks.len(), data.len());
    Ok(tracks)
}

/// Load a single track record from a file.
pub fn load_track(path: impl AsRef<Path>) -> Result<Track, SoundError> {
    let data = std::fs::read(path)?;
    Ok(Track::decode(&data)?)
}
