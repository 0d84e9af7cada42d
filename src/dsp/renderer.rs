//! WAV renderer — mixes a Track's tones and wraps them in an 8-bit mono WAV.

use crate::error::SoundError;
use crate::options::RenderOptions;
use crate::track::Track;

use super::SAMPLE_RATE;
use super::mixer::Mixer;

/// Longest output `render_samples` will build: one hour at the output rate.
pub const MAX_OUTPUT_SAMPLES: usize = SAMPLE_RATE as usize * 60 * 60;

/// Milliseconds to output frames, truncating.
fn frames(ms: u32) -> usize {
    ms as usize * SAMPLE_RATE as usize / 1000
}

/// Mix every present tone into one signed 8-bit buffer. With `loops > 1`
/// and a loop region inside the buffer, that region is repeated.
pub fn render_samples(track: &Track, loops: u32) -> Result<Vec<i8>, SoundError> {
    let duration = track.duration_ms();
    if duration == 0 {
        return Err(SoundError::EmptyTrack);
    }

    let mut mixer = Mixer::new();
    mixer.clear(frames(duration));

    for tone in track.tones() {
        let count = frames(tone.length as u32);
        let offset = frames(tone.start as u32);
        let samples = tone.generate(count, tone.length as u32);
        mixer.add(offset, &samples);
    }

    if loops > 1 {
        let begin = frames(track.loop_begin as u32);
        let end = frames(track.loop_end as u32);
        if begin < end && end <= mixer.len() {
            match mixer.repeated_len(begin, end, loops) {
                Some(total) if total <= MAX_OUTPUT_SAMPLES => mixer.repeat(begin, end, loops),
                _ => {
                    return Err(SoundError::OutputTooLong {
                        loops,
                        limit: MAX_OUTPUT_SAMPLES,
                    });
                }
            }
        } else {
            log::warn!(
                "loop region {}..{} ms is outside the track, playing once",
                track.loop_begin,
                track.loop_end
            );
        }
    }

    log::debug!("rendered {} ms into {} samples", duration, mixer.len());
    Ok(mixer.into_samples())
}

/// Render a Track to a WAV file as bytes (8-bit mono PCM), applying `options`.
pub fn render_wav(track: &Track, options: &RenderOptions) -> Result<Vec<u8>, SoundError> {
    let samples = if options.trim_leading_silence {
        let mut trimmed = track.clone();
        trimmed.trim_leading_silence();
        render_samples(&trimmed, options.loops)?
    } else {
        render_samples(track, options.loops)?
    };
    Ok(encode_wav(&samples))
}

/// Encode signed 8-bit samples into a 44-byte-header WAV buffer.
///
/// Samples are stored offset by -127 rather than the usual +128, as existing
/// players of this format expect.
pub fn encode_wav(samples: &[i8]) -> Vec<u8> {
    let channels: u16 = 1;
    let bits_per_sample: u16 = 8;
    let byte_rate = SAMPLE_RATE * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = samples.len() as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + samples.len());

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    buf.extend(samples.iter().map(|&s| (s as u8).wrapping_sub(127)));

    buf
}
