//! Builders for synthetic track data used across module tests.

/// Encode one envelope record with a flat shape at `level`.
pub fn envelope_bytes(form: u8, start: i32, end: i32, level: u16) -> Vec<u8> {
    let mut out = vec![form];
    out.extend_from_slice(&start.to_be_bytes());
    out.extend_from_slice(&end.to_be_bytes());
    out.push(2);
    for duration in [0u16, 65535] {
        out.extend_from_slice(&duration.to_be_bytes());
        out.extend_from_slice(&level.to_be_bytes());
    }
    out
}

/// Encode a tone: one full-volume oscillator on a ~440 Hz `form` wave,
/// no modulation, gating, echo or filter.
pub fn tone_bytes(form: u8, length_ms: u16, start_ms: u16) -> Vec<u8> {
    let mut out = envelope_bytes(form, 440, 440, 0);
    out.extend(envelope_bytes(0, 0, 0, 65535));
    out.extend_from_slice(&[0, 0, 0]); // vibrato, tremolo, gate
    out.extend_from_slice(&[100, 64, 0]); // oscillator: volume, pitch, delay
    out.push(0); // end of oscillators
    out.extend_from_slice(&[0, 0]); // echo
    out.extend_from_slice(&length_ms.to_be_bytes());
    out.extend_from_slice(&start_ms.to_be_bytes());
    out.push(0); // filter
    out
}

/// Encode a track record from per-slot tone records.
pub fn track_bytes(tones: &[Option<Vec<u8>>], loop_begin: u16, loop_end: u16) -> Vec<u8> {
    let mut out = Vec::new();
    for slot in 0..10 {
        match tones.get(slot) {
            Some(Some(tone)) => out.extend_from_slice(tone),
            _ => out.push(0),
        }
    }
    out.extend_from_slice(&loop_begin.to_be_bytes());
    out.extend_from_slice(&loop_end.to_be_bytes());
    out
}
