pub mod cursor;
pub mod dsp;
pub mod error;
pub mod options;
pub mod track;

#[cfg(test)]
mod testutil;

use crate::error::SoundError;
use crate::options::RenderOptions;
use crate::track::Track;
use wasm_bindgen::prelude::*;

pub use crate::track::{load_track, load_tracks};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the sfxtrack-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Decode a single track record.
pub fn decode(data: &[u8]) -> Result<Track, SoundError> {
    Ok(Track::decode(data)?)
}

/// WASM-exposed: decode a track record and render it to WAV bytes.
/// `options_json` may be empty for defaults.
#[wasm_bindgen]
pub fn render_track_wav(data: &[u8], options_json: &str) -> Result<Vec<u8>, JsValue> {
    let options =
        RenderOptions::from_json(options_json).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    let track = decode(data).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    track
        .render_wav(&options)
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: decode a track record into a JS object describing its tones.
#[wasm_bindgen]
pub fn describe_track(data: &[u8]) -> Result<JsValue, JsValue> {
    let track = decode(data).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    serde_wasm_bindgen::to_value(&track).map_err(|e| JsValue::from_str(&format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{tone_bytes, track_bytes};

    #[test]
    fn decode_and_render_end_to_end() {
        let tones = [Some(tone_bytes(2, 100, 0)), Some(tone_bytes(4, 80, 10))];
        let data = track_bytes(&tones, 0, 0);
        let track = decode(&data).unwrap();
        let wav = track.render_wav(&RenderOptions::default()).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(wav.len(), 44 + 2205);
    }

    #[test]
    fn decode_reports_format_errors() {
        let err = decode(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, SoundError::Format(_)));
        assert!(err.to_string().starts_with("Format error: tone[0]:"));
    }
}
