use std::fmt;
use std::io;

#[derive(Debug)]
pub enum SoundError {
    Format(FormatError),
    /// Every tone slot of the track is absent.
    EmptyTrack,
    /// Looping would grow the output past the renderable limit.
    OutputTooLong {
        loops: u32,
        limit: usize,
    },
    Io(io::Error),
    Options(serde_json::Error),
}

#[derive(Debug)]
pub enum FormatError {
    UnexpectedEof {
        pos: usize,
        wanted: usize,
    },
    InvalidPairCount {
        onset: u8,
        release: u8,
    },
    TooManyOscillators {
        pos: usize,
    },
    InvalidTone {
        slot: usize,
        source: Box<FormatError>,
    },
    InvalidTrack {
        index: u16,
        counter: usize,
        source: Box<FormatError>,
    },
}

impl fmt::Display for SoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundError::Format(e) => write!(f, "Format error: {e}"),
            SoundError::EmptyTrack => write!(f, "Empty sound: no tone slot is present"),
            SoundError::OutputTooLong { loops, limit } => {
                write!(f, "Output too long: {loops} loops exceed {limit} samples")
            }
            SoundError::Io(e) => write!(f, "I/O error: {e}"),
            SoundError::Options(e) => write!(f, "Invalid render options: {e}"),
        }
    }
}

impl std::error::Error for SoundError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SoundError::Format(e) => Some(e),
            SoundError::EmptyTrack | SoundError::OutputTooLong { .. } => None,
            SoundError::Io(e) => Some(e),
            SoundError::Options(e) => Some(e),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::UnexpectedEof { pos, wanted } => {
                write!(f, "Unexpected end of data at pos {pos} (wanted {wanted} bytes)")
            }
            FormatError::InvalidPairCount { onset, release } => {
                write!(f, "IIR filter invalid pair interval [{onset}, {release}]")
            }
            FormatError::TooManyOscillators { pos } => {
                write!(f, "Too many oscillators in tone at pos {pos}")
            }
            FormatError::InvalidTone { slot, source } => write!(f, "tone[{slot}]: {source}"),
            FormatError::InvalidTrack {
                index,
                counter,
                source,
            } => write!(f, "sound[{index}] (counter={counter}): {source}"),
        }
    }
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormatError::InvalidTone { source, .. } | FormatError::InvalidTrack { source, .. } => {
                Some(source.as_ref())
            }
            _ => None,
        }
    }
}

impl From<FormatError> for SoundError {
    fn from(e: FormatError) -> Self {
        SoundError::Format(e)
    }
}

impl From<io::Error> for SoundError {
    fn from(e: io::Error) -> Self {
        SoundError::Io(e)
    }
}

impl From<serde_json::Error> for SoundError {
    fn from(e: serde_json::Error) -> Self {
        SoundError::Options(e)
    }
}
