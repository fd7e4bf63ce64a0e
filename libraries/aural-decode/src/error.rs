/// Decoding-specific errors
use thiserror::Error;

/// Result type alias using `DecodeError`
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors raised while opening, demuxing, seeking or decoding a file
///
/// All of these are local and recoverable: they describe one file or one
/// operation, never the state of the process.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The container could not be opened or probed
    #[error("Unable to open '{path}': {reason}")]
    OpenFailed { path: String, reason: String },

    /// The demuxer could not read stream information
    #[error("Unable to find stream info for '{0}'")]
    NoStreamInfo(String),

    /// The file has no audio stream
    #[error("No audio stream found in '{0}'")]
    NoAudioStream(String),

    /// Seek target lies beyond the end of the file or stream
    #[error("Seek target {target:.3}s is out of range")]
    SeekOutOfRange { target: f64 },

    /// Duration is unknown, so a frame-based seek cannot be computed
    #[error("Cannot seek: duration of '{0}' is unknown")]
    InvalidDurationForSeek(String),

    /// Operation attempted on a context that can no longer serve it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// No more packets in the stream
    #[error("End of stream")]
    EndOfStream,

    /// Decoder or demuxer failure
    #[error("Decode error: {0}")]
    Decode(String),

    /// Destination buffer cannot hold the frame
    #[error("Invalid audio buffer: {0}")]
    InvalidBuffer(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Create an open failure for the given path
    pub fn open_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OpenFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error marks the end of the packet stream
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

/// Map a symphonia error, folding unexpected EOF into `EndOfStream`
impl From<symphonia::core::errors::Error> for DecodeError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error;

        match err {
            Error::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Self::EndOfStream,
            Error::IoError(e) => Self::Io(e),
            other => Self::Decode(other.to_string()),
        }
    }
}
