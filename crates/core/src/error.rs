//! Error types for the ingestion library.

use std::fmt;

/// Errors that can occur while ingesting a native frame stream.
///
/// Variants map to specific failure modes across the pipeline:
///
/// - **Session**: [`SessionOpen`](Self::SessionOpen),
///   [`SessionNotOpen`](Self::SessionNotOpen),
///   [`SessionAlreadyOpen`](Self::SessionAlreadyOpen).
/// - **Input**: [`Io`](Self::Io),
///   [`UnexpectedEndOfInput`](Self::UnexpectedEndOfInput).
/// - **Codec**: [`ParameterSet`](Self::ParameterSet),
///   [`ParameterSetTooLong`](Self::ParameterSetTooLong),
///   [`Sprop`](Self::Sprop).
/// - **Selection**: [`UnsupportedScheme`](Self::UnsupportedScheme),
///   [`UnrecognizedInput`](Self::UnrecognizedInput).
/// - **Extractor lifecycle**:
///   [`ExtractorNotInitialized`](Self::ExtractorNotInitialized),
///   [`ExtractorReleased`](Self::ExtractorReleased).
///
/// "No frame yet" and cancellation are not errors: they surface as
/// [`PollResult::NoFrameYet`](crate::bridge::PollResult::NoFrameYet) and
/// [`ReadOutcome::EndOfStream`](crate::upstream::ReadOutcome::EndOfStream).
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The native layer returned a null handle for this URI.
    #[error("failed to open native session for {uri}")]
    SessionOpen { uri: String },

    /// The operation needs a live session and none is open (or the handle is stale).
    #[error("native session not open")]
    SessionNotOpen,

    /// A session is already live; only one is allowed per bridge.
    #[error("native session already open")]
    SessionAlreadyOpen,

    /// The input ended in the middle of a structure that had to be read whole.
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,

    /// The parameter-set window did not parse to a usable geometry.
    #[error("parameter set parse error: {kind}")]
    ParameterSet { kind: ParameterSetErrorKind },

    /// Parameter set longer than the fixed probe window of the pseudo-container.
    #[error("parameter set is {len} bytes, probe window is {max}")]
    ParameterSetTooLong { len: usize, max: usize },

    /// A `sprop-parameter-sets` record was not valid base64.
    #[error("invalid sprop-parameter-sets: {0}")]
    Sprop(#[from] base64::DecodeError),

    /// No data source is registered for the URI's scheme.
    #[error("no data source registered for scheme: {0}")]
    UnsupportedScheme(String),

    /// None of the registered extractors recognised the input.
    #[error("no extractor recognised the input")]
    UnrecognizedInput,

    /// [`Extractor::read`](crate::extractor::Extractor::read) called before `init`.
    #[error("extractor not initialized")]
    ExtractorNotInitialized,

    /// The extractor was released and cannot be used again.
    #[error("extractor released")]
    ExtractorReleased,
}

/// Specific kind of parameter-set (H.264 SPS) parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSetErrorKind {
    /// NAL unit type is not 7 (sequence parameter set).
    NotSps(u8),
    /// The window ended before the syntax elements needed for geometry.
    Truncated,
    /// An Exp-Golomb code had more than 31 leading zero bits.
    InvalidExpGolomb,
    /// Width or height came out as zero, or cropping exceeded the picture.
    InvalidDimensions,
    /// The SPS syntax was readable but violated a range or consistency rule.
    Malformed,
}

impl fmt::Display for ParameterSetErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSps(nal_type) => write!(f, "NAL unit type {nal_type} is not an SPS"),
            Self::Truncated => write!(f, "truncated parameter set"),
            Self::InvalidExpGolomb => write!(f, "invalid exp-golomb code"),
            Self::InvalidDimensions => write!(f, "invalid picture dimensions"),
            Self::Malformed => write!(f, "malformed sequence parameter set"),
        }
    }
}

impl From<ParameterSetErrorKind> for IngestError {
    fn from(kind: ParameterSetErrorKind) -> Self {
        IngestError::ParameterSet { kind }
    }
}

/// Convenience alias for `Result<T, IngestError>`.
pub type Result<T> = std::result::Result<T, IngestError>;
