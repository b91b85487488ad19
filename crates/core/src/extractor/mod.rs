//! Extractor contracts: turning a byte stream into tracks and samples.
//!
//! An [`Extractor`] pulls bytes through an [`ExtractorInput`] (which adds
//! peeking on top of a [`DataSource`](crate::upstream::DataSource)) and
//! pushes what it finds into an [`ExtractorOutput`]:
//!
//! ```text
//! sniff(input)          peek only, true if the format is recognised
//! init(output)          declare tracks and the seek map
//! read(input, output)   repeatedly, until ExtractorStatus::EndOfInput
//! release()
//! ```

pub mod input;
pub mod output;
pub mod pseudo;
pub mod registry;

use crate::error::Result;
use crate::media::SpsData;
use crate::upstream::ReadOutcome;

pub use input::DefaultExtractorInput;
pub use output::{RecordedTrack, RecordingOutput};
pub use pseudo::ContainerExtractor;
pub use registry::{ExtractorFactory, ExtractorRegistry};

/// MIME type of an H.264 elementary stream.
pub const MIME_VIDEO_H264: &str = "video/avc";

/// Byte input with a peek window over the unread data.
///
/// Reads consume bytes; peeks look ahead from a separate peek position
/// without consuming. [`reset_peek_position`](Self::reset_peek_position)
/// moves the peek position back to the read position.
pub trait ExtractorInput {
    /// Consume up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome>;

    /// Consume exactly `buf.len()` bytes.
    ///
    /// If the input ends first, returns `Ok(false)` when
    /// `allow_end_of_input` is set and
    /// [`UnexpectedEndOfInput`](crate::error::IngestError::UnexpectedEndOfInput)
    /// otherwise.
    fn read_fully(&mut self, buf: &mut [u8], allow_end_of_input: bool) -> Result<bool>;

    /// Consume and discard exactly `len` bytes.
    fn skip_fully(&mut self, len: usize) -> Result<()>;

    /// Peek up to `buf.len()` bytes and advance the peek position.
    fn peek(&mut self, buf: &mut [u8]) -> Result<ReadOutcome>;

    /// Peek exactly `buf.len()` bytes. End of input as in
    /// [`read_fully`](Self::read_fully).
    fn peek_fully(&mut self, buf: &mut [u8], allow_end_of_input: bool) -> Result<bool>;

    fn reset_peek_position(&mut self);

    /// Bytes consumed so far.
    fn position(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
}

/// Description of a track's samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Format {
    pub sample_mime_type: &'static str,
    /// RFC 6381 codec string, e.g. `avc1.42001E`.
    pub codecs: Option<String>,
    pub width: u32,
    pub height: u32,
    pub pixel_width_height_ratio: f32,
}

impl Format {
    /// H.264 video format described by a sequence parameter set.
    pub fn h264(sps: &SpsData) -> Self {
        Self {
            sample_mime_type: MIME_VIDEO_H264,
            codecs: Some(sps.codec_string()),
            width: sps.width,
            height: sps.height,
            pixel_width_height_ratio: sps.pixel_width_height_ratio,
        }
    }
}

/// Describes the sample whose bytes were just passed to
/// [`TrackOutput::sample_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleMetadata {
    pub time_us: u64,
    pub size: usize,
    /// Bytes written after this sample's data that belong to the next one.
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMap {
    Unseekable,
}

/// Receives the samples of one track.
pub trait TrackOutput {
    fn format(&mut self, format: Format);
    fn sample_data(&mut self, data: &[u8]);
    fn sample_metadata(&mut self, metadata: SampleMetadata);
}

/// Receives the tracks an extractor declares.
pub trait ExtractorOutput {
    /// Track `id`, created on first use.
    fn track(&mut self, id: u32, kind: TrackKind) -> &mut dyn TrackOutput;
    /// No more tracks will be declared.
    fn end_tracks(&mut self);
    fn seek_map(&mut self, seek_map: SeekMap);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorStatus {
    Continue,
    EndOfInput,
}

/// A container parser.
pub trait Extractor: Send {
    /// Whether the input looks like this extractor's format.
    ///
    /// Only peeks. The caller resets the peek position afterwards.
    fn sniff(&self, input: &mut dyn ExtractorInput) -> Result<bool>;

    fn init(&mut self, output: &mut dyn ExtractorOutput) -> Result<()>;

    fn read(
        &mut self,
        input: &mut dyn ExtractorInput,
        output: &mut dyn ExtractorOutput,
    ) -> Result<ExtractorStatus>;

    fn seek(&mut self, position: u64, time_us: u64);

    fn release(&mut self);
}
