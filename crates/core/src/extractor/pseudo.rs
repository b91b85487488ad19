//! Extractor for the `MAGIC ++ parameter set ++ frame` pseudo-container.
//!
//! There is no demuxing to do: once the parameter-set window has yielded a
//! track format, every byte that is not a container header is forwarded to
//! track 0 as sample data.

use super::{
    Extractor, ExtractorInput, ExtractorOutput, ExtractorStatus, Format, SampleMetadata, SeekMap,
    TrackKind,
};
use crate::config::IngestConfig;
use crate::container::{self, MAGIC, PARAMETER_SET_PROBE_LEN};
use crate::error::{IngestError, Result};
use crate::media::parse_sps;
use crate::upstream::ReadOutcome;

/// The single track this extractor declares.
pub const TRACK_ID: u32 = 0;

/// Lifecycle of a [`ContainerExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorState {
    Uninitialized,
    /// Initialized, no format emitted yet.
    Sniffing,
    FormatEmitted,
    /// At least one sample followed the format.
    Streaming,
    Released,
}

pub struct ContainerExtractor {
    state: ExtractorState,
    format: Option<Format>,
    scratch: Vec<u8>,
}

impl ContainerExtractor {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            state: ExtractorState::Uninitialized,
            format: None,
            scratch: vec![0; config.sample_read_size.max(MAGIC.len())],
        }
    }

    pub fn state(&self) -> ExtractorState {
        self.state
    }

    /// The emitted track format, once one has been emitted.
    pub fn format(&self) -> Option<&Format> {
        self.format.as_ref()
    }

    /// Parse a probe window and emit the format if none was emitted yet.
    fn probe_format(&mut self, window: &[u8], output: &mut dyn ExtractorOutput) {
        let sps = match parse_sps(window) {
            Ok(sps) => sps,
            Err(kind) => {
                tracing::debug!(%kind, "parameter-set window skipped");
                return;
            }
        };
        if self.format.is_some() {
            return;
        }

        let format = Format::h264(&sps);
        tracing::debug!(
            width = format.width,
            height = format.height,
            pixel_width_height_ratio = format.pixel_width_height_ratio,
            codecs = format.codecs.as_deref().unwrap_or_default(),
            "track format emitted"
        );
        output.track(TRACK_ID, TrackKind::Video).format(format.clone());
        self.format = Some(format);
        self.state = ExtractorState::FormatEmitted;
    }

    /// Forward the bytes up to the next container header as one sample.
    fn forward_sample(
        &mut self,
        input: &mut dyn ExtractorInput,
        output: &mut dyn ExtractorOutput,
    ) -> Result<ExtractorStatus> {
        input.reset_peek_position();
        let available = match input.peek(&mut self.scratch)? {
            ReadOutcome::Bytes(n) => n,
            ReadOutcome::EndOfStream => return Ok(ExtractorStatus::EndOfInput),
        };

        let len = container::sample_len(&self.scratch[..available]);
        if len == 0 {
            return Ok(ExtractorStatus::Continue);
        }

        let track = output.track(TRACK_ID, TrackKind::Video);
        track.sample_data(&self.scratch[..len]);
        track.sample_metadata(SampleMetadata {
            time_us: 0,
            size: len,
            offset: 0,
        });
        input.skip_fully(len)?;
        tracing::trace!(len, "sample forwarded");

        if self.state == ExtractorState::FormatEmitted {
            self.state = ExtractorState::Streaming;
        }
        Ok(ExtractorStatus::Continue)
    }

    /// Fewer than `MAGIC.len()` bytes remain: they cannot start a container.
    fn forward_tail(
        &mut self,
        input: &mut dyn ExtractorInput,
        output: &mut dyn ExtractorOutput,
    ) -> Result<ExtractorStatus> {
        input.reset_peek_position();
        if let ReadOutcome::Bytes(len @ 1..) = input.read(&mut self.scratch)? {
            let track = output.track(TRACK_ID, TrackKind::Video);
            track.sample_data(&self.scratch[..len]);
            track.sample_metadata(SampleMetadata {
                time_us: 0,
                size: len,
                offset: 0,
            });
        }
        Ok(ExtractorStatus::EndOfInput)
    }

    fn ensure_readable(&self) -> Result<()> {
        match self.state {
            ExtractorState::Uninitialized => Err(IngestError::ExtractorNotInitialized),
            ExtractorState::Released => Err(IngestError::ExtractorReleased),
            _ => Ok(()),
        }
    }
}

impl Extractor for ContainerExtractor {
    fn sniff(&self, input: &mut dyn ExtractorInput) -> Result<bool> {
        let mut marker = [0u8; MAGIC.len()];
        if !input.peek_fully(&mut marker, true)? || marker != MAGIC {
            return Ok(false);
        }

        let mut window = [0u8; PARAMETER_SET_PROBE_LEN];
        if !input.peek_fully(&mut window, true)? {
            return Ok(false);
        }

        match parse_sps(&window) {
            Ok(sps) => {
                tracing::debug!(width = sps.width, height = sps.height, "pseudo-container sniffed");
                Ok(sps.width > 0 && sps.height > 0)
            }
            Err(kind) => {
                tracing::debug!(%kind, "pseudo-container marker without usable parameter set");
                Ok(false)
            }
        }
    }

    fn init(&mut self, output: &mut dyn ExtractorOutput) -> Result<()> {
        if self.state == ExtractorState::Released {
            return Err(IngestError::ExtractorReleased);
        }
        output.track(TRACK_ID, TrackKind::Video);
        output.end_tracks();
        output.seek_map(SeekMap::Unseekable);
        if self.state == ExtractorState::Uninitialized {
            self.state = ExtractorState::Sniffing;
        }
        Ok(())
    }

    fn read(
        &mut self,
        input: &mut dyn ExtractorInput,
        output: &mut dyn ExtractorOutput,
    ) -> Result<ExtractorStatus> {
        self.ensure_readable()?;

        input.reset_peek_position();
        let mut marker = [0u8; MAGIC.len()];
        if !input.peek_fully(&mut marker, true)? {
            return self.forward_tail(input, output);
        }

        if marker == MAGIC {
            input.skip_fully(MAGIC.len())?;
            let mut window = [0u8; PARAMETER_SET_PROBE_LEN];
            if !input.read_fully(&mut window, true)? {
                return Ok(ExtractorStatus::EndOfInput);
            }
            self.probe_format(&window, output);
        }

        self.forward_sample(input, output)
    }

    fn seek(&mut self, position: u64, time_us: u64) {
        tracing::trace!(position, time_us, "seek ignored on live input");
    }

    fn release(&mut self) {
        self.state = ExtractorState::Released;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{DefaultExtractorInput, RecordingOutput};
    use crate::media::sps::tests::{SPS_640X480, baseline_sps};
    use crate::upstream::{ByteArraySource, DataSource, DataSpec};

    fn container(frame: &[u8]) -> Vec<u8> {
        let parameter_set = container::conform_parameter_set(&SPS_640X480).unwrap();
        [&MAGIC[..], &parameter_set, frame].concat()
    }

    fn opened(data: Vec<u8>, chunk: usize) -> ByteArraySource {
        let mut source = ByteArraySource::new(data).with_max_chunk(chunk);
        source.open(&DataSpec::new("memory://test")).unwrap();
        source
    }

    fn run(data: Vec<u8>, chunk: usize) -> (ContainerExtractor, RecordingOutput) {
        run_with(data, chunk, &IngestConfig::default())
    }

    fn run_with(
        data: Vec<u8>,
        chunk: usize,
        config: &IngestConfig,
    ) -> (ContainerExtractor, RecordingOutput) {
        let mut source = opened(data, chunk);
        let mut input = DefaultExtractorInput::new(&mut source);
        let mut extractor = ContainerExtractor::new(config);
        let mut output = RecordingOutput::new();
        extractor.init(&mut output).unwrap();
        while extractor.read(&mut input, &mut output).unwrap() == ExtractorStatus::Continue {}
        (extractor, output)
    }

    #[test]
    fn sniff_accepts_conforming_container() {
        let mut source = opened(container(&[1, 2, 3]), 5);
        let mut input = DefaultExtractorInput::new(&mut source);
        let extractor = ContainerExtractor::new(&IngestConfig::default());
        assert!(extractor.sniff(&mut input).unwrap());
        assert_eq!(input.position(), 0);
        assert_eq!(extractor.state(), ExtractorState::Uninitialized);
    }

    #[test]
    fn sniff_rejects_any_corrupted_marker_byte() {
        for i in 0..MAGIC.len() {
            let mut data = container(&[1, 2, 3]);
            data[i] ^= 0x01;
            let mut source = opened(data, 64);
            let mut input = DefaultExtractorInput::new(&mut source);
            let extractor = ContainerExtractor::new(&IngestConfig::default());
            assert!(!extractor.sniff(&mut input).unwrap(), "byte {i}");
        }
    }

    #[test]
    fn sniff_rejects_short_and_non_sps_input() {
        let extractor = ContainerExtractor::new(&IngestConfig::default());

        let mut short = opened(MAGIC.to_vec(), 64);
        assert!(!extractor.sniff(&mut DefaultExtractorInput::new(&mut short)).unwrap());

        let mut pps = [0u8; PARAMETER_SET_PROBE_LEN];
        pps[0] = 0x68;
        let mut wrong = opened([&MAGIC[..], &pps].concat(), 64);
        assert!(!extractor.sniff(&mut DefaultExtractorInput::new(&mut wrong)).unwrap());
    }

    #[test]
    fn init_declares_one_unseekable_video_track() {
        let mut extractor = ContainerExtractor::new(&IngestConfig::default());
        let mut output = RecordingOutput::new();
        extractor.init(&mut output).unwrap();

        assert_eq!(extractor.state(), ExtractorState::Sniffing);
        assert_eq!(output.track_count(), 1);
        assert_eq!(output.recorded_track(TRACK_ID).unwrap().kind, TrackKind::Video);
        assert!(output.tracks_ended());
        assert_eq!(output.recorded_seek_map(), Some(SeekMap::Unseekable));
    }

    #[test]
    fn lifecycle_errors() {
        let mut source = opened(container(&[1]), 64);
        let mut input = DefaultExtractorInput::new(&mut source);
        let mut output = RecordingOutput::new();
        let mut extractor = ContainerExtractor::new(&IngestConfig::default());

        assert!(matches!(
            extractor.read(&mut input, &mut output),
            Err(IngestError::ExtractorNotInitialized)
        ));
        extractor.init(&mut output).unwrap();
        extractor.release();
        assert!(matches!(
            extractor.read(&mut input, &mut output),
            Err(IngestError::ExtractorReleased)
        ));
        assert!(matches!(
            extractor.init(&mut output),
            Err(IngestError::ExtractorReleased)
        ));
    }

    #[test]
    fn emits_format_once_and_forwards_frames() {
        let data = [container(&[1, 2, 3]), container(&[4, 5]), container(&[6])].concat();
        let (extractor, output) = run(data, 1000);

        let track = output.recorded_track(TRACK_ID).unwrap();
        assert_eq!(track.formats.len(), 1);
        let format = &track.formats[0];
        assert_eq!(format.sample_mime_type, "video/avc");
        assert_eq!((format.width, format.height), (640, 480));
        assert_eq!(format.pixel_width_height_ratio, 1.0);

        assert_eq!(track.data, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(track.sample_bytes(), vec![&[1, 2, 3][..], &[4, 5], &[6]]);
        assert!(track.samples.iter().all(|s| s.time_us == 0));
        assert_eq!(extractor.state(), ExtractorState::Streaming);
        assert_eq!(extractor.format(), Some(format));
    }

    #[test]
    fn later_parameter_sets_do_not_replace_the_format() {
        let qvga = container::conform_parameter_set(&baseline_sps(19, 14)).unwrap();
        let data = [
            container(&[1, 2, 3]),
            [&MAGIC[..], &qvga, &[4, 5]].concat(),
            container(&[6]),
        ]
        .concat();
        let (extractor, output) = run(data, 1000);

        let track = output.recorded_track(TRACK_ID).unwrap();
        assert_eq!(track.formats.len(), 1);
        assert_eq!((track.formats[0].width, track.formats[0].height), (640, 480));
        assert_eq!(track.data, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(extractor.format().map(|f| (f.width, f.height)), Some((640, 480)));
    }

    #[test]
    fn small_read_size_splits_frames_into_samples() {
        let first: Vec<u8> = (1..=12).collect();
        let data = [container(&first), container(&[13, 14])].concat();
        let config = IngestConfig::default().with_sample_read_size(5);
        let (_, output) = run_with(data, 1000, &config);

        let track = output.recorded_track(TRACK_ID).unwrap();
        assert_eq!(track.formats.len(), 1);
        assert_eq!(track.data, (1..=14).collect::<Vec<u8>>());
        assert!(track.samples.iter().all(|s| (1..=5).contains(&s.size)));

        // At least three samples for the first frame, none crossing into the second.
        let ends: Vec<usize> = track
            .samples
            .iter()
            .scan(0, |end, s| {
                *end += s.size;
                Some(*end)
            })
            .collect();
        let first_frame_samples = ends.iter().position(|&end| end == first.len()).unwrap() + 1;
        assert!(first_frame_samples >= 3);
        assert_eq!(track.sample_bytes().last(), Some(&&[13u8, 14][..]));
    }

    #[test]
    fn read_size_below_marker_length_still_progresses() {
        let frame = [0x20, 0x20, 0x37, 0x20, 0x01];
        let data = [container(&frame), container(&[2])].concat();
        let config = IngestConfig::default().with_sample_read_size(1);
        let (_, output) = run_with(data, 1000, &config);

        let track = output.recorded_track(TRACK_ID).unwrap();
        assert_eq!(track.data, [&frame[..], &[2]].concat());
    }

    #[test]
    fn frame_bytes_survive_tiny_reads() {
        let frames: [&[u8]; 3] = [&[0x65, 0x20, 0x20, 0x37], &[0x20; 9], &[0x41, 0x9a]];
        let data: Vec<u8> = frames.iter().flat_map(|f| container(f)).collect();
        let (_, output) = run(data, 1);

        let track = output.recorded_track(TRACK_ID).unwrap();
        assert_eq!(track.formats.len(), 1);
        assert_eq!(track.data, frames.concat());
    }

    #[test]
    fn unparseable_window_is_skipped() {
        let mut bad = [0u8; PARAMETER_SET_PROBE_LEN];
        bad[0] = 0x68;
        let data = [
            [&MAGIC[..], &bad, &[7, 7]].concat(),
            container(&[8]),
        ]
        .concat();
        let (extractor, output) = run(data, 1000);

        let track = output.recorded_track(TRACK_ID).unwrap();
        assert_eq!(track.formats.len(), 1);
        assert_eq!(track.data, vec![7, 7, 8]);
        assert_eq!(extractor.state(), ExtractorState::Streaming);
    }

    #[test]
    fn truncated_header_ends_input() {
        let data = [&MAGIC[..], &SPS_640X480].concat();
        let (extractor, output) = run(data, 1000);
        assert!(output.recorded_track(TRACK_ID).unwrap().formats.is_empty());
        assert_eq!(extractor.state(), ExtractorState::Sniffing);
    }

    #[test]
    fn seek_is_a_no_op() {
        let mut extractor = ContainerExtractor::new(&IngestConfig::default());
        extractor.init(&mut RecordingOutput::new()).unwrap();
        extractor.seek(1_000, 2_000);
        assert_eq!(extractor.state(), ExtractorState::Sniffing);
    }
}
