use std::collections::BTreeMap;

use super::{ExtractorOutput, Format, SampleMetadata, SeekMap, TrackKind, TrackOutput};

/// [`ExtractorOutput`] that keeps everything it is given.
///
/// Used by tests and by tools that only need to inspect what an extractor
/// produced.
#[derive(Debug, Default)]
pub struct RecordingOutput {
    tracks: BTreeMap<u32, RecordedTrack>,
    tracks_ended: bool,
    seek_map: Option<SeekMap>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded_track(&self, id: u32) -> Option<&RecordedTrack> {
        self.tracks.get(&id)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn tracks_ended(&self) -> bool {
        self.tracks_ended
    }

    pub fn recorded_seek_map(&self) -> Option<SeekMap> {
        self.seek_map
    }
}

impl ExtractorOutput for RecordingOutput {
    fn track(&mut self, id: u32, kind: TrackKind) -> &mut dyn TrackOutput {
        self.tracks
            .entry(id)
            .or_insert_with(|| RecordedTrack::new(kind))
    }

    fn end_tracks(&mut self) {
        self.tracks_ended = true;
    }

    fn seek_map(&mut self, seek_map: SeekMap) {
        self.seek_map = Some(seek_map);
    }
}

/// Formats, bytes and sample boundaries received by one track.
#[derive(Debug)]
pub struct RecordedTrack {
    pub kind: TrackKind,
    pub formats: Vec<Format>,
    pub data: Vec<u8>,
    pub samples: Vec<SampleMetadata>,
}

impl RecordedTrack {
    fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            formats: Vec::new(),
            data: Vec::new(),
            samples: Vec::new(),
        }
    }

    /// Bytes of each committed sample, in order.
    pub fn sample_bytes(&self) -> Vec<&[u8]> {
        let mut start = 0;
        let mut out = Vec::with_capacity(self.samples.len());
        for sample in &self.samples {
            let end = (start + sample.size).min(self.data.len());
            out.push(&self.data[start..end]);
            start = end;
        }
        out
    }
}

impl TrackOutput for RecordedTrack {
    fn format(&mut self, format: Format) {
        self.formats.push(format);
    }

    fn sample_data(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    fn sample_metadata(&mut self, metadata: SampleMetadata) {
        self.samples.push(metadata);
    }
}
