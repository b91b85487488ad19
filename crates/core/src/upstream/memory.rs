use super::{ContentLength, DataSource, DataSpec, ReadOutcome};
use crate::error::{IngestError, Result};

/// [`DataSource`] over an in-memory buffer.
///
/// `max_chunk` caps how many bytes a single read returns, which lets tests
/// reproduce the short reads of a network source.
#[derive(Debug, Clone)]
pub struct ByteArraySource {
    data: Vec<u8>,
    position: usize,
    max_chunk: usize,
    uri: Option<String>,
}

impl ByteArraySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            position: 0,
            max_chunk: usize::MAX,
            uri: None,
        }
    }

    /// Limit each read to at most `max_chunk` bytes (minimum 1).
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk.max(1);
        self
    }
}

impl DataSource for ByteArraySource {
    fn open(&mut self, spec: &DataSpec) -> Result<ContentLength> {
        self.position = 0;
        self.uri = Some(spec.uri.clone());
        Ok(ContentLength::Known(self.data.len() as u64))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        if self.uri.is_none() {
            return Err(IngestError::SessionNotOpen);
        }
        if buf.is_empty() {
            return Ok(ReadOutcome::Bytes(0));
        }
        let remaining = &self.data[self.position..];
        if remaining.is_empty() {
            return Ok(ReadOutcome::EndOfStream);
        }

        let n = remaining.len().min(buf.len()).min(self.max_chunk);
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(ReadOutcome::Bytes(n))
    }

    fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    fn close(&mut self) -> Result<()> {
        self.uri = None;
        Ok(())
    }
}
