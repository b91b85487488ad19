use super::ExtractorInput;
use crate::error::{IngestError, Result};
use crate::upstream::{DataSource, ReadOutcome};

const SKIP_CHUNK: usize = 4096;

/// [`ExtractorInput`] over a [`DataSource`].
///
/// Bytes pulled from the source for peeking are kept in a buffer and served
/// to later reads before the source is touched again.
pub struct DefaultExtractorInput<'a> {
    source: &'a mut dyn DataSource,
    peek_buffer: Vec<u8>,
    peek_position: usize,
    /// Sink for skipped bytes that were never peeked.
    skip_buffer: Vec<u8>,
    position: u64,
}

impl<'a> DefaultExtractorInput<'a> {
    pub fn new(source: &'a mut dyn DataSource) -> Self {
        Self {
            source,
            peek_buffer: Vec::new(),
            peek_position: 0,
            skip_buffer: Vec::new(),
            position: 0,
        }
    }

    /// Make the peek buffer at least `len` bytes long.
    ///
    /// Returns `false` if the source ended first. Bytes read before that
    /// stay buffered.
    fn fill_peek_buffer(&mut self, len: usize) -> Result<bool> {
        while self.peek_buffer.len() < len {
            if !self.append_from_source(len - self.peek_buffer.len())? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// One source read of up to `max` bytes onto the end of the peek buffer.
    fn append_from_source(&mut self, max: usize) -> Result<bool> {
        let start = self.peek_buffer.len();
        self.peek_buffer.resize(start + max, 0);
        let outcome = self.source.read(&mut self.peek_buffer[start..]);
        let appended = match outcome {
            Ok(ReadOutcome::Bytes(n)) => n,
            Ok(ReadOutcome::EndOfStream) => 0,
            Err(e) => {
                self.peek_buffer.truncate(start);
                return Err(e);
            }
        };
        self.peek_buffer.truncate(start + appended);
        Ok(appended > 0)
    }

    fn end_of_input(allow_end_of_input: bool) -> Result<bool> {
        if allow_end_of_input {
            Ok(false)
        } else {
            Err(IngestError::UnexpectedEndOfInput)
        }
    }
}

impl ExtractorInput for DefaultExtractorInput<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        if buf.is_empty() {
            return Ok(ReadOutcome::Bytes(0));
        }

        if !self.peek_buffer.is_empty() {
            let n = self.peek_buffer.len().min(buf.len());
            buf[..n].copy_from_slice(&self.peek_buffer[..n]);
            self.peek_buffer.drain(..n);
            self.peek_position = self.peek_position.saturating_sub(n);
            self.position += n as u64;
            return Ok(ReadOutcome::Bytes(n));
        }

        let outcome = self.source.read(buf)?;
        if let ReadOutcome::Bytes(n) = outcome {
            self.position += n as u64;
        }
        Ok(outcome)
    }

    fn read_fully(&mut self, buf: &mut [u8], allow_end_of_input: bool) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..])? {
                ReadOutcome::Bytes(n) => filled += n,
                ReadOutcome::EndOfStream => return Self::end_of_input(allow_end_of_input),
            }
        }
        Ok(true)
    }

    fn skip_fully(&mut self, len: usize) -> Result<()> {
        let buffered = self.peek_buffer.len().min(len);
        self.peek_buffer.drain(..buffered);
        self.peek_position = self.peek_position.saturating_sub(buffered);
        self.position += buffered as u64;

        let mut remaining = len - buffered;
        if remaining > 0 && self.skip_buffer.is_empty() {
            self.skip_buffer.resize(SKIP_CHUNK, 0);
        }
        while remaining > 0 {
            let step = remaining.min(SKIP_CHUNK);
            match self.source.read(&mut self.skip_buffer[..step])? {
                ReadOutcome::Bytes(n) => {
                    remaining -= n;
                    self.position += n as u64;
                }
                ReadOutcome::EndOfStream => return Err(IngestError::UnexpectedEndOfInput),
            }
        }
        Ok(())
    }

    fn peek(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        if buf.is_empty() {
            return Ok(ReadOutcome::Bytes(0));
        }

        if self.peek_position == self.peek_buffer.len() && !self.append_from_source(buf.len())? {
            return Ok(ReadOutcome::EndOfStream);
        }

        let available = &self.peek_buffer[self.peek_position..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.peek_position += n;
        Ok(ReadOutcome::Bytes(n))
    }

    fn peek_fully(&mut self, buf: &mut [u8], allow_end_of_input: bool) -> Result<bool> {
        let end = self.peek_position + buf.len();
        if !self.fill_peek_buffer(end)? {
            return Self::end_of_input(allow_end_of_input);
        }
        buf.copy_from_slice(&self.peek_buffer[self.peek_position..end]);
        self.peek_position = end;
        Ok(true)
    }

    fn reset_peek_position(&mut self) {
        self.peek_position = 0;
    }

    fn position(&self) -> u64 {
        self.position
    }
}
