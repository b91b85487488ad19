//! Pull-based byte sources consumed by the extractor side of the pipeline.
//!
//! A [`DataSource`] is opened against a [`DataSpec`], read until it reports
//! [`ReadOutcome::EndOfStream`] and then closed. The
//! [`FrameFramer`](crate::framer::FrameFramer) is the live implementation;
//! [`ByteArraySource`] replays a fixed buffer.

pub mod memory;
pub mod registry;

use crate::error::Result;

pub use memory::ByteArraySource;
pub use registry::{DataSourceFactory, DataSourceRegistry};

/// What to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSpec {
    pub uri: String,
}

impl DataSpec {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// Length reported by [`DataSource::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentLength {
    /// Live or otherwise unsized input.
    Unbounded,
    Known(u64),
}

/// Result of one [`DataSource::read`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were written to the front of the buffer. Zero only
    /// when the buffer itself was empty.
    Bytes(usize),
    /// No more data will ever arrive (end of input or cancellation).
    EndOfStream,
}

/// A byte source with an open/read/close lifecycle.
pub trait DataSource: Send {
    fn open(&mut self, spec: &DataSpec) -> Result<ContentLength>;

    /// Fill the front of `buf` with up to `buf.len()` bytes.
    ///
    /// `buf` is the caller's destination already offset and bounded; the
    /// source never writes past it. May block until data is available.
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome>;

    /// URI passed to the last successful `open`.
    fn uri(&self) -> Option<&str>;

    /// Release resources. Safe to call without a prior `open`.
    fn close(&mut self) -> Result<()>;
}

impl<D: DataSource + ?Sized> DataSource for Box<D> {
    fn open(&mut self, spec: &DataSpec) -> Result<ContentLength> {
        (**self).open(spec)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        (**self).read(buf)
    }

    fn uri(&self) -> Option<&str> {
        (**self).uri()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
