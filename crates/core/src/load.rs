//! The loading loop that drives one source through one extractor.

use crate::cancel::CancellationToken;
use crate::error::{IngestError, Result};
use crate::extractor::{
    DefaultExtractorInput, Extractor, ExtractorInput, ExtractorOutput, ExtractorRegistry,
    ExtractorStatus,
};
use crate::upstream::{DataSource, DataSourceRegistry, DataSpec};

/// What a finished [`Loader::load`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    /// Registry name of the extractor that was selected.
    pub extractor: String,
    /// Number of `Extractor::read` calls made.
    pub read_calls: u64,
    /// Bytes consumed from the source.
    pub bytes_consumed: u64,
    /// Whether the load stopped because the cancellation token fired.
    pub cancelled: bool,
}

/// Opens a data source by URI scheme, selects an extractor by sniffing and
/// reads until the input ends or the load is cancelled.
pub struct Loader {
    sources: DataSourceRegistry,
    extractors: ExtractorRegistry,
    cancel: CancellationToken,
}

impl Loader {
    pub fn new(sources: DataSourceRegistry, extractors: ExtractorRegistry) -> Self {
        Self {
            sources,
            extractors,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `cancel` to stop the loop. Share the same token with sources that
    /// block (such as [`FrameFramer`](crate::framer::FrameFramer)) so a
    /// cancel also unblocks a pending read.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Load `spec` into `output`.
    ///
    /// The source is closed on every path out of this function, and the
    /// extractor is released once it has been selected.
    pub fn load(&self, spec: &DataSpec, output: &mut dyn ExtractorOutput) -> Result<LoadSummary> {
        let mut source = self.sources.create(&spec.uri)?;
        tracing::info!(uri = %spec.uri, "load started");

        let result = match source.open(spec) {
            Ok(_) => self.run(&mut *source, output),
            Err(e) => Err(e),
        };
        let closed = source.close();

        let summary = result?;
        closed?;
        tracing::info!(
            uri = %spec.uri,
            extractor = %summary.extractor,
            read_calls = summary.read_calls,
            bytes_consumed = summary.bytes_consumed,
            cancelled = summary.cancelled,
            "load finished"
        );
        Ok(summary)
    }

    fn run(
        &self,
        source: &mut dyn DataSource,
        output: &mut dyn ExtractorOutput,
    ) -> Result<LoadSummary> {
        let mut input = DefaultExtractorInput::new(source);
        let (name, mut extractor) = self
            .extractors
            .select(&mut input)?
            .ok_or(IngestError::UnrecognizedInput)?;

        let mut summary = LoadSummary {
            extractor: name,
            read_calls: 0,
            bytes_consumed: 0,
            cancelled: false,
        };

        let result = self.drive(&mut *extractor, &mut input, output, &mut summary);
        extractor.release();
        summary.bytes_consumed = input.position();

        result.map(|()| summary)
    }

    fn drive(
        &self,
        extractor: &mut dyn Extractor,
        input: &mut dyn ExtractorInput,
        output: &mut dyn ExtractorOutput,
        summary: &mut LoadSummary,
    ) -> Result<()> {
        extractor.init(output)?;
        loop {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                return Ok(());
            }
            summary.read_calls += 1;
            if extractor.read(input, output)? == ExtractorStatus::EndOfInput {
                summary.cancelled = self.cancel.is_cancelled();
                return Ok(());
            }
        }
    }
}
