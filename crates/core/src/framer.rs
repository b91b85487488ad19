//! Native frames served as a byte stream.
//!
//! [`FrameFramer`] is the [`DataSource`] the loading thread reads from. At
//! each container boundary it polls the [`NativeFrameBridge`] until a new
//! frame shows up, wraps it as `MAGIC ++ parameter set ++ frame` and then
//! hands that container out in whatever chunk sizes the reader asks for.

use crate::bridge::{NativeFrameBridge, NativeSession, PollResult, SessionHandle};
use crate::cancel::{CancellationToken, Sleeper, ThreadSleeper, WaitOutcome};
use crate::config::IngestConfig;
use crate::container::{PARAMETER_SET_PROBE_LEN, PseudoContainer};
use crate::error::{IngestError, Result};
use crate::upstream::{ContentLength, DataSource, DataSpec, ReadOutcome};

/// Pull-based byte source over a native streaming session.
pub struct FrameFramer<S> {
    bridge: NativeFrameBridge<S>,
    sleeper: Box<dyn Sleeper>,
    cancel: CancellationToken,
    config: IngestConfig,
    container: Option<PseudoContainer>,
    uri: Option<String>,
    warned_probe_mismatch: bool,
}

impl<S: NativeSession> FrameFramer<S> {
    pub fn new(session: S, config: IngestConfig) -> Self {
        Self {
            bridge: NativeFrameBridge::new(session),
            sleeper: Box::new(ThreadSleeper),
            cancel: CancellationToken::new(),
            config,
            container: None,
            uri: None,
            warned_probe_mismatch: false,
        }
    }

    /// Replace the wait used between unsuccessful polls.
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Share an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that ends a blocked [`read`](DataSource::read) with
    /// [`ReadOutcome::EndOfStream`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn bridge(&self) -> &NativeFrameBridge<S> {
        &self.bridge
    }

    /// Poll until the bridge reports a new frame and wrap it.
    ///
    /// `None` when cancellation was observed before a frame arrived.
    fn next_container(&mut self, handle: SessionHandle) -> Result<Option<PseudoContainer>> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        loop {
            match self.bridge.poll_frame(handle)? {
                PollResult::FrameAvailable => break,
                PollResult::NoFrameYet => {
                    let outcome = self.sleeper.wait(self.config.poll_interval, &self.cancel);
                    if outcome == WaitOutcome::Cancelled {
                        tracing::debug!("frame wait cancelled");
                        return Ok(None);
                    }
                }
            }
        }

        let parameter_set_len = self.bridge.parameter_set().len();
        if parameter_set_len != PARAMETER_SET_PROBE_LEN && !self.warned_probe_mismatch {
            tracing::warn!(
                parameter_set_len,
                probe_len = PARAMETER_SET_PROBE_LEN,
                "parameter set length differs from the container probe window"
            );
            self.warned_probe_mismatch = true;
        }

        let container = PseudoContainer::build(self.bridge.parameter_set(), self.bridge.frame());
        tracing::trace!(
            len = container.len(),
            pts_us = self.bridge.presentation_time_us(),
            "container built"
        );
        Ok(Some(container))
    }
}

impl<S: NativeSession> DataSource for FrameFramer<S> {
    fn open(&mut self, spec: &DataSpec) -> Result<ContentLength> {
        self.bridge.open_session(&spec.uri)?;
        self.uri = Some(spec.uri.clone());
        self.container = None;
        Ok(ContentLength::Unbounded)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        if buf.is_empty() {
            return Ok(ReadOutcome::Bytes(0));
        }
        let handle = self.bridge.handle().ok_or(IngestError::SessionNotOpen)?;

        if self.container.is_none() {
            match self.next_container(handle)? {
                Some(container) => self.container = Some(container),
                None => return Ok(ReadOutcome::EndOfStream),
            }
        }
        let Some(container) = self.container.as_mut() else {
            return Ok(ReadOutcome::EndOfStream);
        };

        let n = container.read_into(buf);
        if container.is_exhausted() {
            self.container = None;
        }
        Ok(ReadOutcome::Bytes(n))
    }

    fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    fn close(&mut self) -> Result<()> {
        self.container = None;
        self.uri = None;
        if let Some(handle) = self.bridge.handle() {
            self.bridge.close_session(handle);
        }
        Ok(())
    }
}
