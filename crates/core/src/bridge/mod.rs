//! Bridge to the native streaming session.
//!
//! The native layer (an RTSP/RTP client living outside this crate) delivers
//! the latest codec parameter set and coded picture for a stream. This
//! module wraps it behind [`NativeSession`] and gives the framer pull-based
//! access through [`NativeFrameBridge`]:
//!
//! ```text
//! open_session(uri) ──► SessionHandle
//! poll_frame(handle) ──► native fetch ──► FrameArena (param set, frame, pts)
//!                     └─► FrameAvailable if pts changed, else NoFrameYet
//! close_session(handle)
//! ```
//!
//! Buffers live in a [`FrameArena`] owned by the bridge. Capacity only ever
//! grows, so a steady stream stops allocating after the largest frame.

pub mod shared;

use std::num::NonZeroU64;

use crate::error::{IngestError, Result};

pub use shared::{FramePublisher, SharedFrameSession};

/// Handle value as the native layer reports it. Zero means "no session".
pub type RawHandle = u64;

/// Opaque identifier of a live native session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(NonZeroU64);

impl SessionHandle {
    /// Wrap a raw native handle; `None` for the null handle.
    pub fn from_raw(raw: RawHandle) -> Option<Self> {
        NonZeroU64::new(raw).map(SessionHandle)
    }

    pub fn raw(self) -> RawHandle {
        self.0.get()
    }
}

/// Native streaming session (the upstream collaborator).
///
/// Implementations own the network side: connecting, RTP depacketization
/// and keeping the most recent parameter set and picture around.
pub trait NativeSession: Send {
    /// Start a session for `url`. Returns 0 on failure (malformed URL,
    /// unreachable host, codec negotiation failure).
    fn open(&mut self, url: &str) -> RawHandle;

    /// Tear the session down. Unknown handles are ignored.
    fn close(&mut self, handle: RawHandle);

    /// Copy the latest parameter set and picture into `arena`.
    ///
    /// Implementations call [`FrameArena::ensure_capacity`] with the sizes
    /// they are about to write, fill [`FrameArena::parameter_set_mut`] and
    /// [`FrameArena::frame_mut`], and return the picture's presentation
    /// time in microseconds. `None` means nothing was written.
    fn fetch(&mut self, handle: RawHandle, arena: &mut FrameArena) -> Option<u64>;
}

/// Result of a single [`NativeFrameBridge::poll_frame`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// The arena holds a frame that was not seen by the previous poll.
    FrameAvailable,
    /// Nothing new since the last poll.
    NoFrameYet,
}

/// Grow-only buffer with an explicit limit inside its capacity.
#[derive(Debug, Default)]
struct GrowBuffer {
    storage: Vec<u8>,
    limit: usize,
}

impl GrowBuffer {
    fn ensure(&mut self, size: usize) {
        if self.storage.len() < size {
            self.storage.resize(size, 0);
        }
        self.limit = size;
    }

    fn capacity(&self) -> usize {
        self.storage.len()
    }

    fn as_slice(&self) -> &[u8] {
        &self.storage[..self.limit]
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage[..self.limit]
    }
}

/// Parameter-set and frame buffers filled by [`NativeSession::fetch`].
///
/// Nothing is allocated until the first `ensure_capacity` call.
#[derive(Debug, Default)]
pub struct FrameArena {
    parameter_set: GrowBuffer,
    frame: GrowBuffer,
}

impl FrameArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make room for the next fetch.
    ///
    /// A buffer whose capacity is below the requested size grows to it;
    /// otherwise its current length is reset to exactly the requested size.
    /// Capacity never shrinks.
    pub fn ensure_capacity(&mut self, parameter_set_len: usize, frame_len: usize) {
        let grows = parameter_set_len > self.parameter_set.capacity()
            || frame_len > self.frame.capacity();
        self.parameter_set.ensure(parameter_set_len);
        self.frame.ensure(frame_len);
        if grows {
            tracing::debug!(
                parameter_set_capacity = self.parameter_set.capacity(),
                frame_capacity = self.frame.capacity(),
                "frame arena grown"
            );
        }
    }

    pub fn parameter_set(&self) -> &[u8] {
        self.parameter_set.as_slice()
    }

    pub fn frame(&self) -> &[u8] {
        self.frame.as_slice()
    }

    pub fn parameter_set_mut(&mut self) -> &mut [u8] {
        self.parameter_set.as_mut_slice()
    }

    pub fn frame_mut(&mut self) -> &mut [u8] {
        self.frame.as_mut_slice()
    }

    pub fn parameter_set_capacity(&self) -> usize {
        self.parameter_set.capacity()
    }

    pub fn frame_capacity(&self) -> usize {
        self.frame.capacity()
    }
}

/// Owns one native session and the buffers its frames land in.
///
/// Not thread-safe by design of its callers: exactly one loading thread
/// drives a bridge. Data returned by [`parameter_set`](Self::parameter_set)
/// and [`frame`](Self::frame) is overwritten by the next
/// [`poll_frame`](Self::poll_frame), so copy it out first.
pub struct NativeFrameBridge<S> {
    session: S,
    handle: Option<SessionHandle>,
    arena: FrameArena,
    presentation_time_us: Option<u64>,
}

impl<S: NativeSession> NativeFrameBridge<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            handle: None,
            arena: FrameArena::new(),
            presentation_time_us: None,
        }
    }

    /// Open the native session for `uri`.
    ///
    /// No retry happens here; the caller owns the retry policy.
    pub fn open_session(&mut self, uri: &str) -> Result<SessionHandle> {
        if self.handle.is_some() {
            return Err(IngestError::SessionAlreadyOpen);
        }

        let handle = SessionHandle::from_raw(self.session.open(uri)).ok_or_else(|| {
            tracing::warn!(uri, "native layer returned a null session handle");
            IngestError::SessionOpen {
                uri: uri.to_string(),
            }
        })?;

        self.handle = Some(handle);
        self.presentation_time_us = None;
        tracing::info!(uri, handle = handle.raw(), "native session opened");
        Ok(handle)
    }

    /// Release the session. Closing a handle that is not live is a no-op.
    pub fn close_session(&mut self, handle: SessionHandle) {
        if self.handle != Some(handle) {
            tracing::trace!(handle = handle.raw(), "close of inactive session ignored");
            return;
        }
        self.session.close(handle.raw());
        self.handle = None;
        tracing::info!(handle = handle.raw(), "native session closed");
    }

    /// See [`FrameArena::ensure_capacity`].
    pub fn ensure_capacity(&mut self, parameter_set_len: usize, frame_len: usize) {
        self.arena.ensure_capacity(parameter_set_len, frame_len);
    }

    /// Make exactly one fetch attempt against the native session.
    ///
    /// Never blocks beyond the native copy.
    pub fn poll_frame(&mut self, handle: SessionHandle) -> Result<PollResult> {
        if self.handle != Some(handle) {
            return Err(IngestError::SessionNotOpen);
        }

        let Some(pts) = self.session.fetch(handle.raw(), &mut self.arena) else {
            return Ok(PollResult::NoFrameYet);
        };

        if self.presentation_time_us == Some(pts) {
            return Ok(PollResult::NoFrameYet);
        }

        self.presentation_time_us = Some(pts);
        tracing::trace!(
            pts_us = pts,
            parameter_set_len = self.arena.parameter_set().len(),
            frame_len = self.arena.frame().len(),
            "new frame fetched"
        );
        Ok(PollResult::FrameAvailable)
    }

    pub fn handle(&self) -> Option<SessionHandle> {
        self.handle
    }

    pub fn parameter_set(&self) -> &[u8] {
        self.arena.parameter_set()
    }

    pub fn frame(&self) -> &[u8] {
        self.arena.frame()
    }

    /// Timestamp of the most recent fetch, `None` before the first one.
    pub fn presentation_time_us(&self) -> Option<u64> {
        self.presentation_time_us
    }

    pub fn arena(&self) -> &FrameArena {
        &self.arena
    }

    pub fn session(&self) -> &S {
        &self.session
    }
}
