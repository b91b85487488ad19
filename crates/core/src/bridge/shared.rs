use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{FrameArena, NativeSession, RawHandle};
use crate::container::conform_parameter_set;
use crate::error::Result;
use crate::media::sprop;

/// In-process [`NativeSession`] fed from another thread.
///
/// A receiving thread (an RTP depacketizer, a file replayer, a test) pushes
/// frames through a [`FramePublisher`]; the loading thread pulls them with
/// [`fetch`](NativeSession::fetch). Only the most recent frame is kept, so a
/// slow consumer skips frames instead of queueing them.
///
/// ```
/// use ingest::bridge::{FrameArena, NativeSession, SharedFrameSession};
///
/// let mut session = SharedFrameSession::new();
/// let publisher = session.publisher();
/// let handle = session.open("rtsp://camera.local/stream");
/// assert_ne!(handle, 0);
///
/// let mut arena = FrameArena::new();
/// assert_eq!(session.fetch(handle, &mut arena), None);
///
/// publisher.set_parameter_set(&[0x67, 0x42, 0x00, 0x1e]);
/// publisher.publish_frame(&[0x65, 0x88], 40_000);
/// assert_eq!(session.fetch(handle, &mut arena), Some(40_000));
/// assert_eq!(arena.frame(), &[0x65, 0x88]);
/// ```
#[derive(Clone, Default)]
pub struct SharedFrameSession {
    shared: Arc<Mutex<Slot>>,
}

#[derive(Default)]
struct Slot {
    parameter_set: Vec<u8>,
    frame: Vec<u8>,
    presentation_time_us: u64,
    live: HashSet<RawHandle>,
    next_handle: RawHandle,
    feed_closed: bool,
}

impl SharedFrameSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer side of this session. Any number may exist.
    pub fn publisher(&self) -> FramePublisher {
        FramePublisher {
            shared: self.shared.clone(),
        }
    }

    /// Number of sessions currently open.
    pub fn live_sessions(&self) -> usize {
        self.shared.lock().live.len()
    }
}

impl NativeSession for SharedFrameSession {
    fn open(&mut self, url: &str) -> RawHandle {
        if !is_rtsp_url(url) {
            tracing::warn!(url, "refusing non-RTSP URL");
            return 0;
        }

        let mut slot = self.shared.lock();
        if slot.feed_closed {
            tracing::warn!(url, "frame feed already closed");
            return 0;
        }

        slot.next_handle += 1;
        let handle = slot.next_handle;
        slot.live.insert(handle);
        handle
    }

    fn close(&mut self, handle: RawHandle) {
        self.shared.lock().live.remove(&handle);
    }

    fn fetch(&mut self, handle: RawHandle, arena: &mut FrameArena) -> Option<u64> {
        let slot = self.shared.lock();
        if !slot.live.contains(&handle) {
            return None;
        }
        if slot.parameter_set.is_empty() || slot.frame.is_empty() {
            return None;
        }

        arena.ensure_capacity(slot.parameter_set.len(), slot.frame.len());
        arena.parameter_set_mut().copy_from_slice(&slot.parameter_set);
        arena.frame_mut().copy_from_slice(&slot.frame);
        Some(slot.presentation_time_us)
    }
}

/// Producer handle for a [`SharedFrameSession`].
#[derive(Clone)]
pub struct FramePublisher {
    shared: Arc<Mutex<Slot>>,
}

impl FramePublisher {
    /// Replace the stored parameter set (an SPS NAL unit without start code).
    pub fn set_parameter_set(&self, parameter_set: &[u8]) {
        let mut slot = self.shared.lock();
        slot.parameter_set.clear();
        slot.parameter_set.extend_from_slice(parameter_set);
    }

    /// Take the parameter set from an SDP `sprop-parameter-sets` value.
    ///
    /// Only a value carrying exactly two records (SPS, PPS) replaces the
    /// stored parameter set; anything else keeps the previous one. Returns
    /// whether the parameter set was replaced.
    ///
    /// The SPS is zero-padded to the container's probe window so framing
    /// stays byte-exact. An SPS longer than the window is rejected with
    /// [`IngestError::ParameterSetTooLong`](crate::error::IngestError::ParameterSetTooLong)
    /// and the previous parameter set is kept.
    pub fn set_sprop_parameter_sets(&self, value: &str) -> Result<bool> {
        let records = sprop::parse_sprop_parameter_sets(value)?;
        if records.len() != 2 {
            tracing::debug!(
                records = records.len(),
                "sprop-parameter-sets without SPS/PPS pair, keeping previous"
            );
            return Ok(false);
        }
        let parameter_set = conform_parameter_set(&records[0])?;
        self.set_parameter_set(&parameter_set);
        Ok(true)
    }

    /// Store the latest coded picture and its presentation time.
    pub fn publish_frame(&self, frame: &[u8], presentation_time_us: u64) {
        let mut slot = self.shared.lock();
        slot.frame.clear();
        slot.frame.extend_from_slice(frame);
        slot.presentation_time_us = presentation_time_us;
    }

    /// Refuse any further `open` calls. Live sessions keep their last frame.
    pub fn close_feed(&self) {
        self.shared.lock().feed_closed = true;
    }
}

fn is_rtsp_url(url: &str) -> bool {
    ["rtsp://", "rtsps://"].iter().any(|scheme| {
        url.len() > scheme.len()
            && url
                .get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}
