//! Fragment collector
//!
//! Per-endpoint reassembly of datagram fragments. The first datagram from an
//! idle endpoint arms one quiescence timer; when it fires the buffered chunks
//! are concatenated, checked against the frame size and decoded. The buffer
//! is removed on every outcome. Once a window holds more than one frame's
//! worth of bytes its chunks are released and only the length is tracked.
//!
//! ```text
//! IDLE --datagram--> COLLECTING --timer--> (evaluate, discard) --> IDLE
//!                      ^    |
//!                      +----+ datagram (append, timer untouched)
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use contracts::{EndpointKey, FRAME_SIZE};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, instrument, trace, warn};

use crate::decoder;
use crate::normalizer::normalize;
use crate::pipeline::NotificationEmitter;
use crate::scheduler::Scheduler;

/// Chunks received from one endpoint within the current window
#[derive(Debug, Default)]
pub struct FragmentBuffer {
    chunks: Vec<Bytes>,
    len: usize,
    fragments: usize,
}

impl FragmentBuffer {
    fn push(&mut self, chunk: Bytes) {
        self.len = self.len.saturating_add(chunk.len());
        self.fragments += 1;

        if self.len > FRAME_SIZE {
            // can only end as an incomplete frame
            self.chunks = Vec::new();
        } else {
            self.chunks.push(chunk);
        }
    }

    /// Total bytes received in this window
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes actually held in memory
    pub fn retained(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// Number of datagrams received in this window
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Concatenate chunks in arrival order
    fn concat(self) -> Bytes {
        if self.chunks.len() == 1 {
            return self.chunks.into_iter().next().unwrap_or_default();
        }
        let mut out = BytesMut::with_capacity(self.len);
        for chunk in self.chunks {
            out.extend_from_slice(&chunk);
        }
        out.freeze()
    }
}

struct CollectorState {
    buffers: DashMap<EndpointKey, FragmentBuffer>,
    quiescence: Duration,
    emitter: NotificationEmitter,
}

/// Keyed fragment collector
///
/// Cheap to clone; clones share the same buffers.
pub struct FragmentCollector<S: Scheduler> {
    state: Arc<CollectorState>,
    scheduler: Arc<S>,
}

impl<S: Scheduler> Clone for FragmentCollector<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<S: Scheduler> FragmentCollector<S> {
    pub fn new(quiescence: Duration, scheduler: S, emitter: NotificationEmitter) -> Self {
        Self {
            state: Arc::new(CollectorState {
                buffers: DashMap::new(),
                quiescence,
                emitter,
            }),
            scheduler: Arc::new(scheduler),
        }
    }

    /// Accept one datagram from `source`.
    ///
    /// Creates the endpoint's buffer and arms its timer if the endpoint is
    /// idle, otherwise appends.
    pub fn on_datagram(&self, source: EndpointKey, datagram: Bytes) {
        self.state.emitter.metrics().record_datagram(datagram.len());

        let first = match self.state.buffers.entry(source) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().push(datagram);
                trace!(
                    source = %source,
                    buffered = occupied.get().len(),
                    "fragment appended"
                );
                false
            }
            Entry::Vacant(vacant) => {
                let mut buffer = FragmentBuffer::default();
                buffer.push(datagram);
                vacant.insert(buffer);
                trace!(source = %source, "collection started");
                true
            }
        };

        // the entry guard is released above; the timer may fire on another thread
        if first {
            let state = self.state.clone();
            self.scheduler.schedule(
                self.state.quiescence,
                Box::new(move || complete(&state, source)),
            );
        }
    }

    /// Endpoints with a collection in progress
    pub fn in_flight(&self) -> usize {
        self.state.buffers.len()
    }

    /// Bytes received from `source` in the current window, if collecting
    pub fn buffered_len(&self, source: &EndpointKey) -> Option<usize> {
        self.state.buffers.get(source).map(|b| b.len())
    }

    /// Bytes held in memory for `source`, if collecting
    pub fn retained_len(&self, source: &EndpointKey) -> Option<usize> {
        self.state.buffers.get(source).map(|b| b.retained())
    }

    pub fn quiescence(&self) -> Duration {
        self.state.quiescence
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}

/// Timer expiry for one endpoint
#[instrument(name = "collector_complete", skip_all, fields(source = %source))]
fn complete(state: &CollectorState, source: EndpointKey) {
    let Some((_, buffer)) = state.buffers.remove(&source) else {
        return;
    };

    let fragments = buffer.fragment_count();
    let metrics = state.emitter.metrics();

    if buffer.len() != FRAME_SIZE {
        metrics.record_frame_incomplete();
        warn!(
            received = buffer.len(),
            expected = FRAME_SIZE,
            fragments,
            "incomplete frame discarded"
        );
        return;
    }

    let raw = buffer.concat();
    let frame = match decoder::decode(&raw) {
        Ok(frame) => frame.drop_leading_sample(),
        Err(err) => {
            metrics.record_decode_error();
            warn!(error = %err, "frame decode failed");
            return;
        }
    };

    match normalize(frame) {
        Ok(notification) => {
            metrics.record_frame_completed();
            debug!(
                device_id = %notification.device_id,
                fragments,
                "frame reassembled"
            );
            state.emitter.emit(notification);
        }
        Err(err) => {
            metrics.record_decode_error();
            warn!(error = %err, "frame normalization failed");
        }
    }
}
