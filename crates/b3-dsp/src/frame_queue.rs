//! Single-producer/single-consumer queue of `FilteredFrame`s.
//!
//! The audio pipeline is the only producer and the actuator scheduler is the
//! only consumer, so a lock-free ring buffer is sufficient and avoids the
//! mutex the original design used around its frame queue.

use rtrb::{Consumer, Producer, RingBuffer};

use crate::types::FilteredFrame;

pub struct FrameProducer {
    inner: Producer<FilteredFrame>,
}

pub struct FrameConsumer {
    inner: Consumer<FilteredFrame>,
}

/// Build a bounded frame queue. `capacity` should comfortably exceed
/// `buffer_chunks` so the producer never blocks waiting on the consumer.
pub fn frame_queue(capacity: usize) -> (FrameProducer, FrameConsumer) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (FrameProducer { inner: producer }, FrameConsumer { inner: consumer })
}

impl FrameProducer {
    /// Push a frame, dropping it if the queue is full. The pipeline's own
    /// pacing (it sleeps to the real-time chunk cadence) keeps the queue from
    /// filling up in practice; a full queue here means the consumer has
    /// stalled, which is the consumer's failure to diagnose, not the
    /// producer's to block on.
    pub fn push(&mut self, frame: FilteredFrame) -> Result<(), FilteredFrame> {
        self.inner.push(frame).map_err(|e| e.into_inner())
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }
}

impl FrameConsumer {
    pub fn try_pop(&mut self) -> Option<FilteredFrame> {
        self.inner.pop().ok()
    }

    pub fn len(&self) -> usize {
        self.inner.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
