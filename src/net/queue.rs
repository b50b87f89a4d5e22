use super::EthernetFrame;
use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::VecDeque, fmt::Debug, rc::Rc};

/// A shared handle to a transmit queue.
pub type QueueRef = Rc<RefCell<dyn Queue>>;

///
/// Counters maintained by every queue.
///
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Frames accepted by `enqueue`.
    pub received: usize,
    /// Frames rejected by `enqueue`.
    pub dropped: usize,
    /// Frames handed out by `dequeue`.
    pub dequeued: usize,
}

///
/// A transmit queue of framed packets.
///
pub trait Queue: Debug {
    ///
    /// Inserts a frame at the tail of the queue.
    ///
    /// Returns `false` if the queue policy rejected the frame.
    ///
    fn enqueue(&mut self, frame: EthernetFrame) -> bool;

    /// Removes the frame at the head of the queue.
    fn dequeue(&mut self) -> Option<EthernetFrame>;

    /// The number of frames in the queue.
    fn len(&self) -> usize;

    /// The number of payload bytes in the queue.
    fn bytes(&self) -> usize;

    /// The queue counters.
    fn stats(&self) -> QueueStats;

    /// Whether the queue holds no frames.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all frames in the queue.
    fn clear(&mut self) {
        while self.dequeue().is_some() {}
    }
}

///
/// The bound applied by a [`DropTailQueue`].
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueLimit {
    /// At most this many frames.
    Packets(usize),
    /// At most this many payload bytes.
    Bytes(usize),
    /// No bound.
    Unbounded,
}

impl Default for QueueLimit {
    fn default() -> Self {
        Self::Packets(DropTailQueue::DEFAULT_MAX_PACKETS)
    }
}

///
/// A FIFO queue that rejects new frames once its limit is reached.
///
#[derive(Debug, Default)]
pub struct DropTailQueue {
    limit: QueueLimit,
    frames: VecDeque<EthernetFrame>,
    bytes: usize,
    stats: QueueStats,
}

impl DropTailQueue {
    /// The frame limit of a default queue.
    pub const DEFAULT_MAX_PACKETS: usize = 100;

    /// Creates a new queue with the given limit.
    #[must_use]
    pub fn new(limit: QueueLimit) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Creates a new queue without bounds.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(QueueLimit::Unbounded)
    }

    /// Creates a new queue as a shared [`QueueRef`].
    #[must_use]
    pub fn shared(limit: QueueLimit) -> QueueRef {
        Rc::new(RefCell::new(Self::new(limit)))
    }

    /// The limit of the queue.
    #[must_use]
    pub fn limit(&self) -> QueueLimit {
        self.limit
    }
}

impl Queue for DropTailQueue {
    fn enqueue(&mut self, frame: EthernetFrame) -> bool {
        let full = match self.limit {
            QueueLimit::Packets(max) => self.frames.len() >= max,
            QueueLimit::Bytes(max) => self.bytes + frame.payload.len() > max,
            QueueLimit::Unbounded => false,
        };

        if full {
            tracing::trace!(limit = ?self.limit, "queue full, dropping frame");
            self.stats.dropped += 1;
            return false;
        }

        self.bytes += frame.payload.len();
        self.stats.received += 1;
        self.frames.push_back(frame);
        true
    }

    fn dequeue(&mut self) -> Option<EthernetFrame> {
        let frame = self.frames.pop_front()?;
        self.bytes -= frame.payload.len();
        self.stats.dequeued += 1;
        Some(frame)
    }

    fn len(&self) -> usize {
        self.frames.len()
    }

    fn bytes(&self) -> usize {
        self.bytes
    }

    fn stats(&self) -> QueueStats {
        self.stats
    }
}
