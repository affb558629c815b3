//! Bounded queue of externally supplied frames.
//!
//! Producers are never blocked nor pushed back on: once the queue is full,
//! every new frame evicts the oldest queued one. Admission is only open while
//! the session is fed from the queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};
use thiserror::Error;

use crate::frame::{FrameBuffer, FrameGeometry, InvalidFrameSize};

/// Number of frames a queue holds unless configured otherwise.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PushFrameError {
    #[error("session is not fed from external frames")]
    NotInQueueMode,
    #[error(transparent)]
    InvalidFrameSize(#[from] InvalidFrameSize),
}

pub struct FrameQueue {
    geometry: FrameGeometry,
    capacity: usize,
    frames: Mutex<VecDeque<FrameBuffer>>,
    // Whether `push` accepts frames. Only read and written while `frames` is
    // locked on the admission path, so a closed queue stays empty after `clear`.
    accepting: AtomicBool,
    evicted: AtomicU64,
}

impl FrameQueue {
    /// Create a closed queue for frames of `geometry`. A capacity of zero is
    /// raised to one.
    pub fn new(geometry: FrameGeometry, capacity: usize) -> Self {
        let capacity = capacity.max(1);

        FrameQueue {
            geometry,
            capacity,
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            accepting: AtomicBool::new(false),
            evicted: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<FrameBuffer>> {
        // A panic while holding the lock cannot leave the deque in an
        // inconsistent state, so just keep using it.
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of frames dropped to make room for newer ones since the last
    /// call to [`FrameQueue::reset_stats`].
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn reset_stats(&self) {
        self.evicted.store(0, Ordering::Relaxed);
    }

    /// Start or stop admitting frames.
    pub fn set_accepting(&self, accepting: bool) {
        let _frames = self.lock();
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Queue `data` as the newest frame.
    ///
    /// If the queue is full, the oldest frame is evicted first. The frame is
    /// rejected if the queue is not accepting frames, or if its size does not
    /// match the queue's geometry; the queue is left untouched in both cases.
    pub fn push(&self, data: Vec<u8>) -> Result<(), PushFrameError> {
        let mut frames = self.lock();

        if !self.accepting.load(Ordering::SeqCst) {
            return Err(PushFrameError::NotInQueueMode);
        }

        let frame = FrameBuffer::from_vec(self.geometry, data).map_err(|e| {
            warn!("Rejecting external frame: {}", e);
            e
        })?;

        if frames.len() >= self.capacity {
            frames.pop_front();
            let evicted = self.evicted.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("Frame queue full, dropped oldest frame ({} so far)", evicted);
        }
        frames.push_back(frame);

        Ok(())
    }

    /// Remove and return the oldest frame, if any. Never blocks on an empty
    /// queue.
    pub fn pop_if_available(&self) -> Option<FrameBuffer> {
        self.lock().pop_front()
    }

    /// Drop all queued frames.
    pub fn clear(&self) {
        let mut frames = self.lock();
        if !frames.is_empty() {
            debug!("Discarding {} queued frames", frames.len());
        }
        frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const GEOMETRY: FrameGeometry = FrameGeometry::new(4, 2);

    fn numbered_frame(n: u8) -> Vec<u8> {
        vec![n; GEOMETRY.frame_size()]
    }

    fn open_queue() -> FrameQueue {
        let queue = FrameQueue::new(GEOMETRY, DEFAULT_QUEUE_CAPACITY);
        queue.set_accepting(true);
        queue
    }

    #[test]
    fn test_drop_oldest() {
        let queue = open_queue();

        for n in 1..=15 {
            queue.push(numbered_frame(n)).unwrap();
            assert!(queue.len() <= DEFAULT_QUEUE_CAPACITY);
        }

        assert_eq!(queue.len(), 10);
        assert_eq!(queue.evicted(), 5);
        for n in 6..=15 {
            let frame = queue.pop_if_available().unwrap();
            assert_eq!(frame.as_ref()[0], n);
        }
        assert!(queue.pop_if_available().is_none());
    }

    #[test]
    fn test_invalid_size_rejected() {
        let queue = open_queue();
        queue.push(numbered_frame(1)).unwrap();

        assert_eq!(
            queue.push(vec![0; GEOMETRY.frame_size() - 1]),
            Err(PushFrameError::InvalidFrameSize(InvalidFrameSize {
                expected: 24,
                actual: 23
            }))
        );
        assert!(queue.push(vec![]).is_err());
        assert!(queue.push(vec![0; GEOMETRY.frame_size() + 3]).is_err());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_closed_queue_rejects() {
        let queue = FrameQueue::new(GEOMETRY, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(
            queue.push(numbered_frame(1)),
            Err(PushFrameError::NotInQueueMode)
        );
        // Closed beats wrong size.
        assert_eq!(queue.push(vec![]), Err(PushFrameError::NotInQueueMode));
        assert!(queue.is_empty());

        queue.set_accepting(true);
        queue.push(numbered_frame(1)).unwrap();
        queue.set_accepting(false);
        assert_eq!(
            queue.push(numbered_frame(2)),
            Err(PushFrameError::NotInQueueMode)
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_pop_and_clear() {
        let queue = open_queue();
        assert!(queue.pop_if_available().is_none());

        queue.push(numbered_frame(1)).unwrap();
        queue.push(numbered_frame(2)).unwrap();
        assert_eq!(queue.pop_if_available().unwrap().as_ref()[0], 1);

        queue.push(numbered_frame(3)).unwrap();
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.pop_if_available().is_none());
    }

    #[test]
    fn test_zero_capacity() {
        let queue = FrameQueue::new(GEOMETRY, 0);
        queue.set_accepting(true);
        assert_eq!(queue.capacity(), 1);

        queue.push(numbered_frame(1)).unwrap();
        queue.push(numbered_frame(2)).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_if_available().unwrap().as_ref()[0], 2);
    }

    #[test]
    fn test_concurrent_push_pop() {
        let queue = Arc::new(open_queue());

        let pusher = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for n in 0..=255u8 {
                    queue.push(numbered_frame(n)).unwrap();
                }
            })
        };

        let mut last = None;
        let mut popped = 0;
        while !pusher.is_finished() || !queue.is_empty() {
            if let Some(frame) = queue.pop_if_available() {
                // Every frame is whole and frames come out in push order.
                let n = frame.as_ref()[0];
                assert!(frame.as_ref().iter().all(|&b| b == n));
                assert!(last.map_or(true, |last| n > last));
                last = Some(n);
                popped += 1;
            }
            assert!(queue.len() <= DEFAULT_QUEUE_CAPACITY);
        }
        pusher.join().unwrap();

        assert_eq!(last, Some(255));
        assert_eq!(popped + queue.evicted(), 256);
    }
}
