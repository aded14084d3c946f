//! Page replacement policies for the buffer pool.

use crate::frame::FrameId;
use parking_lot::Mutex;

/// Trait for page replacement algorithms.
pub trait Replacer: Send + Sync {
    /// Records that the given frame was accessed.
    fn record_access(&self, frame_id: FrameId);

    /// Selects a victim among frames for which `can_evict` returns true.
    ///
    /// Returns None if no tracked frame qualifies.
    fn evict(&self, can_evict: &dyn Fn(FrameId) -> bool) -> Option<FrameId>;

    /// Stops tracking a frame.
    fn remove(&self, frame_id: FrameId);

    /// Returns the number of tracked frames.
    fn size(&self) -> usize;
}

/// Clock replacement algorithm implementation.
///
/// The clock algorithm maintains a circular buffer of frames with reference bits.
/// When selecting a victim:
/// 1. Skip frames that are untracked or that the caller says cannot be evicted
/// 2. If the reference bit is 0, select the frame
/// 3. Otherwise clear the reference bit and advance the clock hand
/// 4. Stop after two full rotations
pub struct ClockReplacer {
    inner: Mutex<ClockReplacerInner>,
}

struct ClockReplacerInner {
    num_frames: usize,
    reference_bits: Vec<bool>,
    /// Frames currently holding a page.
    tracked: Vec<bool>,
    clock_hand: usize,
}

impl ClockReplacer {
    /// Creates a new clock replacer with the given number of frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            inner: Mutex::new(ClockReplacerInner {
                num_frames,
                reference_bits: vec![false; num_frames],
                tracked: vec![false; num_frames],
                clock_hand: 0,
            }),
        }
    }

    /// Returns the total capacity.
    pub fn capacity(&self) -> usize {
        self.inner.lock().num_frames
    }
}

impl Replacer for ClockReplacer {
    fn record_access(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        let idx = frame_id.0 as usize;
        if idx < inner.num_frames {
            inner.tracked[idx] = true;
            inner.reference_bits[idx] = true;
        }
    }

    fn evict(&self, can_evict: &dyn Fn(FrameId) -> bool) -> Option<FrameId> {
        let mut inner = self.inner.lock();
        let num_frames = inner.num_frames;

        for _ in 0..(2 * num_frames) {
            let hand = inner.clock_hand;
            inner.clock_hand = (hand + 1) % num_frames;

            let frame_id = FrameId(hand as u32);
            if !inner.tracked[hand] || !can_evict(frame_id) {
                continue;
            }
            if inner.reference_bits[hand] {
                // Second chance
                inner.reference_bits[hand] = false;
                continue;
            }

            inner.tracked[hand] = false;
            return Some(frame_id);
        }

        None
    }

    fn remove(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        let idx = frame_id.0 as usize;
        if idx < inner.num_frames {
            inner.tracked[idx] = false;
            inner.reference_bits[idx] = false;
        }
    }

    fn size(&self) -> usize {
        self.inner.lock().tracked.iter().filter(|&&t| t).count()
    }
}
