//! The frame record exchanged between the capture interrupt and the
//! foreground sender, and the drop latch that carries loss information
//! forward with it.

use core::sync::atomic::{AtomicU16, Ordering};

/// Frame flag bit 0: at least one frame was lost since the previous
/// published frame. Mirrored verbatim into the packet header.
pub const FLAG_PRECEDING_DROP: u16 = 1 << 0;

/// One queue slot's worth of interleaved samples.
///
/// `N` is the total sample count of the frame: samples-per-channel times
/// channel count, laid out `(ch0, ch1)` per time-step. `first_sample_idx` is
/// the monotone time-step index of `samples[0]`; consecutive published
/// frames differ by exactly samples-per-channel unless a frame was dropped
/// in between, in which case the index gaps and `flags` carries
/// [FLAG_PRECEDING_DROP].
#[derive(Clone, Debug)]
pub struct Frame<const N: usize> {
    pub samples: [u16; N],
    pub sample_count: usize,
    pub first_sample_idx: u64,
    pub flags: u16,
}

impl<const N: usize> Frame<N> {
    pub const fn zeroed() -> Self {
        Self {
            samples: [0; N],
            sample_count: 0,
            first_sample_idx: 0,
            flags: 0,
        }
    }
}

/// Sticky loss flag shared between the producer and consumer halves of the
/// pipeline.
///
/// Raised whenever a frame is lost (queue overflow, missed half-buffer
/// pairing, send failure) and consumed exactly once by the producer when it
/// next publishes a frame, so the receiver learns about every gap from the
/// first datagram that follows it.
// Relaxed suffices throughout: the value is folded into a frame before the
// queue's release store publishes it.
pub struct DropLatch(AtomicU16);

impl DropLatch {
    pub const fn new() -> Self {
        Self(AtomicU16::new(0))
    }

    /// Record a loss. Callable from either side of the queue.
    pub fn raise(&self) {
        self.0.fetch_or(FLAG_PRECEDING_DROP, Ordering::Relaxed);
    }

    /// Consume the latch, returning its value as frame flags.
    pub fn take(&self) -> u16 {
        self.0.swap(0, Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.0.store(0, Ordering::Relaxed);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed) != 0
    }
}

impl Default for DropLatch {
    fn default() -> Self {
        Self::new()
    }
}
