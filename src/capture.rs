//! DMA double-buffer pairing stage.
//!
//! # Design
//! Each ADC fills a circular DMA buffer of twice the frame capacity, raising
//! a half-transfer interrupt when the lower half is stable and a
//! transfer-complete interrupt when the upper half is. The two ADCs share
//! one sample clock, so the same half of both buffers covers the same
//! time-steps. A half becomes a frame only once *both* ADCs have signalled
//! it; the readiness bookkeeping lives entirely in interrupt context.
//!
//! A readiness bit that is set a second time before its half was paired
//! means the previous revolution of that half was never consumed: the data
//! is gone and the drop latch is raised. Likewise, a paired half that finds
//! the frame queue full is discarded, but its time-steps still advance the
//! sample index so the gap stays visible in the frame record.

use heapless::spsc::Producer;

use crate::design_parameters::CHANNELS;
use crate::frame::{DropLatch, Frame};
use crate::pipeline::BringupError;

/// The two ADC front-ends feeding the pipeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AdcId {
    Adc0,
    Adc1,
}

impl AdcId {
    const fn mask(self) -> u8 {
        match self {
            AdcId::Adc0 => 0b01,
            AdcId::Adc1 => 0b10,
        }
    }
}

/// Which half of the circular DMA buffer a transfer event refers to:
/// `First` for the half-transfer interrupt, `Second` for transfer-complete.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DmaHalf {
    First,
    Second,
}

impl DmaHalf {
    const fn index(self) -> usize {
        match self {
            DmaHalf::First => 0,
            DmaHalf::Second => 1,
        }
    }
}

const BOTH_READY: u8 = AdcId::Adc0.mask() | AdcId::Adc1.mask();

/// Producer half of the pipeline: owns the DMA buffers for the session,
/// pairs transfer events and publishes frames into the SPSC queue.
///
/// All methods other than the constructor execute in interrupt context and
/// are allocation-free and non-blocking.
pub struct PairedCapture<'a, const N: usize, const D: usize> {
    adc0: &'a mut [u16],
    adc1: &'a mut [u16],
    samples_per_half: usize,
    ready: [u8; 2],
    next_sample_idx: u64,
    queue: Producer<'a, Frame<N>, D>,
    latch: &'a DropLatch,
}

impl<'a, const N: usize, const D: usize> PairedCapture<'a, N, D> {
    /// Construct the capture stage around the two DMA buffers.
    ///
    /// # Args
    /// * `adc0` / `adc1` - The circular DMA buffers, each two half-buffers
    ///   long. Owned by the capture stage for the streaming session.
    /// * `queue` - The producer side of the frame queue.
    /// * `latch` - The drop latch shared with the foreground sender.
    ///
    /// # Returns
    /// The capture stage, or a [BringupError] if the buffer geometry cannot
    /// produce `N`-sample frames.
    pub fn new(
        adc0: &'a mut [u16],
        adc1: &'a mut [u16],
        queue: Producer<'a, Frame<N>, D>,
        latch: &'a DropLatch,
    ) -> Result<Self, BringupError> {
        if adc0.is_empty() || adc1.is_empty() {
            return Err(BringupError::EmptyBuffer);
        }
        if adc0.len() != adc1.len() {
            return Err(BringupError::BufferMismatch);
        }
        if adc0.len() % 2 != 0 {
            return Err(BringupError::OddBufferLength);
        }

        let samples_per_half = adc0.len() / 2;
        if samples_per_half * CHANNELS != N {
            return Err(BringupError::FrameGeometry);
        }

        latch.clear();

        Ok(Self {
            adc0,
            adc1,
            samples_per_half,
            ready: [0; 2],
            next_sample_idx: 0,
            queue,
            latch,
        })
    }

    /// Record a transfer event for one ADC and pack the half once both ADCs
    /// have signalled it.
    ///
    /// Interrupt context.
    pub fn mark_ready(&mut self, adc: AdcId, half: DmaHalf) {
        let slot = &mut self.ready[half.index()];
        if *slot & adc.mask() != 0 {
            // This half was refilled before its previous pair completed.
            self.latch.raise();
        }
        *slot |= adc.mask();

        if *slot == BOTH_READY {
            *slot = 0;
            self.pack_half(half.index() * self.samples_per_half);
        }
    }

    /// Interleave one paired half-buffer into a frame and publish it.
    fn pack_half(&mut self, base: usize) {
        let samples = self.samples_per_half;
        if base + samples > self.adc0.len() {
            self.latch.raise();
            return;
        }

        if !self.queue.ready() {
            // The half is lost, but its time-steps are not: advancing the
            // index keeps the gap visible in the frame record.
            self.latch.raise();
            self.next_sample_idx += samples as u64;
            return;
        }

        let first_sample_idx = self.next_sample_idx;
        self.next_sample_idx += samples as u64;

        let mut frame = Frame::zeroed();
        for i in 0..samples {
            frame.samples[i * CHANNELS] = self.adc0[base + i];
            frame.samples[i * CHANNELS + 1] = self.adc1[base + i];
        }
        frame.sample_count = samples * CHANNELS;
        frame.first_sample_idx = first_sample_idx;
        frame.flags = self.latch.take();

        if self.queue.enqueue(frame).is_err() {
            // Unreachable for a single producer after the ready() check.
            self.latch.raise();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frame::FLAG_PRECEDING_DROP;
    use heapless::spsc::Queue;

    const N: usize = 8;
    const DEPTH: usize = 5;

    fn buffers() -> ([u16; 8], [u16; 8]) {
        ([1, 2, 3, 4, 5, 6, 7, 8], [10, 20, 30, 40, 50, 60, 70, 80])
    }

    fn pair<const D: usize>(capture: &mut PairedCapture<N, D>, half: DmaHalf) {
        capture.mark_ready(AdcId::Adc0, half);
        capture.mark_ready(AdcId::Adc1, half);
    }

    #[test]
    fn halves_interleave_in_time_then_channel_order() {
        let mut queue: Queue<Frame<N>, DEPTH> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let latch = DropLatch::new();
        let (mut adc0, mut adc1) = buffers();
        let mut capture =
            PairedCapture::new(&mut adc0, &mut adc1, producer, &latch)
                .unwrap();

        pair(&mut capture, DmaHalf::First);
        pair(&mut capture, DmaHalf::Second);

        let first = consumer.dequeue().unwrap();
        assert_eq!(first.samples, [1, 10, 2, 20, 3, 30, 4, 40]);
        assert_eq!(first.sample_count, 8);
        assert_eq!(first.first_sample_idx, 0);
        assert_eq!(first.flags, 0);

        let second = consumer.dequeue().unwrap();
        assert_eq!(second.samples, [5, 50, 6, 60, 7, 70, 8, 80]);
        assert_eq!(second.first_sample_idx, 4);
        assert_eq!(second.flags, 0);
        assert!(consumer.dequeue().is_none());
    }

    #[test]
    fn single_adc_event_does_not_produce_a_frame() {
        let mut queue: Queue<Frame<N>, DEPTH> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let latch = DropLatch::new();
        let (mut adc0, mut adc1) = buffers();
        let mut capture =
            PairedCapture::new(&mut adc0, &mut adc1, producer, &latch)
                .unwrap();

        capture.mark_ready(AdcId::Adc0, DmaHalf::First);
        assert!(consumer.dequeue().is_none());
        assert!(!latch.is_raised());
    }

    #[test]
    fn resignalled_half_raises_latch_and_flags_next_frame() {
        let mut queue: Queue<Frame<N>, DEPTH> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let latch = DropLatch::new();
        let (mut adc0, mut adc1) = buffers();
        let mut capture =
            PairedCapture::new(&mut adc0, &mut adc1, producer, &latch)
                .unwrap();

        capture.mark_ready(AdcId::Adc0, DmaHalf::First);
        capture.mark_ready(AdcId::Adc0, DmaHalf::First);
        assert!(latch.is_raised());

        capture.mark_ready(AdcId::Adc1, DmaHalf::First);
        let frame = consumer.dequeue().unwrap();
        assert_eq!(frame.flags, FLAG_PRECEDING_DROP);
        assert_eq!(frame.first_sample_idx, 0);
        assert!(!latch.is_raised());
    }

    #[test]
    fn overflow_discards_half_but_consumes_its_time_steps() {
        let mut queue: Queue<Frame<N>, DEPTH> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let latch = DropLatch::new();
        let (mut adc0, mut adc1) = buffers();
        let mut capture =
            PairedCapture::new(&mut adc0, &mut adc1, producer, &latch)
                .unwrap();

        // Fill the queue (capacity DEPTH - 1), then overflow it once.
        for _ in 0..DEPTH {
            pair(&mut capture, DmaHalf::First);
        }
        assert!(latch.is_raised());

        // Drain, then publish one more pair: its index skips the lost half.
        for expected_idx in [0u64, 4, 8, 12] {
            let frame = consumer.dequeue().unwrap();
            assert_eq!(frame.first_sample_idx, expected_idx);
            assert_eq!(frame.flags, 0);
        }
        assert!(consumer.dequeue().is_none());

        pair(&mut capture, DmaHalf::First);
        let frame = consumer.dequeue().unwrap();
        assert_eq!(frame.first_sample_idx, 20);
        assert_eq!(frame.flags, FLAG_PRECEDING_DROP);
    }

    #[test]
    fn depth_one_queue_still_progresses() {
        let mut queue: Queue<Frame<N>, 2> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let latch = DropLatch::new();
        let (mut adc0, mut adc1) = buffers();
        let mut capture: PairedCapture<N, 2> =
            PairedCapture::new(&mut adc0, &mut adc1, producer, &latch)
                .unwrap();

        pair(&mut capture, DmaHalf::First);
        assert_eq!(consumer.dequeue().unwrap().first_sample_idx, 0);

        pair(&mut capture, DmaHalf::Second);
        assert_eq!(consumer.dequeue().unwrap().first_sample_idx, 4);
        assert!(!latch.is_raised());

        // Producing twice without the consumer running drops the second.
        pair(&mut capture, DmaHalf::First);
        pair(&mut capture, DmaHalf::Second);
        assert!(latch.is_raised());
        assert_eq!(consumer.dequeue().unwrap().first_sample_idx, 8);
        assert!(consumer.dequeue().is_none());
    }

    #[test]
    fn geometry_is_validated_at_bringup() {
        let latch = DropLatch::new();

        let mut queue: Queue<Frame<N>, DEPTH> = Queue::new();
        let (producer, _) = queue.split();
        let mut empty: [u16; 0] = [];
        let mut other = [0u16; 8];
        assert_eq!(
            PairedCapture::<N, DEPTH>::new(
                &mut empty, &mut other, producer, &latch
            )
            .err(),
            Some(BringupError::EmptyBuffer)
        );

        let mut queue: Queue<Frame<N>, DEPTH> = Queue::new();
        let (producer, _) = queue.split();
        let mut short = [0u16; 6];
        let mut other = [0u16; 8];
        assert_eq!(
            PairedCapture::<N, DEPTH>::new(
                &mut short, &mut other, producer, &latch
            )
            .err(),
            Some(BringupError::BufferMismatch)
        );

        let mut queue: Queue<Frame<N>, DEPTH> = Queue::new();
        let (producer, _) = queue.split();
        let mut odd0 = [0u16; 7];
        let mut odd1 = [0u16; 7];
        assert_eq!(
            PairedCapture::<N, DEPTH>::new(
                &mut odd0, &mut odd1, producer, &latch
            )
            .err(),
            Some(BringupError::OddBufferLength)
        );

        let mut queue: Queue<Frame<N>, DEPTH> = Queue::new();
        let (producer, _) = queue.split();
        let mut long0 = [0u16; 12];
        let mut long1 = [0u16; 12];
        assert_eq!(
            PairedCapture::<N, DEPTH>::new(
                &mut long0, &mut long1, producer, &latch
            )
            .err(),
            Some(BringupError::FrameGeometry)
        );
    }
}
