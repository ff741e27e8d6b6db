//! Pipeline bring-up and the interrupt entry points.
//!
//! # Design
//! [setup] wires the whole pipeline in one call: it validates the DMA
//! buffers, arms both ADCs and the shared sample clock through the
//! [CaptureDriver], and connects the UDP stream. Any failure is reported as
//! a [BringupError]; the firmware entry is the only place that decides to
//! halt on one. After bring-up the interrupt side runs [PairedCapture]
//! while the foreground loop repeatedly calls
//! [UdpStream::process](crate::net::stream::UdpStream::process).
//!
//! DMA transfer callbacks cannot carry arguments, so the firmware moves the
//! production-sized capture stage into a process-wide slot with
//! [install_capture] once at bring-up and routes its four transfer
//! interrupts to the matching no-argument shims below.

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_nal::UdpClientStack;
use heapless::spsc::Queue;

use crate::capture::{AdcId, DmaHalf, PairedCapture};
use crate::design_parameters;
use crate::frame::{DropLatch, Frame};
use crate::net::stream::UdpStream;
use crate::net::wire::SampleBits;
use crate::net::StreamTarget;

/// A fatal condition during pipeline bring-up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BringupError {
    /// A DMA buffer is empty.
    EmptyBuffer,
    /// A DMA buffer does not split into two equal halves.
    OddBufferLength,
    /// The two ADC buffers differ in length.
    BufferMismatch,
    /// Half length times channel count does not match the frame capacity.
    FrameGeometry,
    /// An ADC's DMA transfer failed to arm.
    AdcStart,
    /// The shared sample clock failed to start.
    SampleClock,
    /// The UDP stream could not allocate or connect its socket.
    Stream,
}

/// Interface to the sampling peripherals.
///
/// Implemented by the firmware against its HAL: both ADCs run circular DMA
/// over the buffers handed to [setup], and one periodic timer triggers both
/// conversions in lock-step.
pub trait CaptureDriver {
    type Error: core::fmt::Debug;

    /// Arm one ADC's circular DMA transfer.
    fn start_adc(&mut self, adc: AdcId) -> Result<(), Self::Error>;

    /// Start the shared sample clock. Called once, after both ADCs are
    /// armed.
    fn start_sample_clock(&mut self) -> Result<(), Self::Error>;
}

/// Bring up the acquisition pipeline.
///
/// # Args
/// * `queue` - Backing storage of the frame queue.
/// * `latch` - The drop latch shared by both pipeline halves.
/// * `adc0_buf` / `adc1_buf` - The circular DMA buffers, two half-buffers
///   long each.
/// * `driver` - The sampling peripherals.
/// * `stack` - The UDP stack to stream with.
/// * `remote` - The collector endpoint.
/// * `sample_bits` - Wire width of one sample.
///
/// # Returns
/// `(capture, stream)` on success. `capture` is the interrupt-side producer
/// (typically handed to [install_capture]); `stream` stays with the
/// foreground loop. Sampling is already running when this returns, so the
/// caller should begin ticking the stream promptly.
#[allow(clippy::too_many_arguments)]
pub fn setup<'a, S, C, const N: usize, const D: usize>(
    queue: &'a mut Queue<Frame<N>, D>,
    latch: &'a DropLatch,
    adc0_buf: &'a mut [u16],
    adc1_buf: &'a mut [u16],
    driver: &mut C,
    stack: S,
    remote: StreamTarget,
    sample_bits: SampleBits,
) -> Result<(PairedCapture<'a, N, D>, UdpStream<'a, S, N, D>), BringupError>
where
    S: UdpClientStack,
    C: CaptureDriver,
{
    let (producer, consumer) = queue.split();
    let capture = PairedCapture::new(adc0_buf, adc1_buf, producer, latch)?;

    driver.start_adc(AdcId::Adc0).map_err(|err| {
        log::error!("ADC0 failed to arm: {:?}", err);
        BringupError::AdcStart
    })?;
    driver.start_adc(AdcId::Adc1).map_err(|err| {
        log::error!("ADC1 failed to arm: {:?}", err);
        BringupError::AdcStart
    })?;
    driver.start_sample_clock().map_err(|err| {
        log::error!("Sample clock failed to start: {:?}", err);
        BringupError::SampleClock
    })?;

    let mut stream = UdpStream::new(stack, consumer, latch, remote, sample_bits);
    stream.reset().map_err(|err| {
        log::error!("Stream bring-up failed: {:?}", err);
        BringupError::Stream
    })?;

    Ok((capture, stream))
}

/// The production-sized capture stage, as moved into the interrupt slot.
pub type IrqCapture = PairedCapture<
    'static,
    { design_parameters::FRAME_SAMPLES },
    { design_parameters::FRAME_QUEUE_DEPTH },
>;

/// Backing storage for the production frame queue.
pub type IrqFrameQueue = Queue<
    Frame<{ design_parameters::FRAME_SAMPLES }>,
    { design_parameters::FRAME_QUEUE_DEPTH },
>;

static CAPTURE: Mutex<RefCell<Option<IrqCapture>>> =
    Mutex::new(RefCell::new(None));

/// Move the capture stage into the slot shared with the DMA interrupt
/// shims.
///
/// Written exactly once at bring-up: a second install is refused and the
/// capture handed back.
pub fn install_capture(capture: IrqCapture) -> Result<(), IrqCapture> {
    critical_section::with(|cs| {
        let mut slot = CAPTURE.borrow_ref_mut(cs);
        if slot.is_some() {
            return Err(capture);
        }
        slot.replace(capture);
        Ok(())
    })
}

fn mark_ready(adc: AdcId, half: DmaHalf) {
    critical_section::with(|cs| {
        if let Some(capture) = CAPTURE.borrow_ref_mut(cs).as_mut() {
            capture.mark_ready(adc, half);
        }
    });
}

/// DMA half-transfer callback for ADC0.
pub fn adc0_half_complete() {
    mark_ready(AdcId::Adc0, DmaHalf::First);
}

/// DMA transfer-complete callback for ADC0.
pub fn adc0_full_complete() {
    mark_ready(AdcId::Adc0, DmaHalf::Second);
}

/// DMA half-transfer callback for ADC1.
pub fn adc1_half_complete() {
    mark_ready(AdcId::Adc1, DmaHalf::First);
}

/// DMA transfer-complete callback for ADC1.
pub fn adc1_full_complete() {
    mark_ready(AdcId::Adc1, DmaHalf::Second);
}
