//! The "consumer" portion of the sample pipeline: drains the frame queue
//! and transmits each frame as one UDP datagram.
//!
//! # Design
//! Transmission is strictly lossy. A frame that cannot be sent for any
//! reason (no socket, malformed shape, packet buffer exhausted, stack
//! rejection) is discarded and the drop latch raised; there is no retry and
//! no buffering beyond the frame queue itself. The receiver reconstructs
//! losses from `packet_seq` gaps and the preceding-drop flag.
//!
//! `packet_seq` advances when the header is built, before the send is
//! attempted, so a rejected send still consumes a sequence number and shows
//! up at the receiver as a gap. The wire sample index is the frame's
//! producer-stamped index, so capture-side drops reach the receiver as
//! index gaps next to the preceding-drop flag; a reset rebases the index so
//! the next datagram starts at zero.

use core::net::SocketAddr;

use embedded_nal::UdpClientStack;
use heapless::spsc::Consumer;

/// Convert a `core::net::SocketAddr` into the `embedded_nal::SocketAddr`
/// expected by the UDP stack.
fn to_embedded_nal_addr(addr: SocketAddr) -> embedded_nal::SocketAddr {
    match addr {
        SocketAddr::V4(v4) => embedded_nal::SocketAddr::V4(embedded_nal::SocketAddrV4::new(
            embedded_nal::Ipv4Addr::from(v4.ip().octets()),
            v4.port(),
        )),
        SocketAddr::V6(v6) => embedded_nal::SocketAddr::V6(embedded_nal::SocketAddrV6::new(
            embedded_nal::Ipv6Addr::from(v6.ip().octets()),
            v6.port(),
            v6.flowinfo(),
            v6.scope_id(),
        )),
    }
}

use super::wire::{PacketHeader, SampleBits, HEADER_LEN};
use super::StreamTarget;
use crate::design_parameters::{CHANNELS, PACKET_CAPACITY};
use crate::frame::{DropLatch, Frame, FLAG_PRECEDING_DROP};

/// UDP transmitter for the sample stream.
///
/// Owns the socket toward the collector together with the datagram
/// sequencing state. Foreground context only.
pub struct UdpStream<'a, N: UdpClientStack, const T: usize, const D: usize> {
    stack: N,
    socket: Option<N::UdpSocket>,
    queue: Consumer<'a, Frame<T>, D>,
    latch: &'a DropLatch,
    remote: StreamTarget,
    sample_bits: SampleBits,
    packet_sequence: u32,
    // Sample index of the first frame after a reset; wire indices are
    // relative to it.
    sample_index_origin: Option<u64>,
}

impl<'a, N: UdpClientStack, const T: usize, const D: usize>
    UdpStream<'a, N, T, D>
{
    /// Construct the stream transmitter.
    ///
    /// # Args
    /// * `stack` - The UDP stack to transmit with.
    /// * `queue` - The consumer side of the frame queue.
    /// * `latch` - The drop latch shared with the capture stage.
    /// * `remote` - The collector endpoint.
    /// * `sample_bits` - Wire width of one sample.
    ///
    /// The stream starts without a socket; call [UdpStream::reset] to
    /// connect.
    pub fn new(
        stack: N,
        queue: Consumer<'a, Frame<T>, D>,
        latch: &'a DropLatch,
        remote: StreamTarget,
        sample_bits: SampleBits,
    ) -> Self {
        Self {
            stack,
            socket: None,
            queue,
            latch,
            remote,
            sample_bits,
            packet_sequence: 0,
            sample_index_origin: None,
        }
    }

    /// Restart the stream: zero the datagram sequencing state and replace
    /// the socket with a freshly connected one.
    ///
    /// Idempotent; any previous socket is closed first. On error no socket
    /// is left behind and every subsequent frame is discarded with the
    /// latch raised until the next successful reset.
    pub fn reset(&mut self) -> Result<(), N::Error> {
        self.packet_sequence = 0;
        self.sample_index_origin = None;

        if let Some(socket) = self.socket.take() {
            log::info!("Closing stream");
            self.stack.close(socket).ok();
        }

        let mut socket = self.stack.socket()?;
        match self
            .stack
            .connect(&mut socket, to_embedded_nal_addr(SocketAddr::from(self.remote)))
        {
            Ok(()) => {
                log::info!("Streaming to {}", self.remote.0);
                self.socket.replace(socket);
                Ok(())
            }
            Err(err) => {
                self.stack.close(socket).ok();
                Err(err)
            }
        }
    }

    /// Drain the frame queue, transmitting every pending frame.
    ///
    /// The foreground tick; must run often enough that the queue never
    /// saturates at the configured sample rate.
    pub fn process(&mut self) {
        while let Some(frame) = self.queue.dequeue() {
            if !self.send_frame(&frame) {
                self.latch.raise();
            }
        }
    }

    /// Serialize and transmit one frame. Returns false if the frame was
    /// discarded for any reason.
    fn send_frame(&mut self, frame: &Frame<T>) -> bool {
        if frame.sample_count == 0
            || frame.sample_count > frame.samples.len()
            || frame.sample_count % CHANNELS != 0
        {
            return false;
        }
        if self.socket.is_none() {
            return false;
        }

        if frame.flags & FLAG_PRECEDING_DROP != 0 {
            log::warn!("Frames lost before sample {}", frame.first_sample_idx);
        }

        let samples_per_ch = frame.sample_count / CHANNELS;
        let payload_len = frame.sample_count * self.sample_bits.octets();

        let mut packet: heapless::Vec<u8, PACKET_CAPACITY> = heapless::Vec::new();
        if HEADER_LEN + payload_len > packet.capacity() {
            return false;
        }

        // The first frame after a reset fixes the origin all subsequent
        // wire indices are relative to.
        let origin = *self
            .sample_index_origin
            .get_or_insert(frame.first_sample_idx);

        let header = PacketHeader {
            packet_seq: self.packet_sequence,
            first_sample_idx: frame.first_sample_idx.wrapping_sub(origin),
            channels: CHANNELS as u16,
            samples_per_ch: samples_per_ch as u16,
            flags: frame.flags,
            sample_bits: self.sample_bits.into(),
        };

        // The datagram is formed: it consumes a sequence number whether or
        // not the send below goes through.
        self.packet_sequence = self.packet_sequence.wrapping_add(1);

        // Note(unwrap): the capacity was checked above.
        packet.extend_from_slice(&header.to_bytes()).unwrap();
        match self.sample_bits {
            SampleBits::Sixteen => {
                for sample in &frame.samples[..frame.sample_count] {
                    packet.extend_from_slice(&sample.to_ne_bytes()).unwrap();
                }
            }
            SampleBits::Eight => {
                for sample in &frame.samples[..frame.sample_count] {
                    packet.push(*sample as u8).unwrap();
                }
            }
        }

        // Note(unwrap): the socket was checked above.
        let socket = self.socket.as_mut().unwrap();
        match self.stack.send(socket, &packet) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("Stream send failed: {:?}", err);
                false
            }
        }
    }
}
