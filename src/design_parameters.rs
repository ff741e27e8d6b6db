//! Build-time configuration of the acquisition pipeline.

use crate::net::wire::SampleBits;

/// Number of interleaved channels per frame. Structural: one channel per ADC
/// front-end, both triggered by the same sample clock.
pub const CHANNELS: usize = 2;

/// Samples per channel collected into one frame; equals half the DMA buffer
/// of each ADC, so every half-transfer interrupt completes one frame's worth
/// of data per channel.
pub const FRAME_CAPACITY: usize = 64;

/// Total samples carried by one frame (all channels interleaved).
pub const FRAME_SAMPLES: usize = FRAME_CAPACITY * CHANNELS;

// The number of frame slots in the interrupt-to-foreground queue. One slot
// always stays empty, so up to FRAME_QUEUE_DEPTH - 1 frames are in flight.
pub const FRAME_QUEUE_DEPTH: usize = 512;

/// Sample width on the wire for the default build.
pub const SAMPLE_BITS: SampleBits = SampleBits::Sixteen;

/// IPv4 address of the collector the sample stream is sent to.
pub const STREAM_IP: [u8; 4] = [192, 168, 10, 1];

/// UDP port of the collector.
pub const STREAM_PORT: u16 = 5000;

// The size of one outgoing packet buffer in bytes. Ensure the resulting
// ethernet frame is within the MTU:
// 1500 MTU - 20 IP4 header - 8 UDP header
pub const PACKET_CAPACITY: usize = 1500 - 20 - 8;

/// UDP port the function-generator command relay listens on.
pub const CONTROL_PORT: u16 = 6001;

/// Longest command line the relay forwards; longer datagrams are truncated.
pub const COMMAND_CAPACITY: usize = 128;
