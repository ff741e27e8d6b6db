//! On-wire format of the sample stream.
//!
//! Each frame becomes exactly one UDP datagram: a packed little-endian
//! header followed by the sample payload.
//!
//! ## Header
//!
//! | Offset | Size | Field              |
//! |-------:|-----:|--------------------|
//! |      0 |    4 | `packet_seq`       |
//! |      4 |    8 | `first_sample_idx` |
//! |     12 |    2 | `channels`         |
//! |     14 |    2 | `samples_per_ch`   |
//! |     16 |    2 | `flags`            |
//! |     18 |    2 | `sample_bits`      |
//!
//! `packet_seq` counts datagrams formed since the stream was reset, so the
//! receiver detects in-flight loss from sequence gaps. `first_sample_idx` is
//! the time-step index of the first payload sample. `flags` bit 0 signals
//! that at least one frame was dropped before this one.
//!
//! The payload interleaves channels per time-step
//! (`t0c0 t0c1 t1c0 t1c1 ...`), each sample one or two bytes wide per
//! `sample_bits`, native-endian at that width. 12-bit readings are
//! truncated to their low byte in the 8-bit format.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Serialized header size in bytes. The header is packed; the payload
/// starts immediately after.
pub const HEADER_LEN: usize = 20;

/// Wire width of one sample.
#[repr(u16)]
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
pub enum SampleBits {
    Eight = 8,
    Sixteen = 16,
}

impl SampleBits {
    /// Bytes occupied by one sample on the wire.
    pub const fn octets(self) -> usize {
        match self {
            SampleBits::Eight => 1,
            SampleBits::Sixteen => 2,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WireError {
    /// The datagram is shorter than a header.
    Truncated,
    /// The header's `sample_bits` field is not a supported width.
    UnknownSampleBits,
    /// The payload length disagrees with the header geometry.
    PayloadLength,
}

/// The deserialized view of a stream datagram header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_seq: u32,
    pub first_sample_idx: u64,
    pub channels: u16,
    pub samples_per_ch: u16,
    pub flags: u16,
    pub sample_bits: u16,
}

impl PacketHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0; HEADER_LEN];
        buf[0..4].copy_from_slice(&self.packet_seq.to_le_bytes());
        buf[4..12].copy_from_slice(&self.first_sample_idx.to_le_bytes());
        buf[12..14].copy_from_slice(&self.channels.to_le_bytes());
        buf[14..16].copy_from_slice(&self.samples_per_ch.to_le_bytes());
        buf[16..18].copy_from_slice(&self.flags.to_le_bytes());
        buf[18..20].copy_from_slice(&self.sample_bits.to_le_bytes());
        buf
    }

    /// Split a received datagram into its header and payload.
    ///
    /// This is the receiver-side counterpart of the sender: collector tools
    /// and the end-to-end tests use it to validate the stream.
    pub fn parse(datagram: &[u8]) -> Result<(Self, &[u8]), WireError> {
        if datagram.len() < HEADER_LEN {
            return Err(WireError::Truncated);
        }

        // Note(unwrap): the slice bounds are fixed and in range.
        let header = Self {
            packet_seq: u32::from_le_bytes(datagram[0..4].try_into().unwrap()),
            first_sample_idx: u64::from_le_bytes(
                datagram[4..12].try_into().unwrap(),
            ),
            channels: u16::from_le_bytes(datagram[12..14].try_into().unwrap()),
            samples_per_ch: u16::from_le_bytes(
                datagram[14..16].try_into().unwrap(),
            ),
            flags: u16::from_le_bytes(datagram[16..18].try_into().unwrap()),
            sample_bits: u16::from_le_bytes(
                datagram[18..20].try_into().unwrap(),
            ),
        };

        let bits = SampleBits::try_from(header.sample_bits)
            .map_err(|_| WireError::UnknownSampleBits)?;

        let payload = &datagram[HEADER_LEN..];
        let expected = header.samples_per_ch as usize
            * header.channels as usize
            * bits.octets();
        if payload.len() != expected {
            return Err(WireError::PayloadLength);
        }

        Ok((header, payload))
    }
}
