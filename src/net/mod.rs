//! Network-facing half of the node: the sample stream, its wire format and
//! the function-generator command relay.

pub mod relay;
pub mod stream;
pub mod wire;

use core::fmt::Write;
use core::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::Serialize;
use serde_with::DeserializeFromStr;

use crate::design_parameters;

/// Represents the destination for the UDP stream to send data to.
///
/// `<addr>:<port>`
///
/// * `<addr>` is an IPv4 address. E.g. `192.168.10.1`
/// * `<port>` is any unsigned 16-bit value.
#[derive(Copy, Clone, Debug, DeserializeFromStr, PartialEq, Eq)]
pub struct StreamTarget(pub SocketAddr);

impl Default for StreamTarget {
    fn default() -> Self {
        let [a, b, c, d] = design_parameters::STREAM_IP;
        Self(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::new(a, b, c, d)),
            design_parameters::STREAM_PORT,
        ))
    }
}

impl From<StreamTarget> for SocketAddr {
    fn from(target: StreamTarget) -> SocketAddr {
        target.0
    }
}

impl Serialize for StreamTarget {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut display: heapless::String<30> = heapless::String::new();
        // Note(unwrap): a socket address always fits the display buffer.
        write!(&mut display, "{}", self.0).unwrap();
        serializer.serialize_str(&display)
    }
}

impl core::str::FromStr for StreamTarget {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr = SocketAddr::from_str(s)
            .map_err(|_| "Invalid socket address format")?;
        Ok(Self(addr))
    }
}
