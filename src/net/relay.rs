//! Function-generator command relay.
//!
//! Short command lines arrive as UDP datagrams on the control port and are
//! forwarded verbatim to the function generator's UART, newline-terminated.
//! The relay is an independent side service: it shares no state with the
//! sample pipeline and both directions are best effort.

use embedded_io::Write;
use embedded_nal::{nb, UdpFullStack};

use crate::design_parameters::{COMMAND_CAPACITY, CONTROL_PORT};

/// UDP-to-UART relay for function-generator commands.
pub struct CommandRelay<N: UdpFullStack, U: Write> {
    stack: N,
    socket: Option<N::UdpSocket>,
    uart: U,
}

impl<N: UdpFullStack, U: Write> CommandRelay<N, U> {
    pub fn new(stack: N, uart: U) -> Self {
        Self {
            stack,
            socket: None,
            uart,
        }
    }

    /// Open the control socket, replacing any previous one.
    pub fn bind(&mut self) -> Result<(), N::Error> {
        if let Some(socket) = self.socket.take() {
            self.stack.close(socket).ok();
        }

        let mut socket = self.stack.socket()?;
        match self.stack.bind(&mut socket, CONTROL_PORT) {
            Ok(()) => {
                log::info!("Command relay listening on {}", CONTROL_PORT);
                self.socket.replace(socket);
                Ok(())
            }
            Err(err) => {
                self.stack.close(socket).ok();
                Err(err)
            }
        }
    }

    /// Forward all pending command datagrams to the UART.
    ///
    /// Foreground context. Lines longer than [COMMAND_CAPACITY] bytes are
    /// truncated; a line not already ending in `\n` or `\r` gets a newline
    /// appended. UART errors are ignored.
    pub fn process(&mut self) {
        let Some(socket) = self.socket.as_mut() else {
            return;
        };

        let mut line = [0u8; COMMAND_CAPACITY + 1];
        loop {
            let received = match self
                .stack
                .receive(socket, &mut line[..COMMAND_CAPACITY])
            {
                Ok((received, _source)) => received,
                Err(nb::Error::WouldBlock) => return,
                Err(nb::Error::Other(err)) => {
                    log::warn!("Command receive failed: {:?}", err);
                    return;
                }
            };
            if received == 0 {
                continue;
            }

            let mut len = received.min(COMMAND_CAPACITY);
            if line[len - 1] != b'\n' && line[len - 1] != b'\r' {
                line[len] = b'\n';
                len += 1;
            }

            self.uart.write_all(&line[..len]).ok();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::convert::Infallible;
    use embedded_nal::{IpAddr, Ipv4Addr, SocketAddr, UdpClientStack};
    use std::collections::VecDeque;
    use std::vec::Vec;

    #[derive(Default)]
    struct FakeStack {
        pending: VecDeque<Vec<u8>>,
        bound_port: Option<u16>,
    }

    impl UdpClientStack for FakeStack {
        type UdpSocket = ();
        type Error = ();

        fn socket(&mut self) -> Result<(), ()> {
            Ok(())
        }

        fn connect(
            &mut self,
            _socket: &mut (),
            _remote: SocketAddr,
        ) -> Result<(), ()> {
            Ok(())
        }

        fn send(&mut self, _socket: &mut (), _data: &[u8]) -> nb::Result<(), ()> {
            Ok(())
        }

        fn receive(
            &mut self,
            _socket: &mut (),
            buffer: &mut [u8],
        ) -> nb::Result<(usize, SocketAddr), ()> {
            let datagram = self.pending.pop_front().ok_or(nb::Error::WouldBlock)?;
            let len = datagram.len().min(buffer.len());
            buffer[..len].copy_from_slice(&datagram[..len]);
            let source =
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000);
            Ok((len, source))
        }

        fn close(&mut self, _socket: ()) -> Result<(), ()> {
            Ok(())
        }
    }

    impl UdpFullStack for FakeStack {
        fn bind(&mut self, _socket: &mut (), port: u16) -> Result<(), ()> {
            self.bound_port = Some(port);
            Ok(())
        }

        fn send_to(
            &mut self,
            _socket: &mut (),
            _remote: SocketAddr,
            _data: &[u8],
        ) -> nb::Result<(), ()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeUart(Vec<u8>);

    impl embedded_io::ErrorType for &mut FakeUart {
        type Error = Infallible;
    }

    impl Write for &mut FakeUart {
        fn write(&mut self, data: &[u8]) -> Result<usize, Infallible> {
            self.0.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    fn relay_with<'a>(
        datagrams: &[&[u8]],
        uart: &'a mut FakeUart,
    ) -> CommandRelay<FakeStack, &'a mut FakeUart> {
        let mut stack = FakeStack::default();
        for datagram in datagrams {
            stack.pending.push_back(datagram.to_vec());
        }
        let mut relay = CommandRelay::new(stack, uart);
        relay.bind().unwrap();
        relay
    }

    #[test]
    fn appends_newline_when_missing() {
        let mut uart = FakeUart::default();
        let mut relay = relay_with(&[b"freq 1000"], &mut uart);
        relay.process();
        drop(relay);
        assert_eq!(uart.0, b"freq 1000\n");
    }

    #[test]
    fn preserves_existing_line_termination() {
        let mut uart = FakeUart::default();
        let mut relay = relay_with(&[b"freq 1000\n", b"ampl 2.5\r"], &mut uart);
        relay.process();
        drop(relay);
        assert_eq!(uart.0, b"freq 1000\nampl 2.5\r");
    }

    #[test]
    fn truncates_oversized_commands() {
        let long = [b'x'; 200];
        let mut uart = FakeUart::default();
        let mut relay = relay_with(&[&long], &mut uart);
        relay.process();
        drop(relay);
        assert_eq!(uart.0.len(), COMMAND_CAPACITY + 1);
        assert_eq!(uart.0[COMMAND_CAPACITY], b'\n');
    }

    #[test]
    fn skips_empty_datagrams() {
        let mut uart = FakeUart::default();
        let mut relay = relay_with(&[b"", b"on"], &mut uart);
        relay.process();
        drop(relay);
        assert_eq!(uart.0, b"on\n");
    }

    #[test]
    fn bind_uses_the_control_port() {
        let mut uart = FakeUart::default();
        let relay = relay_with(&[], &mut uart);
        assert_eq!(relay.stack.bound_port, Some(CONTROL_PORT));
    }
}
