use embedded_hal::digital::OutputPin;

use crate::branch::BranchError;
use crate::bus::{I2cBus, SpiBus};
use crate::error::Error;
use crate::ports::VirtualPorts;
use crate::proto::{Header, Opcode, ProtocolError};

/// Responder side of the wire protocol, run on the device at the far end
/// of the bus.
///
/// The server owns its own [`VirtualPorts`] instance whose register file
/// is a staging buffer: an incoming `write` is stored and immediately
/// forwarded to the addressed range's local branch, an incoming read
/// request refreshes the range's input byte before replying.
///
/// Binding to a bus address and wiring the receive/request callbacks is
/// the job of the peripheral-mode bus driver; it calls [`on_receive`]
/// after a master write completes and [`on_request`] when the master
/// asks for a byte.  Both must return quickly and never open a reentrant
/// transaction back onto the same bus.
///
/// A read request that arrives before any write addresses **range 0**.
///
/// [`on_receive`]: Self::on_receive
/// [`on_request`]: Self::on_request
pub struct PortServer<SPI, EN, I2C, const BRANCHES: usize, const PORTS: usize> {
    ports: VirtualPorts<SPI, EN, I2C, BRANCHES, PORTS>,
    active_port: u8,
}

impl<SPI, EN, I2C, const BRANCHES: usize, const PORTS: usize>
    PortServer<SPI, EN, I2C, BRANCHES, PORTS>
{
    pub fn new(ports: VirtualPorts<SPI, EN, I2C, BRANCHES, PORTS>) -> Self {
        Self {
            ports,
            active_port: 0,
        }
    }

    pub fn ports(&self) -> &VirtualPorts<SPI, EN, I2C, BRANCHES, PORTS> {
        &self.ports
    }

    pub fn ports_mut(&mut self) -> &mut VirtualPorts<SPI, EN, I2C, BRANCHES, PORTS> {
        &mut self.ports
    }

    pub fn release(self) -> VirtualPorts<SPI, EN, I2C, BRANCHES, PORTS> {
        self.ports
    }
}

impl<SPI, EN, I2C, const BRANCHES: usize, const PORTS: usize>
    PortServer<SPI, EN, I2C, BRANCHES, PORTS>
where
    SPI: SpiBus,
    EN: OutputPin,
    I2C: I2cBus,
{
    /// Handle a completed incoming write transaction.
    ///
    /// The addressed range becomes the most recently addressed one.
    /// `configure` payloads land in the mode bytes, `write` payloads in
    /// the output bytes followed by a local `push()` so the change
    /// reaches hardware immediately.  `read` frames only select the
    /// range for the next [`on_request`](Self::on_request).
    pub fn on_receive(&mut self, frame: &[u8]) -> Result<(), BranchError<SPI, EN, I2C>> {
        let (&header, payload) = frame
            .split_first()
            .ok_or(Error::Protocol(ProtocolError::ShortFrame))?;
        let header = Header::decode(header)?;
        if header.port as usize >= PORTS {
            return Err(Error::Protocol(ProtocolError::PortOutOfRange(header.port)));
        }
        self.active_port = header.port;
        log::trace!("server rx: port {} op {:?}", header.port, header.op);
        match header.op {
            Opcode::Configure => self.store_payload(header.port, payload, header.op)?,
            Opcode::Write => {
                self.store_payload(header.port, payload, header.op)?;
                self.ports.push(header.port)?;
            }
            Opcode::Read => {}
        }
        Ok(())
    }

    /// Answer a read request with the selected range's input byte,
    /// refreshed from hardware first.
    pub fn on_request(&mut self) -> Result<u8, BranchError<SPI, EN, I2C>> {
        log::trace!("server req: port {}", self.active_port);
        self.ports.pull(self.active_port)?;
        Ok(self
            .ports
            .port_regs(self.active_port)
            .map(|r| r.input)
            .unwrap_or(0))
    }

    fn store_payload(
        &mut self,
        start: u8,
        payload: &[u8],
        op: Opcode,
    ) -> Result<(), BranchError<SPI, EN, I2C>> {
        for (n, &byte) in payload.iter().enumerate() {
            let port = start as usize + n;
            let Some(regs) = u8::try_from(port)
                .ok()
                .and_then(|p| self.ports.port_regs_mut(p))
            else {
                return Err(Error::Protocol(ProtocolError::PortOutOfRange(
                    port.min(u8::MAX as usize) as u8,
                )));
            };
            match op {
                Opcode::Configure => regs.mode = byte,
                _ => regs.output = byte,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Branch, ShiftRegister, VirtualPorts};
    use embedded_hal_mock::eh1::digital as mock_pin;
    use embedded_hal_mock::eh1::i2c as mock_i2c;
    use embedded_hal_mock::eh1::spi as mock_spi;

    type TestPorts = VirtualPorts<mock_spi::Mock<u8>, mock_pin::Mock, mock_i2c::Mock, 4, 2>;
    type TestServer = PortServer<mock_spi::Mock<u8>, mock_pin::Mock, mock_i2c::Mock, 4, 2>;

    fn strobe_pulse() -> [mock_pin::Transaction; 2] {
        [
            mock_pin::Transaction::set(mock_pin::State::Low),
            mock_pin::Transaction::set(mock_pin::State::High),
        ]
    }

    #[test]
    fn configure_write_read_round_trip() {
        // write 0xAA forwards to the chain and captures 0x55; the read
        // request refreshes again and the line now shows 0x5A
        let spi_expectations = [
            mock_spi::Transaction::transfer_in_place(vec![0xAA], vec![0x55]),
            mock_spi::Transaction::flush(),
            mock_spi::Transaction::transfer_in_place(vec![0xAA], vec![0x5A]),
            mock_spi::Transaction::flush(),
        ];
        let mut pin_expectations = vec![];
        for _ in 0..4 {
            pin_expectations.extend(strobe_pulse());
        }
        let mut spi = mock_spi::Mock::new(&spi_expectations);
        let mut strobe = mock_pin::Mock::new(&pin_expectations);

        let mut ports = TestPorts::new();
        ports
            .register(
                0,
                1,
                Branch::ShiftRegister(ShiftRegister::new(spi.clone(), strobe.clone())),
            )
            .unwrap();
        ports.begin();
        let mut server = TestServer::new(ports);

        // configure range 0 as all-input, then write 0xAA to its outputs
        server.on_receive(&[0b0000, 0x00]).ok().unwrap();
        server.on_receive(&[0b0001, 0xAA]).ok().unwrap();
        assert_eq!(server.ports().port_regs(0).unwrap().output, 0xAA);
        assert_eq!(server.ports().port_regs(0).unwrap().input, 0x55);

        // the reply is the refreshed input byte, not the raw 0xAA
        let reply = server.on_request().ok().unwrap();
        assert_eq!(reply, 0x5A);

        spi.done();
        strobe.done();
    }

    #[test]
    fn read_header_selects_range() {
        let spi_expectations = [
            mock_spi::Transaction::transfer_in_place(vec![0x00], vec![0x0F]),
            mock_spi::Transaction::flush(),
        ];
        let mut pin_expectations = vec![];
        for _ in 0..2 {
            pin_expectations.extend(strobe_pulse());
        }
        let mut spi = mock_spi::Mock::new(&spi_expectations);
        let mut strobe = mock_pin::Mock::new(&pin_expectations);

        let mut ports = TestPorts::new();
        ports
            .register(
                1,
                1,
                Branch::ShiftRegister(ShiftRegister::new(spi.clone(), strobe.clone())),
            )
            .unwrap();
        ports.begin();
        let mut server = TestServer::new(ports);

        // header-only read frame for range 1, no payload, no push
        server.on_receive(&[0b0110]).ok().unwrap();
        assert_eq!(server.on_request().ok().unwrap(), 0x0F);

        spi.done();
        strobe.done();
    }

    #[test]
    fn request_without_prior_write_reads_range_zero() {
        // range 0 is unclaimed: pull is a no-op and the reply is the
        // zero-initialized input byte
        let ports = {
            let mut p = TestPorts::new();
            p.begin();
            p
        };
        let mut server = TestServer::new(ports);
        assert_eq!(server.on_request().ok().unwrap(), 0x00);
    }

    #[test]
    fn malformed_frames_rejected() {
        let mut ports = TestPorts::new();
        ports.begin();
        let mut server = TestServer::new(ports);

        assert!(matches!(
            server.on_receive(&[]),
            Err(Error::Protocol(ProtocolError::ShortFrame))
        ));
        assert!(matches!(
            server.on_receive(&[0b0011]),
            Err(Error::Protocol(ProtocolError::InvalidOpcode(0b11)))
        ));
        // range 5 does not exist on a 2-range server
        assert!(matches!(
            server.on_receive(&[0b10101]),
            Err(Error::Protocol(ProtocolError::PortOutOfRange(5)))
        ));
        // an out-of-range frame must not move the selection
        assert_eq!(server.on_request().ok().unwrap(), 0x00);
        // payload spilling past the register file
        assert!(matches!(
            server.on_receive(&[0b0100, 0x01, 0x02]),
            Err(Error::Protocol(ProtocolError::PortOutOfRange(2)))
        ));
    }
}
