use embedded_hal::digital::OutputPin;
use heapless::Vec;

use crate::bus::{I2cBus, SpiBus};
use crate::error::Error;
use crate::proto::{Header, Opcode, FRAME_CAP};
use crate::regfile::PortRegs;

/// Error produced when dispatching to a [`Branch`].
pub type BranchError<SPI, EN, I2C> = Error<
    <SPI as SpiBus>::BusError,
    <EN as embedded_hal::digital::ErrorType>::Error,
    <I2C as I2cBus>::BusError,
>;

/// Addressing mode of a shift-register chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoMode {
    /// Output and input share the same physical line per bit.  Bits whose
    /// mode is set to output read back the last written output value, so
    /// read-modify-write idioms like pin toggling keep working.
    #[default]
    Compat,
    /// Output and input are independent physical pin sets under the same
    /// virtual pin numbers; the received byte is stored unmasked.
    Duplex,
}

/// Daisy-chain of shift registers on a full-duplex SPI bus.
///
/// A dedicated strobe pin latches data in and out of the chain.  The
/// registers have no mode concept; the range's mode bytes only matter as
/// the read-back mask in [`IoMode::Compat`].
pub struct ShiftRegister<SPI, EN> {
    spi: SPI,
    strobe: EN,
    io_mode: IoMode,
}

impl<SPI, EN> ShiftRegister<SPI, EN> {
    pub fn new(spi: SPI, strobe: EN) -> Self {
        Self {
            spi,
            strobe,
            io_mode: IoMode::Compat,
        }
    }

    pub fn with_io_mode(spi: SPI, strobe: EN, io_mode: IoMode) -> Self {
        Self {
            spi,
            strobe,
            io_mode,
        }
    }

    pub fn compat_mode(&mut self) {
        self.io_mode = IoMode::Compat;
    }

    pub fn duplex_mode(&mut self) {
        self.io_mode = IoMode::Duplex;
    }

    /// Recover the SPI bus and strobe pin.
    pub fn release(self) -> (SPI, EN) {
        (self.spi, self.strobe)
    }
}

impl<SPI: SpiBus, EN: OutputPin> ShiftRegister<SPI, EN> {
    fn pulse_strobe(&mut self) -> Result<(), EN::Error> {
        self.strobe.set_low()?;
        self.strobe.set_high()
    }

    /// Single atomic exchange: capture inputs, shift one byte out and one
    /// in per owned group, latch the new outputs.
    ///
    /// The last group's byte is clocked out first so that it ends up in
    /// the register farthest down the chain.
    pub(crate) fn exchange<BusE>(
        &mut self,
        regs: &mut [PortRegs],
    ) -> Result<(), Error<SPI::BusError, EN::Error, BusE>> {
        self.pulse_strobe().map_err(Error::Strobe)?;
        for r in regs.iter_mut().rev() {
            let mut buf = [r.output];
            self.spi
                .transfer_in_place(&mut buf)
                .map_err(|e| Error::Spi(e.into()))?;
            r.input = match self.io_mode {
                IoMode::Compat => (buf[0] & !r.mode) | (r.output & r.mode),
                IoMode::Duplex => buf[0],
            };
        }
        self.spi.flush().map_err(|e| Error::Spi(e.into()))?;
        self.pulse_strobe().map_err(Error::Strobe)?;
        Ok(())
    }
}

/// Write-only bus-attached expander at a fixed peer address.
pub struct LocalBus<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C> LocalBus<I2C> {
    pub fn new(i2c: I2C, addr: u8) -> Self {
        Self { i2c, addr }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2cBus> LocalBus<I2C> {
    /// One bus write carrying the range's output bytes.
    pub(crate) fn push<SpiE, PinE>(
        &mut self,
        regs: &[PortRegs],
    ) -> Result<(), Error<SpiE, PinE, I2C::BusError>> {
        // Range length is capped at registration, one byte per group.
        let mut frame: Vec<u8, FRAME_CAP> = Vec::new();
        for r in regs {
            frame.push(r.output).ok();
        }
        self.i2c
            .write(self.addr, &frame)
            .map_err(|e| Error::Bus(e.into()))
    }
}

/// Virtual range hosted on a peer device reachable over the bus.
///
/// The peer keeps its own register file, so the range index on the peer
/// is independent of the local one.  Each operation is its own bus
/// transaction; they are never batched.
pub struct RemoteBus<I2C> {
    i2c: I2C,
    addr: u8,
    peer_port: u8,
}

impl<I2C> RemoteBus<I2C> {
    pub fn new(i2c: I2C, addr: u8, peer_port: u8) -> Self {
        Self {
            i2c,
            addr,
            peer_port,
        }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2cBus> RemoteBus<I2C> {
    fn dispatch<SpiE, PinE>(
        &mut self,
        op: Opcode,
        payload: impl Iterator<Item = u8>,
    ) -> Result<(), Error<SpiE, PinE, I2C::BusError>> {
        let mut frame: Vec<u8, FRAME_CAP> = Vec::new();
        frame.push(Header::new(self.peer_port, op).encode()).ok();
        for byte in payload {
            frame.push(byte).ok();
        }
        self.i2c
            .write(self.addr, &frame)
            .map_err(|e| Error::Bus(e.into()))
    }

    pub(crate) fn configure<SpiE, PinE>(
        &mut self,
        regs: &[PortRegs],
    ) -> Result<(), Error<SpiE, PinE, I2C::BusError>> {
        self.dispatch(Opcode::Configure, regs.iter().map(|r| r.mode))
    }

    pub(crate) fn push<SpiE, PinE>(
        &mut self,
        regs: &[PortRegs],
    ) -> Result<(), Error<SpiE, PinE, I2C::BusError>> {
        self.dispatch(Opcode::Write, regs.iter().map(|r| r.output))
    }

    /// Header-only read message, then a one-byte read request whose reply
    /// lands in the range's input byte.
    pub(crate) fn pull<SpiE, PinE>(
        &mut self,
        regs: &mut [PortRegs],
    ) -> Result<(), Error<SpiE, PinE, I2C::BusError>> {
        self.dispatch(Opcode::Read, core::iter::empty())?;
        let mut buf = [0x00];
        self.i2c
            .read(self.addr, &mut buf)
            .map_err(|e| Error::Bus(e.into()))?;
        if let Some(r) = regs.first_mut() {
            r.input = buf[0];
        }
        Ok(())
    }
}

/// Transport strategy owning one contiguous range of virtual ports.
///
/// The variant set is closed on purpose: every dispatch operation
/// matches it exhaustively instead of going through dynamic dispatch.
pub enum Branch<SPI, EN, I2C> {
    /// Range backed by real processor pins; all operations are no-ops.
    Null,
    ShiftRegister(ShiftRegister<SPI, EN>),
    LocalBus(LocalBus<I2C>),
    RemoteBus(RemoteBus<I2C>),
}

impl<SPI, EN, I2C> Branch<SPI, EN, I2C>
where
    SPI: SpiBus,
    EN: OutputPin,
    I2C: I2cBus,
{
    /// Push the range's mode bytes to the medium, where it has a mode
    /// concept at all.
    pub(crate) fn configure(
        &mut self,
        regs: &mut [PortRegs],
    ) -> Result<(), BranchError<SPI, EN, I2C>> {
        match self {
            Branch::Null | Branch::ShiftRegister(_) | Branch::LocalBus(_) => Ok(()),
            Branch::RemoteBus(b) => b.configure(regs),
        }
    }

    /// Acquire fresh input data into the range's input bytes.
    pub(crate) fn pull(&mut self, regs: &mut [PortRegs]) -> Result<(), BranchError<SPI, EN, I2C>> {
        match self {
            Branch::Null => Ok(()),
            // SPI is full-duplex, reading always writes as well
            Branch::ShiftRegister(b) => b.exchange(regs),
            // no known input hardware for a write-only expander
            Branch::LocalBus(_) => Ok(()),
            Branch::RemoteBus(b) => b.pull(regs),
        }
    }

    /// Send the range's output bytes to the medium.
    pub(crate) fn push(&mut self, regs: &mut [PortRegs]) -> Result<(), BranchError<SPI, EN, I2C>> {
        match self {
            Branch::Null => Ok(()),
            Branch::ShiftRegister(b) => b.exchange(regs),
            Branch::LocalBus(b) => b.push(regs),
            Branch::RemoteBus(b) => b.push(regs),
        }
    }

    /// Pull and push as one transaction where the medium allows it, as
    /// pull-then-push otherwise.
    pub(crate) fn exchange(
        &mut self,
        regs: &mut [PortRegs],
    ) -> Result<(), BranchError<SPI, EN, I2C>> {
        match self {
            Branch::Null => Ok(()),
            Branch::ShiftRegister(b) => b.exchange(regs),
            Branch::LocalBus(b) => b.push(regs),
            Branch::RemoteBus(b) => {
                b.pull(regs)?;
                b.push(regs)
            }
        }
    }
}
