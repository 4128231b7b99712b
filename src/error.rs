use crate::proto::ProtocolError;
use crate::registry::RegistryError;

/// Error of a virtual-port operation.
///
/// The transport variants wrap whatever error the underlying
/// `embedded-hal` implementation produces.  A failed transaction is not
/// retried and register-file bytes already written are not rolled back;
/// the caller decides what to do with the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<SpiE, PinE, BusE> {
    /// Full-duplex transfer to a shift-register chain failed.
    Spi(SpiE),
    /// Toggling the strobe pin failed.
    Strobe(PinE),
    /// Bus transaction to an expander or peer device failed.
    Bus(BusE),
    /// Branch registration was rejected.
    Registry(RegistryError),
    /// A wire frame could not be decoded.
    Protocol(ProtocolError),
}

impl<SpiE, PinE, BusE> From<RegistryError> for Error<SpiE, PinE, BusE> {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl<SpiE, PinE, BusE> From<ProtocolError> for Error<SpiE, PinE, BusE> {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}
