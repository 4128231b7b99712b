//! Wire protocol spoken between [`RemoteBus`](crate::RemoteBus) and
//! [`PortServer`](crate::PortServer).
//!
//! Every transaction starts with a single header byte encoding the
//! peer-side range index and an opcode in the two low bits.  `Configure`
//! and `Write` frames carry one payload byte per covered 8-pin group;
//! `Read` carries no payload and elicits exactly one reply byte.

/// Maximum number of 8-pin groups a single branch may span.
///
/// Bounds the payload of a wire frame and therefore also the range size
/// accepted by [`Registry::register`](crate::Registry::register).
pub const MAX_RANGE_PORTS: usize = 8;

/// Capacity of a wire frame: header byte plus payload.
pub(crate) const FRAME_CAP: usize = MAX_RANGE_PORTS + 1;

/// Operation requested by a wire frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Payload bytes are mode bytes for the addressed range(s).
    Configure = 0b00,
    /// Payload bytes are output bytes for the addressed range(s).
    Write = 0b01,
    /// No payload; the peer replies with one input byte.
    Read = 0b10,
}

/// Failure to decode an incoming frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame did not contain a header byte.
    ShortFrame,
    /// The header carried the reserved opcode `0b11`.
    InvalidOpcode(u8),
    /// The addressed range lies beyond this device's register file.
    PortOutOfRange(u8),
}

/// Decoded header byte: `(port << 2) | opcode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Range index on the device receiving the frame.
    pub port: u8,
    pub op: Opcode,
}

impl Header {
    pub fn new(port: u8, op: Opcode) -> Self {
        Self { port, op }
    }

    pub fn encode(self) -> u8 {
        (self.port << 2) | self.op as u8
    }

    pub fn decode(byte: u8) -> Result<Self, ProtocolError> {
        let op = match byte & 0b11 {
            0b00 => Opcode::Configure,
            0b01 => Opcode::Write,
            0b10 => Opcode::Read,
            op => return Err(ProtocolError::InvalidOpcode(op)),
        };
        Ok(Self {
            port: byte >> 2,
            op,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_codec() {
        let h = Header::new(5, Opcode::Write);
        assert_eq!(h.encode(), 0b10101);
        assert_eq!(Header::decode(0b10101), Ok(h));

        assert_eq!(
            Header::decode(0b1000),
            Ok(Header::new(2, Opcode::Configure))
        );
        assert_eq!(Header::decode(0b110), Ok(Header::new(1, Opcode::Read)));
    }

    #[test]
    fn reserved_opcode_rejected() {
        assert_eq!(
            Header::decode(0b111),
            Err(ProtocolError::InvalidOpcode(0b11))
        );
    }
}
