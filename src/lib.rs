//! Transparent virtualization of digital pins.
//!
//! A fixed-size register file holds a mode/output/input byte triplet per
//! 8-pin range.  Ranges are claimed by *branches*, transport strategies
//! which know how to move their range's bytes over a physical medium:
//! daisy-chained shift registers on a full-duplex SPI bus, a write-only
//! bus-attached expander, or a peer device running [`PortServer`] at the
//! far end of a two-wire bus.  Client code keeps calling the usual
//! mode/read/write pin operations; only the pin numbers differ.
//!
//! The pin-number to range mapping and the end-user pin API itself are
//! left to the integrating layer, which stages bytes through
//! [`VirtualPorts::port_regs_mut`] and invokes the dispatch entry points.
#![cfg_attr(not(test), no_std)]

mod branch;
mod bus;
mod error;
mod ports;
mod proto;
mod regfile;
mod registry;
mod server;

pub use branch::{Branch, IoMode, LocalBus, RemoteBus, ShiftRegister};
pub use bus::{I2cBus, SpiBus};
pub use error::Error;
pub use ports::VirtualPorts;
pub use proto::{Header, Opcode, ProtocolError, MAX_RANGE_PORTS};
pub use regfile::{PortRegs, RegisterFile};
pub use registry::{BranchId, Registry, RegistryError};
pub use server::PortServer;
