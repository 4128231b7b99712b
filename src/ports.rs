use embedded_hal::digital::OutputPin;

use crate::branch::{Branch, BranchError};
use crate::bus::{I2cBus, SpiBus};
use crate::regfile::{PortRegs, RegisterFile};
use crate::registry::{BranchId, Registry, RegistryError};

enum Op {
    Configure,
    Pull,
    Push,
    Exchange,
}

/// The virtual-port subsystem: register file, branch registry and the
/// dispatch entry points the pin-API layer calls into.
///
/// `BRANCHES` bounds the number of live branches, `PORTS` the number of
/// 8-pin ranges in the register file.  The whole subsystem is an
/// explicitly owned value; independent instances can coexist (useful for
/// tests and for devices acting as both client and server).
///
/// All dispatch is silent on ports nobody claimed and while the
/// subsystem has not been started, so native pins can share the same
/// entry points without special-casing.
pub struct VirtualPorts<SPI, EN, I2C, const BRANCHES: usize, const PORTS: usize> {
    regs: RegisterFile<PORTS>,
    registry: Registry<Branch<SPI, EN, I2C>, BRANCHES, PORTS>,
    running: bool,
}

impl<SPI, EN, I2C, const BRANCHES: usize, const PORTS: usize>
    VirtualPorts<SPI, EN, I2C, BRANCHES, PORTS>
{
    pub fn new() -> Self {
        Self {
            regs: RegisterFile::new(),
            registry: Registry::new(),
            running: false,
        }
    }

    /// Start the subsystem: zero-initialize the register file and mark
    /// the dispatch layer active.
    pub fn begin(&mut self) {
        self.regs.clear();
        self.running = true;
        log::debug!("virtual ports started ({} ranges)", PORTS);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Claim ports `[start_port, start_port + size)` for `branch`.
    pub fn register(
        &mut self,
        start_port: u8,
        size: u8,
        branch: Branch<SPI, EN, I2C>,
    ) -> Result<BranchId, RegistryError> {
        self.registry.register(start_port, size, branch)
    }

    /// Release a branch, returning it so its transports can be recovered.
    pub fn unregister(&mut self, id: BranchId) -> Option<Branch<SPI, EN, I2C>> {
        self.registry.unregister(id)
    }

    /// Branch owning `port`, or `None` for native/unclaimed ports.
    pub fn resolve(&self, port: u8) -> Option<BranchId> {
        self.registry.resolve(port)
    }

    /// Registers of one range, for staging mode/output bytes and reading
    /// input bytes from the pin-API layer.
    pub fn port_regs(&self, port: u8) -> Option<&PortRegs> {
        self.regs.port(port)
    }

    pub fn port_regs_mut(&mut self, port: u8) -> Option<&mut PortRegs> {
        self.regs.port_mut(port)
    }
}

impl<SPI, EN, I2C, const BRANCHES: usize, const PORTS: usize>
    VirtualPorts<SPI, EN, I2C, BRANCHES, PORTS>
where
    SPI: SpiBus,
    EN: OutputPin,
    I2C: I2cBus,
{
    fn dispatch(&mut self, port: u8, op: Op) -> Result<(), BranchError<SPI, EN, I2C>> {
        if !self.running {
            return Ok(());
        }
        let Some(id) = self.registry.resolve(port) else {
            return Ok(());
        };
        let Some((start, size, branch)) = self.registry.slot_mut(id) else {
            return Ok(());
        };
        let Some(range) = self.regs.range_mut(start, size) else {
            return Ok(());
        };
        match op {
            Op::Configure => branch.configure(range),
            Op::Pull => branch.pull(range),
            Op::Push => branch.push(range),
            Op::Exchange => branch.exchange(range),
        }
    }

    /// Push the mode bytes of `port`'s owning range to its medium.
    pub fn configure(&mut self, port: u8) -> Result<(), BranchError<SPI, EN, I2C>> {
        self.dispatch(port, Op::Configure)
    }

    /// Refresh the input bytes of `port`'s owning range from its medium.
    pub fn pull(&mut self, port: u8) -> Result<(), BranchError<SPI, EN, I2C>> {
        self.dispatch(port, Op::Pull)
    }

    /// Send the output bytes of `port`'s owning range to its medium.
    pub fn push(&mut self, port: u8) -> Result<(), BranchError<SPI, EN, I2C>> {
        self.dispatch(port, Op::Push)
    }

    /// Pull and push `port`'s owning range in one transaction.
    pub fn exchange(&mut self, port: u8) -> Result<(), BranchError<SPI, EN, I2C>> {
        self.dispatch(port, Op::Exchange)
    }
}

impl<SPI, EN, I2C, const BRANCHES: usize, const PORTS: usize> Default
    for VirtualPorts<SPI, EN, I2C, BRANCHES, PORTS>
{
    fn default() -> Self {
        Self::new()
    }
}
