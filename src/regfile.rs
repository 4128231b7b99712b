/// Mode, output and input byte of one 8-pin range.
///
/// The layout mirrors a hardware direction/output/input register
/// triplet: a `1` bit in `mode` configures the pin as output.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortRegs {
    /// Direction byte, `1` = output.
    pub mode: u8,
    /// Value driven on pins configured as outputs.
    pub output: u8,
    /// Most recently acquired input state.
    pub input: u8,
}

/// Fixed-size register file holding [`PortRegs`] for `PORTS` ranges.
///
/// The size is fixed at configuration time and never changes.  All
/// access is validated against `PORTS`, there is no way to reach a byte
/// outside the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile<const PORTS: usize> {
    ports: [PortRegs; PORTS],
}

impl<const PORTS: usize> RegisterFile<PORTS> {
    pub fn new() -> Self {
        Self {
            ports: [PortRegs::default(); PORTS],
        }
    }

    /// Reset all mode, output and input bytes to zero.
    pub fn clear(&mut self) {
        self.ports = [PortRegs::default(); PORTS];
    }

    pub fn port(&self, port: u8) -> Option<&PortRegs> {
        self.ports.get(port as usize)
    }

    pub fn port_mut(&mut self, port: u8) -> Option<&mut PortRegs> {
        self.ports.get_mut(port as usize)
    }

    /// Registers of the `size` consecutive ranges starting at `start`.
    pub fn range(&self, start: u8, size: u8) -> Option<&[PortRegs]> {
        let start = start as usize;
        let end = start.checked_add(size as usize)?;
        self.ports.get(start..end)
    }

    pub fn range_mut(&mut self, start: u8, size: u8) -> Option<&mut [PortRegs]> {
        let start = start as usize;
        let end = start.checked_add(size as usize)?;
        self.ports.get_mut(start..end)
    }
}

impl<const PORTS: usize> Default for RegisterFile<PORTS> {
    fn default() -> Self {
        Self::new()
    }
}
