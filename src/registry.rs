use crate::proto::MAX_RANGE_PORTS;

/// Identifier of a live branch slot, handed out by [`Registry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchId(u8);

impl BranchId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Rejection reasons for [`Registry::register`].
///
/// A rejected registration never mutates the lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// All `BRANCHES` slots are occupied.
    Full,
    /// The range is empty or extends beyond the register file.
    OutOfRange,
    /// The range overlaps one owned by a live branch.
    Overlap,
    /// The range spans more groups than [`MAX_RANGE_PORTS`].
    RangeTooLarge,
}

struct Slot<B> {
    start_port: u8,
    size: u8,
    branch: B,
}

/// Fixed-capacity arena of branch slots plus an O(1) port lookup table.
///
/// At most `BRANCHES` branches can be live at a time; free slots are
/// found by scanning, no allocation takes place.  The lookup table maps
/// every port index to its owning branch and is kept consistent with
/// slot liveness on every register/unregister.
pub struct Registry<B, const BRANCHES: usize, const PORTS: usize> {
    slots: [Option<Slot<B>>; BRANCHES],
    port_to_branch: [Option<BranchId>; PORTS],
}

impl<B, const BRANCHES: usize, const PORTS: usize> Registry<B, BRANCHES, PORTS> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            port_to_branch: [None; PORTS],
        }
    }

    /// Claim the ports `[start_port, start_port + size)` for `branch`.
    ///
    /// Scans for a free slot and updates the lookup table for every
    /// claimed port.  Fails with [`RegistryError::Full`] when all slots
    /// are occupied.
    pub fn register(
        &mut self,
        start_port: u8,
        size: u8,
        branch: B,
    ) -> Result<BranchId, RegistryError> {
        let start = start_port as usize;
        let end = start + size as usize;
        if size == 0 || end > PORTS {
            return Err(RegistryError::OutOfRange);
        }
        if size as usize > MAX_RANGE_PORTS {
            return Err(RegistryError::RangeTooLarge);
        }
        if self.port_to_branch[start..end].iter().any(Option::is_some) {
            return Err(RegistryError::Overlap);
        }
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(RegistryError::Full)?;
        let id = BranchId(slot as u8);
        self.slots[slot] = Some(Slot {
            start_port,
            size,
            branch,
        });
        for entry in &mut self.port_to_branch[start..end] {
            *entry = Some(id);
        }
        log::debug!("branch {}: claimed ports {}..{}", slot, start, end);
        Ok(id)
    }

    /// Release slot `id` and reset its lookup entries.
    ///
    /// Returns the branch so its transports can be recovered.  Idempotent
    /// on an already-empty slot.
    pub fn unregister(&mut self, id: BranchId) -> Option<B> {
        let slot = self.slots.get_mut(id.index())?.take()?;
        let start = slot.start_port as usize;
        for entry in &mut self.port_to_branch[start..start + slot.size as usize] {
            *entry = None;
        }
        log::debug!("branch {}: released", id.index());
        Some(slot.branch)
    }

    /// Branch owning `port`, or `None` for uncovered ports.
    pub fn resolve(&self, port: u8) -> Option<BranchId> {
        self.port_to_branch.get(port as usize).copied().flatten()
    }

    pub(crate) fn slot_mut(&mut self, id: BranchId) -> Option<(u8, u8, &mut B)> {
        self.slots
            .get_mut(id.index())?
            .as_mut()
            .map(|s| (s.start_port, s.size, &mut s.branch))
    }
}

impl<B, const BRANCHES: usize, const PORTS: usize> Default for Registry<B, BRANCHES, PORTS> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_resolve() {
        let mut reg: Registry<&str, 4, 8> = Registry::new();
        let id = reg.register(2, 3, "chain").unwrap();
        for p in 2..5 {
            assert_eq!(reg.resolve(p), Some(id));
        }
        assert_eq!(reg.resolve(0), None);
        assert_eq!(reg.resolve(5), None);
        assert_eq!(reg.resolve(200), None);
    }

    #[test]
    fn unregister_releases_ports_and_slot() {
        let mut reg: Registry<u8, 2, 8> = Registry::new();
        let id = reg.register(0, 2, 1).unwrap();
        assert_eq!(reg.unregister(id), Some(1));
        for p in 0..2 {
            assert_eq!(reg.resolve(p), None);
        }
        // idempotent on the emptied slot
        assert_eq!(reg.unregister(id), None);
        // the slot is free for reuse
        let id2 = reg.register(4, 1, 2).unwrap();
        assert_eq!(id2, id);
    }

    #[test]
    fn exhaustion_is_deterministic() {
        let mut reg: Registry<u8, 2, 8> = Registry::new();
        reg.register(0, 1, 1).unwrap();
        reg.register(1, 1, 2).unwrap();
        assert_eq!(reg.register(2, 1, 3), Err(RegistryError::Full));
        // the failed call must not have touched the lookup table
        assert_eq!(reg.resolve(2), None);
    }

    #[test]
    fn invalid_ranges_rejected() {
        let mut reg: Registry<u8, 4, 8> = Registry::new();
        assert_eq!(reg.register(0, 0, 1), Err(RegistryError::OutOfRange));
        assert_eq!(reg.register(7, 2, 1), Err(RegistryError::OutOfRange));
        assert_eq!(reg.register(0, 9, 1), Err(RegistryError::OutOfRange));

        reg.register(1, 2, 1).unwrap();
        assert_eq!(reg.register(2, 1, 2), Err(RegistryError::Overlap));
        assert_eq!(reg.register(0, 2, 2), Err(RegistryError::Overlap));
        assert_eq!(reg.resolve(0), None);
    }

    #[test]
    fn oversized_range_rejected() {
        let mut reg: Registry<u8, 4, 32> = Registry::new();
        assert_eq!(reg.register(0, 9, 1), Err(RegistryError::RangeTooLarge));
        assert!(reg.register(0, 8, 1).is_ok());
    }
}
