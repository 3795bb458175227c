//! Change tracing for the CPU.
//!
//! You would typically access an observer via the [`Cpu::observer`] field.
//! The observer records what the last [`Cpu::run`] (or [`Cpu::step`]) did:
//! which registers changed, and which memory locations were read or written.
//! It is cleared at the start of every run.
//!
//! [`Cpu::observer`]: crate::sim::Cpu::observer
//! [`Cpu::run`]: crate::sim::Cpu::run
//! [`Cpu::step`]: crate::sim::Cpu::step

use std::collections::BTreeMap;

use crate::ast::Reg;
use super::mem::RegFile;

/// The set of accesses which have occurred at a memory location.
///
/// ## Example
///
/// ```
/// # use anna_ensemble::sim::observer::AccessSet;
///
/// let accesses = AccessSet::READ;
/// assert!(accesses.accessed());
/// assert!(accesses.read());
/// assert!(!accesses.written());
/// assert!(!accesses.modified());
/// ```
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct AccessSet(u8);
impl AccessSet {
    /// Set with only the read flag enabled.
    pub const READ: Self = Self(1 << 0);
    /// Set with only the write flag enabled.
    pub const WRITTEN: Self = Self(1 << 1);
    /// Set with only the modify flag enabled.
    pub const MODIFIED: Self = Self(1 << 2);

    /// True if any access has occurred.
    pub fn accessed(&self) -> bool {
        self.0 != 0
    }

    /// True if a read (`lw`) has occurred.
    pub fn read(&self) -> bool {
        self.0 & Self::READ.0 != 0
    }
    /// True if a write (`sw`) has occurred (does not necessarily have to change data).
    pub fn written(&self) -> bool {
        self.0 & Self::WRITTEN.0 != 0
    }
    /// True if a write has occurred that changed the data.
    pub fn modified(&self) -> bool {
        self.0 & Self::MODIFIED.0 != 0
    }
}
impl std::ops::BitOr for AccessSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}
impl std::ops::BitOrAssign for AccessSet {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}
impl std::fmt::Debug for AccessSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessSet")
            .field("read", &self.read())
            .field("written", &self.written())
            .field("modified", &self.modified())
            .finish()
    }
}

/// A struct that tracks the registers and memory changed by a run.
#[derive(Debug, Default)]
pub struct ChangeObserver {
    /// Bit `n` is set if register `rn` changed.
    regs: u8,
    mem: BTreeMap<u16, AccessSet>
}
impl ChangeObserver {
    /// Creates a new, empty observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all recorded changes.
    pub fn clear(&mut self) {
        std::mem::take(self);
    }

    /// Records every register that differs between two register files.
    pub fn update_regs(&mut self, before: &RegFile, after: &RegFile) {
        for (i, (b, a)) in before.iter().zip(after.iter()).enumerate() {
            if a != b {
                self.regs |= 1 << i;
            }
        }
    }

    /// Whether the register changed.
    pub fn reg_changed(&self, reg: Reg) -> bool {
        self.regs & (1 << reg.reg_no()) != 0
    }

    /// Iterates over the registers that changed, in increasing order.
    pub fn changed_regs(&self) -> impl Iterator<Item = Reg> + '_ {
        (0..8u8)
            .filter_map(|n| Reg::try_from(n).ok())
            .filter(|&r| self.reg_changed(r))
    }

    /// Gets the access set for the given memory location.
    pub fn get_mem_accesses(&self, addr: u16) -> AccessSet {
        self.mem.get(&addr).copied().unwrap_or_default()
    }

    /// Adds new flags to the access set for the given memory location.
    pub fn update_mem_accesses(&mut self, addr: u16, set: AccessSet) {
        *self.mem.entry(addr).or_default() |= set;
    }

    /// Iterates over every memory access recorded, sorted in address order.
    pub fn mem_accesses(&self) -> impl Iterator<Item = (u16, AccessSet)> + '_ {
        self.mem.iter().map(|(&addr, &set)| (addr, set))
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessSet, ChangeObserver};
    use crate::ast::reg_consts::{R1, R2, R5};
    use crate::sim::mem::{RegFile, Word};

    #[test]
    fn test_regs() {
        let before = RegFile::new();
        let mut after = before.clone();
        after.set(R2, Word::new(1));
        after.set(R5, Word::new(9));

        let mut obs = ChangeObserver::new();
        obs.update_regs(&before, &after);
        assert!(obs.reg_changed(R2));
        assert!(!obs.reg_changed(R1));
        assert_eq!(obs.changed_regs().collect::<Vec<_>>(), [R2, R5]);

        obs.clear();
        assert_eq!(obs.changed_regs().count(), 0);
    }

    #[test]
    fn test_mem() {
        let mut obs = ChangeObserver::new();
        obs.update_mem_accesses(0x20, AccessSet::WRITTEN);
        obs.update_mem_accesses(0x10, AccessSet::READ);
        obs.update_mem_accesses(0x20, AccessSet::MODIFIED);

        let set = obs.get_mem_accesses(0x20);
        assert!(set.written() && set.modified() && !set.read());
        assert!(!obs.get_mem_accesses(0x30).accessed());
        assert_eq!(
            obs.mem_accesses().map(|(a, _)| a).collect::<Vec<_>>(),
            [0x10, 0x20]
        );
    }
}
