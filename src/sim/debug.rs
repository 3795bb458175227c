//! Breakpoint management for the [`Cpu`].
//!
//! Breakpoints are stored in memory itself, as the out-of-band bit of each [`MachineCell`].
//!
//! [`MachineCell`]: super::mem::MachineCell

use super::Cpu;

impl Cpu {
    /// Sets a breakpoint at the given address.
    ///
    /// A run stops (with [`StopReason::Breakpoint`]) when the PC reaches this address,
    /// before the instruction there executes. Running again executes the instruction,
    /// so each visit to the address stops exactly once.
    ///
    /// ```
    /// use anna_ensemble::sim::{Cpu, StopReason};
    ///
    /// let mut cpu = Cpu::default();
    /// cpu.set_breakpoint(2);
    /// assert_eq!(cpu.run(10), Ok(StopReason::Breakpoint));
    /// assert_eq!(cpu.pc, 2);
    /// assert_eq!(cpu.run(10), Ok(StopReason::CyclesExceeded));
    /// assert_eq!(cpu.pc, 12);
    /// ```
    ///
    /// [`StopReason::Breakpoint`]: super::StopReason::Breakpoint
    pub fn set_breakpoint(&mut self, addr: u16) {
        self.mem.cell_mut(addr).set_breakpoint(true);
        tracing::trace!(addr, "set breakpoint");
    }

    /// Clears the breakpoint at the given address.
    ///
    /// This returns whether a breakpoint was set there.
    pub fn clear_breakpoint(&mut self, addr: u16) -> bool {
        let cell = self.mem.cell_mut(addr);
        let was_set = cell.breakpoint();
        cell.set_breakpoint(false);
        was_set
    }

    /// Toggles the breakpoint at the given address, returning whether it is now set.
    pub fn toggle_breakpoint(&mut self, addr: u16) -> bool {
        let cell = self.mem.cell_mut(addr);
        let on = !cell.breakpoint();
        cell.set_breakpoint(on);
        on
    }

    /// Clears every breakpoint.
    pub fn clear_breakpoints(&mut self) {
        // mem.len() <= 65536
        for addr in 0..self.mem.len() {
            self.mem.cell_mut(addr as u16).set_breakpoint(false);
        }
    }

    /// Iterates over the addresses with breakpoints, in increasing order.
    pub fn breakpoints(&self) -> impl Iterator<Item = u16> + '_ {
        self.mem.cells()
            .filter(|(_, cell)| cell.breakpoint())
            .map(|(addr, _)| addr)
    }
}
