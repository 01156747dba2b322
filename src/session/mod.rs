//! Deterministic emulation session
//!
//! One [`Session`] owns one guest (core + bus) for its whole lifetime and
//! is the only thing that mutates it; a fuzz worker drives exactly one
//! session, strictly sequentially. Time inside the session is the
//! instruction counter: there is no wall-clock input anywhere on the
//! execution path, so replaying an input against a restored snapshot is
//! bit-exact.
//!
//! `run()` executes until the guest traps to the host (breakpoint hit,
//! sync-exit, halt, return-to-sentinel), faults, or exhausts the
//! per-iteration instruction budget. Guest faults come back as a
//! [`StopReason`] for the oracle; they are never host-side errors. Only
//! setup (see [`crate::firmware`]) can fail fatally.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::cpu::{Cpu, Fault, Step, NUM_REGS};
use crate::firmware::FirmwareImage;
use crate::memory::Bus;

/// Sentinel return address pushed by the direct-call channel. Unmapped on
/// purpose: the session stops the moment `pc` lands here, before a fetch
/// could fault.
pub const RETURN_LANDING: u32 = 0xFFFF_FFF0;

/// Default per-iteration instruction budget.
pub const DEFAULT_BUDGET: u64 = 1_000_000;

/// Why `run()` handed control back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Execution reached a breakpointed address.
    Breakpoint(u32),
    /// The guest executed SYC and is waiting on the host.
    SyncExit,
    /// The guest executed HLT.
    Halted,
    /// The guest returned from a direct-called entry point; carries the
    /// status value from r0.
    EntryReturn(u32),
    /// The guest faulted. The expected fuzzing signal, not an error.
    Fault(Fault),
    /// The iteration's instruction budget ran out.
    BudgetExhausted,
}

/// A restorable checkpoint of full guest state. ROM is immutable and lives
/// in the session, so the snapshot carries registers, RAM, and the disk
/// window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    regs: [u32; NUM_REGS],
    pc: u32,
    sp: u32,
    ram: Box<[u8]>,
    disk: Box<[u8]>,
}

/// A live guest instance.
#[derive(Debug)]
pub struct Session {
    pub core: Cpu,
    /// Execution breakpoints, checked before each fetch.
    pub breakpoints: HashSet<u32>,
    budget: u64,
    executed: u64,
    /// Address we are resuming from after a breakpoint stop; one
    /// instruction executes there before breakpoints re-arm.
    resume_pc: Option<u32>,
}

impl Session {
    /// Build a session around a validated firmware image, with an optional
    /// disk image attached in discard-on-exit mode.
    pub fn new(image: &FirmwareImage, disk: Option<&[u8]>) -> Self {
        let mut bus = Bus::new();
        bus.load_rom(&image.bytes);
        if let Some(disk) = disk {
            bus.load_disk(disk);
        }
        debug!(
            "session created: {} byte image, disk {}",
            image.bytes.len(),
            if disk.is_some() { "attached" } else { "absent" }
        );
        Self {
            core: Cpu::new(bus),
            breakpoints: HashSet::new(),
            budget: DEFAULT_BUDGET,
            executed: 0,
            resume_pc: None,
        }
    }

    /// Replace the per-iteration instruction budget.
    pub fn set_budget(&mut self, budget: u64) {
        self.budget = budget;
    }

    /// Instructions executed in the current iteration.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Run until the guest traps to the host, faults, or exhausts the
    /// budget. The budget spans the whole iteration: delivery-phase runs
    /// and the main run draw from the same counter until `restore()`.
    pub fn run(&mut self) -> StopReason {
        loop {
            let pc = self.core.pc;

            if pc == RETURN_LANDING {
                let status = self.core.r[0];
                debug!("stop: entry returned status {:#x}", status);
                return StopReason::EntryReturn(status);
            }

            if self.breakpoints.contains(&pc) && self.resume_pc != Some(pc) {
                self.resume_pc = Some(pc);
                debug!("stop: breakpoint at {:#010x}", pc);
                return StopReason::Breakpoint(pc);
            }

            if self.executed >= self.budget {
                debug!("stop: budget of {} instructions exhausted", self.budget);
                return StopReason::BudgetExhausted;
            }

            self.resume_pc = None;
            self.executed += 1;
            match self.core.step() {
                Step::Normal => {}
                Step::Halted => {
                    debug!("stop: guest halted at {:#010x}", pc);
                    return StopReason::Halted;
                }
                Step::SyncExit => {
                    debug!("stop: sync-exit at {:#010x}", pc);
                    return StopReason::SyncExit;
                }
                Step::Fault(fault) => {
                    debug!("stop: guest fault {:?}", fault);
                    return StopReason::Fault(fault);
                }
            }
        }
    }

    /// Checkpoint full guest state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            regs: self.core.r,
            pc: self.core.pc,
            sp: self.core.sp,
            ram: self.core.bus.ram.clone(),
            disk: self.core.bus.disk.clone(),
        }
    }

    /// Restore a checkpoint bit-exactly and start a fresh iteration: the
    /// instruction counter and breakpoint resume state reset. The
    /// breakpoint set itself survives, as it belongs to the channel, not
    /// the iteration.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.core.r = snapshot.regs;
        self.core.pc = snapshot.pc;
        self.core.sp = snapshot.sp;
        self.core.bus.ram.copy_from_slice(&snapshot.ram);
        self.core.bus.disk.copy_from_slice(&snapshot.disk);
        self.executed = 0;
        self.resume_pc = None;
    }

    /// Digest of all guest-observable state. Two sessions with equal
    /// digests are indistinguishable to the guest.
    pub fn state_digest(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.core.r.hash(&mut hasher);
        self.core.pc.hash(&mut hasher);
        self.core.sp.hash(&mut hasher);
        self.core.bus.ram.hash(&mut hasher);
        self.core.bus.disk.hash(&mut hasher);
        hasher.finish()
    }
}


#[cfg(test)]
mod tests_determinism;
