//! Input channels
//!
//! Three ways a candidate byte buffer crosses from the host into guest
//! memory, one interface. A channel is chosen once when the harness is
//! built and never switched within a session:
//!
//! - [`DirectCall`] writes the buffer at the pre-agreed address and forges
//!   a call into the entry point. Cheapest, needs the entry and buffer
//!   addresses exported at build time.
//! - [`BreakpointTrap`] lets the guest boot normally, breakpoints the entry
//!   point, and injects the buffer and argument registers when the guest
//!   arrives there on its own. Needs only the entry symbol.
//! - [`SyncExit`] waits for the guest to request input with a SYC trap and
//!   writes the buffer where the guest asked for it (`r0` = destination,
//!   `r1` = capacity). The most cooperative and least ambiguous variant.
//!
//! Whatever the channel, the guest ABI is the same: `r0` = buffer pointer,
//! `r1` = length on entry, status back in `r0`. Delivery never changes
//! crash semantics, only transport.

use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::cpu::Fault;
use crate::firmware::FirmwareLayout;
use crate::session::{Session, StopReason, RETURN_LANDING};

/// Build-time channel selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    DirectCall,
    BreakpointTrap,
    SyncExit,
}

/// Why delivery could not complete. The harness maps budget exhaustion and
/// unexpected stops to a Timeout verdict and guest faults to Objective;
/// none of these are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The guest never reached the expected trap/address in budget.
    BudgetExhausted,
    /// The guest stopped some other way before delivery could happen.
    UnexpectedStop(StopReason),
    /// The guest faulted before the input was in place.
    GuestFault(Fault),
    /// The destination span was not writable guest memory.
    WriteFailed { addr: u32 },
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::BudgetExhausted => {
                write!(f, "guest never reached the delivery point in budget")
            }
            DeliveryError::UnexpectedStop(stop) => {
                write!(f, "unexpected stop before delivery: {:?}", stop)
            }
            DeliveryError::GuestFault(fault) => {
                write!(f, "guest faulted before delivery: {:?}", fault)
            }
            DeliveryError::WriteFailed { addr } => {
                write!(f, "input destination {:#010x} is not writable", addr)
            }
        }
    }
}

impl std::error::Error for DeliveryError {}

/// One delivery strategy. `deliver` leaves the session ready to `run()`
/// the iteration; it never runs the target logic itself.
pub trait InputChannel {
    fn deliver(&self, session: &mut Session, input: &[u8]) -> Result<(), DeliveryError>;

    /// Strategy name for logs.
    fn name(&self) -> &'static str;
}

/// Construct the strategy for a configured kind.
pub fn build(kind: ChannelKind, layout: FirmwareLayout) -> Box<dyn InputChannel> {
    match kind {
        ChannelKind::DirectCall => Box::new(DirectCall { layout }),
        ChannelKind::BreakpointTrap => Box::new(BreakpointTrap { layout }),
        ChannelKind::SyncExit => Box::new(SyncExit),
    }
}

/// Clamp an input to a buffer capacity, warning when bytes are dropped.
fn clamp<'a>(input: &'a [u8], capacity: u32, channel: &str) -> &'a [u8] {
    let cap = capacity as usize;
    if input.len() > cap {
        warn!(
            "{}: input of {} bytes clamped to buffer capacity {}",
            channel,
            input.len(),
            cap
        );
        &input[..cap]
    } else {
        input
    }
}

/// Forged call into a statically known entry point.
pub struct DirectCall {
    layout: FirmwareLayout,
}

impl InputChannel for DirectCall {
    fn deliver(&self, session: &mut Session, input: &[u8]) -> Result<(), DeliveryError> {
        let input = clamp(input, self.layout.input_capacity, self.name());
        if !session.core.bus.write_bytes(self.layout.input_addr, input) {
            return Err(DeliveryError::WriteFailed {
                addr: self.layout.input_addr,
            });
        }

        // Mimic a call: arguments in r0/r1, fresh stack, sentinel return
        // address so the entry's RET lands in host hands.
        let core = &mut session.core;
        core.r[0] = self.layout.input_addr;
        core.r[1] = input.len() as u32;
        core.sp = self.layout.stack_top.wrapping_sub(4);
        if !core.bus.write_bytes(core.sp, &RETURN_LANDING.to_le_bytes()) {
            return Err(DeliveryError::WriteFailed { addr: core.sp });
        }
        core.pc = self.layout.entry;
        debug!("{}: {} bytes staged, pc -> {:#010x}", self.name(), input.len(), core.pc);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "direct-call"
    }
}

/// Debugger-assisted injection at the entry point's first instruction.
pub struct BreakpointTrap {
    layout: FirmwareLayout,
}

impl InputChannel for BreakpointTrap {
    fn deliver(&self, session: &mut Session, input: &[u8]) -> Result<(), DeliveryError> {
        session.breakpoints.insert(self.layout.entry);

        // Let the guest boot until it walks into the entry point. A SYC
        // along the way is an unanswered input request: resume and let the
        // guest proceed with whatever its registers already say.
        loop {
            match session.run() {
                StopReason::Breakpoint(addr) if addr == self.layout.entry => break,
                StopReason::SyncExit => {
                    debug!("{}: startup sync-exit left unanswered", self.name());
                }
                StopReason::BudgetExhausted => return Err(DeliveryError::BudgetExhausted),
                StopReason::Fault(fault) => return Err(DeliveryError::GuestFault(fault)),
                other => return Err(DeliveryError::UnexpectedStop(other)),
            }
        }

        let input = clamp(input, self.layout.input_capacity, self.name());
        if !session.core.bus.write_bytes(self.layout.input_addr, input) {
            return Err(DeliveryError::WriteFailed {
                addr: self.layout.input_addr,
            });
        }
        session.core.r[0] = self.layout.input_addr;
        session.core.r[1] = input.len() as u32;
        debug!(
            "{}: {} bytes injected at entry {:#010x}",
            self.name(),
            input.len(),
            self.layout.entry
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "breakpoint-trap"
    }
}

/// Guest-requested delivery through the SYC trap.
pub struct SyncExit;

impl InputChannel for SyncExit {
    fn deliver(&self, session: &mut Session, input: &[u8]) -> Result<(), DeliveryError> {
        // Wait for the guest to ask for input.
        loop {
            match session.run() {
                StopReason::SyncExit => break,
                StopReason::BudgetExhausted => return Err(DeliveryError::BudgetExhausted),
                StopReason::Fault(fault) => return Err(DeliveryError::GuestFault(fault)),
                other => return Err(DeliveryError::UnexpectedStop(other)),
            }
        }

        // The guest placed destination and capacity in r0/r1.
        let dest = session.core.r[0];
        let capacity = session.core.r[1];
        let input = clamp(input, capacity, self.name());
        if !session.core.bus.write_bytes(dest, input) {
            return Err(DeliveryError::WriteFailed { addr: dest });
        }
        session.core.r[1] = input.len() as u32;
        debug!(
            "{}: {} bytes written at guest-chosen {:#010x}",
            self.name(),
            input.len(),
            dest
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sync-exit"
    }
}

#[cfg(test)]
mod tests;
