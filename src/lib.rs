//! Cinder - a deterministic, emulator-backed fuzzing harness for
//! bare-metal targets.
//!
//! One [`Harness`] owns one emulated guest session. An external fuzzing
//! engine feeds it candidate byte buffers; each buffer is delivered over
//! the configured [`channel`], run against the target entry point inside
//! the instruction-counted guest, and classified into a [`Verdict`]. Every
//! iteration starts from the same snapshot, so any verdict is replayable
//! bit-for-bit.

pub mod asm;
pub mod channel;
pub mod cpu;
pub mod firmware;
pub mod harness;
pub mod memory;
pub mod oracle;
pub mod session;

pub use channel::{ChannelKind, DeliveryError, InputChannel};
pub use cpu::{Cpu, Fault};
pub use firmware::{FirmwareImage, FirmwareLayout, SetupError};
pub use harness::{CaseReport, Harness, HarnessConfig};
pub use memory::Bus;
pub use oracle::{classify, Verdict};
pub use session::{Session, Snapshot, StopReason, DEFAULT_BUDGET};
