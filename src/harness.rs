//! Fuzzing harness
//!
//! Composition root tying one session, one channel, and the oracle into
//! the iteration loop an external fuzzing engine drives:
//! restore snapshot, deliver input, run, classify. The canonical snapshot
//! is taken once at construction, after the firmware is in place and
//! before any input has run, so no iteration can leak state into the next.

use std::fs;
use std::path::PathBuf;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::channel::{self, ChannelKind, DeliveryError, InputChannel};
use crate::cpu::NUM_REGS;
use crate::firmware::{FirmwareImage, FirmwareLayout, SetupError};
use crate::oracle::{classify, Verdict};
use crate::session::{Session, Snapshot, StopReason, DEFAULT_BUDGET};

fn default_budget() -> u64 {
    DEFAULT_BUDGET
}

/// Harness configuration, loadable from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Path to the externally built firmware image.
    pub firmware: PathBuf,
    /// Optional disk image, attached discard-on-exit.
    #[serde(default)]
    pub disk: Option<PathBuf>,
    /// Delivery channel, fixed for the harness lifetime.
    pub channel: ChannelKind,
    /// Per-iteration instruction budget.
    #[serde(default = "default_budget")]
    pub budget: u64,
    /// Target linker-map addresses the channel needs.
    pub layout: FirmwareLayout,
}

/// Guest state attached to a verdict, serializable for findings reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub verdict: Verdict,
    pub stop: StopReason,
    pub registers: [u32; NUM_REGS],
    pub pc: u32,
    pub sp: u32,
    pub executed: u64,
}

/// One emulator-backed fuzzing harness: exclusive owner of its session.
pub struct Harness {
    session: Session,
    snapshot: Snapshot,
    channel: Box<dyn InputChannel>,
    last_stop: Option<StopReason>,
}

impl Harness {
    /// Build a harness from a config, reading images from disk. All setup
    /// failures surface here, before any iteration runs.
    pub fn new(config: &HarnessConfig) -> Result<Self, SetupError> {
        let image = FirmwareImage::load(&config.firmware)?;
        let disk = match &config.disk {
            Some(path) => Some(fs::read(path).map_err(|source| SetupError::Io {
                path: path.clone(),
                source,
            })?),
            None => None,
        };
        Ok(Self::from_parts(
            &image,
            disk.as_deref(),
            config.channel,
            config.layout,
            config.budget,
        ))
    }

    /// Build a harness from in-memory parts. Used by tests, benches, and
    /// fuzz targets that assemble their firmware in-process.
    pub fn from_parts(
        image: &FirmwareImage,
        disk: Option<&[u8]>,
        kind: ChannelKind,
        layout: FirmwareLayout,
        budget: u64,
    ) -> Self {
        let mut session = Session::new(image, disk);
        session.set_budget(budget);
        // Power-on stack per the linker map, so firmware that does not set
        // up its own stack can still push before the first delivery.
        session.core.sp = layout.stack_top;
        let snapshot = session.snapshot();
        let channel = channel::build(kind, layout);
        info!(
            "harness ready: channel {}, budget {} instructions",
            channel.name(),
            budget
        );
        Self {
            session,
            snapshot,
            channel,
            last_stop: None,
        }
    }

    /// Run one candidate input through one deterministic iteration.
    pub fn run_case(&mut self, input: &[u8]) -> Verdict {
        self.session.restore(&self.snapshot);

        match self.channel.deliver(&mut self.session, input) {
            Ok(()) => {
                let stop = self.session.run();
                let verdict = classify(&stop);
                debug!("case: {:?} -> {}", stop, verdict);
                self.last_stop = Some(stop);
                verdict
            }
            Err(DeliveryError::GuestFault(fault)) => {
                // Still a guest fault, even if the input never landed.
                warn!("guest faulted during delivery: {:?}", fault);
                self.last_stop = Some(StopReason::Fault(fault));
                Verdict::Objective
            }
            Err(err) => {
                debug!("delivery failed, iteration aborted: {}", err);
                self.last_stop = Some(StopReason::BudgetExhausted);
                Verdict::Timeout
            }
        }
    }

    /// Run one input twice from fresh restores and require identical
    /// verdicts and guest state. A mismatch is a determinism violation,
    /// which is a bug in this crate rather than guest behavior, and fatal.
    pub fn run_case_verified(&mut self, input: &[u8]) -> Verdict {
        let first = self.run_case(input);
        let first_digest = self.session.state_digest();
        let second = self.run_case(input);
        let second_digest = self.session.state_digest();
        assert!(
            first == second && first_digest == second_digest,
            "determinism violation: {} / {:#018x} vs {} / {:#018x}",
            first,
            first_digest,
            second,
            second_digest,
        );
        first
    }

    /// Report on the most recent case, for findings output.
    pub fn case_report(&self) -> Option<CaseReport> {
        let stop = self.last_stop?;
        Some(CaseReport {
            verdict: classify(&stop),
            stop,
            registers: self.session.core.r,
            pc: self.session.core.pc,
            sp: self.session.core.sp,
            executed: self.session.executed(),
        })
    }

    /// The underlying session, e.g. for state digests.
    pub fn session(&self) -> &Session {
        &self.session
    }
}
