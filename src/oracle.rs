//! Objective oracle
//!
//! Turns a session stop into a fuzzing verdict. No heuristics, no output
//! scraping: any guest fault is the objective, running out of budget is a
//! timeout, everything resumable or terminal-but-clean continues. Textual
//! log markers are an outer driver's business, not this crate's.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::StopReason;

/// Outcome of one fuzz iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Nothing interesting; feed the next input.
    Continue,
    /// The input satisfied the target's failure condition. The external
    /// engine decides whether to keep it.
    Objective,
    /// The guest never reached a terminal or resumable state in budget.
    Timeout,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Continue => write!(f, "continue"),
            Verdict::Objective => write!(f, "objective"),
            Verdict::Timeout => write!(f, "timeout"),
        }
    }
}

/// Classify a stop.
pub fn classify(stop: &StopReason) -> Verdict {
    match stop {
        StopReason::Fault(_) => Verdict::Objective,
        StopReason::BudgetExhausted => Verdict::Timeout,
        StopReason::Breakpoint(_)
        | StopReason::SyncExit
        | StopReason::Halted
        | StopReason::EntryReturn(_) => Verdict::Continue,
    }
}
