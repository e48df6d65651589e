//! Error and scheduling-hint types threaded through the primitives.
//!
//! User-visible failures are reported through [`abi::SysCallError`], always
//! synchronously to the immediate caller. The only other outcome a
//! primitive can have is fatal: a kernel-task stack-guard mismatch in
//! [`crate::queue::unready`], or (under the `debug-sched-check` feature) a
//! detected ready-queue consistency violation. Both of those are modeled as
//! Rust panics rather than `Result` values, since there is no sensible
//! recovery and no caller to report them to.

use abi::ProcNr;

/// Scheduling hint returned by a primitive: does the calling process keep
/// running, or must the kernel switch to whatever `pick_proc` most recently
/// chose?
///
/// Mirrors the shape of similar "what runs next" enums in this kernel
/// family: operations that only ever affect the caller's own state report
/// `Same`, while operations that can ready or unready some other process
/// (possibly the caller itself) report `Switch`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NextProc {
    /// The calling process is still runnable and should continue.
    Same,
    /// The kernel must reschedule; run whichever process `pick_proc` last
    /// selected.
    Switch,
}

impl NextProc {
    /// Merges two scheduling hints produced by two halves of a compound
    /// operation (e.g. the send half and the receive half of `SENDREC`).
    /// `Switch` is sticky: if either half demanded a reschedule, the merged
    /// result does too.
    pub fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Same, Self::Same) => Self::Same,
            _ => Self::Switch,
        }
    }
}

/// Panics with a description of a kernel-task stack-guard mismatch detected
/// in `unready`. This is one of the two fatal conditions this kernel
/// recognizes: a kernel task whose stack guard has been corrupted cannot be
/// trusted to run again.
#[cold]
pub(crate) fn stack_guard_violation(p: ProcNr) -> ! {
    crate::klog!("kernel task {} failed stack guard check", p.0);
    panic!("stack guard violation in process {}", p.0);
}

/// Panics with a description of a ready-queue consistency violation detected
/// under the `debug-sched-check` feature.
#[cold]
#[cfg_attr(not(feature = "debug-sched-check"), allow(dead_code))]
pub(crate) fn sched_check_violation(msg: &'static str) -> ! {
    crate::klog!("sched consistency check failed: {}", msg);
    panic!("sched consistency check failed: {}", msg);
}
