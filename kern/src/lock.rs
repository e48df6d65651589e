//! Lock gateways: the only sanctioned way for code outside the trap path
//! (task-level library code, interrupt handlers) to re-enter the core.
//!
//! The kernel is single-threaded and non-preemptible; the only concurrency
//! it ever has to defend against is a hardware interrupt arriving while a
//! primitive is mid-mutation. Mutual exclusion is therefore "disable
//! interrupts, do the work, restore the previous interrupt state" rather
//! than a spinlock or mutex. Each gateway takes an `InterruptToken` proving
//! the caller already holds the disable, so that interrupt handlers (which
//! enter with interrupts already masked) can call straight through without
//! a redundant nested disable.

use abi::{CallFlags, ProcNr, SysCallError};

use crate::err::NextProc;
use crate::kernel::Kernel;

/// Proof that interrupts are currently disabled. Constructed only by
/// [`with_interrupts_disabled`] or, from interrupt context, by
/// [`InterruptToken::from_interrupt_context`]; a gateway taking this token
/// cannot be called with interrupts still enabled.
pub struct InterruptToken(());

impl InterruptToken {
    /// Used by interrupt handlers, which the architecture has already
    /// entered with interrupts masked.
    pub fn from_interrupt_context() -> Self {
        InterruptToken(())
    }
}

/// Disables interrupts (architecture-specific; left to the caller's own
/// critical-section primitive), runs `f`, then restores the previous
/// interrupt state. Task-level code calls this to get an `InterruptToken`
/// it can pass to the gateways below; it must not be called from a context
/// that is already inside one of these brackets, as nesting is not
/// supported.
pub fn with_interrupts_disabled<R>(
    disable: impl FnOnce() -> R,
    f: impl FnOnce(&InterruptToken) -> R,
    restore: impl FnOnce(R),
) -> R {
    let state = disable();
    let result = f(&InterruptToken(()));
    restore(state);
    result
}

impl Kernel {
    pub fn lock_send(
        &mut self,
        _tok: &InterruptToken,
        caller: ProcNr,
        dst: ProcNr,
        flags: CallFlags,
    ) -> Result<NextProc, SysCallError> {
        self.mini_send(caller, dst, flags)
    }

    pub fn lock_alert(
        &mut self,
        _tok: &InterruptToken,
        source: ProcNr,
        dst: ProcNr,
        payload: u32,
    ) -> Result<NextProc, SysCallError> {
        self.mini_alert(source, dst, payload)
    }

    pub fn lock_ready(&mut self, _tok: &InterruptToken, rp: ProcNr) {
        self.ready(rp)
    }

    pub fn lock_unready(&mut self, _tok: &InterruptToken, rp: ProcNr) {
        self.unready(rp)
    }

    pub fn lock_sched(&mut self, _tok: &InterruptToken, rp: ProcNr) {
        self.sched(rp)
    }
}
