//! The multilevel priority ready set: one linked list per priority level,
//! threaded through each process's own `nextready` field.

use abi::{PrivFlags, ProcNr};

use crate::config::NR_SCHED_QUEUES;
use crate::err::stack_guard_violation;
use crate::kernel::Kernel;

/// Head/tail pointers for one priority level. The list itself is threaded
/// through `Process::nextready`; this struct only remembers the two ends,
/// the same "pointer to the link field being updated" idiom as a classic
/// intrusive list, expressed as process-table indices instead of raw
/// pointers.
#[derive(Copy, Clone, Debug, Default)]
pub struct ReadyQueue {
    pub(crate) head: Option<ProcNr>,
    pub(crate) tail: Option<ProcNr>,
}

#[derive(Clone, Debug)]
pub struct ReadySets {
    pub(crate) queues: [ReadyQueue; NR_SCHED_QUEUES],
}

impl ReadySets {
    pub const fn new() -> Self {
        Self {
            queues: [ReadyQueue { head: None, tail: None }; NR_SCHED_QUEUES],
        }
    }
}

impl Default for ReadySets {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Adds `rp` to its priority's ready queue and recomputes `pick_proc`.
    ///
    /// Invariant 1 (`rp` is on exactly one ready queue iff `rts_flags ==
    /// 0`) is the caller's responsibility: `ready` assumes `rp.rts_flags`
    /// has just become empty and does not check it.
    pub fn ready(&mut self, rp: ProcNr) {
        let prio = self.procs[rp.index()].priority as usize;
        let head_insert = self.privs[rp.index()].s_flags.contains(PrivFlags::RDY_Q_HEAD);

        let q = &mut self.ready_sets.queues[prio];
        match (q.head, head_insert) {
            (None, _) => {
                q.head = Some(rp);
                q.tail = Some(rp);
                self.procs[rp.index()].nextready = None;
            }
            (Some(old_head), true) => {
                self.procs[rp.index()].nextready = Some(old_head);
                q.head = Some(rp);
            }
            (Some(_), false) => {
                let tail = q.tail.expect("tail set whenever head is set");
                self.procs[tail.index()].nextready = Some(rp);
                q.tail = Some(rp);
                self.procs[rp.index()].nextready = None;
            }
        }

        self.pick_proc();
    }

    /// Removes `rp` from its priority's ready queue, resets its scheduling
    /// state for its next activation, and recomputes `pick_proc` if it was
    /// occupying `next_ptr` or `bill_ptr`.
    pub fn unready(&mut self, rp: ProcNr) {
        if self.privs[rp.index()].s_stack_guard != abi::STACK_GUARD
            && self.is_kernel_task(rp)
        {
            stack_guard_violation(rp);
        }

        let prio = self.procs[rp.index()].priority as usize;
        let q = &mut self.ready_sets.queues[prio];

        if q.head == Some(rp) {
            q.head = self.procs[rp.index()].nextready;
            if q.head.is_none() {
                q.tail = None;
            }
        } else {
            let mut cursor = q.head;
            while let Some(c) = cursor {
                if self.procs[c.index()].nextready == Some(rp) {
                    let next = self.procs[rp.index()].nextready;
                    self.procs[c.index()].nextready = next;
                    if q.tail == Some(rp) {
                        q.tail = Some(c);
                    }
                    break;
                }
                cursor = self.procs[c.index()].nextready;
            }
        }
        self.procs[rp.index()].nextready = None;

        if self.next_ptr == Some(rp) || self.bill_ptr == Some(rp) {
            self.pick_proc();
        }

        let p = &mut self.procs[rp.index()];
        p.priority = p.max_priority;
        p.full_quantums = crate::config::quantums(p.priority);
    }

    /// Scans priorities from most to least important and sets `next_ptr` to
    /// the head of the first non-empty queue (invariant 8). IDLE's queue is
    /// never empty, so this always finds a winner.
    pub fn pick_proc(&mut self) {
        for q in &self.ready_sets.queues {
            if let Some(head) = q.head {
                self.next_ptr = Some(head);
                if self.privs[head.index()].s_flags.contains(PrivFlags::BILLABLE) {
                    self.bill_ptr = Some(head);
                }
                return;
            }
        }
    }

    #[cfg(feature = "debug-sched-check")]
    pub fn check_ready_sets(&self) {
        use crate::err::sched_check_violation;

        for (level, q) in self.ready_sets.queues.iter().enumerate() {
            let mut seen = [false; crate::config::NR_PROCS];
            let mut cursor = q.head;
            let mut prev = None;
            while let Some(c) = cursor {
                if seen[c.index()] {
                    sched_check_violation("cycle detected in ready queue");
                }
                seen[c.index()] = true;
                if self.procs[c.index()].priority as usize != level {
                    sched_check_violation("process queued at wrong priority");
                }
                prev = Some(c);
                cursor = self.procs[c.index()].nextready;
            }
            if prev != q.tail {
                sched_check_violation("ready queue tail does not match walk");
            }
        }
    }
}
