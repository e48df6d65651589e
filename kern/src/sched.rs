//! `sched`: quantum accounting, priority decay, and round-robin rotation.

use abi::{PrivFlags, ProcNr};

use crate::config::IDLE_Q;
use crate::kernel::Kernel;

impl Kernel {
    /// Called when `rp` has used up its current quantum (`sched_ticks`
    /// reached zero). Decrements its full-quantum counter; once that
    /// reaches zero, demotes it by one priority level (never past
    /// `IDLE_Q - 1`, so user processes never sink all the way to IDLE's own
    /// queue) and refills the counter at the new level. Also rotates `rp`
    /// to the tail of its current queue if it is still at the head, giving
    /// round-robin behavior among peers at the same priority.
    pub fn sched(&mut self, rp: ProcNr) {
        if !self.privs[rp.index()].s_flags.contains(PrivFlags::PREEMPTIBLE) {
            return;
        }

        let demote = {
            let p = &mut self.procs[rp.index()];
            p.full_quantums = p.full_quantums.saturating_sub(1);
            p.full_quantums == 0 && p.priority + 1 < IDLE_Q
        };

        if demote {
            // `unready` resets `priority` to `max_priority`; `max_priority`
            // itself is never lowered here; it is the ceiling a process
            // returns to the next time it blocks, even after a demotion.
            self.unready(rp);
            self.procs[rp.index()].priority += 1;
            self.procs[rp.index()].full_quantums =
                crate::config::quantums(self.procs[rp.index()].priority);
            self.ready(rp);
        } else if self.is_head_of_own_queue(rp) {
            self.rotate(rp);
        }

        self.procs[rp.index()].sched_ticks = self.procs[rp.index()].quantum_size;
        self.pick_proc();
    }

    fn is_head_of_own_queue(&self, rp: ProcNr) -> bool {
        let prio = self.procs[rp.index()].priority as usize;
        self.ready_sets.queues[prio].head == Some(rp)
    }

    /// Moves `rp`, currently at the head of its priority queue, to the
    /// tail. `rp` must still be a ready-queue member; a process that used
    /// up its quantum while blocked has already left the ready set and has
    /// nothing to rotate.
    fn rotate(&mut self, rp: ProcNr) {
        let prio = self.procs[rp.index()].priority as usize;
        let q = self.ready_sets.queues[prio];
        if q.head != Some(rp) || q.tail == Some(rp) {
            // Single-member queue, or rp already isn't the head: nothing to
            // rotate.
            return;
        }

        let new_head = self.procs[rp.index()].nextready;
        self.ready_sets.queues[prio].head = new_head;
        self.procs[rp.index()].nextready = None;

        let old_tail = q.tail.expect("tail set whenever head is set");
        self.procs[old_tail.index()].nextready = Some(rp);
        self.ready_sets.queues[prio].tail = Some(rp);
    }
}
