//! The typed notification pool backing `mini_notify`'s slow path.
//!
//! Each pending notify message that cannot be delivered immediately is
//! copied into one of `NR_NOTIFY_BUFS` fixed pool slots and linked onto the
//! destination's `p_ntf_q`. A fixed-size bitset tracks which slots are free,
//! so the pool never allocates and can be exhausted (`ENOSPC`).

use abi::{CallFlags, Message, ProcNr, RtsFlags, SysCallError};

use crate::config::NR_NOTIFY_BUFS;
use crate::err::NextProc;
use crate::mem::{copy_message, read_message, write_message};

/// Bit position of the `HARDWARE` pseudo-source within a privilege record's
/// `s_notify_pending` bitmap.
const HARDWARE_BIT: u32 = 63;
/// Bit position of the `SYSTEM` pseudo-source within the same bitmap.
const SYSTEM_BIT: u32 = 62;

#[derive(Copy, Clone, Debug)]
pub(crate) struct NotifyEntry {
    pub(crate) source: ProcNr,
    pub(crate) ty: u32,
    pub(crate) flags: u32,
    pub(crate) arg: u32,
    pub(crate) next: Option<usize>,
}

impl NotifyEntry {
    const EMPTY: Self = Self {
        source: ProcNr::ANY,
        ty: 0,
        flags: 0,
        arg: 0,
        next: None,
    };
}

#[derive(Clone, Debug)]
pub struct NotifyPool {
    pub(crate) slots: [NotifyEntry; NR_NOTIFY_BUFS],
    /// One bit per slot; set means in use.
    pub(crate) used: u32,
}

static_assertions::const_assert!(NR_NOTIFY_BUFS <= 32);

impl NotifyPool {
    pub const fn new() -> Self {
        Self {
            slots: [NotifyEntry::EMPTY; NR_NOTIFY_BUFS],
            used: 0,
        }
    }

    fn alloc(&mut self) -> Option<usize> {
        for i in 0..NR_NOTIFY_BUFS {
            if self.used & (1 << i) == 0 {
                self.used |= 1 << i;
                return Some(i);
            }
        }
        None
    }

    fn free(&mut self, idx: usize) {
        self.used &= !(1 << idx);
    }
}

impl Default for NotifyPool {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::kernel::Kernel {
    /// Enqueues a typed notification from `source` to `dst`, coalescing
    /// with any existing queued entry for the same `(source, type)` pair.
    /// Returns `Err(())` if the pool is exhausted.
    pub(crate) fn notify_enqueue(
        &mut self,
        dst: ProcNr,
        source: ProcNr,
        ty: u32,
        flags: u32,
        arg: u32,
    ) -> Result<(), ()> {
        let mut cursor = self.procs[dst.index()].ntf_q;
        while let Some(idx) = cursor {
            let entry = &mut self.notify_pool.slots[idx];
            if entry.source == source && entry.ty == ty {
                entry.flags = flags;
                entry.arg = arg;
                return Ok(());
            }
            cursor = entry.next;
        }

        let idx = self.notify_pool.alloc().ok_or(())?;
        let head = self.procs[dst.index()].ntf_q;
        self.notify_pool.slots[idx] = NotifyEntry {
            source,
            ty,
            flags,
            arg,
            next: None,
        };
        // Append at tail so FIFO order among distinct (source, type) pairs
        // is preserved.
        match head {
            None => self.procs[dst.index()].ntf_q = Some(idx),
            Some(mut tail_idx) => {
                while let Some(next) = self.notify_pool.slots[tail_idx].next {
                    tail_idx = next;
                }
                self.notify_pool.slots[tail_idx].next = Some(idx);
            }
        }
        Ok(())
    }

    /// Looks for a queued notification on `dst.ntf_q` matching `src` (or
    /// any entry, if `src == ProcNr::ANY`). On a match, removes it from the
    /// list, frees its pool slot, and returns its contents.
    pub(crate) fn notify_dequeue(
        &mut self,
        dst: ProcNr,
        src: ProcNr,
    ) -> Option<(ProcNr, u32, u32, u32)> {
        let mut prev: Option<usize> = None;
        let mut cursor = self.procs[dst.index()].ntf_q;

        while let Some(idx) = cursor {
            let entry = self.notify_pool.slots[idx];
            if src == ProcNr::ANY || entry.source == src {
                match prev {
                    None => self.procs[dst.index()].ntf_q = entry.next,
                    Some(p) => self.notify_pool.slots[p].next = entry.next,
                }
                self.notify_pool.free(idx);
                return Some((entry.source, entry.ty, entry.flags, entry.arg));
            }
            prev = Some(idx);
            cursor = entry.next;
        }
        None
    }

    /// Length of `p`'s typed notification queue. Exposed for tests
    /// exercising the coalescing rule; production code has no need to walk
    /// the queue just to count it.
    pub fn ntf_q_len(&self, p: ProcNr) -> usize {
        let mut n = 0;
        let mut cursor = self.procs[p.index()].ntf_q;
        while let Some(idx) = cursor {
            n += 1;
            cursor = self.notify_pool.slots[idx].next;
        }
        n
    }

    fn source_to_bit(source: ProcNr) -> Option<u32> {
        if source == ProcNr::HARDWARE {
            Some(HARDWARE_BIT)
        } else if source == ProcNr::SYSTEM {
            Some(SYSTEM_BIT)
        } else if source.is_proc() {
            Some(source.0 as u32)
        } else {
            None
        }
    }

    fn bit_to_source(bit: u32) -> ProcNr {
        match bit {
            HARDWARE_BIT => ProcNr::HARDWARE,
            SYSTEM_BIT => ProcNr::SYSTEM,
            b => ProcNr::new(b as usize),
        }
    }

    /// Finds the lowest-index pending bit matching `src` (or any bit, if
    /// `src == ProcNr::ANY`) in `caller`'s pending-notification bitmap,
    /// clears it, and returns which source it belonged to.
    pub(crate) fn take_pending_alert_bit(
        &mut self,
        caller: ProcNr,
        src: ProcNr,
    ) -> Option<ProcNr> {
        let pending = self.privs[caller.index()].s_notify_pending;
        for bit in 0..64u32 {
            if pending & (1u64 << bit) == 0 {
                continue;
            }
            let source = Self::bit_to_source(bit);
            if src == ProcNr::ANY || source == src {
                self.privs[caller.index()].s_notify_pending &= !(1u64 << bit);
                return Some(source);
            }
        }
        None
    }

    /// Builds the synthetic notification message delivered for a pending
    /// alert bit, recomputing its payload from the destination's pending
    /// interrupt or signal word and clearing that word as a side effect.
    pub(crate) fn build_alert_message(&mut self, dst: ProcNr, source: ProcNr) -> Message {
        let arg = if source == ProcNr::HARDWARE {
            let v = self.privs[dst.index()].s_int_pending;
            self.privs[dst.index()].s_int_pending = 0;
            v
        } else if source == ProcNr::SYSTEM {
            let v = self.privs[dst.index()].s_sig_pending;
            self.privs[dst.index()].s_sig_pending = 0;
            v
        } else {
            0
        };

        let mut msg = Message::default();
        msg.set_source(source);
        msg.set_notify_source(source);
        msg.set_notify_type(0);
        msg.set_notify_flags(0);
        msg.set_notify_arg(arg);
        msg.set_notify_timestamp(self.uptime());
        msg
    }

    /// `ALERT`: non-blocking, coalescing notification delivered via the
    /// pending bitmap. `source` is `ProcNr::HARDWARE`/`ProcNr::SYSTEM` for
    /// kernel-synthesized alerts, or a real process for a plain alert.
    /// `payload` is OR-accumulated into the destination's pending
    /// interrupt/signal word for the two pseudo-sources; it is ignored for
    /// ordinary sources, since the bitmap alone carries their state.
    pub fn mini_alert(
        &mut self,
        source: ProcNr,
        dst: ProcNr,
        payload: u32,
    ) -> Result<NextProc, SysCallError> {
        if source == ProcNr::HARDWARE {
            self.privs[dst.index()].s_int_pending |= payload;
        } else if source == ProcNr::SYSTEM {
            self.privs[dst.index()].s_sig_pending |= payload;
        }

        let dst_getfrom = self.procs[dst.index()].getfrom;
        let can_deliver = self.procs[dst.index()].is_receiving()
            && !self.procs[dst.index()].is_sending()
            && (dst_getfrom == ProcNr::ANY || dst_getfrom == source);

        if can_deliver {
            let msg = self.build_alert_message(dst, source);
            write_message(&mut self.procs[dst.index()], &msg);
            self.procs[dst.index()].rts_flags.remove(RtsFlags::RECEIVING);

            let mut next = NextProc::Same;
            if self.procs[dst.index()].is_runnable() {
                self.ready(dst);
                next = NextProc::Switch;
            }
            return Ok(next);
        }

        let bit =
            Self::source_to_bit(source).expect("alert source must be a process or pseudo-source");
        self.privs[dst.index()].s_notify_pending |= 1u64 << bit;
        Ok(NextProc::Same)
    }

    /// `NOTIFY`: non-blocking, coalescing notification carrying a
    /// caller-supplied typed message, delivered via the typed notification
    /// queue rather than the pending bitmap (see the module-level notes in
    /// `SPEC_FULL.md` §2 for why the two mechanisms are kept distinct).
    pub fn mini_notify(
        &mut self,
        caller: ProcNr,
        dst: ProcNr,
        _flags: CallFlags,
    ) -> Result<NextProc, SysCallError> {
        let dst_getfrom = self.procs[dst.index()].getfrom;
        let can_deliver = self.procs[dst.index()].is_receiving()
            && !self.procs[dst.index()].is_sending()
            && (dst_getfrom == ProcNr::ANY || dst_getfrom == caller);

        if can_deliver {
            copy_message(&mut self.procs, caller.index(), dst.index());
            let mut msg = read_message(&self.procs[dst.index()]);
            msg.set_source(caller);
            write_message(&mut self.procs[dst.index()], &msg);
            self.procs[dst.index()].rts_flags.remove(RtsFlags::RECEIVING);

            let mut next = NextProc::Same;
            if self.procs[dst.index()].is_runnable() {
                self.ready(dst);
                next = NextProc::Switch;
            }
            return Ok(next);
        }

        let msg = read_message(&self.procs[caller.index()]);
        self.notify_enqueue(
            dst,
            caller,
            msg.m_type as u32,
            msg.notify_flags(),
            msg.notify_arg(),
        )
        .map_err(|()| SysCallError::ENoSpc)?;

        Ok(NextProc::Same)
    }
}
