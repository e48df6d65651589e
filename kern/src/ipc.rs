//! The blocking primitives: `mini_send` and `mini_receive`.

use abi::{CallFlags, Message, ProcNr, RtsFlags, SysCallError};

use crate::err::NextProc;
use crate::kernel::Kernel;
use crate::mem::{copy_message, read_message, write_message};

impl Kernel {
    /// Walks the `sendto` chain starting at `dst` to see whether it leads
    /// back to `caller`. Used to reject sends that would otherwise create a
    /// send-chain cycle. The walk is bounded because each process has a
    /// single `sendto` slot and the table is finite.
    fn would_deadlock(&self, caller: ProcNr, mut dst: ProcNr) -> bool {
        loop {
            if dst == caller {
                return true;
            }
            if !self.procs[dst.index()].is_sending() {
                return false;
            }
            dst = self.procs[dst.index()].sendto;
        }
    }

    /// `SEND`: deliver `msg` from `caller` to `dst`, blocking unless
    /// `flags` carries `NON_BLOCKING`.
    pub fn mini_send(
        &mut self,
        caller: ProcNr,
        dst: ProcNr,
        flags: CallFlags,
    ) -> Result<NextProc, SysCallError> {
        if self.would_deadlock(caller, dst) {
            return Err(SysCallError::ELocked);
        }

        let dst_getfrom = self.procs[dst.index()].getfrom;
        let dst_ready_to_receive = self.procs[dst.index()].is_receiving()
            && !self.procs[dst.index()].is_sending()
            && (dst_getfrom == ProcNr::ANY || dst_getfrom == caller);

        if dst_ready_to_receive {
            copy_message(&mut self.procs, caller.index(), dst.index());
            self.procs[dst.index()].rts_flags.remove(RtsFlags::RECEIVING);

            // Stamp the true sender onto the copied message.
            let mut msg = read_message(&self.procs[dst.index()]);
            msg.set_source(caller);
            write_message(&mut self.procs[dst.index()], &msg);

            let mut next = NextProc::Same;
            if self.procs[dst.index()].is_runnable() {
                self.ready(dst);
                next = NextProc::Switch;
            }
            return Ok(next);
        }

        if flags.contains(CallFlags::NON_BLOCKING) {
            return Err(SysCallError::ENotReady);
        }

        // Slow path: block the caller and enqueue it on dst's caller_q.
        let caller_p = &mut self.procs[caller.index()];
        caller_p.sendto = dst;
        let was_runnable = caller_p.is_runnable();
        caller_p.rts_flags.insert(RtsFlags::SENDING);

        if was_runnable {
            self.unready(caller);
        }

        // Append caller to the tail of dst's caller_q (FIFO order).
        self.procs[caller.index()].q_link = None;
        match self.procs[dst.index()].caller_q {
            None => self.procs[dst.index()].caller_q = Some(caller),
            Some(head) => {
                let mut tail = head;
                while let Some(next) = self.procs[tail.index()].q_link {
                    tail = next;
                }
                self.procs[tail.index()].q_link = Some(caller);
            }
        }

        Ok(NextProc::Switch)
    }

    /// `RECEIVE`: satisfy `caller`'s receive from `src` (or `ANY`), first
    /// from pending notifications, then from a queued sender, blocking
    /// otherwise unless `flags` carries `NON_BLOCKING`.
    pub fn mini_receive(
        &mut self,
        caller: ProcNr,
        src: ProcNr,
        flags: CallFlags,
    ) -> Result<NextProc, SysCallError> {
        // A SENDREC whose send half is still blocked must not also attempt
        // to receive yet; it stays blocked as SENDING alone.
        if self.procs[caller.index()].is_sending() {
            return Ok(NextProc::Switch);
        }

        if let Some(msg) = self.take_pending_notification(caller, src, flags) {
            write_message(&mut self.procs[caller.index()], &msg);
            return Ok(NextProc::Same);
        }

        if let Some(sender) = self.find_queued_sender(caller, src) {
            self.unlink_sender(caller, sender);
            copy_message(&mut self.procs, sender.index(), caller.index());
            let mut msg = read_message(&self.procs[caller.index()]);
            msg.set_source(sender);
            write_message(&mut self.procs[caller.index()], &msg);

            self.procs[sender.index()].rts_flags.remove(RtsFlags::SENDING);
            let mut next = NextProc::Same;
            if self.procs[sender.index()].is_runnable() {
                self.ready(sender);
                next = NextProc::Switch;
            }
            return Ok(next);
        }

        if flags.contains(CallFlags::NON_BLOCKING) {
            return Err(SysCallError::ENotReady);
        }

        let caller_p = &mut self.procs[caller.index()];
        caller_p.getfrom = src;
        let was_runnable = caller_p.is_runnable();
        caller_p.rts_flags.insert(RtsFlags::RECEIVING);
        if was_runnable {
            self.unready(caller);
        }

        Ok(NextProc::Switch)
    }

    /// First delivery source for `mini_receive`: a pending alert bit, then
    /// a queued typed notification. Skipped entirely when `FRESH_ANSWER` is
    /// set, since a `SENDREC` reply must come from an actual sender.
    fn take_pending_notification(
        &mut self,
        caller: ProcNr,
        src: ProcNr,
        flags: CallFlags,
    ) -> Option<Message> {
        if flags.contains(CallFlags::FRESH_ANSWER) {
            return None;
        }

        if let Some(source) = self.take_pending_alert_bit(caller, src) {
            return Some(self.build_alert_message(caller, source));
        }

        if let Some((source, ty, nflags, arg)) = self.notify_dequeue(caller, src) {
            let mut msg = Message::default();
            msg.set_source(source);
            msg.set_notify_source(source);
            msg.set_notify_type(ty);
            msg.set_notify_flags(nflags);
            msg.set_notify_arg(arg);
            msg.set_notify_timestamp(self.uptime());
            return Some(msg);
        }

        None
    }

    fn find_queued_sender(&self, caller: ProcNr, src: ProcNr) -> Option<ProcNr> {
        let mut cursor = self.procs[caller.index()].caller_q;
        while let Some(s) = cursor {
            if src == ProcNr::ANY || s == src {
                return Some(s);
            }
            cursor = self.procs[s.index()].q_link;
        }
        None
    }

    fn unlink_sender(&mut self, caller: ProcNr, sender: ProcNr) {
        let head = self.procs[caller.index()].caller_q;
        if head == Some(sender) {
            self.procs[caller.index()].caller_q = self.procs[sender.index()].q_link;
        } else {
            let mut cursor = head;
            while let Some(c) = cursor {
                if self.procs[c.index()].q_link == Some(sender) {
                    self.procs[c.index()].q_link = self.procs[sender.index()].q_link;
                    break;
                }
                cursor = self.procs[c.index()].q_link;
            }
        }
        self.procs[sender.index()].q_link = None;
    }
}
