//! The system-call dispatcher: validates a call before routing it to one of
//! the mini-primitives.

use abi::{CallFlags, CallKind, CallNumber, ProcNr, RtsFlags, SysCallError};

use crate::err::NextProc;
use crate::kernel::Kernel;
use crate::mem::message_in_range;

impl Kernel {
    /// Entry point for a trap from user space: `caller` issued `call_nr`
    /// naming `peer` and a message living at `msg_addr` within its own
    /// memory.
    ///
    /// Validation proceeds in the order the dispatcher contract requires,
    /// short-circuiting on the first failure:
    ///
    /// 1. Is the call permitted by the caller's call mask (and, if `peer`
    ///    is a kernel task, is this call a `SENDREC`)?
    /// 2. Is `peer` a valid process, or `ANY` where that is legal?
    /// 3. Does the caller's region table cover the `MESS_SIZE` bytes at
    ///    `msg_addr`?
    /// 4. For sending calls, is `peer` in the caller's send mask and
    ///    non-empty?
    pub fn sys_call(
        &mut self,
        caller: ProcNr,
        call_nr: u32,
        peer: ProcNr,
        msg_addr: usize,
    ) -> Result<NextProc, SysCallError> {
        let Ok(CallNumber { kind, flags }) = CallNumber::decode(call_nr) else {
            return Err(SysCallError::EBadCall);
        };

        // Step 1: call permitted?
        if !self.privs[caller.index()].can_call(kind) {
            return Err(SysCallError::ECallDenied);
        }
        if self.is_kernel_task(peer) && kind != CallKind::SendRec {
            return Err(SysCallError::ECallDenied);
        }

        // Step 2: peer valid? A process number is valid here if it names a
        // slot within the table, regardless of whether that slot is
        // currently occupied — occupancy is a *send*-allowed concern (step
        // 4), not a peer-validity one, so that a SEND to an emptied slot can
        // still be distinguished as EDEADDST rather than EBADSRCDST.
        let peer_in_range = peer.is_proc() && peer.index() < crate::config::NR_PROCS;
        let peer_ok = match kind {
            CallKind::Receive => peer == ProcNr::ANY || peer_in_range,
            CallKind::Echo => true,
            _ => peer_in_range,
        };
        if !peer_ok {
            return Err(SysCallError::EBadSrcDst);
        }

        // Step 3: message buffer range-checked. Every call in this table
        // transports a message, `ECHO` included.
        let regions = self.procs[caller.index()].regions;
        if !message_in_range(&regions, msg_addr) {
            return Err(SysCallError::EFault);
        }

        // Step 4: send allowed?
        let sends = matches!(
            kind,
            CallKind::Send | CallKind::SendRec | CallKind::Notify | CallKind::Alert
        );
        if sends {
            let dst_id = self.privs[peer.index()].s_id;
            if !self.privs[caller.index()].can_send_to(dst_id) {
                return Err(SysCallError::ECallDenied);
            }
            if self.procs[peer.index()].isempty() {
                return Err(SysCallError::EDeadDst);
            }
        }

        self.procs[caller.index()].messbuf = msg_addr;

        match kind {
            CallKind::Send => self.mini_send(caller, peer, flags),
            CallKind::Receive => self.mini_receive(caller, peer, flags),
            CallKind::SendRec => {
                let send_next = self.mini_send(caller, peer, CallFlags::empty())?;
                if self.procs[caller.index()].is_sending() {
                    // Send blocked on `peer`'s caller_q. Mark the caller
                    // RECEIVING from `peer` right away, so that whenever
                    // `peer` (or anyone else) dequeues this entry and clears
                    // SENDING, the caller is left blocked RECEIVING rather
                    // than readied. The caller never re-enters mini_receive
                    // for this transition, so no pending notification or
                    // typed queue is ever consulted here — only the eventual
                    // reply from `peer` can satisfy it.
                    let caller_p = self.proc_mut(caller);
                    caller_p.getfrom = peer;
                    caller_p.rts_flags.insert(RtsFlags::RECEIVING);
                    return Ok(send_next);
                }
                let recv_next =
                    self.mini_receive(caller, peer, CallFlags::FRESH_ANSWER)?;
                Ok(send_next.combine(recv_next))
            }
            CallKind::Notify => self.mini_notify(caller, peer, flags),
            CallKind::Alert => self.mini_alert(caller, peer, 0),
            CallKind::Echo => {
                let msg = crate::mem::read_message(&self.procs[caller.index()]);
                crate::mem::write_message(&mut self.procs[caller.index()], &msg);
                Ok(NextProc::Same)
            }
        }
    }
}
