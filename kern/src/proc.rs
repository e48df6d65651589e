//! The process slot: the fixed-size record each message-passing and
//! scheduling primitive reads and mutates.

use abi::{PrivFlags, PrivilegeRecord, ProcNr, RtsFlags, SysId};

use crate::config::{PROC_MEM_SIZE, REGIONS_PER_PROC};
use crate::mem::Region;

/// One process slot.
///
/// Queue membership is expressed as links between slots (`nextready`,
/// `q_link`) rather than as owned child nodes: these are lookup edges into
/// the statically sized process table, not ownership edges, so an arena of
/// `ProcNr` indices stands in for what would otherwise be an
/// intrusive-linked-list pointer.
#[derive(Clone, Debug)]
pub struct Process {
    pub(crate) occupied: bool,

    pub(crate) rts_flags: RtsFlags,
    pub(crate) priority: u8,
    pub(crate) max_priority: u8,

    pub(crate) full_quantums: u32,
    pub(crate) sched_ticks: u32,
    pub(crate) quantum_size: u32,

    /// Byte offset within this process's own `mem` where the in-flight
    /// message lives, valid only while `SENDING` or `RECEIVING` is set.
    pub(crate) messbuf: usize,
    /// While `RECEIVING`: the source this process is willing to accept.
    pub(crate) getfrom: ProcNr,
    /// While `SENDING`: the destination this process is blocked sending to.
    pub(crate) sendto: ProcNr,

    /// Head of the list of processes blocked sending to *this* process,
    /// linked through their own `q_link` field.
    pub(crate) caller_q: Option<ProcNr>,
    /// This process's link in whatever `caller_q` it is currently a member
    /// of.
    pub(crate) q_link: Option<ProcNr>,

    /// This process's link in whichever ready queue it currently occupies.
    pub(crate) nextready: Option<ProcNr>,

    /// Head of this process's typed notification queue (`p_ntf_q`),
    /// threaded through the shared notification-buffer pool.
    pub(crate) ntf_q: Option<usize>,

    pub(crate) regions: [Region; REGIONS_PER_PROC],
    pub(crate) mem: [u8; PROC_MEM_SIZE],
}

impl Process {
    pub const fn empty() -> Self {
        Self {
            occupied: false,
            rts_flags: RtsFlags::empty(),
            priority: 0,
            max_priority: 0,
            full_quantums: 0,
            sched_ticks: 0,
            quantum_size: 0,
            messbuf: 0,
            getfrom: ProcNr::ANY,
            sendto: ProcNr::ANY,
            caller_q: None,
            q_link: None,
            nextready: None,
            ntf_q: None,
            regions: [Region::EMPTY; REGIONS_PER_PROC],
            mem: [0; PROC_MEM_SIZE],
        }
    }

    /// A process slot that has never been populated, or has been vacated by
    /// the (external) process manager, holds no IPC state at all.
    pub fn isempty(&self) -> bool {
        !self.occupied
    }

    pub fn is_runnable(&self) -> bool {
        self.occupied && self.rts_flags.is_empty()
    }

    pub fn is_sending(&self) -> bool {
        self.rts_flags.contains(RtsFlags::SENDING)
    }

    pub fn is_receiving(&self) -> bool {
        self.rts_flags.contains(RtsFlags::RECEIVING)
    }
}

/// Privilege flags, call/send masks, and notification state, read-only to
/// every primitive except for the notification-pending bitmap and the
/// hardware/signal pending words, which are the only fields IPC mutates.
pub type Priv = PrivilegeRecord;

/// Convenience constructor for a default-deny privilege record, used by
/// tests and by callers assembling a process table from scratch.
pub fn default_priv(id: u8) -> Priv {
    PrivilegeRecord {
        s_id: SysId(id),
        s_flags: PrivFlags::PREEMPTIBLE | PrivFlags::BILLABLE,
        s_call_mask: 0,
        s_send_mask: 0,
        s_notify_pending: 0,
        s_int_pending: 0,
        s_sig_pending: 0,
        s_stack_guard: abi::STACK_GUARD,
    }
}
