//! The kernel's top-level state: the process table, privilege records, the
//! ready set, and the notification pool, all owned by one value so that
//! every primitive can be written as a method taking `&mut self`.

use abi::ProcNr;

use crate::config::NR_PROCS;
use crate::notify::NotifyPool;
use crate::proc::{Priv, Process};
use crate::queue::ReadySets;

/// All kernel state touched by the IPC primitives and the scheduler.
pub struct Kernel {
    pub(crate) procs: [Process; NR_PROCS],
    pub(crate) privs: [Priv; NR_PROCS],
    pub(crate) ready_sets: ReadySets,
    pub(crate) notify_pool: NotifyPool,

    /// Process selected by the most recent `pick_proc`.
    pub(crate) next_ptr: Option<ProcNr>,
    /// Billable process selected by the most recent `pick_proc`.
    pub(crate) bill_ptr: Option<ProcNr>,

    /// Which slots are reserved for the kernel's own privileged tasks
    /// (subject to the stack-guard check in `unready`), as opposed to
    /// ordinary user processes.
    pub(crate) kernel_tasks: u32,

    pub(crate) uptime: u32,
}

impl Kernel {
    pub fn new() -> Self {
        const EMPTY_PROC: Process = Process::empty();
        Self {
            procs: [EMPTY_PROC; NR_PROCS],
            privs: core::array::from_fn(|i| crate::proc::default_priv(i as u8)),
            ready_sets: ReadySets::new(),
            notify_pool: NotifyPool::new(),
            next_ptr: None,
            bill_ptr: None,
            kernel_tasks: 0,
            uptime: 0,
        }
    }

    /// True if `p` names a real, in-range process slot marked as a kernel
    /// task. Bounds `p.index()` itself rather than trusting `ProcNr::is_proc`
    /// alone, since this is consulted by the dispatcher (`sys_call` step 1)
    /// before the peer-validity check (step 2) runs.
    pub fn is_kernel_task(&self, p: ProcNr) -> bool {
        p.is_proc() && p.index() < NR_PROCS && self.kernel_tasks & (1 << p.index()) != 0
    }

    pub fn mark_kernel_task(&mut self, p: ProcNr) {
        debug_assert!(p.index() < NR_PROCS);
        self.kernel_tasks |= 1 << p.index();
    }

    pub fn proc(&self, p: ProcNr) -> &Process {
        &self.procs[p.index()]
    }

    pub fn proc_mut(&mut self, p: ProcNr) -> &mut Process {
        &mut self.procs[p.index()]
    }

    pub fn privilege(&self, p: ProcNr) -> &Priv {
        &self.privs[p.index()]
    }

    pub fn privilege_mut(&mut self, p: ProcNr) -> &mut Priv {
        &mut self.privs[p.index()]
    }

    /// Installs a process at slot `p`, placing it on the ready queue at
    /// `priority` if `runnable` is set. Used by tests and by whatever
    /// bootstrap code assembles the initial process table; this core does
    /// not itself decide which processes exist.
    pub fn install(
        &mut self,
        p: ProcNr,
        priv_record: Priv,
        priority: u8,
        quantum_size: u32,
        runnable: bool,
    ) {
        let idx = p.index();
        self.procs[idx] = Process::empty();
        self.procs[idx].occupied = true;
        self.procs[idx].priority = priority;
        self.procs[idx].max_priority = priority;
        self.procs[idx].quantum_size = quantum_size;
        self.procs[idx].full_quantums = crate::config::quantums(priority);
        self.procs[idx].sched_ticks = quantum_size;
        self.privs[idx] = priv_record;

        if runnable {
            self.ready(p);
        }
    }

    pub fn uptime(&self) -> u32 {
        self.uptime
    }

    pub fn tick(&mut self) {
        self.uptime = self.uptime.wrapping_add(1);
    }

    pub fn next_ptr(&self) -> Option<ProcNr> {
        self.next_ptr
    }

    /// Grants `p` a single region covering its entire simulated address
    /// space, read-write. Convenience for tests and simple single-region
    /// configurations; a real privilege database would instead provision
    /// the narrower regions a process actually needs.
    pub fn allow_full_memory(&mut self, p: ProcNr) {
        use crate::mem::{Region, RegionAttributes};
        self.procs[p.index()].regions[0] = Region {
            base: 0,
            size: crate::config::PROC_MEM_SIZE,
            attributes: RegionAttributes::READ | RegionAttributes::WRITE,
        };
    }

    /// Writes `msg` into `p`'s own memory at offset 0 and points
    /// `p.messbuf` at it. Convenience for tests driving the primitives
    /// directly without going through `sys_call`.
    pub fn set_message(&mut self, p: ProcNr, msg: &abi::Message) {
        self.procs[p.index()].messbuf = 0;
        crate::mem::write_message(&mut self.procs[p.index()], msg);
    }

    pub fn get_message(&self, p: ProcNr) -> abi::Message {
        crate::mem::read_message(&self.procs[p.index()])
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}
