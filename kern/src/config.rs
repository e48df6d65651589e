//! Compile-time sizing constants shared by the process table, the ready
//! queues, and the notification pool, so that the kernel and the privilege
//! database provisioning agree on them without duplicating literals.

/// Number of process slots in the static process table.
pub const NR_PROCS: usize = 16;

/// Number of priority levels in the ready-queue array. Lower index is more
/// important; `IDLE_Q` is the least important and always occupied.
pub const NR_SCHED_QUEUES: usize = 16;

/// The lowest-priority queue, reserved for the never-blocking IDLE process.
pub const IDLE_Q: u8 = (NR_SCHED_QUEUES - 1) as u8;

/// Size of the fixed-size notification-buffer pool backing `mini_notify`'s
/// slow path (the `p_ntf_q` queues).
pub const NR_NOTIFY_BUFS: usize = 32;

/// Size, in bytes, of the address space simulated for each process slot.
/// There is no MMU in this kernel core; each process owns a small fixed
/// buffer large enough to hold message traffic, and the region table
/// expresses which parts of it are visible to the message-buffer range
/// check.
pub const PROC_MEM_SIZE: usize = 512;

/// Number of memory regions a process slot can describe. Mirrors the
/// small fixed per-task region tables used elsewhere in this ABI family.
pub const REGIONS_PER_PROC: usize = 4;

/// Number of full quantums granted to a process freshly placed at priority
/// `prio`, before `sched` demotes it by one level. Higher-priority (more
/// important, numerically smaller) processes are granted more quantums
/// before being demoted, so that a demotion chain takes longer to reach the
/// bottom the more important the starting priority was.
pub fn quantums(prio: u8) -> u32 {
    u32::from(NR_SCHED_QUEUES as u8 - prio.min(IDLE_Q))
}
