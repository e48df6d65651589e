//! Per-process simulated address space and the message-buffer range check.
//!
//! This kernel core has no MMU to consult: each process slot owns a small
//! fixed byte buffer standing in for its address space, and a region table
//! expressing which byte ranges of that buffer the message-buffer range
//! check (dispatcher step 3) considers legal. Region granularity collapses
//! to plain byte ranges rather than MMU "clicks", since no real memory map
//! is established by anything in scope here.

use abi::MESS_SIZE;
use zerocopy::{FromBytes, IntoBytes};

use crate::config::REGIONS_PER_PROC;
use crate::proc::Process;

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
    #[repr(transparent)]
    pub struct RegionAttributes: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

/// One entry in a process's region table: a byte range within its own `mem`
/// buffer, and the attributes legal accesses to it must have.
#[derive(Copy, Clone, Debug)]
pub struct Region {
    pub base: usize,
    pub size: usize,
    pub attributes: RegionAttributes,
}

impl Region {
    pub const EMPTY: Self = Self {
        base: 0,
        size: 0,
        attributes: RegionAttributes::empty(),
    };

    pub fn end_addr(&self) -> usize {
        self.base + self.size
    }
}

impl kerncore::MemoryRegion for Region {
    fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.end_addr()
    }

    fn base_addr(&self) -> usize {
        self.base
    }

    fn end_addr(&self) -> usize {
        self.end_addr()
    }
}

/// A message-sized byte range within a process's own memory, checked by the
/// dispatcher before any primitive is allowed to touch it.
#[derive(Copy, Clone, Debug)]
pub struct MessSlice {
    pub base: usize,
}

impl kerncore::UserSlice for MessSlice {
    fn is_empty(&self) -> bool {
        false
    }

    fn base_addr(&self) -> usize {
        self.base
    }

    fn end_addr(&self) -> usize {
        self.base + MESS_SIZE
    }
}

/// Dispatcher step 3: is the `MESS_SIZE`-byte range starting at `base`
/// entirely covered by one or more of this process's regions?
pub fn message_in_range(regions: &[Region; REGIONS_PER_PROC], base: usize) -> bool {
    kerncore::can_access(MessSlice { base }, regions.as_slice(), |r| {
        r.attributes.contains(RegionAttributes::READ | RegionAttributes::WRITE)
    })
}

/// Reads a message out of `proc`'s own memory at `proc.messbuf`.
pub fn read_message(proc: &Process) -> abi::Message {
    let bytes = &proc.mem[proc.messbuf..proc.messbuf + MESS_SIZE];
    let result = abi::Message::read_from_bytes(bytes);
    crate::uassert!(result.is_ok());
    result.unwrap()
}

/// Writes a message into `proc`'s own memory at `proc.messbuf`.
pub fn write_message(proc: &mut Process, msg: &abi::Message) {
    let base = proc.messbuf;
    proc.mem[base..base + MESS_SIZE].copy_from_slice(msg.as_bytes());
}

/// Copies a message from `from`'s message buffer into `to`'s message
/// buffer. Both indices must be distinct; the two mutable borrows are taken
/// out via direct index arithmetic on the process table slice, the same
/// "two distinct mutable refs" pattern used anywhere a kernel needs to move
/// data between two entries of one array.
pub fn copy_message(procs: &mut [Process], from: usize, to: usize) {
    debug_assert_ne!(from, to);
    let msg = read_message(&procs[from]);
    write_message(&mut procs[to], &msg);
}
