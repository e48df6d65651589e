// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kernel ABI definitions, shared between the kernel and its callers.

#![no_std]

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Number of `u32` words in a message body.
pub const MESS_BODY_WORDS: usize = 6;

/// Size in bytes of a full IPC message, including source and type header
/// words. This is the quantity checked against the caller's address space by
/// the message-buffer range check.
pub const MESS_SIZE: usize = core::mem::size_of::<Message>();

/// Names a process slot.
///
/// A `ProcNr` is either the dense index of a real process slot, or one of a
/// small number of pseudo-source sentinels used only as the `src`/`dst`
/// argument of a receive or notification call. Ordinary process indices are
/// always numerically smaller than every sentinel, mirroring the convention
/// used elsewhere in this ABI where reserved values sit at the top of the
/// value's range.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default,
)]
pub struct ProcNr(pub u16);

impl ProcNr {
    /// Matches any source; legal only as the `src` argument of `RECEIVE`.
    pub const ANY: Self = Self(u16::MAX);
    /// Pseudo-source for kernel-synthesized interrupt notifications.
    pub const HARDWARE: Self = Self(u16::MAX - 1);
    /// Pseudo-source for kernel-synthesized signal notifications.
    pub const SYSTEM: Self = Self(u16::MAX - 2);

    /// Lowest sentinel value; indices below this name real process slots.
    const FIRST_SENTINEL: u16 = u16::MAX - 2;

    pub const fn new(index: usize) -> Self {
        Self(index as u16)
    }

    /// True if this names a real process slot rather than a pseudo-source.
    pub fn is_proc(self) -> bool {
        self.0 < Self::FIRST_SENTINEL
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Dense system identifier, used to index call masks, send masks, and the
/// pending-notification bitmap. Distinct from a `ProcNr`: not every process
/// slot holds a privileged process, and system IDs are packed without gaps.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[repr(transparent)]
pub struct SysId(pub u8);

/// Indicates priority of a process.
///
/// Priorities are small numbers starting from zero. Numerically lower
/// priorities are more important, so priority 0 is the most likely to be
/// scheduled, followed by 1, and so forth.
///
/// Note that this type *deliberately* does not implement `PartialOrd`/`Ord`,
/// to keep us from confusing ourselves on whether `>` means numerically
/// greater / less important, or more important / numerically smaller.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Unaligned,
    Default,
)]
#[repr(transparent)]
pub struct Priority(pub u8);

impl Priority {
    /// Checks if `self` is strictly more important than `other`.
    ///
    /// Easier to read than comparing the numeric values directly, since lower
    /// numbers are more important.
    pub fn is_more_important_than(self, other: Self) -> bool {
        self.0 < other.0
    }
}

bitflags! {
    /// Run-time-suspension flags. A process is runnable exactly when this
    /// mask is empty.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
    #[repr(transparent)]
    pub struct RtsFlags: u8 {
        /// Blocked in `mini_send`, waiting for a receiver.
        const SENDING = 1 << 0;
        /// Blocked in `mini_receive`, waiting for a sender or notification.
        const RECEIVING = 1 << 1;
    }
}

bitflags! {
    /// Flags carried above the `CallKind` bits of a system call number (see
    /// [`CallNumber`]).
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
    #[repr(transparent)]
    pub struct CallFlags: u32 {
        /// Return `ENOTREADY` instead of blocking if the call cannot
        /// complete immediately.
        const NON_BLOCKING = 1 << 0;
        /// Suppress delivery from the pending-notification bitmap or queue;
        /// only an actual reply will satisfy this receive. Set implicitly on
        /// the receive half of `SENDREC`.
        const FRESH_ANSWER = 1 << 1;
    }
}

bitflags! {
    /// Per-process privilege flags.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
    #[repr(transparent)]
    pub struct PrivFlags: u8 {
        /// Subject to quantum-based priority decay in `sched`.
        const PREEMPTIBLE = 1 << 0;
        /// Accrues CPU time against this process for accounting purposes.
        const BILLABLE = 1 << 1;
        /// New `ready()` insertions go to the head of the queue rather than
        /// the tail, favoring I/O-bound processes.
        const RDY_Q_HEAD = 1 << 2;
    }
}

/// Identifies which of the six callable functions a system call invokes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum CallKind {
    Send = 0,
    Receive = 1,
    SendRec = 2,
    Notify = 3,
    Alert = 4,
    Echo = 5,
}

/// We use an explicit `TryFrom` impl for `CallKind` instead of pulling in a
/// derive-macro crate for primitive conversion; the set of call numbers is
/// small and fixed.
impl core::convert::TryFrom<u32> for CallKind {
    type Error = ();

    fn try_from(x: u32) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(Self::Send),
            1 => Ok(Self::Receive),
            2 => Ok(Self::SendRec),
            3 => Ok(Self::Notify),
            4 => Ok(Self::Alert),
            5 => Ok(Self::Echo),
            _ => Err(()),
        }
    }
}

/// A system call number: a `CallKind` with `CallFlags` packed into the upper
/// bits.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CallNumber {
    pub kind: CallKind,
    pub flags: CallFlags,
}

impl CallNumber {
    const KIND_BITS: u32 = 8;
    const KIND_MASK: u32 = (1 << Self::KIND_BITS) - 1;

    pub fn decode(raw: u32) -> Result<Self, ()> {
        let kind = CallKind::try_from(raw & Self::KIND_MASK)?;
        let flags = CallFlags::from_bits(raw >> Self::KIND_BITS).ok_or(())?;
        Ok(Self { kind, flags })
    }

    pub fn encode(self) -> u32 {
        self.kind as u32 | (self.flags.bits() << Self::KIND_BITS)
    }
}

/// Fixed-layout IPC message. Exchanged between processes and synthesized by
/// the kernel for notifications and alerts.
#[derive(Copy, Clone, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Message {
    /// Raw `ProcNr` of the sender, filled in by the kernel on delivery.
    pub m_source: u16,
    _pad: u16,
    /// Caller-defined message type.
    pub m_type: i32,
    /// Message body, interpreted according to `m_type`.
    pub body: [u32; MESS_BODY_WORDS],
}

impl Default for Message {
    fn default() -> Self {
        Self {
            m_source: ProcNr::ANY.0,
            _pad: 0,
            m_type: 0,
            body: [0; MESS_BODY_WORDS],
        }
    }
}

/// Body-word indices used by kernel-synthesized notification messages. Named
/// the way the rest of this ABI names fixed message-body slots, so senders
/// and receivers agree on layout without sharing a struct definition.
pub mod notify_fields {
    pub const NOTIFY_SOURCE: usize = 0;
    pub const NOTIFY_TYPE: usize = 1;
    pub const NOTIFY_FLAGS: usize = 2;
    pub const NOTIFY_ARG: usize = 3;
    pub const NOTIFY_TIMESTAMP: usize = 4;
}

impl Message {
    pub fn source(&self) -> ProcNr {
        ProcNr(self.m_source)
    }

    pub fn set_source(&mut self, src: ProcNr) {
        self.m_source = src.0;
    }

    pub fn notify_source(&self) -> ProcNr {
        ProcNr(self.body[notify_fields::NOTIFY_SOURCE] as u16)
    }

    pub fn set_notify_source(&mut self, src: ProcNr) {
        self.body[notify_fields::NOTIFY_SOURCE] = u32::from(src.0);
    }

    pub fn notify_type(&self) -> u32 {
        self.body[notify_fields::NOTIFY_TYPE]
    }

    pub fn set_notify_type(&mut self, ty: u32) {
        self.body[notify_fields::NOTIFY_TYPE] = ty;
    }

    pub fn notify_flags(&self) -> u32 {
        self.body[notify_fields::NOTIFY_FLAGS]
    }

    pub fn set_notify_flags(&mut self, flags: u32) {
        self.body[notify_fields::NOTIFY_FLAGS] = flags;
    }

    pub fn notify_arg(&self) -> u32 {
        self.body[notify_fields::NOTIFY_ARG]
    }

    pub fn set_notify_arg(&mut self, arg: u32) {
        self.body[notify_fields::NOTIFY_ARG] = arg;
    }

    pub fn notify_timestamp(&self) -> u32 {
        self.body[notify_fields::NOTIFY_TIMESTAMP]
    }

    pub fn set_notify_timestamp(&mut self, ts: u32) {
        self.body[notify_fields::NOTIFY_TIMESTAMP] = ts;
    }
}

/// Per-process privilege record, provisioned externally and consulted
/// read-only during IPC.
#[derive(Clone, Debug)]
pub struct PrivilegeRecord {
    pub s_id: SysId,
    pub s_flags: PrivFlags,
    /// Bitmask of `CallKind`s this process is permitted to invoke, indexed by
    /// `1 << (kind as u32)`.
    pub s_call_mask: u32,
    /// Bitmask of destination `SysId`s this process is permitted to send,
    /// notify, or alert to.
    pub s_send_mask: u64,
    /// Bitmap of source `SysId`s with a notification pending delivery to this
    /// process.
    pub s_notify_pending: u64,
    /// Pending interrupt payload for the `HARDWARE` pseudo-source, OR-ed
    /// together across hardware alerts not yet delivered.
    pub s_int_pending: u32,
    /// Pending signal payload for the `SYSTEM` pseudo-source.
    pub s_sig_pending: u32,
    /// Canary checked in `unready` for kernel-task slots only.
    pub s_stack_guard: u32,
}

impl PrivilegeRecord {
    pub fn can_call(&self, kind: CallKind) -> bool {
        self.s_call_mask & (1 << kind as u32) != 0
    }

    pub fn can_send_to(&self, dst: SysId) -> bool {
        self.s_send_mask & (1u64 << dst.0) != 0
    }
}

/// Canary value expected in a kernel task's stack guard word.
pub const STACK_GUARD: u32 = 0xDEAD_C0DE;

/// Error codes returned synchronously to the immediate caller of a system
/// call. Never propagated across processes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(i32)]
pub enum SysCallError {
    /// Permission check failed: call mask or send mask denied the request.
    ECallDenied = -1,
    /// Invalid peer process number.
    EBadSrcDst = -2,
    /// Destination slot is empty.
    EDeadDst = -3,
    /// Message buffer lies outside the caller's address space.
    EFault = -4,
    /// The send would create a send-chain cycle.
    ELocked = -5,
    /// A non-blocking call found its peer not ready.
    ENotReady = -6,
    /// Notification buffer pool exhausted.
    ENoSpc = -7,
    /// Unknown call number.
    EBadCall = -8,
}

impl SysCallError {
    pub fn code(self) -> i32 {
        self as i32
    }
}
