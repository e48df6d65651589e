// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Message-passing and scheduling core of a microkernel.
//!
//! This crate implements the synchronous (`SEND`/`RECEIVE`/`SENDREC`) and
//! non-blocking (`NOTIFY`/`ALERT`) IPC primitives, the multilevel priority
//! ready-queue scheduler that decides which process runs next, and the
//! dispatcher and lock gateways that bind the two together. Everything here
//! runs with interrupts disabled and is not reentrant; callers coming from
//! interrupt context or task context must go through the lock gateways in
//! [`lock`].
//!
//! Design principles, in descending order of importance:
//!
//! 1. A process's scheduling and IPC state lives entirely in its process
//!    slot and its privilege record; there is no hidden global state beyond
//!    the ready queues and the notification pool.
//! 2. Every fallible entry point returns a `Result` carrying one of the
//!    error codes in [`abi::SysCallError`]; the kernel never silently drops
//!    a request.
//! 3. Only two conditions are fatal: a kernel-task stack-guard mismatch, and
//!    (when compiled with the `debug-sched-check` feature) a detected
//!    ready-queue consistency violation.

#![cfg_attr(not(test), no_std)]

/// Kernel-internal logging. Under `std` (tests, or a future hosted build)
/// this is a thin wrapper over `eprintln!`; otherwise it compiles away
/// entirely, since the kernel cannot assume a working console exists at most
/// of its call sites.
#[cfg(any(test, feature = "std"))]
macro_rules! klog {
    ($s:expr) => { std::eprintln!($s) };
    ($s:expr, $($tt:tt)*) => { std::eprintln!($s, $($tt)*) };
}

#[cfg(not(any(test, feature = "std")))]
macro_rules! klog {
    ($s:expr) => {};
    ($s:expr, $($tt:tt)*) => {};
}

macro_rules! uassert {
    ($cond:expr) => {
        if !$cond {
            panic!("assertion failed: {}", stringify!($cond));
        }
    };
}

pub(crate) use klog;
pub(crate) use uassert;

pub mod config;
pub mod err;
pub mod ipc;
pub mod kernel;
pub mod mem;
pub mod notify;
pub mod proc;
pub mod queue;
pub mod sched;
pub mod syscall;

pub mod lock;

pub use abi::{CallFlags, CallKind, ProcNr, SysCallError, SysId};
pub use err::NextProc;
pub use kernel::Kernel;

#[cfg(test)]
mod tests;
