//! Error types for the kernel core.

use thiserror::Error;

use super::Time;

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

/// Errors raised while handling an event. Every one of them aborts the
/// event before any state is changed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KernelError {
    /// PID outside the process table
    #[error("pid {pid} is out of range (process table holds {capacity})")]
    PidOutOfRange { pid: usize, capacity: usize },

    /// Semaphore id outside the bank
    #[error("semaphore {id} is out of range (bank holds {count})")]
    SemaphoreOutOfRange { id: usize, count: usize },

    /// UP on a semaphore whose counter is already at its maximum
    #[error("semaphore {0} would overflow")]
    SemaphoreOverflow(usize),

    /// Unrecognised trap opcode in R1
    #[error("invalid trap opcode: {0}")]
    InvalidOpcode(u32),

    /// A trap arrived while the processor was idle
    #[error("trap raised while no process is running")]
    NoRunningProcess,

    /// Fork targeted a slot that is still live
    #[error("pid {0} is already in use")]
    PidInUse(usize),

    /// Device completion for a process that is not waiting
    #[error("pid {0} is not blocked")]
    NotBlocked(usize),

    /// Device completion with nothing outstanding
    #[error("device completion for pid {0} with no outstanding requests")]
    NoOutstandingRequests(usize),

    /// Event time earlier than the previous one
    #[error("time went backwards: {now} < {last}")]
    TimeWentBackwards { now: Time, last: Time },

    /// Boot configuration rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Event delivered after shutdown or deadlock
    #[error("kernel has halted")]
    Halted,
}
