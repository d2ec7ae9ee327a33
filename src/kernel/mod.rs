mod config;
mod context;
mod error;
mod interrupts;
mod pid_queue;
mod process_control_block;
mod semaphore;
mod short_term_scheduler;
mod trace;

/// Simulated clock value.
pub type Time = u64;

pub use config::{ConfigError, KernelConfig};
pub use context::{Control, Halt, Kernel};
pub use error::{KernelError, KernelResult};
pub use interrupts::{opcode, DeviceBus, Event, Registers, SemaphoreOp, Trap};
pub use pid_queue::PidQueue;
pub use process_control_block::{Pid, ProcessControlBlock, ProcessState, ProcessTable};
pub use semaphore::{Semaphore, SemaphoreBank, SemaphoreId, NUMBER_OF_SEMAPHORES};
pub use short_term_scheduler::CpuState;
pub use trace::{Device, TraceLine};

use short_term_scheduler::{Dispatch, ShortTermScheduler};
