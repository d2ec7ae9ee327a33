use std::fmt;

use super::{KernelError, KernelResult, Time};

/// Process identifier. Only the process table hands these out, so holding
/// one means the index is in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(usize);

impl Pid {
    pub(crate) fn new(index: usize) -> Pid {
        Pid(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Uninitialized,
    Ready,
    Running,
    Blocked,
}

/// The process control block. Scheduling metadata only.
#[derive(Debug, Clone)]
pub struct ProcessControlBlock {
    pub state: ProcessState,
    total_cpu_time: Time,
}

impl ProcessControlBlock {
    pub fn new() -> ProcessControlBlock {
        ProcessControlBlock {
            state: ProcessState::Uninitialized,
            total_cpu_time: 0,
        }
    }

    pub fn get_total_cpu_time(&self) -> Time {
        self.total_cpu_time
    }

    pub fn charge(&mut self, elapsed: Time) {
        self.total_cpu_time += elapsed;
    }

    /// Clears the entry so the slot can be handed to a later fork.
    pub fn release(&mut self) {
        self.state = ProcessState::Uninitialized;
        self.total_cpu_time = 0;
    }
}

impl Default for ProcessControlBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-capacity table of process control blocks, indexed by PID.
pub struct ProcessTable {
    entries: Vec<ProcessControlBlock>,
}

impl ProcessTable {
    pub fn new(capacity: usize) -> ProcessTable {
        ProcessTable {
            entries: vec![ProcessControlBlock::new(); capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Range-checks a raw PID taken from an event operand.
    pub fn validate(&self, raw: usize) -> KernelResult<Pid> {
        if raw < self.entries.len() {
            Ok(Pid(raw))
        } else {
            Err(KernelError::PidOutOfRange {
                pid: raw,
                capacity: self.entries.len(),
            })
        }
    }

    pub fn get(&self, pid: Pid) -> &ProcessControlBlock {
        &self.entries[pid.0]
    }

    pub fn get_mut(&mut self, pid: Pid) -> &mut ProcessControlBlock {
        &mut self.entries[pid.0]
    }

    pub fn set_state(&mut self, pid: Pid, state: ProcessState) {
        self.entries[pid.0].state = state;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Pid, &ProcessControlBlock)> {
        self.entries.iter().enumerate().map(|(idx, pcb)| (Pid(idx), pcb))
    }
}
