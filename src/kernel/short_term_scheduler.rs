use tracing::debug;

use super::{Pid, PidQueue, ProcessState, ProcessTable, Time, TraceLine};

/// What occupies the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Idle,
    Running(Pid),
}

/// Result of one pass of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Running(Pid),
    Idle,
    /// Nothing ready, nothing running, nothing that could ever wake a process.
    Deadlock,
}

/// Round-robin short-term scheduler. Owns the ready queue and the running
/// context; strict FIFO selection, every preemption requeues at the tail.
pub(crate) struct ShortTermScheduler {
    ready_queue: PidQueue,
    current: CpuState,
    quantum_start: Time,
    quantum: Time,
}

impl ShortTermScheduler {
    /// The boot process starts on the CPU with a fresh quantum.
    pub fn new(boot_pid: Pid, now: Time, quantum: Time) -> ShortTermScheduler {
        ShortTermScheduler {
            ready_queue: PidQueue::new(),
            current: CpuState::Running(boot_pid),
            quantum_start: now,
            quantum,
        }
    }

    pub fn current(&self) -> CpuState {
        self.current
    }

    pub fn ready_queue(&self) -> &PidQueue {
        &self.ready_queue
    }

    pub fn quantum_start(&self) -> Time {
        self.quantum_start
    }

    /// Leaves the CPU empty without consulting the ready queue.
    pub fn stop(&mut self) {
        self.current = CpuState::Idle;
    }

    pub fn schedule_process(&mut self, pid: Pid) {
        self.ready_queue.enqueue(pid);
    }

    pub fn quantum_expired(&self, now: Time) -> bool {
        matches!(self.current, CpuState::Running(_))
            && now.saturating_sub(self.quantum_start) >= self.quantum
    }

    /// Charges the running process for the time since its quantum started
    /// and restarts the quantum at `now`.
    pub fn charge_running(&mut self, table: &mut ProcessTable, now: Time) -> Option<Pid> {
        match self.current {
            CpuState::Running(pid) => {
                let elapsed = now.saturating_sub(self.quantum_start);
                table.get_mut(pid).charge(elapsed);
                self.quantum_start = now;
                Some(pid)
            }
            CpuState::Idle => None,
        }
    }

    /// Picks the next process to run. The caller has already moved the
    /// previous occupant out of the Running state.
    pub fn dispatch(
        &mut self,
        table: &mut ProcessTable,
        outstanding_requests: usize,
        now: Time,
        trace: &mut Vec<TraceLine>,
    ) -> Dispatch {
        match self.ready_queue.dequeue() {
            Some(pid) => {
                debug_assert_eq!(table.get(pid).state, ProcessState::Ready);
                table.set_state(pid, ProcessState::Running);
                self.current = CpuState::Running(pid);
                self.quantum_start = now;
                debug!(time = now, pid = pid.index(), "dispatched");
                trace.push(TraceLine::Runs { time: now, pid });
                Dispatch::Running(pid)
            }
            None if outstanding_requests == 0 => {
                self.current = CpuState::Idle;
                debug!(time = now, "ready queue empty with no outstanding requests");
                trace.push(TraceLine::Deadlock);
                Dispatch::Deadlock
            }
            None => {
                if self.current != CpuState::Idle {
                    debug!(time = now, outstanding_requests, "processor idle");
                    trace.push(TraceLine::Idle { time: now });
                }
                self.current = CpuState::Idle;
                Dispatch::Idle
            }
        }
    }
}
