use tracing::{debug, info};

use super::*;

/// Why the kernel stopped accepting events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// The last live process exited.
    Finished,
    /// Nothing can ever become ready again.
    Deadlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Halt(Halt),
}

/// The whole scheduling state of the simulated machine. Every event goes
/// through [`Kernel::handle`] and runs to completion before the next one.
pub struct Kernel {
    pub(super) table: ProcessTable,
    pub(super) sts: ShortTermScheduler,
    pub(super) semaphores: SemaphoreBank,
    pub(super) outstanding_requests: usize,
    pub(super) num_processes: usize,
    pub(super) trace: Vec<TraceLine>,
    last_time: Time,
    halted: Option<Halt>,
}

impl Kernel {
    /// Boots with process 0 on the CPU and its quantum starting at `now`.
    pub fn boot(config: &KernelConfig, now: Time) -> KernelResult<Kernel> {
        config
            .validate()
            .map_err(|err| KernelError::InvalidConfig(err.to_string()))?;

        let mut table = ProcessTable::new(config.max_processes);
        let boot_pid = table.validate(0)?;
        table.set_state(boot_pid, ProcessState::Running);

        debug!(
            max_processes = config.max_processes,
            quantum = config.quantum,
            initial_semaphore_value = config.initial_semaphore_value,
            "kernel booted"
        );

        Ok(Kernel {
            table,
            sts: ShortTermScheduler::new(boot_pid, now, config.quantum),
            semaphores: SemaphoreBank::new(config.initial_semaphore_value),
            outstanding_requests: 0,
            num_processes: 1,
            trace: Vec::new(),
            last_time: now,
            halted: None,
        })
    }

    /// Single entry point for every event the machine delivers.
    pub fn handle(
        &mut self,
        now: Time,
        event: Event,
        bus: &mut dyn DeviceBus,
    ) -> KernelResult<Control> {
        if self.halted.is_some() {
            return Err(KernelError::Halted);
        }
        if now < self.last_time {
            return Err(KernelError::TimeWentBackwards {
                now,
                last: self.last_time,
            });
        }

        let control = match event {
            Event::Trap(registers) => self.handle_trap(now, registers, bus)?,
            Event::ClockInterrupt => self.handle_clock_interrupt(now),
            Event::DiskInterrupt { pid } => self.handle_completion(now, Device::Disk, pid)?,
            Event::KeyboardInterrupt { pid } => {
                self.handle_completion(now, Device::Keyboard, pid)?
            }
        };
        self.last_time = now;

        if let Control::Halt(halt) = control {
            info!(time = now, ?halt, "kernel halted");
            self.halted = Some(halt);
        }
        Ok(control)
    }

    /// Runs the dispatcher once the CPU's occupant has left it.
    pub(super) fn reschedule(&mut self, now: Time) -> Control {
        match self.sts.dispatch(
            &mut self.table,
            self.outstanding_requests,
            now,
            &mut self.trace,
        ) {
            Dispatch::Deadlock => Control::Halt(Halt::Deadlock),
            Dispatch::Running(_) | Dispatch::Idle => Control::Continue,
        }
    }

    /// Takes the trace lines produced since the last call.
    pub fn drain_trace(&mut self) -> Vec<TraceLine> {
        std::mem::take(&mut self.trace)
    }

    pub fn current(&self) -> CpuState {
        self.sts.current()
    }

    pub fn ready_queue(&self) -> &PidQueue {
        self.sts.ready_queue()
    }

    /// When the running process's current quantum began.
    pub fn quantum_start(&self) -> Time {
        self.sts.quantum_start()
    }

    pub fn state_of(&self, pid: usize) -> KernelResult<ProcessState> {
        let pid = self.table.validate(pid)?;
        Ok(self.table.get(pid).state)
    }

    pub fn cpu_time_of(&self, pid: usize) -> KernelResult<Time> {
        let pid = self.table.validate(pid)?;
        Ok(self.table.get(pid).get_total_cpu_time())
    }

    pub fn semaphore(&self, id: usize) -> KernelResult<&Semaphore> {
        let id = self.semaphores.validate(id)?;
        Ok(self.semaphores.get(id))
    }

    pub fn semaphores(&self) -> impl Iterator<Item = &Semaphore> {
        self.semaphores.iter()
    }

    pub fn processes(&self) -> impl Iterator<Item = (Pid, &ProcessControlBlock)> {
        self.table.iter()
    }

    pub fn outstanding_requests(&self) -> usize {
        self.outstanding_requests
    }

    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    pub fn halted(&self) -> Option<Halt> {
        self.halted
    }
}
