//! Interrupt and trap handling.
//!
//! The machine raises four kinds of event. Traps come from the running
//! process and carry their arguments in three register operands: R1 holds
//! the opcode, R2 a PID, semaphore id or block number, and R3 the up/down
//! flag of a semaphore operation. Device completions name the process whose
//! request finished.

use tracing::{debug, info};

use super::*;

/// Trap opcodes as they appear in R1.
pub mod opcode {
    pub const DISK_READ: u32 = 0;
    pub const DISK_WRITE: u32 = 1;
    pub const KEYBOARD_READ: u32 = 2;
    pub const FORK_PROGRAM: u32 = 3;
    pub const END_PROGRAM: u32 = 4;
    pub const SEMAPHORE_OP: u32 = 5;
}

/// Outbound device requests. Completions come back later as
/// [`Event::DiskInterrupt`] or [`Event::KeyboardInterrupt`].
pub trait DeviceBus {
    fn issue_disk_read(&mut self, pid: Pid, block: u32);
    fn issue_disk_write(&mut self, pid: Pid);
    fn issue_keyboard_read(&mut self, pid: Pid);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
}

impl Registers {
    pub fn new(r1: u32, r2: u32, r3: u32) -> Registers {
        Registers { r1, r2, r3 }
    }

    pub fn disk_read(block: u32) -> Registers {
        Registers::new(opcode::DISK_READ, block, 0)
    }

    pub fn disk_write() -> Registers {
        Registers::new(opcode::DISK_WRITE, 0, 0)
    }

    pub fn keyboard_read() -> Registers {
        Registers::new(opcode::KEYBOARD_READ, 0, 0)
    }

    pub fn fork(child: u32) -> Registers {
        Registers::new(opcode::FORK_PROGRAM, child, 0)
    }

    pub fn end() -> Registers {
        Registers::new(opcode::END_PROGRAM, 0, 0)
    }

    pub fn semaphore(id: u32, op: SemaphoreOp) -> Registers {
        let flag = match op {
            SemaphoreOp::Up => 1,
            SemaphoreOp::Down => 0,
        };
        Registers::new(opcode::SEMAPHORE_OP, id, flag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaphoreOp {
    Up,
    Down,
}

/// A decoded trap. Operands are still raw here; they are range-checked
/// against the table or bank when handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    DiskRead { block: u32 },
    DiskWrite,
    KeyboardRead,
    Fork { child: usize },
    End,
    Semaphore { id: usize, op: SemaphoreOp },
}

impl Trap {
    pub fn decode(registers: Registers) -> KernelResult<Trap> {
        let trap = match registers.r1 {
            opcode::DISK_READ => Trap::DiskRead { block: registers.r2 },
            opcode::DISK_WRITE => Trap::DiskWrite,
            opcode::KEYBOARD_READ => Trap::KeyboardRead,
            opcode::FORK_PROGRAM => Trap::Fork {
                child: registers.r2 as usize,
            },
            opcode::END_PROGRAM => Trap::End,
            opcode::SEMAPHORE_OP => Trap::Semaphore {
                id: registers.r2 as usize,
                op: if registers.r3 != 0 {
                    SemaphoreOp::Up
                } else {
                    SemaphoreOp::Down
                },
            },
            other => return Err(KernelError::InvalidOpcode(other)),
        };
        Ok(trap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Trap(Registers),
    ClockInterrupt,
    DiskInterrupt { pid: usize },
    KeyboardInterrupt { pid: usize },
}

impl Kernel {
    pub(super) fn handle_clock_interrupt(&mut self, now: Time) -> Control {
        if !self.sts.quantum_expired(now) {
            return Control::Continue;
        }

        if let Some(pid) = self.sts.charge_running(&mut self.table, now) {
            debug!(time = now, pid = pid.index(), "quantum expired");
            self.table.set_state(pid, ProcessState::Ready);
            self.sts.schedule_process(pid);
        }
        self.reschedule(now)
    }

    pub(super) fn handle_completion(
        &mut self,
        now: Time,
        device: Device,
        pid: usize,
    ) -> KernelResult<Control> {
        let pid = self.table.validate(pid)?;
        if self.table.get(pid).state != ProcessState::Blocked {
            return Err(KernelError::NotBlocked(pid.index()));
        }
        if self.outstanding_requests == 0 {
            return Err(KernelError::NoOutstandingRequests(pid.index()));
        }

        self.outstanding_requests -= 1;
        self.trace.push(TraceLine::Handled {
            time: now,
            device,
            pid,
        });
        self.table.set_state(pid, ProcessState::Ready);
        self.sts.schedule_process(pid);

        // A busy CPU keeps its occupant; the woken process waits its turn.
        if self.sts.current() == CpuState::Idle {
            Ok(self.reschedule(now))
        } else {
            Ok(Control::Continue)
        }
    }

    pub(super) fn handle_trap(
        &mut self,
        now: Time,
        registers: Registers,
        bus: &mut dyn DeviceBus,
    ) -> KernelResult<Control> {
        let trap = Trap::decode(registers)?;
        let pid = match self.sts.current() {
            CpuState::Running(pid) => pid,
            CpuState::Idle => return Err(KernelError::NoRunningProcess),
        };
        debug!(time = now, pid = pid.index(), ?trap, "trap");

        match trap {
            Trap::DiskRead { block } => {
                self.outstanding_requests += 1;
                self.trace.push(TraceLine::DiskRead { time: now, pid });
                bus.issue_disk_read(pid, block);
                Ok(self.block_running(now))
            }
            Trap::DiskWrite => {
                self.trace.push(TraceLine::DiskWrite { time: now, pid });
                bus.issue_disk_write(pid);
                Ok(Control::Continue)
            }
            Trap::KeyboardRead => {
                self.outstanding_requests += 1;
                self.trace.push(TraceLine::KeyboardRead { time: now, pid });
                bus.issue_keyboard_read(pid);
                Ok(self.block_running(now))
            }
            Trap::Fork { child } => {
                self.fork(now, child)?;
                Ok(Control::Continue)
            }
            Trap::End => Ok(self.end_running(now, pid)),
            Trap::Semaphore { id, op } => {
                let sem = self.semaphores.validate(id)?;
                match op {
                    SemaphoreOp::Up => {
                        if self.semaphores.get(sem).is_saturated() {
                            return Err(KernelError::SemaphoreOverflow(sem.index()));
                        }
                        self.trace.push(TraceLine::Up { time: now, pid, sem });
                        self.up(sem);
                        Ok(Control::Continue)
                    }
                    SemaphoreOp::Down => {
                        self.trace.push(TraceLine::Down { time: now, pid, sem });
                        Ok(self.down(now, sem))
                    }
                }
            }
        }
    }

    /// The parent keeps the CPU.
    fn fork(&mut self, now: Time, child: usize) -> KernelResult<()> {
        let child = self.table.validate(child)?;
        if self.table.get(child).state != ProcessState::Uninitialized {
            return Err(KernelError::PidInUse(child.index()));
        }

        self.num_processes += 1;
        self.trace.push(TraceLine::Fork { time: now, pid: child });
        self.table.set_state(child, ProcessState::Ready);
        self.sts.schedule_process(child);
        Ok(())
    }

    fn end_running(&mut self, now: Time, pid: Pid) -> Control {
        self.num_processes -= 1;
        self.sts.charge_running(&mut self.table, now);

        let cpu_time = self.table.get(pid).get_total_cpu_time();
        info!(time = now, pid = pid.index(), cpu_time, "process exited");
        self.trace.push(TraceLine::Exit {
            time: now,
            pid,
            cpu_time,
        });
        self.table.get_mut(pid).release();

        if self.num_processes == 0 {
            self.sts.stop();
            self.trace.push(TraceLine::NoMoreProcesses);
            return Control::Halt(Halt::Finished);
        }
        self.reschedule(now)
    }

    fn block_running(&mut self, now: Time) -> Control {
        if let Some(pid) = self.sts.charge_running(&mut self.table, now) {
            self.table.set_state(pid, ProcessState::Blocked);
        }
        self.reschedule(now)
    }

    /// Takes a unit, or parks the running process on the wait queue. A parked
    /// process is handed its unit directly by a later `up`.
    fn down(&mut self, now: Time, sem: SemaphoreId) -> Control {
        if self.semaphores.get_mut(sem).try_down() {
            return Control::Continue;
        }

        if let Some(pid) = self.sts.charge_running(&mut self.table, now) {
            debug!(time = now, pid = pid.index(), sem = sem.index(), "blocked on semaphore");
            self.table.set_state(pid, ProcessState::Blocked);
            self.semaphores.get_mut(sem).wait(pid);
        }
        self.reschedule(now)
    }

    fn up(&mut self, sem: SemaphoreId) {
        if let Some(waiter) = self.semaphores.get_mut(sem).up() {
            debug!(pid = waiter.index(), sem = sem.index(), "woken by semaphore");
            self.table.set_state(waiter, ProcessState::Ready);
            self.sts.schedule_process(waiter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::RequestLog;

    fn boot() -> (Kernel, RequestLog) {
        (
            Kernel::boot(&KernelConfig::default(), 0).unwrap(),
            RequestLog::new(),
        )
    }

    fn trap(kernel: &mut Kernel, bus: &mut RequestLog, now: Time, registers: Registers) -> Control {
        kernel.handle(now, Event::Trap(registers), bus).unwrap()
    }

    fn lines(kernel: &mut Kernel) -> Vec<String> {
        kernel.drain_trace().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_trap_decode() {
        assert_eq!(Trap::decode(Registers::disk_read(7)), Ok(Trap::DiskRead { block: 7 }));
        assert_eq!(Trap::decode(Registers::fork(3)), Ok(Trap::Fork { child: 3 }));
        assert_eq!(
            Trap::decode(Registers::new(opcode::SEMAPHORE_OP, 2, 5)),
            Ok(Trap::Semaphore { id: 2, op: SemaphoreOp::Up })
        );
        assert_eq!(
            Trap::decode(Registers::semaphore(2, SemaphoreOp::Down)),
            Ok(Trap::Semaphore { id: 2, op: SemaphoreOp::Down })
        );
        assert_eq!(Trap::decode(Registers::new(6, 0, 0)), Err(KernelError::InvalidOpcode(6)));
    }

    #[test]
    fn test_invalid_opcode_changes_nothing() {
        let (mut kernel, mut bus) = boot();

        let result = kernel.handle(5, Event::Trap(Registers::new(42, 1, 1)), &mut bus);
        assert_eq!(result, Err(KernelError::InvalidOpcode(42)));
        assert_eq!(kernel.current(), CpuState::Running(Pid::new(0)));
        assert!(kernel.drain_trace().is_empty());
    }

    #[test]
    fn test_disk_write_keeps_caller_running() {
        let (mut kernel, mut bus) = boot();

        assert_eq!(trap(&mut kernel, &mut bus, 3, Registers::disk_write()), Control::Continue);
        assert_eq!(kernel.current(), CpuState::Running(Pid::new(0)));
        assert_eq!(kernel.outstanding_requests(), 0);
        assert_eq!(bus.disk_writes(), 1);
        assert_eq!(lines(&mut kernel), vec!["Time 3: Process 0 issues disk write request"]);
    }

    #[test]
    fn test_keyboard_read_blocks_until_completion() {
        let (mut kernel, mut bus) = boot();

        trap(&mut kernel, &mut bus, 10, Registers::keyboard_read());
        assert_eq!(kernel.state_of(0).unwrap(), ProcessState::Blocked);
        assert_eq!(kernel.current(), CpuState::Idle);
        assert_eq!(kernel.outstanding_requests(), 1);
        assert_eq!(kernel.cpu_time_of(0).unwrap(), 10);

        kernel.handle(30, Event::KeyboardInterrupt { pid: 0 }, &mut bus).unwrap();
        assert_eq!(kernel.current(), CpuState::Running(Pid::new(0)));
        assert_eq!(kernel.outstanding_requests(), 0);
        assert_eq!(
            lines(&mut kernel),
            vec![
                "Time 10: Process 0 issues keyboard read request",
                "Time 10: Processor is idle",
                "Time 30: Handled KEYBOARD_INTERRUPT for pid 0",
                "Time 30: Process 0 runs",
            ]
        );
    }

    #[test]
    fn test_completion_while_busy_does_not_preempt() {
        let (mut kernel, mut bus) = boot();

        trap(&mut kernel, &mut bus, 0, Registers::fork(1));
        trap(&mut kernel, &mut bus, 2, Registers::disk_read(4));
        assert_eq!(kernel.current(), CpuState::Running(Pid::new(1)));

        kernel.handle(8, Event::DiskInterrupt { pid: 0 }, &mut bus).unwrap();
        assert_eq!(kernel.current(), CpuState::Running(Pid::new(1)));
        assert_eq!(kernel.state_of(0).unwrap(), ProcessState::Ready);
        assert_eq!(kernel.ready_queue().iter().map(Pid::index).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_completion_for_running_process_rejected() {
        let (mut kernel, mut bus) = boot();

        assert_eq!(
            kernel.handle(1, Event::DiskInterrupt { pid: 0 }, &mut bus),
            Err(KernelError::NotBlocked(0))
        );
        assert_eq!(
            kernel.handle(1, Event::DiskInterrupt { pid: 11 }, &mut bus),
            Err(KernelError::PidOutOfRange { pid: 11, capacity: 10 })
        );
    }

    #[test]
    fn test_completion_without_outstanding_request_rejected() {
        let (mut kernel, mut bus) = boot();

        trap(&mut kernel, &mut bus, 0, Registers::fork(1));
        trap(&mut kernel, &mut bus, 1, Registers::semaphore(0, SemaphoreOp::Down));
        trap(&mut kernel, &mut bus, 3, Registers::semaphore(0, SemaphoreOp::Down));
        assert_eq!(kernel.state_of(0).unwrap(), ProcessState::Blocked);
        assert_eq!(kernel.current(), CpuState::Running(Pid::new(1)));

        assert_eq!(
            kernel.handle(4, Event::DiskInterrupt { pid: 0 }, &mut bus),
            Err(KernelError::NoOutstandingRequests(0))
        );
    }

    #[test]
    fn test_fork_rejects_live_and_out_of_range_pids() {
        let (mut kernel, mut bus) = boot();

        assert_eq!(
            kernel.handle(0, Event::Trap(Registers::fork(0)), &mut bus),
            Err(KernelError::PidInUse(0))
        );
        assert_eq!(
            kernel.handle(0, Event::Trap(Registers::fork(10)), &mut bus),
            Err(KernelError::PidOutOfRange { pid: 10, capacity: 10 })
        );
        assert_eq!(kernel.num_processes(), 1);
        assert!(kernel.drain_trace().is_empty());
    }

    #[test]
    fn test_fork_reuses_released_slot() {
        let (mut kernel, mut bus) = boot();

        trap(&mut kernel, &mut bus, 0, Registers::fork(1));
        trap(&mut kernel, &mut bus, 5, Registers::end());
        assert_eq!(kernel.state_of(0).unwrap(), ProcessState::Uninitialized);
        assert_eq!(kernel.current(), CpuState::Running(Pid::new(1)));

        trap(&mut kernel, &mut bus, 9, Registers::fork(0));
        assert_eq!(kernel.state_of(0).unwrap(), ProcessState::Ready);
        assert_eq!(kernel.cpu_time_of(0).unwrap(), 0);
        assert_eq!(kernel.num_processes(), 2);
    }

    #[test]
    fn test_semaphore_out_of_range() {
        let (mut kernel, mut bus) = boot();

        assert_eq!(
            kernel.handle(0, Event::Trap(Registers::semaphore(16, SemaphoreOp::Up)), &mut bus),
            Err(KernelError::SemaphoreOutOfRange { id: 16, count: 16 })
        );
        assert!(kernel.drain_trace().is_empty());
    }

    #[test]
    fn test_semaphore_up_overflow_rejected() {
        let config = KernelConfig {
            initial_semaphore_value: u32::MAX,
            ..KernelConfig::default()
        };
        let mut kernel = Kernel::boot(&config, 0).unwrap();
        let mut bus = RequestLog::new();

        assert_eq!(
            kernel.handle(1, Event::Trap(Registers::semaphore(0, SemaphoreOp::Up)), &mut bus),
            Err(KernelError::SemaphoreOverflow(0))
        );
        assert_eq!(kernel.semaphore(0).unwrap().value(), u32::MAX);
        assert!(kernel.drain_trace().is_empty());

        // Once a unit is taken the counter has room again.
        trap(&mut kernel, &mut bus, 2, Registers::semaphore(0, SemaphoreOp::Down));
        trap(&mut kernel, &mut bus, 3, Registers::semaphore(0, SemaphoreOp::Up));
        assert_eq!(kernel.semaphore(0).unwrap().value(), u32::MAX);
    }

    #[test]
    fn test_trap_while_idle_rejected() {
        let (mut kernel, mut bus) = boot();

        trap(&mut kernel, &mut bus, 0, Registers::disk_read(1));
        assert_eq!(
            kernel.handle(1, Event::Trap(Registers::disk_write()), &mut bus),
            Err(KernelError::NoRunningProcess)
        );
    }

    #[test]
    fn test_clock_before_quantum_is_noop() {
        let (mut kernel, mut bus) = boot();

        trap(&mut kernel, &mut bus, 0, Registers::fork(1));
        kernel.drain_trace();

        kernel.handle(39, Event::ClockInterrupt, &mut bus).unwrap();
        assert_eq!(kernel.current(), CpuState::Running(Pid::new(0)));
        assert!(kernel.drain_trace().is_empty());
    }

    #[test]
    fn test_clock_requeues_sole_process() {
        let (mut kernel, mut bus) = boot();

        kernel.handle(40, Event::ClockInterrupt, &mut bus).unwrap();
        assert_eq!(kernel.current(), CpuState::Running(Pid::new(0)));
        assert_eq!(kernel.cpu_time_of(0).unwrap(), 40);
        assert_eq!(lines(&mut kernel), vec!["Time 40: Process 0 runs"]);
    }

    #[test]
    fn test_clock_while_idle_is_noop() {
        let (mut kernel, mut bus) = boot();

        trap(&mut kernel, &mut bus, 0, Registers::disk_read(0));
        kernel.drain_trace();

        kernel.handle(100, Event::ClockInterrupt, &mut bus).unwrap();
        assert_eq!(kernel.current(), CpuState::Idle);
        assert!(kernel.drain_trace().is_empty());
    }

    #[test]
    fn test_semaphore_deadlock() {
        let (mut kernel, mut bus) = boot();

        trap(&mut kernel, &mut bus, 0, Registers::semaphore(1, SemaphoreOp::Down));
        let control = trap(&mut kernel, &mut bus, 4, Registers::semaphore(1, SemaphoreOp::Down));

        assert_eq!(control, Control::Halt(Halt::Deadlock));
        assert_eq!(kernel.halted(), Some(Halt::Deadlock));
        assert_eq!(
            lines(&mut kernel),
            vec![
                "Time 0: Process 0 issues DOWN operation on semaphore 1",
                "Time 4: Process 0 issues DOWN operation on semaphore 1",
                "deadlock",
            ]
        );
    }
}
