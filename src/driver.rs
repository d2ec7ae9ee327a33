use std::io::Write;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::io::{DeviceError, RequestLog, Script, ScriptError};
use crate::kernel::{
    ConfigError, Control, Device, Event, Halt, Kernel, KernelConfig, KernelError, ProcessState,
    Time,
};

const BOOT_TIME: Time = 0;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("line {line}: {source}")]
    Kernel { line: usize, source: KernelError },

    #[error("line {line}: {source}")]
    Device { line: usize, source: DeviceError },

    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to write trace: {0}")]
    Output(#[from] std::io::Error),
}

/// How a replayed script ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every process exited.
    Finished,
    Deadlock,
    /// The script ran out while processes were still live.
    ScriptExhausted,
}

impl RunOutcome {
    pub fn exit_code(self) -> u8 {
        match self {
            RunOutcome::Finished | RunOutcome::ScriptExhausted => 0,
            RunOutcome::Deadlock => 1,
        }
    }
}

/// Stands in for the simulated machine: delivers script events to the
/// kernel one at a time and prints the trace they produce.
pub struct Driver {
    kernel: Kernel,
    devices: RequestLog,
}

impl Driver {
    pub fn new(config: &KernelConfig) -> Result<Driver, DriverError> {
        config.validate()?;
        let kernel = Kernel::boot(config, BOOT_TIME).map_err(|source| DriverError::Kernel {
            line: 0,
            source,
        })?;

        Ok(Driver {
            kernel,
            devices: RequestLog::new(),
        })
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn devices(&self) -> &RequestLog {
        &self.devices
    }

    pub fn run<W: Write>(&mut self, script: &Script, out: &mut W) -> Result<RunOutcome, DriverError> {
        debug!(events = script.len(), "replaying script");

        for entry in script.iter() {
            let completed = match entry.event {
                Event::DiskInterrupt { pid } => Some((Device::Disk, pid)),
                Event::KeyboardInterrupt { pid } => Some((Device::Keyboard, pid)),
                Event::Trap(_) | Event::ClockInterrupt => None,
            };
            if let Some((device, pid)) = completed {
                self.kernel
                    .state_of(pid)
                    .map_err(|source| DriverError::Kernel {
                        line: entry.line,
                        source,
                    })?;
                if !self.devices.is_pending(device, pid) {
                    return Err(DriverError::Device {
                        line: entry.line,
                        source: DeviceError::NoPendingRequest { device, pid },
                    });
                }
            }

            let control = self
                .kernel
                .handle(entry.time, entry.event, &mut self.devices)
                .map_err(|source| DriverError::Kernel {
                    line: entry.line,
                    source,
                })?;

            // The ledger only changes once the kernel has taken the event.
            if let Some((device, pid)) = completed {
                self.devices
                    .complete(device, pid)
                    .map_err(|source| DriverError::Device {
                        line: entry.line,
                        source,
                    })?;
            }

            for line in self.kernel.drain_trace() {
                writeln!(out, "{}", line)?;
            }

            if let Control::Halt(halt) = control {
                return Ok(match halt {
                    Halt::Finished => RunOutcome::Finished,
                    Halt::Deadlock => RunOutcome::Deadlock,
                });
            }
        }

        warn!(
            num_processes = self.kernel.num_processes(),
            pending_requests = self.devices.pending(),
            "script ended with live processes"
        );
        self.report();
        Ok(RunOutcome::ScriptExhausted)
    }

    fn report(&self) {
        for (pid, pcb) in self.kernel.processes() {
            if pcb.state != ProcessState::Uninitialized {
                info!(
                    pid = pid.index(),
                    state = ?pcb.state,
                    cpu_time = pcb.get_total_cpu_time(),
                    "live process"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::io::parse_script;

    fn run(text: &str) -> (Result<RunOutcome, DriverError>, String) {
        let script = parse_script(Cursor::new(text)).unwrap();
        let mut driver = Driver::new(&KernelConfig::default()).unwrap();
        let mut out = Vec::new();
        let outcome = driver.run(&script, &mut out);
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_driver_run_to_completion() {
        let (outcome, out) = run("0 TRAP FORK 1\n10 TRAP END\n25 TRAP END\n");

        assert_eq!(outcome.unwrap(), RunOutcome::Finished);
        assert_eq!(
            out,
            "Time 0: Creating process entry for pid 1\n\
             Time 10: Process 0 exits.  Total CPU time = 10\n\
             Time 10: Process 1 runs\n\
             Time 25: Process 1 exits.  Total CPU time = 15\n\
             -- No more processes to execute --\n"
        );
    }

    #[test]
    fn test_driver_deadlock_exit_code() {
        let (outcome, out) = run("0 TRAP SEM DOWN 2\n1 TRAP SEM DOWN 2\n");

        let outcome = outcome.unwrap();
        assert_eq!(outcome, RunOutcome::Deadlock);
        assert_eq!(outcome.exit_code(), 1);
        assert!(out.ends_with("deadlock\n"));
    }

    #[test]
    fn test_driver_script_exhausted() {
        let (outcome, out) = run("0 TRAP DISK_WRITE\n");

        assert_eq!(outcome.unwrap(), RunOutcome::ScriptExhausted);
        assert_eq!(out, "Time 0: Process 0 issues disk write request\n");
    }

    #[test]
    fn test_driver_rejects_unrequested_completion() {
        let (outcome, _) = run("0 TRAP FORK 1\n3 KEYBOARD 1\n");

        assert!(matches!(
            outcome,
            Err(DriverError::Device {
                line: 2,
                source: DeviceError::NoPendingRequest { device: Device::Keyboard, pid: 1 },
            })
        ));
    }

    #[test]
    fn test_driver_completion_pid_out_of_range() {
        let script =
            parse_script(Cursor::new("0 TRAP FORK 1\n1 TRAP DISK_READ 1\n5 DISK 99\n")).unwrap();
        let mut driver = Driver::new(&KernelConfig::default()).unwrap();
        let outcome = driver.run(&script, &mut Vec::new());

        assert!(matches!(
            outcome,
            Err(DriverError::Kernel {
                line: 3,
                source: KernelError::PidOutOfRange { pid: 99, capacity: 10 },
            })
        ));
        assert!(driver.devices().is_pending(Device::Disk, 0));
        assert_eq!(driver.kernel().state_of(0).unwrap(), ProcessState::Blocked);
    }

    #[test]
    fn test_driver_reports_kernel_error_line() {
        let (outcome, _) = run("0 CLOCK\n4 TRAP 17\n");

        assert!(matches!(
            outcome,
            Err(DriverError::Kernel {
                line: 2,
                source: KernelError::InvalidOpcode(17),
            })
        ));
    }

    #[test]
    fn test_driver_rejects_invalid_config() {
        let config = KernelConfig {
            quantum: 0,
            ..KernelConfig::default()
        };
        assert!(matches!(Driver::new(&config), Err(DriverError::Config(_))));
    }
}
