//! Trace lines emitted by the kernel. The `Display` text of each variant is
//! the exact line the simulator prints on stdout.

use std::fmt;

use super::{Pid, SemaphoreId, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Disk,
    Keyboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceLine {
    Runs { time: Time, pid: Pid },
    Idle { time: Time },
    DiskRead { time: Time, pid: Pid },
    DiskWrite { time: Time, pid: Pid },
    KeyboardRead { time: Time, pid: Pid },
    Handled { time: Time, device: Device, pid: Pid },
    Up { time: Time, pid: Pid, sem: SemaphoreId },
    Down { time: Time, pid: Pid, sem: SemaphoreId },
    Fork { time: Time, pid: Pid },
    Exit { time: Time, pid: Pid, cpu_time: Time },
    NoMoreProcesses,
    Deadlock,
}

impl fmt::Display for TraceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceLine::Runs { time, pid } => write!(f, "Time {}: Process {} runs", time, pid),
            TraceLine::Idle { time } => write!(f, "Time {}: Processor is idle", time),
            TraceLine::DiskRead { time, pid } => {
                write!(f, "Time {}: Process {} issues disk read request", time, pid)
            }
            TraceLine::DiskWrite { time, pid } => {
                write!(f, "Time {}: Process {} issues disk write request", time, pid)
            }
            TraceLine::KeyboardRead { time, pid } => {
                write!(f, "Time {}: Process {} issues keyboard read request", time, pid)
            }
            TraceLine::Handled { time, device, pid } => {
                let name = match device {
                    Device::Disk => "DISK_INTERRUPT",
                    Device::Keyboard => "KEYBOARD_INTERRUPT",
                };
                write!(f, "Time {}: Handled {} for pid {}", time, name, pid)
            }
            TraceLine::Up { time, pid, sem } => write!(
                f,
                "Time {}: Process {} issues UP operation on semaphore {}",
                time, pid, sem
            ),
            TraceLine::Down { time, pid, sem } => write!(
                f,
                "Time {}: Process {} issues DOWN operation on semaphore {}",
                time, pid, sem
            ),
            TraceLine::Fork { time, pid } => {
                write!(f, "Time {}: Creating process entry for pid {}", time, pid)
            }
            TraceLine::Exit { time, pid, cpu_time } => write!(
                f,
                "Time {}: Process {} exits.  Total CPU time = {}",
                time, pid, cpu_time
            ),
            TraceLine::NoMoreProcesses => write!(f, "-- No more processes to execute --"),
            TraceLine::Deadlock => write!(f, "deadlock"),
        }
    }
}
