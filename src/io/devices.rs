use std::collections::HashSet;

use thiserror::Error;

use crate::kernel::{Device, DeviceBus, Pid};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("no pending {device:?} request for pid {pid}")]
    NoPendingRequest { device: Device, pid: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRequest {
    DiskRead { pid: Pid, block: u32 },
    DiskWrite { pid: Pid },
    KeyboardRead { pid: Pid },
}

/// Ledger of requests the kernel sent to the simulated devices. Reads stay
/// pending until the machine delivers their completion interrupt.
#[derive(Debug, Default)]
pub struct RequestLog {
    requests: Vec<DeviceRequest>,
    pending: HashSet<(Device, usize)>,
}

impl RequestLog {
    pub fn new() -> RequestLog {
        RequestLog {
            requests: Vec::new(),
            pending: HashSet::new(),
        }
    }

    pub fn requests(&self) -> &[DeviceRequest] {
        &self.requests
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, device: Device, pid: usize) -> bool {
        self.pending.contains(&(device, pid))
    }

    pub fn disk_writes(&self) -> usize {
        self.requests
            .iter()
            .filter(|request| matches!(request, DeviceRequest::DiskWrite { .. }))
            .count()
    }

    /// Matches a completion interrupt against the read it finishes.
    pub fn complete(&mut self, device: Device, pid: usize) -> Result<(), DeviceError> {
        if self.pending.remove(&(device, pid)) {
            Ok(())
        } else {
            Err(DeviceError::NoPendingRequest { device, pid })
        }
    }
}

impl DeviceBus for RequestLog {
    fn issue_disk_read(&mut self, pid: Pid, block: u32) {
        self.requests.push(DeviceRequest::DiskRead { pid, block });
        self.pending.insert((Device::Disk, pid.index()));
    }

    fn issue_disk_write(&mut self, pid: Pid) {
        self.requests.push(DeviceRequest::DiskWrite { pid });
    }

    fn issue_keyboard_read(&mut self, pid: Pid) {
        self.requests.push(DeviceRequest::KeyboardRead { pid });
        self.pending.insert((Device::Keyboard, pid.index()));
    }
}
