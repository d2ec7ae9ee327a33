use std::collections::VecDeque;

use super::Pid;

/// FIFO of PIDs. Serves as the ready queue and as each semaphore's wait queue.
#[derive(Debug, Default, Clone)]
pub struct PidQueue {
    pids: VecDeque<Pid>,
}

impl PidQueue {
    pub fn new() -> PidQueue {
        PidQueue {
            pids: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, pid: Pid) {
        // Linear scan, debug builds only. Release enqueue stays O(1).
        debug_assert!(!self.pids.contains(&pid), "pid {} enqueued twice", pid);
        self.pids.push_back(pid);
    }

    /// Removes the head, or `None` when nothing is queued.
    pub fn dequeue(&mut self) -> Option<Pid> {
        self.pids.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.pids.contains(&pid)
    }

    /// Head to tail.
    pub fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        self.pids.iter().copied()
    }
}
