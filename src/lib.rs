//! Scheduling and synchronization core of a single-processor kernel running
//! on a simulated machine: a process table, round-robin dispatch, counting
//! semaphores, and the interrupt handlers that drive them.
//!
//! [`kernel::Kernel`] is the core. [`driver::Driver`] replays a timed event
//! script against it and prints the resulting trace.

pub mod driver;
pub mod io;
pub mod kernel;
