//! Reference device backend: an in-memory command queue with allocation
//! accounting. Serves as the integration-test double for the dispatch
//! contract and as the template for real device bindings.

mod cpu;

pub use cpu::{CpuArgBuffer, CpuQueueBackend, CpuStream, QueueCommand};
