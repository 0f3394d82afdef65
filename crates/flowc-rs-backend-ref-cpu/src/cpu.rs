use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use flowc_rs::task::{
    DeviceBackend, DispatchError, DispatchResult, EventRecordDescriptor, KernelLaunchDescriptor,
    MemcpyDescriptor,
};

/// One recorded queue operation, in enqueue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueCommand {
    Copy {
        stream: CpuStream,
        label: String,
        byte_len: u64,
    },
    Launch {
        stream: CpuStream,
        kernel: String,
        block_dim: u32,
        arg_bytes: usize,
    },
    Event {
        stream: CpuStream,
        label: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CpuStream(pub u64);

#[derive(Debug)]
pub struct CpuArgBuffer {
    id: u64,
    bytes: Vec<u8>,
}

impl CpuArgBuffer {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// In-memory queue backend with fault injection for tests.
#[derive(Default)]
pub struct CpuQueueBackend {
    log: Mutex<Vec<QueueCommand>>,
    live_buffers: Mutex<HashSet<u64>>,
    next_stream: AtomicU64,
    next_buffer: AtomicU64,
    fail_next_alloc: AtomicBool,
    fail_enqueues: AtomicBool,
}

impl CpuQueueBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything enqueued so far, across all streams, in order.
    pub fn commands(&self) -> Vec<QueueCommand> {
        self.log.lock().unwrap().clone()
    }

    /// Argument buffers currently allocated and not yet released.
    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.lock().unwrap().len()
    }

    /// Makes the next `alloc_arg_buffer` call fail once.
    pub fn fail_next_alloc(&self) {
        self.fail_next_alloc.store(true, Ordering::SeqCst);
    }

    /// Toggles failure of every enqueue call.
    pub fn set_fail_enqueues(&self, fail: bool) {
        self.fail_enqueues.store(fail, Ordering::SeqCst);
    }

    fn check_enqueue(&self) -> DispatchResult<()> {
        if self.fail_enqueues.load(Ordering::SeqCst) {
            return Err(DispatchError::Enqueue(
                "queue rejected the operation".to_string(),
            ));
        }
        Ok(())
    }
}

impl DeviceBackend for CpuQueueBackend {
    type Stream = CpuStream;
    type ArgBuffer = CpuArgBuffer;

    fn backend_name(&self) -> &str {
        "ref-cpu"
    }

    fn create_stream(&self) -> DispatchResult<Self::Stream> {
        Ok(CpuStream(self.next_stream.fetch_add(1, Ordering::Relaxed)))
    }

    fn alloc_arg_buffer(&self, bytes: &[u8]) -> DispatchResult<Self::ArgBuffer> {
        if self.fail_next_alloc.swap(false, Ordering::SeqCst) {
            return Err(DispatchError::Resource(
                "argument buffer allocation failed".to_string(),
            ));
        }
        let id = self.next_buffer.fetch_add(1, Ordering::Relaxed);
        self.live_buffers.lock().unwrap().insert(id);
        Ok(CpuArgBuffer {
            id,
            bytes: bytes.to_vec(),
        })
    }

    fn release_arg_buffer(&self, buffer: Self::ArgBuffer) {
        self.live_buffers.lock().unwrap().remove(&buffer.id);
    }

    fn enqueue_copy(&self, stream: &Self::Stream, desc: &MemcpyDescriptor) -> DispatchResult<()> {
        self.check_enqueue()?;
        self.log.lock().unwrap().push(QueueCommand::Copy {
            stream: *stream,
            label: desc.label.clone(),
            byte_len: desc.byte_len,
        });
        Ok(())
    }

    fn enqueue_launch(
        &self,
        stream: &Self::Stream,
        desc: &KernelLaunchDescriptor,
        args: &Self::ArgBuffer,
    ) -> DispatchResult<()> {
        self.check_enqueue()?;
        self.log.lock().unwrap().push(QueueCommand::Launch {
            stream: *stream,
            kernel: desc.kernel.clone(),
            block_dim: desc.block_dim,
            arg_bytes: args.len(),
        });
        Ok(())
    }

    fn enqueue_event(
        &self,
        stream: &Self::Stream,
        desc: &EventRecordDescriptor,
    ) -> DispatchResult<()> {
        self.check_enqueue()?;
        self.log.lock().unwrap().push(QueueCommand::Event {
            stream: *stream,
            label: desc.label.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowc_rs::task::CopyDirection;

    #[test]
    fn commands_record_in_enqueue_order() {
        let backend = CpuQueueBackend::new();
        let stream = backend.create_stream().unwrap();
        backend
            .enqueue_copy(
                &stream,
                &MemcpyDescriptor {
                    label: "a".to_string(),
                    byte_len: 16,
                    direction: CopyDirection::HostToDevice,
                },
            )
            .unwrap();
        backend
            .enqueue_event(
                &stream,
                &EventRecordDescriptor {
                    label: "b".to_string(),
                },
            )
            .unwrap();
        let commands = backend.commands();
        assert_eq!(commands.len(), 2);
        assert!(matches!(&commands[0], QueueCommand::Copy { label, .. } if label == "a"));
        assert!(matches!(&commands[1], QueueCommand::Event { label, .. } if label == "b"));
    }

    #[test]
    fn buffer_accounting_tracks_release() {
        let backend = CpuQueueBackend::new();
        let buffer = backend.alloc_arg_buffer(&[1, 2, 3]).unwrap();
        assert_eq!(backend.live_buffer_count(), 1);
        backend.release_arg_buffer(buffer);
        assert_eq!(backend.live_buffer_count(), 0);
    }

    #[test]
    fn alloc_fault_injection_fires_once() {
        let backend = CpuQueueBackend::new();
        backend.fail_next_alloc();
        assert!(backend.alloc_arg_buffer(&[]).is_err());
        assert!(backend.alloc_arg_buffer(&[]).is_ok());
    }
}
