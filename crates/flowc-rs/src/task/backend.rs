use std::sync::Arc;

use super::{
    DispatchResult, EventRecordDescriptor, KernelLaunchDescriptor, MemcpyDescriptor,
};

/// Opaque hardware execution contract.
///
/// Enqueue calls return once the work is on the queue; device execution
/// behind the queue is asynchronous and outside this core's view.
pub trait DeviceBackend: Send + Sync {
    /// Device queue handle; cheap to clone.
    type Stream: Clone + Send + Sync + 'static;
    /// Device-side argument buffer handle.
    type ArgBuffer: Send + Sync + 'static;

    /// Human-readable backend identifier (e.g., `"ref-cpu"`, `"npu"`).
    fn backend_name(&self) -> &str;

    fn create_stream(&self) -> DispatchResult<Self::Stream>;

    /// Copies `bytes` into a fresh device-side argument buffer.
    fn alloc_arg_buffer(&self, bytes: &[u8]) -> DispatchResult<Self::ArgBuffer>;

    /// Returns an argument buffer to the backend. Infallible: release must
    /// be callable from drop paths.
    fn release_arg_buffer(&self, buffer: Self::ArgBuffer);

    fn enqueue_copy(&self, stream: &Self::Stream, desc: &MemcpyDescriptor) -> DispatchResult<()>;

    fn enqueue_launch(
        &self,
        stream: &Self::Stream,
        desc: &KernelLaunchDescriptor,
        args: &Self::ArgBuffer,
    ) -> DispatchResult<()>;

    fn enqueue_event(
        &self,
        stream: &Self::Stream,
        desc: &EventRecordDescriptor,
    ) -> DispatchResult<()>;
}

/// One backend plus one stream handle; the binding every task is
/// constructed against.
pub struct ExecutionContext<B: DeviceBackend> {
    backend: Arc<B>,
    stream: B::Stream,
}

impl<B: DeviceBackend> ExecutionContext<B> {
    /// Creates a context on a freshly created stream.
    pub fn new(backend: Arc<B>) -> DispatchResult<Self> {
        let stream = backend.create_stream()?;
        Ok(Self { backend, stream })
    }

    /// Binds to an externally managed stream.
    pub fn with_stream(backend: Arc<B>, stream: B::Stream) -> Self {
        Self { backend, stream }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn stream(&self) -> &B::Stream {
        &self.stream
    }
}

/// Scoped argument-buffer acquisition: the buffer is returned to the
/// backend on drop, on every exit path, whether or not the owning task ever
/// distributed.
pub struct ArgBufferGuard<B: DeviceBackend> {
    backend: Arc<B>,
    buffer: Option<B::ArgBuffer>,
}

impl<B: DeviceBackend> ArgBufferGuard<B> {
    pub fn acquire(backend: &Arc<B>, bytes: &[u8]) -> DispatchResult<Self> {
        let buffer = backend.alloc_arg_buffer(bytes)?;
        Ok(Self {
            backend: Arc::clone(backend),
            buffer: Some(buffer),
        })
    }

    pub fn buffer(&self) -> &B::ArgBuffer {
        self.buffer
            .as_ref()
            .expect("argument buffer only vacates during drop")
    }
}

impl<B: DeviceBackend> Drop for ArgBufferGuard<B> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.backend.release_arg_buffer(buffer);
        }
    }
}
