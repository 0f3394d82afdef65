//! Task descriptors and the dispatch abstraction.
//!
//! Lowering turns each finalized graph node into one immutable, kind-tagged
//! [`TaskDescriptor`]. At model-load time every descriptor is bound to an
//! execution context as a [`Task`], whose one-shot `distribute` call
//! translates the declarative record into backend queue operations.

mod backend;
mod dispatch;
mod lower;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use backend::{ArgBufferGuard, DeviceBackend, ExecutionContext};
pub use dispatch::{
    load_tasks, EventTask, KernelLaunchTask, LoadedTasks, MemcpyTask, Task, TaskRegistry,
};
pub use lower::{lower_graph, LowerError, DEFAULT_BLOCK_DIM};

/// Discriminant for descriptor and task dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Memcpy,
    KernelLaunch,
    EventRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyDirection {
    HostToDevice,
    DeviceToDevice,
    DeviceToHost,
}

/// Parameters for one enqueued memory copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemcpyDescriptor {
    pub label: String,
    pub byte_len: u64,
    pub direction: CopyDirection,
}

/// Parameters for one enqueued kernel launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelLaunchDescriptor {
    pub kernel: String,
    pub scope_id: Option<u64>,
    pub block_dim: u32,
    /// Opaque serialized argument payload copied into a device-side
    /// argument buffer at task construction.
    pub args: Vec<u8>,
}

/// Marker recorded on the queue, e.g. around loop plumbing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecordDescriptor {
    pub label: String,
}

/// Immutable description of one executable unit, produced during lowering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskDescriptor {
    Memcpy(MemcpyDescriptor),
    KernelLaunch(KernelLaunchDescriptor),
    EventRecord(EventRecordDescriptor),
}

impl TaskDescriptor {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskDescriptor::Memcpy(_) => TaskKind::Memcpy,
            TaskDescriptor::KernelLaunch(_) => TaskKind::KernelLaunch,
            TaskDescriptor::EventRecord(_) => TaskKind::EventRecord,
        }
    }

    pub fn to_json_string(&self) -> Result<String, DescriptorSerdeError> {
        serde_json::to_string_pretty(self).map_err(DescriptorSerdeError::from)
    }

    pub fn from_json_str(src: &str) -> Result<Self, DescriptorSerdeError> {
        serde_json::from_str(src).map_err(DescriptorSerdeError::from)
    }

    pub fn to_bincode_bytes(&self) -> Result<Vec<u8>, DescriptorSerdeError> {
        bincode::serialize(self).map_err(DescriptorSerdeError::from)
    }

    pub fn from_bincode_slice(bytes: &[u8]) -> Result<Self, DescriptorSerdeError> {
        bincode::deserialize(bytes).map_err(DescriptorSerdeError::from)
    }
}

#[derive(Debug, Error)]
pub enum DescriptorSerdeError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Failures on the dispatch side of the boundary.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Backend resource acquisition or binding failed.
    #[error("backend resource failure: {0}")]
    Resource(String),
    /// Enqueue call rejected by the backend queue.
    #[error("enqueue failed: {0}")]
    Enqueue(String),
    /// `distribute` is a one-shot operation per task instance.
    #[error("task was already distributed")]
    AlreadyDistributed,
    /// No factory registered for the descriptor kind.
    #[error("no task factory registered for kind {0:?}")]
    UnsupportedKind(TaskKind),
    /// Factory received a descriptor whose payload does not match its kind.
    #[error("descriptor payload does not match factory kind {0:?}")]
    DescriptorMismatch(TaskKind),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
