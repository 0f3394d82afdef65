use std::collections::HashMap;
use std::sync::Arc;

use super::{
    ArgBufferGuard, DeviceBackend, DispatchError, DispatchResult, EventRecordDescriptor,
    ExecutionContext, KernelLaunchDescriptor, MemcpyDescriptor, TaskDescriptor, TaskKind,
};

/// Runtime counterpart of one task descriptor, bound to one execution
/// context. `distribute` translates the declarative record into backend
/// enqueue calls; it is a one-shot operation and a second call fails with
/// [`DispatchError::AlreadyDistributed`] without touching the queue.
pub trait Task<B: DeviceBackend>: Send {
    fn kind(&self) -> TaskKind;
    fn distribute(&mut self) -> DispatchResult<()>;
}

pub struct MemcpyTask<B: DeviceBackend> {
    backend: Arc<B>,
    stream: B::Stream,
    desc: MemcpyDescriptor,
    distributed: bool,
}

impl<B: DeviceBackend> MemcpyTask<B> {
    pub fn new(ctx: &ExecutionContext<B>, desc: MemcpyDescriptor) -> Self {
        Self {
            backend: Arc::clone(ctx.backend()),
            stream: ctx.stream().clone(),
            desc,
            distributed: false,
        }
    }
}

impl<B: DeviceBackend> Task<B> for MemcpyTask<B> {
    fn kind(&self) -> TaskKind {
        TaskKind::Memcpy
    }

    fn distribute(&mut self) -> DispatchResult<()> {
        if self.distributed {
            return Err(DispatchError::AlreadyDistributed);
        }
        self.distributed = true;
        self.backend.enqueue_copy(&self.stream, &self.desc)
    }
}

/// Owns its device-side argument buffer through an [`ArgBufferGuard`], so
/// the buffer is released whenever the task goes away, distributed or not.
pub struct KernelLaunchTask<B: DeviceBackend> {
    backend: Arc<B>,
    stream: B::Stream,
    desc: KernelLaunchDescriptor,
    args: ArgBufferGuard<B>,
    distributed: bool,
}

impl<B: DeviceBackend> KernelLaunchTask<B> {
    pub fn from_descriptor(
        ctx: &ExecutionContext<B>,
        desc: KernelLaunchDescriptor,
    ) -> DispatchResult<Self> {
        let args = ArgBufferGuard::acquire(ctx.backend(), &desc.args)?;
        Ok(Self {
            backend: Arc::clone(ctx.backend()),
            stream: ctx.stream().clone(),
            desc,
            args,
            distributed: false,
        })
    }
}

impl<B: DeviceBackend> Task<B> for KernelLaunchTask<B> {
    fn kind(&self) -> TaskKind {
        TaskKind::KernelLaunch
    }

    fn distribute(&mut self) -> DispatchResult<()> {
        if self.distributed {
            return Err(DispatchError::AlreadyDistributed);
        }
        self.distributed = true;
        self.backend
            .enqueue_launch(&self.stream, &self.desc, self.args.buffer())
    }
}

pub struct EventTask<B: DeviceBackend> {
    backend: Arc<B>,
    stream: B::Stream,
    desc: EventRecordDescriptor,
    distributed: bool,
}

impl<B: DeviceBackend> EventTask<B> {
    pub fn new(ctx: &ExecutionContext<B>, desc: EventRecordDescriptor) -> Self {
        Self {
            backend: Arc::clone(ctx.backend()),
            stream: ctx.stream().clone(),
            desc,
            distributed: false,
        }
    }
}

impl<B: DeviceBackend> Task<B> for EventTask<B> {
    fn kind(&self) -> TaskKind {
        TaskKind::EventRecord
    }

    fn distribute(&mut self) -> DispatchResult<()> {
        if self.distributed {
            return Err(DispatchError::AlreadyDistributed);
        }
        self.distributed = true;
        self.backend.enqueue_event(&self.stream, &self.desc)
    }
}

type TaskFactory<B> =
    Box<dyn Fn(&ExecutionContext<B>, &TaskDescriptor) -> DispatchResult<Box<dyn Task<B>>> + Send + Sync>;

/// Explicit factory registry keyed by descriptor kind. Constructed per
/// process or per compilation context and passed by reference; new task
/// kinds register without modifying the dispatch core.
pub struct TaskRegistry<B: DeviceBackend> {
    factories: HashMap<TaskKind, TaskFactory<B>>,
}

impl<B: DeviceBackend + 'static> TaskRegistry<B> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in task kinds.
    pub fn with_builtin_tasks() -> Self {
        let mut registry = Self::new();
        registry.register(
            TaskKind::Memcpy,
            Box::new(|ctx, desc| match desc {
                TaskDescriptor::Memcpy(d) => {
                    Ok(Box::new(MemcpyTask::new(ctx, d.clone())) as Box<dyn Task<B>>)
                }
                _ => Err(DispatchError::DescriptorMismatch(TaskKind::Memcpy)),
            }),
        );
        registry.register(
            TaskKind::KernelLaunch,
            Box::new(|ctx, desc| match desc {
                TaskDescriptor::KernelLaunch(d) => Ok(Box::new(
                    KernelLaunchTask::from_descriptor(ctx, d.clone())?,
                ) as Box<dyn Task<B>>),
                _ => Err(DispatchError::DescriptorMismatch(TaskKind::KernelLaunch)),
            }),
        );
        registry.register(
            TaskKind::EventRecord,
            Box::new(|ctx, desc| match desc {
                TaskDescriptor::EventRecord(d) => {
                    Ok(Box::new(EventTask::new(ctx, d.clone())) as Box<dyn Task<B>>)
                }
                _ => Err(DispatchError::DescriptorMismatch(TaskKind::EventRecord)),
            }),
        );
        registry
    }

    pub fn register(&mut self, kind: TaskKind, factory: TaskFactory<B>) {
        self.factories.insert(kind, factory);
    }

    pub fn has(&self, kind: TaskKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Builds the task bound to `ctx` for one descriptor.
    pub fn create(
        &self,
        ctx: &ExecutionContext<B>,
        desc: &TaskDescriptor,
    ) -> DispatchResult<Box<dyn Task<B>>> {
        let factory = self
            .factories
            .get(&desc.kind())
            .ok_or(DispatchError::UnsupportedKind(desc.kind()))?;
        factory(ctx, desc)
    }
}

impl<B: DeviceBackend + 'static> Default for TaskRegistry<B> {
    fn default() -> Self {
        Self::with_builtin_tasks()
    }
}

/// Every task of one model load. Dropping it releases all backend
/// resources the tasks acquired.
pub struct LoadedTasks<B: DeviceBackend> {
    tasks: Vec<Box<dyn Task<B>>>,
}

impl<B: DeviceBackend> std::fmt::Debug for LoadedTasks<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedTasks")
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl<B: DeviceBackend> LoadedTasks<B> {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Issues every task in descriptor order. Fails fast: a failed enqueue
    /// surfaces immediately and the remaining tasks stay undistributed
    /// (their resources are still released on drop).
    pub fn distribute_all(&mut self) -> DispatchResult<usize> {
        let mut issued = 0;
        for task in &mut self.tasks {
            task.distribute()?;
            issued += 1;
        }
        Ok(issued)
    }
}

/// Model-load entry point: binds each descriptor to the context through the
/// registry, constructing exactly one task per descriptor.
pub fn load_tasks<B: DeviceBackend + 'static>(
    descriptors: &[TaskDescriptor],
    ctx: &ExecutionContext<B>,
    registry: &TaskRegistry<B>,
) -> DispatchResult<LoadedTasks<B>> {
    let mut tasks = Vec::with_capacity(descriptors.len());
    for desc in descriptors {
        tasks.push(registry.create(ctx, desc)?);
    }
    Ok(LoadedTasks { tasks })
}
