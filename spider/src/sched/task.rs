//! Scheduler-level task model: one firing of one non-hierarchical vertex,
//! or a SEND/RECEIVE synchronization task inserted by the mapper.

/// Lifecycle of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Ready,
    Running,
    Finished,
    NotSchedulable,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncType {
    Send,
    Receive,
}

/// What a `Task` represents: either one firing of a PiSDF vertex, or a
/// cross-cluster SEND/RECEIVE pair the mapper inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    Vertex {
        vertex: usize,
        firing: u32,
        handler: usize,
    },
    Sync {
        ty: SyncType,
        /// The task on the other end of this SEND/RECEIVE pair.
        counterpart: Option<usize>,
        /// The task whose output this sync task relays.
        dependency: usize,
        bus: usize,
        bytes: u64,
    },
}

/// One entry in a `Schedule`.
#[derive(Debug, Clone)]
pub struct Task {
    pub ix: usize,
    pub kind: TaskKind,
    pub state: TaskState,
    pub level: i32,
    pub mapped_pe: Option<u32>,
    pub start_time: u64,
    pub end_time: u64,
}

impl Task {
    pub fn new_vertex(vertex: usize, firing: u32, handler: usize) -> Self {
        Task {
            ix: 0,
            kind: TaskKind::Vertex {
                vertex,
                firing,
                handler,
            },
            state: TaskState::Pending,
            level: 0,
            mapped_pe: None,
            start_time: u64::MAX,
            end_time: u64::MAX,
        }
    }

    pub fn new_sync(ty: SyncType, dependency: usize, bus: usize, bytes: u64) -> Self {
        Task {
            ix: 0,
            kind: TaskKind::Sync {
                ty,
                counterpart: None,
                dependency,
                bus,
                bytes,
            },
            state: TaskState::NotSchedulable,
            level: 0,
            mapped_pe: None,
            start_time: u64::MAX,
            end_time: u64::MAX,
        }
    }

    pub fn is_mappable_on_pe(&self) -> bool {
        // SEND/RECEIVE tasks are always mappable on the PE the mapper
        // picked (one per bus endpoint); vertex mappability is checked
        // through the vertex's `RtInfo` by the caller.
        matches!(self.kind, TaskKind::Sync { .. })
    }
}
