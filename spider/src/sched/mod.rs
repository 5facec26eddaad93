//! Scheduling core: BRV resolution, the firing tree, dependency
//! computation, list scheduling, mapping, and FIFO allocation.

pub mod brv;
pub mod dependencies;
pub mod fifo;
pub mod graph_firing;
pub mod graph_handler;
pub mod list_scheduler;
pub mod mapper;
pub mod schedule;
pub mod task;

pub use brv::compute_brv;
pub use dependencies::{
    compute_cons_dependencies, compute_cons_dependency, compute_exec_dependencies,
    compute_exec_dependency, DependencyInfo,
};
pub use fifo::{
    allocate_duplicate_outputs, allocate_fork_outputs, try_no_sync_shortcut, Fifo, FifoAllocator,
    FifoAttribute,
};
pub use graph_firing::GraphFiring;
pub use graph_handler::{GraphHandler, HandlerArena};
pub use list_scheduler::{compute_schedule_level, ListScheduler, ListTask};
pub use mapper::{compute_start_time, map_task};
pub use schedule::{Schedule, Stats};
pub use task::{SyncType, Task, TaskKind, TaskState};
