//! Wire messages exchanged between LRTs (local runtime threads): job
//! descriptions, dynamic parameter values, and execution traces.

use crate::sched::Fifo;

/// One entry of a `JobMessage`'s wait list: "don't start until LRT
/// `lrt_to_wait`'s job `job_to_wait` has completed."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobConstraint {
    pub lrt_to_wait: usize,
    pub job_to_wait: usize,
}

/// Everything an LRT needs to run one task: its kernel, its resolved
/// static parameters, its input/output buffers, the jobs it must wait on,
/// and who to notify once it finishes.
#[derive(Debug, Clone, Default)]
pub struct JobMessage {
    pub exec_constraints: Vec<JobConstraint>,
    pub input_params: Vec<i64>,
    pub input_fifos: Vec<Fifo>,
    pub output_fifos: Vec<Fifo>,
    /// One flag per LRT: whether that LRT should be notified of this job's
    /// completion (so it can clear the corresponding exec constraint).
    pub notification_flags: Vec<bool>,
    pub kernel_ix: Option<usize>,
    pub vertex_ix: usize,
    pub ix: usize,
    pub output_param_count: i32,
}

/// Dynamic parameter value(s) produced by a CONFIG actor's kernel,
/// addressed to the GRT so it can update the firing tree and re-resolve
/// any BRV depending on them.
#[derive(Debug, Clone)]
pub struct ParameterMessage {
    pub params: Vec<i64>,
    pub vertex_ix: usize,
}

/// Start/end timestamps for one completed task, collected for tracing.
#[derive(Debug, Clone, Copy)]
pub struct TraceMessage {
    pub start_time: u64,
    pub end_time: u64,
    pub task_ix: usize,
}

/// Control messages LRTs exchange outside the job queue itself.
#[derive(Debug, Clone, Copy)]
pub enum Notification {
    /// "My last job stamp is now `job_ix`" — lets a waiting LRT know an
    /// exec constraint on the sender has been satisfied.
    JobUpdateJobStamp { from: usize, job_ix: usize },
    /// Sent to the GRT once an LRT has drained its job queue for this
    /// iteration.
    LrtFinishedIteration { from: usize },
    /// A `ParameterMessage` is ready to be read at the given store index.
    ParamAvailable { from: usize, index: usize },
    /// A `TraceMessage` is ready to be read at the given store index.
    TraceAvailable { from: usize, index: usize },
}
