//! One LRT's execution loop: drain jobs in order, respecting each job's
//! exec constraints, run its kernel, and notify whoever is waiting.

use crossbeam_channel::Receiver;
use tracing::{debug, info_span};

use crate::runtime::communicator::Communicator;
use crate::runtime::message::{JobMessage, Notification};

/// A kernel is an opaque callable: given a job's resolved input
/// parameters and FIFOs, it runs and returns any output parameters it
/// produced (for CONFIG actors). Kernels are registered by index and
/// invoked by `kernel_ix`; the runtime itself never inspects their body.
pub type Kernel = Box<dyn Fn(&JobMessage) -> Vec<i64> + Send + Sync>;

/// Local runtime thread state: its job queue, the job stamps it has
/// observed from every other LRT, and whether it should emit traces.
pub struct RtRunner {
    pub ix: usize,
    pub affinity: Option<u32>,
    job_queue: Vec<JobMessage>,
    job_queue_pos: usize,
    /// Per-LRT last completed job stamp this runner has been told about;
    /// `None` until the first notification arrives.
    local_job_stamps: Vec<Option<usize>>,
    last_job_stamp: Option<usize>,
    pub trace: bool,
    /// This LRT's inbound job channel, handed to it once by the
    /// `Communicator` at `start()` time. `None` until `attach_receiver` is
    /// called, or in tests that only use `enqueue_job` directly.
    job_rx: Option<Receiver<JobMessage>>,
}

impl RtRunner {
    pub fn new(ix: usize, lrt_count: usize, affinity: Option<u32>) -> Self {
        RtRunner {
            ix,
            affinity,
            job_queue: Vec::new(),
            job_queue_pos: 0,
            local_job_stamps: vec![None; lrt_count],
            last_job_stamp: None,
            trace: false,
            job_rx: None,
        }
    }

    /// Wire this runner to the job channel the `Communicator` allocated for
    /// it. Subsequent `drain_channel` calls pull whatever `push_job` sends
    /// this LRT's way into `job_queue`.
    pub fn attach_receiver(&mut self, rx: Receiver<JobMessage>) {
        self.job_rx = Some(rx);
    }

    /// Move every job currently waiting on this runner's channel into its
    /// queue, preserving send order. A no-op if no receiver is attached.
    pub fn drain_channel(&mut self) {
        let Some(rx) = &self.job_rx else { return };
        while let Ok(job) = rx.try_recv() {
            self.job_queue.push(job);
        }
    }

    pub fn clear_local_job_stamps(&mut self) {
        self.local_job_stamps.iter_mut().for_each(|s| *s = None);
    }

    pub fn clear_job_queue(&mut self) {
        self.job_queue_pos = 0;
        self.job_queue.clear();
    }

    pub fn reset(&mut self) {
        self.clear_local_job_stamps();
        self.job_queue_pos = 0;
    }

    pub fn enqueue_job(&mut self, job: JobMessage) {
        self.job_queue.push(job);
    }

    pub fn record_job_stamp(&mut self, from: usize, job_ix: usize) {
        self.local_job_stamps[from] = Some(job_ix);
    }

    /// Whether `job`'s exec constraints are all satisfied given the job
    /// stamps observed so far.
    fn is_ready(&self, job: &JobMessage) -> bool {
        job.exec_constraints.iter().all(|c| {
            self.local_job_stamps[c.lrt_to_wait]
                .map(|stamp| stamp >= c.job_to_wait)
                .unwrap_or(false)
        })
    }

    /// Broadcast this runner's last completed job stamp to every other
    /// LRT, so their exec constraints on this runner can be cleared.
    pub fn broadcast_current_job_stamp(&self, communicator: &Communicator) {
        let Some(job_ix) = self.last_job_stamp else { return };
        for lrt in 0..communicator.lrt_count() {
            if lrt != self.ix {
                communicator.push_notification(
                    Notification::JobUpdateJobStamp { from: self.ix, job_ix },
                    lrt,
                );
            }
        }
    }

    /// Notify only the LRTs this job's `notification_flags` mark, rather
    /// than every LRT on the platform.
    pub fn send_job_stamp_notification(&self, communicator: &Communicator, job: &JobMessage) {
        for (lrt, &should_notify) in job.notification_flags.iter().enumerate() {
            if should_notify && lrt != self.ix {
                communicator.push_notification(
                    Notification::JobUpdateJobStamp { from: self.ix, job_ix: job.ix },
                    lrt,
                );
            }
        }
    }

    pub fn send_finished_notification(&self, communicator: &Communicator, grt_ix: usize) {
        if self.ix != grt_ix {
            communicator.push_notification(Notification::LrtFinishedIteration { from: self.ix }, grt_ix);
        }
    }

    /// Run every job currently ready, in queue order, advancing
    /// `job_queue_pos` past them; returns the number of jobs it ran.
    /// Jobs not yet ready stay in place for the next call.
    pub fn run_ready_jobs(&mut self, kernels: &[Kernel], communicator: &Communicator, grt_ix: usize) -> usize {
        let _span = info_span!("lrt_iterate", lrt = self.ix).entered();
        let mut ran = 0;
        while self.job_queue_pos < self.job_queue.len() {
            if !self.is_ready(&self.job_queue[self.job_queue_pos]) {
                break;
            }
            let job = self.job_queue[self.job_queue_pos].clone_for_run();
            if let Some(kernel_ix) = job.kernel_ix {
                if let Some(kernel) = kernels.get(kernel_ix) {
                    let outputs = kernel(&job);
                    if !outputs.is_empty() {
                        let index = communicator.push_param(crate::runtime::message::ParameterMessage {
                            params: outputs,
                            vertex_ix: job.vertex_ix,
                        });
                        communicator.push_notification(
                            Notification::ParamAvailable { from: self.ix, index },
                            grt_ix,
                        );
                    }
                }
            }
            debug!(job = job.ix, vertex = job.vertex_ix, "job finished");
            self.last_job_stamp = Some(job.ix);
            self.broadcast_current_job_stamp(communicator);
            self.send_job_stamp_notification(communicator, &job);
            self.job_queue_pos += 1;
            ran += 1;
        }
        ran
    }

    pub fn pending_job_count(&self) -> usize {
        self.job_queue.len() - self.job_queue_pos
    }
}

impl JobMessage {
    /// Jobs don't implement `Clone` directly (their FIFO arrays are meant
    /// to be moved, not duplicated across LRTs); this is only used inside
    /// the single-process runner loop to keep the queued copy intact for
    /// bookkeeping while handing one off to the kernel.
    fn clone_for_run(&self) -> JobMessage {
        JobMessage {
            exec_constraints: self.exec_constraints.clone(),
            input_params: self.input_params.clone(),
            input_fifos: self.input_fifos.clone(),
            output_fifos: self.output_fifos.clone(),
            notification_flags: self.notification_flags.clone(),
            kernel_ix: self.kernel_ix,
            vertex_ix: self.vertex_ix,
            ix: self.ix,
            output_param_count: self.output_param_count,
        }
    }
}
