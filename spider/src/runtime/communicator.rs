//! Per-LRT job/notification channels and the shared parameter/trace
//! stores every LRT appends to and the GRT drains.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::runtime::message::{JobMessage, Notification, ParameterMessage, TraceMessage};

/// One LRT's inbound channels, handed out exactly once via
/// `take_job_receiver`/`take_notification_receiver` when that LRT's runner
/// thread starts.
struct Inbox {
    job_tx: Sender<JobMessage>,
    job_rx: Mutex<Option<Receiver<JobMessage>>>,
    notif_tx: Sender<Notification>,
    notif_rx: Mutex<Option<Receiver<Notification>>>,
}

/// Connects every LRT to every other LRT. Job and notification queues are
/// unbounded MPSC channels, one pair per destination LRT; dynamic
/// parameter and trace payloads go through an indexed append-only store
/// instead, since the original protocol sends only a store index over the
/// notification channel and reads the payload out-of-band.
pub struct Communicator {
    inboxes: Vec<Inbox>,
    param_store: Mutex<Vec<ParameterMessage>>,
    trace_store: Mutex<Vec<TraceMessage>>,
}

impl Communicator {
    pub fn new(lrt_count: usize) -> Self {
        let inboxes = (0..lrt_count)
            .map(|_| {
                let (job_tx, job_rx) = unbounded();
                let (notif_tx, notif_rx) = unbounded();
                Inbox {
                    job_tx,
                    job_rx: Mutex::new(Some(job_rx)),
                    notif_tx,
                    notif_rx: Mutex::new(Some(notif_rx)),
                }
            })
            .collect();
        Communicator {
            inboxes,
            param_store: Mutex::new(Vec::new()),
            trace_store: Mutex::new(Vec::new()),
        }
    }

    pub fn lrt_count(&self) -> usize {
        self.inboxes.len()
    }

    pub fn push_job(&self, job: JobMessage, lrt_ix: usize) {
        let _ = self.inboxes[lrt_ix].job_tx.send(job);
    }

    pub fn push_notification(&self, notification: Notification, lrt_ix: usize) {
        let _ = self.inboxes[lrt_ix].notif_tx.send(notification);
    }

    pub fn take_job_receiver(&self, lrt_ix: usize) -> Receiver<JobMessage> {
        self.inboxes[lrt_ix]
            .job_rx
            .lock()
            .take()
            .expect("job receiver already taken for this LRT")
    }

    pub fn take_notification_receiver(&self, lrt_ix: usize) -> Receiver<Notification> {
        self.inboxes[lrt_ix]
            .notif_rx
            .lock()
            .take()
            .expect("notification receiver already taken for this LRT")
    }

    /// Append a `ParameterMessage` and return its store index, to be
    /// forwarded to the GRT as a `Notification::ParamAvailable`.
    pub fn push_param(&self, message: ParameterMessage) -> usize {
        let mut store = self.param_store.lock();
        store.push(message);
        store.len() - 1
    }

    pub fn take_param(&self, index: usize) -> Option<ParameterMessage> {
        self.param_store.lock().get(index).cloned()
    }

    pub fn push_trace(&self, message: TraceMessage) -> usize {
        let mut store = self.trace_store.lock();
        store.push(message);
        store.len() - 1
    }

    pub fn drain_traces(&self) -> Vec<TraceMessage> {
        std::mem::take(&mut *self.trace_store.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_pushed_to_one_lrt_is_received_there() {
        let comm = Communicator::new(2);
        let rx = comm.take_job_receiver(1);
        comm.push_job(JobMessage { vertex_ix: 7, ..Default::default() }, 1);
        let job = rx.recv().unwrap();
        assert_eq!(job.vertex_ix, 7);
    }

    #[test]
    fn param_store_returns_index_for_later_lookup() {
        let comm = Communicator::new(1);
        let ix = comm.push_param(ParameterMessage { params: vec![42], vertex_ix: 3 });
        let msg = comm.take_param(ix).unwrap();
        assert_eq!(msg.params, vec![42]);
    }

    #[test]
    #[should_panic]
    fn taking_job_receiver_twice_panics() {
        let comm = Communicator::new(1);
        let _first = comm.take_job_receiver(0);
        let _second = comm.take_job_receiver(0);
    }
}
