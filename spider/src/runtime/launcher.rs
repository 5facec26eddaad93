//! Builds `JobMessage`s from mapped `Schedule` tasks, ready to push onto
//! the owning LRT's job queue.

use crate::pisdf::{Graph, Param};
use crate::sched::{DependencyInfo, Fifo, Schedule, Task, TaskKind};

/// Translate a mapped task into the message its LRT needs to run it.
/// `producer_lrts` maps each exec dependency's producer task (by index in
/// `dependencies`) to the LRT it was mapped on, so the job's exec
/// constraints can be filled in; `lrt_count` sizes the notification flag
/// array.
pub fn build_job_message(
    graph: &Graph,
    task: &Task,
    task_ix: usize,
    dependencies: &[(DependencyInfo, Option<usize>)],
    schedule: &Schedule,
    fifos_in: &[Fifo],
    fifos_out: &[Fifo],
    params: &[Param],
    kernel_ix: Option<usize>,
    producer_lrt: impl Fn(usize) -> Option<usize>,
    notify_lrts: &[usize],
    lrt_count: usize,
) -> crate::runtime::message::JobMessage {
    use crate::runtime::message::{JobConstraint, JobMessage};

    let exec_constraints = dependencies
        .iter()
        .filter_map(|(_, producer_ix)| {
            let producer_ix = (*producer_ix)?;
            let lrt = producer_lrt(producer_ix)?;
            let job_to_wait = schedule.task(producer_ix)?.ix;
            Some(JobConstraint { lrt_to_wait: lrt, job_to_wait })
        })
        .collect();

    let vertex_ix = match task.kind {
        TaskKind::Vertex { vertex, .. } => vertex,
        TaskKind::Sync { .. } => usize::MAX,
    };
    let input_params: Vec<i64> = params.iter().filter_map(|p| p.value()).collect();
    let output_param_count = if vertex_ix != usize::MAX {
        graph
            .vertices
            .get(vertex_ix)
            .map(|v| v.output_ports.len() as i32)
            .unwrap_or(0)
    } else {
        0
    };

    let mut notification_flags = vec![false; lrt_count];
    for &lrt in notify_lrts {
        if lrt < lrt_count {
            notification_flags[lrt] = true;
        }
    }

    JobMessage {
        exec_constraints,
        input_params,
        input_fifos: fifos_in.to_vec(),
        output_fifos: fifos_out.to_vec(),
        notification_flags,
        kernel_ix,
        vertex_ix,
        ix: task_ix,
        output_param_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pisdf::{Graph, VertexKind};
    use crate::sched::Task;

    #[test]
    fn job_message_carries_resolved_params_and_fifos() {
        let mut g = Graph::new("g");
        let v = g.create_vertex("V", VertexKind::Normal, 0, 1);
        let schedule = Schedule::new();
        let task = Task::new_vertex(v, 0, 0);
        let fifo_out = Fifo {
            address: 0,
            offset: 0,
            size: 4,
            count: 1,
            attribute: crate::sched::FifoAttribute::RwOwn,
        };
        let job = build_job_message(
            &g,
            &task,
            0,
            &[],
            &schedule,
            &[],
            &[fifo_out],
            &[],
            Some(2),
            |_| None,
            &[],
            1,
        );
        assert_eq!(job.kernel_ix, Some(2));
        assert_eq!(job.output_fifos.len(), 1);
        assert_eq!(job.output_param_count, 1);
    }
}
