//! Round-robin mapper: for each task, walks clusters in platform order and
//! maps onto the first cluster that admits it, cycling PEs within that
//! cluster across calls.

use crate::archi::{MemoryBus, Platform};
use crate::error::{SpiderError, SpiderResult};
use crate::pisdf::{Graph, Param};
use crate::sched::dependencies::DependencyInfo;
use crate::sched::schedule::Schedule;
use crate::sched::task::{SyncType, Task, TaskKind, TaskState};

/// Outcome of placing one task: the chosen PE and its committed time
/// window, plus whether cross-cluster SEND/RECEIVE tasks must be inserted.
#[derive(Debug, Clone, Copy)]
struct MappingResult {
    cluster_ix: u32,
    virtual_pe_ix: u32,
    start_time: u64,
    end_time: u64,
    needs_communication: bool,
}

/// Walks `platform.clusters` in order, advancing each cluster's round-robin
/// cursor as it scans for a mappable, enabled PE. Mirrors the original
/// mapper's `findPE`: at most one full lap per cluster, leaving the cursor
/// on the accepted PE (the caller advances it one more step on success).
fn find_pe(
    graph: &Graph,
    vertex: usize,
    platform: &mut Platform,
    cluster_ix: usize,
) -> Option<usize> {
    let cluster = &mut platform.clusters[cluster_ix];
    let pe_count = cluster.pe_count();
    if pe_count == 0 {
        return None;
    }
    let mut tries = 0;
    while tries < pe_count {
        let pe = &cluster.pes[cluster.round_robin_cursor];
        if pe.enabled && graph.vertices[vertex].rt_info.is_mappable_on_pe(pe.virtual_ix) {
            return Some(cluster.round_robin_cursor);
        }
        cluster.round_robin_cursor = (cluster.round_robin_cursor + 1) % pe_count;
        tries += 1;
    }
    None
}

/// `max(0, max over dependency of schedule.end_time(producer task))`: a
/// task cannot start before every one of its exec dependencies has
/// produced its data.
pub fn compute_start_time(producer_task_ixs: &[Option<usize>], schedule: &Schedule) -> u64 {
    producer_task_ixs
        .iter()
        .filter_map(|ix| *ix)
        .filter_map(|ix| schedule.end_time(ix))
        .filter(|&t| t != u64::MAX)
        .max()
        .unwrap_or(0)
}

/// Map one vertex firing's task onto a PE, inserting SEND/RECEIVE sync
/// tasks across a `MemoryBus` wherever a dependency's producer landed on a
/// different cluster. `dependencies` pairs each exec dependency with the
/// task index of its producer firing, already scheduled. Returns the
/// chosen cluster so the caller can allocate that task's output FIFOs
/// against the right `MemoryInterface`, or `None` if the task was already
/// `Skipped` (the NoSync shortcut folded it into its producer).
pub fn map_task(
    graph: &Graph,
    vertex: usize,
    task_ix: usize,
    dependencies: &[(DependencyInfo, Option<usize>)],
    params: &[Param],
    platform: &mut Platform,
    bus: &MemoryBus,
    schedule: &mut Schedule,
) -> SpiderResult<Option<u32>> {
    if matches!(schedule.task(task_ix).map(|t| t.state), Some(TaskState::Skipped)) {
        return Ok(None);
    }
    let producer_ixs: Vec<Option<usize>> = dependencies.iter().map(|(_, ix)| *ix).collect();
    let min_start_time = compute_start_time(&producer_ixs, schedule);

    let mut best: Option<MappingResult> = None;
    for cluster_ix in 0..platform.clusters.len() {
        let Some(pe_ix) = find_pe(graph, vertex, platform, cluster_ix) else {
            continue;
        };
        let virtual_pe_ix = platform.clusters[cluster_ix].pes[pe_ix].virtual_ix;
        platform.clusters[cluster_ix].round_robin_cursor =
            (platform.clusters[cluster_ix].round_robin_cursor + 1)
                % platform.clusters[cluster_ix].pe_count();

        let pe_end = schedule.stats().end_time(virtual_pe_ix as usize);
        let start_time = pe_end.max(min_start_time);
        let exec_time = graph.vertices[vertex]
            .rt_info
            .timing(virtual_pe_ix, params)
            .unwrap_or(0) as u64;
        let end_time = start_time + exec_time;

        let needs_communication = dependencies.iter().any(|(_, producer_ix)| {
            producer_ix
                .and_then(|ix| schedule.task(ix))
                .and_then(|t| t.mapped_pe)
                .and_then(|pe| platform.find_pe_by_virtual_ix(pe))
                .map(|(producer_cluster, _)| producer_cluster != cluster_ix as u32)
                .unwrap_or(false)
        });
        let communication_cost = if needs_communication {
            dependencies
                .iter()
                .map(|(dep, _)| bus.receive_cost(dep.byte_length.max(0) as u64))
                .sum()
        } else {
            0
        };
        let schedule_cost = end_time.saturating_add(communication_cost);

        let better = best.map(|b| schedule_cost < b.end_time).unwrap_or(true);
        if better {
            let _ = pe_ix;
            best = Some(MappingResult {
                cluster_ix: cluster_ix as u32,
                virtual_pe_ix,
                start_time,
                end_time,
                needs_communication,
            });
        }
        // The original breaks on the first admitting cluster, not the best
        // of all clusters.
        break;
    }

    let Some(result) = best else {
        return Err(SpiderError::MappingUnsatisfiable {
            vertex: graph.vertices[vertex].name.clone(),
        });
    };

    if result.needs_communication {
        insert_sync_tasks(dependencies, result.cluster_ix, bus, schedule);
    }

    schedule.update_task_and_set_ready(
        task_ix,
        result.virtual_pe_ix,
        result.start_time,
        result.end_time,
    );
    Ok(Some(result.cluster_ix))
}

/// Insert one SEND/RECEIVE pair per dependency whose producer landed on a
/// different cluster than the consumer. The SEND is appended to the
/// producer's cluster schedule-wise (time-wise it trails the producer);
/// the RECEIVE feeds the consumer.
fn insert_sync_tasks(
    dependencies: &[(DependencyInfo, Option<usize>)],
    consumer_cluster: u32,
    bus: &MemoryBus,
    schedule: &mut Schedule,
) {
    for (dep, producer_ix) in dependencies {
        let Some(producer_ix) = producer_ix else { continue };
        let Some(producer) = schedule.task(*producer_ix) else { continue };
        let Some(producer_pe) = producer.mapped_pe else { continue };
        let bytes = dep.byte_length.max(0) as u64;
        let send = Task::new_sync(SyncType::Send, *producer_ix, consumer_cluster as usize, bytes);
        let send_ix = schedule.add_task(send);
        let send_start = producer.end_time;
        let send_end = send_start + bus.send_cost(bytes);
        schedule.update_task_and_set_ready(send_ix, producer_pe, send_start, send_end);

        let mut receive = Task::new_sync(SyncType::Receive, *producer_ix, consumer_cluster as usize, bytes);
        if let TaskKind::Sync { counterpart, .. } = &mut receive.kind {
            *counterpart = Some(send_ix);
        }
        let receive_ix = schedule.add_task(receive);
        let receive_end = send_end + bus.receive_cost(bytes);
        schedule.update_task_and_set_ready(receive_ix, producer_pe, send_end, receive_end);
        if let TaskKind::Sync { counterpart, .. } = &mut schedule.task_mut(send_ix).unwrap().kind {
            *counterpart = Some(receive_ix);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archi::{Pe, Platform};
    use crate::expression::Expression;
    use crate::pisdf::{Graph, VertexKind};

    fn one_cluster_platform(pe_count: u32) -> Platform {
        let mut platform = Platform::new(1, 1 << 20);
        for i in 0..pe_count {
            platform.clusters[0].add_pe(Pe::new(&format!("pe{i}"), 0, i, i));
        }
        platform
    }

    #[test]
    fn maps_onto_first_mappable_pe_and_advances_cursor() {
        let mut g = Graph::new("g");
        let v = g.create_vertex("V", VertexKind::Normal, 0, 0);
        g.vertices[v].rt_info.set_mappable(0, true);
        g.vertices[v].rt_info.set_mappable(1, true);
        g.vertices[v].rt_info.set_timing(0, Expression::from_value(10));
        g.vertices[v].rt_info.set_timing(1, Expression::from_value(5));

        let mut platform = one_cluster_platform(2);
        let bus = MemoryBus::new();
        let mut schedule = Schedule::new();
        let task_ix = schedule.add_task(Task::new_vertex(v, 0, 0));

        map_task(&g, v, task_ix, &[], &[], &mut platform, &bus, &mut schedule).unwrap();
        let task = schedule.task(task_ix).unwrap();
        assert_eq!(task.mapped_pe, Some(0));
        assert_eq!(platform.clusters[0].round_robin_cursor, 1);
    }

    #[test]
    fn skips_unmappable_pe_and_wraps_cursor() {
        let mut g = Graph::new("g");
        let v = g.create_vertex("V", VertexKind::Normal, 0, 0);
        g.vertices[v].rt_info.set_mappable(1, true);
        g.vertices[v].rt_info.set_timing(1, Expression::from_value(5));

        let mut platform = one_cluster_platform(2);
        let bus = MemoryBus::new();
        let mut schedule = Schedule::new();
        let task_ix = schedule.add_task(Task::new_vertex(v, 0, 0));

        map_task(&g, v, task_ix, &[], &[], &mut platform, &bus, &mut schedule).unwrap();
        let task = schedule.task(task_ix).unwrap();
        assert_eq!(task.mapped_pe, Some(1));
    }

    #[test]
    fn unmappable_vertex_is_an_error() {
        let mut g = Graph::new("g");
        let v = g.create_vertex("V", VertexKind::Normal, 0, 0);
        let mut platform = one_cluster_platform(1);
        let bus = MemoryBus::new();
        let mut schedule = Schedule::new();
        let task_ix = schedule.add_task(Task::new_vertex(v, 0, 0));

        let err = map_task(&g, v, task_ix, &[], &[], &mut platform, &bus, &mut schedule).unwrap_err();
        assert_eq!(err.kind(), "MappingUnsatisfiable");
    }
}
