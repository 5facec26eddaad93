//! List scheduler: assigns a longest-path criticality level to every
//! firing, sorts descending, and iterates taking only the firings that are
//! schedulable right now.

use std::collections::HashMap;

use crate::pisdf::{Graph, Param};
use crate::sched::dependencies::compute_exec_dependencies;

/// One entry of the flattened, sorted task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListTask {
    pub vertex: usize,
    pub firing: u32,
    pub level: i32,
}

/// `level(t) = max over predecessor dependency d of (level(d.producer) +
/// min_exec_time(d.producer))`; vertices with no (non-delay) input
/// dependency are leaves at level 0. Dependencies fully satisfied by delay
/// tokens (`firing_lower == firing_upper == -1`) contribute nothing — the
/// data is already available at firing-setup time.
///
/// Memoized over `(vertex, firing)`; recursion only follows non-delay
/// edges, since a delayed edge represents a loop back to a prior
/// iteration and must not be walked for an intra-iteration critical path.
pub fn compute_schedule_level(
    graph: &Graph,
    vertex: usize,
    firing: u32,
    params: &[Param],
    memo: &mut HashMap<(usize, u32), i32>,
) -> i32 {
    if let Some(&level) = memo.get(&(vertex, firing)) {
        return level;
    }
    // Guard against the recursion below re-entering the same node while
    // it's being computed (should not happen on an acyclic non-delay
    // subgraph, but keeps this function total).
    memo.insert((vertex, firing), 0);

    let mut level = 0i32;
    for (edge_ix, edge) in graph.input_edges(vertex).into_iter().enumerate() {
        if edge.delay.is_some() {
            continue;
        }
        let dep = compute_exec_dependencies(graph, vertex, firing, params)[edge_ix];
        if dep.firing_lower < 0 && dep.firing_upper < 0 {
            continue;
        }
        let producer_firing = dep.firing_upper.max(0) as u32;
        let producer_level =
            compute_schedule_level(graph, dep.counterpart_vertex, producer_firing, params, memo);
        let exec = graph.vertices[dep.counterpart_vertex]
            .rt_info
            .min_exec_time(params) as i32;
        level = level.max(producer_level + exec);
    }
    memo.insert((vertex, firing), level);
    level
}

/// Sorted, partially-parked view over every firing of a resolved
/// `GraphFiring`'s vertices.
#[derive(Debug, Default)]
pub struct ListScheduler {
    sorted: Vec<ListTask>,
    /// Number of trailing entries in `sorted` known non-schedulable as of
    /// the previous pass; skipped on the fast path of the next one.
    parked: usize,
}

impl ListScheduler {
    pub fn new() -> Self {
        ListScheduler::default()
    }

    pub fn clear(&mut self) {
        self.sorted.clear();
        self.parked = 0;
    }

    /// Populate the task list for every vertex/firing of `graph`, given its
    /// BRV, and compute each one's criticality level.
    pub fn recursive_add_vertices(&mut self, graph: &Graph, rv: &[u32], params: &[Param]) {
        self.sorted.clear();
        self.parked = 0;
        let mut memo = HashMap::new();
        for vertex in 0..graph.vertices.len() {
            for firing in 0..rv[vertex] {
                let level = compute_schedule_level(graph, vertex, firing, params, &mut memo);
                self.sorted.push(ListTask {
                    vertex,
                    firing,
                    level,
                });
            }
        }
        self.sort_vertices();
    }

    /// Descending level; ties broken by vertex index, then firing index.
    fn sort_vertices(&mut self) {
        self.sorted.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then(a.vertex.cmp(&b.vertex))
                .then(a.firing.cmp(&b.firing))
        });
    }

    /// One scheduling pass: returns, in sorted order, every firing that is
    /// schedulable now according to `is_ready` (a predicate over
    /// `(vertex, firing)` answering whether all of that firing's exec
    /// dependencies are already satisfied). Tasks found non-schedulable are
    /// parked at the tail for the next pass.
    pub fn schedule<F: Fn(usize, u32) -> bool>(&mut self, is_ready: F) -> Vec<ListTask> {
        let active_len = self.sorted.len() - self.parked;
        let mut ready = Vec::new();
        let mut still_parked = Vec::new();
        for task in self.sorted[..active_len].iter() {
            if is_ready(task.vertex, task.firing) {
                ready.push(*task);
            } else {
                still_parked.push(*task);
            }
        }
        let parked_tail = self.sorted[active_len..].to_vec();
        self.sorted.clear();
        self.sorted.extend(ready.iter().copied());
        self.sorted.extend(still_parked.iter());
        self.sorted.extend(parked_tail);
        self.parked = self.sorted.len() - ready.len();
        ready
    }

    pub fn count_non_schedulable(&self) -> usize {
        self.parked
    }

    pub fn sorted_tasks(&self) -> &[ListTask] {
        &self.sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;
    use crate::pisdf::{Graph, VertexKind};

    fn vertex_with_time(g: &mut Graph, name: &str, ins: usize, outs: usize, time: i64) -> usize {
        let v = g.create_vertex(name, VertexKind::Normal, ins, outs);
        g.vertices[v].rt_info.set_mappable(0, true);
        g.vertices[v]
            .rt_info
            .set_timing(0, Expression::from_value(time));
        v
    }

    #[test]
    fn worked_example_levels() {
        // A(100) -> B(200)
        //        -> C(100) -> D(100)
        //                   -> E(300) -> G(100)
        //          F(100) ->
        let mut g = Graph::new("g");
        let a = vertex_with_time(&mut g, "A", 0, 2, 100);
        let b = vertex_with_time(&mut g, "B", 1, 0, 200);
        let c = vertex_with_time(&mut g, "C", 1, 2, 100);
        let d = vertex_with_time(&mut g, "D", 1, 0, 100);
        let e = vertex_with_time(&mut g, "E", 1, 1, 300);
        let f = vertex_with_time(&mut g, "F", 0, 1, 100);
        let gg = vertex_with_time(&mut g, "G", 2, 0, 100);

        let one = || Expression::from_value(1);
        g.create_edge(a, 0, one(), b, 0, one());
        g.create_edge(a, 1, one(), c, 0, one());
        g.create_edge(c, 0, one(), d, 0, one());
        g.create_edge(c, 1, one(), e, 0, one());
        g.create_edge(e, 0, one(), gg, 0, one());
        g.create_edge(f, 0, one(), gg, 1, one());

        let mut memo = HashMap::new();
        let level_of = |v: usize, memo: &mut HashMap<(usize, u32), i32>| {
            compute_schedule_level(&g, v, 0, &[], memo)
        };
        assert_eq!(level_of(a, &mut memo), 0);
        assert_eq!(level_of(b, &mut memo), 100);
        assert_eq!(level_of(c, &mut memo), 100);
        assert_eq!(level_of(d, &mut memo), 200);
        assert_eq!(level_of(e, &mut memo), 200);
        assert_eq!(level_of(gg, &mut memo), 500);
        let _ = f;
    }

    #[test]
    fn sort_breaks_ties_by_vertex_then_firing() {
        let mut sched = ListScheduler::default();
        sched.sorted = vec![
            ListTask { vertex: 2, firing: 0, level: 5 },
            ListTask { vertex: 1, firing: 1, level: 5 },
            ListTask { vertex: 1, firing: 0, level: 5 },
        ];
        sched.sort_vertices();
        assert_eq!(
            sched.sorted,
            vec![
                ListTask { vertex: 1, firing: 0, level: 5 },
                ListTask { vertex: 1, firing: 1, level: 5 },
                ListTask { vertex: 2, firing: 0, level: 5 },
            ]
        );
    }

    #[test]
    fn non_schedulable_tasks_are_parked() {
        let mut sched = ListScheduler::default();
        sched.sorted = vec![
            ListTask { vertex: 0, firing: 0, level: 1 },
            ListTask { vertex: 1, firing: 0, level: 0 },
        ];
        let ready = sched.schedule(|vertex, _| vertex == 0);
        assert_eq!(ready.len(), 1);
        assert_eq!(sched.count_non_schedulable(), 1);
    }
}
