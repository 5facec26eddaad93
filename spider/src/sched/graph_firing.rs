//! One resolved instance of a graph: a parameter table, a repetition
//! vector, the scheduler tasks for every (vertex, firing), and the lazily
//! created child handlers for its hierarchical vertices.

use std::collections::HashMap;

use crate::error::SpiderResult;
use crate::pisdf::{Graph, Param, ParamType};
use crate::sched::brv::compute_brv;
use crate::sched::fifo::Fifo;
use crate::sched::schedule::Schedule;
use crate::sched::task::Task;

/// A single firing of the hierarchical vertex that contains this graph (or
/// firing 0 of the root graph, which has none). Dynamic parameters and the
/// repetition vector are resolved independently per firing, since a CONFIG
/// actor inside the parent may have produced a different value each time.
#[derive(Debug, Clone)]
pub struct GraphFiring {
    pub params: Vec<Param>,
    pub brv: Vec<u32>,
    pub resolved: bool,
    /// Per-vertex, per-local-firing index into a `Schedule`, populated by
    /// `initialize`.
    pub task_ix: Vec<Vec<Option<usize>>>,
    /// Per-edge allocated buffer descriptor, populated by the FIFO
    /// allocator once tasks are mapped.
    pub fifos: HashMap<usize, Fifo>,
    /// Per-vertex arena index of the child `GraphHandler`, for
    /// `VertexKind::Graph` vertices only.
    pub children: Vec<Option<usize>>,
}

impl GraphFiring {
    /// Build a fresh, unresolved firing. `graph`'s own parameter
    /// declarations are copied verbatim; `Inherited` ones are left
    /// unresolved until `resolve` is given the parent's table.
    pub fn new(graph: &Graph) -> Self {
        GraphFiring {
            params: graph.params.clone(),
            brv: Vec::new(),
            resolved: false,
            task_ix: Vec::new(),
            fifos: HashMap::new(),
            children: vec![None; graph.vertices.len()],
        }
    }

    /// Resolve `Inherited` parameters from the parent firing's table, then
    /// compute the repetition vector. Idempotent: re-running after a CONFIG
    /// actor updates a `Dynamic` parameter recomputes the BRV from scratch.
    pub fn resolve(&mut self, graph: &Graph, parent_params: &[Param]) -> SpiderResult<()> {
        for param in &mut self.params {
            param.resolve_from_parent(parent_params);
        }
        self.brv = compute_brv(graph, &self.params)?;
        self.resolved = true;
        Ok(())
    }

    /// Write a `Dynamic` parameter's value, as set by a CONFIG actor's
    /// runtime callback, and mark this firing unresolved so the next
    /// `resolve` recomputes the BRV under the new value.
    pub fn set_param_value(&mut self, param_ix: usize, value: i64) {
        if let Some(param) = self.params.get_mut(param_ix) {
            if param.kind() == ParamType::Dynamic {
                param.set_value(value);
                self.resolved = false;
            }
        }
    }

    /// Instantiate one `Task` per (non-hierarchical-vertex, firing) pair
    /// into `schedule`, recording each task's index for later lookup by the
    /// dependency/mapping passes. `handler_ix` is this firing's own arena
    /// index, threaded through `TaskKind::Vertex` so a task can find its
    /// way back to the parameter table and BRV that produced it.
    pub fn initialize(&mut self, graph: &Graph, handler_ix: usize, schedule: &mut Schedule) {
        self.task_ix = self
            .brv
            .iter()
            .map(|&rv| vec![None; rv as usize])
            .collect();
        for (vertex_ix, _vertex) in graph.vertices.iter().enumerate() {
            for firing in 0..self.brv[vertex_ix] {
                let ix = schedule.add_task(Task::new_vertex(vertex_ix, firing, handler_ix));
                self.task_ix[vertex_ix][firing as usize] = Some(ix);
            }
        }
    }

    pub fn task(&self, vertex: usize, firing: u32) -> Option<usize> {
        self.task_ix
            .get(vertex)
            .and_then(|firings| firings.get(firing as usize))
            .copied()
            .flatten()
    }

    /// Drop everything this firing accumulated so it can be reused for the
    /// next loop iteration without reallocating the handler tree: clears
    /// task indices and fifo records, resets `Dynamic` parameters back to
    /// unresolved, and releases child handlers (they are recreated lazily
    /// next time their hierarchical vertex fires).
    pub fn reset(&mut self, graph: &Graph) {
        self.task_ix.clear();
        self.fifos.clear();
        self.children = vec![None; graph.vertices.len()];
        self.resolved = false;
        for param in &mut self.params {
            if param.kind() == ParamType::Dynamic {
                *param = Param::new(param.name(), ParamType::Dynamic, None);
            }
        }
    }
}
