//! The graph side of the firing tree: one `GraphHandler` per PiSDF `Graph`,
//! owning that graph's topology plus one `GraphFiring` per firing of the
//! hierarchical vertex it instantiates. Handlers live in a flat arena and
//! reference each other by index rather than by pointer, so the tree can be
//! torn down and rebuilt per loop iteration without juggling lifetimes.

use crate::pisdf::Graph;
use crate::sched::graph_firing::GraphFiring;

/// One PiSDF graph plus every firing of it that has occurred so far.
#[derive(Debug)]
pub struct GraphHandler {
    pub graph: Graph,
    pub firings: Vec<GraphFiring>,
}

impl GraphHandler {
    pub fn new(graph: Graph) -> Self {
        GraphHandler {
            graph,
            firings: Vec::new(),
        }
    }

    /// Instantiate one new firing, its `Inherited` parameters left
    /// unresolved until `resolve_firing` is called with the parent's table.
    pub fn add_firing(&mut self) -> usize {
        self.firings.push(GraphFiring::new(&self.graph));
        self.firings.len() - 1
    }

    pub fn firing(&self, ix: usize) -> Option<&GraphFiring> {
        self.firings.get(ix)
    }

    pub fn firing_mut(&mut self, ix: usize) -> Option<&mut GraphFiring> {
        self.firings.get_mut(ix)
    }

    pub fn reset(&mut self) {
        let graph = self.graph.clone();
        for firing in &mut self.firings {
            firing.reset(&graph);
        }
        self.firings.clear();
    }
}

/// Flat owner of every `GraphHandler` in the program, indexed by usize
/// rather than linked by `Rc`/pointer. `TaskKind::Vertex::handler` and
/// `GraphFiring::children` both carry indices into this arena.
#[derive(Debug, Default)]
pub struct HandlerArena {
    handlers: Vec<GraphHandler>,
}

impl HandlerArena {
    pub fn new() -> Self {
        HandlerArena::default()
    }

    pub fn alloc(&mut self, handler: GraphHandler) -> usize {
        self.handlers.push(handler);
        self.handlers.len() - 1
    }

    pub fn get(&self, ix: usize) -> &GraphHandler {
        &self.handlers[ix]
    }

    pub fn get_mut(&mut self, ix: usize) -> &mut GraphHandler {
        &mut self.handlers[ix]
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Lazily materialize the child handler for hierarchical vertex
    /// `vertex_ix` of `firing_ix`'s firing inside `parent_handler`, if it
    /// doesn't already exist. Returns the child's arena index.
    pub fn get_or_create_child(
        &mut self,
        parent_handler: usize,
        firing_ix: usize,
        vertex_ix: usize,
        child_graph: &Graph,
    ) -> usize {
        if let Some(existing) = self.get(parent_handler).firing(firing_ix).and_then(|f| f.children[vertex_ix]) {
            return existing;
        }
        let child = GraphHandler::new(child_graph.clone());
        let child_ix = self.alloc(child);
        if let Some(firing) = self.get_mut(parent_handler).firing_mut(firing_ix) {
            firing.children[vertex_ix] = Some(child_ix);
        }
        child_ix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pisdf::VertexKind;

    #[test]
    fn add_firing_assigns_dense_index() {
        let mut handler = GraphHandler::new(Graph::new("g"));
        let f0 = handler.add_firing();
        let f1 = handler.add_firing();
        assert_eq!(f0, 0);
        assert_eq!(f1, 1);
    }

    #[test]
    fn child_handler_is_created_once_and_reused() {
        let mut root = Graph::new("root");
        let sub_vertex = root.create_vertex("Sub", VertexKind::Graph, 0, 0);
        let mut arena = HandlerArena::new();
        let root_ix = arena.alloc(GraphHandler::new(root));
        let firing_ix = arena.get_mut(root_ix).add_firing();

        let child_graph = Graph::new("Sub");
        let first = arena.get_or_create_child(root_ix, firing_ix, sub_vertex, &child_graph);
        let second = arena.get_or_create_child(root_ix, firing_ix, sub_vertex, &child_graph);
        assert_eq!(first, second);
        assert_eq!(arena.len(), 2);
    }
}
