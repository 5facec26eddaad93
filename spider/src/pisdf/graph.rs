//! Hierarchical dataflow graph container.

use crate::expression::Expression;
use crate::pisdf::delay::Delay;
use crate::pisdf::edge::Edge;
use crate::pisdf::param::{Param, ParamType};
use crate::pisdf::vertex::{Vertex, VertexKind};

/// A PiSDF graph: vertices, edges, parameters, and the subset of vertices
/// acting as this graph's input/output interfaces toward its parent.
#[derive(Debug, Clone)]
pub struct Graph {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
    pub params: Vec<Param>,
    pub input_interfaces: Vec<usize>,
    pub output_interfaces: Vec<usize>,
    /// Child graphs hierarchically nested under a `VertexKind::Graph`
    /// vertex of this graph, indexed by `Vertex::subgraph`.
    pub subgraphs: Vec<Graph>,
}

impl Graph {
    pub fn new(name: &str) -> Self {
        Graph {
            name: name.to_owned(),
            vertices: Vec::new(),
            edges: Vec::new(),
            params: Vec::new(),
            input_interfaces: Vec::new(),
            output_interfaces: Vec::new(),
            subgraphs: Vec::new(),
        }
    }

    /// Create a vertex with `input_count`/`output_count` dense 0..N-1 ports
    /// (ports are populated with a unit rate until `create_edge` attaches a
    /// real rate expression, mirroring `createVertex`).
    pub fn create_vertex(
        &mut self,
        name: &str,
        kind: VertexKind,
        input_count: usize,
        output_count: usize,
    ) -> usize {
        let mut vertex = Vertex::new(name, kind, input_count, output_count);
        for _ in 0..input_count {
            vertex
                .input_ports
                .push(crate::pisdf::vertex::Port::new(Expression::from_value(0)));
        }
        for _ in 0..output_count {
            vertex
                .output_ports
                .push(crate::pisdf::vertex::Port::new(Expression::from_value(0)));
        }
        if kind == VertexKind::Input {
            self.input_interfaces.push(self.vertices.len());
        }
        if kind == VertexKind::Output {
            self.output_interfaces.push(self.vertices.len());
        }
        self.vertices.push(vertex);
        self.vertices.len() - 1
    }

    /// Connect `src`'s output port `src_port` to `snk`'s input port
    /// `snk_port`, recording each side's rate on the corresponding `Port`.
    pub fn create_edge(
        &mut self,
        src: usize,
        src_port: usize,
        src_rate: Expression,
        snk: usize,
        snk_port: usize,
        snk_rate: Expression,
    ) -> usize {
        self.vertices[src].output_ports[src_port].rate = src_rate.clone();
        self.vertices[snk].input_ports[snk_port].rate = snk_rate.clone();
        let edge = Edge::new(src, src_port, src_rate, snk, snk_port, snk_rate);
        self.edges.push(edge);
        self.edges.len() - 1
    }

    pub fn create_param(&mut self, name: &str, kind: ParamType, value: Option<i64>) -> usize {
        self.params.push(Param::new(name, kind, value));
        self.params.len() - 1
    }

    /// Attach a delay to an existing edge.
    pub fn create_delay(&mut self, edge_ix: usize, delay: Delay) {
        self.edges[edge_ix].delay = Some(delay);
    }

    pub fn input_edge(&self, vertex: usize, port: usize) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.snk_vertex == vertex && e.snk_port == port)
    }

    pub fn output_edge(&self, vertex: usize, port: usize) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.src_vertex == vertex && e.src_port == port)
    }

    pub fn input_edges(&self, vertex: usize) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.snk_vertex == vertex).collect()
    }

    pub fn output_edges(&self, vertex: usize) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.src_vertex == vertex).collect()
    }

    /// Nest `child` under `vertex_ix` (which must be `VertexKind::Graph`),
    /// returning its index into `self.subgraphs`.
    pub fn create_subgraph(&mut self, vertex_ix: usize, child: Graph) -> usize {
        self.subgraphs.push(child);
        let ix = self.subgraphs.len() - 1;
        self.vertices[vertex_ix].subgraph = Some(ix);
        ix
    }

    /// Register which runtime kernel a vertex's firings invoke.
    pub fn set_vertex_kernel(&mut self, vertex_ix: usize, kernel_ix: usize) {
        self.vertices[vertex_ix].kernel_ix = Some(kernel_ix);
    }

    /// For a `CONFIG` vertex: bind its kernel's output values, in order, to
    /// parameter indices in this graph's parameter table.
    pub fn set_vertex_output_params(&mut self, vertex_ix: usize, param_ixs: Vec<usize>) {
        self.vertices[vertex_ix].output_params = param_ixs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_vertex_assigns_dense_port_indices() {
        let mut g = Graph::new("g");
        let a = g.create_vertex("A", VertexKind::Normal, 0, 1);
        let b = g.create_vertex("B", VertexKind::Normal, 1, 0);
        g.create_edge(a, 0, Expression::from_value(2), b, 0, Expression::from_value(3));
        assert_eq!(g.output_edge(a, 0).unwrap().snk_vertex, b);
        assert_eq!(g.input_edge(b, 0).unwrap().src_vertex, a);
    }
}
