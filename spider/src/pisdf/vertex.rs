//! Vertex (firing unit) topology.

use std::collections::HashMap;

use crate::expression::Expression;
use crate::pisdf::param::Param;

/// The 16 structural roles a vertex can play. Distinguishing `Input`/
/// `Output` interfaces and `ExternIn`/`ExternOut` from plain `Normal`
/// actors (rather than folding them together) matches the original
/// `SpecialVertex`/`Types.h` subtype set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexKind {
    Normal,
    Config,
    Delay,
    Fork,
    Join,
    Duplicate,
    Tail,
    Head,
    Repeat,
    Init,
    End,
    Graph,
    Input,
    Output,
    ExternIn,
    ExternOut,
}

impl VertexKind {
    pub fn is_hierarchical(self) -> bool {
        matches!(self, VertexKind::Graph)
    }
}

/// One dense port slot on a vertex, carrying the rate expression of the
/// single edge attached to it.
#[derive(Debug, Clone)]
pub struct Port {
    pub rate: Expression,
}

impl Port {
    pub fn new(rate: Expression) -> Self {
        Port { rate }
    }
}

/// PE-mappability and timing-callback information for a vertex, keyed by
/// the PE's platform-wide virtual index.
#[derive(Debug, Clone, Default)]
pub struct RtInfo {
    mappable: HashMap<u32, bool>,
    timing: HashMap<u32, Expression>,
}

impl RtInfo {
    pub fn new() -> Self {
        RtInfo::default()
    }

    pub fn set_mappable(&mut self, pe_virtual_ix: u32, mappable: bool) {
        self.mappable.insert(pe_virtual_ix, mappable);
    }

    pub fn set_timing(&mut self, pe_virtual_ix: u32, timing: Expression) {
        self.timing.insert(pe_virtual_ix, timing);
    }

    pub fn is_mappable_on_pe(&self, pe_virtual_ix: u32) -> bool {
        self.mappable.get(&pe_virtual_ix).copied().unwrap_or(false)
    }

    /// Execution time of this vertex on the given PE, evaluated against the
    /// current (resolved) parameter table. `None` if the PE has no timing
    /// callback registered, even if otherwise mappable.
    pub fn timing(&self, pe_virtual_ix: u32, params: &[Param]) -> Option<i64> {
        self.timing
            .get(&pe_virtual_ix)
            .map(|expr| expr.evaluate(params))
    }

    /// Minimum execution time over every PE this vertex is mappable on.
    pub fn min_exec_time(&self, params: &[Param]) -> i64 {
        self.mappable
            .iter()
            .filter(|(_, &ok)| ok)
            .filter_map(|(pe, _)| self.timing(*pe, params))
            .min()
            .unwrap_or(0)
    }
}

/// A firing unit: one node of the PiSDF graph.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub name: String,
    pub kind: VertexKind,
    pub input_ports: Vec<Port>,
    pub output_ports: Vec<Port>,
    pub rt_info: RtInfo,
    /// Index of the child `Graph` this vertex hierarchically contains, if
    /// `kind == VertexKind::Graph`.
    pub subgraph: Option<usize>,
    /// Index of the registered `Kernel` this vertex's firings invoke, if any.
    pub kernel_ix: Option<usize>,
    /// For `VertexKind::Config`: indices into the owning `Graph`'s parameter
    /// table that this vertex's kernel output feeds, in output order.
    pub output_params: Vec<usize>,
}

impl Vertex {
    pub fn new(name: &str, kind: VertexKind, input_count: usize, output_count: usize) -> Self {
        Vertex {
            name: name.to_owned(),
            kind,
            input_ports: Vec::with_capacity(input_count),
            output_ports: Vec::with_capacity(output_count),
            rt_info: RtInfo::new(),
            subgraph: None,
            kernel_ix: None,
            output_params: Vec::new(),
        }
    }

    pub fn input_edge_count(&self) -> usize {
        self.input_ports.len()
    }

    pub fn output_edge_count(&self) -> usize {
        self.output_ports.len()
    }
}
