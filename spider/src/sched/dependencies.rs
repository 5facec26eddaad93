//! Firing-level producer/consumer dependency enumeration.

use crate::common::floor_div;
use crate::pisdf::{Edge, Graph, Param};

/// One producer/consumer range a firing depends on. `firing_lower ==
/// firing_upper == -1` means the whole dependency is satisfied by delay
/// (INIT) tokens rather than an actual upstream firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyInfo {
    pub counterpart_vertex: usize,
    pub firing_lower: i64,
    pub firing_upper: i64,
    pub byte_offset: i64,
    pub byte_length: i64,
}

/// `max(-1, floor((firing*consumption - delay) / production))`.
pub fn compute_cons_lower_dep(consumption: i64, production: i64, firing: i64, delay: i64) -> i64 {
    (-1).max(floor_div(firing * consumption - delay, production))
}

/// `max(-1, floor(((firing+1)*consumption - delay - 1) / production))`.
pub fn compute_cons_upper_dep(consumption: i64, production: i64, firing: i64, delay: i64) -> i64 {
    (-1).max(floor_div((firing + 1) * consumption - delay - 1, production))
}

fn delay_value(edge: &Edge, params: &[Param]) -> i64 {
    edge.delay.as_ref().map(|d| d.value.evaluate(params)).unwrap_or(0)
}

/// For consumer firing `firing` reading edge `e`: the range of producer
/// firings overlapping its consumed interval `[k*Rv - D, (k+1)*Rv - D)`.
pub fn compute_exec_dependency(edge: &Edge, firing: u32, params: &[Param]) -> DependencyInfo {
    let production = edge.src_rate.evaluate(params);
    let consumption = edge.snk_rate.evaluate(params);
    let delay = delay_value(edge, params);
    let f = firing as i64;
    let lower = compute_cons_lower_dep(consumption, production, f, delay);
    let upper = compute_cons_upper_dep(consumption, production, f, delay);
    let consumed_start = f * consumption - delay;
    let byte_offset = if lower >= 0 {
        consumed_start - lower * production
    } else {
        0
    };
    DependencyInfo {
        counterpart_vertex: edge.src_vertex,
        firing_lower: lower,
        firing_upper: upper,
        byte_offset,
        byte_length: consumption,
    }
}

/// For producer firing `firing` of edge `e`: the range of consumer firings
/// that read from it. Obtained from the same two formulas with
/// consumption/production swapped and the delay negated (the original
/// runtime shares one templated helper for both directions).
pub fn compute_cons_dependency(edge: &Edge, firing: u32, params: &[Param]) -> DependencyInfo {
    let production = edge.src_rate.evaluate(params);
    let consumption = edge.snk_rate.evaluate(params);
    let delay = delay_value(edge, params);
    let f = firing as i64;
    let lower = compute_cons_lower_dep(production, consumption, f, -delay);
    let upper = compute_cons_upper_dep(production, consumption, f, -delay);
    DependencyInfo {
        counterpart_vertex: edge.snk_vertex,
        firing_lower: lower,
        firing_upper: upper,
        byte_offset: 0,
        byte_length: production,
    }
}

/// One `DependencyInfo` per input edge of `vertex`'s firing `firing`.
pub fn compute_exec_dependencies(
    graph: &Graph,
    vertex: usize,
    firing: u32,
    params: &[Param],
) -> Vec<DependencyInfo> {
    graph
        .input_edges(vertex)
        .into_iter()
        .map(|e| compute_exec_dependency(e, firing, params))
        .collect()
}

/// One `DependencyInfo` per output edge of `vertex`'s firing `firing`.
pub fn compute_cons_dependencies(
    graph: &Graph,
    vertex: usize,
    firing: u32,
    params: &[Param],
) -> Vec<DependencyInfo> {
    graph
        .output_edges(vertex)
        .into_iter()
        .map(|e| compute_cons_dependency(e, firing, params))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_rates_map_one_to_one() {
        // production == consumption == 1, no delay: firing k depends only on producer firing k.
        assert_eq!(compute_cons_lower_dep(1, 1, 5, 0), 5);
        assert_eq!(compute_cons_upper_dep(1, 1, 5, 0), 5);
    }

    #[test]
    fn negative_interval_clamps_to_delay_sentinel() {
        // consumption 1, production 1, delay 2: firing 0 consumes [-2,-1), entirely delay tokens.
        assert_eq!(compute_cons_lower_dep(1, 1, 0, 2), -1);
        assert_eq!(compute_cons_upper_dep(1, 1, 0, 2), -1);
    }

    #[test]
    fn fan_in_spans_multiple_producer_firings() {
        // A produces rate 2, B consumes rate 3 (scenario 1 of the testable properties).
        // B firing 0 consumes [0,3): producer firings 0 ([0,2)) and 1 ([2,4)).
        assert_eq!(compute_cons_lower_dep(3, 2, 0, 0), 0);
        assert_eq!(compute_cons_upper_dep(3, 2, 0, 0), 1);
    }

    #[test]
    fn exec_dependency_picks_up_producer_vertex() {
        use crate::expression::Expression;
        use crate::pisdf::{Graph, VertexKind};
        let mut g = Graph::new("g");
        let a = g.create_vertex("A", VertexKind::Normal, 0, 1);
        let b = g.create_vertex("B", VertexKind::Normal, 1, 0);
        g.create_edge(a, 0, Expression::from_value(2), b, 0, Expression::from_value(3));
        let edge = g.input_edge(b, 0).unwrap();
        let dep = compute_exec_dependency(edge, 0, &[]);
        assert_eq!(dep.counterpart_vertex, a);
        assert_eq!(dep.firing_lower, 0);
        assert_eq!(dep.firing_upper, 1);
    }
}
