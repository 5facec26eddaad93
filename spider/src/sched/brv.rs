//! Basic Repetition Vector resolution.

use crate::common::{ceil_div, gcd, lcm};
use crate::error::{SpiderError, SpiderResult};
use crate::pisdf::{Graph, Param, VertexKind};

/// Compute the repetition vector for every vertex of `graph`, given a fully
/// resolved (STATIC+DYNAMIC) parameter table.
///
/// Walks the connected subgraph assigning each vertex a rational repetition
/// factor via `rate(src) * q(src) = rate(snk) * q(snk)`, reduces to the
/// least integer solution by the LCM of denominators, then applies the two
/// interface/config-actor corrections described in `UpdateBRVVisitor`.
pub fn compute_brv(graph: &Graph, params: &[Param]) -> SpiderResult<Vec<u32>> {
    let n = graph.vertices.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    for edge in &graph.edges {
        if edge.src_vertex == edge.snk_vertex && edge.delay.is_none() {
            return Err(SpiderError::BalanceEquation {
                edge: format!(
                    "{}:{}->self",
                    graph.vertices[edge.src_vertex].name, edge.src_port
                ),
                message: "self-loop without a delay".to_owned(),
            });
        }
    }

    // adjacency: (other_vertex, rate_here, rate_other) from this vertex's perspective.
    let mut adjacency: Vec<Vec<(usize, i64, i64)>> = vec![Vec::new(); n];
    for edge in &graph.edges {
        let r_src = edge.src_rate.evaluate(params);
        let r_snk = edge.snk_rate.evaluate(params);
        if (r_src == 0) != (r_snk == 0) {
            return Err(SpiderError::BalanceEquation {
                edge: format!(
                    "{}->{}",
                    graph.vertices[edge.src_vertex].name, graph.vertices[edge.snk_vertex].name
                ),
                message: "zero rate on one endpoint but not the other".to_owned(),
            });
        }
        if r_src == 0 && r_snk == 0 {
            continue;
        }
        adjacency[edge.src_vertex].push((edge.snk_vertex, r_src, r_snk));
        adjacency[edge.snk_vertex].push((edge.src_vertex, r_snk, r_src));
    }

    let mut frac: Vec<Option<(i64, i64)>> = vec![None; n];
    let mut queue = std::collections::VecDeque::new();
    for start in 0..n {
        if frac[start].is_some() {
            continue;
        }
        frac[start] = Some((1, 1));
        queue.push_back(start);
        while let Some(v) = queue.pop_front() {
            let (num, den) = frac[v].unwrap();
            for &(other, rate_here, rate_other) in &adjacency[v] {
                if frac[other].is_some() {
                    continue;
                }
                // q(other) = q(v) * rate_here / rate_other
                let mut on = num * rate_here;
                let mut od = den * rate_other;
                let g = gcd(on, od).max(1);
                on /= g;
                od /= g;
                frac[other] = Some((on, od));
                queue.push_back(other);
            }
        }
    }

    let denom_lcm = frac
        .iter()
        .map(|f| f.unwrap_or((1, 1)).1)
        .fold(1i64, lcm);
    let mut rv: Vec<u32> = frac
        .iter()
        .map(|f| {
            let (num, den) = f.unwrap_or((1, 1));
            (num * (denom_lcm / den)) as u32
        })
        .collect();

    let mut scale_factor: u32 = 1;
    for edge in &graph.edges {
        if graph.vertices[edge.src_vertex].kind == VertexKind::Config {
            update_from_input_if(edge, &rv, params, &mut scale_factor);
        }
    }
    for &interface_ix in &graph.input_interfaces {
        if let Some(edge) = graph.output_edge(interface_ix, 0) {
            update_from_input_if(edge, &rv, params, &mut scale_factor);
        }
    }
    for &interface_ix in &graph.output_interfaces {
        if let Some(edge) = graph.input_edge(interface_ix, 0) {
            update_from_output_if(edge, &rv, params, &mut scale_factor);
        }
    }

    if scale_factor > 1 {
        for v in rv.iter_mut() {
            *v *= scale_factor;
        }
    }
    Ok(rv)
}

/// Shared by `CONFIG` output edges and input interfaces: scale up if the
/// sink side cannot consume everything the source side balances to.
fn update_from_input_if(
    edge: &crate::pisdf::Edge,
    rv: &[u32],
    params: &[Param],
    scale_factor: &mut u32,
) {
    let source_rate = edge.src_rate.evaluate(params);
    let sink_rate = edge.snk_rate.evaluate(params);
    let total_cons = sink_rate * rv[edge.snk_vertex] as i64 * *scale_factor as i64;
    if total_cons != 0 && total_cons < source_rate {
        *scale_factor *= ceil_div(source_rate, total_cons) as u32;
    }
}

/// Symmetric rule for output interfaces: scale up if the source side does
/// not yet produce enough to satisfy the interface's external rate.
fn update_from_output_if(
    edge: &crate::pisdf::Edge,
    rv: &[u32],
    params: &[Param],
    scale_factor: &mut u32,
) {
    let source_rate = edge.src_rate.evaluate(params);
    let sink_rate = edge.snk_rate.evaluate(params);
    let total_prod = source_rate * rv[edge.src_vertex] as i64 * *scale_factor as i64;
    if total_prod != 0 && total_prod < sink_rate {
        *scale_factor *= ceil_div(sink_rate, total_prod) as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;

    #[test]
    fn a_to_b_balanced() {
        // A produces rate 2, B consumes rate 3: BRV = {A:3, B:2}.
        let mut g = Graph::new("g");
        let a = g.create_vertex("A", VertexKind::Normal, 0, 1);
        let b = g.create_vertex("B", VertexKind::Normal, 1, 0);
        g.create_edge(
            a,
            0,
            Expression::from_value(2),
            b,
            0,
            Expression::from_value(3),
        );
        let rv = compute_brv(&g, &[]).unwrap();
        assert_eq!(rv[a], 3);
        assert_eq!(rv[b], 2);
    }

    #[test]
    fn disconnected_components_get_rv_one() {
        let mut g = Graph::new("g");
        g.create_vertex("A", VertexKind::Normal, 0, 0);
        g.create_vertex("B", VertexKind::Normal, 0, 0);
        let rv = compute_brv(&g, &[]).unwrap();
        assert_eq!(rv, vec![1, 1]);
    }

    #[test]
    fn zero_rate_mismatch_is_balance_error() {
        let mut g = Graph::new("g");
        let a = g.create_vertex("A", VertexKind::Normal, 0, 1);
        let b = g.create_vertex("B", VertexKind::Normal, 1, 0);
        g.create_edge(
            a,
            0,
            Expression::from_value(0),
            b,
            0,
            Expression::from_value(3),
        );
        let err = compute_brv(&g, &[]).unwrap_err();
        assert_eq!(err.kind(), "BalanceEquationError");
    }

    #[test]
    fn self_loop_without_delay_fails() {
        let mut g = Graph::new("g");
        let a = g.create_vertex("A", VertexKind::Normal, 1, 1);
        g.create_edge(
            a,
            0,
            Expression::from_value(1),
            a,
            0,
            Expression::from_value(1),
        );
        let err = compute_brv(&g, &[]).unwrap_err();
        assert_eq!(err.kind(), "BalanceEquationError");
    }
}
