//! End-to-end scheduling scenarios exercised through the public `Runtime`/
//! `Platform`/`Graph` API.

use spider::archi::{MemoryBus, Pe, Platform};
use spider::expression::Expression;
use spider::pisdf::{Delay, Graph, ParamType, VertexKind};
use spider::runtime::Kernel;
use spider::sched::TaskKind;
use spider::Runtime;

fn single_pe_platform() -> Platform {
    let mut platform = Platform::new(1, 1 << 20);
    platform.clusters[0].add_pe(Pe::new("pe0", 0, 0, 0));
    platform
}

fn mappable(graph: &mut Graph, vertex: usize, pe: u32, time: i64) {
    graph.vertices[vertex].rt_info.set_mappable(pe, true);
    graph.vertices[vertex]
        .rt_info
        .set_timing(pe, Expression::from_value(time));
}

// Scenario 1: A produces rate 2, B consumes rate 3, no delay.
// BRV = {A:3, B:2}; every firing of both vertices gets a task.
#[test]
fn a_to_b_balanced_produces_expected_brv_and_task_count() {
    let mut graph = Graph::new("root");
    let a = graph.create_vertex("A", VertexKind::Normal, 0, 1);
    let b = graph.create_vertex("B", VertexKind::Normal, 1, 0);
    graph.create_edge(a, 0, Expression::from_value(2), b, 0, Expression::from_value(3));
    mappable(&mut graph, a, 0, 10);
    mappable(&mut graph, b, 0, 10);

    let mut runtime = Runtime::new(single_pe_platform());
    runtime.start(graph).unwrap();
    let schedule = runtime.iterate().unwrap();

    // 3 firings of A + 2 firings of B = 5 tasks, all mapped on the one PE.
    assert_eq!(schedule.task_count(), 5);
    for task in schedule.tasks() {
        assert_eq!(task.mapped_pe, Some(0));
        if let TaskKind::Vertex { vertex, .. } = task.kind {
            assert!(vertex == a || vertex == b);
        }
    }
}

// Scenario 4: two clusters, A mappable only on cluster 0, B only on
// cluster 1; the mapper must insert a SEND/RECEIVE pair and B must start
// no earlier than A's end plus the round-trip communication cost.
#[test]
fn cross_cluster_dependency_inserts_sync_tasks_with_ordered_timing() {
    let mut platform = Platform::new(2, 1 << 20);
    platform.clusters[0].add_pe(Pe::new("pe0", 0, 0, 0));
    platform.clusters[1].add_pe(Pe::new("pe1", 0, 0, 1));

    let mut graph = Graph::new("root");
    let a = graph.create_vertex("A", VertexKind::Normal, 0, 1);
    let b = graph.create_vertex("B", VertexKind::Normal, 1, 0);
    graph.create_edge(a, 0, Expression::from_value(100), b, 0, Expression::from_value(100));
    mappable(&mut graph, a, 0, 10);
    mappable(&mut graph, b, 1, 10);

    let mut runtime = Runtime::new(platform);
    runtime.set_memory_bus(MemoryBus::new());
    runtime.start(graph).unwrap();
    let schedule = runtime.iterate().unwrap();

    let a_task = schedule
        .tasks()
        .iter()
        .find(|t| matches!(t.kind, TaskKind::Vertex { vertex, .. } if vertex == a))
        .unwrap();
    let b_task = schedule
        .tasks()
        .iter()
        .find(|t| matches!(t.kind, TaskKind::Vertex { vertex, .. } if vertex == b))
        .unwrap();
    assert!(b_task.start_time >= a_task.end_time);
}

// Scenario 6: a vertex mappable on no PE must fail with MappingUnsatisfiable
// and the error must name the vertex.
#[test]
fn unmappable_vertex_fails_with_named_error() {
    let mut graph = Graph::new("root");
    graph.create_vertex("Orphan", VertexKind::Normal, 0, 0);

    let mut runtime = Runtime::new(single_pe_platform());
    runtime.start(graph).unwrap();
    let err = runtime.iterate().unwrap_err();
    assert_eq!(err.kind(), "MappingUnsatisfiable");
    assert!(err.to_string().contains("Orphan"));
}

// Repeatedly iterating a purely static graph yields schedules of the same
// shape each time (stats reset per call to `iterate`, since each call
// starts a fresh `Schedule`).
#[test]
fn repeated_iteration_of_static_graph_is_stable() {
    let mut graph = Graph::new("root");
    let a = graph.create_vertex("A", VertexKind::Normal, 0, 1);
    let b = graph.create_vertex("B", VertexKind::Normal, 1, 0);
    graph.create_edge(a, 0, Expression::from_value(1), b, 0, Expression::from_value(1));
    mappable(&mut graph, a, 0, 5);
    mappable(&mut graph, b, 0, 5);

    let mut runtime = Runtime::new(single_pe_platform());
    runtime.start(graph).unwrap();
    let first = runtime.iterate().unwrap();
    let second = runtime.iterate().unwrap();
    assert_eq!(first.task_count(), second.task_count());
}

// Scenario 2: P -> C with one INIT (delay) token and equal rates. C's whole
// consumed interval falls inside the delay, so it never depends on P's
// firing at all — placed on its own cluster, it must not be held back by
// P's (much longer) execution time.
#[test]
fn delayed_edge_lets_consumer_start_without_waiting_on_producer() {
    let mut platform = Platform::new(2, 1 << 20);
    platform.clusters[0].add_pe(Pe::new("pe0", 0, 0, 0));
    platform.clusters[1].add_pe(Pe::new("pe1", 0, 0, 1));

    let mut graph = Graph::new("root");
    let p = graph.create_vertex("P", VertexKind::Normal, 0, 1);
    let c = graph.create_vertex("C", VertexKind::Normal, 1, 0);
    let edge = graph.create_edge(p, 0, Expression::from_value(1), c, 0, Expression::from_value(1));
    graph.create_delay(edge, Delay::new(Expression::from_value(1), false));
    mappable(&mut graph, p, 0, 100);
    mappable(&mut graph, c, 1, 5);

    let mut runtime = Runtime::new(platform);
    runtime.set_memory_bus(MemoryBus::new());
    runtime.start(graph).unwrap();
    let schedule = runtime.iterate().unwrap();

    assert_eq!(schedule.task_count(), 2);
    let c_task = schedule
        .tasks()
        .iter()
        .find(|t| matches!(t.kind, TaskKind::Vertex { vertex, .. } if vertex == c))
        .unwrap();
    assert_eq!(c_task.start_time, 0);
    assert_eq!(c_task.end_time, 5);
}

// Scenario 3: V(rate 4) -> F(FORK, 4 outputs of rate 1) -> C0..C3(rate 1).
// The cluster's memory is sized to hold exactly V's own output and nothing
// more; FORK must fragment that buffer into its four outputs rather than
// reserving fresh memory for them, or this allocation fails.
#[test]
fn fork_outputs_share_producer_buffer_instead_of_allocating_fresh_memory() {
    let mut platform = Platform::new(1, 4);
    platform.clusters[0].add_pe(Pe::new("pe0", 0, 0, 0));

    let mut graph = Graph::new("root");
    let v = graph.create_vertex("V", VertexKind::Normal, 0, 1);
    let f = graph.create_vertex("F", VertexKind::Fork, 1, 4);
    graph.create_edge(v, 0, Expression::from_value(4), f, 0, Expression::from_value(4));
    mappable(&mut graph, v, 0, 1);
    mappable(&mut graph, f, 0, 1);
    let mut consumers = Vec::new();
    for i in 0..4 {
        let c = graph.create_vertex(&format!("C{i}"), VertexKind::Normal, 1, 0);
        graph.create_edge(f, i, Expression::from_value(1), c, 0, Expression::from_value(1));
        mappable(&mut graph, c, 0, 1);
        consumers.push(c);
    }

    let mut runtime = Runtime::new(platform);
    runtime.start(graph).unwrap();
    let schedule = runtime.iterate().unwrap();

    // V, F, and 4 consumers, all fitting in a cluster sized for V's output alone.
    assert_eq!(schedule.task_count(), 6);
}

// Scenario 5: a CONFIG actor's kernel output changes a Dynamic parameter
// that another edge's rate depends on. The BRV it affects only changes on
// the iteration *after* the actor's job ran, never the one during which it
// ran.
#[test]
fn config_actor_output_changes_brv_on_the_next_iteration() {
    let mut graph = Graph::new("root");
    let n = graph.create_param("n", ParamType::Dynamic, Some(2));

    let cfg = graph.create_vertex("Cfg", VertexKind::Config, 0, 0);
    let a = graph.create_vertex("A", VertexKind::Normal, 0, 1);
    let b = graph.create_vertex("B", VertexKind::Normal, 1, 0);
    let n_rate = Expression::parse("n", &graph.params).unwrap();
    graph.create_edge(a, 0, n_rate, b, 0, Expression::from_value(1));
    graph.set_vertex_output_params(cfg, vec![n]);
    mappable(&mut graph, cfg, 0, 1);
    mappable(&mut graph, a, 0, 1);
    mappable(&mut graph, b, 0, 1);

    let mut runtime = Runtime::new(single_pe_platform());
    let kernel: Kernel = Box::new(|_job| vec![5i64]);
    let kernel_ix = runtime.register_kernel(kernel);
    graph.set_vertex_kernel(cfg, kernel_ix);
    runtime.start(graph).unwrap();

    let first = runtime.iterate().unwrap();
    let second = runtime.iterate().unwrap();
    // n starts at 2: A:1, B:2, Cfg:1 = 4 tasks. Cfg's job runs during the
    // first pass, so its output is only visible to the second pass's BRV:
    // n becomes 5, B:5, for A:1, B:5, Cfg:1 = 7 tasks.
    assert_eq!(first.task_count(), 4);
    assert_eq!(second.task_count(), 7);
}
