//! Spider: a parameterized, dynamic-dataflow (PiSDF) scheduling runtime.
//!
//! A [`Runtime`] owns the platform topology, the firing tree rooted at the
//! application graph, and the per-LRT execution state; [`Runtime::iterate`]
//! runs one scheduling pass end to end — BRV resolution, dependency-aware
//! list scheduling, round-robin mapping, FIFO allocation, and job dispatch
//! to the LRTs — descending into every hierarchical subgraph it encounters,
//! and returns the resulting [`Schedule`].

pub mod archi;
pub mod common;
pub mod error;
pub mod expression;
pub mod pisdf;
pub mod runtime;
pub mod sched;

use crossbeam_channel::Receiver;
use tracing::{info, warn};

use archi::{MemoryBus, MemoryInterface, Platform};
use error::{SpiderError, SpiderResult};
use pisdf::{Edge, Graph, Param, VertexKind};
use runtime::{build_job_message, Communicator, Kernel, Notification, ParameterMessage, RtRunner};
use sched::{
    allocate_duplicate_outputs, allocate_fork_outputs, compute_cons_dependency,
    compute_exec_dependencies, try_no_sync_shortcut, DependencyInfo, Fifo, FifoAllocator,
    GraphFiring, GraphHandler, HandlerArena, ListScheduler, Schedule, TaskState,
};

/// The GRT (general runtime thread) is, by convention, LRT 0: the one
/// `Runtime::iterate` itself runs on and the one every CONFIG actor's
/// parameter feedback is addressed to.
const GRT_IX: usize = 0;

/// Top-level handle encapsulating what the original runtime treats as
/// process-wide global state (`archi::platform()`, `rt::platform()`, the
/// arena registry): the target platform, the firing tree, the inter-LRT
/// communicator, and the trace/verbose toggles.
pub struct Runtime {
    pub platform: Platform,
    bus: MemoryBus,
    arena: HandlerArena,
    root_handler: Option<usize>,
    communicator: Option<Communicator>,
    runners: Vec<RtRunner>,
    kernels: Vec<Kernel>,
    fifo_allocator: FifoAllocator,
    grt_notif_rx: Option<Receiver<Notification>>,
    trace: bool,
    verbose: bool,
}

impl Runtime {
    pub fn new(platform: Platform) -> Self {
        Runtime {
            platform,
            bus: MemoryBus::new(),
            arena: HandlerArena::new(),
            root_handler: None,
            communicator: None,
            runners: Vec::new(),
            kernels: Vec::new(),
            fifo_allocator: FifoAllocator::new(false),
            grt_notif_rx: None,
            trace: false,
            verbose: false,
        }
    }

    pub fn set_memory_bus(&mut self, bus: MemoryBus) {
        self.bus = bus;
    }

    pub fn enable_trace(&mut self) {
        self.trace = true;
    }

    pub fn disable_trace(&mut self) {
        self.trace = false;
    }

    pub fn enable_verbose(&mut self) {
        self.verbose = true;
    }

    pub fn disable_verbose(&mut self) {
        self.verbose = false;
    }

    pub fn register_kernel(&mut self, kernel: Kernel) -> usize {
        self.kernels.push(kernel);
        self.kernels.len() - 1
    }

    /// Bring up per-LRT job/notification channels (one LRT per PE on the
    /// platform) and root the firing tree at `root_graph`'s single, outer
    /// firing. Matches the original's `start()`: everything here persists
    /// across `iterate()` calls until `quit()`.
    pub fn start(&mut self, root_graph: Graph) -> SpiderResult<()> {
        let lrt_count = self.platform.pe_count().max(1);
        let communicator = Communicator::new(lrt_count);
        let mut runners: Vec<RtRunner> = (0..lrt_count)
            .map(|ix| RtRunner::new(ix, lrt_count, None))
            .collect();
        for runner in &mut runners {
            runner.attach_receiver(communicator.take_job_receiver(runner.ix));
        }
        self.grt_notif_rx = Some(communicator.take_notification_receiver(GRT_IX));
        self.communicator = Some(communicator);
        self.runners = runners;
        self.fifo_allocator = FifoAllocator::new(false);

        let mut arena = HandlerArena::new();
        let root_ix = arena.alloc(GraphHandler::new(root_graph));
        arena.get_mut(root_ix).add_firing();
        self.arena = arena;
        self.root_handler = Some(root_ix);

        info!(lrt_count, "runtime started");
        Ok(())
    }

    /// Tear down everything `start()` built. Architecture (`self.platform`)
    /// and any `Delay`s persisted on the graph are left untouched — only
    /// the iteration-scoped firing tree and LRT state are dropped.
    pub fn quit(&mut self) {
        self.runners.clear();
        self.communicator = None;
        self.grt_notif_rx = None;
        self.fifo_allocator = FifoAllocator::new(false);
        self.arena = HandlerArena::new();
        self.root_handler = None;
        info!("runtime stopped");
    }

    /// Run one full scheduling pass over the root graph's current firing,
    /// descending into every hierarchical subgraph it reaches: resolve
    /// parameters and the BRV, compute criticality levels, map every
    /// ready firing, allocate its output FIFOs, and dispatch a job to the
    /// LRT its task landed on. A non-empty parked tail after the fixed
    /// point is a dependency deadlock — logged, never returned as an
    /// `Err`, matching the original's "observed as a hang" framing.
    ///
    /// Any dynamic parameter a CONFIG actor's kernel produced while running
    /// jobs dispatched during the *previous* call is applied here, before
    /// this pass resolves the root firing — the BRV a CONFIG actor affects
    /// only changes on the iteration after the actor ran.
    pub fn iterate(&mut self) -> SpiderResult<Schedule> {
        let root_ix = self.root_handler.ok_or_else(|| SpiderError::InvalidApiUsage {
            message: "iterate() called before start()".to_owned(),
        })?;
        self.apply_pending_parameters(root_ix);

        let lrt_count = self.runners.len().max(1);
        let mut schedule = Schedule::new();
        let communicator = self.communicator.as_ref().ok_or_else(|| SpiderError::InvalidApiUsage {
            message: "iterate() called before start()".to_owned(),
        })?;

        run_firing(
            root_ix,
            0,
            &[],
            &mut self.arena,
            &mut self.platform,
            &self.bus,
            &mut self.fifo_allocator,
            communicator,
            &mut self.runners,
            &self.kernels,
            lrt_count,
            GRT_IX,
            self.verbose,
            &mut schedule,
        )?;
        Ok(schedule)
    }

    /// Drain the GRT's notification channel for `ParamAvailable` events
    /// left over from the last pass's job dispatch and fold each one into
    /// the root firing's parameter table.
    fn apply_pending_parameters(&mut self, root_ix: usize) {
        let Some(rx) = &self.grt_notif_rx else { return };
        let pending: Vec<Notification> = rx.try_iter().collect();
        if pending.is_empty() {
            return;
        }
        let graph = self.arena.get(root_ix).graph.clone();
        for notif in pending {
            if let Notification::ParamAvailable { index, .. } = notif {
                let message = self.communicator.as_ref().and_then(|c| c.take_param(index));
                if let Some(message) = message {
                    apply_parameter_message(&mut self.arena, root_ix, 0, &graph, &message);
                }
            }
        }
    }
}

/// Resolve, initialize, and schedule one firing of one graph, recursing
/// into a child `GraphFiring` for every `VertexKind::Graph` task it maps.
#[allow(clippy::too_many_arguments)]
fn run_firing(
    handler_ix: usize,
    firing_ix: usize,
    parent_params: &[Param],
    arena: &mut HandlerArena,
    platform: &mut Platform,
    bus: &MemoryBus,
    allocator: &mut FifoAllocator,
    communicator: &Communicator,
    runners: &mut [RtRunner],
    kernels: &[Kernel],
    lrt_count: usize,
    grt_ix: usize,
    verbose: bool,
    schedule: &mut Schedule,
) -> SpiderResult<()> {
    let graph = arena.get(handler_ix).graph.clone();
    {
        let firing = arena
            .get_mut(handler_ix)
            .firing_mut(firing_ix)
            .expect("firing_ix created by the caller before recursing");
        firing.resolve(&graph, parent_params)?;
        firing.initialize(&graph, handler_ix, schedule);
    }

    let (params, brv, task_ix_map) = {
        let firing = arena.get(handler_ix).firing(firing_ix).unwrap();
        (firing.params.clone(), firing.brv.clone(), firing.task_ix.clone())
    };

    let mut list_scheduler = ListScheduler::new();
    list_scheduler.recursive_add_vertices(&graph, &brv, &params);

    loop {
        let ready = list_scheduler.schedule(|vertex, firing_num| {
            compute_exec_dependencies(&graph, vertex, firing_num, &params)
                .iter()
                .all(|dep| dependency_satisfied(dep, &task_ix_map, schedule))
        });
        if ready.is_empty() {
            break;
        }
        for list_task in ready {
            let Some(task_ix) = lookup_task(&task_ix_map, list_task.vertex, list_task.firing) else {
                continue;
            };
            let deps: Vec<(DependencyInfo, Option<usize>)> =
                compute_exec_dependencies(&graph, list_task.vertex, list_task.firing, &params)
                    .into_iter()
                    .map(|dep| {
                        let producer_task = producer_task_ix(&dep, &task_ix_map);
                        (dep, producer_task)
                    })
                    .collect();
            let vertex_kind = graph.vertices[list_task.vertex].kind;

            if vertex_kind == VertexKind::Graph {
                descend_into_subgraph(
                    handler_ix,
                    firing_ix,
                    list_task.vertex,
                    list_task.firing,
                    task_ix,
                    &graph,
                    &params,
                    &deps,
                    arena,
                    platform,
                    bus,
                    allocator,
                    communicator,
                    runners,
                    kernels,
                    lrt_count,
                    grt_ix,
                    verbose,
                    schedule,
                )?;
                continue;
            }

            let cluster_ix = match sched::map_task(
                &graph,
                list_task.vertex,
                task_ix,
                &deps,
                &params,
                platform,
                bus,
                schedule,
            )? {
                Some(ix) => ix,
                None => continue,
            };

            apply_no_sync_shortcut(&graph, list_task.vertex, task_ix, &deps, allocator, arena, handler_ix, firing_ix, &params, schedule);

            {
                let memory = &platform.clusters[cluster_ix as usize].memory_interface;
                let firing = arena.get_mut(handler_ix).firing_mut(firing_ix).unwrap();
                allocate_output_fifos(&graph, list_task.vertex, firing, &params, cluster_ix, memory, allocator)?;
            }

            if matches!(schedule.task(task_ix).map(|t| t.state), Some(TaskState::Skipped)) {
                continue;
            }

            let firing = arena.get(handler_ix).firing(firing_ix).unwrap();
            dispatch_task(
                &graph,
                task_ix,
                list_task.vertex,
                &deps,
                firing,
                schedule,
                communicator,
                runners,
                kernels,
                lrt_count,
                grt_ix,
                &params,
            );
        }
    }

    if list_scheduler.count_non_schedulable() > 0 {
        warn!(
            parked = list_scheduler.count_non_schedulable(),
            graph = %graph.name,
            "firings remain unscheduled after a full pass; likely a dependency deadlock"
        );
    }
    if verbose {
        info!(graph = %graph.name, tasks = schedule.task_count(), "graph firing scheduled");
    }
    Ok(())
}

/// Create (or reuse) the child handler for a `VertexKind::Graph` task, make
/// sure it has a firing slot for this vertex's own firing number, recurse
/// into it, then mark the hierarchical task itself `Finished` — it
/// consumes no PE time of its own, its cost is entirely the child graph's.
#[allow(clippy::too_many_arguments)]
fn descend_into_subgraph(
    handler_ix: usize,
    firing_ix: usize,
    vertex: usize,
    vertex_firing: u32,
    task_ix: usize,
    graph: &Graph,
    params: &[Param],
    deps: &[(DependencyInfo, Option<usize>)],
    arena: &mut HandlerArena,
    platform: &mut Platform,
    bus: &MemoryBus,
    allocator: &mut FifoAllocator,
    communicator: &Communicator,
    runners: &mut [RtRunner],
    kernels: &[Kernel],
    lrt_count: usize,
    grt_ix: usize,
    verbose: bool,
    schedule: &mut Schedule,
) -> SpiderResult<()> {
    let subgraph_ix = graph.vertices[vertex]
        .subgraph
        .expect("VertexKind::Graph vertex without a registered subgraph");
    let child_graph = graph.subgraphs[subgraph_ix].clone();
    let child_handler_ix = arena.get_or_create_child(handler_ix, firing_ix, vertex, &child_graph);
    while arena.get(child_handler_ix).firings.len() <= vertex_firing as usize {
        arena.get_mut(child_handler_ix).add_firing();
    }

    run_firing(
        child_handler_ix,
        vertex_firing as usize,
        params,
        arena,
        platform,
        bus,
        allocator,
        communicator,
        runners,
        kernels,
        lrt_count,
        grt_ix,
        verbose,
        schedule,
    )?;

    let start = sched::compute_start_time(
        &deps.iter().map(|(_, ix)| *ix).collect::<Vec<_>>(),
        schedule,
    );
    if let Some(task) = schedule.task_mut(task_ix) {
        task.state = TaskState::Finished;
        task.start_time = start;
        task.end_time = start;
    }
    Ok(())
}

/// For a FORK/DUPLICATE task whose allocator runs in NoSync mode: if its
/// single predecessor is still `Running`, fold this task's own consumer
/// count into the predecessor's output FIFO and mark it `Skipped` so no
/// job is dispatched for it. Under the current synchronous dispatch model
/// a predecessor never reaches `Running` by the time its successor is
/// considered, so this is wired but not yet observed to trigger.
#[allow(clippy::too_many_arguments)]
fn apply_no_sync_shortcut(
    graph: &Graph,
    vertex: usize,
    task_ix: usize,
    deps: &[(DependencyInfo, Option<usize>)],
    allocator: &FifoAllocator,
    arena: &mut HandlerArena,
    handler_ix: usize,
    firing_ix: usize,
    params: &[Param],
    schedule: &mut Schedule,
) {
    if !allocator.no_sync() || !matches!(graph.vertices[vertex].kind, VertexKind::Fork | VertexKind::Duplicate) {
        return;
    }
    let Some(producer_ix) = deps.first().and_then(|(_, ix)| *ix) else { return };
    let Some(&input_edge_ix) = input_edge_ixs(graph, vertex).first() else { return };
    let consumer_rate = graph.edges[input_edge_ix].snk_rate.evaluate(params).max(0) as u32;
    let firing = arena.get_mut(handler_ix).firing_mut(firing_ix).unwrap();
    if let Some(producer_fifo) = firing.fifos.get_mut(&input_edge_ix) {
        try_no_sync_shortcut(schedule, producer_ix, task_ix, producer_fifo, consumer_rate);
    }
}

/// Allocate (once per edge, ever) the output FIFO(s) of a just-mapped task.
/// FORK/DUPLICATE never reserve fresh memory: they fragment or share their
/// single producer-allocated input buffer instead.
fn allocate_output_fifos(
    graph: &Graph,
    vertex: usize,
    firing: &mut GraphFiring,
    params: &[Param],
    cluster_ix: u32,
    memory: &MemoryInterface,
    allocator: &mut FifoAllocator,
) -> SpiderResult<()> {
    let kind = graph.vertices[vertex].kind;
    let output_edges = output_edge_ixs(graph, vertex);
    if output_edges.is_empty() {
        return Ok(());
    }

    match kind {
        VertexKind::Fork | VertexKind::Duplicate => {
            let Some(&input_edge_ix) = input_edge_ixs(graph, vertex).first() else {
                return Ok(());
            };
            let Some(input_fifo) = firing.fifos.get(&input_edge_ix).copied() else {
                return Ok(());
            };
            let mut sizes = Vec::with_capacity(output_edges.len());
            let mut counts = Vec::with_capacity(output_edges.len());
            let mut pending_edges = Vec::with_capacity(output_edges.len());
            for edge_ix in output_edges {
                if firing.fifos.contains_key(&edge_ix) {
                    continue;
                }
                let edge = &graph.edges[edge_ix];
                sizes.push(edge.src_rate.evaluate(params).max(0) as u32);
                counts.push(total_consumer_firings(edge, 1, params));
                pending_edges.push(edge_ix);
            }
            if pending_edges.is_empty() {
                return Ok(());
            }
            let fifos = if kind == VertexKind::Fork {
                allocate_fork_outputs(&input_fifo, &sizes, &counts)
            } else {
                allocate_duplicate_outputs(&input_fifo, &counts)
            };
            for (edge_ix, fifo) in pending_edges.into_iter().zip(fifos) {
                firing.fifos.insert(edge_ix, fifo);
            }
        }
        _ => {
            let producer_firing_count = firing.brv[vertex];
            for edge_ix in output_edges {
                if firing.fifos.contains_key(&edge_ix) {
                    continue;
                }
                let edge = &graph.edges[edge_ix];
                let rate = edge.src_rate.evaluate(params).max(0) as u32;
                let consumer_count = total_consumer_firings(edge, producer_firing_count, params);
                let fifo = allocator.allocate_normal_output(
                    cluster_ix,
                    rate,
                    producer_firing_count,
                    consumer_count,
                    memory,
                )?;
                firing.fifos.insert(edge_ix, fifo);
            }
        }
    }
    Ok(())
}

/// Build and dispatch the job for a mapped, non-hierarchical task: wires
/// its resolved input/output FIFOs, pushes the `JobMessage` onto its
/// mapped-PE's LRT via the `Communicator`, drains that LRT's channel, and
/// runs whatever is now ready.
#[allow(clippy::too_many_arguments)]
fn dispatch_task(
    graph: &Graph,
    task_ix: usize,
    vertex: usize,
    deps: &[(DependencyInfo, Option<usize>)],
    firing: &GraphFiring,
    schedule: &Schedule,
    communicator: &Communicator,
    runners: &mut [RtRunner],
    kernels: &[Kernel],
    lrt_count: usize,
    grt_ix: usize,
    params: &[Param],
) {
    let Some(task) = schedule.task(task_ix) else { return };
    let Some(mapped_pe) = task.mapped_pe else { return };
    let lrt_ix = (mapped_pe as usize) % lrt_count;

    let input_fifos: Vec<Fifo> = input_edge_ixs(graph, vertex)
        .iter()
        .filter_map(|ix| firing.fifos.get(ix).copied())
        .collect();
    let output_fifos: Vec<Fifo> = output_edge_ixs(graph, vertex)
        .iter()
        .filter_map(|ix| firing.fifos.get(ix).copied())
        .collect();
    let notify_lrts: Vec<usize> = (0..lrt_count).collect();

    let job = build_job_message(
        graph,
        task,
        task_ix,
        deps,
        schedule,
        &input_fifos,
        &output_fifos,
        params,
        graph.vertices[vertex].kernel_ix,
        |producer_ix| {
            schedule
                .task(producer_ix)
                .and_then(|t| t.mapped_pe)
                .map(|pe| (pe as usize) % lrt_count)
        },
        &notify_lrts,
        lrt_count,
    );

    communicator.push_job(job, lrt_ix);
    runners[lrt_ix].drain_channel();
    runners[lrt_ix].run_ready_jobs(kernels, communicator, grt_ix);
}

/// Apply a CONFIG actor's kernel output to the firing that owns it: each
/// output value, in port order, overwrites the `Dynamic` parameter bound
/// to that port by `Graph::set_vertex_output_params`. Only ever targets
/// the handler/firing this function is called with — CONFIG actors nested
/// several subgraphs deep would need a fuller address than
/// `ParameterMessage::vertex_ix` alone carries, and none of the shipped
/// scenarios nest them, so this stays root-only.
fn apply_parameter_message(
    arena: &mut HandlerArena,
    handler_ix: usize,
    firing_ix: usize,
    graph: &Graph,
    message: &ParameterMessage,
) {
    let Some(vertex) = graph.vertices.get(message.vertex_ix) else { return };
    let output_params = vertex.output_params.clone();
    let Some(firing) = arena.get_mut(handler_ix).firing_mut(firing_ix) else { return };
    for (port_ix, &param_ix) in output_params.iter().enumerate() {
        if let Some(&value) = message.params.get(port_ix) {
            firing.set_param_value(param_ix, value);
        }
    }
}

/// Sum, over every producer firing `0..producer_brv`, the number of
/// consumer firings that read from it — the true reader count an output
/// FIFO must be allocated with, rather than a hand-supplied constant.
fn total_consumer_firings(edge: &Edge, producer_brv: u32, params: &[Param]) -> u32 {
    let mut total = 0u32;
    for firing in 0..producer_brv {
        let dep = compute_cons_dependency(edge, firing, params);
        if dep.firing_lower < 0 && dep.firing_upper < 0 {
            continue;
        }
        total += (dep.firing_upper - dep.firing_lower + 1).max(0) as u32;
    }
    total
}

fn input_edge_ixs(graph: &Graph, vertex: usize) -> Vec<usize> {
    graph
        .edges
        .iter()
        .enumerate()
        .filter(|(_, e)| e.snk_vertex == vertex)
        .map(|(ix, _)| ix)
        .collect()
}

fn output_edge_ixs(graph: &Graph, vertex: usize) -> Vec<usize> {
    graph
        .edges
        .iter()
        .enumerate()
        .filter(|(_, e)| e.src_vertex == vertex)
        .map(|(ix, _)| ix)
        .collect()
}

fn lookup_task(task_ix_map: &[Vec<Option<usize>>], vertex: usize, firing: u32) -> Option<usize> {
    task_ix_map
        .get(vertex)
        .and_then(|firings| firings.get(firing as usize))
        .copied()
        .flatten()
}

fn producer_task_ix(dep: &DependencyInfo, task_ix_map: &[Vec<Option<usize>>]) -> Option<usize> {
    if dep.firing_lower < 0 && dep.firing_upper < 0 {
        return None;
    }
    let producer_firing = dep.firing_upper.max(0) as u32;
    lookup_task(task_ix_map, dep.counterpart_vertex, producer_firing)
}

fn dependency_satisfied(dep: &DependencyInfo, task_ix_map: &[Vec<Option<usize>>], schedule: &Schedule) -> bool {
    if dep.firing_lower < 0 && dep.firing_upper < 0 {
        return true;
    }
    match producer_task_ix(dep, task_ix_map) {
        Some(ix) => schedule
            .task(ix)
            .map(|t| t.state != TaskState::Pending)
            .unwrap_or(false),
        None => false,
    }
}
