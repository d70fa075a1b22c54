//! Entrance injector and ratio tokens (spec §4.6).
//!
//! The entrance NI holds a separate pool of `num_initial_thread` "initial"
//! slots for entering the head task (id 0) of every application. Each
//! application carries an integer ratio-token quota that paces how often
//! its head task is allowed to enter relative to the other applications
//! sharing the entrance NI.

use std::collections::BTreeMap;

use noc_core::{AppIdx, CoreId, NetworkConfig, TaskGraph, TaskId, ThreadPool};

use crate::scheduler::StartedTask;

/// Maps each application to its head task's id at the entrance core,
/// built once from the graph (a shared arena gives every application's
/// head task a distinct global id even though they all play the same
/// structural role, spec §4.6).
#[derive(Debug, Clone, Default)]
pub struct EntranceIndex {
    heads: BTreeMap<AppIdx, TaskId>,
}

impl EntranceIndex {
    pub fn build(graph: &TaskGraph, entrance_core: CoreId) -> Self {
        let mut heads = BTreeMap::new();
        for task in graph.tasks() {
            if task.core_id == entrance_core && task.is_head() {
                heads.insert(task.app_idx, task.id);
            }
        }
        Self { heads }
    }

    pub fn applications(&self) -> impl Iterator<Item = AppIdx> + '_ {
        self.heads.keys().copied()
    }

    pub fn head_of(&self, app_idx: AppIdx) -> Option<TaskId> {
        self.heads.get(&app_idx).copied()
    }
}

/// Per-application ratio-token quota state, reset from `ratios` whenever
/// every application's token count has dropped to zero.
#[derive(Debug, Clone)]
pub struct RatioTokens {
    ratios: Vec<(AppIdx, u32)>,
    tokens: BTreeMap<AppIdx, u32>,
    rr_cursor: usize,
}

impl RatioTokens {
    pub fn new(ratios: Vec<(AppIdx, u32)>) -> Self {
        let tokens = ratios.iter().copied().collect();
        Self {
            ratios,
            tokens,
            rr_cursor: 0,
        }
    }

    fn reset_if_exhausted(&mut self) {
        if self.tokens.values().all(|&t| t == 0) {
            for &(app, ratio) in &self.ratios {
                self.tokens.insert(app, ratio);
            }
        }
    }
}

/// Whether the caller's global back-pressure gate currently allows
/// injecting a new head-task iteration (spec §6's back-pressure signal).
pub trait BackPressure {
    fn allows_injection(&self) -> bool;
}

/// Always allows injection; used only where a caller genuinely has no
/// downstream graph to consult (e.g. exercising `inject` in isolation).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBackPressure;
impl BackPressure for NoBackPressure {
    fn allows_injection(&self) -> bool {
        true
    }
}

/// The real back-pressure gate (spec §6's `back_pressure(node_id)`):
/// true when any edge on the entrance applications' downstream critical
/// path currently has its destination in-memory full. Computed once per
/// cycle from the graph and reused for every application's injection
/// attempt that cycle, since the signal is global rather than
/// per-application.
#[derive(Debug, Clone, Copy)]
pub struct GraphBackPressure(bool);

impl GraphBackPressure {
    pub fn compute(graph: &TaskGraph, index: &EntranceIndex) -> Self {
        Self(downstream_in_memory_full(graph, index))
    }
}

impl BackPressure for GraphBackPressure {
    fn allows_injection(&self) -> bool {
        !self.0
    }
}

/// Walks forward from every application's head task along `out_edges`
/// and reports whether any reachable edge's destination in-memory is
/// currently full.
fn downstream_in_memory_full(graph: &TaskGraph, index: &EntranceIndex) -> bool {
    let mut visited = std::collections::BTreeSet::new();
    let mut stack: Vec<TaskId> = index.heads.values().copied().collect();
    while let Some(task_id) = stack.pop() {
        if !visited.insert(task_id) {
            continue;
        }
        let Ok(task) = graph.task(task_id) else {
            continue;
        };
        for &edge_id in &task.out_edges {
            let Ok(edge) = graph.edge(edge_id) else {
                continue;
            };
            if edge.in_tokens >= edge.in_capacity {
                return true;
            }
            stack.push(edge.dest_task);
        }
    }
    false
}

/// Runs one cycle of the entrance injector. Returns the head-task
/// `StartedTask`s entered this cycle, one per application serviced, in
/// round-robin order, stopping on the first application blocked by
/// global back-pressure — an Open Question resolved this way per
/// SPEC_FULL.md: back-pressure is a global gate, so once it denies one
/// application there is no reason to believe the next would fare
/// differently this cycle.
pub fn inject(
    graph: &mut TaskGraph,
    entrance_core: CoreId,
    index: &EntranceIndex,
    initial_pool: &mut ThreadPool,
    tokens: &mut RatioTokens,
    back_pressure: &dyn BackPressure,
    _cfg: &NetworkConfig,
    cycle: u64,
) -> Vec<StartedTask> {
    let mut started = Vec::new();
    tokens.reset_if_exhausted();

    let app_count = tokens.ratios.len();
    if app_count == 0 {
        return started;
    }

    for offset in 0..app_count {
        let idx = (tokens.rr_cursor + offset) % app_count;
        let app_idx = tokens.ratios[idx].0;

        let remaining = tokens.tokens.get(&app_idx).copied().unwrap_or(0);
        if remaining == 0 {
            continue;
        }
        if !initial_pool.has_free_slot() {
            continue;
        }
        let Some(head_id) = index.head_of(app_idx) else {
            continue;
        };
        let Ok(head) = graph.task(head_id) else {
            continue;
        };
        if !head.can_enter_again() {
            continue;
        }
        if !head.is_eligible(graph.edges()) {
            continue;
        }
        if !back_pressure.allows_injection() {
            break;
        }

        tokens.tokens.insert(app_idx, remaining - 1);

        let out_edges = head.out_edges.clone();
        for &edge_id in &out_edges {
            let edge = graph.edge_mut(edge_id).expect("head task's own out edge must exist");
            edge.reserve_out_slot();
        }

        let head = graph.task_mut(head_id).expect("checked above");
        let exec_time = head.enter_iteration(cycle);
        let iteration = head.c_e_times;
        let waiting_time = head.waiting_time(cycle);

        let slot_idx = initial_pool.free_slot_index().expect("checked has_free_slot above");
        initial_pool.occupy(
            slot_idx,
            noc_core::SlotOccupant {
                task_id: head_id,
                app_idx,
                remaining_cycles: exec_time,
                iteration,
                start_cycle: cycle,
            },
        );

        started.push(StartedTask {
            core_id: entrance_core,
            app_idx,
            task_id: head_id,
            iteration,
            exec_time,
            start_cycle: cycle,
            out_edges,
            waiting_time,
        });
    }

    tokens.rr_cursor = (tokens.rr_cursor + 1) % app_count;
    started
}
