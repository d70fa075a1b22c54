//! Thread-slot scheduler (spec §4.1, `enqueueTaskInThreadQueue`).

use std::collections::BTreeMap;

use noc_core::{AppIdx, CoreId, EdgeId, InMemoryUpdate, Inbox, TaskGraph, TaskId, ThreadPool};

/// Static per-core/per-application task membership, built once from a
/// `TaskGraph` and reused every cycle so the scheduler never re-derives
/// it (the original loads this layout once from the architecture file).
#[derive(Debug, Clone, Default)]
pub struct CoreIndex {
    cores: BTreeMap<CoreId, BTreeMap<AppIdx, Vec<TaskId>>>,
}

impl CoreIndex {
    pub fn build(graph: &TaskGraph) -> Self {
        let mut cores: BTreeMap<CoreId, BTreeMap<AppIdx, Vec<TaskId>>> = BTreeMap::new();
        for task in graph.tasks() {
            cores
                .entry(task.core_id)
                .or_default()
                .entry(task.app_idx)
                .or_default()
                .push(task.id);
        }
        for apps in cores.values_mut() {
            for tasks in apps.values_mut() {
                tasks.sort();
            }
        }
        Self { cores }
    }

    pub fn cores(&self) -> impl Iterator<Item = CoreId> + '_ {
        self.cores.keys().copied()
    }
}

/// The two round-robin cursors of spec §4.1: `app_exec_rr` per core, and
/// `task_to_exec_round_robin` per (core, application).
#[derive(Debug, Clone, Default)]
pub struct SchedulerRr {
    app_rr: BTreeMap<CoreId, u32>,
    task_rr: BTreeMap<(CoreId, AppIdx), u32>,
}

impl SchedulerRr {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A task that began a new iteration this cycle, with everything the
/// generator step (§4.3) needs to fragment its outgoing productions.
#[derive(Debug, Clone)]
pub struct StartedTask {
    pub core_id: CoreId,
    pub app_idx: AppIdx,
    pub task_id: TaskId,
    pub iteration: u64,
    pub exec_time: u64,
    pub start_cycle: u64,
    /// Outgoing edges that reserved an out-memory slot this entry, i.e.
    /// ones the generator must fragment into packets.
    pub out_edges: Vec<EdgeId>,
    /// `entry_cycle - all_tokens_received_time` (spec §6's
    /// `task_waiting_time_info` stream), via `GraphTask::waiting_time`.
    pub waiting_time: u64,
}

/// Runs one cycle of the scheduler across every core named in `index`.
///
/// Per core, every application on the core is walked this cycle (the
/// original's `for (kk=0; kk<m_num_apps; kk++)` loop), starting from the
/// application `app_exec_rr` currently points at so no application is
/// favored cycle over cycle; the loop only stops early once the core's
/// thread pool is genuinely out of free slots. `app_exec_rr` advances by
/// one after the whole walk, once per cycle, purely to rotate which
/// application goes first next time.
pub fn enqueue_new_tasks(
    graph: &mut TaskGraph,
    index: &CoreIndex,
    thread_pools: &mut BTreeMap<CoreId, ThreadPool>,
    rr: &mut SchedulerRr,
    inboxes: &mut BTreeMap<CoreId, Inbox>,
    cycle: u64,
) -> Vec<StartedTask> {
    let mut started = Vec::new();

    for (&core_id, apps) in &index.cores {
        let app_ids: Vec<AppIdx> = apps.keys().copied().collect();
        if app_ids.is_empty() {
            continue;
        }
        let app_count = app_ids.len() as u32;
        let app_cursor = *rr.app_rr.get(&core_id).unwrap_or(&0) % app_count;

        let Some(pool) = thread_pools.get_mut(&core_id) else {
            continue;
        };

        for kk in 0..app_count {
            if !pool.has_free_slot() {
                break;
            }
            let app_idx = app_ids[((app_cursor + kk) % app_count) as usize];

            let tasks = &apps[&app_idx];
            if tasks.is_empty() {
                continue;
            }
            let task_count = tasks.len() as u32;
            let task_key = (core_id, app_idx);
            let task_cursor = *rr.task_rr.get(&task_key).unwrap_or(&0) % task_count;

            let mut advanced_by = 0;
            for attempt in 0..task_count {
                if !pool.has_free_slot() {
                    break;
                }
                let task_id = tasks[((task_cursor + attempt) % task_count) as usize];
                advanced_by = attempt + 1;
                let Ok(task) = graph.task(task_id) else {
                    continue;
                };
                if task.is_head() {
                    // Head tasks are scheduled exclusively through the
                    // entrance injector (spec §4.6).
                    continue;
                }
                if !task.can_enter_again() {
                    continue;
                }
                if !task.is_eligible(graph.edges()) {
                    continue;
                }

                let in_edges = task.in_edges.clone();
                let out_edges = task.out_edges.clone();
                let mut latest_receive = cycle;
                for &edge_id in &in_edges {
                    let edge = graph.edge_mut(edge_id).expect("eligibility checked edge exists");
                    edge.consume_in_token();
                    latest_receive = latest_receive.max(edge.last_token_received_cycle);
                    let producer_core = edge.src_core;
                    inboxes.entry(producer_core).or_default().post(InMemoryUpdate {
                        core_id: producer_core,
                        app_idx,
                        src_task_id: edge.src_task,
                        edge_id,
                    });
                }
                if in_edges.is_empty() {
                    latest_receive = cycle;
                }

                let task = graph.task_mut(task_id).expect("checked above");
                let exec_time = task.enter_iteration(latest_receive);
                let iteration = task.c_e_times;
                let waiting_time = task.waiting_time(cycle);

                for &edge_id in &out_edges {
                    let edge = graph.edge_mut(edge_id).expect("task's own out edge must exist");
                    edge.reserve_out_slot();
                }

                let idx = pool.free_slot_index().expect("checked has_free_slot above");
                pool.occupy(
                    idx,
                    noc_core::SlotOccupant {
                        task_id,
                        app_idx,
                        remaining_cycles: exec_time,
                        iteration,
                        start_cycle: cycle,
                    },
                );

                started.push(StartedTask {
                    core_id,
                    app_idx,
                    task_id,
                    iteration,
                    exec_time,
                    start_cycle: cycle,
                    out_edges,
                    waiting_time,
                });
            }

            if advanced_by > 0 {
                rr.task_rr.insert(task_key, (task_cursor + advanced_by) % task_count);
            }
        }

        rr.app_rr.insert(core_id, (app_cursor + 1) % app_count);
    }

    started
}

#[cfg(test)]
mod tests {
    use super::*;
    use noc_core::{CoreId, Distribution, GraphEdge, GraphTask};

    fn build_pipeline() -> TaskGraph {
        let mut g = TaskGraph::new();
        g.add_task(GraphTask::new(
            TaskId::new(0),
            CoreId::new(0),
            AppIdx::new(0),
            10,
            Distribution::Constant(3),
            1,
        ))
        .unwrap();
        g.add_task(GraphTask::new(
            TaskId::new(1),
            CoreId::new(1),
            AppIdx::new(0),
            10,
            Distribution::Constant(5),
            2,
        ))
        .unwrap();
        g.add_edge(
            GraphEdge::new(
                EdgeId::new(0),
                TaskId::new(0),
                TaskId::new(1),
                CoreId::new(0),
                CoreId::new(1),
                AppIdx::new(0),
                0,
                4,
                4,
                Distribution::Constant(2),
                Distribution::Constant(1),
                3,
            )
            .unwrap(),
        )
        .unwrap();
        g
    }

    #[test]
    fn head_task_is_never_started_by_scheduler() {
        let mut g = build_pipeline();
        let index = CoreIndex::build(&g);
        let mut pools = BTreeMap::new();
        pools.insert(CoreId::new(0), ThreadPool::new(4));
        pools.insert(CoreId::new(1), ThreadPool::new(4));
        let mut rr = SchedulerRr::new();
        let mut inboxes = BTreeMap::new();
        let started = enqueue_new_tasks(&mut g, &index, &mut pools, &mut rr, &mut inboxes, 0);
        assert!(started.is_empty());
    }

    #[test]
    fn downstream_task_starts_once_token_available() {
        let mut g = build_pipeline();
        g.edge_mut(EdgeId::new(0)).unwrap().in_tokens = 1;
        let index = CoreIndex::build(&g);
        let mut pools = BTreeMap::new();
        pools.insert(CoreId::new(0), ThreadPool::new(4));
        pools.insert(CoreId::new(1), ThreadPool::new(4));
        let mut rr = SchedulerRr::new();
        let mut inboxes = BTreeMap::new();
        let started = enqueue_new_tasks(&mut g, &index, &mut pools, &mut rr, &mut inboxes, 0);
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].task_id, TaskId::new(1));
        assert_eq!(g.edge(EdgeId::new(0)).unwrap().in_tokens, 0);
        assert_eq!(inboxes[&CoreId::new(0)].len(), 1);
    }
}
