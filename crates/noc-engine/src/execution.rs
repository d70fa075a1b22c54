//! Execution advance (spec §4.2, `task_execution`).

use std::collections::BTreeMap;

use noc_core::{AppIdx, CoreId, TaskGraph, TaskId, ThreadPool};

/// A task that finished its execution window this cycle.
#[derive(Debug, Clone, Copy)]
pub struct CompletedTask {
    pub core_id: CoreId,
    pub app_idx: AppIdx,
    pub task_id: TaskId,
    pub iteration: u64,
    pub start_cycle: u64,
    pub end_cycle: u64,
}

/// Decrements every busy slot's remaining cycles by one and releases
/// slots that reach zero. Must run after [`crate::scheduler::enqueue_new_tasks`]
/// within the same cycle so a slot that frees up this cycle cannot be
/// immediately reused until the NI's next `wakeup` (spec's one-cycle slot
/// reacquisition delay).
pub fn advance(
    thread_pools: &mut BTreeMap<CoreId, ThreadPool>,
    graph: &mut TaskGraph,
    cycle: u64,
) -> Vec<CompletedTask> {
    let mut completed = Vec::new();

    for (&core_id, pool) in thread_pools.iter_mut() {
        for slot in pool.slots_mut() {
            let Some(occupant) = slot.occupant.as_mut() else {
                continue;
            };
            occupant.remaining_cycles = occupant.remaining_cycles.saturating_sub(1);
            if occupant.remaining_cycles == 0 {
                let task_id = occupant.task_id;
                let app_idx = occupant.app_idx;
                let iteration = occupant.iteration;
                let start_cycle = occupant.start_cycle;
                if let Ok(task) = graph.task_mut(task_id) {
                    task.complete_iteration();
                }
                completed.push(CompletedTask {
                    core_id,
                    app_idx,
                    task_id,
                    iteration,
                    start_cycle,
                    end_cycle: cycle,
                });
                slot.occupant = None;
            }
        }
    }

    completed
}
