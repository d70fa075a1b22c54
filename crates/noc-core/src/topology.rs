//! The task graph, thread-slot pools, and edge memories (spec §3, §9).
//!
//! A `TaskGraph` is two flat arenas rather than an adjacency structure
//! built out of pointers: tasks and edges are each a `Vec` keyed by the
//! raw value of their id, and a task only stores the `EdgeId`s of edges
//! leaving or entering it. This mirrors the original's static arrays of
//! tasks/edges loaded once from the task-graph file and never resized
//! during a run (spec §9's "two flat arenas" design note).

use crate::error::{NocError, NocResult};
use crate::ids::{AppIdx, CoreId, EdgeId, TaskId};
use crate::prng::{Distribution, TaskRng};

/// A node in the task graph: a unit of work pinned to one core.
#[derive(Debug, Clone)]
pub struct GraphTask {
    pub id: TaskId,
    pub core_id: CoreId,
    pub app_idx: AppIdx,
    pub in_edges: Vec<EdgeId>,
    pub out_edges: Vec<EdgeId>,
    pub required: u64,
    pub completed: u64,
    /// Number of iterations entered so far; invariant `completed <=
    /// c_e_times <= required`.
    pub c_e_times: u64,
    /// Cycle at which every incoming edge most recently had a token
    /// available, i.e. the last time this task became eligible.
    pub all_tokens_received_time: u64,
    exec_time: Distribution,
    rng: TaskRng,
}

impl GraphTask {
    pub fn new(
        id: TaskId,
        core_id: CoreId,
        app_idx: AppIdx,
        required: u64,
        exec_time: Distribution,
        base_seed: u64,
    ) -> Self {
        Self {
            id,
            core_id,
            app_idx,
            in_edges: Vec::new(),
            out_edges: Vec::new(),
            required,
            completed: 0,
            c_e_times: 0,
            all_tokens_received_time: 0,
            exec_time,
            rng: TaskRng::from_seed(base_seed, id.raw()),
        }
    }

    /// A head/entrance task is one with no incoming edges: every
    /// application has exactly one, and it is scheduled exclusively
    /// through the entrance injector rather than the per-core scheduler
    /// (spec §4.6). Head-ness is structural, not a reserved global id,
    /// since each application contributes its own head task to the
    /// shared arena.
    pub fn is_head(&self) -> bool {
        self.in_edges.is_empty()
    }

    /// Eligibility rules 1-2 of spec §4.1 (rules 3-4, the free-slot check
    /// and the head-task exclusion, are the scheduler's job since they
    /// need the thread pool and the caller's own identity).
    pub fn is_eligible(&self, edges: &[GraphEdge]) -> bool {
        for &out_id in &self.out_edges {
            if edges[out_id.raw() as usize].is_out_full() {
                return false;
            }
        }
        if self.in_edges.is_empty() {
            return true;
        }
        self.in_edges
            .iter()
            .all(|&id| edges[id.raw() as usize].in_tokens > 0)
    }

    pub fn can_enter_again(&self) -> bool {
        self.c_e_times < self.required
    }

    /// Marks entry into a new iteration: bumps `c_e_times`, samples a
    /// fresh execution time, and records `all_tokens_received_time`.
    pub fn enter_iteration(&mut self, all_tokens_received_time: u64) -> u64 {
        self.c_e_times += 1;
        self.all_tokens_received_time = all_tokens_received_time;
        self.exec_time.sample(&mut self.rng)
    }

    pub fn complete_iteration(&mut self) {
        self.completed += 1;
    }

    /// `entry_cycle - all_tokens_received_time`, the waiting-time
    /// accounting supplemented from the original (SPEC_FULL.md §2.5).
    pub fn waiting_time(&self, entry_cycle: u64) -> u64 {
        entry_cycle.saturating_sub(self.all_tokens_received_time)
    }
}

/// A directed dependency between two tasks, carrying token traffic.
///
/// `in_tokens`/`in_capacity` model the consumer-side buffer (tokens
/// committed by an arrived TAIL/HEAD_TAIL, waiting for the destination
/// task to consume them); `out_tokens`/`out_capacity` model the
/// producer-side buffer (tokens produced but not yet drained by the
/// destination task). A slot reserved by `reserve_out_slot` is only
/// freed by `release_out_slot` once the consumer actually dequeues —
/// handing the packet to the network does not free it — so a slow
/// consumer stalls the producer exactly per spec §9's back-pressure
/// scenario. The two ends share one edge because the original's
/// `GraphEdge` tracks both pointer pairs on a single object (spec §3).
#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub src_task: TaskId,
    pub dest_task: TaskId,
    pub src_core: CoreId,
    pub dest_core: CoreId,
    pub app_idx: AppIdx,
    pub vc_choice: u8,
    pub in_capacity: u32,
    pub out_capacity: u32,
    pub in_tokens: u32,
    pub out_tokens: u32,
    pub last_token_received_cycle: u64,
    total_produced: u64,
    total_sent: u64,
    total_committed: u64,
    total_consumed: u64,
    next_token_id: u64,
    token_size: Distribution,
    packet_interval: Distribution,
    size_rng: TaskRng,
    interval_rng: TaskRng,
}

impl GraphEdge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: EdgeId,
        src_task: TaskId,
        dest_task: TaskId,
        src_core: CoreId,
        dest_core: CoreId,
        app_idx: AppIdx,
        vc_choice: u8,
        in_capacity: u32,
        out_capacity: u32,
        token_size: Distribution,
        packet_interval: Distribution,
        base_seed: u64,
    ) -> NocResult<Self> {
        if vc_choice > crate::vc_policy::MAX_VC_CHOICE {
            return Err(NocError::InvalidVcChoice {
                edge_id: id,
                value: vc_choice,
            });
        }
        Ok(Self {
            id,
            src_task,
            dest_task,
            src_core,
            dest_core,
            app_idx,
            vc_choice,
            in_capacity,
            out_capacity,
            in_tokens: 0,
            out_tokens: 0,
            last_token_received_cycle: 0,
            total_produced: 0,
            total_sent: 0,
            total_committed: 0,
            total_consumed: 0,
            next_token_id: 0,
            token_size,
            packet_interval,
            size_rng: TaskRng::from_seed(base_seed, id.raw() | 0x8000_0000),
            interval_rng: TaskRng::from_seed(base_seed, id.raw() | 0x4000_0000),
        })
    }

    pub fn is_out_full(&self) -> bool {
        self.out_tokens >= self.out_capacity
    }

    pub fn out_remaining(&self) -> u32 {
        self.out_capacity - self.out_tokens
    }

    /// Reserves an out-memory slot at task-entry time (spec §4.1 "advance
    /// out-memory write pointer").
    pub fn reserve_out_slot(&mut self) -> bool {
        if self.is_out_full() {
            false
        } else {
            self.out_tokens += 1;
            self.total_produced += 1;
            true
        }
    }

    /// Consumes one pending in-memory token at task-entry time (spec
    /// §4.1 "consume one token").
    pub fn consume_in_token(&mut self) -> bool {
        if self.in_tokens == 0 {
            false
        } else {
            self.in_tokens -= 1;
            self.total_consumed += 1;
            true
        }
    }

    /// Attempts to hand one packet of a produced token to the network.
    /// Fails (and must be retried next cycle) when the destination's
    /// in-memory is currently full — spec §4.8's natural back-pressure.
    pub fn record_sent_pkt(&mut self) -> bool {
        if self.in_tokens >= self.in_capacity {
            return false;
        }
        self.total_sent += 1;
        true
    }

    /// Frees the out-memory slot reserved at production time, once every
    /// packet of that token has been handed to the network.
    pub fn release_out_slot(&mut self) {
        self.out_tokens = self.out_tokens.saturating_sub(1);
    }

    /// Allocates a fresh token id for a new edge production (spec §4.1
    /// "record a new token id on the edge").
    pub fn new_token_id(&mut self) -> u64 {
        let id = self.next_token_id;
        self.next_token_id += 1;
        id
    }

    /// Commits an arrived TAIL/HEAD_TAIL into in-memory (spec §4.7
    /// `record_pkt`).
    pub fn record_pkt(&mut self, cycle: u64) {
        self.in_tokens += 1;
        self.total_committed += 1;
        self.last_token_received_cycle = cycle;
    }

    pub fn sample_token_size(&mut self) -> u64 {
        self.token_size.sample(&mut self.size_rng)
    }

    pub fn sample_packet_interval(&mut self) -> u64 {
        self.packet_interval.sample(&mut self.interval_rng)
    }

    /// Tokens produced but not yet committed at the destination: the
    /// pipeline-conservation quantity spec §8 calls `in_flight`.
    pub fn in_flight(&self) -> u64 {
        self.total_produced - self.total_committed
    }

    pub fn total_produced(&self) -> u64 {
        self.total_produced
    }

    pub fn total_consumed(&self) -> u64 {
        self.total_consumed
    }

    /// Checks spec §8's pipeline conservation law:
    /// `total_produced - total_consumed == in_flight + in_tokens`.
    pub fn invariant_holds(&self) -> bool {
        self.total_produced - self.total_consumed == self.in_flight() + self.in_tokens as u64
    }
}

/// The flat-arena task graph for one application (or, at a multi-app NI,
/// the union of all applications it hosts — app identity lives on each
/// task/edge, not on the graph).
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: Vec<GraphTask>,
    edges: Vec<GraphEdge>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, task: GraphTask) -> NocResult<()> {
        let idx = task.id.raw() as usize;
        if idx < self.tasks.len() {
            return Err(NocError::DuplicateTaskId { task_id: task.id });
        }
        if idx > self.tasks.len() {
            return Err(NocError::InvariantViolated(
                "tasks must be added in ascending TaskId order",
            ));
        }
        self.tasks.push(task);
        Ok(())
    }

    pub fn add_edge(&mut self, edge: GraphEdge) -> NocResult<()> {
        let src = edge.src_task;
        let dest = edge.dest_task;
        let edge_id = edge.id;
        let idx = edge_id.raw() as usize;
        if idx > self.edges.len() {
            return Err(NocError::InvariantViolated(
                "edges must be added in ascending EdgeId order",
            ));
        }
        if idx == self.edges.len() {
            self.edges.push(edge);
        } else {
            self.edges[idx] = edge;
        }
        self.task_mut(src)?.out_edges.push(edge_id);
        self.task_mut(dest)?.in_edges.push(edge_id);
        Ok(())
    }

    pub fn task(&self, id: TaskId) -> NocResult<&GraphTask> {
        self.tasks.get(id.raw() as usize).ok_or(NocError::TaskNotFound {
            core_id: CoreId::new(0),
            app_idx: AppIdx::new(0),
            task_id: id,
        })
    }

    pub fn task_mut(&mut self, id: TaskId) -> NocResult<&mut GraphTask> {
        self.tasks
            .get_mut(id.raw() as usize)
            .ok_or(NocError::TaskNotFound {
                core_id: CoreId::new(0),
                app_idx: AppIdx::new(0),
                task_id: id,
            })
    }

    pub fn edge(&self, id: EdgeId) -> NocResult<&GraphEdge> {
        self.edges.get(id.raw() as usize).ok_or(NocError::EdgeNotFound {
            task_id: TaskId::new(0),
            edge_id: id,
        })
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> NocResult<&mut GraphEdge> {
        self.edges
            .get_mut(id.raw() as usize)
            .ok_or(NocError::EdgeNotFound {
                task_id: TaskId::new(0),
                edge_id: id,
            })
    }

    pub fn tasks(&self) -> &[GraphTask] {
        &self.tasks
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn tasks_mut(&mut self) -> &mut [GraphTask] {
        &mut self.tasks
    }

    pub fn edges_mut(&mut self) -> &mut [GraphEdge] {
        &mut self.edges
    }
}

/// A single execution lane on a core. Lifecycle: idle -> busy at entry ->
/// idle at completion (spec §3's "Thread slot").
#[derive(Debug, Clone, Copy)]
pub struct SlotOccupant {
    pub task_id: TaskId,
    pub app_idx: AppIdx,
    pub remaining_cycles: u64,
    pub iteration: u64,
    pub start_cycle: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ThreadSlot {
    pub occupant: Option<SlotOccupant>,
}

impl ThreadSlot {
    pub fn is_busy(&self) -> bool {
        self.occupant.is_some()
    }
}

/// Per-core pool of thread slots (spec §4.1/§4.2).
#[derive(Debug, Clone)]
pub struct ThreadPool {
    slots: Vec<ThreadSlot>,
}

impl ThreadPool {
    pub fn new(capacity: u32) -> Self {
        Self {
            slots: vec![ThreadSlot::default(); capacity as usize],
        }
    }

    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(|s| !s.is_busy())
    }

    pub fn free_slot_index(&self) -> Option<usize> {
        self.slots.iter().position(|s| !s.is_busy())
    }

    pub fn occupy(&mut self, idx: usize, occupant: SlotOccupant) {
        self.slots[idx].occupant = Some(occupant);
    }

    pub fn slots(&self) -> &[ThreadSlot] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [ThreadSlot] {
        &mut self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: u32, core: u32, required: u64) -> GraphTask {
        GraphTask::new(
            TaskId::new(id),
            CoreId::new(core),
            AppIdx::new(0),
            required,
            Distribution::Constant(5),
            1,
        )
    }

    fn edge(id: u32, src: u32, dest: u32, vc_choice: u8) -> GraphEdge {
        GraphEdge::new(
            EdgeId::new(id),
            TaskId::new(src),
            TaskId::new(dest),
            CoreId::new(0),
            CoreId::new(1),
            AppIdx::new(0),
            vc_choice,
            4,
            4,
            Distribution::Constant(8),
            Distribution::Constant(2),
            1,
        )
        .unwrap()
    }

    #[test]
    fn add_task_requires_ascending_ids() {
        let mut g = TaskGraph::new();
        g.add_task(task(0, 0, 10)).unwrap();
        assert!(g.add_task(task(2, 0, 10)).is_err());
    }

    #[test]
    fn add_edge_links_both_endpoints() {
        let mut g = TaskGraph::new();
        g.add_task(task(0, 0, 10)).unwrap();
        g.add_task(task(1, 1, 10)).unwrap();
        g.add_edge(edge(0, 0, 1, 0)).unwrap();
        assert_eq!(g.task(TaskId::new(0)).unwrap().out_edges, vec![EdgeId::new(0)]);
        assert_eq!(g.task(TaskId::new(1)).unwrap().in_edges, vec![EdgeId::new(0)]);
    }

    #[test]
    fn edge_rejects_bad_vc_choice() {
        assert!(GraphEdge::new(
            EdgeId::new(0),
            TaskId::new(0),
            TaskId::new(1),
            CoreId::new(0),
            CoreId::new(1),
            AppIdx::new(0),
            7,
            4,
            4,
            Distribution::Constant(8),
            Distribution::Constant(2),
            1,
        )
        .is_err());
    }

    #[test]
    fn production_and_send_pipeline_conserves_tokens() {
        let mut e = edge(0, 0, 1, 0);
        assert!(e.reserve_out_slot());
        assert!(e.record_sent_pkt());
        e.release_out_slot();
        e.record_pkt(10);
        assert!(e.invariant_holds());
        assert_eq!(e.in_tokens, 1);
        assert!(e.consume_in_token());
        assert!(e.invariant_holds());
        assert_eq!(e.in_tokens, 0);
    }

    #[test]
    fn out_memory_full_blocks_eligibility() {
        let mut g = TaskGraph::new();
        g.add_task(task(0, 0, 10)).unwrap();
        g.add_task(task(1, 1, 10)).unwrap();
        let mut e = edge(0, 0, 1, 0);
        e.out_capacity = 1;
        e.reserve_out_slot();
        g.add_edge(e).unwrap();
        assert!(!g.task(TaskId::new(0)).unwrap().is_eligible(g.edges()));
    }

    #[test]
    fn task_with_incoming_edges_needs_tokens() {
        let mut g = TaskGraph::new();
        g.add_task(task(0, 0, 10)).unwrap();
        g.add_task(task(1, 1, 10)).unwrap();
        g.add_edge(edge(0, 0, 1, 0)).unwrap();
        assert!(!g.task(TaskId::new(1)).unwrap().is_eligible(g.edges()));
        g.edge_mut(EdgeId::new(0)).unwrap().in_tokens = 1;
        assert!(g.task(TaskId::new(1)).unwrap().is_eligible(g.edges()));
    }

    #[test]
    fn thread_pool_tracks_availability() {
        let mut pool = ThreadPool::new(1);
        assert!(pool.has_free_slot());
        let idx = pool.free_slot_index().unwrap();
        pool.occupy(
            idx,
            SlotOccupant {
                task_id: TaskId::new(0),
                app_idx: AppIdx::new(0),
                remaining_cycles: 3,
                iteration: 1,
                start_cycle: 0,
            },
        );
        assert!(!pool.has_free_slot());
    }
}
