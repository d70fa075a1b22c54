//! The per-cycle Network Interface: assembles scheduler, execution,
//! generator, egress, ingress, and (for NIs that host one) the entrance
//! injector into the exact per-cycle sequence of spec §2:
//! `enqueue-new-tasks → advance-execution → drain-generator-buffer →
//! egress-arbitration → ingest-link → ingest-credits → reschedule`.

use std::collections::BTreeMap;

use noc_core::{
    CoreId, Credit, Flit, InMemoryUpdate, Inbox, NetworkConfig, NiId, NocResult, TaskGraph,
    ThreadPool, TraceSinks,
};

use crate::egress::{self, EgressState};
use crate::entrance::{self, EntranceIndex, GraphBackPressure, RatioTokens};
use crate::execution;
use crate::generator;
use crate::ingress::{self, IngressState};
use crate::scheduler::{self, CoreIndex, SchedulerRr};
use crate::watchdog;

/// Extra state carried only by the NI designated as the network's
/// entrance (spec §4.6).
pub struct EntranceState {
    pub entrance_core: CoreId,
    pub index: EntranceIndex,
    pub initial_pool: ThreadPool,
    pub tokens: RatioTokens,
}

/// One NI's full local state. The `TaskGraph` it operates on is not
/// owned here: it is the network's single shared arena, threaded in by
/// reference on every `wakeup` call (spec §9's "no singletons" design
/// note).
pub struct Ni {
    pub id: NiId,
    pub local_cores: Vec<CoreId>,
    core_index: CoreIndex,
    thread_pools: BTreeMap<CoreId, ThreadPool>,
    scheduler_rr: SchedulerRr,
    egress: EgressState,
    ingress: IngressState,
    inbox: Inbox,
    entrance: Option<EntranceState>,
}

/// Everything one `wakeup` call observes arriving from outside this NI.
#[derive(Debug, Default)]
pub struct Inputs {
    pub incoming_flit: Option<Flit>,
    pub incoming_credit: Option<Credit>,
}

/// Everything one `wakeup` call hands back to the fabric that owns the
/// links and routes cross-NI messaging.
pub struct Outputs {
    pub outgoing_flit: Option<Flit>,
    pub outgoing_credits: Vec<Credit>,
    /// `InMemoryUpdate`s this cycle's consumers posted for producers that
    /// may live on a different NI; the fabric resolves each producer's
    /// home NI and posts into that NI's inbox (spec §9, SPEC_FULL.md
    /// "cross-NI side-effect messaging").
    pub posted_updates: Vec<InMemoryUpdate>,
}

impl Ni {
    pub fn new(
        id: NiId,
        graph: &TaskGraph,
        local_cores: Vec<CoreId>,
        threads_per_core: u32,
        cfg: &NetworkConfig,
        crossbar_delay: u64,
        entrance: Option<EntranceState>,
    ) -> Self {
        Self {
            id,
            core_index: CoreIndex::build(graph),
            thread_pools: local_cores
                .iter()
                .map(|&c| (c, ThreadPool::new(threads_per_core)))
                .collect(),
            egress: EgressState::new(cfg, &local_cores, crossbar_delay),
            ingress: IngressState::new(),
            scheduler_rr: SchedulerRr::new(),
            inbox: Inbox::new(),
            local_cores,
            entrance,
        }
    }

    pub fn inbox_mut(&mut self) -> &mut Inbox {
        &mut self.inbox
    }

    pub fn vc_busy_counter(&self) -> u64 {
        self.egress.vc_busy_counter
    }

    /// Runs exactly one cycle at this NI, in the order spec §2 names.
    pub fn wakeup(
        &mut self,
        graph: &mut TaskGraph,
        cfg: &NetworkConfig,
        core_to_ni: &BTreeMap<CoreId, NiId>,
        inputs: Inputs,
        sinks: &mut TraceSinks,
        cycle: u64,
    ) -> NocResult<Outputs> {
        // Drain our own inbox first: side effects consumers on other NIs
        // posted for this NI's producer tasks, from their previous
        // wakeup, are visible before we schedule this cycle's work. Each
        // update frees the out-memory slot the producer's edge reserved
        // at send time, now that the consumer has actually dequeued it
        // (spec §9's cross-NI side-effect note).
        for update in self.inbox.drain() {
            if let Ok(edge) = graph.edge_mut(update.edge_id) {
                edge.release_out_slot();
            }
        }

        let mut posted_updates = Vec::new();
        let mut local_inboxes: BTreeMap<CoreId, Inbox> = BTreeMap::new();
        let mut started = scheduler::enqueue_new_tasks(
            graph,
            &self.core_index,
            &mut self.thread_pools,
            &mut self.scheduler_rr,
            &mut local_inboxes,
            cycle,
        );
        for (_, inbox) in local_inboxes {
            posted_updates.extend(inbox.into_updates());
        }

        if let Some(entrance) = self.entrance.as_mut() {
            let bp = GraphBackPressure::compute(graph, &entrance.index);
            let entrance_started = entrance::inject(
                graph,
                entrance.entrance_core,
                &entrance.index,
                &mut entrance.initial_pool,
                &mut entrance.tokens,
                &bp,
                cfg,
                cycle,
            );
            started.extend(entrance_started);
        }

        for task in &started {
            generator::enqueue_flits_for_started_task(task, graph, cfg, &mut self.egress.generator_buffer);
            sinks.task_start_time_vs_id.write_line(&noc_core::trace::format::task_start_time_vs_id(
                cycle,
                task.core_id.raw(),
                task.task_id.raw(),
            ));
            sinks
                .task_start_time_vs_id_iters
                .write_line(&noc_core::trace::format::task_start_time_vs_id_iters(
                    cycle,
                    task.core_id.raw(),
                    task.task_id.raw(),
                    task.iteration,
                ));
            sinks
                .task_waiting_time_info
                .write_line(&noc_core::trace::format::task_waiting_time_info(
                    task.core_id.raw(),
                    task.task_id.raw(),
                    task.waiting_time,
                ));
        }

        let completed = execution::advance(&mut self.thread_pools, graph, cycle);
        for task in &completed {
            sinks
                .task_start_end_time_vs_id
                .write_line(&noc_core::trace::format::task_start_end_time_vs_id(
                    task.app_idx.raw(),
                    task.iteration,
                    task.start_cycle,
                    task.end_cycle,
                ));
            sinks
                .app_delay_running_info
                .write_line(&noc_core::trace::format::app_delay_running_info(
                    task.app_idx.raw(),
                    task.iteration,
                ));
        }

        let same_ni_deliveries =
            egress::update_generator_buffer(&mut self.egress, graph, self.id, core_to_ni, cycle);
        let intra_deliveries = egress::intra_cluster_out(&mut self.egress, graph, cycle);
        egress::inter_cluster_out(&mut self.egress, graph, cfg, self.id, core_to_ni, cycle);
        watchdog::check(self.egress.vc_busy_counter, 2, cfg, cycle)?;

        for delivery in same_ni_deliveries.iter().chain(intra_deliveries.iter()) {
            let bits = u64::from(delivery.num_flits) * u64::from(cfg.ni_flit_size);
            sinks
                .throughput_info
                .write_line(&noc_core::trace::format::throughput_info(delivery.core_id.raw(), bits));
        }

        let outgoing_credits =
            ingress::ingress_step(&mut self.ingress, graph, inputs.incoming_flit, cycle, sinks);
        if let Some(credit) = inputs.incoming_credit {
            ingress::apply_credit(&mut self.egress.out_vcs, credit);
        }

        let outgoing_flit = egress::schedule_output_link(&mut self.egress, cycle);

        Ok(Outputs {
            outgoing_flit,
            outgoing_credits,
            posted_updates,
        })
    }
}
