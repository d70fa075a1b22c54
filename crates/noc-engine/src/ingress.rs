//! Ingress handler (spec §4.7) plus the `PendingCommit` retry queue
//! (SPEC_FULL.md §2's supplemented feature 1): a TAIL/HEAD_TAIL can still
//! find its destination edge's in-memory full, because `record_sent_pkt`
//! only checks `in_tokens` at send time and several packets can be in
//! flight toward the same edge at once. When that happens the flit stays
//! queued and is retried next cycle rather than being dropped.

use std::collections::VecDeque;

use noc_core::{Credit, Flit, TaskGraph, TraceSinks};

#[derive(Debug, Clone)]
pub struct PendingCommit {
    flit: Flit,
}

#[derive(Debug, Clone, Default)]
pub struct IngressState {
    pending: VecDeque<PendingCommit>,
}

impl IngressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Processes one arriving flit (if any) plus every previously-stalled
/// `PendingCommit`, in arrival order, returning the credits to send back
/// upstream this cycle.
pub fn ingress_step(
    state: &mut IngressState,
    graph: &mut TaskGraph,
    incoming: Option<Flit>,
    cycle: u64,
    sinks: &mut TraceSinks,
) -> Vec<Credit> {
    let mut credits = Vec::new();

    if let Some(mut flit) = incoming {
        flit.dequeue_cycle = Some(cycle);
        state.pending.push_back(PendingCommit { flit });
    }

    let mut still_pending = VecDeque::new();
    while let Some(PendingCommit { flit }) = state.pending.pop_front() {
        match try_commit(&flit, graph, cycle, sinks) {
            Some(credit) => credits.push(credit),
            None => {
                still_pending.push_back(PendingCommit { flit });
                // A blocked TAIL means everything behind it on this VC
                // would arrive out of order if committed first; stop here.
                break;
            }
        }
    }
    while let Some(item) = state.pending.pop_front() {
        still_pending.push_back(item);
    }
    state.pending = still_pending;

    credits
}

fn try_commit(
    flit: &Flit,
    graph: &mut TaskGraph,
    cycle: u64,
    sinks: &mut TraceSinks,
) -> Option<Credit> {
    let dequeue_cycle = flit.dequeue_cycle.unwrap_or(cycle);

    if flit.is_tail() {
        let edge = graph.edge_mut(flit.tg_info.edge_id).ok()?;
        if edge.in_tokens >= edge.in_capacity {
            return None;
        }
        edge.record_pkt(cycle);

        let network_delay = flit.network_delay(dequeue_cycle);
        let queueing_delay = flit.src_delay + cycle.saturating_sub(dequeue_cycle);
        sinks.network_performance_info.write_line(&noc_core::trace::format::network_performance_info(
            flit.vnet,
            network_delay,
            queueing_delay,
            flit.route.hops_traversed,
        ));

        Some(Credit {
            vc: flit.vc.max(0) as usize,
            is_free: true,
            cycle,
            origin_ni: flit.route.src_ni,
        })
    } else {
        let network_delay = flit.network_delay(dequeue_cycle);
        let queueing_delay = flit.src_delay + cycle.saturating_sub(dequeue_cycle);
        sinks.network_performance_info.write_line(&noc_core::trace::format::network_performance_info(
            flit.vnet,
            network_delay,
            queueing_delay,
            flit.route.hops_traversed,
        ));
        Some(Credit {
            vc: flit.vc.max(0) as usize,
            is_free: false,
            cycle,
            origin_ni: flit.route.src_ni,
        })
    }
}

/// Applies an inbound credit: increments the producer-side `OutVcState`'s
/// credit, and transitions it to IDLE when `is_free` is set (spec §4.7's
/// last bullet, and the router's "OutputUnit credit endpoint" of §6).
pub fn apply_credit(out_vcs: &mut [noc_core::OutVcState], credit: Credit) {
    if let Some(vc) = out_vcs.get_mut(credit.vc) {
        vc.increment_credit();
        if credit.is_free {
            vc.set_state(noc_core::VcLifecycle::Idle, credit.cycle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noc_core::{
        AppIdx, CoreId, Distribution, EdgeId, FlitType, GraphEdge, GraphTask, NiId, NullTraceSink,
        RouteInfo, TaskId, TgInfo,
    };

    fn test_sinks() -> TraceSinks {
        TraceSinks::null()
    }

    fn edge_graph(in_capacity: u32) -> TaskGraph {
        let mut g = TaskGraph::new();
        g.add_task(GraphTask::new(
            TaskId::new(0),
            CoreId::new(0),
            AppIdx::new(0),
            10,
            Distribution::Constant(1),
            1,
        ))
        .unwrap();
        g.add_task(GraphTask::new(
            TaskId::new(1),
            CoreId::new(1),
            AppIdx::new(0),
            10,
            Distribution::Constant(1),
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
                in_capacity,
                4,
                Distribution::Constant(8),
                Distribution::Constant(1),
                3,
            )
            .unwrap(),
        )
        .unwrap();
        g
    }

    fn tail_flit() -> Flit {
        Flit {
            seq_in_packet: 0,
            vc: 0,
            vnet: 2,
            route: RouteInfo {
                vnet: 2,
                src_ni: NiId::new(0),
                src_router: 0,
                dest_ni: NiId::new(1),
                dest_router: 1,
                vc_choice: 0,
                hops_traversed: 1,
            },
            packet_size: 1,
            flit_type: FlitType::HeadTail,
            enqueue_cycle: 0,
            src_delay: 0,
            dequeue_cycle: None,
            tg_info: TgInfo {
                src_task: TaskId::new(0),
                dest_task: TaskId::new(1),
                edge_id: EdgeId::new(0),
                token_id: 0,
                app_idx: AppIdx::new(0),
                token_length_in_pkt: 1,
            },
        }
    }

    #[test]
    fn tail_commits_and_returns_free_credit() {
        let mut g = edge_graph(4);
        let mut state = IngressState::new();
        let mut sinks = test_sinks();
        let credits = ingress_step(&mut state, &mut g, Some(tail_flit()), 5, &mut sinks);
        assert_eq!(credits.len(), 1);
        assert!(credits[0].is_free);
        assert_eq!(g.edge(EdgeId::new(0)).unwrap().in_tokens, 1);
    }

    #[test]
    fn full_destination_defers_commit() {
        let mut g = edge_graph(0);
        let mut state = IngressState::new();
        let mut sinks = test_sinks();
        let credits = ingress_step(&mut state, &mut g, Some(tail_flit()), 5, &mut sinks);
        assert!(credits.is_empty());
        assert_eq!(state.pending_len(), 1);
        assert_eq!(g.edge(EdgeId::new(0)).unwrap().in_tokens, 0);
    }

    #[test]
    fn apply_credit_frees_and_idles_vc() {
        let mut vcs = vec![noc_core::OutVcState::new(4)];
        vcs[0].decrement_credit();
        vcs[0].set_state(noc_core::VcLifecycle::Active, 0);
        apply_credit(
            &mut vcs,
            Credit {
                vc: 0,
                is_free: true,
                cycle: 1,
                origin_ni: NiId::new(0),
            },
        );
        assert_eq!(vcs[0].credits(), 4);
        assert!(vcs[0].is_idle());
    }
}
