//! Egress arbiter (spec §4.4): drains the generator buffer, arbitrates
//! between the intra-cluster crossbar and the inter-cluster VC path, and
//! schedules the outbound link.

use std::collections::{BTreeMap, VecDeque};

use noc_core::{
    CoreId, Flit, FlitType, NetworkConfig, NiId, OutVcState, RouteInfo, TaskGraph, TgInfo,
    VcLifecycle,
};

use crate::generator::GeneratorBufferEntry;

/// A destination core's crossbar lane: busy for `crossbar_delay` cycles
/// per packet, one packet at a time (spec §4.4 "intra-cluster
/// arbitration").
#[derive(Debug, Clone, Default)]
pub struct CrossbarLane {
    busy_for: u64,
    in_flight: Option<GeneratorBufferEntry>,
}

impl CrossbarLane {
    pub fn is_idle(&self) -> bool {
        self.busy_for == 0
    }
}

/// Per-NI egress-side state: the generator buffer, the intra/inter
/// staging queues, the crossbar lanes, and the output-VC pool for vnet 2
/// (task-graph traffic always uses vnet 2, spec §3).
pub struct EgressState {
    pub generator_buffer: Vec<GeneratorBufferEntry>,
    pub intra_staging: BTreeMap<CoreId, VecDeque<GeneratorBufferEntry>>,
    pub inter_staging: VecDeque<GeneratorBufferEntry>,
    pub crossbar_lanes: BTreeMap<CoreId, CrossbarLane>,
    pub out_vcs: Vec<OutVcState>,
    pub vc_queues: Vec<VecDeque<Flit>>,
    pub vc_enqueue_marker: Vec<Option<u64>>,
    core_rr: u32,
    vc_rr: u32,
    crossbar_delay: u64,
    /// Consecutive cycles the inter-cluster path had a packet ready but
    /// no free output VC; feeds the deadlock watchdog (spec §4.8).
    pub vc_busy_counter: u64,
}

impl EgressState {
    pub fn new(cfg: &NetworkConfig, local_cores: &[CoreId], crossbar_delay: u64) -> Self {
        let mut crossbar_lanes = BTreeMap::new();
        for &core in local_cores {
            crossbar_lanes.insert(core, CrossbarLane::default());
        }
        Self {
            generator_buffer: Vec::new(),
            intra_staging: BTreeMap::new(),
            inter_staging: VecDeque::new(),
            crossbar_lanes,
            out_vcs: (0..cfg.vcs_per_vnet)
                .map(|_| OutVcState::new(cfg.buffers_per_data_vc))
                .collect(),
            vc_queues: (0..cfg.vcs_per_vnet).map(|_| VecDeque::new()).collect(),
            vc_enqueue_marker: vec![None; cfg.vcs_per_vnet as usize],
            core_rr: 0,
            vc_rr: 0,
            crossbar_delay,
            vc_busy_counter: 0,
        }
    }
}

/// Committed deliveries produced this cycle: intra-core (same NI, same
/// core — token copied straight into in-memory, spec's "destination core
/// == source core" branch) or intra-cluster (crossbar completions).
#[derive(Debug, Clone)]
pub struct Delivery {
    pub edge_id: noc_core::EdgeId,
    pub token_id: u64,
    pub core_id: CoreId,
    pub num_flits: u32,
}

/// Step one: decrement every generator-buffer timer, and route entries
/// that reach zero to same-core, intra-cluster, or inter-cluster.
///
/// `this_ni` and `core_to_ni` let the router tell same-node-different-core
/// traffic apart from traffic that must leave over the network link.
pub fn update_generator_buffer(
    state: &mut EgressState,
    graph: &mut TaskGraph,
    this_ni: NiId,
    core_to_ni: &BTreeMap<CoreId, NiId>,
    cycle: u64,
) -> Vec<Delivery> {
    let mut deliveries = Vec::new();
    let mut still_pending = Vec::with_capacity(state.generator_buffer.len());

    for mut entry in state.generator_buffer.drain(..) {
        if entry.cycles_until_eligible > 0 {
            entry.cycles_until_eligible -= 1;
            still_pending.push(entry);
            continue;
        }

        let dest_ni = core_to_ni.get(&entry.dest_core).copied();
        if entry.src_core == entry.dest_core && dest_ni == Some(this_ni) {
            if let Ok(edge) = graph.edge_mut(entry.edge_id) {
                if edge.record_sent_pkt() {
                    edge.record_pkt(cycle);
                    deliveries.push(Delivery {
                        edge_id: entry.edge_id,
                        token_id: entry.token_id,
                        core_id: entry.dest_core,
                        num_flits: entry.num_flits,
                    });
                    continue;
                }
            }
            // destination in-memory full: retry next cycle.
            entry.cycles_until_eligible = 0;
            still_pending.push(entry);
        } else if dest_ni == Some(this_ni) {
            state
                .intra_staging
                .entry(entry.dest_core)
                .or_default()
                .push_back(entry);
        } else {
            state.inter_staging.push_back(entry);
        }
    }

    state.generator_buffer = still_pending;
    deliveries
}

/// Intra-cluster crossbar arbitration: across destination cores in
/// round-robin order, pick the least-iteration-first entry (spec §4.4:
/// "the same rule applies in both intra-cluster and inter-cluster
/// arbitration") queued for whichever lane is idle.
pub fn intra_cluster_out(state: &mut EgressState, graph: &mut TaskGraph, cycle: u64) -> Vec<Delivery> {
    let mut deliveries = Vec::new();

    for (_, lane) in state.crossbar_lanes.iter_mut() {
        if lane.busy_for > 0 {
            lane.busy_for -= 1;
            if lane.busy_for == 0 {
                if let Some(entry) = lane.in_flight.take() {
                    if let Ok(edge) = graph.edge_mut(entry.edge_id) {
                        edge.record_pkt(cycle);
                    }
                    deliveries.push(Delivery {
                        edge_id: entry.edge_id,
                        token_id: entry.token_id,
                        core_id: entry.dest_core,
                        num_flits: entry.num_flits,
                    });
                }
            }
        }
    }

    let dest_cores: Vec<CoreId> = state.intra_staging.keys().copied().collect();
    if dest_cores.is_empty() {
        return deliveries;
    }
    let core_count = dest_cores.len() as u32;
    let start = state.core_rr % core_count;
    state.core_rr = (state.core_rr + 1) % core_count;

    for offset in 0..core_count {
        let dest_core = dest_cores[((start + offset) % core_count) as usize];
        let lane_idle = state
            .crossbar_lanes
            .get(&dest_core)
            .map(CrossbarLane::is_idle)
            .unwrap_or(false);
        if !lane_idle {
            continue;
        }
        let Some(queue) = state.intra_staging.get_mut(&dest_core) else {
            continue;
        };
        let Some(entry) = pick_least_iteration_in(queue, graph) else {
            continue;
        };
        let Ok(edge) = graph.edge_mut(entry.edge_id) else {
            continue;
        };
        if edge.record_sent_pkt() {
            if let Some(lane) = state.crossbar_lanes.get_mut(&dest_core) {
                lane.busy_for = state.crossbar_delay.max(1);
                lane.in_flight = Some(entry);
            }
        } else {
            queue.push_front(entry);
        }
    }

    deliveries
}

/// Inter-cluster arbitration: allocate a free output VC for each waiting
/// packet, under its `vc_choice` class, up to `idle_output_vcs`
/// iterations per cycle.
pub fn inter_cluster_out(
    state: &mut EgressState,
    graph: &mut TaskGraph,
    cfg: &NetworkConfig,
    this_ni: NiId,
    core_to_ni: &BTreeMap<CoreId, NiId>,
    cycle: u64,
) {
    let idle_vcs = state
        .out_vcs
        .iter()
        .filter(|vc| vc.is_idle())
        .count();
    if idle_vcs == 0 {
        if !state.inter_staging.is_empty() {
            state.vc_busy_counter += 1;
        }
        return;
    }

    let mut allocated_any = false;

    for _ in 0..idle_vcs {
        let Some(entry) = pick_least_iteration(state, graph) else {
            break;
        };
        let rr_seed = state.vc_rr;
        let picked = noc_core::vc_policy::select_free_vc(&state.out_vcs, entry.vc_choice, cfg, rr_seed);
        let Ok(Some(vc)) = picked else {
            // put it back; no matching VC this round.
            state.inter_staging.push_front(entry);
            break;
        };
        state.vc_rr = vc + 1;

        let Ok(edge) = graph.edge_mut(entry.edge_id) else {
            continue;
        };
        if !edge.record_sent_pkt() {
            state.inter_staging.push_front(entry);
            break;
        }

        let dest_ni = core_to_ni.get(&entry.dest_core).copied().unwrap_or(this_ni);
        let flits = expand_packet(&entry, this_ni, dest_ni, cycle);
        state.out_vcs[vc as usize].set_state(VcLifecycle::Active, cycle);
        if state.vc_enqueue_marker[vc as usize].is_none() {
            state.vc_enqueue_marker[vc as usize] = Some(cycle);
        }
        state.vc_queues[vc as usize].extend(flits);
        allocated_any = true;
    }

    if allocated_any {
        state.vc_busy_counter = 0;
    } else if !state.inter_staging.is_empty() {
        state.vc_busy_counter += 1;
    }
}

/// Finds the waiting inter-cluster packet whose producing task has the
/// smallest `c_e_times` (least-iteration-first, spec §4.1/§4.4), removing
/// and returning it.
fn pick_least_iteration(
    state: &mut EgressState,
    graph: &TaskGraph,
) -> Option<GeneratorBufferEntry> {
    pick_least_iteration_in(&mut state.inter_staging, graph)
}

/// Shared least-iteration-first pick (spec §4.4: "the same rule applies
/// in both intra-cluster and inter-cluster arbitration"), removing and
/// returning the chosen entry from `queue`.
fn pick_least_iteration_in(
    queue: &mut VecDeque<GeneratorBufferEntry>,
    graph: &TaskGraph,
) -> Option<GeneratorBufferEntry> {
    let mut best_idx = None;
    let mut best_iter = u64::MAX;
    for (idx, entry) in queue.iter().enumerate() {
        let iter = graph.task(entry.src_task).map(|t| t.c_e_times).unwrap_or(u64::MAX);
        if iter < best_iter {
            best_iter = iter;
            best_idx = Some(idx);
        }
    }
    let idx = best_idx?;
    queue.remove(idx)
}

fn expand_packet(entry: &GeneratorBufferEntry, src_ni: NiId, dest_ni: NiId, cycle: u64) -> Vec<Flit> {
    let n = entry.num_flits.max(1);
    (0..n)
        .map(|seq| {
            let flit_type = if n == 1 {
                FlitType::HeadTail
            } else if seq == 0 {
                FlitType::Head
            } else if seq + 1 == n {
                FlitType::Tail
            } else {
                FlitType::Body
            };
            Flit {
                seq_in_packet: seq,
                vc: -1,
                vnet: 2,
                route: RouteInfo {
                    vnet: 2,
                    src_ni,
                    src_router: src_ni.raw(),
                    dest_ni,
                    dest_router: dest_ni.raw(),
                    vc_choice: entry.vc_choice,
                    hops_traversed: -1,
                },
                packet_size: n,
                flit_type,
                enqueue_cycle: cycle,
                src_delay: 0,
                dequeue_cycle: None,
                tg_info: TgInfo {
                    src_task: entry.src_task,
                    dest_task: entry.dest_task,
                    edge_id: entry.edge_id,
                    token_id: entry.token_id,
                    app_idx: entry.app_idx,
                    token_length_in_pkt: entry.num_flits,
                },
            }
        })
        .collect()
}

/// Each cycle, a round-robin walk across all output VCs selects one VC
/// that has a flit ready and has credit; returns the flit to transmit
/// this cycle, if any (spec's "Scheduling of the output link").
pub fn schedule_output_link(state: &mut EgressState, cycle: u64) -> Option<Flit> {
    let n = state.out_vcs.len() as u32;
    if n == 0 {
        return None;
    }
    let start = state.vc_rr % n;

    let mut candidate: Option<u32> = None;
    let mut earliest = u64::MAX;
    for offset in 0..n {
        let vc = (start + offset) % n;
        let ready = !state.vc_queues[vc as usize].is_empty() && state.out_vcs[vc as usize].has_credit();
        if !ready {
            continue;
        }
        let marker = state.vc_enqueue_marker[vc as usize].unwrap_or(u64::MAX);
        if marker < earliest {
            earliest = marker;
            candidate = Some(vc);
        }
    }

    let vc = candidate?;
    state.vc_rr = (vc + 1) % n;
    state.out_vcs[vc as usize].decrement_credit();
    let mut flit = state.vc_queues[vc as usize].pop_front()?;
    flit.vc = vc as i32;
    flit.dequeue_cycle = Some(cycle + 1);
    if flit.is_tail() {
        state.vc_enqueue_marker[vc as usize] = None;
    }
    Some(flit)
}
