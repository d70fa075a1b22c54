//! Token-to-flit generator (spec §4.3, `enqueueFlitsGeneratorBuffer`).

use noc_core::{AppIdx, CoreId, EdgeId, NetworkConfig, TaskGraph, TaskId};

use crate::scheduler::StartedTask;

/// A packet awaiting its eligibility cycle in the per-core generator
/// buffer. Holds only the packet's head-flit metadata: the full flit
/// sequence (HEAD, BODY..., TAIL) is expanded by the egress arbiter only
/// once the packet actually wins arbitration (spec §4.4).
#[derive(Debug, Clone)]
pub struct GeneratorBufferEntry {
    pub cycles_until_eligible: u64,
    pub src_task: TaskId,
    pub dest_task: TaskId,
    pub src_core: CoreId,
    pub dest_core: CoreId,
    pub edge_id: EdgeId,
    pub app_idx: AppIdx,
    pub token_id: u64,
    pub vc_choice: u8,
    /// Flits in this packet, after the `buffers_per_data_vc` clamp on the
    /// last packet (spec §9's first Open Question — the clamp is
    /// preserved as specified, inflating a short tail packet up to one
    /// VC buffer's worth of flits rather than trimming it).
    pub num_flits: u32,
}

/// Fragments every outgoing production of `started` into packets spread
/// across `[0, exec_time]`, appending one [`GeneratorBufferEntry`] per
/// packet to `buffer`.
pub fn enqueue_flits_for_started_task(
    started: &StartedTask,
    graph: &mut TaskGraph,
    cfg: &NetworkConfig,
    buffer: &mut Vec<GeneratorBufferEntry>,
) {
    for &edge_id in &started.out_edges {
        let edge = graph.edge_mut(edge_id).expect("scheduler already reserved this edge");
        let token_size_bits = edge.sample_token_size();
        let num_flits = token_size_bits.div_ceil(cfg.ni_flit_size as u64).max(1) as u32;
        let dest_core = edge.dest_core;
        let dest_task = edge.dest_task;
        let vc_choice = edge.vc_choice;
        let token_id = edge.new_token_id();

        schedule_packets(
            started, edge_id, dest_core, dest_task, vc_choice, token_id, num_flits, graph, cfg,
            buffer,
        );
    }
}

/// Splits one token's `num_flits` into packets of at most
/// `token_packet_length` flits, spacing their eligibility cycles by the
/// edge's random inter-packet interval, and clamping the last packet up
/// to `buffers_per_data_vc` flits.
#[allow(clippy::too_many_arguments)]
fn schedule_packets(
    started: &StartedTask,
    edge_id: EdgeId,
    dest_core: CoreId,
    dest_task: TaskId,
    vc_choice: u8,
    token_id: u64,
    num_flits: u32,
    graph: &mut TaskGraph,
    cfg: &NetworkConfig,
    buffer: &mut Vec<GeneratorBufferEntry>,
) {
    let token_len_in_pkt = cfg.token_packet_length.max(1);
    let num_packets = num_flits.div_ceil(token_len_in_pkt).max(1);

    let edge = graph.edge_mut(edge_id).expect("edge exists");
    let mut accumulated: u64 = 0;

    for packet_idx in 0..num_packets {
        let is_last = packet_idx + 1 == num_packets;
        let flits_in_packet = if is_last {
            let remainder = num_flits - (num_packets - 1) * token_len_in_pkt;
            remainder.max(cfg.buffers_per_data_vc)
        } else {
            token_len_in_pkt
        };

        accumulated += edge.sample_packet_interval();
        let eligible_at = accumulated.min(started.exec_time);

        buffer.push(GeneratorBufferEntry {
            cycles_until_eligible: eligible_at,
            src_task: started.task_id,
            dest_task,
            src_core: started.core_id,
            dest_core,
            edge_id,
            app_idx: started.app_idx,
            token_id,
            vc_choice,
            num_flits: flits_in_packet,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noc_core::{CoreId, Distribution, GraphEdge, GraphTask};

    fn scenario() -> (TaskGraph, NetworkConfig) {
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
        let mut edge = GraphEdge::new(
            EdgeId::new(0),
            TaskId::new(0),
            TaskId::new(1),
            CoreId::new(0),
            CoreId::new(1),
            AppIdx::new(0),
            0,
            8,
            8,
            Distribution::Constant(256),
            Distribution::Constant(1),
            3,
        )
        .unwrap();
        edge.reserve_out_slot();
        g.add_edge(edge).unwrap();
        let mut cfg = NetworkConfig::default();
        cfg.ni_flit_size = 128;
        cfg.token_packet_length = 1;
        (g, cfg)
    }

    #[test]
    fn fragments_token_into_packets_within_window() {
        let (mut g, cfg) = scenario();
        let started = StartedTask {
            core_id: CoreId::new(0),
            app_idx: AppIdx::new(0),
            task_id: TaskId::new(0),
            iteration: 1,
            exec_time: 3,
            start_cycle: 0,
            out_edges: vec![EdgeId::new(0)],
            waiting_time: 0,
        };
        let mut buffer = Vec::new();
        enqueue_flits_for_started_task(&started, &mut g, &cfg, &mut buffer);
        // 256 bits / 128 bit flits = 2 flits, token_packet_length=1 => 2 packets.
        assert_eq!(buffer.len(), 2);
        for entry in &buffer {
            assert!(entry.cycles_until_eligible <= started.exec_time);
        }
        assert_eq!(buffer[0].token_id, buffer[1].token_id);
    }

    #[test]
    fn last_packet_clamps_to_buffers_per_data_vc() {
        let (mut g, mut cfg) = scenario();
        cfg.token_packet_length = 4;
        cfg.buffers_per_data_vc = 4;
        let started = StartedTask {
            core_id: CoreId::new(0),
            app_idx: AppIdx::new(0),
            task_id: TaskId::new(0),
            iteration: 1,
            exec_time: 3,
            start_cycle: 0,
            out_edges: vec![EdgeId::new(0)],
            waiting_time: 0,
        };
        let mut buffer = Vec::new();
        enqueue_flits_for_started_task(&started, &mut g, &cfg, &mut buffer);
        // num_flits=2, token_len_in_pkt=4 => one packet, remainder=2 clamped to 4.
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer[0].num_flits, 4);
    }
}
