use crate::ids::{AppIdx, EdgeId, NiId, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlitType {
    Head,
    Body,
    Tail,
    HeadTail,
}

/// Route metadata stamped onto a flit at generation time.
///
/// `hops_traversed` starts at `-1` so that the first hop increments it to
/// `0`, matching the original's convention (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct RouteInfo {
    pub vnet: u8,
    pub src_ni: NiId,
    pub src_router: u32,
    pub dest_ni: NiId,
    pub dest_router: u32,
    pub vc_choice: u8,
    pub hops_traversed: i32,
}

impl RouteInfo {
    pub fn increment_hops(&mut self) {
        self.hops_traversed += 1;
    }
}

/// Task-graph metadata carried by every flit belonging to task-graph
/// traffic (spec §3's "Flit ... task-graph metadata").
#[derive(Debug, Clone, Copy)]
pub struct TgInfo {
    pub src_task: TaskId,
    pub dest_task: TaskId,
    pub edge_id: EdgeId,
    pub token_id: u64,
    pub app_idx: AppIdx,
    pub token_length_in_pkt: u32,
}

/// The transport unit (spec §3).
#[derive(Debug, Clone)]
pub struct Flit {
    pub seq_in_packet: u32,
    /// `-1` until a VC has been allocated for this flit.
    pub vc: i32,
    pub vnet: u8,
    pub route: RouteInfo,
    /// Number of flits in the packet this flit belongs to.
    pub packet_size: u32,
    pub flit_type: FlitType,
    pub enqueue_cycle: u64,
    pub src_delay: u64,
    pub dequeue_cycle: Option<u64>,
    pub tg_info: TgInfo,
}

impl Flit {
    pub fn is_tail(&self) -> bool {
        matches!(self.flit_type, FlitType::Tail | FlitType::HeadTail)
    }

    /// Network delay as computed at ingress (spec §2 of SPEC_FULL.md):
    /// dequeue minus enqueue, minus the one cycle the original subtracts
    /// for the final link hop, floored at zero so an intra-cycle delivery
    /// (dequeue == enqueue) never underflows.
    pub fn network_delay(&self, dequeue_cycle: u64) -> u64 {
        (dequeue_cycle + 1).saturating_sub(self.enqueue_cycle + 1)
    }
}

/// Return-path credit signal (spec §3, §4.7).
///
/// `origin_ni` names the NI whose `OutVcState` this credit replenishes —
/// the source of the flit that earned it — so the fabric can route the
/// credit back across a topology with more than two nodes without
/// needing a static per-link peer table.
#[derive(Debug, Clone, Copy)]
pub struct Credit {
    pub vc: usize,
    pub is_free: bool,
    pub cycle: u64,
    pub origin_ni: NiId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcLifecycle {
    Idle,
    Active,
}

/// Per-output-VC credit and lifecycle state (spec §3, §4.4).
#[derive(Debug, Clone)]
pub struct OutVcState {
    state: VcLifecycle,
    credits: u32,
    last_change_cycle: u64,
    max_credits: u32,
}

impl OutVcState {
    pub fn new(max_credits: u32) -> Self {
        Self {
            state: VcLifecycle::Idle,
            credits: max_credits,
            last_change_cycle: 0,
            max_credits,
        }
    }

    pub fn state(&self) -> VcLifecycle {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == VcLifecycle::Idle
    }

    pub fn set_state(&mut self, state: VcLifecycle, cycle: u64) {
        self.state = state;
        self.last_change_cycle = cycle;
    }

    pub fn has_credit(&self) -> bool {
        self.credits > 0
    }

    pub fn credits(&self) -> u32 {
        self.credits
    }

    pub fn decrement_credit(&mut self) {
        debug_assert!(self.credits > 0, "decrementing credit below zero");
        self.credits = self.credits.saturating_sub(1);
    }

    pub fn increment_credit(&mut self) {
        self.credits = (self.credits + 1).min(self.max_credits);
    }
}
