use std::path::PathBuf;

/// The "Configuration surface" of spec §6.
///
/// Loading `task_graph_file` / `architecture_file` / `application_config`
/// from disk is explicitly out of scope (spec §1): those three fields are
/// kept as opaque paths a host binary may resolve however it likes. This
/// crate never opens them; `TaskGraph`s are always built programmatically
/// through `noc_core::topology::TaskGraph`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkConfig {
    /// Flit width in bits.
    pub ni_flit_size: u32,
    /// Virtual channels per virtual network.
    pub vcs_per_vnet: u32,
    /// Credit budget for a data-carrying VC.
    pub buffers_per_data_vc: u32,
    /// Credit budget for a control VC.
    pub buffers_per_ctrl_vc: u32,
    /// Cycles of failed VC allocation before the watchdog fires.
    pub garnet_deadlock_threshold: u64,
    /// Selects dataflow (task-graph) mode over synthetic/protocol traffic.
    pub task_graph_enable: bool,
    pub task_graph_file: Option<PathBuf>,
    pub architecture_file: Option<PathBuf>,
    pub application_config: Option<PathBuf>,
    /// Flits-per-packet cap used when fragmenting a token (spec §4.3).
    pub token_packet_length: u32,
    /// Integer selector consumed by routers; opaque to this crate.
    pub routing_algorithm: u32,
    /// VCs reserved for a named allocation object (spec §4.5, classes 2/3).
    pub vcs_for_allocation: u32,
    pub vc_allocation_object: Option<String>,
    /// Enables per-task start-time tracing.
    pub print_task_execution_info: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ni_flit_size: 128,
            vcs_per_vnet: 4,
            buffers_per_data_vc: 4,
            buffers_per_ctrl_vc: 2,
            garnet_deadlock_threshold: 50_000,
            task_graph_enable: true,
            task_graph_file: None,
            architecture_file: None,
            application_config: None,
            token_packet_length: 4,
            routing_algorithm: 0,
            vcs_for_allocation: 0,
            vc_allocation_object: None,
            print_task_execution_info: false,
        }
    }
}

impl NetworkConfig {
    /// Whether VC classes 2/3 (reserved-object ranges) are active for this
    /// configuration, per spec §4.5's table.
    pub fn has_vc_reservation(&self) -> bool {
        self.vcs_for_allocation > 0
            && self
                .vc_allocation_object
                .as_ref()
                .is_some_and(|s| !s.trim().is_empty())
    }
}
