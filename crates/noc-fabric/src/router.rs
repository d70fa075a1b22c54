//! Router stub (spec §6): point-to-point hop counting and VC-class
//! enforcement, with no switch allocation or multi-hop route computation
//! — test topologies connect NIs directly, so a "route" is just the one
//! hop from source router to destination router.

use noc_core::{NetworkConfig, NocError, NocResult, RouteInfo};

/// A single router identified by its id, restricting every flit it
/// forwards to the class range its `vc_choice` names (spec §4.5) and
/// incrementing `hops_traversed`.
#[derive(Debug, Clone, Copy)]
pub struct Router {
    pub id: u32,
}

impl Router {
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    /// Validates the flit's `vc_choice` against `cfg` and stamps one hop.
    pub fn forward(&self, route: &mut RouteInfo, cfg: &NetworkConfig) -> NocResult<()> {
        noc_core::vc_policy::class_range(route.vc_choice, cfg).map_err(|_| {
            NocError::InvalidVcChoice {
                edge_id: noc_core::EdgeId::new(0),
                value: route.vc_choice,
            }
        })?;
        route.increment_hops();
        Ok(())
    }
}
