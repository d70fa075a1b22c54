//! Deadlock watchdog (spec §4.8).

use noc_core::{NetworkConfig, NocError, NocResult};

/// Checks the inter-cluster egress path's `vc_busy_counter` against
/// `garnet_deadlock_threshold`, returning a fatal `NocError::Deadlock`
/// once it's exceeded.
pub fn check(vc_busy_counter: u64, vnet: u8, cfg: &NetworkConfig, cycle: u64) -> NocResult<()> {
    if vc_busy_counter > cfg.garnet_deadlock_threshold {
        log::error!(
            "deadlock watchdog tripped: vnet={vnet} cycle={cycle} busy_counter={vc_busy_counter}"
        );
        return Err(NocError::Deadlock { vnet, cycle });
    }
    Ok(())
}
