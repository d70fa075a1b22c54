//! The virtual-channel class-range policy (spec §4.5), grounded on
//! `OutputUnit::has_free_vc` / `OutputUnit::select_free_vc` in the original.
//!
//! Every flit carries a `vc_choice` in `0..=3` that steers it into a
//! disjoint sub-range of the vnet's VC pool, which is how the deadlock
//! -avoidance classes are kept from ever waiting on each other. Classes 2
//! and 3 only exist when the configuration names a reserved allocation
//! object; without one, only classes 0 and 1 are in play.

use std::ops::Range;

use crate::config::NetworkConfig;
use crate::error::{NocError, NocResult};
use crate::flit::{OutVcState, VcLifecycle};
use crate::ids::EdgeId;

/// The `0..=3` range of VC classes a `vc_choice` value may hold.
pub const MAX_VC_CHOICE: u8 = 3;

/// The sub-range of VC indices (within one virtual network) a `vc_choice`
/// class is allowed to allocate from, per spec §4.5's table.
pub fn class_range(vc_choice: u8, cfg: &NetworkConfig) -> NocResult<Range<u32>> {
    let total = cfg.vcs_per_vnet;
    let half = total / 2;

    let range = match vc_choice {
        0 => 0..half,
        1 => half..total,
        2 | 3 if !cfg.has_vc_reservation() => {
            return Err(NocError::InvalidVcChoice {
                edge_id: EdgeId::new(0),
                value: vc_choice,
            })
        }
        2 => {
            let reserved = cfg.vcs_for_allocation;
            reserved..((reserved + total) / 2)
        }
        3 => {
            let reserved = cfg.vcs_for_allocation;
            ((reserved + total) / 2)..total
        }
        other => {
            return Err(NocError::InvalidVcChoice {
                edge_id: EdgeId::new(0),
                value: other,
            })
        }
    };
    Ok(range)
}

/// Same as [`class_range`] but attributes allocation failures to a
/// particular edge for error reporting.
pub fn class_range_for_edge(
    edge_id: EdgeId,
    vc_choice: u8,
    cfg: &NetworkConfig,
) -> NocResult<Range<u32>> {
    class_range(vc_choice, cfg).map_err(|_| NocError::InvalidVcChoice {
        edge_id,
        value: vc_choice,
    })
}

/// Whether any VC in the class range is idle with at least one credit.
pub fn has_free_vc(vcs: &[OutVcState], vc_choice: u8, cfg: &NetworkConfig) -> NocResult<bool> {
    let range = class_range(vc_choice, cfg)?;
    Ok(vcs[range.start as usize..range.end as usize]
        .iter()
        .any(|vc| vc.state() == VcLifecycle::Idle && vc.has_credit()))
}

/// Picks a free VC within the class's range, round-robining from
/// `rr_start` so repeated allocations spread load instead of always
/// returning the lowest index.
pub fn select_free_vc(
    vcs: &[OutVcState],
    vc_choice: u8,
    cfg: &NetworkConfig,
    rr_start: u32,
) -> NocResult<Option<u32>> {
    let range = class_range(vc_choice, cfg)?;
    if range.is_empty() {
        return Ok(None);
    }
    let span = range.end - range.start;
    let start_offset = rr_start.checked_sub(range.start).unwrap_or(0) % span;
    for i in 0..span {
        let idx = range.start + (start_offset + i) % span;
        let vc = &vcs[idx as usize];
        if vc.is_idle() {
            return Ok(Some(idx));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_with_reservation() -> NetworkConfig {
        let mut cfg = NetworkConfig::default();
        cfg.vcs_per_vnet = 8;
        cfg.vcs_for_allocation = 2;
        cfg.vc_allocation_object = Some("ddr".to_string());
        cfg
    }

    #[test]
    fn class_0_is_low_half() {
        let cfg = NetworkConfig::default();
        assert_eq!(class_range(0, &cfg).unwrap(), 0..(cfg.vcs_per_vnet / 2));
    }

    #[test]
    fn class_1_is_high_half() {
        let cfg = NetworkConfig::default();
        assert_eq!(
            class_range(1, &cfg).unwrap(),
            (cfg.vcs_per_vnet / 2)..cfg.vcs_per_vnet
        );
    }

    #[test]
    fn class_2_is_reserved_low_half() {
        let cfg = cfg_with_reservation();
        assert_eq!(class_range(2, &cfg).unwrap(), 2..5);
    }

    #[test]
    fn class_3_is_reserved_high_half() {
        let cfg = cfg_with_reservation();
        assert_eq!(class_range(3, &cfg).unwrap(), 5..8);
    }

    #[test]
    fn class_2_without_reservation_is_rejected() {
        let cfg = NetworkConfig::default();
        assert!(class_range(2, &cfg).is_err());
    }

    #[test]
    fn out_of_range_choice_errors() {
        let cfg = NetworkConfig::default();
        assert!(class_range(4, &cfg).is_err());
    }

    #[test]
    fn select_free_vc_round_robins() {
        let cfg = NetworkConfig::default();
        let vcs: Vec<OutVcState> = (0..cfg.vcs_per_vnet).map(|_| OutVcState::new(4)).collect();
        let picked = select_free_vc(&vcs, 1, &cfg, 3).unwrap();
        assert_eq!(picked, Some(3));
    }

    #[test]
    fn select_free_vc_skips_active() {
        let cfg = NetworkConfig::default();
        let mut vcs: Vec<OutVcState> = (0..cfg.vcs_per_vnet).map(|_| OutVcState::new(4)).collect();
        vcs[0].set_state(VcLifecycle::Active, 0);
        let picked = select_free_vc(&vcs, 0, &cfg, 0).unwrap();
        assert_eq!(picked, Some(1));
    }
}
