//! The global network context (spec §6's "Global network object"):
//! threaded through every NI's `wakeup` rather than reached via a
//! process-wide singleton (spec §9's "no owning pointers across NIs"
//! design note).

use std::collections::BTreeMap;

use noc_core::{CoreId, NetworkConfig, NiId, NocError, NocResult, TaskGraph, TraceSinks};
use noc_engine::{Inputs, Ni};

use crate::link::{CreditLink, NetworkLink};
use crate::router::Router;

/// A directed physical link declaration used to wire up [`Network`]:
/// flits and credits for `(from, to)` travel over dedicated delay
/// lines, with `flit_delay`/`credit_delay` cycles of transit latency.
#[derive(Debug, Clone, Copy)]
pub struct LinkSpec {
    pub from: NiId,
    pub to: NiId,
    pub flit_delay: u64,
    pub credit_delay: u64,
}

/// Owns the shared task graph, every NI, and the links between them, and
/// drives them in lockstep one cycle at a time (spec §5's timing-wheel
/// guarantee: "all NIs' cycle-N happen before any cycle-(N+1)").
pub struct Network {
    pub cfg: NetworkConfig,
    pub graph: TaskGraph,
    pub core_to_ni: BTreeMap<CoreId, NiId>,
    nis: BTreeMap<NiId, Ni>,
    routers: BTreeMap<NiId, Router>,
    flit_links: BTreeMap<(NiId, NiId), NetworkLink>,
    credit_links: BTreeMap<(NiId, NiId), CreditLink>,
    pub sinks: TraceSinks,
    cycle: u64,
}

impl Network {
    pub fn new(
        cfg: NetworkConfig,
        graph: TaskGraph,
        core_to_ni: BTreeMap<CoreId, NiId>,
        nis: BTreeMap<NiId, Ni>,
        links: &[LinkSpec],
        sinks: TraceSinks,
    ) -> Self {
        let mut flit_links = BTreeMap::new();
        let mut credit_links = BTreeMap::new();
        let mut routers = BTreeMap::new();

        for &ni_id in nis.keys() {
            routers.insert(ni_id, Router::new(ni_id.raw()));
        }
        for spec in links {
            flit_links.insert((spec.from, spec.to), NetworkLink::new(spec.flit_delay));
            credit_links.insert((spec.to, spec.from), CreditLink::new(spec.credit_delay));
        }

        Self {
            cfg,
            graph,
            core_to_ni,
            nis,
            routers,
            flit_links,
            credit_links,
            sinks,
            cycle: 0,
        }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Runs every NI through exactly one `wakeup`, in `NiId` order (the
    /// order among NIs within a cycle doesn't affect results since no NI
    /// observes another's same-cycle output until the next cycle, but a
    /// fixed order keeps runs reproducible).
    pub fn step(&mut self) -> NocResult<()> {
        let cycle = self.cycle;
        let ni_ids: Vec<NiId> = self.nis.keys().copied().collect();

        for ni_id in ni_ids {
            let incoming_flit = self
                .flit_links
                .iter_mut()
                .find(|((_, dest), _)| *dest == ni_id)
                .and_then(|(_, link)| link.poll(cycle));
            let incoming_credit = self
                .credit_links
                .iter_mut()
                .find(|((_, dest), _)| *dest == ni_id)
                .and_then(|(_, link)| link.poll(cycle));

            let ni = self.nis.get_mut(&ni_id).expect("ni_ids drawn from self.nis");
            let outputs = ni.wakeup(
                &mut self.graph,
                &self.cfg,
                &self.core_to_ni,
                Inputs {
                    incoming_flit,
                    incoming_credit,
                },
                &mut self.sinks,
                cycle,
            )?;

            if let Some(mut flit) = outputs.outgoing_flit {
                let router = self.routers.get(&ni_id).expect("router built for every ni");
                router.forward(&mut flit.route, &self.cfg)?;
                let dest = flit.route.dest_ni;
                let link = self.flit_links.get_mut(&(ni_id, dest)).ok_or(
                    NocError::InvariantViolated("no flit link configured between these NIs"),
                )?;
                link.send(flit, cycle);
            }

            for credit in outputs.outgoing_credits {
                let link = self
                    .credit_links
                    .get_mut(&(ni_id, credit.origin_ni))
                    .ok_or(NocError::InvariantViolated(
                        "no credit link configured between these NIs",
                    ))?;
                link.send(credit, cycle);
            }

            for update in outputs.posted_updates {
                if let Some(&producer_ni) = self.core_to_ni.get(&update.core_id) {
                    if let Some(producer) = self.nis.get_mut(&producer_ni) {
                        producer.inbox_mut().post(update);
                    }
                }
            }
        }

        self.cycle += 1;
        Ok(())
    }

    pub fn run(&mut self, cycles: u64) -> NocResult<()> {
        for _ in 0..cycles {
            self.step()?;
        }
        Ok(())
    }
}
