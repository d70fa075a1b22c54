//! Per-cycle Network Interface engine: the thread-slot scheduler,
//! execution advance, token-to-flit generator, egress arbiter, ingress
//! handler, entrance injector, and deadlock watchdog that together
//! implement one NI's `wakeup` (spec §2, §4).

pub mod egress;
pub mod entrance;
pub mod execution;
pub mod generator;
pub mod ingress;
pub mod ni;
pub mod scheduler;
pub mod watchdog;

pub use egress::{CrossbarLane, Delivery, EgressState};
pub use entrance::{BackPressure, EntranceIndex, GraphBackPressure, NoBackPressure, RatioTokens};
pub use execution::CompletedTask;
pub use generator::GeneratorBufferEntry;
pub use ingress::{IngressState, PendingCommit};
pub use ni::{EntranceState, Inputs, Ni, Outputs};
pub use scheduler::{CoreIndex, SchedulerRr, StartedTask};
