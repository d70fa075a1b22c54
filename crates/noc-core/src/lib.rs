//! Shared data model, configuration, and errors for the task-graph NoC
//! simulator. `noc-engine` builds the per-cycle algorithms on top of these
//! types; `noc-fabric` wires them to a concrete multi-NI network.

pub mod config;
pub mod error;
pub mod flit;
pub mod ids;
pub mod inbox;
pub mod prng;
pub mod topology;
pub mod trace;
pub mod vc_policy;

pub use config::NetworkConfig;
pub use error::{NocError, NocResult};
pub use flit::{Credit, Flit, FlitType, OutVcState, RouteInfo, TgInfo, VcLifecycle};
pub use ids::{AppIdx, CoreId, EdgeId, NiId, TaskId, HEAD_TASK_ID};
pub use inbox::{InMemoryUpdate, Inbox};
pub use prng::{Distribution, TaskRng};
pub use topology::{GraphEdge, GraphTask, SlotOccupant, TaskGraph, ThreadPool, ThreadSlot};
pub use trace::{NullTraceSink, Stream, TraceSink, TraceSinks, VecTraceSink, WriterTraceSink};
