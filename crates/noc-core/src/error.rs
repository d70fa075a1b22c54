use crate::ids::{AppIdx, CoreId, EdgeId, TaskId};

/// Fatal and configuration-time errors (spec §7).
///
/// Transient conditions — back-pressure stalls and destination-buffer-full
/// retries — are never represented here; they are encoded as plain `bool`
/// return values and handled by retrying next cycle, exactly as spec §7
/// describes.
#[derive(Debug, thiserror::Error)]
pub enum NocError {
    #[error("unknown core id {core_id}")]
    UnknownCore { core_id: CoreId },

    #[error("core {core_id} has {found} thread slots configured, expected {expected}")]
    ThreadCountMismatch {
        core_id: CoreId,
        expected: usize,
        found: usize,
    },

    #[error("edge {edge_id} has vc_choice {value}, must be in 0..=3")]
    InvalidVcChoice { edge_id: EdgeId, value: u8 },

    #[error("duplicate task id {task_id}")]
    DuplicateTaskId { task_id: TaskId },

    #[error("network deadlock: vnet {vnet} at cycle {cycle}")]
    Deadlock { vnet: u8, cycle: u64 },

    #[error("task {task_id} not found on core {core_id} for application {app_idx}")]
    TaskNotFound {
        core_id: CoreId,
        app_idx: AppIdx,
        task_id: TaskId,
    },

    #[error("edge {edge_id} not found on task {task_id}")]
    EdgeNotFound { task_id: TaskId, edge_id: EdgeId },

    #[error("invariant violated: {0}")]
    InvariantViolated(&'static str),
}

pub type NocResult<T> = Result<T, NocError>;
