use thiserror::Error;

/// Reasons a running group leaves the `Running` state without completing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("group {group_id} failed in the backend: {detail}")]
    Backend { group_id: String, detail: String },

    #[error("group {group_id} used {observed_bytes} bytes, above the {limit_bytes} byte pressure limit")]
    ResourcePressure { group_id: String, observed_bytes: u64, limit_bytes: u64 },

    #[error("group {group_id} ran for {elapsed_millis} ms, past the wall-clock ceiling")]
    WallClockExceeded { group_id: String, elapsed_millis: u64 },

    #[error("group {group_id} has no fallback left: {cause}")]
    FallbackExhausted { group_id: String, cause: String },

    #[error("execution cancelled before the group was admitted")]
    Cancelled,
}

impl ExecutionError {
    /// Failures that switch a merged group to its fallback.
    pub fn triggers_fallback(&self) -> bool {
        matches!(
            self,
            Self::Backend { .. } | Self::ResourcePressure { .. } | Self::WallClockExceeded { .. }
        )
    }
}
