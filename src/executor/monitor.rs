use std::time::Duration;

use crate::planner::ExecutionGroup;

/// Samples the memory a running group is using.
pub trait ResourceMonitor: Send + Sync + 'static {
    fn observed_bytes(&self, group: &ExecutionGroup, elapsed: Duration) -> u64;
}

/// Reports the planner's estimate as the observed usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimateMonitor;

impl ResourceMonitor for EstimateMonitor {
    fn observed_bytes(&self, group: &ExecutionGroup, _elapsed: Duration) -> u64 {
        group.estimated_memory_bytes
    }
}
