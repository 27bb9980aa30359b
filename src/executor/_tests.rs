#[cfg(test)]
pub mod fixtures {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    use serde_json::{json, Map, Value};

    use crate::{
        executor::{BackendError, ExecutionBackend, MemoryBackend, ResourceMonitor, ResultHandle},
        planner::ExecutionGroup,
    };

    pub fn orders() -> Value {
        json!({
            "orders": [
                { "id": 1, "status": "active", "amount": 120.0, "region": "north" },
                { "id": 2, "status": "closed", "amount": 35.5,  "region": "south" },
                { "id": 3, "status": "active", "amount": null,  "region": "south" },
                { "id": 4, "status": "pending", "amount": 80.0, "region": "east"  }
            ]
        })
    }

    pub fn orders_backend() -> MemoryBackend {
        MemoryBackend::from_json(orders()).expect("Failed to load orders")
    }

    /// Backend that answers every statement with the same rows, after an
    /// optional delay, and fails statements containing a marker.
    #[derive(Clone, Default)]
    pub struct ScriptedBackend {
        failing: Vec<String>,
        delay: Duration,
        log: Arc<Mutex<Vec<String>>>,
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl ScriptedBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(mut self, marker: &str) -> Self {
            self.failing.push(marker.to_string());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Statements in the order they started.
        pub fn log(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.log)
        }

        /// Highest number of statements observed in flight at once.
        pub fn peak(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.peak)
        }

        fn rows() -> Vec<Map<String, Value>> {
            vec![json!({ "a": 1 }), json!({ "a": 2 })]
                .into_iter()
                .filter_map(|row| row.as_object().cloned())
                .collect()
        }
    }

    impl ExecutionBackend for ScriptedBackend {
        async fn execute(&self, sql: &str) -> Result<ResultHandle, BackendError> {
            self.log.lock().expect("Failed to lock log").push(sql.to_string());
            let in_flight = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(in_flight, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.current.fetch_sub(1, Ordering::SeqCst);

            if self.failing.iter().any(|marker| sql.contains(marker.as_str())) {
                return Err(BackendError::new(format!("scripted failure for: {sql}")));
            }
            Ok(ResultHandle::from_rows(vec!["a".to_string()], Self::rows()))
        }
    }

    /// Reports fixed usage per group strategy.
    pub struct FixedMonitor {
        pub consolidated_bytes: u64,
        pub individual_bytes: u64,
    }

    impl ResourceMonitor for FixedMonitor {
        fn observed_bytes(&self, group: &ExecutionGroup, _elapsed: Duration) -> u64 {
            if group.is_consolidated() {
                self.consolidated_bytes
            } else {
                self.individual_bytes
            }
        }
    }
}
