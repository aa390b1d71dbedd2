use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use claimflow_core::domain::claim::ClaimId;

/// Per-claim serialization point. Decisions and materialization for one
/// claim run under its mutex so the completion evaluator always sees a
/// consistent request snapshot; different claims proceed independently.
#[derive(Clone, Default)]
pub struct ClaimLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ClaimLocks {
    pub fn for_claim(&self, claim_id: &ClaimId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.inner.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(claim_id.0.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
