use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::domain::claim::{ClaimId, ClaimStatus};
use crate::domain::user::UserId;
use crate::materializer::DispatchMode;

/// What the notification collaborator gets told. Delivery itself is out
/// of scope; the engine ships a log-only transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    DispatchStarted { claim_id: ClaimId, mode: DispatchMode, request_count: usize },
    ApproverQueued { claim_id: ClaimId, approver_id: UserId, sequence: i64 },
    NextApprover { claim_id: ClaimId, approver_id: UserId },
    ClaimResolved { claim_id: ClaimId, status: ClaimStatus },
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: NotificationEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl InMemoryNotifier {
    pub fn events(&self) -> Vec<NotificationEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for InMemoryNotifier {
    fn notify(&self, event: NotificationEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Drops everything. Useful when a caller opts out of notifications.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: NotificationEvent) {}
}
