use claimflow_core::audit::{AuditEvent, AuditSink};
use claimflow_core::notify::{NotificationEvent, Notifier};

/// Log-only notification transport. Real delivery (mail, chat) is a
/// collaborator this system deliberately does not own.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: NotificationEvent) {
        match event {
            NotificationEvent::DispatchStarted { claim_id, mode, request_count } => {
                tracing::info!(
                    event_name = "notify.dispatch_started",
                    claim_id = %claim_id.0,
                    mode = ?mode,
                    request_count,
                    "approval requests dispatched"
                );
            }
            NotificationEvent::ApproverQueued { claim_id, approver_id, sequence } => {
                tracing::info!(
                    event_name = "notify.approver_queued",
                    claim_id = %claim_id.0,
                    approver_id = %approver_id.0,
                    sequence,
                    "approver has a pending request"
                );
            }
            NotificationEvent::NextApprover { claim_id, approver_id } => {
                tracing::info!(
                    event_name = "notify.next_approver",
                    claim_id = %claim_id.0,
                    approver_id = %approver_id.0,
                    "sequential workflow advanced"
                );
            }
            NotificationEvent::ClaimResolved { claim_id, status } => {
                tracing::info!(
                    event_name = "notify.claim_resolved",
                    claim_id = %claim_id.0,
                    status = ?status,
                    "claim reached a terminal status"
                );
            }
        }
    }
}

/// Audit sink backed by the tracing pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        tracing::info!(
            event_name = %event.event_type,
            claim_id = event.claim_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
            correlation_id = %event.correlation_id,
            actor = %event.actor,
            category = ?event.category,
            outcome = ?event.outcome,
            metadata = ?event.metadata,
            "audit event"
        );
    }
}
