//! Audit sinks.

use super::{AuditEvent, AuditTrail};

/// Target under which [`TracingAudit`] emits events.
pub const AUDIT_TARGET: &str = "access_gate::audit";

/// Receives the gate's audit events.
///
/// Sinks are shared across concurrent requests and must not block for long;
/// [`record`](AuditSink::record) is called inline on the request path.
pub trait AuditSink: Send + Sync {
    /// Records a single event.
    fn record(&self, event: &AuditEvent);
}

/// Emits audit events as structured `tracing` records.
///
/// This is the default sink of [`AccessGate`](crate::AccessGate).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, event: &AuditEvent) {
        tracing::info!(
            target: AUDIT_TARGET,
            request_id = %event.request_id(),
            user = ?event.user(),
            kind = %event.kind(),
            outcome = %event.outcome(),
            verb = ?event.verb(),
            resource = ?event.resource(),
            subresource = ?event.subresource(),
            path = ?event.path(),
            query_count = ?event.query_count(),
            reason = ?event.reason(),
            "audit event"
        );
    }
}

impl AuditSink for AuditTrail {
    fn record(&self, event: &AuditEvent) {
        AuditTrail::record(self, event.clone());
    }
}
