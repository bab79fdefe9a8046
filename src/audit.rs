//! Audit records for gate decisions.
//!
//! This module provides:
//! - `AuditEvent`: structured record of one gate step
//! - `AuditSink`: where the gate sends its events
//! - `TracingAudit`: sink emitting events as `tracing` records
//! - `AuditTrail`: in-memory, thread-safe recorder
//!
//! Events carry identifiers and authorization coordinates only. Credentials,
//! certificates and request bodies are never recorded.

mod event;
mod sink;
mod trail;

pub use event::{AuditEvent, AuditEventKind, AuditOutcome};
pub use sink::{AuditSink, TracingAudit, AUDIT_TARGET};
pub use trail::AuditTrail;
