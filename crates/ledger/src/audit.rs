//! Audit records for ledger and orchestrator activity.
//!
//! Every applied step is bracketed by a start and a done marker sharing one
//! log id, with one write record per item in between. Orchestrators record
//! registrations and status updates through the same seam.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use common::{StepStatus, WorkflowId};
use serde::Serialize;

use crate::{ItemId, OrderStep, SupplierId};

/// The component that produced an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "component", content = "id")]
pub enum AuditSource {
    Supplier(SupplierId),
    Orchestrator(i64),
}

impl std::fmt::Display for AuditSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditSource::Supplier(id) => write!(f, "supplier-{id}"),
            AuditSource::Orchestrator(id) => write!(f, "orchestrator-{id}"),
        }
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum AuditKind {
    SupplierInit,
    ExecStart {
        log_id: u64,
    },
    Write {
        log_id: u64,
        item_id: ItemId,
        quantity: i64,
    },
    ExecDone {
        log_id: u64,
    },
    OrchestratorInit,
    Register {
        workflow_id: WorkflowId,
        steps: Vec<OrderStep>,
    },
    Update {
        workflow_id: WorkflowId,
        index: usize,
        status: StepStatus,
    },
    Cleared,
}

/// A single timestamped audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub source: AuditSource,
    pub timestamp: DateTime<Utc>,
    pub kind: AuditKind,
}

impl AuditRecord {
    pub fn new(source: AuditSource, kind: AuditKind) -> Self {
        Self {
            source,
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Emits audit records as structured `tracing` events under the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        match &record.kind {
            AuditKind::Write { .. } | AuditKind::Update { .. } => tracing::debug!(
                target: "audit",
                source = %record.source,
                timestamp = %record.timestamp,
                kind = ?record.kind,
                "audit record"
            ),
            _ => tracing::info!(
                target: "audit",
                source = %record.source,
                timestamp = %record.timestamp,
                kind = ?record.kind,
                "audit record"
            ),
        }
    }
}

/// Keeps audit records in memory for inspection in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the kinds of every record so far.
    pub fn kinds(&self) -> Vec<AuditKind> {
        self.records().into_iter().map(|record| record.kind).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}
