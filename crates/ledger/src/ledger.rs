//! Cumulative ordered quantities per item for one supplier.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::audit::{AuditKind, AuditRecord, AuditSink, AuditSource, TracingAuditSink};
use crate::error::{LedgerError, Result};
use crate::lock_table::KeyedLockTable;
use crate::{ItemId, ItemQuantity, OrderStep, SupplierId};

/// The inventory ledger of a single supplier.
///
/// Each item's committed quantity lives behind its own lock in a
/// [`KeyedLockTable`]. An entry holding `None` has been created by a step that
/// is still being applied and is not yet visible to readers.
///
/// Steps touching disjoint items proceed in parallel; steps sharing an item
/// serialize on that item only. Readers never observe a partially applied
/// step.
pub struct Ledger {
    supplier_id: SupplierId,
    entries: KeyedLockTable<ItemId, Option<i64>>,
    next_log_id: AtomicU64,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("supplier_id", &self.supplier_id)
            .field("items", &self.entries.len())
            .field("next_log_id", &self.next_log_id)
            .finish()
    }
}

impl Ledger {
    /// Creates an empty ledger that audits through `tracing`.
    pub fn new(supplier_id: SupplierId) -> Self {
        Self::with_audit(supplier_id, Arc::new(TracingAuditSink))
    }

    /// Creates an empty ledger with a custom audit sink.
    pub fn with_audit(supplier_id: SupplierId, audit: Arc<dyn AuditSink>) -> Self {
        let ledger = Self {
            supplier_id,
            entries: KeyedLockTable::new(),
            next_log_id: AtomicU64::new(0),
            audit,
        };
        ledger.audit(AuditKind::SupplierInit);
        ledger
    }

    /// Returns the id of the supplier owning this ledger.
    pub fn supplier_id(&self) -> SupplierId {
        self.supplier_id
    }

    /// Returns the log id the next applied step will receive.
    pub fn log_position(&self) -> u64 {
        self.next_log_id.load(Ordering::SeqCst)
    }

    fn audit(&self, kind: AuditKind) {
        self.audit
            .record(AuditRecord::new(AuditSource::Supplier(self.supplier_id), kind));
    }

    fn invalid(&self, reason: impl Into<String>) -> LedgerError {
        LedgerError::Validation {
            supplier_id: self.supplier_id,
            reason: reason.into(),
        }
    }

    /// Checks the step and sums its quantities per item.
    fn validate(&self, step: &OrderStep) -> Result<BTreeMap<ItemId, i64>> {
        if step.supplier_id != self.supplier_id {
            return Err(self.invalid(format!(
                "order step is addressed to supplier {}",
                step.supplier_id
            )));
        }
        if step.items.is_empty() {
            return Err(self.invalid("order step cannot contain an empty list of items"));
        }

        let mut deltas = BTreeMap::new();
        for item in &step.items {
            if item.quantity < 1 {
                return Err(self.invalid(format!(
                    "cannot order a non-positive amount ({}) of item {}",
                    item.quantity, item.item_id
                )));
            }
            let delta: &mut i64 = deltas.entry(item.item_id).or_default();
            *delta = delta
                .checked_add(item.quantity)
                .ok_or_else(|| self.invalid(format!("quantity of item {} overflows", item.item_id)))?;
        }
        Ok(deltas)
    }

    /// Applies every item of `step` atomically.
    ///
    /// Either all of the step's contributions become visible or, on a
    /// validation error, none do.
    #[tracing::instrument(skip(self, step), fields(supplier_id = %self.supplier_id, items = step.items.len()))]
    pub async fn apply_step(&self, step: &OrderStep) -> Result<()> {
        let outcome = match self.validate(step) {
            Ok(deltas) => self.commit(deltas).await,
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(log_id) => {
                metrics::counter!("ledger_steps_applied_total").increment(1);
                tracing::debug!(log_id, "order step applied");
            }
            Err(e) => {
                metrics::counter!("ledger_steps_rejected_total").increment(1);
                tracing::debug!(error = %e, "order step rejected");
            }
        }
        outcome.map(|_| ())
    }

    /// Write-locks every item in `deltas` and publishes the new totals,
    /// returning the log id of the step.
    async fn commit(&self, deltas: BTreeMap<ItemId, i64>) -> Result<u64> {
        let item_ids: Vec<ItemId> = deltas.keys().copied().collect();
        let mut locked = self.entries.ensure_write_many(&item_ids).await;

        // Build the complete post-image before publishing any of it.
        let mut post_image = Vec::with_capacity(deltas.len());
        for (item_id, delta) in &deltas {
            let committed = locked.get(item_id).copied().flatten().unwrap_or(0);
            match committed.checked_add(*delta) {
                Some(updated) => post_image.push((*item_id, updated)),
                None => {
                    locked.release();
                    // Drop the placeholders this step created, unless another
                    // step is already waiting on them.
                    for id in &item_ids {
                        self.entries.remove_if(id, Option::is_none);
                    }
                    return Err(self.invalid(format!(
                        "cumulative quantity of item {item_id} overflows"
                    )));
                }
            }
        }

        let log_id = self.next_log_id.fetch_add(1, Ordering::SeqCst);
        self.audit(AuditKind::ExecStart { log_id });
        for (item_id, updated) in post_image {
            if let Some(slot) = locked.get_mut(&item_id) {
                *slot = Some(updated);
            }
            self.audit(AuditKind::Write {
                log_id,
                item_id,
                quantity: deltas[&item_id],
            });
        }
        self.audit(AuditKind::ExecDone { log_id });
        locked.release();
        Ok(log_id)
    }

    /// Returns the cumulative ordered quantity of each requested item, in the
    /// requested order.
    ///
    /// Fails with [`LedgerError::UnknownItem`] naming the first item that has
    /// never been ordered; nothing is locked in that case.
    #[tracing::instrument(skip(self, item_ids), fields(supplier_id = %self.supplier_id, items = item_ids.len()))]
    pub async fn get_quantities(&self, item_ids: &[ItemId]) -> Result<Vec<ItemQuantity>> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(&item_id) = item_ids.iter().find(|id| !self.entries.contains(id)) {
            return Err(self.unknown_item(item_id));
        }

        let locked = self.entries.read_many(item_ids).await?;
        let mut quantities = Vec::with_capacity(item_ids.len());
        for &item_id in item_ids {
            match locked.get(&item_id).copied().flatten() {
                Some(quantity) => quantities.push(ItemQuantity { item_id, quantity }),
                None => return Err(self.unknown_item(item_id)),
            }
        }
        locked.release();
        Ok(quantities)
    }

    fn unknown_item(&self, item_id: ItemId) -> LedgerError {
        LedgerError::UnknownItem {
            supplier_id: self.supplier_id,
            item_id,
        }
    }

    /// Forgets every committed quantity and restarts the log ids.
    ///
    /// Only for tests and resets: the ledger must be quiescent, with no
    /// `apply_step` or `get_quantities` in flight.
    pub fn clear(&self) {
        self.entries.clear();
        self.next_log_id.store(0, Ordering::SeqCst);
        self.audit(AuditKind::Cleared);
        tracing::info!(supplier_id = %self.supplier_id, "ledger cleared");
    }
}
