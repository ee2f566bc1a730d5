use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::BillingConfig;

use super::billing::BillingEngine;
use super::domain::{
    InvoiceId, ReconciliationCursor, ReconciliationStep, Tenancy, TenancyId, TenancyStatus,
};
use super::repository::{
    emit, ensure_active, require_tenancy, LifecycleEvent, LifecycleStore, NotificationSink,
};
use super::rooms::RoomRegistry;
use super::LifecycleError;

/// Result of a completed termination run.
#[derive(Debug, Clone)]
pub struct TerminationOutcome {
    pub tenancy: Tenancy,
    pub cancelled_invoices: Vec<InvoiceId>,
}

/// Orchestrates the multi-entity cleanup when a tenancy ends:
/// free the room, cancel future invoices, close the contract.
///
/// The saga checkpoints a cursor through the store before moving past
/// each step. A halted run keeps its last-completed step with the
/// cause recorded and is safe to re-invoke; the resume path skips
/// completed steps, so a freed room is never freed twice and every
/// individual step is idempotent besides. The status read reports a
/// cursor carrying an error as `Failed` until a later run clears it.
pub struct ReconciliationCoordinator<S, N> {
    store: Arc<S>,
    rooms: RoomRegistry<S>,
    billing: BillingEngine<S, N>,
    notifications: Arc<N>,
}

impl<S, N> Clone for ReconciliationCoordinator<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            rooms: self.rooms.clone(),
            billing: self.billing.clone(),
            notifications: Arc::clone(&self.notifications),
        }
    }
}

impl<S, N> ReconciliationCoordinator<S, N>
where
    S: LifecycleStore,
    N: NotificationSink,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, billing_config: BillingConfig) -> Self {
        Self {
            rooms: RoomRegistry::new(Arc::clone(&store)),
            billing: BillingEngine::new(
                Arc::clone(&store),
                Arc::clone(&notifications),
                billing_config,
            ),
            store,
            notifications,
        }
    }

    /// Run (or resume) the termination saga for a tenancy. The final
    /// status distinguishes an ordinary end of contract from a
    /// cancellation before move-in.
    pub fn terminate(
        &self,
        tenancy_id: &TenancyId,
        effective_date: NaiveDate,
        reason: &str,
        final_status: TenancyStatus,
    ) -> Result<TerminationOutcome, LifecycleError> {
        let tenancy = require_tenancy(self.store.as_ref(), tenancy_id)?;

        let mut cursor = match self.store.reconciliation_cursor(tenancy_id)? {
            Some(existing) => match existing.step {
                ReconciliationStep::Done => {
                    return Err(LifecycleError::Conflict(format!(
                        "tenancy '{}' is {}",
                        tenancy.id.0,
                        tenancy.status.label()
                    )))
                }
                _ => {
                    info!(
                        tenancy = %tenancy.id.0,
                        step = existing.step.label(),
                        retry = existing.last_error.is_some(),
                        "resuming tenancy termination from last completed step"
                    );
                    existing
                }
            },
            None => {
                ensure_active(&tenancy)?;
                if effective_date < tenancy.start_date {
                    return Err(LifecycleError::InvalidInput(format!(
                        "effective date {effective_date} precedes the tenancy start"
                    )));
                }
                let cursor = ReconciliationCursor {
                    tenancy_id: tenancy.id.clone(),
                    step: ReconciliationStep::Requested,
                    effective_date,
                    reason: reason.to_string(),
                    final_status,
                    last_error: None,
                };
                self.store.save_reconciliation_cursor(cursor.clone())?;
                cursor
            }
        };

        let mut cancelled = Vec::new();
        match self.run_steps(&tenancy, &mut cursor, &mut cancelled) {
            Ok(closed) => Ok(TerminationOutcome {
                tenancy: closed,
                cancelled_invoices: cancelled,
            }),
            Err(err) => {
                cursor.last_error = Some(err.to_string());
                if let Err(save_err) = self.store.save_reconciliation_cursor(cursor.clone()) {
                    warn!(%save_err, "unable to record reconciliation failure state");
                }
                warn!(
                    tenancy = %cursor.tenancy_id.0,
                    step = cursor.step.label(),
                    %err,
                    "tenancy termination halted"
                );
                Err(err)
            }
        }
    }

    /// The externally visible saga state for a tenancy, if any. A
    /// cursor carrying a recorded error reports as `Failed`.
    pub fn status(&self, tenancy_id: &TenancyId) -> Result<Option<ReconciliationStep>, LifecycleError> {
        Ok(self
            .store
            .reconciliation_cursor(tenancy_id)?
            .map(|cursor| cursor.reported_step()))
    }

    fn run_steps(
        &self,
        tenancy: &Tenancy,
        cursor: &mut ReconciliationCursor,
        cancelled: &mut Vec<InvoiceId>,
    ) -> Result<Tenancy, LifecycleError> {
        loop {
            match cursor.step {
                ReconciliationStep::Requested => {
                    self.rooms.set_occupancy(&tenancy.room_id, false)?;
                    self.advance(cursor, ReconciliationStep::RoomFreed)?;
                }
                ReconciliationStep::RoomFreed => {
                    // A contract voided before move-in owes nothing, so
                    // the deposit due on the start date falls as well.
                    *cancelled = if cursor.final_status == TenancyStatus::Cancelled {
                        self.billing.cancel_open_invoices(&tenancy.id)?
                    } else {
                        self.billing
                            .cancel_future_invoices(&tenancy.id, cursor.effective_date)?
                    };
                    self.advance(cursor, ReconciliationStep::InvoicesCancelled)?;
                }
                ReconciliationStep::InvoicesCancelled => {
                    let mut closing = require_tenancy(self.store.as_ref(), &tenancy.id)?;
                    closing.status = cursor.final_status;
                    closing.ended_on = Some(cursor.effective_date);
                    closing.end_reason = Some(cursor.reason.clone());
                    self.store.update_tenancy(closing.clone())?;
                    self.advance(cursor, ReconciliationStep::Done)?;
                    emit(
                        self.notifications.as_ref(),
                        LifecycleEvent::TenancyEnded {
                            tenancy_id: closing.id.clone(),
                            room_id: closing.room_id.clone(),
                            effective_on: cursor.effective_date,
                        },
                    );
                    return Ok(closing);
                }
                ReconciliationStep::Done => {
                    return require_tenancy(self.store.as_ref(), &tenancy.id)
                        .map_err(LifecycleError::from);
                }
                ReconciliationStep::Failed => {
                    // Every step tolerates re-running, so a cursor
                    // parked in the failed state starts over.
                    cursor.step = ReconciliationStep::Requested;
                }
            }
        }
    }

    fn advance(
        &self,
        cursor: &mut ReconciliationCursor,
        step: ReconciliationStep,
    ) -> Result<(), LifecycleError> {
        cursor.step = step;
        cursor.last_error = None;
        self.store.save_reconciliation_cursor(cursor.clone())?;
        info!(
            tenancy = %cursor.tenancy_id.0,
            step = step.label(),
            "reconciliation step committed"
        );
        Ok(())
    }
}
