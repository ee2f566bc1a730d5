use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::BillingConfig;

use super::domain::{
    add_months, ReconciliationStep, RoomId, Tenancy, TenancyId, TenancyStatus, TenantId,
};
use super::reconciliation::{ReconciliationCoordinator, TerminationOutcome};
use super::repository::{emit, LifecycleEvent, LifecycleStore, NotificationSink};
use super::LifecycleError;

static TENANCY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_tenancy_id() -> TenancyId {
    let id = TENANCY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    TenancyId(format!("ten-{id:06}"))
}

/// Attributes for opening a rental contract.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTenancy {
    pub tenant_id: TenantId,
    pub room_id: RoomId,
    pub start_date: NaiveDate,
    pub duration_months: u32,
    pub monthly_rate: u64,
    pub deposit: u64,
}

/// Creates and terminates rental contracts, enforcing the
/// one-active-tenancy-per-room rule through the store's atomic
/// `open_tenancy` commit.
pub struct TenancyLedger<S, N> {
    store: Arc<S>,
    notifications: Arc<N>,
    coordinator: ReconciliationCoordinator<S, N>,
}

impl<S, N> Clone for TenancyLedger<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifications: Arc::clone(&self.notifications),
            coordinator: self.coordinator.clone(),
        }
    }
}

impl<S, N> TenancyLedger<S, N>
where
    S: LifecycleStore,
    N: NotificationSink,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, billing_config: BillingConfig) -> Self {
        Self {
            coordinator: ReconciliationCoordinator::new(
                Arc::clone(&store),
                Arc::clone(&notifications),
                billing_config,
            ),
            store,
            notifications,
        }
    }

    /// Open a contract on an available room. The availability check,
    /// the tenancy insert, and the room flip are one store commit, so
    /// two racing calls on the same room yield exactly one success and
    /// one `Conflict`.
    pub fn create_tenancy(&self, new_tenancy: NewTenancy) -> Result<Tenancy, LifecycleError> {
        if new_tenancy.duration_months == 0 {
            return Err(LifecycleError::InvalidInput(
                "tenancy duration must be at least one month".to_string(),
            ));
        }
        if new_tenancy.monthly_rate == 0 {
            return Err(LifecycleError::InvalidInput(
                "monthly rate must be positive".to_string(),
            ));
        }
        let end_date = add_months(new_tenancy.start_date, new_tenancy.duration_months)
            .ok_or_else(|| {
                LifecycleError::InvalidInput("tenancy end date is out of range".to_string())
            })?;

        let tenancy = Tenancy {
            id: next_tenancy_id(),
            tenant_id: new_tenancy.tenant_id,
            room_id: new_tenancy.room_id,
            start_date: new_tenancy.start_date,
            end_date,
            duration_months: new_tenancy.duration_months,
            monthly_rate: new_tenancy.monthly_rate,
            deposit: new_tenancy.deposit,
            status: TenancyStatus::Active,
            ended_on: None,
            end_reason: None,
        };
        let tenancy = self.store.open_tenancy(tenancy)?;
        emit(
            self.notifications.as_ref(),
            LifecycleEvent::TenancyCreated {
                tenancy_id: tenancy.id.clone(),
                room_id: tenancy.room_id.clone(),
            },
        );
        info!(tenancy = %tenancy.id.0, room = %tenancy.room_id.0, "tenancy opened");
        Ok(tenancy)
    }

    /// Terminate a contract. The reconciliation coordinator frees the
    /// room, cancels future invoices, and closes the tenancy; it is
    /// resumable if a step fails partway.
    pub fn end_tenancy(
        &self,
        tenancy_id: &TenancyId,
        effective_date: NaiveDate,
        reason: &str,
    ) -> Result<TerminationOutcome, LifecycleError> {
        self.coordinator
            .terminate(tenancy_id, effective_date, reason, TenancyStatus::Ended)
    }

    /// Void a contract before move-in. Same reconciliation path as an
    /// ordinary end; the tenancy lands in `Cancelled` instead.
    pub fn cancel_tenancy(
        &self,
        tenancy_id: &TenancyId,
        reason: &str,
    ) -> Result<TerminationOutcome, LifecycleError> {
        let tenancy = self.get_tenancy(tenancy_id)?;
        self.coordinator.terminate(
            tenancy_id,
            tenancy.start_date,
            reason,
            TenancyStatus::Cancelled,
        )
    }

    pub fn get_tenancy(&self, id: &TenancyId) -> Result<Tenancy, LifecycleError> {
        self.store
            .fetch_tenancy(id)?
            .ok_or_else(|| LifecycleError::NotFound(format!("tenancy '{}' not found", id.0)))
    }

    /// Answer "is this room free" from the ledger itself rather than
    /// the cached `Room.status`, guarding against drift.
    pub fn get_active_tenancy_for_room(
        &self,
        room_id: &RoomId,
    ) -> Result<Option<Tenancy>, LifecycleError> {
        Ok(self.store.active_tenancy_for_room(room_id)?)
    }

    /// Contracts held by a tenant, newest first.
    pub fn list_tenancies_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<Tenancy>, LifecycleError> {
        let mut tenancies: Vec<Tenancy> = self
            .store
            .list_tenancies()?
            .into_iter()
            .filter(|tenancy| &tenancy.tenant_id == tenant_id)
            .collect();
        tenancies.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(a.id.cmp(&b.id)));
        Ok(tenancies)
    }

    /// End every active tenancy whose window has lapsed, through the
    /// same termination path as an explicit end so reconciliation never
    /// diverges. Idempotent: an already-ended tenancy is skipped, and a
    /// tenancy that cannot terminate this cycle is logged and left for
    /// the next one rather than aborting the rest of the sweep.
    pub fn sweep_expired(&self, today: NaiveDate) -> Result<Vec<TenancyId>, LifecycleError> {
        let mut ended = Vec::new();
        for tenancy in self.store.list_tenancies()? {
            if tenancy.is_active() && tenancy.end_date < today {
                match self.end_tenancy(&tenancy.id, tenancy.end_date, "contract expired") {
                    Ok(_) => ended.push(tenancy.id),
                    Err(err) => {
                        warn!(tenancy = %tenancy.id.0, %err, "expiry sweep left tenancy open")
                    }
                }
            }
        }
        Ok(ended)
    }

    /// The termination saga state for a tenancy, if one was requested.
    pub fn reconciliation_status(
        &self,
        tenancy_id: &TenancyId,
    ) -> Result<Option<ReconciliationStep>, LifecycleError> {
        self.coordinator.status(tenancy_id)
    }
}
