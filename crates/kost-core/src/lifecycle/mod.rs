//! Tenancy/billing lifecycle: room inventory, rental contracts,
//! recurring invoices, maintenance ticketing, and the reconciliation
//! saga that keeps them consistent when a contract ends.

pub mod billing;
pub mod domain;
pub mod maintenance;
pub mod reconciliation;
pub mod repository;
pub mod rooms;
pub mod router;
pub mod tenancy;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::config::BillingConfig;

pub use billing::BillingEngine;
pub use domain::{
    BillingPeriod, Invoice, InvoiceId, InvoiceKind, InvoiceStatus, MaintenanceReport,
    PeriodParseError, ReconciliationCursor, ReconciliationStep, ReportId, ReportPriority,
    ReportStatus, Room, RoomId, RoomStatus, Tenancy, TenancyId, TenancyStatus, TenantId,
};
pub use maintenance::{MaintenanceDesk, NewReport};
pub use reconciliation::{ReconciliationCoordinator, TerminationOutcome};
pub use repository::{
    InMemoryStore, LifecycleEvent, LifecycleStore, NotificationSink, NotifyError, RecordingSink,
    StoreError,
};
pub use rooms::{NewRoom, RoomFilter, RoomRegistry};
pub use router::{lifecycle_router, CallerIdentity, CallerRole};
pub use tenancy::{NewTenancy, TenancyLedger};

/// Failure taxonomy shared by every lifecycle operation. The API layer
/// maps each variant to a response status; persistence internals never
/// leak past `Unavailable`.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("{0}")]
    Unavailable(String),
}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::NotFound(message) => Self::NotFound(message),
            StoreError::Unavailable(message) => Self::Unavailable(message),
        }
    }
}

impl From<PeriodParseError> for LifecycleError {
    fn from(value: PeriodParseError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

/// The assembled lifecycle services over one store and one
/// notification sink; the unit the router and the sweeps run against.
pub struct LifecycleServices<S, N> {
    pub rooms: RoomRegistry<S>,
    pub tenancies: TenancyLedger<S, N>,
    pub billing: BillingEngine<S, N>,
    pub maintenance: MaintenanceDesk<S, N>,
}

impl<S, N> Clone for LifecycleServices<S, N> {
    fn clone(&self) -> Self {
        Self {
            rooms: self.rooms.clone(),
            tenancies: self.tenancies.clone(),
            billing: self.billing.clone(),
            maintenance: self.maintenance.clone(),
        }
    }
}

impl<S, N> LifecycleServices<S, N>
where
    S: LifecycleStore,
    N: NotificationSink,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, billing_config: BillingConfig) -> Self {
        Self {
            rooms: RoomRegistry::new(Arc::clone(&store)),
            tenancies: TenancyLedger::new(
                Arc::clone(&store),
                Arc::clone(&notifications),
                billing_config,
            ),
            billing: BillingEngine::new(
                Arc::clone(&store),
                Arc::clone(&notifications),
                billing_config,
            ),
            maintenance: MaintenanceDesk::new(store, notifications),
        }
    }
}
