use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use super::domain::{
    Invoice, InvoiceId, InvoiceKind, InvoiceStatus, MaintenanceReport, ReconciliationCursor,
    ReportId, Room, RoomId, RoomStatus, Tenancy, TenancyId, TenancyStatus,
};

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction over rooms, tenancies, invoices, reports, and
/// reconciliation cursors.
///
/// Every method is a single serializable commit. `open_tenancy` is the
/// one multi-entity write the occupancy invariant depends on: the
/// availability check, the tenancy insert, and the room flip happen in
/// one commit, so two racing callers get exactly one success and one
/// `Conflict`. Invoice uniqueness on (tenancy, period) and
/// (tenancy, deposit) is likewise enforced here, not by the services.
pub trait LifecycleStore: Send + Sync {
    fn insert_room(&self, room: Room) -> Result<Room, StoreError>;
    fn fetch_room(&self, id: &RoomId) -> Result<Option<Room>, StoreError>;
    fn list_rooms(&self) -> Result<Vec<Room>, StoreError>;
    fn update_room(&self, room: Room) -> Result<(), StoreError>;

    /// Atomically verify the room is available and unclaimed, insert
    /// the tenancy as active, and flip the room to occupied.
    fn open_tenancy(&self, tenancy: Tenancy) -> Result<Tenancy, StoreError>;
    fn fetch_tenancy(&self, id: &TenancyId) -> Result<Option<Tenancy>, StoreError>;
    fn list_tenancies(&self) -> Result<Vec<Tenancy>, StoreError>;
    fn update_tenancy(&self, tenancy: Tenancy) -> Result<(), StoreError>;
    fn active_tenancy_for_room(&self, room: &RoomId) -> Result<Option<Tenancy>, StoreError>;

    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, StoreError>;
    fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, StoreError>;
    fn invoices_for_tenancy(&self, tenancy: &TenancyId) -> Result<Vec<Invoice>, StoreError>;
    fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError>;
    fn update_invoice(&self, invoice: Invoice) -> Result<(), StoreError>;

    fn insert_report(&self, report: MaintenanceReport) -> Result<MaintenanceReport, StoreError>;
    fn fetch_report(&self, id: &ReportId) -> Result<Option<MaintenanceReport>, StoreError>;
    fn reports_for_room(&self, room: &RoomId) -> Result<Vec<MaintenanceReport>, StoreError>;
    fn update_report(&self, report: MaintenanceReport) -> Result<(), StoreError>;

    fn reconciliation_cursor(
        &self,
        tenancy: &TenancyId,
    ) -> Result<Option<ReconciliationCursor>, StoreError>;
    fn save_reconciliation_cursor(&self, cursor: ReconciliationCursor) -> Result<(), StoreError>;
}

/// Events published to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum LifecycleEvent {
    TenancyCreated {
        tenancy_id: TenancyId,
        room_id: RoomId,
    },
    TenancyEnded {
        tenancy_id: TenancyId,
        room_id: RoomId,
        effective_on: NaiveDate,
    },
    InvoiceCreated {
        invoice_id: InvoiceId,
        tenancy_id: TenancyId,
        amount: u64,
        due_date: NaiveDate,
    },
    InvoicePaid {
        invoice_id: InvoiceId,
        payment_reference: String,
    },
    ReportStatusChanged {
        report_id: ReportId,
        status: &'static str,
    },
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Fire-and-forget sink for lifecycle events. Delivery failures must
/// never fail the operation that produced the event.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: LifecycleEvent) -> Result<(), NotifyError>;
}

/// Publish an event, demoting sink failures to a warning.
pub(crate) fn emit<N: NotificationSink>(sink: &N, event: LifecycleEvent) {
    if let Err(err) = sink.notify(event) {
        warn!(%err, "notification sink rejected lifecycle event");
    }
}

/// Uniqueness key among non-cancelled invoices. Rent invoices are keyed
/// by period, deposits by kind (one per tenancy); other charges carry
/// no constraint.
fn billing_key(invoice: &Invoice) -> Option<(TenancyId, String)> {
    if invoice.status == InvoiceStatus::Cancelled {
        return None;
    }
    match invoice.kind {
        InvoiceKind::MonthlyRent => invoice
            .period
            .map(|period| (invoice.tenancy_id.clone(), period.to_string())),
        InvoiceKind::Deposit => Some((invoice.tenancy_id.clone(), "deposit".to_string())),
        InvoiceKind::OtherCharge => None,
    }
}

#[derive(Default)]
struct Tables {
    rooms: BTreeMap<RoomId, Room>,
    tenancies: BTreeMap<TenancyId, Tenancy>,
    invoices: BTreeMap<InvoiceId, Invoice>,
    billing_keys: BTreeSet<(TenancyId, String)>,
    reports: BTreeMap<ReportId, MaintenanceReport>,
    cursors: BTreeMap<TenancyId, ReconciliationCursor>,
}

/// Mutex-backed store. One lock over all tables is the transactional
/// boundary: each trait call observes and mutates a consistent
/// snapshot, which gives every trait call serializable semantics.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Tables>,
}

impl InMemoryStore {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl LifecycleStore for InMemoryStore {
    fn insert_room(&self, room: Room) -> Result<Room, StoreError> {
        let mut tables = self.lock()?;
        if tables.rooms.contains_key(&room.id) {
            return Err(StoreError::Conflict(format!(
                "room '{}' already exists",
                room.id.0
            )));
        }
        if tables.rooms.values().any(|other| other.number == room.number) {
            return Err(StoreError::Conflict(format!(
                "room number '{}' already registered",
                room.number
            )));
        }
        tables.rooms.insert(room.id.clone(), room.clone());
        Ok(room)
    }

    fn fetch_room(&self, id: &RoomId) -> Result<Option<Room>, StoreError> {
        Ok(self.lock()?.rooms.get(id).cloned())
    }

    fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        Ok(self.lock()?.rooms.values().cloned().collect())
    }

    fn update_room(&self, room: Room) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        if !tables.rooms.contains_key(&room.id) {
            return Err(StoreError::NotFound(format!("room '{}' not found", room.id.0)));
        }
        tables.rooms.insert(room.id.clone(), room);
        Ok(())
    }

    fn open_tenancy(&self, tenancy: Tenancy) -> Result<Tenancy, StoreError> {
        let mut tables = self.lock()?;
        let room = tables.rooms.get(&tenancy.room_id).cloned().ok_or_else(|| {
            StoreError::NotFound(format!("room '{}' not found", tenancy.room_id.0))
        })?;
        if room.status == RoomStatus::Occupied {
            return Err(StoreError::Conflict(format!(
                "room '{}' is occupied",
                room.number
            )));
        }
        let already_claimed = tables
            .tenancies
            .values()
            .any(|existing| existing.room_id == tenancy.room_id && existing.is_active());
        if already_claimed {
            return Err(StoreError::Conflict(format!(
                "room '{}' already has an active tenancy",
                room.number
            )));
        }

        let mut room = room;
        room.status = RoomStatus::Occupied;
        tables.rooms.insert(room.id.clone(), room);
        tables.tenancies.insert(tenancy.id.clone(), tenancy.clone());
        Ok(tenancy)
    }

    fn fetch_tenancy(&self, id: &TenancyId) -> Result<Option<Tenancy>, StoreError> {
        Ok(self.lock()?.tenancies.get(id).cloned())
    }

    fn list_tenancies(&self) -> Result<Vec<Tenancy>, StoreError> {
        Ok(self.lock()?.tenancies.values().cloned().collect())
    }

    fn update_tenancy(&self, tenancy: Tenancy) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        if !tables.tenancies.contains_key(&tenancy.id) {
            return Err(StoreError::NotFound(format!(
                "tenancy '{}' not found",
                tenancy.id.0
            )));
        }
        tables.tenancies.insert(tenancy.id.clone(), tenancy);
        Ok(())
    }

    fn active_tenancy_for_room(&self, room: &RoomId) -> Result<Option<Tenancy>, StoreError> {
        Ok(self
            .lock()?
            .tenancies
            .values()
            .find(|tenancy| &tenancy.room_id == room && tenancy.is_active())
            .cloned())
    }

    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, StoreError> {
        let mut tables = self.lock()?;
        if tables.invoices.contains_key(&invoice.id) {
            return Err(StoreError::Conflict(format!(
                "invoice '{}' already exists",
                invoice.id.0
            )));
        }
        if let Some(key) = billing_key(&invoice) {
            if tables.billing_keys.contains(&key) {
                return Err(StoreError::Conflict(format!(
                    "tenancy '{}' already billed for {}",
                    key.0 .0, key.1
                )));
            }
            tables.billing_keys.insert(key);
        }
        tables.invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(invoice)
    }

    fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, StoreError> {
        Ok(self.lock()?.invoices.get(id).cloned())
    }

    fn invoices_for_tenancy(&self, tenancy: &TenancyId) -> Result<Vec<Invoice>, StoreError> {
        Ok(self
            .lock()?
            .invoices
            .values()
            .filter(|invoice| &invoice.tenancy_id == tenancy)
            .cloned()
            .collect())
    }

    fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        Ok(self.lock()?.invoices.values().cloned().collect())
    }

    fn update_invoice(&self, invoice: Invoice) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        let previous = tables.invoices.get(&invoice.id).cloned().ok_or_else(|| {
            StoreError::NotFound(format!("invoice '{}' not found", invoice.id.0))
        })?;
        // Cancelling an invoice releases its uniqueness key, so the
        // period can be billed again after a correction.
        if let Some(old_key) = billing_key(&previous) {
            if billing_key(&invoice).as_ref() != Some(&old_key) {
                tables.billing_keys.remove(&old_key);
            }
        }
        if let Some(new_key) = billing_key(&invoice) {
            tables.billing_keys.insert(new_key);
        }
        tables.invoices.insert(invoice.id.clone(), invoice);
        Ok(())
    }

    fn insert_report(&self, report: MaintenanceReport) -> Result<MaintenanceReport, StoreError> {
        let mut tables = self.lock()?;
        if tables.reports.contains_key(&report.id) {
            return Err(StoreError::Conflict(format!(
                "report '{}' already exists",
                report.id.0
            )));
        }
        tables.reports.insert(report.id.clone(), report.clone());
        Ok(report)
    }

    fn fetch_report(&self, id: &ReportId) -> Result<Option<MaintenanceReport>, StoreError> {
        Ok(self.lock()?.reports.get(id).cloned())
    }

    fn reports_for_room(&self, room: &RoomId) -> Result<Vec<MaintenanceReport>, StoreError> {
        Ok(self
            .lock()?
            .reports
            .values()
            .filter(|report| &report.room_id == room)
            .cloned()
            .collect())
    }

    fn update_report(&self, report: MaintenanceReport) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        if !tables.reports.contains_key(&report.id) {
            return Err(StoreError::NotFound(format!(
                "report '{}' not found",
                report.id.0
            )));
        }
        tables.reports.insert(report.id.clone(), report);
        Ok(())
    }

    fn reconciliation_cursor(
        &self,
        tenancy: &TenancyId,
    ) -> Result<Option<ReconciliationCursor>, StoreError> {
        Ok(self.lock()?.cursors.get(tenancy).cloned())
    }

    fn save_reconciliation_cursor(&self, cursor: ReconciliationCursor) -> Result<(), StoreError> {
        self.lock()?
            .cursors
            .insert(cursor.tenancy_id.clone(), cursor);
        Ok(())
    }
}

/// Sink that records events in memory; the default wiring for the api
/// service until a real notification collaborator is attached.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: LifecycleEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .map_err(|_| NotifyError::Transport("sink mutex poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}

/// Unchecked tenancy lookup used across the service layer: absence is a
/// `NotFound` store error with a uniform message.
pub(crate) fn require_tenancy<S: LifecycleStore>(
    store: &S,
    id: &TenancyId,
) -> Result<Tenancy, StoreError> {
    store
        .fetch_tenancy(id)?
        .ok_or_else(|| StoreError::NotFound(format!("tenancy '{}' not found", id.0)))
}

/// Marker helper kept close to the store: a tenancy that has left the
/// active state can no longer accept invoices or terminations.
pub(crate) fn ensure_active(tenancy: &Tenancy) -> Result<(), StoreError> {
    if tenancy.status == TenancyStatus::Active {
        Ok(())
    } else {
        Err(StoreError::Conflict(format!(
            "tenancy '{}' is {}",
            tenancy.id.0,
            tenancy.status.label()
        )))
    }
}
