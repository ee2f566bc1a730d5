use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::BillingConfig;
use crate::lifecycle::domain::{
    Invoice, InvoiceId, MaintenanceReport, ReconciliationCursor, ReportId, Room, RoomId,
    RoomStatus, Tenancy, TenancyId, TenantId,
};
use crate::lifecycle::repository::{
    InMemoryStore, LifecycleStore, RecordingSink, StoreError,
};
use crate::lifecycle::rooms::NewRoom;
use crate::lifecycle::tenancy::NewTenancy;
use crate::lifecycle::LifecycleServices;

pub(super) type Services<S = InMemoryStore> = LifecycleServices<S, RecordingSink>;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn billing_config() -> BillingConfig {
    BillingConfig {
        due_day: 5,
        sweep_interval_secs: 3600,
    }
}

pub(super) fn services() -> (Arc<InMemoryStore>, Arc<RecordingSink>, Services) {
    let store = Arc::new(InMemoryStore::default());
    let sink = Arc::new(RecordingSink::default());
    let services = LifecycleServices::new(store.clone(), sink.clone(), billing_config());
    (store, sink, services)
}

pub(super) fn standard_room<S: LifecycleStore>(services: &Services<S>, number: &str) -> Room {
    services
        .rooms
        .register_room(NewRoom {
            number: number.to_string(),
            category: "standard".to_string(),
            monthly_rate: 1_500_000,
            floor: 1,
            capacity: 1,
        })
        .expect("room registers")
}

pub(super) fn new_tenancy(room_id: &RoomId) -> NewTenancy {
    NewTenancy {
        tenant_id: TenantId("tenant-budi".to_string()),
        room_id: room_id.clone(),
        start_date: date(2024, 1, 1),
        duration_months: 12,
        monthly_rate: 1_500_000,
        deposit: 3_000_000,
    }
}

pub(super) fn active_tenancy<S: LifecycleStore>(
    services: &Services<S>,
    room_id: &RoomId,
) -> Tenancy {
    services
        .tenancies
        .create_tenancy(new_tenancy(room_id))
        .expect("tenancy opens")
}

/// Store wrapper that can fail the next invoice or tenancy update, for
/// exercising the coordinator's resume path. Also counts how many
/// times a room is written back as available, so tests can assert a
/// freed room is never freed again.
#[derive(Default)]
pub(super) struct FlakyStore {
    inner: InMemoryStore,
    fail_next_invoice_update: AtomicBool,
    fail_next_tenancy_update: AtomicBool,
    room_frees: AtomicU64,
}

impl FlakyStore {
    pub(super) fn fail_next_invoice_update(&self) {
        self.fail_next_invoice_update.store(true, Ordering::SeqCst);
    }

    pub(super) fn fail_next_tenancy_update(&self) {
        self.fail_next_tenancy_update.store(true, Ordering::SeqCst);
    }

    pub(super) fn room_frees(&self) -> u64 {
        self.room_frees.load(Ordering::SeqCst)
    }
}

impl LifecycleStore for FlakyStore {
    fn insert_room(&self, room: Room) -> Result<Room, StoreError> {
        self.inner.insert_room(room)
    }

    fn fetch_room(&self, id: &RoomId) -> Result<Option<Room>, StoreError> {
        self.inner.fetch_room(id)
    }

    fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        self.inner.list_rooms()
    }

    fn update_room(&self, room: Room) -> Result<(), StoreError> {
        if room.status == RoomStatus::Available {
            self.room_frees.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.update_room(room)
    }

    fn open_tenancy(&self, tenancy: Tenancy) -> Result<Tenancy, StoreError> {
        self.inner.open_tenancy(tenancy)
    }

    fn fetch_tenancy(&self, id: &TenancyId) -> Result<Option<Tenancy>, StoreError> {
        self.inner.fetch_tenancy(id)
    }

    fn list_tenancies(&self) -> Result<Vec<Tenancy>, StoreError> {
        self.inner.list_tenancies()
    }

    fn update_tenancy(&self, tenancy: Tenancy) -> Result<(), StoreError> {
        if self.fail_next_tenancy_update.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected tenancy write failure".to_string(),
            ));
        }
        self.inner.update_tenancy(tenancy)
    }

    fn active_tenancy_for_room(&self, room: &RoomId) -> Result<Option<Tenancy>, StoreError> {
        self.inner.active_tenancy_for_room(room)
    }

    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, StoreError> {
        self.inner.insert_invoice(invoice)
    }

    fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, StoreError> {
        self.inner.fetch_invoice(id)
    }

    fn invoices_for_tenancy(&self, tenancy: &TenancyId) -> Result<Vec<Invoice>, StoreError> {
        self.inner.invoices_for_tenancy(tenancy)
    }

    fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        self.inner.list_invoices()
    }

    fn update_invoice(&self, invoice: Invoice) -> Result<(), StoreError> {
        if self.fail_next_invoice_update.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected invoice write failure".to_string(),
            ));
        }
        self.inner.update_invoice(invoice)
    }

    fn insert_report(&self, report: MaintenanceReport) -> Result<MaintenanceReport, StoreError> {
        self.inner.insert_report(report)
    }

    fn fetch_report(&self, id: &ReportId) -> Result<Option<MaintenanceReport>, StoreError> {
        self.inner.fetch_report(id)
    }

    fn reports_for_room(&self, room: &RoomId) -> Result<Vec<MaintenanceReport>, StoreError> {
        self.inner.reports_for_room(room)
    }

    fn update_report(&self, report: MaintenanceReport) -> Result<(), StoreError> {
        self.inner.update_report(report)
    }

    fn reconciliation_cursor(
        &self,
        tenancy: &TenancyId,
    ) -> Result<Option<ReconciliationCursor>, StoreError> {
        self.inner.reconciliation_cursor(tenancy)
    }

    fn save_reconciliation_cursor(&self, cursor: ReconciliationCursor) -> Result<(), StoreError> {
        self.inner.save_reconciliation_cursor(cursor)
    }
}
