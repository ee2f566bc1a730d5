use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use kost_core::config::BillingConfig;
use kost_core::lifecycle::{
    BillingPeriod, InMemoryStore, InvoiceStatus, LifecycleError, LifecycleServices, NewRoom,
    NewTenancy, RecordingSink, RoomStatus, TenancyStatus, TenantId,
};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn services() -> LifecycleServices<InMemoryStore, RecordingSink> {
    LifecycleServices::new(
        Arc::new(InMemoryStore::default()),
        Arc::new(RecordingSink::default()),
        BillingConfig {
            due_day: 5,
            sweep_interval_secs: 3600,
        },
    )
}

fn register_r101(services: &LifecycleServices<InMemoryStore, RecordingSink>) -> kost_core::lifecycle::Room {
    services
        .rooms
        .register_room(NewRoom {
            number: "R101".to_string(),
            category: "standard".to_string(),
            monthly_rate: 1_500_000,
            floor: 1,
            capacity: 1,
        })
        .expect("room registers")
}

#[test]
fn full_tenancy_lifecycle_for_room_r101() {
    let services = services();
    let room = register_r101(&services);
    assert_eq!(room.status, RoomStatus::Available);

    let tenancy = services
        .tenancies
        .create_tenancy(NewTenancy {
            tenant_id: TenantId("tenant-budi".to_string()),
            room_id: room.id.clone(),
            start_date: date(2024, 1, 1),
            duration_months: 12,
            monthly_rate: 1_500_000,
            deposit: 3_000_000,
        })
        .expect("tenancy opens");
    assert_eq!(tenancy.status, TenancyStatus::Active);
    assert_eq!(tenancy.end_date, date(2025, 1, 1));
    assert_eq!(
        services.rooms.get_room(&room.id).expect("room exists").status,
        RoomStatus::Occupied
    );

    let december = services
        .billing
        .generate_monthly_invoice(
            &tenancy.id,
            BillingPeriod::parse("2024-12").expect("valid period"),
        )
        .expect("invoice generates");
    assert_eq!(december.status, InvoiceStatus::Unpaid);
    assert_eq!(december.amount, 1_500_000);

    let outcome = services
        .tenancies
        .end_tenancy(&tenancy.id, date(2024, 11, 15), "moving out early")
        .expect("termination runs");

    assert_eq!(outcome.tenancy.status, TenancyStatus::Ended);
    assert_eq!(
        services
            .billing
            .get_invoice(&december.id)
            .expect("invoice exists")
            .status,
        InvoiceStatus::Cancelled
    );
    assert_eq!(
        services.rooms.get_room(&room.id).expect("room exists").status,
        RoomStatus::Available
    );
}

#[test]
fn occupancy_always_matches_the_ledger() {
    let services = services();
    let room = register_r101(&services);

    let check = |services: &LifecycleServices<InMemoryStore, RecordingSink>| {
        let fetched = services.rooms.get_room(&room.id).expect("room exists");
        let active = services
            .tenancies
            .get_active_tenancy_for_room(&room.id)
            .expect("lookup succeeds");
        assert_eq!(
            fetched.status == RoomStatus::Occupied,
            active.is_some(),
            "cached occupancy must agree with the ledger"
        );
    };

    check(&services);
    let tenancy = services
        .tenancies
        .create_tenancy(NewTenancy {
            tenant_id: TenantId("tenant-budi".to_string()),
            room_id: room.id.clone(),
            start_date: date(2024, 1, 1),
            duration_months: 6,
            monthly_rate: 1_500_000,
            deposit: 3_000_000,
        })
        .expect("tenancy opens");
    check(&services);
    services
        .tenancies
        .end_tenancy(&tenancy.id, date(2024, 3, 31), "moving out")
        .expect("termination runs");
    check(&services);
}

#[test]
fn concurrent_invoice_generation_yields_one_invoice() {
    let services = services();
    let room = register_r101(&services);
    let tenancy = services
        .tenancies
        .create_tenancy(NewTenancy {
            tenant_id: TenantId("tenant-budi".to_string()),
            room_id: room.id.clone(),
            start_date: date(2024, 1, 1),
            duration_months: 12,
            monthly_rate: 1_500_000,
            deposit: 3_000_000,
        })
        .expect("tenancy opens");

    let mut handles = Vec::new();
    for _ in 0..2 {
        let billing = services.billing.clone();
        let tenancy_id = tenancy.id.clone();
        handles.push(thread::spawn(move || {
            billing.generate_monthly_invoice(
                &tenancy_id,
                BillingPeriod::parse("2024-03").expect("valid period"),
            )
        }));
    }

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread completes"))
        .collect();
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|result| matches!(result, Err(LifecycleError::Conflict(_))))
            .count(),
        1
    );

    let invoices = services
        .billing
        .list_invoices_for_tenancy(&tenancy.id)
        .expect("listing succeeds");
    assert_eq!(invoices.len(), 1, "exactly one invoice for the period");
}
