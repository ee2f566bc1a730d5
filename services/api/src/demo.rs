use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use clap::Args;
use kost_core::config::BillingConfig;
use kost_core::error::AppError;
use kost_core::lifecycle::{
    BillingPeriod, InMemoryStore, LifecycleError, NewTenancy, RecordingSink, TenantId,
};

use crate::infra::{parse_date, seed_rooms, InMemoryServices};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Contract start date (YYYY-MM-DD); defaults to 2024-01-01
    #[arg(long)]
    pub(crate) start: Option<String>,
}

/// Walk the full tenancy lifecycle against an in-memory store: open a
/// contract, bill it, take a payment, then terminate early and show
/// the reconciliation cascade.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let start_date = match args.start.as_deref() {
        Some(raw) => parse_date(raw)
            .map_err(|message| AppError::Lifecycle(LifecycleError::InvalidInput(message)))?,
        None => NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
    };

    let services = InMemoryServices::new(
        Arc::new(InMemoryStore::default()),
        Arc::new(RecordingSink::default()),
        BillingConfig::default(),
    );

    let rooms = seed_rooms(&services)?;
    println!("Seeded {} rooms:", rooms.len());
    for room in &rooms {
        println!(
            "  {} ({}) Rp{}/month, {}",
            room.number,
            room.category,
            room.monthly_rate,
            room.status.label()
        );
    }

    let r101 = &rooms[0];
    let tenancy = services
        .tenancies
        .create_tenancy(NewTenancy {
            tenant_id: TenantId("tenant-budi".to_string()),
            room_id: r101.id.clone(),
            start_date,
            duration_months: 12,
            monthly_rate: r101.monthly_rate,
            deposit: r101.monthly_rate * 2,
        })
        ?;
    println!(
        "\nOpened tenancy {} on {}: {} through {}",
        tenancy.id.0, r101.number, tenancy.start_date, tenancy.end_date
    );

    let deposit = services
        .billing
        .generate_deposit_invoice(&tenancy.id)
        ?;
    let final_month = BillingPeriod::from_date(tenancy.end_date - Duration::days(31));
    let rent = services
        .billing
        .generate_monthly_invoice(&tenancy.id, final_month)
        ?;
    println!(
        "Billed deposit {} (Rp{}) and rent {} for {} (due {})",
        deposit.id.0, deposit.amount, rent.id.0, final_month, rent.due_date
    );

    let paid = services
        .billing
        .mark_paid(&deposit.id, "demo-payment-001", tenancy.start_date)
        ?;
    println!("Deposit settled with reference {:?}", paid.payment_reference);

    let effective = tenancy.end_date - Duration::days(45);
    let outcome = services
        .tenancies
        .end_tenancy(&tenancy.id, effective, "tenant moving out early")
        ?;
    println!(
        "\nTerminated {} effective {}: {} future invoice(s) cancelled",
        outcome.tenancy.id.0,
        effective,
        outcome.cancelled_invoices.len()
    );

    let freed = services.rooms.get_room(&r101.id)?;
    println!(
        "Room {} is {} again; tenancy is {}",
        freed.number,
        freed.status.label(),
        outcome.tenancy.status.label()
    );

    Ok(())
}
