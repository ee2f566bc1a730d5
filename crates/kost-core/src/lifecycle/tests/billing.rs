use super::common::*;
use crate::lifecycle::domain::{BillingPeriod, InvoiceKind, InvoiceStatus, TenancyId};
use crate::lifecycle::LifecycleError;

fn period(raw: &str) -> BillingPeriod {
    BillingPeriod::parse(raw).expect("valid period")
}

#[test]
fn monthly_invoice_uses_configured_due_day_and_rate() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let tenancy = active_tenancy(&services, &room.id);

    let invoice = services
        .billing
        .generate_monthly_invoice(&tenancy.id, period("2024-03"))
        .expect("invoice generates");

    assert_eq!(invoice.kind, InvoiceKind::MonthlyRent);
    assert_eq!(invoice.status, InvoiceStatus::Unpaid);
    assert_eq!(invoice.amount, 1_500_000);
    assert_eq!(invoice.due_date, date(2024, 3, 5));
    assert_eq!(invoice.period, Some(period("2024-03")));
}

#[test]
fn duplicate_period_conflicts_until_cancelled() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let tenancy = active_tenancy(&services, &room.id);

    let first = services
        .billing
        .generate_monthly_invoice(&tenancy.id, period("2024-03"))
        .expect("first invoice generates");
    let duplicate = services
        .billing
        .generate_monthly_invoice(&tenancy.id, period("2024-03"));
    assert!(matches!(duplicate, Err(LifecycleError::Conflict(_))));

    let invoices = services
        .billing
        .list_invoices_for_tenancy(&tenancy.id)
        .expect("listing succeeds");
    assert_eq!(invoices.len(), 1, "exactly one invoice for the period");

    // Cancelling releases the (tenancy, period) key so a corrected
    // invoice can be issued for the same month.
    services
        .billing
        .cancel_future_invoices(&tenancy.id, date(2024, 1, 1))
        .expect("cancellation runs");
    let reissued = services
        .billing
        .generate_monthly_invoice(&tenancy.id, period("2024-03"))
        .expect("period can be billed again");
    assert_ne!(reissued.id, first.id);
}

#[test]
fn period_outside_window_is_invalid_input() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let tenancy = active_tenancy(&services, &room.id);

    let after_end = services
        .billing
        .generate_monthly_invoice(&tenancy.id, period("2025-02"));
    assert!(matches!(after_end, Err(LifecycleError::InvalidInput(_))));

    let before_start = services
        .billing
        .generate_monthly_invoice(&tenancy.id, period("2023-12"));
    assert!(matches!(before_start, Err(LifecycleError::InvalidInput(_))));
}

#[test]
fn due_date_outside_window_is_invalid_input() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let mut request = new_tenancy(&room.id);
    request.start_date = date(2024, 1, 10);
    let tenancy = services
        .tenancies
        .create_tenancy(request)
        .expect("tenancy opens");

    // January overlaps the window, but the due day (the 5th) falls
    // before the contract starts.
    let result = services
        .billing
        .generate_monthly_invoice(&tenancy.id, period("2024-01"));
    assert!(matches!(result, Err(LifecycleError::InvalidInput(_))));

    // Same rule at the other edge: a contract ending 2024-12-03 still
    // overlaps December, but the due day lands past its end date.
    let room = standard_room(&services, "R102");
    let mut request = new_tenancy(&room.id);
    request.start_date = date(2023, 12, 3);
    request.duration_months = 12;
    let tenancy = services
        .tenancies
        .create_tenancy(request)
        .expect("tenancy opens");
    assert_eq!(tenancy.end_date, date(2024, 12, 3));

    let result = services
        .billing
        .generate_monthly_invoice(&tenancy.id, period("2024-12"));
    assert!(matches!(result, Err(LifecycleError::InvalidInput(_))));
}

#[test]
fn ended_tenancy_rejects_new_invoices() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let tenancy = active_tenancy(&services, &room.id);
    services
        .tenancies
        .end_tenancy(&tenancy.id, date(2024, 6, 30), "moving out")
        .expect("tenancy ends");

    let result = services
        .billing
        .generate_monthly_invoice(&tenancy.id, period("2024-04"));
    assert!(matches!(result, Err(LifecycleError::Conflict(_))));
}

#[test]
fn unknown_tenancy_is_not_found() {
    let (_store, _sink, services) = services();
    let result = services
        .billing
        .generate_monthly_invoice(&TenancyId("missing".to_string()), period("2024-03"));
    assert!(matches!(result, Err(LifecycleError::NotFound(_))));
}

#[test]
fn mark_paid_stamps_reference_and_refuses_repeats() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let tenancy = active_tenancy(&services, &room.id);
    let invoice = services
        .billing
        .generate_monthly_invoice(&tenancy.id, period("2024-03"))
        .expect("invoice generates");

    let paid = services
        .billing
        .mark_paid(&invoice.id, "pay-7f3a", date(2024, 3, 4))
        .expect("payment lands");
    assert_eq!(paid.status, InvoiceStatus::Paid);
    assert_eq!(paid.payment_reference.as_deref(), Some("pay-7f3a"));
    assert_eq!(paid.paid_on, Some(date(2024, 3, 4)));

    let again = services
        .billing
        .mark_paid(&invoice.id, "pay-7f3b", date(2024, 3, 5));
    assert!(matches!(again, Err(LifecycleError::Conflict(_))));
}

#[test]
fn overdue_is_informational_and_still_payable() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let tenancy = active_tenancy(&services, &room.id);
    let invoice = services
        .billing
        .generate_monthly_invoice(&tenancy.id, period("2024-03"))
        .expect("invoice generates");

    let relabelled = services
        .billing
        .sweep_overdue(date(2024, 3, 10))
        .expect("sweep runs");
    assert_eq!(relabelled, vec![invoice.id.clone()]);
    assert_eq!(
        services
            .billing
            .get_invoice(&invoice.id)
            .expect("invoice exists")
            .status,
        InvoiceStatus::Overdue
    );

    let rerun = services
        .billing
        .sweep_overdue(date(2024, 3, 11))
        .expect("sweep reruns");
    assert!(rerun.is_empty(), "sweep is idempotent");

    let paid = services
        .billing
        .mark_paid(&invoice.id, "pay-late", date(2024, 3, 20))
        .expect("overdue invoices remain payable");
    assert_eq!(paid.status, InvoiceStatus::Paid);
}

#[test]
fn cancelled_invoice_refuses_payment() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let tenancy = active_tenancy(&services, &room.id);
    let invoice = services
        .billing
        .generate_monthly_invoice(&tenancy.id, period("2024-12"))
        .expect("invoice generates");
    services
        .tenancies
        .end_tenancy(&tenancy.id, date(2024, 6, 30), "moving out")
        .expect("tenancy ends");

    let result = services
        .billing
        .mark_paid(&invoice.id, "pay-too-late", date(2024, 12, 1));
    assert!(matches!(result, Err(LifecycleError::Conflict(_))));
}

#[test]
fn deposit_invoice_is_one_per_tenancy() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let tenancy = active_tenancy(&services, &room.id);

    let deposit = services
        .billing
        .generate_deposit_invoice(&tenancy.id)
        .expect("deposit generates");
    assert_eq!(deposit.kind, InvoiceKind::Deposit);
    assert_eq!(deposit.amount, 3_000_000);
    assert_eq!(deposit.due_date, tenancy.start_date);

    let duplicate = services.billing.generate_deposit_invoice(&tenancy.id);
    assert!(matches!(duplicate, Err(LifecycleError::Conflict(_))));
}

#[test]
fn invoices_list_in_due_date_order() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let tenancy = active_tenancy(&services, &room.id);

    services
        .billing
        .generate_monthly_invoice(&tenancy.id, period("2024-05"))
        .expect("generates");
    services
        .billing
        .generate_deposit_invoice(&tenancy.id)
        .expect("generates");
    services
        .billing
        .generate_monthly_invoice(&tenancy.id, period("2024-02"))
        .expect("generates");

    let invoices = services
        .billing
        .list_invoices_for_tenancy(&tenancy.id)
        .expect("listing succeeds");
    let due_dates: Vec<_> = invoices.iter().map(|invoice| invoice.due_date).collect();
    assert_eq!(
        due_dates,
        vec![date(2024, 1, 1), date(2024, 2, 5), date(2024, 5, 5)]
    );
}
