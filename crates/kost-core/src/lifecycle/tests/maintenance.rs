use super::common::*;
use crate::lifecycle::domain::{ReportPriority, ReportStatus, RoomId, TenantId};
use crate::lifecycle::maintenance::NewReport;
use crate::lifecycle::LifecycleError;

fn leaky_faucet(room_id: &RoomId) -> NewReport {
    NewReport {
        reporter: TenantId("tenant-budi".to_string()),
        room_id: room_id.clone(),
        title: "Leaky faucet".to_string(),
        body: "Bathroom faucet drips overnight".to_string(),
        priority: ReportPriority::Normal,
    }
}

#[test]
fn submit_requires_an_existing_room() {
    let (_store, _sink, services) = services();
    let result = services
        .maintenance
        .submit_report(leaky_faucet(&RoomId("missing".to_string())), date(2024, 3, 1));
    assert!(matches!(result, Err(LifecycleError::NotFound(_))));
}

#[test]
fn submit_rejects_empty_title() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let mut report = leaky_faucet(&room.id);
    report.title = "   ".to_string();
    let result = services.maintenance.submit_report(report, date(2024, 3, 1));
    assert!(matches!(result, Err(LifecycleError::InvalidInput(_))));
}

#[test]
fn workflow_advances_to_resolved_and_stamps_close_date() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let report = services
        .maintenance
        .submit_report(leaky_faucet(&room.id), date(2024, 3, 1))
        .expect("report files");
    assert_eq!(report.status, ReportStatus::Submitted);
    assert_eq!(report.closed_on, None);

    services
        .maintenance
        .advance_status(&report.id, ReportStatus::InProgress, date(2024, 3, 2))
        .expect("work starts");
    let resolved = services
        .maintenance
        .advance_status(&report.id, ReportStatus::Resolved, date(2024, 3, 4))
        .expect("work completes");
    assert_eq!(resolved.status, ReportStatus::Resolved);
    assert_eq!(resolved.closed_on, Some(date(2024, 3, 4)));
}

#[test]
fn resolved_reports_refuse_further_transitions() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let report = services
        .maintenance
        .submit_report(leaky_faucet(&room.id), date(2024, 3, 1))
        .expect("report files");
    services
        .maintenance
        .advance_status(&report.id, ReportStatus::InProgress, date(2024, 3, 2))
        .expect("work starts");
    services
        .maintenance
        .advance_status(&report.id, ReportStatus::Resolved, date(2024, 3, 4))
        .expect("work completes");

    let reopen = services
        .maintenance
        .advance_status(&report.id, ReportStatus::Submitted, date(2024, 3, 5));
    assert!(matches!(reopen, Err(LifecycleError::InvalidTransition(_))));
    let reject = services
        .maintenance
        .advance_status(&report.id, ReportStatus::Rejected, date(2024, 3, 5));
    assert!(matches!(reject, Err(LifecycleError::InvalidTransition(_))));

    let unchanged = services
        .maintenance
        .get_report(&report.id)
        .expect("report exists");
    assert_eq!(unchanged.status, ReportStatus::Resolved);
}

#[test]
fn skipping_in_progress_is_illegal() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let report = services
        .maintenance
        .submit_report(leaky_faucet(&room.id), date(2024, 3, 1))
        .expect("report files");

    let result = services
        .maintenance
        .advance_status(&report.id, ReportStatus::Resolved, date(2024, 3, 2));
    assert!(matches!(result, Err(LifecycleError::InvalidTransition(_))));
}

#[test]
fn non_terminal_reports_can_be_rejected() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    let report = services
        .maintenance
        .submit_report(leaky_faucet(&room.id), date(2024, 3, 1))
        .expect("report files");

    let rejected = services
        .maintenance
        .advance_status(&report.id, ReportStatus::Rejected, date(2024, 3, 2))
        .expect("rejection lands");
    assert_eq!(rejected.status, ReportStatus::Rejected);
    assert_eq!(rejected.closed_on, Some(date(2024, 3, 2)));
}

#[test]
fn room_listing_is_newest_first() {
    let (_store, _sink, services) = services();
    let room = standard_room(&services, "R101");
    services
        .maintenance
        .submit_report(leaky_faucet(&room.id), date(2024, 3, 1))
        .expect("report files");
    let mut newer = leaky_faucet(&room.id);
    newer.title = "Broken window latch".to_string();
    let newer = services
        .maintenance
        .submit_report(newer, date(2024, 4, 1))
        .expect("report files");

    let reports = services
        .maintenance
        .list_reports_for_room(&room.id)
        .expect("listing succeeds");
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].id, newer.id);
}
