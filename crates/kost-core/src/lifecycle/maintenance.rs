use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;

use super::domain::{
    MaintenanceReport, ReportId, ReportPriority, ReportStatus, RoomId, TenantId,
};
use super::repository::{emit, LifecycleEvent, LifecycleStore, NotificationSink};
use super::LifecycleError;

static REPORT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_report_id() -> ReportId {
    let id = REPORT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ReportId(format!("rep-{id:06}"))
}

/// Attributes for filing a maintenance report.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReport {
    pub reporter: TenantId,
    pub room_id: RoomId,
    pub title: String,
    pub body: String,
    pub priority: ReportPriority,
}

/// Maintenance ticketing desk. Decoupled from the tenancy lifecycle;
/// the only cross-entity requirement is that the room exists.
pub struct MaintenanceDesk<S, N> {
    store: Arc<S>,
    notifications: Arc<N>,
}

impl<S, N> Clone for MaintenanceDesk<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifications: Arc::clone(&self.notifications),
        }
    }
}

impl<S, N> MaintenanceDesk<S, N>
where
    S: LifecycleStore,
    N: NotificationSink,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>) -> Self {
        Self {
            store,
            notifications,
        }
    }

    pub fn submit_report(
        &self,
        new_report: NewReport,
        opened_on: NaiveDate,
    ) -> Result<MaintenanceReport, LifecycleError> {
        if new_report.title.trim().is_empty() {
            return Err(LifecycleError::InvalidInput(
                "report title must not be empty".to_string(),
            ));
        }
        self.store.fetch_room(&new_report.room_id)?.ok_or_else(|| {
            LifecycleError::NotFound(format!("room '{}' not found", new_report.room_id.0))
        })?;

        let report = MaintenanceReport {
            id: next_report_id(),
            reporter: new_report.reporter,
            room_id: new_report.room_id,
            title: new_report.title.trim().to_string(),
            body: new_report.body,
            priority: new_report.priority,
            status: ReportStatus::Submitted,
            opened_on,
            closed_on: None,
        };
        Ok(self.store.insert_report(report)?)
    }

    pub fn get_report(&self, id: &ReportId) -> Result<MaintenanceReport, LifecycleError> {
        self.store
            .fetch_report(id)?
            .ok_or_else(|| LifecycleError::NotFound(format!("report '{}' not found", id.0)))
    }

    /// Move a report through Submitted -> InProgress -> Resolved, or
    /// reject any non-terminal report. Illegal jumps leave the report
    /// untouched and fail with `InvalidTransition`.
    pub fn advance_status(
        &self,
        report_id: &ReportId,
        next: ReportStatus,
        effective: NaiveDate,
    ) -> Result<MaintenanceReport, LifecycleError> {
        let mut report = self.get_report(report_id)?;
        if !report.status.can_advance_to(next) {
            return Err(LifecycleError::InvalidTransition(format!(
                "report '{}' cannot move from {} to {}",
                report.id.0,
                report.status.label(),
                next.label()
            )));
        }

        report.status = next;
        report.closed_on = next.is_terminal().then_some(effective);
        self.store.update_report(report.clone())?;
        emit(
            self.notifications.as_ref(),
            LifecycleEvent::ReportStatusChanged {
                report_id: report.id.clone(),
                status: next.label(),
            },
        );
        Ok(report)
    }

    /// Reports filed against a room, newest first.
    pub fn list_reports_for_room(
        &self,
        room_id: &RoomId,
    ) -> Result<Vec<MaintenanceReport>, LifecycleError> {
        let mut reports = self.store.reports_for_room(room_id)?;
        reports.sort_by(|a, b| b.opened_on.cmp(&a.opened_on).then(b.id.cmp(&a.id)));
        Ok(reports)
    }
}
