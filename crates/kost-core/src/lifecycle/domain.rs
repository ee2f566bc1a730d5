use std::fmt;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier wrapper for rooms in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

/// Identifier wrapper for rental contracts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenancyId(pub String);

/// Identifier wrapper for tenants, supplied by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

/// Identifier wrapper for billing records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InvoiceId(pub String);

/// Identifier wrapper for maintenance reports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReportId(pub String);

/// Occupancy state of a room.
///
/// This is a cached view of "does an active tenancy reference the
/// room"; the tenancy ledger and reconciliation coordinator are the
/// only writers, so it never drifts from the ledger for longer than a
/// single store commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,
    Occupied,
}

impl RoomStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Occupied => "occupied",
        }
    }
}

/// A rentable room in the boarding house.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub number: String,
    pub category: String,
    /// Monthly rate in rupiah minor units.
    pub monthly_rate: u64,
    pub floor: u8,
    pub capacity: u8,
    pub status: RoomStatus,
}

/// Lifecycle state of a rental contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenancyStatus {
    Active,
    Ended,
    Cancelled,
}

impl TenancyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            TenancyStatus::Active => "active",
            TenancyStatus::Ended => "ended",
            TenancyStatus::Cancelled => "cancelled",
        }
    }
}

/// A rental contract binding one tenant to one room for a bounded period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenancy {
    pub id: TenancyId,
    pub tenant_id: TenantId,
    pub room_id: RoomId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_months: u32,
    /// Monthly rate in rupiah minor units, frozen at contract creation.
    pub monthly_rate: u64,
    pub deposit: u64,
    pub status: TenancyStatus,
    pub ended_on: Option<NaiveDate>,
    pub end_reason: Option<String>,
}

impl Tenancy {
    pub fn is_active(&self) -> bool {
        self.status == TenancyStatus::Active
    }

    /// Whether a date lies inside the contract window, bounds included.
    pub fn window_contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Whether a billing period overlaps the contract window at all.
    pub fn covers_period(&self, period: BillingPeriod) -> bool {
        period.last_day() >= self.start_date && period.first_day() <= self.end_date
    }
}

/// Calendar-month arithmetic with end-of-month clamping, so a contract
/// starting Jan 31 for one month ends Feb 28/29.
pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

/// A calendar month used as the idempotency key for recurring rent
/// invoices. Internally pinned to the first day of the month; rendered
/// and parsed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BillingPeriod(NaiveDate);

impl BillingPeriod {
    pub fn parse(raw: &str) -> Result<Self, PeriodParseError> {
        let trimmed = raw.trim();
        NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| PeriodParseError {
                raw: raw.to_string(),
            })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn first_day(self) -> NaiveDate {
        self.0
    }

    pub fn last_day(self) -> NaiveDate {
        self.0
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(self.0)
    }

    /// Due date for this period given a configured day of month.
    /// `due_day` is validated to 1..=28 by the config layer, so it
    /// exists in every month.
    pub fn due_date(self, due_day: u32) -> NaiveDate {
        self.0.with_day(due_day).unwrap_or_else(|| self.last_day())
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

impl Serialize for BillingPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BillingPeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BillingPeriod::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Raised when a `YYYY-MM` period string does not parse.
#[derive(Debug, thiserror::Error)]
#[error("invalid billing period '{raw}', expected YYYY-MM")]
pub struct PeriodParseError {
    raw: String,
}

/// The charge category an invoice represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    MonthlyRent,
    Deposit,
    OtherCharge,
}

impl InvoiceKind {
    pub const fn label(self) -> &'static str {
        match self {
            InvoiceKind::MonthlyRent => "monthly_rent",
            InvoiceKind::Deposit => "deposit",
            InvoiceKind::OtherCharge => "other_charge",
        }
    }
}

/// Payment state of an invoice. `Overdue` is informational, not a
/// lock: an overdue invoice remains payable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Unpaid or overdue: the invoice still expects money.
    pub const fn is_open(self) -> bool {
        matches!(self, InvoiceStatus::Unpaid | InvoiceStatus::Overdue)
    }
}

/// A billable charge tied to a tenancy and a due date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub tenancy_id: TenancyId,
    pub tenant_id: TenantId,
    pub kind: InvoiceKind,
    /// Set for monthly rent invoices; the (tenancy, period) pair is
    /// unique among non-cancelled invoices.
    pub period: Option<BillingPeriod>,
    pub amount: u64,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub payment_reference: Option<String>,
    pub paid_on: Option<NaiveDate>,
}

/// Urgency of a maintenance report, set by the reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPriority {
    Low,
    Normal,
    High,
}

impl ReportPriority {
    pub const fn label(self) -> &'static str {
        match self {
            ReportPriority::Low => "low",
            ReportPriority::Normal => "normal",
            ReportPriority::High => "high",
        }
    }
}

/// Workflow state of a maintenance report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Submitted,
    InProgress,
    Resolved,
    Rejected,
}

impl ReportStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ReportStatus::Submitted => "submitted",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ReportStatus::Resolved | ReportStatus::Rejected)
    }

    /// The workflow moves Submitted -> InProgress -> Resolved; any
    /// non-terminal state may be rejected. Everything else is illegal.
    pub fn can_advance_to(self, next: ReportStatus) -> bool {
        match (self, next) {
            (ReportStatus::Submitted, ReportStatus::InProgress) => true,
            (ReportStatus::InProgress, ReportStatus::Resolved) => true,
            (current, ReportStatus::Rejected) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// A tenant-filed maintenance issue against a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub id: ReportId,
    pub reporter: TenantId,
    pub room_id: RoomId,
    pub title: String,
    pub body: String,
    pub priority: ReportPriority,
    pub status: ReportStatus,
    pub opened_on: NaiveDate,
    pub closed_on: Option<NaiveDate>,
}

/// Step cursor for the tenancy-termination saga, persisted before each
/// transition so a failed run resumes from the last completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStep {
    Requested,
    RoomFreed,
    InvoicesCancelled,
    Done,
    Failed,
}

impl ReconciliationStep {
    pub const fn label(self) -> &'static str {
        match self {
            ReconciliationStep::Requested => "requested",
            ReconciliationStep::RoomFreed => "room_freed",
            ReconciliationStep::InvoicesCancelled => "invoices_cancelled",
            ReconciliationStep::Done => "done",
            ReconciliationStep::Failed => "failed",
        }
    }
}

/// Durable record of an in-flight tenancy termination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationCursor {
    pub tenancy_id: TenancyId,
    pub step: ReconciliationStep,
    pub effective_date: NaiveDate,
    pub reason: String,
    /// Ended for an ordinary termination, Cancelled for a contract
    /// voided before move-in.
    pub final_status: TenancyStatus,
    pub last_error: Option<String>,
}

impl ReconciliationCursor {
    /// The step to report to callers. A halted saga keeps its last
    /// completed step for resumption but shows as `Failed` until a
    /// later run clears the recorded error.
    pub fn reported_step(&self) -> ReconciliationStep {
        if self.last_error.is_some() && self.step != ReconciliationStep::Done {
            ReconciliationStep::Failed
        } else {
            self.step
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn billing_period_round_trips_through_display() {
        let period = BillingPeriod::parse("2024-03").expect("parses");
        assert_eq!(period.to_string(), "2024-03");
        assert_eq!(period.first_day(), date(2024, 3, 1));
        assert_eq!(period.last_day(), date(2024, 3, 31));
    }

    #[test]
    fn billing_period_rejects_garbage() {
        assert!(BillingPeriod::parse("march 2024").is_err());
        assert!(BillingPeriod::parse("2024-13").is_err());
    }

    #[test]
    fn february_keeps_leap_day_handling() {
        let period = BillingPeriod::parse("2024-02").expect("parses");
        assert_eq!(period.last_day(), date(2024, 2, 29));
        assert_eq!(period.due_date(28), date(2024, 2, 28));
    }

    #[test]
    fn add_months_clamps_to_month_end() {
        let end = add_months(date(2024, 1, 31), 1).expect("in range");
        assert_eq!(end, date(2024, 2, 29));
    }

    #[test]
    fn report_transition_table_matches_workflow() {
        use ReportStatus::*;
        assert!(Submitted.can_advance_to(InProgress));
        assert!(InProgress.can_advance_to(Resolved));
        assert!(Submitted.can_advance_to(Rejected));
        assert!(InProgress.can_advance_to(Rejected));
        assert!(!Submitted.can_advance_to(Resolved));
        assert!(!Resolved.can_advance_to(Submitted));
        assert!(!Resolved.can_advance_to(Rejected));
        assert!(!Rejected.can_advance_to(Rejected));
    }
}
