use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use crate::error::lifecycle_status;

use super::domain::{
    BillingPeriod, InvoiceId, InvoiceKind, ReportId, ReportPriority, ReportStatus, RoomId,
    TenancyId, TenantId,
};
use super::maintenance::NewReport;
use super::repository::{LifecycleStore, NotificationSink};
use super::rooms::{NewRoom, RoomFilter};
use super::tenancy::NewTenancy;
use super::{LifecycleError, LifecycleServices};

/// Authorization role supplied by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    Owner,
    Tenant,
}

impl CallerRole {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "owner" => Some(Self::Owner),
            "tenant" => Some(Self::Tenant),
            _ => None,
        }
    }
}

/// Authenticated caller, extracted from headers the upstream identity
/// collaborator sets. The core trusts these values.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub subject: String,
    pub role: CallerRole,
}

impl CallerIdentity {
    fn owns_tenant(&self, tenant_id: &TenantId) -> bool {
        self.subject == tenant_id.0
    }
}

fn identity_from_headers(headers: &HeaderMap) -> Result<CallerIdentity, Response> {
    let subject = headers
        .get("x-kost-subject")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let role = headers
        .get("x-kost-role")
        .and_then(|value| value.to_str().ok())
        .and_then(CallerRole::parse);

    match (subject, role) {
        (Some(subject), Some(role)) => Ok(CallerIdentity {
            subject: subject.to_string(),
            role,
        }),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "missing or invalid caller identity" })),
        )
            .into_response()),
    }
}

fn require_owner(headers: &HeaderMap) -> Result<CallerIdentity, Response> {
    let identity = identity_from_headers(headers)?;
    if identity.role != CallerRole::Owner {
        return Err(forbidden("only the owner may perform this operation"));
    }
    Ok(identity)
}

fn forbidden(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": message })),
    )
        .into_response()
}

fn error_response(error: &LifecycleError) -> Response {
    (
        lifecycle_status(error),
        Json(json!({ "error": error.to_string() })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct EndTenancyRequest {
    pub(crate) effective_date: NaiveDate,
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CancelTenancyRequest {
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateInvoiceRequest {
    #[serde(default = "default_invoice_kind")]
    pub(crate) kind: InvoiceKind,
    pub(crate) period: Option<BillingPeriod>,
}

fn default_invoice_kind() -> InvoiceKind {
    InvoiceKind::MonthlyRent
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentConfirmationRequest {
    pub(crate) payment_reference: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitReportRequest {
    pub(crate) room_id: RoomId,
    pub(crate) title: String,
    pub(crate) body: String,
    pub(crate) priority: ReportPriority,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdvanceReportRequest {
    pub(crate) status: ReportStatus,
}

/// Router builder exposing the lifecycle over HTTP. Room reads are
/// open; every mutation is role-gated, and tenant reads are scoped to
/// the caller's own contracts.
pub fn lifecycle_router<S, N>(services: Arc<LifecycleServices<S, N>>) -> Router
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/rooms",
            get(list_rooms_handler::<S, N>).post(register_room_handler::<S, N>),
        )
        .route("/api/v1/rooms/:room_id", get(get_room_handler::<S, N>))
        .route(
            "/api/v1/rooms/:room_id/reports",
            get(room_reports_handler::<S, N>),
        )
        .route("/api/v1/tenancies", post(create_tenancy_handler::<S, N>))
        .route(
            "/api/v1/tenancies/:tenancy_id",
            get(get_tenancy_handler::<S, N>),
        )
        .route(
            "/api/v1/tenancies/:tenancy_id/end",
            post(end_tenancy_handler::<S, N>),
        )
        .route(
            "/api/v1/tenancies/:tenancy_id/cancel",
            post(cancel_tenancy_handler::<S, N>),
        )
        .route(
            "/api/v1/tenancies/:tenancy_id/reconciliation",
            get(reconciliation_status_handler::<S, N>),
        )
        .route(
            "/api/v1/tenancies/:tenancy_id/invoices",
            get(list_invoices_handler::<S, N>).post(generate_invoice_handler::<S, N>),
        )
        .route(
            "/api/v1/invoices/:invoice_id/payments",
            post(confirm_payment_handler::<S, N>),
        )
        .route(
            "/api/v1/maintenance/reports",
            post(submit_report_handler::<S, N>),
        )
        .route(
            "/api/v1/maintenance/reports/:report_id/status",
            post(advance_report_handler::<S, N>),
        )
        .with_state(services)
}

pub(crate) async fn list_rooms_handler<S, N>(
    State(services): State<Arc<LifecycleServices<S, N>>>,
    Query(filter): Query<RoomFilter>,
) -> Response
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    match services.rooms.list_rooms(&filter) {
        Ok(rooms) => (StatusCode::OK, Json(rooms)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn get_room_handler<S, N>(
    State(services): State<Arc<LifecycleServices<S, N>>>,
    Path(room_id): Path<String>,
) -> Response
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    match services.rooms.get_room(&RoomId(room_id)) {
        Ok(room) => (StatusCode::OK, Json(room)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn register_room_handler<S, N>(
    State(services): State<Arc<LifecycleServices<S, N>>>,
    headers: HeaderMap,
    Json(new_room): Json<NewRoom>,
) -> Response
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    if let Err(denied) = require_owner(&headers) {
        return denied;
    }
    match services.rooms.register_room(new_room) {
        Ok(room) => (StatusCode::CREATED, Json(room)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn create_tenancy_handler<S, N>(
    State(services): State<Arc<LifecycleServices<S, N>>>,
    headers: HeaderMap,
    Json(new_tenancy): Json<NewTenancy>,
) -> Response
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    if let Err(denied) = require_owner(&headers) {
        return denied;
    }
    match services.tenancies.create_tenancy(new_tenancy) {
        Ok(tenancy) => (StatusCode::CREATED, Json(tenancy)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn get_tenancy_handler<S, N>(
    State(services): State<Arc<LifecycleServices<S, N>>>,
    headers: HeaderMap,
    Path(tenancy_id): Path<String>,
) -> Response
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    let identity = match identity_from_headers(&headers) {
        Ok(identity) => identity,
        Err(denied) => return denied,
    };
    match services.tenancies.get_tenancy(&TenancyId(tenancy_id)) {
        Ok(tenancy) => {
            if identity.role == CallerRole::Tenant && !identity.owns_tenant(&tenancy.tenant_id) {
                return forbidden("tenants may only read their own tenancy");
            }
            (StatusCode::OK, Json(tenancy)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn end_tenancy_handler<S, N>(
    State(services): State<Arc<LifecycleServices<S, N>>>,
    headers: HeaderMap,
    Path(tenancy_id): Path<String>,
    Json(request): Json<EndTenancyRequest>,
) -> Response
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    if let Err(denied) = require_owner(&headers) {
        return denied;
    }
    match services.tenancies.end_tenancy(
        &TenancyId(tenancy_id),
        request.effective_date,
        &request.reason,
    ) {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "tenancy": outcome.tenancy,
                "cancelled_invoices": outcome.cancelled_invoices,
            })),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn cancel_tenancy_handler<S, N>(
    State(services): State<Arc<LifecycleServices<S, N>>>,
    headers: HeaderMap,
    Path(tenancy_id): Path<String>,
    Json(request): Json<CancelTenancyRequest>,
) -> Response
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    if let Err(denied) = require_owner(&headers) {
        return denied;
    }
    match services
        .tenancies
        .cancel_tenancy(&TenancyId(tenancy_id), &request.reason)
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "tenancy": outcome.tenancy,
                "cancelled_invoices": outcome.cancelled_invoices,
            })),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn reconciliation_status_handler<S, N>(
    State(services): State<Arc<LifecycleServices<S, N>>>,
    headers: HeaderMap,
    Path(tenancy_id): Path<String>,
) -> Response
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    if let Err(denied) = require_owner(&headers) {
        return denied;
    }
    match services
        .tenancies
        .reconciliation_status(&TenancyId(tenancy_id.clone()))
    {
        Ok(Some(step)) => (StatusCode::OK, Json(json!({ "step": step }))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("no termination recorded for tenancy '{tenancy_id}'")
            })),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn generate_invoice_handler<S, N>(
    State(services): State<Arc<LifecycleServices<S, N>>>,
    headers: HeaderMap,
    Path(tenancy_id): Path<String>,
    Json(request): Json<GenerateInvoiceRequest>,
) -> Response
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    if let Err(denied) = require_owner(&headers) {
        return denied;
    }
    let tenancy_id = TenancyId(tenancy_id);
    let result = match request.kind {
        InvoiceKind::MonthlyRent => match request.period {
            Some(period) => services.billing.generate_monthly_invoice(&tenancy_id, period),
            None => Err(LifecycleError::InvalidInput(
                "monthly rent invoices require a billing period".to_string(),
            )),
        },
        InvoiceKind::Deposit => services.billing.generate_deposit_invoice(&tenancy_id),
        InvoiceKind::OtherCharge => Err(LifecycleError::InvalidInput(
            "ad-hoc charges are not generated through this endpoint".to_string(),
        )),
    };
    match result {
        Ok(invoice) => (StatusCode::CREATED, Json(invoice)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn list_invoices_handler<S, N>(
    State(services): State<Arc<LifecycleServices<S, N>>>,
    headers: HeaderMap,
    Path(tenancy_id): Path<String>,
) -> Response
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    let identity = match identity_from_headers(&headers) {
        Ok(identity) => identity,
        Err(denied) => return denied,
    };
    let tenancy_id = TenancyId(tenancy_id);
    if identity.role == CallerRole::Tenant {
        match services.tenancies.get_tenancy(&tenancy_id) {
            Ok(tenancy) if identity.owns_tenant(&tenancy.tenant_id) => {}
            Ok(_) => return forbidden("tenants may only read their own invoices"),
            Err(err) => return error_response(&err),
        }
    }
    match services.billing.list_invoices_for_tenancy(&tenancy_id) {
        Ok(invoices) => (StatusCode::OK, Json(invoices)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn confirm_payment_handler<S, N>(
    State(services): State<Arc<LifecycleServices<S, N>>>,
    headers: HeaderMap,
    Path(invoice_id): Path<String>,
    Json(request): Json<PaymentConfirmationRequest>,
) -> Response
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    if let Err(denied) = require_owner(&headers) {
        return denied;
    }
    let today = Local::now().date_naive();
    match services.billing.mark_paid(
        &InvoiceId(invoice_id),
        &request.payment_reference,
        today,
    ) {
        Ok(invoice) => (StatusCode::OK, Json(invoice)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn submit_report_handler<S, N>(
    State(services): State<Arc<LifecycleServices<S, N>>>,
    headers: HeaderMap,
    Json(request): Json<SubmitReportRequest>,
) -> Response
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    let identity = match identity_from_headers(&headers) {
        Ok(identity) => identity,
        Err(denied) => return denied,
    };
    let report = NewReport {
        reporter: TenantId(identity.subject),
        room_id: request.room_id,
        title: request.title,
        body: request.body,
        priority: request.priority,
    };
    let today = Local::now().date_naive();
    match services.maintenance.submit_report(report, today) {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn advance_report_handler<S, N>(
    State(services): State<Arc<LifecycleServices<S, N>>>,
    headers: HeaderMap,
    Path(report_id): Path<String>,
    Json(request): Json<AdvanceReportRequest>,
) -> Response
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    if let Err(denied) = require_owner(&headers) {
        return denied;
    }
    let today = Local::now().date_naive();
    match services
        .maintenance
        .advance_status(&ReportId(report_id), request.status, today)
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn room_reports_handler<S, N>(
    State(services): State<Arc<LifecycleServices<S, N>>>,
    headers: HeaderMap,
    Path(room_id): Path<String>,
) -> Response
where
    S: LifecycleStore + 'static,
    N: NotificationSink + 'static,
{
    if let Err(denied) = require_owner(&headers) {
        return denied;
    }
    match services.maintenance.list_reports_for_room(&RoomId(room_id)) {
        Ok(reports) => (StatusCode::OK, Json(reports)).into_response(),
        Err(err) => error_response(&err),
    }
}
