use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::BillingConfig;

use super::domain::{
    BillingPeriod, Invoice, InvoiceId, InvoiceKind, InvoiceStatus, TenancyId,
};
use super::repository::{
    emit, ensure_active, require_tenancy, LifecycleEvent, LifecycleStore, NotificationSink,
};
use super::LifecycleError;

static INVOICE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_invoice_id() -> InvoiceId {
    let id = INVOICE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    InvoiceId(format!("inv-{id:06}"))
}

/// Generates, tracks, and closes invoices tied to a tenancy.
///
/// Duplicate protection for a billing period is enforced by the store's
/// uniqueness key on (tenancy, period), so racing generators resolve to
/// exactly one invoice.
pub struct BillingEngine<S, N> {
    store: Arc<S>,
    notifications: Arc<N>,
    config: BillingConfig,
}

impl<S, N> Clone for BillingEngine<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifications: Arc::clone(&self.notifications),
            config: self.config,
        }
    }
}

impl<S, N> BillingEngine<S, N>
where
    S: LifecycleStore,
    N: NotificationSink,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, config: BillingConfig) -> Self {
        Self {
            store,
            notifications,
            config,
        }
    }

    /// Produce the rent invoice for one calendar month of an active
    /// tenancy. Idempotent per (tenancy, period): a second call for the
    /// same month fails with `Conflict`.
    pub fn generate_monthly_invoice(
        &self,
        tenancy_id: &TenancyId,
        period: BillingPeriod,
    ) -> Result<Invoice, LifecycleError> {
        let tenancy = require_tenancy(self.store.as_ref(), tenancy_id)?;
        ensure_active(&tenancy)?;

        if !tenancy.covers_period(period) {
            return Err(LifecycleError::InvalidInput(format!(
                "billing period {period} is outside the tenancy window"
            )));
        }
        let due_date = period.due_date(self.config.due_day);
        if !tenancy.window_contains(due_date) {
            return Err(LifecycleError::InvalidInput(format!(
                "due date {due_date} falls outside the tenancy window"
            )));
        }

        let invoice = Invoice {
            id: next_invoice_id(),
            tenancy_id: tenancy.id.clone(),
            tenant_id: tenancy.tenant_id.clone(),
            kind: InvoiceKind::MonthlyRent,
            period: Some(period),
            amount: tenancy.monthly_rate,
            due_date,
            status: InvoiceStatus::Unpaid,
            payment_reference: None,
            paid_on: None,
        };
        let invoice = self.store.insert_invoice(invoice)?;
        emit(
            self.notifications.as_ref(),
            LifecycleEvent::InvoiceCreated {
                invoice_id: invoice.id.clone(),
                tenancy_id: invoice.tenancy_id.clone(),
                amount: invoice.amount,
                due_date: invoice.due_date,
            },
        );
        Ok(invoice)
    }

    /// One deposit charge per tenancy, due on the contract start date.
    pub fn generate_deposit_invoice(
        &self,
        tenancy_id: &TenancyId,
    ) -> Result<Invoice, LifecycleError> {
        let tenancy = require_tenancy(self.store.as_ref(), tenancy_id)?;
        ensure_active(&tenancy)?;

        let invoice = Invoice {
            id: next_invoice_id(),
            tenancy_id: tenancy.id.clone(),
            tenant_id: tenancy.tenant_id.clone(),
            kind: InvoiceKind::Deposit,
            period: None,
            amount: tenancy.deposit,
            due_date: tenancy.start_date,
            status: InvoiceStatus::Unpaid,
            payment_reference: None,
            paid_on: None,
        };
        let invoice = self.store.insert_invoice(invoice)?;
        emit(
            self.notifications.as_ref(),
            LifecycleEvent::InvoiceCreated {
                invoice_id: invoice.id.clone(),
                tenancy_id: invoice.tenancy_id.clone(),
                amount: invoice.amount,
                due_date: invoice.due_date,
            },
        );
        Ok(invoice)
    }

    pub fn get_invoice(&self, id: &InvoiceId) -> Result<Invoice, LifecycleError> {
        self.store
            .fetch_invoice(id)?
            .ok_or_else(|| LifecycleError::NotFound(format!("invoice '{}' not found", id.0)))
    }

    /// Invoices of a tenancy ordered by due date.
    pub fn list_invoices_for_tenancy(
        &self,
        tenancy_id: &TenancyId,
    ) -> Result<Vec<Invoice>, LifecycleError> {
        require_tenancy(self.store.as_ref(), tenancy_id)?;
        let mut invoices = self.store.invoices_for_tenancy(tenancy_id)?;
        invoices.sort_by_key(|invoice| (invoice.due_date, invoice.id.clone()));
        Ok(invoices)
    }

    /// Consume a payment confirmation from the payment collaborator.
    /// Overdue invoices remain payable; paid and cancelled ones do not.
    pub fn mark_paid(
        &self,
        invoice_id: &InvoiceId,
        payment_reference: &str,
        paid_on: NaiveDate,
    ) -> Result<Invoice, LifecycleError> {
        let mut invoice = self.get_invoice(invoice_id)?;
        match invoice.status {
            InvoiceStatus::Paid => {
                return Err(LifecycleError::Conflict(format!(
                    "invoice '{}' is already paid",
                    invoice.id.0
                )))
            }
            InvoiceStatus::Cancelled => {
                return Err(LifecycleError::Conflict(format!(
                    "invoice '{}' was cancelled",
                    invoice.id.0
                )))
            }
            InvoiceStatus::Unpaid | InvoiceStatus::Overdue => {}
        }

        invoice.status = InvoiceStatus::Paid;
        invoice.payment_reference = Some(payment_reference.to_string());
        invoice.paid_on = Some(paid_on);
        self.store.update_invoice(invoice.clone())?;
        emit(
            self.notifications.as_ref(),
            LifecycleEvent::InvoicePaid {
                invoice_id: invoice.id.clone(),
                payment_reference: payment_reference.to_string(),
            },
        );
        Ok(invoice)
    }

    /// Relabel unpaid invoices past their due date as overdue. Pure
    /// status bookkeeping; re-entrant and safe to repeat or skip.
    pub fn sweep_overdue(&self, today: NaiveDate) -> Result<Vec<InvoiceId>, LifecycleError> {
        let mut relabelled = Vec::new();
        for mut invoice in self.store.list_invoices()? {
            if invoice.status == InvoiceStatus::Unpaid && invoice.due_date < today {
                invoice.status = InvoiceStatus::Overdue;
                self.store.update_invoice(invoice.clone())?;
                relabelled.push(invoice.id);
            }
        }
        Ok(relabelled)
    }

    /// Cancellation cascade for a contract voided before move-in:
    /// every open invoice is cancelled, the deposit due on the start
    /// date included. Only the reconciliation coordinator calls this.
    pub(crate) fn cancel_open_invoices(
        &self,
        tenancy_id: &TenancyId,
    ) -> Result<Vec<InvoiceId>, LifecycleError> {
        let mut cancelled = Vec::new();
        for mut invoice in self.store.invoices_for_tenancy(tenancy_id)? {
            if invoice.status.is_open() {
                invoice.status = InvoiceStatus::Cancelled;
                self.store.update_invoice(invoice.clone())?;
                cancelled.push(invoice.id);
            }
        }
        Ok(cancelled)
    }

    /// Cancellation cascade for a terminating tenancy: every open
    /// invoice due after the effective date is cancelled. Paid history
    /// is immutable. Only the reconciliation coordinator calls this.
    pub(crate) fn cancel_future_invoices(
        &self,
        tenancy_id: &TenancyId,
        as_of: NaiveDate,
    ) -> Result<Vec<InvoiceId>, LifecycleError> {
        let mut cancelled = Vec::new();
        for mut invoice in self.store.invoices_for_tenancy(tenancy_id)? {
            if invoice.status.is_open() && invoice.due_date > as_of {
                invoice.status = InvoiceStatus::Cancelled;
                self.store.update_invoice(invoice.clone())?;
                cancelled.push(invoice.id);
            }
        }
        Ok(cancelled)
    }
}
