use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{InvoiceChanges, InvoiceStore, NewInvoice, ProfileSource, StoreError};
use crate::models::{
    InvoiceRecord, IssuerId, IssuerProfile, ListInvoicesFilter, Period, RecipientProfile,
};

#[derive(Default)]
struct Inner {
    /// Insertion order.
    invoices: Vec<InvoiceRecord>,
    issuers: HashMap<IssuerId, IssuerProfile>,
    clients: HashMap<(IssuerId, String), RecipientProfile>,
}

/// In-process store with the same uniqueness rule as the database.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    pub fn put_issuer(&self, issuer: IssuerId, profile: IssuerProfile) -> Result<(), StoreError> {
        self.lock()?.issuers.insert(issuer, profile);
        Ok(())
    }

    pub fn put_client(
        &self,
        issuer: IssuerId,
        client_id: impl Into<String>,
        profile: RecipientProfile,
    ) -> Result<(), StoreError> {
        self.lock()?.clients.insert((issuer, client_id.into()), profile);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.invoices.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn count_in_period(&self, issuer: &IssuerId, period: Period) -> Result<u64, StoreError> {
        let suffix = period.suffix();
        let inner = self.lock()?;
        Ok(inner
            .invoices
            .iter()
            .filter(|r| &r.issuer_id == issuer && r.number.as_str().ends_with(&suffix))
            .count() as u64)
    }

    async fn insert(&self, invoice: &NewInvoice) -> Result<InvoiceRecord, StoreError> {
        let mut inner = self.lock()?;
        let taken = inner
            .invoices
            .iter()
            .any(|r| r.issuer_id == invoice.issuer_id && r.number == invoice.number);
        if taken {
            return Err(StoreError::UniqueViolation {
                field: "number".to_string(),
            });
        }

        let record = InvoiceRecord {
            id: Uuid::new_v4(),
            issuer_id: invoice.issuer_id.clone(),
            client_id: invoice.client_id.clone(),
            number: invoice.number.clone(),
            title: invoice.title.clone(),
            status: invoice.status,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            payment_method: invoice.payment_method,
            amount: invoice.amount,
            items: invoice.items.clone(),
        };
        inner.invoices.push(record.clone());
        Ok(record)
    }

    async fn find(&self, issuer: &IssuerId, id: Uuid) -> Result<Option<InvoiceRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .invoices
            .iter()
            .find(|r| &r.issuer_id == issuer && r.id == id)
            .cloned())
    }

    async fn replace_items(
        &self,
        issuer: &IssuerId,
        id: Uuid,
        changes: &InvoiceChanges,
    ) -> Result<Option<InvoiceRecord>, StoreError> {
        let mut inner = self.lock()?;
        let Some(record) = inner
            .invoices
            .iter_mut()
            .find(|r| &r.issuer_id == issuer && r.id == id)
        else {
            return Ok(None);
        };

        if let Some(title) = &changes.title {
            record.title = title.clone();
        }
        if let Some(status) = changes.status {
            record.status = status;
        }
        if let Some(due_date) = changes.due_date {
            record.due_date = due_date;
        }
        if changes.payment_method.is_some() {
            record.payment_method = changes.payment_method;
        }
        record.amount = changes.amount;
        record.items = changes.items.clone();
        Ok(Some(record.clone()))
    }

    async fn list(
        &self,
        issuer: &IssuerId,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<InvoiceRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .invoices
            .iter()
            .rev()
            .filter(|r| &r.issuer_id == issuer && filter.matches(r))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileSource for MemoryStore {
    async fn issuer(&self, issuer: &IssuerId) -> Result<Option<IssuerProfile>, StoreError> {
        Ok(self.lock()?.issuers.get(issuer).cloned())
    }

    async fn recipient(
        &self,
        issuer: &IssuerId,
        client_id: &str,
    ) -> Result<Option<RecipientProfile>, StoreError> {
        Ok(self
            .lock()?
            .clients
            .get(&(issuer.clone(), client_id.to_string()))
            .cloned())
    }
}
