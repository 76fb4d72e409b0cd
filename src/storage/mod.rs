//! Persistence seams: invoices owned by this service, profiles owned elsewhere.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::core::DocumentError;
use crate::models::{
    InvoiceNumber, InvoiceRecord, InvoiceStatus, IssuerId, IssuerProfile, LineItem,
    ListInvoicesFilter, PaymentMethod, Period, RecipientProfile,
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write. `field` names the column.
    #[error("unique constraint violated on {field}")]
    UniqueViolation { field: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// True when the write lost a race for an invoice number.
    pub fn is_number_conflict(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { field } if field == "number")
    }
}

impl From<StoreError> for DocumentError {
    fn from(err: StoreError) -> Self {
        DocumentError::Storage(err.to_string())
    }
}

/// Invoice about to be written under a candidate number.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    pub issuer_id: IssuerId,
    pub client_id: String,
    pub number: InvoiceNumber,
    pub title: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub payment_method: Option<PaymentMethod>,
    pub amount: Decimal,
    pub items: Vec<LineItem>,
}

/// Replacement contents for an existing invoice. `None` keeps the stored
/// value; items and amount are always replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceChanges {
    pub title: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub due_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub amount: Decimal,
    pub items: Vec<LineItem>,
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Invoices of `issuer` numbered in `period`.
    async fn count_in_period(&self, issuer: &IssuerId, period: Period) -> Result<u64, StoreError>;

    /// Writes the invoice and its items atomically. Fails with
    /// [`StoreError::UniqueViolation`] on field `number` when the issuer
    /// already holds that number.
    async fn insert(&self, invoice: &NewInvoice) -> Result<InvoiceRecord, StoreError>;

    async fn find(&self, issuer: &IssuerId, id: Uuid) -> Result<Option<InvoiceRecord>, StoreError>;

    /// Drops the stored items and writes `changes` in one step.
    async fn replace_items(
        &self,
        issuer: &IssuerId,
        id: Uuid,
        changes: &InvoiceChanges,
    ) -> Result<Option<InvoiceRecord>, StoreError>;

    /// Newest first.
    async fn list(
        &self,
        issuer: &IssuerId,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<InvoiceRecord>, StoreError>;
}

/// Read-only view of user and client data managed by another service.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn issuer(&self, issuer: &IssuerId) -> Result<Option<IssuerProfile>, StoreError>;

    async fn recipient(
        &self,
        issuer: &IssuerId,
        client_id: &str,
    ) -> Result<Option<RecipientProfile>, StoreError>;
}
