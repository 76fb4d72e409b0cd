//! Optimistic allocation of `SERIAL/MM/YYYY` invoice numbers.
//!
//! No lock is taken. Each attempt re-reads how many invoices the issuer has
//! in the period, proposes the next serial and writes the invoice under it.
//! The store's uniqueness constraint on (issuer, number) is the arbiter: a
//! writer that loses the race gets a violation on `number` and tries the
//! next serial. Serials burnt by failed attempts are never reused, so gaps
//! are possible.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::core::{DocumentError, DocumentResult};
use crate::metrics;
use crate::models::{InvoiceNumber, InvoiceRecord, IssuerId, Period};
use crate::storage::{InvoiceStore, NewInvoice};

pub const DEFAULT_ALLOCATION_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn InvoiceStore>,
    max_attempts: u32,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn InvoiceStore>) -> Self {
        SequenceAllocator {
            store,
            max_attempts: DEFAULT_ALLOCATION_ATTEMPTS,
        }
    }

    /// At least one attempt is always made.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Writes the invoice produced by `build` under the first free number of
    /// `period`.
    ///
    /// Only a uniqueness violation on the number triggers another attempt;
    /// every other store failure is returned as is.
    pub async fn allocate<F>(
        &self,
        issuer: &IssuerId,
        period: Period,
        build: F,
    ) -> DocumentResult<InvoiceRecord>
    where
        F: Fn(InvoiceNumber) -> NewInvoice + Send + Sync,
    {
        let mut previous: Option<u32> = None;

        for attempt in 1..=self.max_attempts {
            let count = self.store.count_in_period(issuer, period).await?;
            let next = u32::try_from(count).unwrap_or(u32::MAX).saturating_add(1);
            let serial = match previous {
                Some(prev) => next.max(prev.saturating_add(1)),
                None => next,
            };
            previous = Some(serial);

            let number = InvoiceNumber::new(serial, period);
            match self.store.insert(&build(number.clone())).await {
                Ok(record) => {
                    metrics::INVOICES_ALLOCATED
                        .with_label_values(&["allocated"])
                        .inc();
                    info!(issuer_id = %issuer, number = %record.number, attempt, "allocated invoice number");
                    return Ok(record);
                }
                Err(e) if e.is_number_conflict() => {
                    metrics::ALLOCATION_CONFLICTS.inc();
                    warn!(issuer_id = %issuer, number = %number, attempt, "invoice number already taken, retrying");
                }
                Err(e) => {
                    metrics::INVOICES_ALLOCATED
                        .with_label_values(&["failed"])
                        .inc();
                    return Err(e.into());
                }
            }
        }

        metrics::INVOICES_ALLOCATED
            .with_label_values(&["exhausted"])
            .inc();
        error!(
            issuer_id = %issuer,
            period = %period.suffix(),
            attempts = self.max_attempts,
            "could not allocate an invoice number"
        );
        Err(DocumentError::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvoiceStatus, ListInvoicesFilter};
    use crate::storage::{InvoiceChanges, MemoryStore, StoreError};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn march() -> Period {
        Period::new(2024, 3).unwrap()
    }

    fn invoice(issuer: &str) -> impl Fn(InvoiceNumber) -> NewInvoice + Send + Sync {
        let issuer = IssuerId::new(issuer);
        move |number| NewInvoice {
            issuer_id: issuer.clone(),
            client_id: "c-1".into(),
            number,
            title: "Usługi".into(),
            status: InvoiceStatus::Draft,
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 28).unwrap(),
            payment_method: None,
            amount: Decimal::ZERO,
            items: Vec::new(),
        }
    }

    /// Reports a stale count and rejects the first `conflicts` inserts, as
    /// if concurrent writers kept winning.
    struct Contended {
        inner: MemoryStore,
        conflicts: AtomicU32,
        field: &'static str,
        attempted: Mutex<Vec<String>>,
    }

    impl Contended {
        fn new(conflicts: u32, field: &'static str) -> Self {
            Contended {
                inner: MemoryStore::new(),
                conflicts: AtomicU32::new(conflicts),
                field,
                attempted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InvoiceStore for Contended {
        async fn count_in_period(&self, _: &IssuerId, _: Period) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn insert(&self, invoice: &NewInvoice) -> Result<InvoiceRecord, StoreError> {
            self.attempted
                .lock()
                .unwrap()
                .push(invoice.number.as_str().to_string());
            let left = self.conflicts.load(Ordering::SeqCst);
            if left > 0 {
                self.conflicts.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::UniqueViolation {
                    field: self.field.to_string(),
                });
            }
            self.inner.insert(invoice).await
        }

        async fn find(&self, issuer: &IssuerId, id: Uuid) -> Result<Option<InvoiceRecord>, StoreError> {
            self.inner.find(issuer, id).await
        }

        async fn replace_items(
            &self,
            issuer: &IssuerId,
            id: Uuid,
            changes: &InvoiceChanges,
        ) -> Result<Option<InvoiceRecord>, StoreError> {
            self.inner.replace_items(issuer, id, changes).await
        }

        async fn list(
            &self,
            issuer: &IssuerId,
            filter: &ListInvoicesFilter,
        ) -> Result<Vec<InvoiceRecord>, StoreError> {
            self.inner.list(issuer, filter).await
        }
    }

    #[tokio::test]
    async fn continues_after_prior_invoices() {
        let store = Arc::new(MemoryStore::new());
        let allocator = SequenceAllocator::new(store.clone());
        for _ in 0..3 {
            allocator
                .allocate(&IssuerId::new("ACME"), march(), invoice("ACME"))
                .await
                .unwrap();
        }

        let record = allocator
            .allocate(&IssuerId::new("ACME"), march(), invoice("ACME"))
            .await
            .unwrap();
        assert_eq!(record.number.as_str(), "0004/03/2024");
    }

    #[tokio::test]
    async fn candidates_advance_past_a_stale_count() {
        let store = Arc::new(Contended::new(2, "number"));
        let allocator = SequenceAllocator::new(store.clone());

        let record = allocator
            .allocate(&IssuerId::new("ACME"), march(), invoice("ACME"))
            .await
            .unwrap();

        assert_eq!(record.number.as_str(), "0003/03/2024");
        assert_eq!(
            *store.attempted.lock().unwrap(),
            vec!["0001/03/2024", "0002/03/2024", "0003/03/2024"]
        );
    }

    #[tokio::test]
    async fn gives_up_after_the_attempt_bound() {
        let store = Arc::new(Contended::new(u32::MAX, "number"));
        let allocator = SequenceAllocator::new(store.clone());

        let err = allocator
            .allocate(&IssuerId::new("ACME"), march(), invoice("ACME"))
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentError::AllocationExhausted { attempts: 5 }));
        assert_eq!(store.attempted.lock().unwrap().len(), 5);
        assert!(store.inner.is_empty());
    }

    #[tokio::test]
    async fn attempt_bound_is_configurable() {
        let store = Arc::new(Contended::new(u32::MAX, "number"));
        let allocator = SequenceAllocator::new(store.clone()).with_max_attempts(2);

        let err = allocator
            .allocate(&IssuerId::new("ACME"), march(), invoice("ACME"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::AllocationExhausted { attempts: 2 }));
        assert_eq!(SequenceAllocator::new(store).with_max_attempts(0).max_attempts(), 1);
    }

    #[tokio::test]
    async fn other_violations_are_not_retried() {
        let store = Arc::new(Contended::new(1, "id"));
        let allocator = SequenceAllocator::new(store.clone());

        let err = allocator
            .allocate(&IssuerId::new("ACME"), march(), invoice("ACME"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Storage(_)));
        assert_eq!(store.attempted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn periods_and_issuers_number_independently() {
        let store = Arc::new(MemoryStore::new());
        let allocator = SequenceAllocator::new(store);

        let acme = allocator
            .allocate(&IssuerId::new("ACME"), march(), invoice("ACME"))
            .await
            .unwrap();
        let other = allocator
            .allocate(&IssuerId::new("OTHER"), march(), invoice("OTHER"))
            .await
            .unwrap();
        let april = allocator
            .allocate(&IssuerId::new("ACME"), Period::new(2024, 4).unwrap(), invoice("ACME"))
            .await
            .unwrap();

        assert_eq!(acme.number.as_str(), "0001/03/2024");
        assert_eq!(other.number.as_str(), "0001/03/2024");
        assert_eq!(april.number.as_str(), "0001/04/2024");
    }
}
