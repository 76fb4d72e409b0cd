use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::core::{DocumentError, DocumentResult};
use crate::models::{
    build_items, items_total, InvoiceAmendment, InvoiceDocument, InvoiceDraft, InvoiceRecord,
    IssuerId, LineItem, LineItemInput, ListInvoicesFilter, Period,
};
use crate::pdf::{PdfGenerator, RenderedDocument};
use crate::sequence::SequenceAllocator;
use crate::storage::{InvoiceChanges, InvoiceStore, NewInvoice, ProfileSource};

/// Invoice operations exposed over HTTP.
#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn InvoiceStore>,
    profiles: Arc<dyn ProfileSource>,
    allocator: SequenceAllocator,
    generator: PdfGenerator,
}

impl InvoiceService {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        profiles: Arc<dyn ProfileSource>,
        generator: PdfGenerator,
    ) -> Self {
        InvoiceService {
            allocator: SequenceAllocator::new(store.clone()),
            store,
            profiles,
            generator,
        }
    }

    pub fn with_allocation_attempts(mut self, attempts: u32) -> Self {
        self.allocator = self.allocator.with_max_attempts(attempts);
        self
    }

    pub fn generator(&self) -> &PdfGenerator {
        &self.generator
    }

    /// Numbers and stores a new invoice issued on `issue_date`.
    pub async fn create(
        &self,
        issuer: &IssuerId,
        draft: InvoiceDraft,
        issue_date: NaiveDate,
    ) -> DocumentResult<InvoiceRecord> {
        let items = priced_items(&draft.items)?;
        let amount = items_total(&items)?;

        self.allocator
            .allocate(issuer, Period::of(issue_date), |number| NewInvoice {
                issuer_id: issuer.clone(),
                client_id: draft.client_id.clone(),
                number,
                title: draft.title.clone(),
                status: draft.status,
                issue_date,
                due_date: draft.due_date,
                payment_method: draft.payment_method,
                amount,
                items: items.clone(),
            })
            .await
    }

    /// Replaces the items (and any given fields) of an invoice. The number
    /// never changes.
    pub async fn amend(
        &self,
        issuer: &IssuerId,
        id: Uuid,
        amendment: InvoiceAmendment,
    ) -> DocumentResult<Option<InvoiceRecord>> {
        let items = priced_items(&amendment.items)?;
        let amount = items_total(&items)?;
        let changes = InvoiceChanges {
            title: amendment.title,
            status: amendment.status,
            due_date: amendment.due_date,
            payment_method: amendment.payment_method,
            amount,
            items,
        };

        let record = self.store.replace_items(issuer, id, &changes).await?;
        if let Some(record) = &record {
            tracing::info!(issuer_id = %issuer, number = %record.number, items = record.items.len(), "amended invoice");
        }
        Ok(record)
    }

    pub async fn get(&self, issuer: &IssuerId, id: Uuid) -> DocumentResult<Option<InvoiceRecord>> {
        Ok(self.store.find(issuer, id).await?)
    }

    pub async fn list(
        &self,
        issuer: &IssuerId,
        filter: &ListInvoicesFilter,
    ) -> DocumentResult<Vec<InvoiceRecord>> {
        Ok(self.store.list(issuer, filter).await?)
    }

    /// Assembles the render-time view of a stored invoice. Profiles that
    /// cannot be found are left empty for the composer to reject.
    pub async fn document(
        &self,
        issuer: &IssuerId,
        id: Uuid,
    ) -> DocumentResult<Option<InvoiceDocument>> {
        let Some(record) = self.store.find(issuer, id).await? else {
            return Ok(None);
        };
        let issuer_profile = self.profiles.issuer(issuer).await?;
        let recipient = self.profiles.recipient(issuer, &record.client_id).await?;

        Ok(Some(InvoiceDocument::from_record(
            record,
            issuer_profile,
            recipient,
        )))
    }

    pub async fn render(
        &self,
        issuer: &IssuerId,
        id: Uuid,
        paid: Option<Decimal>,
    ) -> DocumentResult<Option<RenderedDocument>> {
        match self.document(issuer, id).await? {
            Some(doc) => Ok(Some(self.generator.render(doc, paid).await?)),
            None => Ok(None),
        }
    }
}

/// Prices submitted items. An invoice always carries at least one.
fn priced_items(inputs: &[LineItemInput]) -> DocumentResult<Vec<LineItem>> {
    if inputs.is_empty() {
        return Err(DocumentError::missing(
            "an invoice must contain at least one item",
        ));
    }
    build_items(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvoiceStatus, PaymentMethod};
    use crate::pdf::DocumentComposer;
    use crate::storage::MemoryStore;
    use rust_decimal_macros::dec;

    fn service() -> (Arc<MemoryStore>, InvoiceService) {
        let store = Arc::new(MemoryStore::new());
        let service = InvoiceService::new(
            store.clone(),
            store.clone(),
            PdfGenerator::new(DocumentComposer::default()),
        );
        (store, service)
    }

    fn item(name: &str, quantity: Decimal, price: Decimal) -> LineItemInput {
        LineItemInput {
            name: name.into(),
            quantity,
            unit: "szt.".into(),
            price,
        }
    }

    fn draft(items: Vec<LineItemInput>) -> InvoiceDraft {
        InvoiceDraft {
            title: "Marzec".into(),
            status: InvoiceStatus::Draft,
            client_id: "c-1".into(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 28).unwrap(),
            payment_method: Some(PaymentMethod::Transfer),
            items,
        }
    }

    fn issue_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
    }

    #[tokio::test]
    async fn create_prices_items_on_the_server() {
        let (_, service) = service();
        let issuer = IssuerId::new("ACME");

        let record = service
            .create(
                &issuer,
                draft(vec![item("A", dec!(2), dec!(10.10)), item("B", dec!(1), dec!(5))]),
                issue_date(),
            )
            .await
            .unwrap();

        assert_eq!(record.number.as_str(), "0001/03/2024");
        assert_eq!(record.amount, dec!(25.20));
        assert_eq!(record.items[1].position, 2);
    }

    #[tokio::test]
    async fn empty_item_lists_are_rejected() {
        let (store, service) = service();
        let issuer = IssuerId::new("ACME");

        let err = service
            .create(&issuer, draft(Vec::new()), issue_date())
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::MissingData(_)));
        assert!(store.is_empty());

        let record = service
            .create(&issuer, draft(vec![item("A", dec!(1), dec!(1))]), issue_date())
            .await
            .unwrap();
        let err = service
            .amend(
                &issuer,
                record.id,
                InvoiceAmendment {
                    title: None,
                    status: None,
                    due_date: None,
                    payment_method: None,
                    items: Vec::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::MissingData(_)));
    }

    #[tokio::test]
    async fn amend_replaces_items_and_keeps_the_number() {
        let (_, service) = service();
        let issuer = IssuerId::new("ACME");
        let record = service
            .create(&issuer, draft(vec![item("A", dec!(1), dec!(100))]), issue_date())
            .await
            .unwrap();

        let amended = service
            .amend(
                &issuer,
                record.id,
                InvoiceAmendment {
                    title: Some("Kwiecień".into()),
                    status: Some(InvoiceStatus::Sent),
                    due_date: None,
                    payment_method: None,
                    items: vec![item("B", dec!(3), dec!(1.5)), item("C", dec!(1), dec!(0.5))],
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(amended.number, record.number);
        assert_eq!(amended.title, "Kwiecień");
        assert_eq!(amended.status, InvoiceStatus::Sent);
        assert_eq!(amended.due_date, record.due_date);
        assert_eq!(amended.amount, dec!(5.00));
        assert_eq!(amended.items.len(), 2);
        assert_eq!(amended.items[0].name, "B");
    }

    #[tokio::test]
    async fn other_issuers_cannot_see_or_amend() {
        let (_, service) = service();
        let record = service
            .create(
                &IssuerId::new("ACME"),
                draft(vec![item("A", dec!(1), dec!(1))]),
                issue_date(),
            )
            .await
            .unwrap();

        let intruder = IssuerId::new("OTHER");
        assert!(service.get(&intruder, record.id).await.unwrap().is_none());
        assert!(service.document(&intruder, record.id).await.unwrap().is_none());
        assert!(service
            .list(&intruder, &ListInvoicesFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn document_leaves_unknown_profiles_empty() {
        let (_, service) = service();
        let issuer = IssuerId::new("ACME");
        let record = service
            .create(&issuer, draft(vec![item("A", dec!(1), dec!(1))]), issue_date())
            .await
            .unwrap();

        let doc = service.document(&issuer, record.id).await.unwrap().unwrap();
        assert!(doc.issuer.is_none());
        assert!(doc.recipient.is_none());
        assert_eq!(doc.file_name(), "invoice-0001-03-2024.pdf");

        let err = service
            .generator()
            .composer()
            .compose(&doc, None, Vec::new())
            .unwrap_err();
        assert!(matches!(err, DocumentError::MissingData(_)));
    }
}
