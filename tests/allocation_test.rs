use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use invoice_documents::models::{InvoiceStatus, ListInvoicesFilter, PaymentMethod};
use invoice_documents::storage::{InvoiceChanges, NewInvoice, StoreError};
use invoice_documents::{
    DocumentError, InvoiceNumber, InvoiceStore, IssuerId, MemoryStore, Period, SequenceAllocator,
    SqliteStore,
};
use rust_decimal_macros::dec;

fn march() -> Period {
    Period::new(2024, 3).unwrap()
}

fn new_invoice(issuer: &IssuerId, number: InvoiceNumber) -> NewInvoice {
    NewInvoice {
        issuer_id: issuer.clone(),
        client_id: "c-1".into(),
        number,
        title: "Usługi".into(),
        status: InvoiceStatus::Draft,
        issue_date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
        due_date: NaiveDate::from_ymd_opt(2024, 3, 28).unwrap(),
        payment_method: None,
        amount: dec!(0),
        items: Vec::new(),
    }
}

async fn sqlite_store() -> SqliteStore {
    let store = SqliteStore::connect("sqlite::memory:", 1).await.unwrap();
    store.run_migrations().await.unwrap();
    store
}

async fn allocate_many(allocator: &SequenceAllocator, issuer: &IssuerId, n: usize) -> Vec<Result<String, DocumentError>> {
    let tasks = (0..n).map(move |_| async move {
        allocator
            .allocate(issuer, march(), |number| new_invoice(issuer, number))
            .await
            .map(|record| record.number.as_str().to_string())
    });
    join_all(tasks).await
}

#[tokio::test]
async fn fourth_invoice_of_march_gets_serial_four() {
    let store = Arc::new(sqlite_store().await);
    let allocator = SequenceAllocator::new(store.clone());
    let acme = IssuerId::new("ACME");

    for _ in 0..3 {
        allocator
            .allocate(&acme, march(), |number| new_invoice(&acme, number))
            .await
            .unwrap();
    }
    let record = allocator
        .allocate(&acme, march(), |number| new_invoice(&acme, number))
        .await
        .unwrap();

    assert_eq!(record.number.as_str(), "0004/03/2024");
    assert_eq!(store.count_in_period(&acme, march()).await.unwrap(), 4);
}

#[tokio::test]
async fn sqlite_rejects_duplicate_numbers_on_the_number_column() {
    let store = sqlite_store().await;
    let acme = IssuerId::new("ACME");
    let number = InvoiceNumber::new(1, march());

    store.insert(&new_invoice(&acme, number.clone())).await.unwrap();
    let err = store.insert(&new_invoice(&acme, number.clone())).await.unwrap_err();
    assert!(err.is_number_conflict(), "{:?}", err);

    // Another issuer may hold the same number.
    store
        .insert(&new_invoice(&IssuerId::new("OTHER"), number))
        .await
        .unwrap();
}

/// Every caller either gets a number nobody else got or an explicit
/// exhaustion error.
fn assert_distinct_or_exhausted(results: Vec<Result<String, DocumentError>>) -> HashSet<String> {
    let mut numbers = HashSet::new();
    for result in results {
        match result {
            Ok(number) => assert!(numbers.insert(number.clone()), "{} handed out twice", number),
            Err(DocumentError::AllocationExhausted { attempts }) => assert_eq!(attempts, 5),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    numbers
}

#[tokio::test]
async fn concurrent_allocations_on_sqlite_are_distinct() {
    let store = Arc::new(sqlite_store().await);
    let allocator = SequenceAllocator::new(store.clone());
    let acme = IssuerId::new("ACME");

    let numbers = assert_distinct_or_exhausted(allocate_many(&allocator, &acme, 12).await);
    assert!(!numbers.is_empty());
    assert_eq!(
        store.count_in_period(&acme, march()).await.unwrap(),
        numbers.len() as u64
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_writers_never_share_a_number() {
    let store = Arc::new(MemoryStore::new());
    let allocator = SequenceAllocator::new(store.clone());
    let acme = IssuerId::new("ACME");

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let allocator = allocator.clone();
            let acme = acme.clone();
            tokio::spawn(async move {
                allocator
                    .allocate(&acme, march(), |number| new_invoice(&acme, number))
                    .await
                    .map(|record| record.number.as_str().to_string())
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    let numbers = assert_distinct_or_exhausted(results);

    assert!(!numbers.is_empty());
    assert_eq!(store.len(), numbers.len());
}

#[tokio::test]
async fn amendments_replace_items_in_sqlite() {
    use invoice_documents::models::{build_items, items_total, LineItemInput};

    let store = sqlite_store().await;
    let acme = IssuerId::new("ACME");
    let record = store
        .insert(&new_invoice(&acme, InvoiceNumber::new(1, march())))
        .await
        .unwrap();

    let items = build_items(&[
        LineItemInput {
            name: "Hosting".into(),
            quantity: dec!(12),
            unit: "mies.".into(),
            price: dec!(19.99),
        },
        LineItemInput {
            name: "Domena".into(),
            quantity: dec!(1),
            unit: "szt.".into(),
            price: dec!(49),
        },
    ])
    .unwrap();
    let changes = InvoiceChanges {
        title: None,
        status: Some(InvoiceStatus::Paid),
        due_date: None,
        payment_method: Some(PaymentMethod::Card),
        amount: items_total(&items).unwrap(),
        items,
    };

    let amended = store
        .replace_items(&acme, record.id, &changes)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(amended.number, record.number);
    assert_eq!(amended.title, "Usługi");
    assert_eq!(amended.status, InvoiceStatus::Paid);
    assert_eq!(amended.payment_method, Some(PaymentMethod::Card));
    assert_eq!(amended.amount, dec!(288.88));
    assert_eq!(amended.items.len(), 2);
    assert_eq!(amended.items[0].line_total(), dec!(239.88));

    let missing = store
        .replace_items(&IssuerId::new("OTHER"), record.id, &changes)
        .await
        .unwrap();
    assert!(missing.is_none());

    let paid = store
        .list(
            &acme,
            &ListInvoicesFilter {
                status: Some(InvoiceStatus::Paid),
                client_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(paid.len(), 1);
    let drafts = store
        .list(
            &acme,
            &ListInvoicesFilter {
                status: Some(InvoiceStatus::Draft),
                client_id: None,
            },
        )
        .await
        .unwrap();
    assert!(drafts.is_empty());
}

#[test]
fn store_errors_name_the_violated_field() {
    let err = StoreError::UniqueViolation {
        field: "number".into(),
    };
    assert_eq!(err.to_string(), "unique constraint violated on number");
}
