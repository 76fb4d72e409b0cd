use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{IssuerId, IssuerProfile, RecipientProfile};
use crate::core::{round_money, DocumentError, DocumentResult};
use crate::words::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(InvoiceStatus::Draft),
            "SENT" => Some(InvoiceStatus::Sent),
            "PAID" => Some(InvoiceStatus::Paid),
            "OVERDUE" => Some(InvoiceStatus::Overdue),
            "CANCELLED" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Transfer,
    Cash,
    Card,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Transfer => "TRANSFER",
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Other => "OTHER",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "TRANSFER" => Some(PaymentMethod::Transfer),
            "CASH" => Some(PaymentMethod::Cash),
            "CARD" => Some(PaymentMethod::Card),
            "OTHER" => Some(PaymentMethod::Other),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Transfer => "Bank transfer",
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::Other => "Other",
        }
    }
}

/// Accounting month an invoice number is allocated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Period { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Period {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Trailing part shared by every number of the period: `/03/2024`.
    pub fn suffix(&self) -> String {
        format!("/{:02}/{}", self.month, self.year)
    }
}

/// `SERIAL/MM/YYYY`, serial zero-padded to four digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceNumber(String);

impl InvoiceNumber {
    pub fn new(serial: u32, period: Period) -> Self {
        InvoiceNumber(format!("{:04}{}", serial, period.suffix()))
    }

    /// Wraps a number read back from storage.
    pub fn from_stored(number: impl Into<String>) -> Self {
        InvoiceNumber(number.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Safe in file names: `0004-03-2024`.
    pub fn file_stem(&self) -> String {
        self.0.replace('/', "-")
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Item as submitted by the caller. Totals are never taken from input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemInput {
    pub name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    /// 1-based ordinal ("Lp.").
    pub position: u32,
    pub name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    line_total: Decimal,
}

impl LineItem {
    pub fn new(
        position: u32,
        name: impl Into<String>,
        quantity: Decimal,
        unit: impl Into<String>,
        unit_price: Decimal,
    ) -> DocumentResult<Self> {
        if quantity < Decimal::ZERO {
            return Err(DocumentError::invalid_amount(format!(
                "item {} has a negative quantity",
                position
            )));
        }
        if unit_price < Decimal::ZERO {
            return Err(DocumentError::invalid_amount(format!(
                "item {} has a negative price",
                position
            )));
        }

        let line_total = quantity.checked_mul(unit_price).ok_or_else(|| {
            DocumentError::invalid_amount(format!(
                "item {}: {} x {} is out of range",
                position, quantity, unit_price
            ))
        })?;

        Ok(LineItem {
            position,
            name: name.into(),
            quantity,
            unit: unit.into(),
            unit_price,
            line_total: round_money(line_total),
        })
    }

    pub fn line_total(&self) -> Decimal {
        self.line_total
    }
}

/// Numbers items 1..n and derives their totals.
pub fn build_items(inputs: &[LineItemInput]) -> DocumentResult<Vec<LineItem>> {
    inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            LineItem::new(
                i as u32 + 1,
                input.name.clone(),
                input.quantity,
                input.unit.clone(),
                input.price,
            )
        })
        .collect()
}

/// Sum of the line totals. Fails instead of overflowing.
pub fn items_total(items: &[LineItem]) -> DocumentResult<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |sum, item| {
        sum.checked_add(item.line_total())
            .ok_or_else(|| DocumentError::invalid_amount("invoice total is out of range"))
    })
}

/// Create-invoice payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub title: String,
    pub status: InvoiceStatus,
    pub client_id: String,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    pub items: Vec<LineItemInput>,
}

/// Edit payload. Items are always replaced as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceAmendment {
    pub title: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub due_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub items: Vec<LineItemInput>,
}

#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<String>,
}

impl ListInvoicesFilter {
    pub fn matches(&self, record: &InvoiceRecord) -> bool {
        self.status.map_or(true, |s| s == record.status)
            && self
                .client_id
                .as_deref()
                .map_or(true, |c| c == record.client_id)
    }
}

/// Persisted invoice with its items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceRecord {
    pub id: Uuid,
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

/// Everything the composer needs, assembled at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDocument {
    pub number: InvoiceNumber,
    pub issuer: Option<IssuerProfile>,
    pub recipient: Option<RecipientProfile>,
    pub title: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub payment_method: Option<PaymentMethod>,
    pub items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub status: InvoiceStatus,
    pub locale: Locale,
}

impl InvoiceDocument {
    pub fn from_record(
        record: InvoiceRecord,
        issuer: Option<IssuerProfile>,
        recipient: Option<RecipientProfile>,
    ) -> Self {
        InvoiceDocument {
            number: record.number,
            issuer,
            recipient,
            title: Some(record.title).filter(|t| !t.trim().is_empty()),
            issue_date: record.issue_date,
            due_date: record.due_date,
            payment_method: record.payment_method,
            items: record.items,
            total_amount: record.amount,
            status: record.status,
            locale: Locale::Polish,
        }
    }

    /// `invoice-0004-03-2024.pdf`
    pub fn file_name(&self) -> String {
        format!("invoice-{}.pdf", self.number.file_stem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn numbers_are_zero_padded() {
        let period = Period::new(2024, 3).unwrap();
        assert_eq!(InvoiceNumber::new(4, period).as_str(), "0004/03/2024");
        assert_eq!(InvoiceNumber::new(12345, period).as_str(), "12345/03/2024");
        assert_eq!(InvoiceNumber::new(4, period).file_stem(), "0004-03-2024");
    }

    #[test]
    fn period_rejects_bad_months() {
        assert!(Period::new(2024, 0).is_none());
        assert!(Period::new(2024, 13).is_none());
        let date = NaiveDate::from_ymd_opt(2024, 11, 30).unwrap();
        assert_eq!(Period::of(date).suffix(), "/11/2024");
    }

    #[test]
    fn line_totals_are_derived() {
        let items = build_items(&[
            LineItemInput {
                name: "Konsultacje".into(),
                quantity: dec!(1.5),
                unit: "h".into(),
                price: dec!(3.33),
            },
            LineItemInput {
                name: "Hosting".into(),
                quantity: dec!(2),
                unit: "szt.".into(),
                price: dec!(100),
            },
        ])
        .unwrap();

        assert_eq!(items[0].position, 1);
        assert_eq!(items[1].position, 2);
        assert_eq!(items[0].line_total(), dec!(5.00));
        assert_eq!(items_total(&items).unwrap(), dec!(205.00));
    }

    #[test]
    fn oversized_amounts_are_rejected() {
        let item = |quantity, price| LineItemInput {
            name: "Licencja".into(),
            quantity,
            unit: "szt.".into(),
            price,
        };

        let err = build_items(&[item(Decimal::MAX, dec!(2))]).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidAmount(_)));

        let half = Decimal::MAX / dec!(2);
        let items = build_items(&[item(half, dec!(1)), item(half, dec!(1)), item(half, dec!(1))]).unwrap();
        let err = items_total(&items).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidAmount(_)));
    }

    #[test]
    fn negative_inputs_are_rejected() {
        let err = LineItem::new(1, "x", dec!(-1), "szt.", dec!(1)).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidAmount(_)));
        let err = LineItem::new(1, "x", dec!(1), "szt.", dec!(-1)).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidAmount(_)));
    }

    #[test]
    fn filter_matches_status_and_client() {
        let record = InvoiceRecord {
            id: Uuid::new_v4(),
            issuer_id: IssuerId::new("ACME"),
            client_id: "c-1".into(),
            number: InvoiceNumber::from_stored("0001/03/2024"),
            title: "March".into(),
            status: InvoiceStatus::Sent,
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            payment_method: None,
            amount: Decimal::ZERO,
            items: Vec::new(),
        };

        assert!(ListInvoicesFilter::default().matches(&record));
        assert!(ListInvoicesFilter {
            status: Some(InvoiceStatus::Sent),
            client_id: Some("c-1".into()),
        }
        .matches(&record));
        assert!(!ListInvoicesFilter {
            status: Some(InvoiceStatus::Paid),
            client_id: None,
        }
        .matches(&record));
    }
}
