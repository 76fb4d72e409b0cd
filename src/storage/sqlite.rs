use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{InvoiceChanges, InvoiceStore, NewInvoice, ProfileSource, StoreError};
use crate::models::{
    Address, InvoiceNumber, InvoiceRecord, InvoiceStatus, IssuerId, IssuerProfile, LineItem,
    ListInvoicesFilter, PaymentMethod, Period, RecipientProfile,
};

const INVOICE_COLUMNS: &str = "id, issuer_id, client_id, number, title, status, issue_date, \
                               due_date, payment_method, amount";

/// Invoice store over a sqlx SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        info!(max_connections, "Connecting to SQLite");

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(backend)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(backend)?;

        Ok(SqliteStore { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    /// Mirrors an issuer profile from the account service.
    pub async fn put_issuer(
        &self,
        issuer: &IssuerId,
        profile: &IssuerProfile,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO issuers
                (id, full_name, company_name, nip, street, house_number, postal_code, city,
                 bank, account, phone, email)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(issuer.as_str())
        .bind(&profile.full_name)
        .bind(&profile.company_name)
        .bind(&profile.nip)
        .bind(&profile.address.street)
        .bind(&profile.address.house_number)
        .bind(&profile.address.postal_code)
        .bind(&profile.address.city)
        .bind(&profile.bank)
        .bind(&profile.account)
        .bind(&profile.phone)
        .bind(&profile.email)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    pub async fn put_client(
        &self,
        issuer: &IssuerId,
        client_id: &str,
        profile: &RecipientProfile,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO clients
                (issuer_id, id, name, street, house_number, postal_code, city, pesel, email)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(issuer.as_str())
        .bind(client_id)
        .bind(&profile.name)
        .bind(&profile.address.street)
        .bind(&profile.address.house_number)
        .bind(&profile.address.postal_code)
        .bind(&profile.address.city)
        .bind(&profile.pesel)
        .bind(&profile.email)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn load_items(&self, invoice_id: Uuid) -> Result<Vec<LineItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT position, name, quantity, unit, unit_price
            FROM invoice_items
            WHERE invoice_id = ?
            ORDER BY position
            "#,
        )
        .bind(invoice_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(item_from_row).collect()
    }

    async fn with_items(&self, row: &SqliteRow) -> Result<InvoiceRecord, StoreError> {
        let mut record = invoice_from_row(row)?;
        record.items = self.load_items(record.id).await?;
        Ok(record)
    }
}

#[async_trait]
impl InvoiceStore for SqliteStore {
    async fn count_in_period(&self, issuer: &IssuerId, period: Period) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM invoices WHERE issuer_id = ? AND number LIKE ?",
        )
        .bind(issuer.as_str())
        .bind(format!("%{}", period.suffix()))
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        Ok(count.max(0) as u64)
    }

    #[instrument(skip(self, invoice), fields(issuer_id = %invoice.issuer_id, number = %invoice.number))]
    async fn insert(&self, invoice: &NewInvoice) -> Result<InvoiceRecord, StoreError> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            r#"
            INSERT INTO invoices
                (id, issuer_id, client_id, number, title, status, issue_date, due_date,
                 payment_method, amount)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(invoice.issuer_id.as_str())
        .bind(&invoice.client_id)
        .bind(invoice.number.as_str())
        .bind(&invoice.title)
        .bind(invoice.status.as_str())
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.payment_method.map(|m| m.as_str()))
        .bind(invoice.amount.to_string())
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        insert_items(&mut tx, id, &invoice.items).await?;
        tx.commit().await.map_err(backend)?;

        Ok(InvoiceRecord {
            id,
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
        })
    }

    async fn find(&self, issuer: &IssuerId, id: Uuid) -> Result<Option<InvoiceRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM invoices WHERE issuer_id = ? AND id = ?",
            INVOICE_COLUMNS
        ))
        .bind(issuer.as_str())
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => Ok(Some(self.with_items(&row).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, changes), fields(issuer_id = %issuer, invoice_id = %id))]
    async fn replace_items(
        &self,
        issuer: &IssuerId,
        id: Uuid,
        changes: &InvoiceChanges,
    ) -> Result<Option<InvoiceRecord>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let updated = sqlx::query(
            r#"
            UPDATE invoices SET
                title = COALESCE(?, title),
                status = COALESCE(?, status),
                due_date = COALESCE(?, due_date),
                payment_method = COALESCE(?, payment_method),
                amount = ?
            WHERE issuer_id = ? AND id = ?
            "#,
        )
        .bind(&changes.title)
        .bind(changes.status.map(|s| s.as_str()))
        .bind(changes.due_date)
        .bind(changes.payment_method.map(|m| m.as_str()))
        .bind(changes.amount.to_string())
        .bind(issuer.as_str())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        insert_items(&mut tx, id, &changes.items).await?;
        tx.commit().await.map_err(backend)?;

        self.find(issuer, id).await
    }

    async fn list(
        &self,
        issuer: &IssuerId,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<InvoiceRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM invoices
            WHERE issuer_id = ?1
              AND (?2 IS NULL OR status = ?2)
              AND (?3 IS NULL OR client_id = ?3)
            ORDER BY rowid DESC
            "#,
            INVOICE_COLUMNS
        ))
        .bind(issuer.as_str())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.client_id.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(self.with_items(row).await?);
        }
        Ok(records)
    }
}

#[async_trait]
impl ProfileSource for SqliteStore {
    async fn issuer(&self, issuer: &IssuerId) -> Result<Option<IssuerProfile>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT full_name, company_name, nip, street, house_number, postal_code, city,
                   bank, account, phone, email
            FROM issuers WHERE id = ?
            "#,
        )
        .bind(issuer.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(|row| -> Result<IssuerProfile, StoreError> {
            Ok(IssuerProfile {
                full_name: row.try_get("full_name").map_err(backend)?,
                company_name: row.try_get("company_name").map_err(backend)?,
                nip: row.try_get("nip").map_err(backend)?,
                address: address_from_row(&row)?,
                bank: row.try_get("bank").map_err(backend)?,
                account: row.try_get("account").map_err(backend)?,
                phone: row.try_get("phone").map_err(backend)?,
                email: row.try_get("email").map_err(backend)?,
            })
        })
        .transpose()
    }

    async fn recipient(
        &self,
        issuer: &IssuerId,
        client_id: &str,
    ) -> Result<Option<RecipientProfile>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT name, street, house_number, postal_code, city, pesel, email
            FROM clients WHERE issuer_id = ? AND id = ?
            "#,
        )
        .bind(issuer.as_str())
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(|row| -> Result<RecipientProfile, StoreError> {
            Ok(RecipientProfile {
                name: row.try_get("name").map_err(backend)?,
                address: address_from_row(&row)?,
                pesel: row.try_get("pesel").map_err(backend)?,
                email: row.try_get("email").map_err(backend)?,
            })
        })
        .transpose()
    }
}

async fn insert_items(
    tx: &mut Transaction<'_, Sqlite>,
    invoice_id: Uuid,
    items: &[LineItem],
) -> Result<(), StoreError> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO invoice_items
                (invoice_id, position, name, quantity, unit, unit_price, line_total)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(invoice_id.to_string())
        .bind(item.position as i64)
        .bind(&item.name)
        .bind(item.quantity.to_string())
        .bind(&item.unit)
        .bind(item.unit_price.to_string())
        .bind(item.line_total().to_string())
        .execute(&mut **tx)
        .await
        .map_err(write_error)?;
    }
    Ok(())
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Tells uniqueness violations apart so the allocator can retry them.
fn write_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::UniqueViolation {
                field: violated_column(db_err.message()),
            }
        }
        _ => backend(err),
    }
}

/// Last column named in SQLite's `UNIQUE constraint failed: t.a, t.b`.
fn violated_column(message: &str) -> String {
    message
        .rsplit(&[',', ':', ' '][..])
        .find(|part| !part.is_empty())
        .and_then(|column| column.rsplit('.').next())
        .unwrap_or("unknown")
        .to_string()
}

fn decimal(row: &SqliteRow, column: &str) -> Result<Decimal, StoreError> {
    let text: String = row.try_get(column).map_err(backend)?;
    Decimal::from_str(&text)
        .map_err(|e| StoreError::Backend(format!("bad decimal in {}: {}", column, e)))
}

fn address_from_row(row: &SqliteRow) -> Result<Address, StoreError> {
    Ok(Address {
        street: row.try_get("street").map_err(backend)?,
        house_number: row.try_get("house_number").map_err(backend)?,
        postal_code: row.try_get("postal_code").map_err(backend)?,
        city: row.try_get("city").map_err(backend)?,
    })
}

fn invoice_from_row(row: &SqliteRow) -> Result<InvoiceRecord, StoreError> {
    let id: String = row.try_get("id").map_err(backend)?;
    let id = Uuid::parse_str(&id).map_err(|e| StoreError::Backend(format!("bad invoice id: {}", e)))?;

    let status: String = row.try_get("status").map_err(backend)?;
    let status = InvoiceStatus::from_string(&status)
        .ok_or_else(|| StoreError::Backend(format!("unknown invoice status {}", status)))?;

    let payment_method: Option<String> = row.try_get("payment_method").map_err(backend)?;
    let payment_method = payment_method
        .map(|m| {
            PaymentMethod::from_string(&m)
                .ok_or_else(|| StoreError::Backend(format!("unknown payment method {}", m)))
        })
        .transpose()?;

    let issuer_id: String = row.try_get("issuer_id").map_err(backend)?;
    let number: String = row.try_get("number").map_err(backend)?;

    Ok(InvoiceRecord {
        id,
        issuer_id: IssuerId::new(issuer_id),
        client_id: row.try_get("client_id").map_err(backend)?,
        number: InvoiceNumber::from_stored(number),
        title: row.try_get("title").map_err(backend)?,
        status,
        issue_date: row.try_get("issue_date").map_err(backend)?,
        due_date: row.try_get("due_date").map_err(backend)?,
        payment_method,
        amount: decimal(row, "amount")?,
        items: Vec::new(),
    })
}

fn item_from_row(row: &SqliteRow) -> Result<LineItem, StoreError> {
    let position: i64 = row.try_get("position").map_err(backend)?;
    let name: String = row.try_get("name").map_err(backend)?;
    let unit: String = row.try_get("unit").map_err(backend)?;

    LineItem::new(
        position as u32,
        name,
        decimal(row, "quantity")?,
        unit,
        decimal(row, "unit_price")?,
    )
    .map_err(|e| StoreError::Backend(format!("stored item {} is invalid: {}", position, e)))
}
