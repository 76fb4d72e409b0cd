use std::sync::Arc;

use crate::core::Settings;
use crate::pdf::PdfGenerator;
use crate::service::InvoiceService;
use crate::storage::SqliteStore;

#[derive(Clone)]
pub struct ApiState {
    pub invoices: InvoiceService,
    /// Present when backed by a database; drives `/ready`.
    pub db: Option<SqliteStore>,
}

impl ApiState {
    pub async fn new(config: Settings) -> anyhow::Result<Self> {
        let db = SqliteStore::connect(&config.database_url, config.max_connections).await?;
        db.run_migrations().await?;

        let store = Arc::new(db.clone());
        let invoices = InvoiceService::new(
            store.clone(),
            store,
            PdfGenerator::from_settings(&config),
        )
        .with_allocation_attempts(config.allocation_attempts);

        Ok(ApiState {
            invoices,
            db: Some(db),
        })
    }

    /// State around an already built service, without a database handle.
    pub fn with_service(invoices: InvoiceService) -> Self {
        ApiState { invoices, db: None }
    }
}
