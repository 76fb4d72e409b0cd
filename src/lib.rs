pub mod api;
pub mod core;
pub mod metrics;
pub mod models;
pub mod pdf;
pub mod sequence;
pub mod service;
pub mod storage;
pub mod words;

// Re-export commonly used types
pub use crate::core::{DocumentError, DocumentResult, PdfConfig, Settings};
pub use models::{
    InvoiceDocument, InvoiceDraft, InvoiceNumber, InvoiceRecord, IssuerId, LineItem, Period,
};
pub use pdf::{DocumentComposer, PageLayout, PdfGenerator, TableLayoutEngine};
pub use sequence::SequenceAllocator;
pub use service::InvoiceService;
pub use storage::{InvoiceStore, MemoryStore, ProfileSource, SqliteStore};
pub use words::{amount_to_words, AmountInWords, Locale};
