use thiserror::Error;

/// Failures raised while numbering or rendering an invoice.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Negative or non-finite amount handed to the speller.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The invoice lacks an issuer, a recipient or any item.
    #[error("missing data: {0}")]
    MissingData(String),

    /// Stored totals disagree with the line items.
    #[error("consistency error: {0}")]
    Consistency(String),

    #[error("could not allocate a unique invoice number after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Page geometry cannot hold a header plus one row, or the summary block.
    #[error("layout error: {0}")]
    Layout(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// The PDF compiler rejected the document.
    #[error("generation error: {0}")]
    Generation(String),
}

impl DocumentError {
    pub fn missing(what: impl Into<String>) -> Self {
        DocumentError::MissingData(what.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        DocumentError::InvalidAmount(msg.into())
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentError::InvalidAmount(_) => "invalid_amount",
            DocumentError::MissingData(_) => "missing_data",
            DocumentError::Consistency(_) => "consistency",
            DocumentError::AllocationExhausted { .. } => "allocation_exhausted",
            DocumentError::Io(_) => "io",
            DocumentError::Layout(_) => "layout",
            DocumentError::Storage(_) => "storage",
            DocumentError::Generation(_) => "generation",
        }
    }
}

pub type DocumentResult<T> = Result<T, DocumentError>;
