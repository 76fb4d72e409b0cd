//! Prometheus metrics for invoice numbering and rendering.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, CounterVec, Histogram,
    IntCounter, TextEncoder,
};

/// Invoices that received a number, by outcome.
pub static INVOICES_ALLOCATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoice_numbers_allocated_total",
        "Invoice number allocations by outcome",
        &["outcome"] // allocated, exhausted, failed
    )
    .expect("Failed to register invoice_numbers_allocated_total")
});

/// Candidate numbers rejected by the uniqueness constraint.
pub static ALLOCATION_CONFLICTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "invoice_number_conflicts_total",
        "Candidate invoice numbers taken by a concurrent insert"
    )
    .expect("Failed to register invoice_number_conflicts_total")
});

pub static DOCUMENTS_RENDERED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoice_documents_rendered_total",
        "Rendered invoice documents by outcome",
        &["outcome"]
    )
    .expect("Failed to register invoice_documents_rendered_total")
});

pub static RENDER_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "invoice_render_duration_seconds",
        "Time to compose and compile one invoice",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register invoice_render_duration_seconds")
});

/// Forces registration so every series shows up on the first scrape.
pub fn init_metrics() {
    Lazy::force(&INVOICES_ALLOCATED);
    Lazy::force(&ALLOCATION_CONFLICTS);
    Lazy::force(&DOCUMENTS_RENDERED);
    Lazy::force(&RENDER_DURATION);
}

/// Metrics in Prometheus text format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    encoder
        .encode_to_string(&prometheus::gather())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_series_are_exported() {
        init_metrics();
        ALLOCATION_CONFLICTS.inc();
        INVOICES_ALLOCATED.with_label_values(&["allocated"]).inc();

        let text = gather();
        assert!(text.contains("invoice_number_conflicts_total"));
        assert!(text.contains("invoice_numbers_allocated_total{outcome=\"allocated\"}"));
    }
}
