//! Prometheus metrics for ticket lifecycle events.
//!
//! Counters are bumped by `TicketService` after a change has been persisted.
//! The server registers them through [`all_metrics`].

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Ticket Lifecycle Metrics
// =============================================================================

/// Tickets created total.
pub static TICKETS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "nox_tickets_created_total",
        "Total tickets created since startup",
    )
    .unwrap()
});

/// Status transitions by source and target status.
pub static STATUS_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "nox_tickets_status_transitions_total",
            "Ticket status transitions",
        ),
        &["from", "to"],
    )
    .unwrap()
});

/// Audited field changes by field name.
pub static MODIFICATIONS_RECORDED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "nox_tickets_modifications_total",
            "Modification records appended to ticket history",
        ),
        &["field"],
    )
    .unwrap()
});

/// Observations added total.
pub static OBSERVATIONS_ADDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "nox_tickets_observations_total",
        "Total observations added to tickets",
    )
    .unwrap()
});

/// Tickets deleted total.
pub static TICKETS_DELETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("nox_tickets_deleted_total", "Total tickets deleted").unwrap()
});

/// Time from opening to finishing, observed when a ticket is finished.
pub static RESOLUTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "nox_tickets_resolution_duration_seconds",
            "Total duration of finished tickets",
        )
        .buckets(vec![
            300.0, 900.0, 3600.0, 4.0 * 3600.0, 8.0 * 3600.0, 86400.0, 3.0 * 86400.0,
            7.0 * 86400.0, 30.0 * 86400.0,
        ]),
        &["category"],
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TICKETS_CREATED.clone()),
        Box::new(STATUS_TRANSITIONS.clone()),
        Box::new(MODIFICATIONS_RECORDED.clone()),
        Box::new(OBSERVATIONS_ADDED.clone()),
        Box::new(TICKETS_DELETED.clone()),
        Box::new(RESOLUTION_DURATION.clone()),
    ]
}
