//! Catalog metrics.
//!
//! Counters and histograms for reconciliation and registration. These complement
//! the structured logs emitted at each reconciliation milestone.

use metrics::{counter, describe_counter, describe_histogram, histogram};

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Reconciliation runs, labelled by outcome.
pub const RECONCILE_RUNS: &str = "cairn_reconcile_runs_total";

/// Reconciliation run duration histogram.
pub const RECONCILE_DURATION: &str = "cairn_reconcile_duration_seconds";

/// Runs that registered nothing because of a gap at the outset.
pub const GAP_SUPPRESSED: &str = "cairn_reconcile_gap_suppressed_total";

// ============================================================================
// Registration Metrics
// ============================================================================

/// Data versions registered, labelled by source.
pub const VERSIONS_REGISTERED: &str = "cairn_versions_registered_total";

/// Status transitions, labelled by target status.
pub const STATUS_TRANSITIONS: &str = "cairn_status_transitions_total";

// ============================================================================
// Metric Registration
// ============================================================================

/// Registers all catalog metric descriptions.
///
/// Call this once at application startup after installing a metrics recorder.
pub fn register_metrics() {
    describe_counter!(RECONCILE_RUNS, "Total reconciliation runs by outcome");
    describe_histogram!(RECONCILE_DURATION, "Duration of reconciliation runs in seconds");
    describe_counter!(
        GAP_SUPPRESSED,
        "Total reconciliation runs suppressed by a version gap at the outset"
    );
    describe_counter!(VERSIONS_REGISTERED, "Total data versions registered by source");
    describe_counter!(STATUS_TRANSITIONS, "Total data status transitions by target");
}

// ============================================================================
// Metric Recording
// ============================================================================

/// Records the end of a reconciliation run.
pub fn record_reconcile(outcome: &'static str, registered: usize, duration_secs: f64) {
    counter!(RECONCILE_RUNS, "outcome" => outcome).increment(1);
    histogram!(RECONCILE_DURATION, "outcome" => outcome).record(duration_secs);
    if registered > 0 {
        record_versions_registered("reconcile", registered);
    }
}

/// Records versions registered by `source` (`reconcile` or `pre_register`).
pub fn record_versions_registered(source: &'static str, count: usize) {
    counter!(VERSIONS_REGISTERED, "source" => source).increment(u64::try_from(count).unwrap_or(u64::MAX));
}

/// Records a run suppressed by the gap rule.
pub fn record_gap_suppressed() {
    counter!(GAP_SUPPRESSED).increment(1);
}

/// Records a status transition.
pub fn record_status_transition(to: &'static str) {
    counter!(STATUS_TRANSITIONS, "to" => to).increment(1);
}
