//! Metric names and recording helpers for the admission engine.

use metrics::{counter, describe_counter, describe_histogram};

/// Purchase outcome counter, labeled by `result`.
pub const PURCHASE_RESULTS: &str = "purchase_results_total";

/// Purchase pipeline duration histogram.
pub const PURCHASE_DURATION: &str = "purchase_duration_seconds";

/// Counter of compensation operations that themselves failed, labeled by `op`.
///
/// A non-zero value means coordinator state has drifted and a reconciliation
/// pass is needed.
pub const COMPENSATION_FAILURES: &str = "compensation_failures_total";

/// Counter of user marks rebuilt from the order log.
pub const USER_MARKS_RECOVERED: &str = "user_marks_recovered_total";

/// Registers descriptions for all engine metrics.
///
/// Safe to call multiple times.
pub fn describe_metrics() {
    describe_counter!(PURCHASE_RESULTS, "Total purchase attempts by outcome");
    describe_histogram!(
        PURCHASE_DURATION,
        "Duration of the purchase admission pipeline in seconds"
    );
    describe_counter!(
        COMPENSATION_FAILURES,
        "Compensating coordinator operations that failed"
    );
    describe_counter!(
        USER_MARKS_RECOVERED,
        "User marks rebuilt from the order log by recovery"
    );
}

pub(crate) fn record_purchase_result(result: &'static str) {
    counter!(PURCHASE_RESULTS, "result" => result).increment(1);
}

pub(crate) fn record_compensation_failure(op: &'static str) {
    counter!(COMPENSATION_FAILURES, "op" => op).increment(1);
}

pub(crate) fn record_marks_recovered(count: u64) {
    counter!(USER_MARKS_RECOVERED).increment(count);
}
