//! Prometheus metrics

use std::time::Duration;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// BUY or SELL signal produced
    Signal,
    /// Actionable signal ignored because the instrument was busy
    SignalDeferred,
    /// Order acknowledged by the exchange
    OrderSubmitted,
    /// Order submission failed after retries or was rejected
    OrderFailure,
    /// Bracket leg filled and the position closed
    PositionClosed,
    /// Tick dropped because the worker was still busy
    MissedTick,
    /// Cycle abandoned at its deadline
    CycleTimeout,
    /// Cycle ended with an error
    CycleError,
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            CounterMetric::Signal => "volspike_signals_total",
            CounterMetric::SignalDeferred => "volspike_signals_deferred_total",
            CounterMetric::OrderSubmitted => "volspike_orders_submitted_total",
            CounterMetric::OrderFailure => "volspike_order_failures_total",
            CounterMetric::PositionClosed => "volspike_positions_closed_total",
            CounterMetric::MissedTick => "volspike_missed_ticks_total",
            CounterMetric::CycleTimeout => "volspike_cycle_timeouts_total",
            CounterMetric::CycleError => "volspike_cycle_errors_total",
        }
    }
}

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Full worker cycle: fetch, detect, reconcile, act
    Cycle,
    /// Candle fetch from the feed
    CandleFetch,
    /// Order submission including retries
    OrderSubmission,
}

impl LatencyMetric {
    fn name(self) -> &'static str {
        match self {
            LatencyMetric::Cycle => "volspike_cycle_duration_ms",
            LatencyMetric::CandleFetch => "volspike_candle_fetch_ms",
            LatencyMetric::OrderSubmission => "volspike_order_submission_ms",
        }
    }
}

/// Increment a counter. `detail` narrows it (direction, order kind, error kind).
pub fn increment(metric: CounterMetric, instrument: &str, detail: &'static str) {
    ::metrics::counter!(
        metric.name(),
        "instrument" => instrument.to_string(),
        "detail" => detail
    )
    .increment(1);
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, instrument: &str, duration: Duration) {
    ::metrics::histogram!(metric.name(), "instrument" => instrument.to_string())
        .record(duration.as_secs_f64() * 1_000.0);
}

/// Publish the controller state as a gauge (0 flat .. 3 bracket active)
pub fn set_state(instrument: &str, state_code: u8) {
    ::metrics::gauge!("volspike_instrument_state", "instrument" => instrument.to_string())
        .set(f64::from(state_code));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        for metric in [
            CounterMetric::Signal,
            CounterMetric::OrderSubmitted,
            CounterMetric::OrderFailure,
            CounterMetric::MissedTick,
        ] {
            assert!(metric.name().starts_with("volspike_"));
            assert!(metric.name().ends_with("_total"));
        }
        assert_eq!(LatencyMetric::Cycle.name(), "volspike_cycle_duration_ms");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        increment(CounterMetric::Signal, "SUIUSDT", "BUY");
        record_latency(LatencyMetric::Cycle, "SUIUSDT", Duration::from_millis(12));
        set_state("SUIUSDT", 0);
    }
}
