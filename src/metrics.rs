// Prometheus metrics definitions for the arena.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Pending player records waiting for a battle to end.
    pub static ref PENDING_RECORDS: IntGauge =
        IntGauge::new("botfight_pending_records", "Pending player records awaiting reconciliation").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total battles started.
    pub static ref BATTLES_STARTED_TOTAL: IntCounter =
        IntCounter::new("botfight_battles_started_total", "Total battles started").unwrap();

    /// Total battles finished, by result from the player's side (win, loss).
    pub static ref BATTLES_COMPLETED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("botfight_battles_completed_total", "Total battles finished"),
        &["result"],
    )
    .unwrap();

    /// Accepted half-turns, by side (player, opponent).
    pub static ref MOVES_PLAYED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("botfight_moves_played_total", "Accepted half-turns"),
        &["side"],
    )
    .unwrap();

    /// Moves rejected for insufficient energy.
    pub static ref MOVES_REJECTED_TOTAL: IntCounter = IntCounter::new(
        "botfight_moves_rejected_total",
        "Moves rejected for insufficient energy",
    )
    .unwrap();

    /// Reconciliations against player storage, by result (created, updated, error).
    pub static ref RECONCILIATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("botfight_reconciliations_total", "Player record reconciliations"),
        &["result"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Wall-clock battle duration in seconds.
    pub static ref BATTLE_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("botfight_battle_duration_seconds", "Battle duration in seconds")
            .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PENDING_RECORDS.clone()),
        Box::new(BATTLES_STARTED_TOTAL.clone()),
        Box::new(BATTLES_COMPLETED_TOTAL.clone()),
        Box::new(MOVES_PLAYED_TOTAL.clone()),
        Box::new(MOVES_REJECTED_TOTAL.clone()),
        Box::new(RECONCILIATIONS_TOTAL.clone()),
        Box::new(BATTLE_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        if let Err(e) = REGISTRY.register(c) {
            tracing::warn!("metric registration skipped: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
