// Metrics and observability module
// This file handles collection and reporting of router statistics.
// Sinks are owned by the orchestrator instance, never process-global
//
// Numan Thabit 2025 Nov

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::time::Duration;

/// Cache names used as metric labels.
pub const CANDIDATE_CACHE: &str = "candidate_routes";
pub const RANKED_CACHE: &str = "ranked_routes";

pub trait MetricsSink: Send + Sync {
    fn cache_hit(&self, cache: &str);
    fn cache_miss(&self, cache: &str);
    /// A candidate route was excluded, e.g. because a pool capability failed.
    fn route_dropped(&self, reason: &str);
    fn spot_price_error(&self, pool_id: u64);
    fn candidate_search(&self);
    fn quote_latency(&self, method: &str, elapsed: Duration);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn cache_hit(&self, _: &str) {}
    fn cache_miss(&self, _: &str) {}
    fn route_dropped(&self, _: &str) {}
    fn spot_price_error(&self, _: u64) {}
    fn candidate_search(&self) {}
    fn quote_latency(&self, _: &str, _: Duration) {}
}

/// Prometheus-backed sink registered into its own registry.
pub struct PrometheusMetrics {
    registry: Registry,
    cache_lookups: IntCounterVec,
    routes_dropped: IntCounterVec,
    spot_price_errors: IntCounterVec,
    candidate_searches: IntCounterVec,
    quote_latency: HistogramVec,
}

impl PrometheusMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let cache_lookups = IntCounterVec::new(
            Opts::new("router_cache_lookups_total", "cache lookups by cache and outcome"),
            &["cache", "outcome"],
        )?;
        let routes_dropped = IntCounterVec::new(
            Opts::new("router_routes_dropped_total", "routes excluded from a quote"),
            &["reason"],
        )?;
        let spot_price_errors = IntCounterVec::new(
            Opts::new("router_spot_price_errors_total", "spot price failures by pool"),
            &["pool_id"],
        )?;
        let candidate_searches = IntCounterVec::new(
            Opts::new("router_candidate_searches_total", "candidate route searches run"),
            &[],
        )?;
        let quote_latency = HistogramVec::new(
            HistogramOpts::new("router_quote_latency_seconds", "quote computation latency"),
            &["method"],
        )?;

        registry.register(Box::new(cache_lookups.clone()))?;
        registry.register(Box::new(routes_dropped.clone()))?;
        registry.register(Box::new(spot_price_errors.clone()))?;
        registry.register(Box::new(candidate_searches.clone()))?;
        registry.register(Box::new(quote_latency.clone()))?;

        Ok(Self {
            registry,
            cache_lookups,
            routes_dropped,
            spot_price_errors,
            candidate_searches,
            quote_latency,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl MetricsSink for PrometheusMetrics {
    fn cache_hit(&self, cache: &str) {
        self.cache_lookups.with_label_values(&[cache, "hit"]).inc();
    }

    fn cache_miss(&self, cache: &str) {
        self.cache_lookups.with_label_values(&[cache, "miss"]).inc();
    }

    fn route_dropped(&self, reason: &str) {
        self.routes_dropped.with_label_values(&[reason]).inc();
    }

    fn spot_price_error(&self, pool_id: u64) {
        self.spot_price_errors
            .with_label_values(&[&pool_id.to_string()])
            .inc();
    }

    fn candidate_search(&self) {
        self.candidate_searches.with_label_values(&[]).inc();
    }

    fn quote_latency(&self, method: &str, elapsed: Duration) {
        self.quote_latency
            .with_label_values(&[method])
            .observe(elapsed.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instances_do_not_share_counters() {
        let a = PrometheusMetrics::new().unwrap();
        let b = PrometheusMetrics::new().unwrap();
        a.cache_hit(CANDIDATE_CACHE);
        a.cache_hit(CANDIDATE_CACHE);
        b.cache_miss(CANDIDATE_CACHE);

        assert_eq!(
            a.cache_lookups.with_label_values(&[CANDIDATE_CACHE, "hit"]).get(),
            2
        );
        assert_eq!(
            b.cache_lookups.with_label_values(&[CANDIDATE_CACHE, "hit"]).get(),
            0
        );
        assert!(!a.registry().gather().is_empty());
    }
}
