// src/metrics.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct Metrics {
    pub msgs_decoded: AtomicU64,
    pub decode_errors: AtomicU64,
    pub unknown_tags: AtomicU64,
    pub msgs_applied: AtomicU64,
    pub book_touches: AtomicU64,
    pub observations: AtomicU64,

    // ultra-cheap latency “histogram” (power-of-2 buckets in ns)
    pub apply_lat_b0: AtomicU64,
    pub apply_lat_b1: AtomicU64,
    pub apply_lat_b2: AtomicU64,
    pub apply_lat_b3: AtomicU64,
    pub apply_lat_b4: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_decoded(&self) {
        self.msgs_decoded.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_decode_err(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_unknown_tag(&self) {
        self.unknown_tags.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_applied(&self) {
        self.msgs_applied.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_touched(&self) {
        self.book_touches.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_observation(&self) {
        self.observations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_apply(&self, dur: Duration) {
        let ns = dur.as_nanos() as u64;
        // buckets: <250ns, <500ns, <1us, <2us, >=2us
        if ns < 250 {
            self.apply_lat_b0.fetch_add(1, Ordering::Relaxed);
        } else if ns < 500 {
            self.apply_lat_b1.fetch_add(1, Ordering::Relaxed);
        } else if ns < 1_000 {
            self.apply_lat_b2.fetch_add(1, Ordering::Relaxed);
        } else if ns < 2_000 {
            self.apply_lat_b3.fetch_add(1, Ordering::Relaxed);
        } else {
            self.apply_lat_b4.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn prometheus_text(&self) -> String {
        // NOTE: totals can stay Relaxed; prom scrape consistency isn’t transactional anyway.
        let decoded = self.msgs_decoded.load(Ordering::Relaxed);
        let derr = self.decode_errors.load(Ordering::Relaxed);
        let unk = self.unknown_tags.load(Ordering::Relaxed);
        let applied = self.msgs_applied.load(Ordering::Relaxed);
        let touched = self.book_touches.load(Ordering::Relaxed);
        let obs = self.observations.load(Ordering::Relaxed);

        let b0 = self.apply_lat_b0.load(Ordering::Relaxed);
        let b1 = self.apply_lat_b1.load(Ordering::Relaxed);
        let b2 = self.apply_lat_b2.load(Ordering::Relaxed);
        let b3 = self.apply_lat_b3.load(Ordering::Relaxed);
        let b4 = self.apply_lat_b4.load(Ordering::Relaxed);

        format!(
            "\
# TYPE itchbook_msgs_decoded_total counter
itchbook_msgs_decoded_total {decoded}
# TYPE itchbook_decode_errors_total counter
itchbook_decode_errors_total {derr}
# TYPE itchbook_unknown_tags_total counter
itchbook_unknown_tags_total {unk}
# TYPE itchbook_msgs_applied_total counter
itchbook_msgs_applied_total {applied}
# TYPE itchbook_book_touches_total counter
itchbook_book_touches_total {touched}
# TYPE itchbook_observations_total counter
itchbook_observations_total {obs}
# TYPE itchbook_apply_latency_bucket counter
itchbook_apply_latency_bucket{{le=\"250\"}} {b0}
itchbook_apply_latency_bucket{{le=\"500\"}} {b1}
itchbook_apply_latency_bucket{{le=\"1000\"}} {b2}
itchbook_apply_latency_bucket{{le=\"2000\"}} {b3}
itchbook_apply_latency_bucket{{le=\"+Inf\"}} {b4}
"
        )
    }
}
