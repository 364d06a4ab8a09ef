//! Metrics reporting.
//!
//! The pool reports through [`MetricsReporter`]. Reporting is best-effort:
//! implementations swallow (and log) their own failures so a broken sink can
//! never stall reconciliation.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

/// Content type of [`PrometheusReporter::render`] output.
pub use prometheus::TEXT_FORMAT;

/// Label set attached to a sample, as `(name, value)` pairs.
pub type Labels<'a> = &'a [(&'a str, &'a str)];

pub trait MetricsReporter: Send + Sync {
    /// Set a gauge.
    fn observe(&self, gauge: &str, labels: Labels<'_>, value: f64);
    /// Add one to an up/down counter.
    fn increment(&self, counter: &str, labels: Labels<'_>);
    /// Subtract one from an up/down counter.
    fn decrement(&self, counter: &str, labels: Labels<'_>);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl MetricsReporter for NoopReporter {
    fn observe(&self, _gauge: &str, _labels: Labels<'_>, _value: f64) {}
    fn increment(&self, _counter: &str, _labels: Labels<'_>) {}
    fn decrement(&self, _counter: &str, _labels: Labels<'_>) {}
}

// ── Prometheus ────────────────────────────────────────────────────────────────

struct Family {
    vec: GaugeVec,
    label_names: Vec<String>,
}

/// Reporter backed by a Prometheus registry.
///
/// Metric families are created lazily on first use. Up/down counters are
/// gauges, since Prometheus counters cannot decrease. A family's label names
/// are fixed by its first sample; later samples with a different label set
/// are dropped.
pub struct PrometheusReporter {
    registry: Registry,
    families: DashMap<String, Family>,
}

impl Default for PrometheusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusReporter {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            families: DashMap::new(),
        }
    }

    /// Render every registered family in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn with_gauge<F>(&self, name: &str, labels: Labels<'_>, apply: F)
    where
        F: FnOnce(&prometheus::Gauge),
    {
        let vec = match self.family(name, labels) {
            Ok(vec) => vec,
            Err(e) => {
                tracing::warn!(metric = name, error = %e, "dropping metric sample");
                return;
            }
        };
        let values: Vec<&str> = labels.iter().map(|(_, v)| *v).collect();
        match vec.get_metric_with_label_values(&values) {
            Ok(gauge) => apply(&gauge),
            Err(e) => tracing::warn!(metric = name, error = %e, "dropping metric sample"),
        }
    }

    fn family(&self, name: &str, labels: Labels<'_>) -> Result<GaugeVec, prometheus::Error> {
        let label_names: Vec<String> = labels.iter().map(|(k, _)| k.to_string()).collect();

        match self.families.entry(name.to_string()) {
            Entry::Occupied(e) => {
                let family = e.get();
                if family.label_names != label_names {
                    return Err(prometheus::Error::InconsistentCardinality {
                        expect: family.label_names.len(),
                        got: label_names.len(),
                    });
                }
                Ok(family.vec.clone())
            }
            Entry::Vacant(e) => {
                let names: Vec<&str> = label_names.iter().map(String::as_str).collect();
                let opts = Opts::new(name, format!("surge pool metric {name}"));
                let vec = GaugeVec::new(opts, &names)?;
                self.registry.register(Box::new(vec.clone()))?;
                e.insert(Family {
                    vec: vec.clone(),
                    label_names,
                });
                Ok(vec)
            }
        }
    }
}

impl MetricsReporter for PrometheusReporter {
    fn observe(&self, gauge: &str, labels: Labels<'_>, value: f64) {
        self.with_gauge(gauge, labels, |g| g.set(value));
    }

    fn increment(&self, counter: &str, labels: Labels<'_>) {
        self.with_gauge(counter, labels, |g| g.inc());
    }

    fn decrement(&self, counter: &str, labels: Labels<'_>) {
        self.with_gauge(counter, labels, |g| g.dec());
    }
}
