//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tunnel_lb_backend_health` (gauge): 1=healthy, 0=unhealthy, per backend
//! - `tunnel_lb_frames_total` (counter): tunnel frames by outcome (forwarded, dropped)
//! - `tunnel_lb_packets_sent_total` (counter): packets handed to the sink
//! - `tunnel_lb_send_errors_total` (counter): sink failures
//! - `tunnel_lb_pool_version` / `tunnel_lb_pool_backends` (gauges): active pool
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Expose a Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    metrics::gauge!("tunnel_lb_backend_health", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_frame(outcome: &'static str) {
    metrics::counter!("tunnel_lb_frames_total", "outcome" => outcome).increment(1);
}

pub fn record_packet_sent() {
    metrics::counter!("tunnel_lb_packets_sent_total").increment(1);
}

pub fn record_send_error() {
    metrics::counter!("tunnel_lb_send_errors_total").increment(1);
}

pub fn record_pool_installed(version: u64, backends: usize) {
    metrics::gauge!("tunnel_lb_pool_version").set(version as f64);
    metrics::gauge!("tunnel_lb_pool_backends").set(backends as f64);
}

#[cfg(test)]
pub(crate) mod capture {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use metrics::{
        Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };

    type Values = Arc<Mutex<HashMap<String, f64>>>;

    /// Test recorder keeping the last value of every backend health gauge.
    #[derive(Default)]
    pub(crate) struct HealthGauges {
        values: Values,
    }

    impl HealthGauges {
        pub(crate) fn get(&self, backend: &str) -> Option<f64> {
            self.values.lock().unwrap().get(backend).copied()
        }
    }

    struct BackendGauge {
        backend: String,
        values: Values,
    }

    impl GaugeFn for BackendGauge {
        fn increment(&self, _value: f64) {}

        fn decrement(&self, _value: f64) {}

        fn set(&self, value: f64) {
            self.values
                .lock()
                .unwrap()
                .insert(self.backend.clone(), value);
        }
    }

    impl Recorder for HealthGauges {
        fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

        fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

        fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

        fn register_counter(&self, _key: &Key, _metadata: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
            if key.name() != "tunnel_lb_backend_health" {
                return Gauge::noop();
            }
            match key.labels().find(|label| label.key() == "backend") {
                Some(label) => Gauge::from_arc(Arc::new(BackendGauge {
                    backend: label.value().to_string(),
                    values: self.values.clone(),
                })),
                None => Gauge::noop(),
            }
        }

        fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }
}
