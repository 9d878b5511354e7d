//! ## mqttrace-telemetry::metrics
//! **Prometheus exporter for instrumented clients**
//!
//! Counts recorded events per direction and packet type, tracks the latency
//! of the wrapped operations and counts calls whose telemetry could not be
//! recorded.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub recorded_events: IntCounterVec,
    pub telemetry_failures: IntCounterVec,
    pub execution_time: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let recorded_events = IntCounterVec::new(
            Opts::new("mqttrace_events_total", "Telemetry events recorded"),
            &["direction", "packet_type"],
        )?;
        let telemetry_failures = IntCounterVec::new(
            Opts::new(
                "mqttrace_telemetry_failures_total",
                "Intercepted calls whose telemetry event was not recorded",
            ),
            &["reason"],
        )?;
        let execution_time = Histogram::with_opts(
            HistogramOpts::new(
                "mqttrace_execution_time_seconds",
                "Duration of the wrapped client operation",
            )
            .buckets(vec![0.0001, 0.001, 0.01, 0.1, 1.0]),
        )?;

        registry.register(Box::new(recorded_events.clone()))?;
        registry.register(Box::new(telemetry_failures.clone()))?;
        registry.register(Box::new(execution_time.clone()))?;

        Ok(Self {
            registry,
            recorded_events,
            telemetry_failures,
            execution_time,
        })
    }

    pub fn observe_event(&self, direction: &str, packet_type: &str, execution_seconds: f64) {
        self.recorded_events
            .with_label_values(&[direction, packet_type])
            .inc();
        self.execution_time.observe(execution_seconds);
    }

    pub fn inc_telemetry_failure(&self, reason: &str) {
        self.telemetry_failures.with_label_values(&[reason]).inc();
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
