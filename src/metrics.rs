//! Prometheus counters for the gateway, exposed at `GET /metrics`.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,

    /// Accepted generation requests, by effective mode.
    pub requests: IntCounterVec,

    /// Requests answered with a 4xx, by reason.
    pub rejected: IntCounterVec,

    /// Fields replaced by their default during normalization.
    pub defaulted: IntCounterVec,

    /// Upstream completion failures, by provider.
    pub upstream_failures: IntCounterVec,

    /// Chunks forwarded to streaming clients.
    pub stream_chunks: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("gateway_requests_total", "Accepted generation requests"),
            &["mode"],
        )?;
        let rejected = IntCounterVec::new(
            Opts::new("gateway_rejected_requests_total", "Rejected generation requests"),
            &["reason"],
        )?;
        let defaulted = IntCounterVec::new(
            Opts::new(
                "gateway_defaulted_fields_total",
                "Request fields replaced by their default",
            ),
            &["field"],
        )?;
        let upstream_failures = IntCounterVec::new(
            Opts::new("gateway_upstream_failures_total", "Failed upstream completions"),
            &["provider"],
        )?;
        let stream_chunks = IntCounter::new(
            "gateway_stream_chunks_total",
            "Chunks forwarded to streaming clients",
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(rejected.clone()))?;
        registry.register(Box::new(defaulted.clone()))?;
        registry.register(Box::new(upstream_failures.clone()))?;
        registry.register(Box::new(stream_chunks.clone()))?;

        Ok(Self {
            registry,
            requests,
            rejected,
            defaulted,
            upstream_failures,
            stream_chunks,
        })
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
