//! Render request metrics, exported through the Prometheus recorder.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

pub fn record_render_request() {
    counter!("render_requests_total").increment(1);
}

pub fn record_render_success(duration: Duration, bytes: usize) {
    histogram!("render_duration_ms").record(duration.as_secs_f64() * 1000.0);
    histogram!("render_output_bytes").record(bytes as f64);
}

pub fn record_render_error(code: &'static str) {
    counter!("render_errors_total", "code" => code).increment(1);
}

pub fn set_renders_in_flight(count: usize) {
    gauge!("renders_in_flight").set(count as f64);
}
