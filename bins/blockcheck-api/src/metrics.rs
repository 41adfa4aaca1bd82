// Prometheus metrics for the verification API
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};

lazy_static! {
    pub static ref SUITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blockcheck_suites_total",
        "Verified submissions by outcome",
        &["result"]
    )
    .unwrap();
    pub static ref SUITE_DURATION: Histogram = register_histogram!(
        "blockcheck_suite_duration_seconds",
        "Wall time to verify one submission",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap();
}

pub fn record_suite(passed: bool, seconds: f64) {
    let result = if passed { "passed" } else { "failed" };
    SUITES_TOTAL.with_label_values(&[result]).inc();
    SUITE_DURATION.observe(seconds);
}

/// Text exposition of every registered metric
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_suites_are_exported() {
        record_suite(true, 0.2);
        record_suite(false, 1.5);
        let body = render().unwrap();
        assert!(body.contains("blockcheck_suites_total{result=\"passed\"}"));
        assert!(body.contains("blockcheck_suites_total{result=\"failed\"}"));
        assert!(body.contains("blockcheck_suite_duration_seconds_count"));
    }
}
