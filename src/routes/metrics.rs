use axum::http::{header, StatusCode};
use prometheus::{Encoder, TextEncoder};

/// GET /metrics — board counters in the Prometheus text format.
pub async fn export_metrics() -> Result<([(header::HeaderName, &'static str); 1], String), StatusCode> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let body = String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}
