use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

const REQUEST_DURATION: &str = "http_request_duration_seconds";
const REFERRAL_EVENTS: &str = "referral_events_total";

/// Latency buckets sized for argon2-bound endpoints (register/login sit in the
/// 50-500ms range).
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// Business events counted under `referral_events_total{event=...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralEvent {
    AccountRegistered,
    LoginSucceeded,
    LoginFailed,
    CodeIssued,
    CodeReplaced,
    CodeDeleted,
    ReferralRecorded,
}

impl ReferralEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountRegistered => "account_registered",
            Self::LoginSucceeded => "login_succeeded",
            Self::LoginFailed => "login_failed",
            Self::CodeIssued => "code_issued",
            Self::CodeReplaced => "code_replaced",
            Self::CodeDeleted => "code_deleted",
            Self::ReferralRecorded => "referral_recorded",
        }
    }
}

/// No-op until a recorder is installed, so services and tests can call it freely.
pub fn record_referral_event(event: ReferralEvent) {
    counter!(REFERRAL_EVENTS, "event" => event.as_str()).increment(1);
}

pub async fn metrics_middleware(
    matched_path: Option<MatchedPath>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().as_str().to_owned();
    let route = match matched_path {
        Some(p) => p.as_str().to_owned(),
        None => "unmatched".to_owned(),
    };

    let response = next.run(req).await;

    let labels = [
        ("method", method),
        ("route", route),
        ("status", response.status().as_u16().to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!(REQUEST_DURATION, &labels).record(start.elapsed().as_secs_f64());

    response
}

/// Installs the global Prometheus recorder. Call once, from `main`.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_owned()), LATENCY_BUCKETS)?
        .install_recorder()
}
