use actix_web::{get, web, HttpResponse, Responder};
use humantime::format_duration;
use chrono::Utc;
use std::time::Duration;
use serde::Serialize;

use crate::{constants::START_TIME, limiter::rate_limiter::RateLimitStore, mailer::forwarder::Forwarder, AppState};

#[derive(Serialize, Clone)]
struct HealthCheckResponse {
    status: String,
    uptime: String,
    timestamp: String,
    start_at: String,
    version: String,
    provider: String,
    content_inspection: bool,
    tracked_identifiers: Option<usize>,
}

#[get("/health")]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let now_utc = Utc::now();
    let uptime_secs = now_utc.signed_duration_since(*START_TIME).num_seconds().max(0) as u64;

    let gatekeeper = &state.contact_handler;
    let tracked_identifiers = match gatekeeper.rate_store.tracked_identifiers().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!("Rate limit store unavailable for health check: {}", e);
            None
        }
    };

    HttpResponse::Ok().json(HealthCheckResponse {
        status: "healthy".to_string(),
        uptime: format_duration(Duration::from_secs(uptime_secs)).to_string(),
        timestamp: now_utc.to_rfc3339(),
        start_at: START_TIME.to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider: gatekeeper.forwarder.provider_name().to_string(),
        content_inspection: gatekeeper.policy.content_inspection,
        tracked_identifiers,
    })
}
