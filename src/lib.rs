use std::sync::Arc;

mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;
pub mod background_task;

pub use domain::{clock, entities, heuristics, inspector, sanitizer, use_cases};
pub use interfaces::{handlers, routes};
pub use infrastructure::{limiter, mailer, utils};

use errors::MailerError;
use limiter::rate_limiter::{InMemoryRateLimitStore, RateLimitPolicy};
use mailer::forwarder::{EmailProvider, Forwarder};
use use_cases::gatekeeper::{GatekeeperPolicy, SubmissionGatekeeper};
use utils::client_ip::IdentityPolicy;

pub struct AppState {
    pub contact_handler: AppContactHandler,
    pub identity: IdentityPolicy,
    pub max_body_bytes: usize,
}

pub type AppContactHandler = SubmissionGatekeeper<InMemoryRateLimitStore, Arc<dyn Forwarder>>;

impl AppState {
    /// Builds state with the email provider named in the configuration.
    pub fn new(config: &settings::AppConfig) -> Result<Self, MailerError> {
        let provider = EmailProvider::from_config(config)?;
        Ok(Self::with_forwarder(config, Arc::new(provider)))
    }

    pub fn with_forwarder(config: &settings::AppConfig, forwarder: Arc<dyn Forwarder>) -> Self {
        let rate_store = InMemoryRateLimitStore::new(RateLimitPolicy {
            ceiling: config.rate_limit_ceiling,
            window_ms: config.rate_limit_window_ms as i64,
        });

        AppState {
            contact_handler: SubmissionGatekeeper::new(
                rate_store,
                forwarder,
                GatekeeperPolicy::from(config),
            ),
            identity: IdentityPolicy {
                platform_header: config.platform_ip_header
                    .as_deref()
                    .map(|h| h.trim().to_ascii_lowercase())
                    .filter(|h| !h.is_empty()),
                trust_proxy_headers: config.trust_proxy_headers,
            },
            max_body_bytes: config.max_body_bytes,
        }
    }
}
