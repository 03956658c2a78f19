use std::{future::Future, sync::Arc};

use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        clock::{Clock, SystemClock},
        heuristics, inspector, sanitizer,
    },
    entities::submission::{ContactResponse, OutboundEmail, RawSubmission, Verdict},
    errors::AppError,
    limiter::rate_limiter::{RateDecision, RateLimitStore},
    mailer::forwarder::Forwarder,
    settings::AppConfig,
};

/// Knobs the pipeline reads on every submission.
#[derive(Debug, Clone, PartialEq)]
pub struct GatekeeperPolicy {
    pub content_inspection: bool,
    pub min_fill_time_ms: u64,
    pub retry_after_secs: u64,
    pub mail_from: String,
    pub mail_to: String,
    pub subject_prefix: String,
}

impl From<&AppConfig> for GatekeeperPolicy {
    fn from(config: &AppConfig) -> Self {
        GatekeeperPolicy {
            content_inspection: config.content_inspection,
            min_fill_time_ms: config.min_fill_time_ms,
            retry_after_secs: config.retry_after_secs(),
            mail_from: config.mail_from.trim().to_string(),
            mail_to: config.mail_to.trim().to_string(),
            subject_prefix: config.subject_prefix.clone(),
        }
    }
}

/// Request metadata the pipeline needs before the body is read.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMeta {
    pub identifier: String,
    pub user_agent: Option<String>,
}

pub struct SubmissionGatekeeper<S, F>
where
    S: RateLimitStore,
    F: Forwarder,
{
    pub rate_store: S,
    pub forwarder: F,
    pub policy: GatekeeperPolicy,
    clock: Arc<dyn Clock>,
}

impl<S, F> SubmissionGatekeeper<S, F>
where
    S: RateLimitStore,
    F: Forwarder,
{
    pub fn new(rate_store: S, forwarder: F, policy: GatekeeperPolicy) -> Self {
        SubmissionGatekeeper {
            rate_store,
            forwarder,
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Runs the checks in order and stops at the first one that fails.
    ///
    /// `read_form` is only awaited once the user agent and rate limit checks
    /// have passed, so throttled and header-less callers never cost a body read.
    pub async fn evaluate<Fut>(&self, meta: &RequestMeta, read_form: Fut) -> Verdict
    where
        Fut: Future<Output = Result<RawSubmission, AppError>>,
    {
        if let Some(signal) = heuristics::check_user_agent(meta.user_agent.as_deref()) {
            return Verdict::RejectedSilently(signal);
        }

        match self.rate_store.hit(&meta.identifier, self.clock.now_ms()).await {
            Ok(RateDecision::Allowed) => {}
            Ok(RateDecision::Limited) => {
                return Verdict::RejectedWithError(AppError::RateLimited {
                    retry_after_secs: self.policy.retry_after_secs,
                });
            }
            Err(e) => {
                // Soft limiter: a broken store must not take the form down.
                tracing::error!(identifier = %meta.identifier, error = %e, "Rate limit store failed, allowing request");
            }
        }

        let raw = match read_form.await {
            Ok(raw) => raw,
            Err(e) => return Verdict::RejectedWithError(e),
        };

        if let Some(signal) = heuristics::check_honeypot(&raw) {
            return Verdict::RejectedSilently(signal);
        }
        if let Some(signal) =
            heuristics::check_fill_time(&raw, self.clock.now_ms(), self.policy.min_fill_time_ms)
        {
            return Verdict::RejectedSilently(signal);
        }

        let form = match raw.require_fields() {
            Ok(form) => form,
            Err(e) => return Verdict::RejectedWithError(e),
        };
        if let Err(errors) = form.validate() {
            return Verdict::RejectedWithError(errors.into());
        }

        if self.policy.content_inspection {
            if let Some((field, violation)) = inspector::inspect_form(&form) {
                tracing::info!(identifier = %meta.identifier, field, ?violation, "Content inspection rejected submission");
                return Verdict::RejectedWithError(AppError::ContentNotPermitted);
            }
        }

        Verdict::Accepted(sanitizer::sanitize(&form))
    }

    /// Evaluates a submission and forwards it if accepted.
    ///
    /// Bot signals are answered with the same success body as a real
    /// delivery. Every other failure comes back as an [`AppError`].
    pub async fn submit<Fut>(
        &self,
        meta: &RequestMeta,
        read_form: Fut,
    ) -> Result<ContactResponse, AppError>
    where
        Fut: Future<Output = Result<RawSubmission, AppError>>,
    {
        let submission_id = Uuid::new_v4();

        match self.evaluate(meta, read_form).await {
            Verdict::RejectedSilently(signal) => {
                tracing::info!(
                    %submission_id,
                    identifier = %meta.identifier,
                    signal = signal.as_str(),
                    "Bot submission silently discarded"
                );
                Ok(ContactResponse::delivered())
            }
            Verdict::RejectedWithError(err) => {
                match &err {
                    AppError::RateLimited { .. } => tracing::warn!(
                        %submission_id, identifier = %meta.identifier, "Submission rate limited"
                    ),
                    AppError::Internal(_) => tracing::error!(
                        %submission_id, identifier = %meta.identifier, error = %err, "Failed to read submission"
                    ),
                    _ => tracing::info!(
                        %submission_id, identifier = %meta.identifier, error = %err, "Submission rejected"
                    ),
                }
                Err(err)
            }
            Verdict::Accepted(submission) => {
                let email = OutboundEmail::compose(
                    &self.policy.mail_from,
                    &self.policy.mail_to,
                    &self.policy.subject_prefix,
                    &submission,
                    &meta.identifier,
                    submission_id,
                );

                self.forwarder.forward(&email).await.map_err(|e| {
                    tracing::error!(
                        %submission_id,
                        identifier = %meta.identifier,
                        provider = self.forwarder.provider_name(),
                        error = %e,
                        "Failed to forward contact message"
                    );
                    AppError::from(e)
                })?;

                tracing::info!(%submission_id, identifier = %meta.identifier, "Contact message forwarded");
                Ok(ContactResponse::delivered())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::{
        domain::clock::ManualClock,
        entities::submission::BotSignal,
        errors::MailerError,
        limiter::rate_limiter::{InMemoryRateLimitStore, RateLimitPolicy},
        mailer::forwarder::MockForwarder,
    };

    const NOW: i64 = 1_700_000_000_000;

    fn policy() -> GatekeeperPolicy {
        GatekeeperPolicy {
            content_inspection: true,
            min_fill_time_ms: 3_000,
            retry_after_secs: 60,
            mail_from: "Website <noreply@example.com>".into(),
            mail_to: "office@example.com".into(),
            subject_prefix: "Website contact: ".into(),
        }
    }

    fn gatekeeper(
        forwarder: MockForwarder,
    ) -> SubmissionGatekeeper<InMemoryRateLimitStore, MockForwarder> {
        SubmissionGatekeeper::new(
            InMemoryRateLimitStore::new(RateLimitPolicy::default()),
            forwarder,
            policy(),
        )
        .with_clock(Arc::new(ManualClock::new(NOW)))
    }

    fn silent_forwarder() -> MockForwarder {
        let mut forwarder = MockForwarder::new();
        forwarder.expect_forward().times(0);
        forwarder
    }

    fn accepting_forwarder(times: usize) -> MockForwarder {
        let mut forwarder = MockForwarder::new();
        forwarder.expect_forward().times(times).returning(|_| Ok(()));
        forwarder
    }

    fn browser() -> RequestMeta {
        RequestMeta {
            identifier: "203.0.113.7".into(),
            user_agent: Some("Mozilla/5.0".into()),
        }
    }

    fn valid_raw() -> RawSubmission {
        RawSubmission {
            name: Some("Ada Lovelace".into()),
            email: Some("ada@example.com".into()),
            subject: Some("Consultation".into()),
            message: Some("I'd like to discuss a contract.".into()),
            website: Some(String::new()),
            timestamp: Some((NOW - 5_000).to_string()),
        }
    }

    async fn ready(raw: RawSubmission) -> Result<RawSubmission, AppError> {
        Ok(raw)
    }

    #[tokio::test]
    async fn well_formed_submission_is_forwarded_once_sanitized() {
        let mut forwarder = MockForwarder::new();
        forwarder
            .expect_forward()
            .times(1)
            .withf(|email| {
                email.to == "office@example.com"
                    && email.reply_to == "ada@example.com"
                    && email.subject == "Website contact: Consultation"
                    && email.html.contains("I&#39;d like to discuss a contract.")
                    && email.html.contains("203.0.113.7")
                    && !email.text.contains('\'')
            })
            .returning(|_| Ok(()));
        let gate = gatekeeper(forwarder);

        let response = gate.submit(&browser(), ready(valid_raw())).await.unwrap();

        assert_eq!(response, ContactResponse::delivered());
    }

    #[tokio::test]
    async fn blank_user_agent_is_silent_and_skips_body() {
        let gate = gatekeeper(silent_forwarder());
        let body_read = AtomicBool::new(false);
        let meta = RequestMeta { user_agent: Some("   ".into()), ..browser() };

        let verdict = gate
            .evaluate(&meta, async {
                body_read.store(true, Ordering::SeqCst);
                Ok(valid_raw())
            })
            .await;

        assert!(matches!(verdict, Verdict::RejectedSilently(BotSignal::MissingUserAgent)));
        assert!(!body_read.load(Ordering::SeqCst));

        let meta = RequestMeta { user_agent: None, ..browser() };
        let response = gate.submit(&meta, ready(valid_raw())).await.unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn honeypot_is_silent() {
        let gate = gatekeeper(silent_forwarder());
        let raw = RawSubmission { website: Some("https://seo.example".into()), ..valid_raw() };

        assert!(matches!(
            gate.evaluate(&browser(), ready(raw.clone())).await,
            Verdict::RejectedSilently(BotSignal::HoneypotFilled)
        ));
        assert_eq!(gate.submit(&browser(), ready(raw)).await.unwrap(), ContactResponse::delivered());
    }

    #[tokio::test]
    async fn fast_fill_is_silent() {
        let gate = gatekeeper(silent_forwarder());
        let raw = RawSubmission { timestamp: Some((NOW - 1_200).to_string()), ..valid_raw() };

        assert!(matches!(
            gate.evaluate(&browser(), ready(raw)).await,
            Verdict::RejectedSilently(BotSignal::SubmittedTooFast)
        ));
    }

    #[tokio::test]
    async fn missing_timestamp_still_delivers() {
        let gate = gatekeeper(accepting_forwarder(1));
        let raw = RawSubmission { timestamp: None, ..valid_raw() };

        assert!(gate.submit(&browser(), ready(raw)).await.is_ok());
    }

    #[tokio::test]
    async fn eleventh_submission_is_throttled_without_reading_body() {
        let gate = gatekeeper(accepting_forwarder(10));
        for _ in 0..10 {
            gate.submit(&browser(), ready(valid_raw())).await.unwrap();
        }

        let body_read = AtomicBool::new(false);
        let result = gate
            .submit(&browser(), async {
                body_read.store(true, Ordering::SeqCst);
                Ok(valid_raw())
            })
            .await;

        assert!(matches!(result, Err(AppError::RateLimited { retry_after_secs: 60 })));
        assert!(!body_read.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn missing_subject_is_a_client_error() {
        let gate = gatekeeper(silent_forwarder());
        let raw = RawSubmission { subject: None, ..valid_raw() };

        let result = gate.submit(&browser(), ready(raw)).await;

        assert!(matches!(result, Err(AppError::MissingFields)));
    }

    #[tokio::test]
    async fn script_in_any_text_field_is_rejected() {
        let gate = gatekeeper(silent_forwarder());
        let payload = "<script>alert(1)</script>".to_string();

        for raw in [
            RawSubmission { name: Some(payload.clone()), ..valid_raw() },
            RawSubmission { subject: Some(payload.clone()), ..valid_raw() },
            RawSubmission { message: Some(payload.clone()), ..valid_raw() },
        ] {
            let result = gate.submit(&browser(), ready(raw)).await;
            assert!(matches!(result, Err(AppError::ContentNotPermitted)));
        }
    }

    #[tokio::test]
    async fn link_density_threshold() {
        let gate = gatekeeper(accepting_forwarder(3));
        let four = "http://a.io http://b.io http://c.io http://d.io";
        let two = "see http://a.io and http://b.io";

        let with = |field: &str, value: &str| {
            let mut raw = valid_raw();
            let slot = match field {
                "name" => &mut raw.name,
                "subject" => &mut raw.subject,
                _ => &mut raw.message,
            };
            *slot = Some(value.to_string());
            raw
        };

        for field in ["name", "subject", "message"] {
            let result = gate.submit(&browser(), ready(with(field, four))).await;
            assert!(matches!(result, Err(AppError::ContentNotPermitted)), "{field}");

            let result = gate.submit(&browser(), ready(with(field, two))).await;
            assert!(result.is_ok(), "{field}");
        }
    }

    #[tokio::test]
    async fn reply_address_that_escaping_would_alter_is_rejected() {
        let gate = gatekeeper(silent_forwarder());
        let raw = RawSubmission { email: Some("tom&jerry@example.com".into()), ..valid_raw() };

        let result = gate.submit(&browser(), ready(raw)).await;

        match result {
            Err(AppError::ValidationError(fields)) => assert_eq!(fields[0].field, "email"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn disabled_inspection_still_sanitizes() {
        let mut forwarder = MockForwarder::new();
        forwarder
            .expect_forward()
            .times(1)
            .withf(|email| {
                email.html.contains("&lt;script&gt;alert(1)&lt;/script&gt;")
                    && !email.html.contains("<script>")
            })
            .returning(|_| Ok(()));
        let mut gate = gatekeeper(forwarder);
        gate.policy.content_inspection = false;

        let raw = RawSubmission { message: Some("<script>alert(1)</script>".into()), ..valid_raw() };
        assert!(gate.submit(&browser(), ready(raw)).await.is_ok());
    }

    #[tokio::test]
    async fn invalid_email_fails_validation() {
        let gate = gatekeeper(silent_forwarder());
        let raw = RawSubmission { email: Some("ada-at-example".into()), ..valid_raw() };

        let result = gate.submit(&browser(), ready(raw)).await;

        assert!(matches!(result, Err(AppError::ValidationError(ref f)) if f[0].field == "email"));
    }

    #[tokio::test]
    async fn provider_failure_becomes_delivery_failure() {
        let mut forwarder = MockForwarder::new();
        forwarder
            .expect_forward()
            .times(1)
            .returning(|_| Err(MailerError::Transport("connection reset".into())));
        forwarder.expect_provider_name().return_const("mock");
        let gate = gatekeeper(forwarder);

        let result = gate.submit(&browser(), ready(valid_raw())).await;

        assert!(matches!(result, Err(AppError::DeliveryFailed(ref msg)) if msg.contains("connection reset")));
    }

    #[tokio::test]
    async fn unreadable_body_is_internal_error() {
        let gate = gatekeeper(silent_forwarder());

        let result = gate
            .submit(&browser(), async { Err(AppError::Internal("truncated body".into())) })
            .await;

        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn window_reset_admits_caller_again() {
        let clock = Arc::new(ManualClock::new(NOW));
        let gate = SubmissionGatekeeper::new(
            InMemoryRateLimitStore::new(RateLimitPolicy::default()),
            accepting_forwarder(11),
            policy(),
        )
        .with_clock(clock.clone());

        for _ in 0..10 {
            gate.submit(&browser(), ready(valid_raw())).await.unwrap();
        }
        assert!(gate.submit(&browser(), ready(valid_raw())).await.is_err());

        clock.advance(60_001);
        let raw = RawSubmission { timestamp: Some((NOW + 55_000).to_string()), ..valid_raw() };
        assert!(gate.submit(&browser(), ready(raw)).await.is_ok());
        assert_eq!(gate.rate_store.record("203.0.113.7").unwrap().count, 1);
    }
}
