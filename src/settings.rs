use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use dotenv::dotenv;
use std::{env, fmt, str::FromStr};
use validator::ValidateEmail;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Development,
    Production,
    Testing,
}

impl FromStr for AppEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(AppEnvironment::Development),
            "production" => Ok(AppEnvironment::Production),
            "testing" => Ok(AppEnvironment::Testing),
            _ => Err(ConfigError::Message(format!("Invalid environment: {}", s))),
        }
    }
}

/// Which outbound email provider the Forwarder talks to.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MailProvider {
    Resend,
    Smtp,
}

impl fmt::Display for MailProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailProvider::Resend => write!(f, "resend"),
            MailProvider::Smtp => write!(f, "smtp"),
        }
    }
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    #[serde(default = "default_env")]
    pub env: AppEnvironment,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default = "default_provider")]
    pub provider: MailProvider,

    #[serde(default)]
    pub resend_api_key: String,

    #[serde(default = "default_resend_api_url")]
    pub resend_api_url: String,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_username: String,

    #[serde(default)]
    pub smtp_password: String,

    #[serde(default)]
    pub mail_from: String,

    #[serde(default)]
    pub mail_to: String,

    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    #[serde(default = "default_true")]
    pub content_inspection: bool,

    #[serde(default = "default_rate_limit_ceiling")]
    pub rate_limit_ceiling: u32,

    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,

    #[serde(default = "default_min_fill_time_ms")]
    pub min_fill_time_ms: u64,

    #[serde(default = "default_true")]
    pub trust_proxy_headers: bool,

    #[serde(default)]
    pub platform_ip_header: Option<String>,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

fn default_env() -> AppEnvironment {
    AppEnvironment::Development
}
fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_worker_count() -> usize {
    num_cpus::get()
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_provider() -> MailProvider {
    MailProvider::Resend
}
fn default_resend_api_url() -> String {
    "https://api.resend.com".to_string()
}
fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_subject_prefix() -> String {
    "Website contact: ".to_string()
}
fn default_true() -> bool {
    true
}
fn default_rate_limit_ceiling() -> u32 {
    10
}
fn default_rate_limit_window_ms() -> u64 {
    60_000
}
fn default_min_fill_time_ms() -> u64 {
    3_000
}
fn default_max_body_bytes() -> usize {
    64 * 1024
}
fn default_provider_timeout_secs() -> u64 {
    10
}
fn default_purge_interval_secs() -> u64 {
    300
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        dotenv().ok();

        let raw_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let env_name = AppEnvironment::from_str(&raw_env)
            .map_err(|_| ConfigError::Message(format!("Invalid APP_ENV value: {}", raw_env)))?;

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env_name)).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .ignore_empty(true)
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        config.env = env_name;

        config.validate()?;
        Ok(config)
    }

    /// Checks every boot-time requirement and reports all failures at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        match self.provider {
            MailProvider::Resend => {
                if self.resend_api_key.trim().is_empty() {
                    errors.push("RESEND_API_KEY must be set when provider is resend");
                }
                if url::Url::parse(&self.resend_api_url).is_err() {
                    errors.push("RESEND_API_URL must be a valid URL");
                }
            }
            MailProvider::Smtp => {
                if self.smtp_host.trim().is_empty() {
                    errors.push("SMTP_HOST must be set when provider is smtp");
                }
                if self.smtp_username.trim().is_empty() || self.smtp_password.is_empty() {
                    errors.push("SMTP_USERNAME and SMTP_PASSWORD must be set when provider is smtp");
                }
            }
        }
        if self.mail_from.trim().is_empty() {
            errors.push("MAIL_FROM cannot be empty");
        }
        if !self.mail_to.trim().validate_email() {
            errors.push("MAIL_TO must be a valid email address");
        }
        if self.rate_limit_ceiling == 0 {
            errors.push("RATE_LIMIT_CEILING must be at least 1");
        }
        if self.rate_limit_window_ms < 1_000 {
            errors.push("RATE_LIMIT_WINDOW_MS must be at least 1000");
        }
        if self.max_body_bytes == 0 {
            errors.push("MAX_BODY_BYTES must be greater than 0");
        }
        if self.is_production() && self.cors_origins().iter().any(|o| o == "*") {
            errors.push("Wildcard CORS (*) is not allowed in production");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(errors.join(", ")))
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == AppEnvironment::Production
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .iter()
            .flat_map(|origin| origin.split(','))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Retry hint sent with throttled responses, rounded up to whole seconds.
    pub fn retry_after_secs(&self) -> u64 {
        self.rate_limit_window_ms.div_ceil(1_000)
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Production => "production",
            AppEnvironment::Testing => "testing",
        };
        write!(f, "{s}")
    }
}

trait Redact {
    fn redact(&self) -> &str;
}

impl Redact for str {
    fn redact(&self) -> &str {
        if self.is_empty() {
            "[MISSING]"
        } else {
            "[REDACTED]"
        }
    }
}

impl Redact for String {
    fn redact(&self) -> &str {
        self.as_str().redact()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("port", &self.port)
            .field("host", &self.host)
            .field("worker_count", &self.worker_count)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("provider", &self.provider)
            .field("resend_api_key", &self.resend_api_key.redact())
            .field("resend_api_url", &self.resend_api_url)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &self.smtp_password.redact())
            .field("mail_from", &self.mail_from)
            .field("mail_to", &self.mail_to)
            .field("content_inspection", &self.content_inspection)
            .field("rate_limit_ceiling", &self.rate_limit_ceiling)
            .field("rate_limit_window_ms", &self.rate_limit_window_ms)
            .field("min_fill_time_ms", &self.min_fill_time_ms)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .field("platform_ip_header", &self.platform_ip_header)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            env: AppEnvironment::Testing,
            port: 0,
            host: "127.0.0.1".into(),
            worker_count: 1,
            cors_allowed_origins: vec!["*".into()],
            provider: MailProvider::Resend,
            resend_api_key: "re_test_key".into(),
            resend_api_url: default_resend_api_url(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            mail_from: "Website <noreply@example.com>".into(),
            mail_to: "office@example.com".into(),
            subject_prefix: default_subject_prefix(),
            content_inspection: true,
            rate_limit_ceiling: 10,
            rate_limit_window_ms: 60_000,
            min_fill_time_ms: 3_000,
            trust_proxy_headers: true,
            platform_ip_header: None,
            max_body_bytes: default_max_body_bytes(),
            provider_timeout_secs: 10,
            purge_interval_secs: 0,
        }
    }

    #[test]
    fn accepts_complete_resend_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn rejects_missing_resend_key() {
        let config = AppConfig { resend_api_key: "  ".into(), ..valid_config() };

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("RESEND_API_KEY"));
    }

    #[test]
    fn smtp_requires_credentials() {
        let config = AppConfig { provider: MailProvider::Smtp, ..valid_config() };

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("SMTP_USERNAME"));
    }

    #[test]
    fn reports_every_problem_at_once() {
        let config = AppConfig {
            mail_to: "not-an-address".into(),
            rate_limit_ceiling: 0,
            ..valid_config()
        };

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("MAIL_TO"));
        assert!(err.contains("RATE_LIMIT_CEILING"));
    }

    #[test]
    fn wildcard_cors_rejected_in_production() {
        let config = AppConfig { env: AppEnvironment::Production, ..valid_config() };
        assert!(config.validate().is_err());

        let config = AppConfig {
            env: AppEnvironment::Production,
            cors_allowed_origins: vec!["https://a.example, https://b.example".into()],
            ..valid_config()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.cors_origins().len(), 2);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", valid_config());
        assert!(!rendered.contains("re_test_key"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(rendered.contains("[MISSING]"));
    }

    #[test]
    fn retry_hint_rounds_up() {
        assert_eq!(valid_config().retry_after_secs(), 60);
        let config = AppConfig { rate_limit_window_ms: 1_500, ..valid_config() };
        assert_eq!(config.retry_after_secs(), 2);
    }
}
