use anyhow::Context;
use dotenvy::dotenv;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SHOP_UPDATER_CRON: &str = "0 0/5 * * * *";
pub const DEFAULT_WATERMARK_PATH: &str = "./data/shop-sync-watermark.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub operator_api_url: String,
    pub operator_api_key: SecretString,
    /// Base of the operator back-office, used for shop callback links.
    pub operator_env_url: String,
    pub payments_api_url: String,
    pub payments_api_key: SecretString,
    pub mail_base_url: String,
    pub operator_email: String,
    pub smtp: SmtpConfig,
    pub shop_updater_cron: String,
    pub default_locale: String,
    pub watermark_path: PathBuf,
    pub http_timeout: Duration,
    pub notify_on_sync: bool,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub from_address: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> anyhow::Result<String> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .with_context(|| format!("{} is required", key))
        };

        let shop_updater_cron =
            lookup("SHOP_UPDATER_CRON").unwrap_or_else(|| DEFAULT_SHOP_UPDATER_CRON.to_string());
        cron::Schedule::from_str(&shop_updater_cron)
            .with_context(|| format!("SHOP_UPDATER_CRON is not a valid cron expression: {}", shop_updater_cron))?;

        let config = Config {
            operator_api_url: parse_url("OPERATOR_API_URL", &required("OPERATOR_API_URL")?)?,
            operator_api_key: SecretString::from(required("OPERATOR_API_KEY")?),
            operator_env_url: parse_url("OPERATOR_ENV_URL", &required("OPERATOR_ENV_URL")?)?,
            payments_api_url: parse_url("PAYMENTS_API_URL", &required("PAYMENTS_API_URL")?)?,
            payments_api_key: SecretString::from(required("PAYMENTS_API_KEY")?),
            mail_base_url: parse_url("MAIL_BASE_URL", &required("MAIL_BASE_URL")?)?,
            operator_email: required("OPERATOR_EMAIL")?,
            smtp: SmtpConfig {
                host: required("SMTP_HOST")?,
                port: lookup("SMTP_PORT")
                    .unwrap_or_else(|| "587".to_string())
                    .parse()
                    .context("SMTP_PORT must be a port number")?,
                username: lookup("SMTP_USERNAME"),
                password: lookup("SMTP_PASSWORD").map(SecretString::from),
                from_address: required("MAIL_FROM")?,
            },
            shop_updater_cron,
            default_locale: lookup("DEFAULT_LOCALE").unwrap_or_else(|| "en".to_string()),
            watermark_path: PathBuf::from(
                lookup("WATERMARK_PATH").unwrap_or_else(|| DEFAULT_WATERMARK_PATH.to_string()),
            ),
            http_timeout: Duration::from_secs(
                lookup("HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|| "30".to_string())
                    .parse()
                    .context("HTTP_TIMEOUT_SECS must be a number of seconds")?,
            ),
            notify_on_sync: lookup("NOTIFY_ON_SYNC")
                .map(|value| parse_bool(&value))
                .transpose()?
                .unwrap_or(true),
        };

        Ok(config)
    }

    pub fn schedule(&self) -> anyhow::Result<cron::Schedule> {
        cron::Schedule::from_str(&self.shop_updater_cron)
            .with_context(|| format!("invalid cron expression: {}", self.shop_updater_cron))
    }

    /// Human-readable summary with secrets masked.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Operator API URL", self.operator_api_url.clone()),
            ("Operator API key", mask_secret(&self.operator_api_key)),
            ("Operator env URL", self.operator_env_url.clone()),
            ("Payments API URL", self.payments_api_url.clone()),
            ("Payments API key", mask_secret(&self.payments_api_key)),
            ("Mail base URL", self.mail_base_url.clone()),
            ("Operator email", self.operator_email.clone()),
            ("SMTP", format!("{}:{}", self.smtp.host, self.smtp.port)),
            ("Shop updater cron", self.shop_updater_cron.clone()),
            ("Default locale", self.default_locale.clone()),
            ("Watermark path", self.watermark_path.display().to_string()),
            ("HTTP timeout", format!("{}s", self.http_timeout.as_secs())),
            ("Notify on sync", self.notify_on_sync.to_string()),
        ]
    }
}

fn parse_url(key: &str, raw: &str) -> anyhow::Result<String> {
    let url = Url::parse(raw.trim()).with_context(|| format!("{} is not a valid URL", key))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("{} must be an http(s) URL", key);
    }
    Ok(raw.trim().trim_end_matches('/').to_string())
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    }
}

fn mask_secret(secret: &SecretString) -> String {
    let exposed = secret.expose_secret();
    if exposed.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = exposed.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("****{}", tail)
}
