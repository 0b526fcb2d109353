use std::env;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use chrono_tz::Tz;

const DEFAULT_EMAIL_HOST: &str = "smtp.gmail.com";
const DEFAULT_EMAIL_PORT: u16 = 587;
const DEFAULT_TRIGGER_HOUR: u32 = 6;
const DEFAULT_TRIGGER_MINUTE: u32 = 14;
const DEFAULT_TIMEZONE: &str = "US/Eastern";
const DEFAULT_BATCH_SIZE: usize = 10;

/// SMTP transport settings. Absence of any required credential is a
/// startup-time configuration error, not a per-send failure.
#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub from: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
}

impl EmailConfig {
    pub fn from_env() -> Result<Self> {
        let from = env::var("EMAIL_FROM").ok().filter(|v| !v.is_empty());
        let username = env::var("EMAIL_USERNAME").ok().filter(|v| !v.is_empty());
        let password = env::var("EMAIL_PASSWORD").ok().filter(|v| !v.is_empty());

        let mut missing = Vec::new();
        if from.is_none() {
            missing.push("EMAIL_FROM");
        }
        if username.is_none() {
            missing.push("EMAIL_USERNAME");
        }
        if password.is_none() {
            missing.push("EMAIL_PASSWORD");
        }
        if !missing.is_empty() {
            return Err(anyhow!(
                "missing email configuration: {}",
                missing.join(", ")
            ));
        }

        let host = env::var("EMAIL_HOST").unwrap_or_else(|_| DEFAULT_EMAIL_HOST.to_string());
        let port = env::var("EMAIL_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_EMAIL_PORT);
        let use_tls = env::var("EMAIL_USE_TLS")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        Ok(Self {
            from: from.unwrap_or_default(),
            host,
            port,
            username: username.unwrap_or_default(),
            password: password.unwrap_or_default(),
            use_tls,
        })
    }
}

/// Daily trigger settings shared by the scheduler and the HTTP handlers that
/// default to "today": both sides resolve dates in the same timezone.
#[derive(Clone, Debug)]
pub struct ScheduleConfig {
    pub hour: u32,
    pub minute: u32,
    pub timezone: Tz,
    pub batch_size: usize,
}

impl ScheduleConfig {
    pub fn from_env() -> Result<Self> {
        let hour = parse_env("DAILY_EMAIL_HOUR", DEFAULT_TRIGGER_HOUR)?;
        let minute = parse_env("DAILY_EMAIL_MINUTE", DEFAULT_TRIGGER_MINUTE)?;
        if hour > 23 {
            return Err(anyhow!("DAILY_EMAIL_HOUR must be between 0 and 23"));
        }
        if minute > 59 {
            return Err(anyhow!("DAILY_EMAIL_MINUTE must be between 0 and 59"));
        }

        let tz_name =
            env::var("DAILY_EMAIL_TIMEZONE").unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = tz_name
            .parse()
            .map_err(|_| anyhow!("unknown timezone in DAILY_EMAIL_TIMEZONE: {tz_name}"))?;

        let batch_size = parse_env("EMAIL_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(anyhow!("EMAIL_BATCH_SIZE must be at least 1"));
        }

        Ok(Self {
            hour,
            minute,
            timezone,
            batch_size,
        })
    }

    /// Current calendar date in the configured trigger timezone.
    pub fn today(&self) -> NaiveDate {
        chrono::Utc::now().with_timezone(&self.timezone).date_naive()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| anyhow!("invalid value for {name}: {raw}")),
        Err(_) => Ok(default),
    }
}
