//! Configuration resolution for homie-inspect
//!
//! Secrets resolve with Database → ENV → TOML priority. A secret that is
//! found nowhere disables its collaborator instead of failing startup.

use std::time::Duration;

use homie_common::config::TomlConfig;
use homie_common::Result;
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use crate::db::settings;
use crate::services::vision_client::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use crate::services::{GeminiSettings, MailjetSettings};

pub const VISION_API_KEY_ENV: &str = "HOMIE_VISION_API_KEY";
pub const MAIL_API_KEY_ENV: &str = "HOMIE_MAIL_API_KEY";
pub const MAIL_API_SECRET_ENV: &str = "HOMIE_MAIL_API_SECRET";
pub const MAIL_SENDER_ENV: &str = "HOMIE_MAIL_SENDER";

pub const DEFAULT_SENDER_NAME: &str = "Homie Inspections";

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Where a secret was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Database,
    Environment,
    Toml,
}

impl SecretSource {
    fn label(self) -> &'static str {
        match self {
            SecretSource::Database => "database",
            SecretSource::Environment => "environment",
            SecretSource::Toml => "TOML",
        }
    }
}

/// Resolve one secret from the three tiers
///
/// **Priority:** Database → ENV → TOML
pub async fn resolve_secret(
    db: &Pool<Sqlite>,
    setting_key: &str,
    env_var: &str,
    toml_value: Option<&str>,
) -> Result<Option<(String, SecretSource)>> {
    let db_value: Option<String> = settings::get_setting(db, setting_key).await?;
    let env_value = std::env::var(env_var).ok();

    let candidates = [
        (db_value.as_deref(), SecretSource::Database),
        (env_value.as_deref(), SecretSource::Environment),
        (toml_value, SecretSource::Toml),
    ];
    let valid: Vec<(&str, SecretSource)> = candidates
        .iter()
        .filter_map(|(value, source)| value.filter(|v| is_valid_key(v)).map(|v| (v, *source)))
        .collect();

    // Warn if multiple sources (potential misconfiguration)
    if valid.len() > 1 {
        let sources: Vec<&str> = valid.iter().map(|(_, s)| s.label()).collect();
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            setting_key,
            sources.join(", "),
            valid[0].1.label()
        );
    }

    Ok(valid.first().map(|(value, source)| {
        info!("{} loaded from {}", setting_key, source.label());
        (value.trim().to_string(), *source)
    }))
}

/// Settings the service runs with
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_address: String,
    /// Origin used in links handed to tenants, without trailing slash
    pub public_base_url: String,
    /// `None` when no vision API key is configured
    pub vision: Option<GeminiSettings>,
    /// `None` when mail credentials are incomplete
    pub mail: Option<MailjetSettings>,
    pub vision_timeout: Duration,
}

impl ServiceConfig {
    /// Owner dashboard linked from report emails
    pub fn dashboard_url(&self) -> String {
        format!("{}/homes", self.public_base_url)
    }
}

/// Build the service configuration
///
/// CLI values win over TOML, which wins over compiled defaults.
pub async fn resolve_service_config(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
    cli_bind: Option<String>,
    cli_public_base_url: Option<String>,
) -> Result<ServiceConfig> {
    let defaults = homie_common::config::CompiledDefaults::for_current_platform();

    let bind_address = cli_bind
        .or_else(|| toml_config.bind_address.clone())
        .unwrap_or(defaults.bind_address);
    let public_base_url = cli_public_base_url
        .or_else(|| toml_config.public_base_url.clone())
        .unwrap_or_else(|| format!("http://{}", bind_address))
        .trim_end_matches('/')
        .to_string();

    let vision_timeout = Duration::from_secs(
        toml_config
            .vision
            .timeout_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS),
    );

    let vision = resolve_secret(
        db,
        settings::VISION_API_KEY,
        VISION_API_KEY_ENV,
        toml_config.vision.api_key.as_deref(),
    )
    .await?
    .map(|(api_key, _)| GeminiSettings {
        api_key,
        model: toml_config
            .vision
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        endpoint: toml_config
            .vision
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        timeout: vision_timeout,
    });
    if vision.is_none() {
        warn!(
            "Vision API key not configured; room analysis will fail. Set {} or [vision].api_key",
            VISION_API_KEY_ENV
        );
    }

    let mail_key = resolve_secret(db, settings::MAIL_API_KEY, MAIL_API_KEY_ENV, toml_config.mail.api_key.as_deref()).await?;
    let mail_secret = resolve_secret(
        db,
        settings::MAIL_API_SECRET,
        MAIL_API_SECRET_ENV,
        toml_config.mail.api_secret.as_deref(),
    )
    .await?;
    let sender = resolve_secret(
        db,
        settings::MAIL_SENDER_EMAIL,
        MAIL_SENDER_ENV,
        toml_config.mail.sender_email.as_deref(),
    )
    .await?;

    let mail = match (mail_key, mail_secret, sender) {
        (Some((api_key, _)), Some((api_secret, _)), Some((sender_email, _))) => Some(MailjetSettings {
            api_key,
            api_secret,
            sender_email,
            sender_name: toml_config
                .mail
                .sender_name
                .clone()
                .filter(|n| is_valid_key(n))
                .unwrap_or_else(|| DEFAULT_SENDER_NAME.to_string()),
        }),
        _ => {
            warn!("Mail credentials incomplete; inspection reports will not be emailed");
            None
        }
    };

    Ok(ServiceConfig {
        bind_address,
        public_base_url,
        vision,
        mail,
        vision_timeout,
    })
}
