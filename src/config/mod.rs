//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{path::PathBuf, str::FromStr, time::Duration};

use chrono_tz::Tz;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::pagination::MAX_PER_PAGE;
use crate::util::links::with_trailing_slash;

pub use cli::*;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quire";
const ENV_PREFIX: &str = "QUIRE";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_SESSION_FILE: &str = ".quire/session.json";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub supabase: SupabaseSettings,
    pub site: SiteSettings,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct SupabaseSettings {
    pub url: Url,
    pub anon_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub timezone: Tz,
    pub page_size: u32,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub session_file: PathBuf,
    pub admin_emails: Vec<String>,
    /// Base URL that confirmation and reset links point back to.
    pub redirect_base: Option<Url>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("auth.admin_emails")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_global_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    supabase: RawSupabaseSettings,
    site: RawSiteSettings,
    auth: RawAuthSettings,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.supabase_url.as_ref() {
            self.supabase.url = Some(url.clone());
        }
        if let Some(timezone) = overrides.timezone.as_ref() {
            self.site.timezone = Some(timezone.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            supabase,
            site,
            auth,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            supabase: build_supabase_settings(supabase)?,
            site: build_site_settings(site)?,
            auth: build_auth_settings(auth)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_supabase_settings(supabase: RawSupabaseSettings) -> Result<SupabaseSettings, LoadError> {
    let raw_url = non_blank(supabase.url)
        .ok_or_else(|| LoadError::invalid("supabase.url", "a project URL is required"))?;
    let url = parse_http_url(&raw_url).map_err(|reason| LoadError::invalid("supabase.url", reason))?;

    let anon_key = non_blank(supabase.anon_key)
        .ok_or_else(|| LoadError::invalid("supabase.anon_key", "an anon key is required"))?;

    let timeout_secs = supabase.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "supabase.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(SupabaseSettings {
        url,
        anon_key,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let timezone = match non_blank(site.timezone) {
        Some(name) => Tz::from_str(&name)
            .map_err(|err| LoadError::invalid("site.timezone", format!("`{name}`: {err}")))?,
        None => Tz::UTC,
    };

    let page_size = site.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page_size == 0 || page_size > MAX_PER_PAGE {
        return Err(LoadError::invalid(
            "site.page_size",
            format!("must be between 1 and {MAX_PER_PAGE}"),
        ));
    }

    Ok(SiteSettings {
        timezone,
        page_size,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let session_file = auth
        .session_file
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));
    if session_file.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "auth.session_file",
            "path must not be empty",
        ));
    }

    let admin_emails = auth
        .admin_emails
        .into_iter()
        .filter_map(|email| non_blank(Some(email)))
        .collect();

    let redirect_base = non_blank(auth.redirect_base)
        .map(|raw| parse_http_url(&raw).map(with_trailing_slash))
        .transpose()
        .map_err(|reason| LoadError::invalid("auth.redirect_base", reason))?;

    Ok(AuthSettings {
        session_file,
        admin_emails,
        redirect_base,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSupabaseSettings {
    url: Option<String>,
    anon_key: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    timezone: Option<String>,
    page_size: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    session_file: Option<PathBuf>,
    admin_emails: Vec<String>,
    redirect_base: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_http_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|err| format!("invalid URL `{raw}`: {err}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme `{other}`")),
    }
}
