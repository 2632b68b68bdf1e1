use std::{collections::HashMap, fs, str::FromStr, time::Duration};

use anyhow::{bail, Context};
use tracing::warn;
use url::Url;

use crate::{
    cache::CachePolicy, debounce::DEFAULT_DEBOUNCE, query_state::DEFAULT_PAGE_SIZE,
    retry::RetryPolicy, ClientPolicy,
};

pub const SETTINGS_FILE: &str = "sales_dashboard.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub page_size: u32,
    pub debounce: Duration,
    pub search_stale_time: Duration,
    pub search_gc_time: Duration,
    pub search_retries: u32,
    pub options_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        let search = CachePolicy::search_default();
        Self {
            api_base_url: "http://localhost:8000".into(),
            page_size: DEFAULT_PAGE_SIZE,
            debounce: DEFAULT_DEBOUNCE,
            search_stale_time: search.stale_time.unwrap_or_default(),
            search_gc_time: search.gc_time.unwrap_or_default(),
            search_retries: ClientPolicy::default().search_retry.retries,
            options_retries: ClientPolicy::default().options_retry.retries,
            retry_base_delay: Duration::from_millis(1000),
            retry_max_delay: Duration::from_millis(30_000),
        }
    }
}

impl ClientSettings {
    pub fn client_policy(&self) -> ClientPolicy {
        let retry = |retries| RetryPolicy {
            retries,
            base_delay: self.retry_base_delay,
            max_delay: self.retry_max_delay,
        };
        ClientPolicy {
            search_cache: CachePolicy {
                stale_time: Some(self.search_stale_time),
                gc_time: Some(self.search_gc_time),
            },
            search_retry: retry(self.search_retries),
            options_cache: CachePolicy::forever(),
            options_retry: retry(self.options_retries),
        }
    }
}

/// Reads settings once: defaults, then `sales_dashboard.toml` in the
/// working directory, then environment variables.
pub fn load_settings() -> anyhow::Result<ClientSettings> {
    let file = fs::read_to_string(SETTINGS_FILE).ok();
    load_settings_from(file.as_deref(), |name| std::env::var(name).ok())
}

pub(crate) fn load_settings_from(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    if let Some(raw) = file {
        let file_cfg = toml::from_str::<HashMap<String, String>>(raw)
            .with_context(|| format!("failed to parse {SETTINGS_FILE}"))?;
        if let Some(v) = file_cfg.get("api_base_url") {
            settings.api_base_url = v.clone();
        }
        apply_number(&mut settings.page_size, "page_size", file_cfg.get("page_size"));
        apply_millis(&mut settings.debounce, "debounce_ms", file_cfg.get("debounce_ms"));
        apply_secs(
            &mut settings.search_stale_time,
            "search_stale_secs",
            file_cfg.get("search_stale_secs"),
        );
        apply_secs(
            &mut settings.search_gc_time,
            "search_gc_secs",
            file_cfg.get("search_gc_secs"),
        );
        apply_number(
            &mut settings.search_retries,
            "search_retries",
            file_cfg.get("search_retries"),
        );
        apply_number(
            &mut settings.options_retries,
            "options_retries",
            file_cfg.get("options_retries"),
        );
    }

    for name in ["NEXT_PUBLIC_API_URL", "SALES_API_URL", "APP__API_BASE_URL"] {
        if let Some(v) = env(name) {
            settings.api_base_url = v;
        }
    }

    apply_number(
        &mut settings.page_size,
        "APP__PAGE_SIZE",
        env("APP__PAGE_SIZE").as_ref(),
    );
    apply_millis(
        &mut settings.debounce,
        "APP__DEBOUNCE_MS",
        env("APP__DEBOUNCE_MS").as_ref(),
    );
    apply_secs(
        &mut settings.search_stale_time,
        "APP__SEARCH_STALE_SECS",
        env("APP__SEARCH_STALE_SECS").as_ref(),
    );
    apply_secs(
        &mut settings.search_gc_time,
        "APP__SEARCH_GC_SECS",
        env("APP__SEARCH_GC_SECS").as_ref(),
    );
    apply_number(
        &mut settings.search_retries,
        "APP__SEARCH_RETRIES",
        env("APP__SEARCH_RETRIES").as_ref(),
    );
    apply_number(
        &mut settings.options_retries,
        "APP__OPTIONS_RETRIES",
        env("APP__OPTIONS_RETRIES").as_ref(),
    );

    settings.page_size = settings.page_size.max(1);
    settings.api_base_url = normalize_base_url(&settings.api_base_url)?;
    Ok(settings)
}

fn apply_number<T: FromStr>(target: &mut T, name: &str, raw: Option<&String>) {
    let Some(raw) = raw else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!(setting = name, value = %raw, "settings: ignoring unparseable value"),
    }
}

fn apply_millis(target: &mut Duration, name: &str, raw: Option<&String>) {
    let Some(raw) = raw else {
        return;
    };
    let mut millis = u64::try_from(target.as_millis()).unwrap_or(u64::MAX);
    apply_number(&mut millis, name, Some(raw));
    *target = Duration::from_millis(millis);
}

fn apply_secs(target: &mut Duration, name: &str, raw: Option<&String>) {
    let mut secs = target.as_secs();
    apply_number(&mut secs, name, raw);
    *target = Duration::from_secs(secs);
}

/// Validates an `http(s)` base URL and strips trailing slashes.
pub fn normalize_base_url(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(ClientSettings::default().api_base_url);
    }

    let parsed = Url::parse(raw).with_context(|| format!("invalid api base url '{raw}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!(
            "unsupported scheme '{}' in api base url '{raw}'",
            parsed.scheme()
        );
    }

    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
